/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

//! An async HTTP/1.1 client engine.
//!
//! A [`HttpClient`] owns at most one upstream connection and drives one
//! request at a time over it, transparently reconnecting, retrying once on
//! a broken keep-alive connection and following redirects. Connections can
//! be direct, TLS wrapped, or tunneled through HTTP CONNECT, SOCKS4,
//! SOCKS4a or SOCKS5 proxies, including chains of them.

mod client;
mod config;
mod connection;
mod content;
mod cookie;
mod error;
mod request;
mod response;

pub use client::HttpClient;
pub use config::HttpClientConfig;
pub use content::{BytesContent, ContentProvider, FormContent, MultipartContent, StringContent};
pub use cookie::CookieJar;
pub use error::HttpClientError;
pub use response::HttpResponse;
