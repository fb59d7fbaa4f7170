/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use super::types::*;

mod reply;
mod request;

pub use reply::Socks5Reply;
pub use request::Socks5Request;

mod auth;

pub mod client;
