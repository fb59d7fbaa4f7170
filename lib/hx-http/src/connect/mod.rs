/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod error;
pub use error::HttpConnectError;

mod request;
pub use request::HttpConnectRequest;

mod response;
pub use response::HttpConnectResponse;

mod client;
pub use client::http_connect_to;
