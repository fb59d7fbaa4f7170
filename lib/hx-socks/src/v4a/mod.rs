/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use super::types::*;

mod reply;
mod request;

pub use reply::SocksV4Reply;
pub use request::SocksV4aRequest;

pub mod client;
