/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod error;
pub use error::HttpResponseParseError;

mod response;
pub use response::HttpResponseHead;
