/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

pub mod parse;
pub use parse::{HttpChunkedLine, HttpHeaderLine, HttpLineParseError, HttpStatusLine};

mod body;
pub use body::{HttpBodyDecodeReader, HttpBodyDecodeState, HttpBodyType};

pub mod client;
pub mod connect;
pub mod header;
