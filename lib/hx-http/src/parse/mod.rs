/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod error;
pub use error::HttpLineParseError;

mod status_line;
pub use status_line::HttpStatusLine;

mod header_line;
pub use header_line::HttpHeaderLine;

mod chunked_line;
pub use chunked_line::HttpChunkedLine;
