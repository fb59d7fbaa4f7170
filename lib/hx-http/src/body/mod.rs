/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod decode_reader;
pub use decode_reader::{HttpBodyDecodeReader, HttpBodyDecodeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpBodyType {
    ContentLength(u64),
    Chunked,
    ReadUntilEnd,
}
