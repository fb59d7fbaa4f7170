/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod ext;

pub use ext::{LimitedBufReadExt, LimitedWriteExt};
