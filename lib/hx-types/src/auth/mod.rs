/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod error;
pub use error::AuthParseError;

mod user;
pub use user::{Password, Username};
