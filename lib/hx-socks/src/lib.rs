/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod types;
pub use types::{
    SocksAuthMethod, SocksCommand, SocksConnectError, SocksNegotiationError, SocksReplyParseError,
};

pub mod v4a;
pub mod v5;
