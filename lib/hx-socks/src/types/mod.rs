/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod auth;
pub use auth::SocksAuthMethod;

mod cmd;
pub use cmd::SocksCommand;

mod error;
pub use error::{SocksConnectError, SocksNegotiationError, SocksReplyParseError};
