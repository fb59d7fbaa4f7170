/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod auth;
pub use auth::proxy_authorization_basic;

mod encoding;
pub use encoding::ContentEncoding;
