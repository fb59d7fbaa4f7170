/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

mod host;
mod http;
mod proxy;
mod socks;
mod upstream;

pub use host::{Host, HostParseError};
pub use http::{HttpAuth, HttpBasicAuth};
pub use proxy::{HttpProxy, Proxy, ProxyParseError, Socks4Proxy, Socks5Proxy};
pub use socks::SocksAuth;
pub use upstream::UpstreamAddr;
