/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::fmt;
use std::net::IpAddr;

use super::Host;

/// The remote address of one hop, which may still need resolving.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UpstreamAddr {
    host: Host,
    port: u16,
}

impl UpstreamAddr {
    pub fn new(host: Host, port: u16) -> Self {
        UpstreamAddr { host, port }
    }

    pub fn from_url_host_and_port(host: url::Host, port: u16) -> Self {
        UpstreamAddr {
            host: host.into(),
            port,
        }
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host_str(&self) -> String {
        self.host.to_string()
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ip(IpAddr::V6(ip6)) => write!(f, "[{ip6}]:{}", self.port),
            host => write!(f, "{host}:{}", self.port),
        }
    }
}
