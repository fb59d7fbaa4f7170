/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostParseError {
    #[error("empty string")]
    EmptyString,
    #[error("invalid ipv6 ip")]
    InvalidIpv6Addr,
    #[error("invalid domain: {0}")]
    InvalidDomain(idna::Errors),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Domain(String),
}

impl Host {
    pub fn is_empty(&self) -> bool {
        match self {
            Host::Ip(ip) => ip.is_unspecified(),
            Host::Domain(domain) => domain.is_empty(),
        }
    }

    fn from_maybe_mapped_ip6(ip6: Ipv6Addr) -> Self {
        if let Some(ip4) = ip6.to_ipv4_mapped() {
            Host::Ip(IpAddr::V4(ip4))
        } else {
            Host::Ip(IpAddr::V6(ip6))
        }
    }

    fn from_domain_str(domain: &str) -> Result<Self, HostParseError> {
        let domain = idna::domain_to_ascii(domain).map_err(HostParseError::InvalidDomain)?;
        Ok(Host::Domain(domain))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "{ip}"),
            Host::Domain(domain) => write!(f, "{domain}"),
        }
    }
}

impl From<url::Host> for Host {
    fn from(v: url::Host) -> Self {
        match v {
            url::Host::Ipv4(ip4) => Host::Ip(IpAddr::V4(ip4)),
            url::Host::Ipv6(ip6) => Host::from_maybe_mapped_ip6(ip6),
            url::Host::Domain(domain) => Host::Domain(domain),
        }
    }
}

impl FromStr for Host {
    type Err = HostParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(HostParseError::EmptyString);
        }
        match s.as_bytes()[0] {
            b'[' => {
                let pos_last = s.len() - 1;
                if s.as_bytes()[pos_last] == b']' {
                    if let Ok(ip6) = Ipv6Addr::from_str(&s[1..pos_last]) {
                        return Ok(Host::from_maybe_mapped_ip6(ip6));
                    }
                }
                return Err(HostParseError::InvalidIpv6Addr);
            }
            b':' => {
                return if let Ok(ip6) = Ipv6Addr::from_str(s) {
                    Ok(Host::from_maybe_mapped_ip6(ip6))
                } else {
                    Err(HostParseError::InvalidIpv6Addr)
                };
            }
            b'0'..=b'9' => {
                if let Ok(ip) = IpAddr::from_str(s) {
                    return match ip {
                        IpAddr::V4(_) => Ok(Host::Ip(ip)),
                        IpAddr::V6(ip6) => Ok(Host::from_maybe_mapped_ip6(ip6)),
                    };
                }
            }
            b'a'..=b'f' | b'A'..=b'F' => {
                if let Ok(ip6) = Ipv6Addr::from_str(s) {
                    // won't be ipv4 mapped
                    return Ok(Host::Ip(IpAddr::V6(ip6)));
                }
            }
            _ => {}
        }

        Host::from_domain_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn parse_ip4() {
        let host = Host::from_str("192.168.1.1").unwrap();
        assert_eq!(host, Host::Ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
    }

    #[test]
    fn parse_bracketed_ip6() {
        let host = Host::from_str("[2001:db8::1]").unwrap();
        assert_eq!(
            host,
            Host::Ip(IpAddr::V6(Ipv6Addr::from_str("2001:db8::1").unwrap()))
        );
        assert!(Host::from_str("[2001:db8::1").is_err());
    }

    #[test]
    fn parse_mapped_ip6() {
        let host = Host::from_str("::ffff:192.168.1.1").unwrap();
        assert_eq!(host, Host::Ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
    }

    #[test]
    fn parse_domain() {
        let host = Host::from_str("www.Example.Com").unwrap();
        assert_eq!(host, Host::Domain("www.example.com".to_string()));
    }
}
