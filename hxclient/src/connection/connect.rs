/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};

use log::debug;
use tokio::io::BufStream;
use tokio::net::TcpStream;

use hx_http::connect::http_connect_to;
use hx_socks::v4a::client::socks4a_connect_to;
use hx_socks::v5::client::socks5_connect_to;
use hx_types::net::{Host, Proxy, UpstreamAddr};

use super::{BoxStream, ConnectionIdentity, HttpConnection};
use crate::config::HttpClientConfig;
use crate::error::HttpClientError;

fn proxy_failed(peer: &UpstreamAddr, reason: impl fmt::Display) -> HttpClientError {
    HttpClientError::ProxyFailed {
        peer: peer.to_string(),
        reason: reason.to_string(),
    }
}

async fn resolve_addrs(peer: &UpstreamAddr) -> Result<Vec<SocketAddr>, HttpClientError> {
    match peer.host() {
        Host::Ip(ip) => Ok(vec![SocketAddr::new(*ip, peer.port())]),
        Host::Domain(domain) => {
            let addrs = tokio::net::lookup_host((domain.as_str(), peer.port()))
                .await
                .map_err(HttpClientError::ResolveFailed)?
                .collect::<Vec<_>>();
            if addrs.is_empty() {
                return Err(HttpClientError::ResolveFailed(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "no address resolved",
                )));
            }
            Ok(addrs)
        }
    }
}

async fn tcp_connect(
    peer: &UpstreamAddr,
    config: &HttpClientConfig,
) -> Result<TcpStream, HttpClientError> {
    let mut last_err = HttpClientError::ConnectTimedOut;
    for addr in resolve_addrs(peer).await? {
        match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => last_err = HttpClientError::ConnectFailed(e),
            Err(_) => last_err = HttpClientError::ConnectTimedOut,
        }
    }
    Err(last_err)
}

/// resolve to an ipv4 address for a proxy protocol that cannot carry
/// hostnames or ipv6 addresses
async fn resolve_ipv4(
    addr: &UpstreamAddr,
    proxy_peer: &UpstreamAddr,
) -> Result<UpstreamAddr, HttpClientError> {
    match addr.host() {
        Host::Ip(IpAddr::V4(_)) => Ok(addr.clone()),
        Host::Ip(IpAddr::V6(_)) => Err(proxy_failed(
            proxy_peer,
            "ipv6 destinations are not supported",
        )),
        Host::Domain(domain) => {
            let found = tokio::net::lookup_host((domain.as_str(), addr.port()))
                .await
                .map_err(HttpClientError::ResolveFailed)?
                .find_map(|a| match a.ip() {
                    IpAddr::V4(ip) => Some(ip),
                    IpAddr::V6(_) => None,
                });
            match found {
                Some(ip) => Ok(UpstreamAddr::new(Host::Ip(IpAddr::V4(ip)), addr.port())),
                None => Err(proxy_failed(proxy_peer, "no ipv4 address for host")),
            }
        }
    }
}

fn flatten_hops<'a>(proxy: &'a Proxy, hops: &mut Vec<&'a Proxy>) {
    match proxy {
        Proxy::Chain(nodes) => {
            for node in nodes {
                flatten_hops(node, hops);
            }
        }
        leaf => hops.push(leaf),
    }
}

async fn negotiate_hop(
    stream: &mut BoxStream,
    hop: &Proxy,
    next: &UpstreamAddr,
) -> Result<(), HttpClientError> {
    match hop {
        Proxy::Http(p) => {
            // a plain http proxy forwards port 80 traffic without a tunnel
            if next.port() == 80 {
                return Ok(());
            }
            let mut buf_stream = BufStream::new(stream);
            http_connect_to(&mut buf_stream, &p.auth, next)
                .await
                .map_err(|e| proxy_failed(p.peer(), e))
        }
        Proxy::Socks4(p) => {
            let dest = resolve_ipv4(next, p.peer()).await?;
            socks4a_connect_to(stream, &dest, &p.userid)
                .await
                .map_err(|e| proxy_failed(p.peer(), e))
        }
        Proxy::Socks4a(p) => socks4a_connect_to(stream, next, &p.userid)
            .await
            .map_err(|e| proxy_failed(p.peer(), e)),
        Proxy::Socks5(p) => socks5_connect_to(stream, &p.auth, next)
            .await
            .map(|_| ())
            .map_err(|e| proxy_failed(p.peer(), e)),
        Proxy::Chain(_) => unreachable!("chains are flattened before negotiation"),
    }
}

fn build_tls_connector(
    config: &HttpClientConfig,
) -> Result<tokio_native_tls::TlsConnector, HttpClientError> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|e| HttpClientError::TlsHandshakeFailed(e.to_string()))?;
    Ok(tokio_native_tls::TlsConnector::from(connector))
}

/// open a connection to the target, traversing the proxy hops in order
/// and wrapping in tls last
pub(crate) async fn establish(
    config: &HttpClientConfig,
    target: &UpstreamAddr,
    identity: ConnectionIdentity,
) -> Result<HttpConnection, HttpClientError> {
    let first_peer = identity.proxy.as_ref().map(|p| p.peer()).unwrap_or(target);
    debug!("connecting to {first_peer}");
    let tcp = tcp_connect(first_peer, config).await?;

    let mut stream: BoxStream = Box::new(tcp);

    if let Some(proxy) = &identity.proxy {
        let mut hops = Vec::new();
        flatten_hops(proxy, &mut hops);

        for (i, hop) in hops.iter().enumerate() {
            let next = hops.get(i + 1).map(|h| h.peer()).unwrap_or(target);
            match tokio::time::timeout(
                config.connect_timeout,
                negotiate_hop(&mut stream, hop, next),
            )
            .await
            {
                Ok(r) => r?,
                Err(_) => {
                    return Err(proxy_failed(hop.peer(), "negotiation timed out"));
                }
            }
        }
    }

    if identity.tls {
        let connector = build_tls_connector(config)?;
        let tls_name = target.host_str();
        let stream_in = stream;
        stream = match tokio::time::timeout(
            config.connect_timeout,
            connector.connect(&tls_name, stream_in),
        )
        .await
        {
            Ok(Ok(tls_stream)) => Box::new(tls_stream),
            Ok(Err(e)) => return Err(HttpClientError::TlsHandshakeFailed(e.to_string())),
            Err(_) => return Err(HttpClientError::ConnectTimedOut),
        };
    }

    Ok(HttpConnection::new(stream, identity))
}
