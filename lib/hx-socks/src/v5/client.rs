/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use hx_types::net::{SocksAuth, UpstreamAddr};

use super::{Socks5Reply, Socks5Request, SocksAuthMethod, SocksCommand, SocksConnectError, auth};

async fn socks5_login<S>(stream: &mut S, auth: &SocksAuth) -> Result<(), SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let auth_method = auth::send_and_recv_method(stream, auth).await?;
    match auth_method {
        SocksAuthMethod::None => {}
        SocksAuthMethod::User => {
            if let SocksAuth::User(username, password) = auth {
                auth::proceed_with_user(stream, username, password).await?;
            } else {
                return Err(SocksConnectError::NoAuthMethodAvailable);
            }
        }
        _ => return Err(SocksConnectError::NoAuthMethodAvailable),
    }

    Ok(())
}

/// tcp connect to a socks5 proxy
///
/// return the local bind address at the server side
pub async fn socks5_connect_to<S>(
    stream: &mut S,
    auth: &SocksAuth,
    addr: &UpstreamAddr,
) -> Result<SocketAddr, SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    socks5_login(stream, auth).await?;

    Socks5Request::send(stream, SocksCommand::TcpConnect, addr)
        .await
        .map_err(SocksConnectError::WriteFailed)?;

    let rsp = Socks5Reply::recv(stream).await?;
    match rsp {
        Socks5Reply::Succeeded(addr) => Ok(addr),
        Socks5Reply::ConnectionTimedOut => Err(SocksConnectError::PeerTimeout),
        _ => Err(SocksConnectError::RequestFailed(
            rsp.error_message().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use hx_types::auth::{Password, Username};
    use hx_types::net::Host;

    #[tokio::test]
    async fn connect_no_auth() {
        let addr = UpstreamAddr::new(Host::from_str("example.net").unwrap(), 80);
        let mut mock = tokio_test::io::Builder::new()
            .write(b"\x05\x01\x00")
            .read(b"\x05\x00")
            .write(b"\x05\x01\x00\x03\x0bexample.net\x00\x50")
            .read(b"\x05\x00\x00\x01\x7f\x00\x00\x01\x04\xd2")
            .build();
        let bind = socks5_connect_to(&mut mock, &SocksAuth::None, &addr)
            .await
            .unwrap();
        assert_eq!(bind, SocketAddr::from_str("127.0.0.1:1234").unwrap());
    }

    #[tokio::test]
    async fn connect_user_auth() {
        let addr = UpstreamAddr::new(Host::from_str("192.0.2.7").unwrap(), 443);
        let auth = SocksAuth::User(
            Username::from_original("user").unwrap(),
            Password::from_original("pass").unwrap(),
        );
        let mut mock = tokio_test::io::Builder::new()
            .write(b"\x05\x01\x02")
            .read(b"\x05\x02")
            .write(b"\x01\x04user\x04pass")
            .read(b"\x01\x00")
            .write(b"\x05\x01\x00\x01\xc0\x00\x02\x07\x01\xbb")
            .read(b"\x05\x00\x00\x01\x00\x00\x00\x00\x00\x00")
            .build();
        socks5_connect_to(&mut mock, &auth, &addr).await.unwrap();
    }

    #[tokio::test]
    async fn no_acceptable_method() {
        let addr = UpstreamAddr::new(Host::from_str("example.net").unwrap(), 80);
        let mut mock = tokio_test::io::Builder::new()
            .write(b"\x05\x01\x00")
            .read(b"\x05\xff")
            .build();
        let err = socks5_connect_to(&mut mock, &SocksAuth::None, &addr)
            .await
            .unwrap_err();
        assert!(matches!(err, SocksConnectError::NoAuthMethodAvailable));
    }

    #[tokio::test]
    async fn connect_refused() {
        let addr = UpstreamAddr::new(Host::from_str("example.net").unwrap(), 80);
        let mut mock = tokio_test::io::Builder::new()
            .write(b"\x05\x01\x00")
            .read(b"\x05\x00")
            .write(b"\x05\x01\x00\x03\x0bexample.net\x00\x50")
            .read(b"\x05\x05\x00\x01\x00\x00\x00\x00\x00\x00")
            .build();
        let err = socks5_connect_to(&mut mock, &SocksAuth::None, &addr)
            .await
            .unwrap_err();
        assert!(matches!(err, SocksConnectError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn auth_rejected() {
        let addr = UpstreamAddr::new(Host::from_str("example.net").unwrap(), 80);
        let auth = SocksAuth::User(
            Username::from_original("user").unwrap(),
            Password::from_original("bad").unwrap(),
        );
        let mut mock = tokio_test::io::Builder::new()
            .write(b"\x05\x01\x02")
            .read(b"\x05\x02")
            .write(b"\x01\x04user\x03bad")
            .read(b"\x01\x01")
            .build();
        let err = socks5_connect_to(&mut mock, &auth, &addr).await.unwrap_err();
        assert!(matches!(err, SocksConnectError::AuthFailed));
    }
}
