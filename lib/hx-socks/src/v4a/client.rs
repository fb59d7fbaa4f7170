/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use tokio::io::{AsyncRead, AsyncWrite};

use hx_types::auth::Username;
use hx_types::net::UpstreamAddr;

use super::{SocksV4Reply, SocksV4aRequest};
use crate::{SocksCommand, SocksConnectError};

/// tcp connect through a socks4 or socks4a proxy
///
/// a domain host is passed through for the proxy to resolve (socks4a),
/// the caller resolves to an ipv4 address itself for plain socks4
pub async fn socks4a_connect_to<S>(
    stream: &mut S,
    addr: &UpstreamAddr,
    user_id: &Username,
) -> Result<(), SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    SocksV4aRequest::send(stream, SocksCommand::TcpConnect, addr, user_id)
        .await
        .map_err(SocksConnectError::WriteFailed)?;

    let rsp = SocksV4Reply::recv(stream).await?;
    match rsp {
        SocksV4Reply::RequestGranted => Ok(()),
        _ => Err(SocksConnectError::RequestFailed(
            rsp.error_message().to_string(),
        )),
    }
}
