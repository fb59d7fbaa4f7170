/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use hx_io_ext::LimitedWriteExt;
use hx_types::auth::{Password, Username};
use hx_types::net::SocksAuth;

use super::{SocksAuthMethod, SocksConnectError, SocksNegotiationError};

pub(super) async fn send_and_recv_method<S>(
    stream: &mut S,
    auth: &SocksAuth,
) -> Result<SocksAuthMethod, SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let method = match auth {
        SocksAuth::None => SocksAuthMethod::None,
        SocksAuth::User(_, _) => SocksAuthMethod::User,
    };
    stream
        .write_all_flush(&[0x05, 0x01, method.code()])
        .await
        .map_err(SocksConnectError::WriteFailed)?;

    let mut rsp = [0u8; 2];
    stream
        .read_exact(&mut rsp)
        .await
        .map_err(SocksConnectError::ReadFailed)?;
    if rsp[0] != 0x05 {
        return Err(SocksNegotiationError::InvalidVersion.into());
    }
    Ok(SocksAuthMethod::from(rsp[1]))
}

pub(super) async fn proceed_with_user<S>(
    stream: &mut S,
    username: &Username,
    password: &Password,
) -> Result<(), SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut msg = Vec::with_capacity(3 + username.len() as usize + password.len() as usize);
    msg.push(0x01);
    msg.push(username.len());
    msg.extend_from_slice(username.as_original().as_bytes());
    msg.push(password.len());
    msg.extend_from_slice(password.as_original().as_bytes());
    stream
        .write_all_flush(&msg)
        .await
        .map_err(SocksConnectError::WriteFailed)?;

    let mut rsp = [0u8; 2];
    stream
        .read_exact(&mut rsp)
        .await
        .map_err(SocksConnectError::ReadFailed)?;
    if rsp[0] != 0x01 {
        return Err(SocksNegotiationError::InvalidUserAuthMsg.into());
    }
    if rsp[1] != 0x00 {
        return Err(SocksConnectError::AuthFailed);
    }
    Ok(())
}
