/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{SocksNegotiationError, SocksReplyParseError};

pub enum SocksV4Reply {
    RequestGranted,
    RequestRejectedOrFailed,
    ClientIdentDNotConnected,
    UserIdNotMatch,
    Unassigned(u8),
}

impl SocksV4Reply {
    fn new(code: u8) -> Self {
        match code {
            90 => SocksV4Reply::RequestGranted,
            91 => SocksV4Reply::RequestRejectedOrFailed,
            92 => SocksV4Reply::ClientIdentDNotConnected,
            93 => SocksV4Reply::UserIdNotMatch,
            _ => SocksV4Reply::Unassigned(code),
        }
    }

    pub(crate) const fn error_message(&self) -> &'static str {
        match self {
            SocksV4Reply::RequestGranted => "request granted",
            SocksV4Reply::RequestRejectedOrFailed => "request rejected or failed",
            SocksV4Reply::ClientIdentDNotConnected => {
                "request rejected because SOCKS server cannot connect to identd on the client"
            }
            SocksV4Reply::UserIdNotMatch => {
                "request rejected because the client program and identd report different user-ids"
            }
            SocksV4Reply::Unassigned(_) => "unassigned reply code",
        }
    }

    pub(crate) async fn recv<R>(reader: &mut R) -> Result<Self, SocksReplyParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).await?;

        let version = buf[0];
        if version != 0x00 {
            return Err(SocksNegotiationError::InvalidVersion.into());
        }

        Ok(SocksV4Reply::new(buf[1]))
    }
}
