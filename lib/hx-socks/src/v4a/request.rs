/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;
use std::net::IpAddr;

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncWrite;

use hx_io_ext::LimitedWriteExt;
use hx_types::auth::Username;
use hx_types::net::{Host, UpstreamAddr};

use super::SocksCommand;

pub struct SocksV4aRequest;

impl SocksV4aRequest {
    pub(crate) async fn send<W>(
        writer: &mut W,
        command: SocksCommand,
        addr: &UpstreamAddr,
        user_id: &Username,
    ) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let user_id = user_id.as_original();
        let mut buf_len = 1 + 1 + 2 + 4 + user_id.len() + 1;
        let buf = match addr.host() {
            Host::Ip(IpAddr::V4(ip4)) => {
                let mut buf = BytesMut::with_capacity(buf_len);
                buf.put_u8(0x04);
                buf.put_u8(command.code());
                buf.put_u16(addr.port());
                buf.put_slice(&ip4.octets());
                buf.put_slice(user_id.as_bytes());
                buf.put_u8(0x00);
                buf
            }
            Host::Ip(IpAddr::V6(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "ipv6 remote address is not supported",
                ));
            }
            Host::Domain(domain) => {
                // the proxy is told to resolve the hostname itself
                buf_len += domain.len() + 1;
                let mut buf = BytesMut::with_capacity(buf_len);
                buf.put_u8(0x04);
                buf.put_u8(command.code());
                buf.put_u16(addr.port());
                buf.put_slice(&[0x00, 0x00, 0x00, 0x01]);
                buf.put_slice(user_id.as_bytes());
                buf.put_u8(0x00);
                buf.put_slice(domain.as_bytes());
                buf.put_u8(0x00);
                buf
            }
        };
        writer.write_all_flush(buf.as_ref()).await
    }
}
