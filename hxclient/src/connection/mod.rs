/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};

use hx_io_ext::LimitedBufReadExt;
use hx_types::net::{Host, Proxy};

mod connect;
pub(crate) use connect::establish;

pub(crate) trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub(crate) type BoxStream = Box<dyn AsyncStream>;

/// a connection may only be reused while this tuple is unchanged
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ConnectionIdentity {
    pub(crate) host: Host,
    pub(crate) port: u16,
    pub(crate) tls: bool,
    pub(crate) proxy: Option<Proxy>,
}

pub(crate) struct HttpConnection {
    pub(crate) reader: BufReader<ReadHalf<BoxStream>>,
    pub(crate) writer: WriteHalf<BoxStream>,
    identity: ConnectionIdentity,
    dirty: bool,
}

impl HttpConnection {
    pub(crate) fn new(stream: BoxStream, identity: ConnectionIdentity) -> Self {
        let (r, w) = tokio::io::split(stream);
        HttpConnection {
            reader: BufReader::new(r),
            writer: w,
            identity,
            dirty: false,
        }
    }

    /// mark the connection as carrying unread or indeterminate data,
    /// the next request will not reuse it
    pub(crate) fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_reusable(&mut self, identity: &ConnectionIdentity) -> bool {
        if self.dirty || self.identity.ne(identity) {
            return false;
        }
        // a closed peer completes immediately, an idle healthy one stays pending
        self.reader.fill_wait_data().now_or_never().is_none()
    }
}

/// counts the bytes accepted by the inner writer and notifies after each one
pub(crate) struct ProgressWriter<'a, W, F> {
    inner: &'a mut W,
    written: u64,
    notify: F,
}

impl<'a, W, F> ProgressWriter<'a, W, F>
where
    W: AsyncWrite + Unpin,
    F: FnMut(u64) + Send,
{
    pub(crate) fn new(inner: &'a mut W, already_written: u64, notify: F) -> Self {
        ProgressWriter {
            inner,
            written: already_written,
            notify,
        }
    }
}

impl<W, F> AsyncWrite for ProgressWriter<'_, W, F>
where
    W: AsyncWrite + Unpin,
    F: FnMut(u64) + Send + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        let me = self.get_mut();
        match Pin::new(&mut *me.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                me.written += n as u64;
                (me.notify)(me.written);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut *self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut *self.get_mut().inner).poll_shutdown(cx)
    }
}
