/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;

use thiserror::Error;

use hx_http::client::HttpResponseParseError;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("resolve failed: {0:?}")]
    ResolveFailed(io::Error),
    #[error("connect failed: {0:?}")]
    ConnectFailed(io::Error),
    #[error("connect timed out")]
    ConnectTimedOut,
    #[error("tls handshake failed: {0}")]
    TlsHandshakeFailed(String),
    #[error("proxy {peer} failed: {reason}")]
    ProxyFailed { peer: String, reason: String },
    #[error("send failed: {0:?}")]
    SendFailed(io::Error),
    #[error("send timed out")]
    SendTimedOut,
    #[error("recv failed: {0}")]
    RecvFailed(HttpResponseParseError),
    #[error("recv timed out")]
    RecvTimedOut,
    #[error("read body failed: {0:?}")]
    ReadBodyFailed(io::Error),
    #[error("unsupported content encoding {0}")]
    UnsupportedContentEncoding(String),
    #[error("malformed compressed body: {0}")]
    InvalidCompressedBody(io::Error),
    #[error("unexpected status code {0} {1}")]
    ProtocolError(u16, String),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("header {0} can only be set through its dedicated option")]
    ReservedHeader(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("response is in error state, the body is not accessible")]
    BodyNotAvailable,
}

impl HttpClientError {
    /// the reader saw a connection close before any status byte
    pub(crate) fn is_empty_response(&self) -> bool {
        matches!(
            self,
            HttpClientError::RecvFailed(HttpResponseParseError::EmptyResponse)
        )
    }

    pub(crate) fn is_send_failure(&self) -> bool {
        matches!(
            self,
            HttpClientError::SendFailed(_) | HttpClientError::SendTimedOut
        )
    }

    pub(crate) fn is_recv_failure(&self) -> bool {
        matches!(
            self,
            HttpClientError::RecvFailed(_) | HttpClientError::RecvTimedOut
        )
    }
}
