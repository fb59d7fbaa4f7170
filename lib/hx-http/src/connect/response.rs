/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use http::Method;
use tokio::io::AsyncBufRead;

use super::HttpConnectError;
use crate::{HttpBodyDecodeState, HttpBodyType};
use crate::client::{HttpResponseHead, HttpResponseParseError};

#[derive(Debug)]
pub struct HttpConnectResponse {
    pub code: u16,
    pub reason: String,
}

impl HttpConnectResponse {
    fn detect_error(&self) -> Result<(), HttpConnectError> {
        if self.code == 200 {
            Ok(())
        } else if self.code == 504 || self.code == 522 || self.code == 524 {
            // Peer tells us it timeout
            Err(HttpConnectError::PeerTimeout(self.code))
        } else {
            Err(HttpConnectError::UnexpectedStatusCode(
                self.code,
                self.reason.clone(),
            ))
        }
    }

    pub async fn recv<R>(r: &mut R, max_header_size: usize) -> Result<Self, HttpConnectError>
    where
        R: AsyncBufRead + Unpin,
    {
        let head = HttpResponseHead::parse(r, &Method::GET, false, max_header_size)
            .await
            .map_err(|e| match e {
                HttpResponseParseError::EmptyResponse | HttpResponseParseError::RemoteClosed => {
                    HttpConnectError::RemoteClosed
                }
                HttpResponseParseError::IoFailed(e) => HttpConnectError::ReadFailed(e),
                e => HttpConnectError::InvalidResponse(e),
            })?;

        if let Some(body_type) = head
            .body_type(&Method::GET)
            .filter(|t| !matches!(t, HttpBodyType::ReadUntilEnd))
        {
            // the body should be simple in non-2xx case, use a default 2048 for its max line size
            let mut state = HttpBodyDecodeState::new(body_type, 2048);
            let mut body_reader = state.reader(r);
            let mut sink = tokio::io::sink();
            tokio::io::copy(&mut body_reader, &mut sink)
                .await
                .map_err(HttpConnectError::ReadFailed)?;
        }

        let rsp = HttpConnectResponse {
            code: head.code,
            reason: head.reason,
        };
        rsp.detect_error()?;

        Ok(rsp)
    }
}
