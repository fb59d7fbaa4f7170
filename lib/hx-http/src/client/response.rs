/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::str::FromStr;

use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use tokio::io::AsyncBufRead;

use hx_io_ext::LimitedBufReadExt;

use super::HttpResponseParseError;
use crate::parse::{HttpHeaderLine, HttpLineParseError, HttpStatusLine};
use crate::{HttpBodyType, header::ContentEncoding};

fn is_end_of_header_line(line: &[u8]) -> bool {
    (line.len() == 1 && line[0] == b'\n')
        || (line.len() == 2 && line[0] == b'\r' && line[1] == b'\n')
}

#[derive(Debug)]
pub struct HttpResponseHead {
    pub version: Version,
    pub code: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub set_cookie: Vec<String>,
    origin_header_size: usize,
    keep_alive: bool,
    content_length: u64,
    chunked_transfer: bool,
    has_transfer_encoding: bool,
    has_content_length: bool,
}

impl HttpResponseHead {
    fn new(version: Version, code: u16, reason: String) -> Self {
        HttpResponseHead {
            version,
            code,
            reason,
            headers: HeaderMap::default(),
            set_cookie: Vec::new(),
            origin_header_size: 0,
            keep_alive: false,
            content_length: 0,
            chunked_transfer: false,
            has_transfer_encoding: false,
            has_content_length: false,
        }
    }

    pub fn origin_header_size(&self) -> usize {
        self.origin_header_size
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    fn expect_no_body(&self, method: &Method) -> bool {
        self.code < 200
            || self.code == 204
            || self.code == 304
            || method.eq(&Method::HEAD)
            || method.eq(&Method::DELETE)
    }

    pub fn body_type(&self, method: &Method) -> Option<HttpBodyType> {
        if self.expect_no_body(method) {
            None
        } else if self.chunked_transfer {
            Some(HttpBodyType::Chunked)
        } else if self.has_content_length {
            if self.content_length > 0 {
                Some(HttpBodyType::ContentLength(self.content_length))
            } else {
                None
            }
        } else {
            Some(HttpBodyType::ReadUntilEnd)
        }
    }

    pub fn content_encoding(&self) -> Result<Option<ContentEncoding>, HttpResponseParseError> {
        let Some(v) = self.headers.get(http::header::CONTENT_ENCODING) else {
            return Ok(None);
        };
        let v = v.to_str().map_err(|_| {
            HttpResponseParseError::InvalidHeaderLine(HttpLineParseError::InvalidHeaderValue)
        })?;
        if v.is_empty() {
            return Ok(None);
        }
        let encoding = ContentEncoding::from_str(v)
            .map_err(|_| HttpResponseParseError::UnsupportedContentEncoding(v.to_string()))?;
        Ok(Some(encoding))
    }

    /// read and parse a full response head
    ///
    /// stray blank lines before the status line are skipped, a remote close
    /// before any status byte is reported as EmptyResponse
    pub async fn parse<R>(
        reader: &mut R,
        method: &Method,
        keep_alive: bool,
        max_header_size: usize,
    ) -> Result<Self, HttpResponseParseError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line_buf = Vec::<u8>::with_capacity(1024);
        let mut header_size: usize = 0;

        let mut rsp = loop {
            if header_size >= max_header_size {
                return Err(HttpResponseParseError::TooLargeHeader(max_header_size));
            }
            line_buf.clear();
            let max_len = max_header_size - header_size;
            let (found, nr) = reader
                .limited_read_until(b'\n', max_len, &mut line_buf)
                .await?;
            if nr == 0 {
                return Err(HttpResponseParseError::EmptyResponse);
            }
            if !found {
                return if nr < max_len {
                    Err(HttpResponseParseError::RemoteClosed)
                } else {
                    Err(HttpResponseParseError::TooLargeHeader(max_header_size))
                };
            }
            header_size += nr;
            if is_end_of_header_line(&line_buf) {
                continue;
            }

            break HttpResponseHead::build_from_status_line(&line_buf)?;
        };
        rsp.keep_alive = keep_alive;

        loop {
            if header_size >= max_header_size {
                return Err(HttpResponseParseError::TooLargeHeader(max_header_size));
            }
            line_buf.clear();
            let max_len = max_header_size - header_size;
            let (found, nr) = reader
                .limited_read_until(b'\n', max_len, &mut line_buf)
                .await?;
            if nr == 0 {
                return Err(HttpResponseParseError::RemoteClosed);
            }
            if !found {
                return if nr < max_len {
                    Err(HttpResponseParseError::RemoteClosed)
                } else {
                    Err(HttpResponseParseError::TooLargeHeader(max_header_size))
                };
            }
            header_size += nr;
            if is_end_of_header_line(&line_buf) {
                break;
            }

            rsp.parse_header_line(&line_buf)?;
        }
        rsp.origin_header_size = header_size;

        rsp.post_check_and_fix(method);
        Ok(rsp)
    }

    fn post_check_and_fix(&mut self, method: &Method) {
        if !self.chunked_transfer && !self.expect_no_body(method) && !self.has_content_length {
            // read to end and close the connection
            self.keep_alive = false;
        }
    }

    fn build_from_status_line(line_buf: &[u8]) -> Result<Self, HttpResponseParseError> {
        let rsp =
            HttpStatusLine::parse(line_buf).map_err(HttpResponseParseError::InvalidStatusLine)?;
        Ok(HttpResponseHead::new(
            rsp.version,
            rsp.code,
            rsp.reason.to_string(),
        ))
    }

    fn parse_header_line(&mut self, line_buf: &[u8]) -> Result<(), HttpResponseParseError> {
        let header =
            HttpHeaderLine::parse(line_buf).map_err(HttpResponseParseError::InvalidHeaderLine)?;
        self.handle_header(header)
    }

    fn handle_header(&mut self, header: HttpHeaderLine) -> Result<(), HttpResponseParseError> {
        let name = HeaderName::from_str(header.name).map_err(|_| {
            HttpResponseParseError::InvalidHeaderLine(HttpLineParseError::InvalidHeaderName)
        })?;

        match name.as_str() {
            "connection" | "proxy-connection" => {
                // proxy-connection is not standard, but some proxies send it
                let value = header.value.to_lowercase();
                for v in value.as_str().split(',') {
                    if v.trim() == "close" {
                        self.keep_alive = false;
                    }
                }
            }
            "set-cookie" => {
                self.set_cookie.push(header.value.to_string());
                return Ok(());
            }
            "transfer-encoding" => {
                self.has_transfer_encoding = true;
                self.chunked_transfer = true;
                if self.has_content_length {
                    // delete content-length
                    self.headers.remove(http::header::CONTENT_LENGTH);
                    self.content_length = 0;
                }
            }
            "content-length" => {
                if self.has_transfer_encoding {
                    // ignore content-length
                    return Ok(());
                }

                let content_length = u64::from_str(header.value)
                    .map_err(|_| HttpResponseParseError::InvalidContentLength)?;

                if self.has_content_length && self.content_length != content_length {
                    return Err(HttpResponseParseError::InvalidContentLength);
                }
                self.has_content_length = true;
                self.content_length = content_length;
            }
            _ => {}
        }

        let value = HeaderValue::from_str(header.value).map_err(|_| {
            HttpResponseParseError::InvalidHeaderLine(HttpLineParseError::InvalidHeaderValue)
        })?;
        self.headers.append(name, value);
        Ok(())
    }
}
