/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io::Read;

use bytes::Bytes;
use encoding_rs::Encoding;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use http::{HeaderMap, Method, Version};
use mime::Mime;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use hx_http::client::{HttpResponseHead, HttpResponseParseError};
use hx_http::{HttpBodyDecodeState, HttpBodyType};
use hx_http::header::ContentEncoding;

use crate::client::HttpClient;
use crate::error::HttpClientError;

pub(crate) const BODY_LINE_MAX_LEN: usize = 2048;

fn header_str<'a>(head: &'a HttpResponseHead, name: &str) -> Option<&'a str> {
    head.headers.get(name).and_then(|v| v.to_str().ok())
}

fn content_type_of(head: &HttpResponseHead) -> Option<&str> {
    header_str(head, "content-type").map(|v| v.split(';').next().unwrap_or(v).trim())
}

fn charset_of(head: &HttpResponseHead) -> Option<&'static Encoding> {
    let v = header_str(head, "content-type")?;
    let mime = v.parse::<Mime>().ok()?;
    let label = mime.get_param(mime::CHARSET)?;
    Encoding::for_label(label.as_str().as_bytes())
}

pub(crate) fn is_redirect(head: &HttpResponseHead) -> bool {
    (300..400).contains(&head.code)
        || head.headers.contains_key("location")
        || head.headers.contains_key("redirect-location")
}

/// resolve the redirect target against the request url, relative
/// locations included
pub(crate) fn redirect_target(head: &HttpResponseHead, request_url: &Url) -> Option<Url> {
    let location = header_str(head, "location").or_else(|| header_str(head, "redirect-location"))?;
    request_url.join(location).ok()
}

fn decompress(
    encoding: Option<ContentEncoding>,
    raw: Vec<u8>,
) -> Result<Vec<u8>, HttpClientError> {
    let Some(encoding) = encoding else {
        return Ok(raw);
    };
    let mut out = Vec::with_capacity(raw.len() * 2);
    let r = match encoding {
        ContentEncoding::Gzip => GzDecoder::new(&raw[..]).read_to_end(&mut out),
        ContentEncoding::Deflate => {
            // servers disagree on whether "deflate" carries a zlib wrapper
            if raw.first() == Some(&0x78) {
                ZlibDecoder::new(&raw[..]).read_to_end(&mut out)
            } else {
                DeflateDecoder::new(&raw[..]).read_to_end(&mut out)
            }
        }
    };
    r.map_err(HttpClientError::InvalidCompressedBody)?;
    Ok(out)
}

/// A received response, bound to the client that produced it.
///
/// The body stays on the wire until one of the body accessors pulls it in.
/// A body can be consumed once, later accessors yield empty data. Dropping
/// the response with the body unread marks the connection dirty so the next
/// request dials a fresh one.
pub struct HttpResponse<'a> {
    client: &'a mut HttpClient,
    head: HttpResponseHead,
    request_url: Url,
    body_state: Option<HttpBodyDecodeState>,
    body_total: Option<u64>,
    content_encoding: Option<ContentEncoding>,
    loaded: bool,
    failed: bool,
}

impl<'a> HttpResponse<'a> {
    pub(crate) fn new(
        client: &'a mut HttpClient,
        head: HttpResponseHead,
        request_url: Url,
        method: &Method,
    ) -> Result<Self, HttpClientError> {
        let content_encoding = head.content_encoding().map_err(|e| match e {
            HttpResponseParseError::UnsupportedContentEncoding(v) => {
                HttpClientError::UnsupportedContentEncoding(v)
            }
            e => HttpClientError::RecvFailed(e),
        })?;
        let body_type = head.body_type(method);
        let body_total = match body_type {
            Some(HttpBodyType::ContentLength(n)) => Some(n),
            _ => None,
        };
        let body_state = body_type.map(|t| HttpBodyDecodeState::new(t, BODY_LINE_MAX_LEN));
        Ok(HttpResponse {
            client,
            head,
            request_url,
            body_state,
            body_total,
            content_encoding,
            loaded: false,
            failed: false,
        })
    }

    pub fn status(&self) -> u16 {
        self.head.code
    }

    pub fn reason(&self) -> &str {
        &self.head.reason
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.head, name)
    }

    pub fn request_url(&self) -> &Url {
        &self.request_url
    }

    pub fn keep_alive(&self) -> bool {
        self.head.keep_alive()
    }

    /// media type from the Content-Type header, parameters stripped
    pub fn content_type(&self) -> Option<&str> {
        content_type_of(&self.head)
    }

    /// charset parameter of the response, falling back to the configured
    /// charset and then utf-8
    pub fn charset(&self) -> &'static Encoding {
        charset_of(&self.head)
            .or(self.client.config.charset)
            .unwrap_or(encoding_rs::UTF_8)
    }

    pub fn has_redirect(&self) -> bool {
        is_redirect(&self.head)
    }

    pub fn redirect_location(&self) -> Option<Url> {
        redirect_target(&self.head, &self.request_url)
    }

    /// response header block size as seen on the wire
    pub fn header_size(&self) -> usize {
        self.head.origin_header_size()
    }

    /// total wire bytes consumed by this response so far, body framing
    /// included
    pub fn wire_received(&self) -> u64 {
        let body = self.body_state.as_ref().map(|s| s.wire_read()).unwrap_or(0);
        self.head.origin_header_size() as u64 + body
    }

    /// The whole body after transfer decoding and decompression.
    pub async fn bytes(&mut self) -> Result<Bytes, HttpClientError> {
        let raw = self.read_raw().await?;
        let data = decompress(self.content_encoding, raw)?;
        Ok(Bytes::from(data))
    }

    /// The body decoded to text using [`charset`](Self::charset).
    pub async fn text(&mut self) -> Result<String, HttpClientError> {
        let data = self.bytes().await?;
        let (text, _, _) = self.charset().decode(&data);
        Ok(text.into_owned())
    }

    /// Copy the decoded body into a writer, returning the decoded length.
    pub async fn copy_to<W>(&mut self, writer: &mut W) -> Result<u64, HttpClientError>
    where
        W: AsyncWrite + Unpin,
    {
        let raw = self.read_raw().await?;
        let data = decompress(self.content_encoding, raw)?;
        writer
            .write_all(&data)
            .await
            .map_err(HttpClientError::ReadBodyFailed)?;
        Ok(data.len() as u64)
    }

    /// Discard the body so the connection can be reused.
    pub async fn skip(&mut self) -> Result<(), HttpClientError> {
        self.read_raw().await?;
        Ok(())
    }

    /// Pull the next body chunk off the wire, `None` once the body ends.
    ///
    /// Chunks are transfer decoded as they arrive. A compressed body
    /// cannot be streamed piecewise and is delivered whole on the first
    /// call instead.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, HttpClientError> {
        if self.content_encoding.is_some() {
            let data = self.bytes().await?;
            return Ok(if data.is_empty() { None } else { Some(data) });
        }
        if self.failed {
            return Err(HttpClientError::BodyNotAvailable);
        }
        let Some(state) = self.body_state.as_mut() else {
            self.loaded = true;
            self.teardown_if_needed();
            return Ok(None);
        };
        if self.loaded {
            return Ok(None);
        }
        let Some(conn) = self.client.connection.as_mut() else {
            return Err(HttpClientError::BodyNotAvailable);
        };

        let mut buf = [0u8; 8192];
        let mut body_reader = state.reader(&mut conn.reader);
        let nr = match tokio::time::timeout(
            self.client.config.read_timeout,
            body_reader.read(&mut buf),
        )
        .await
        {
            Ok(Ok(nr)) => nr,
            Ok(Err(e)) => {
                self.failed = true;
                conn.set_dirty();
                return Err(HttpClientError::ReadBodyFailed(e));
            }
            Err(_) => {
                self.failed = true;
                conn.set_dirty();
                return Err(HttpClientError::RecvTimedOut);
            }
        };
        if nr == 0 {
            self.loaded = true;
            self.teardown_if_needed();
            return Ok(None);
        }
        let received = state.wire_read();
        let total = self.body_total;
        if let Some(notify) = self.client.download_progress.as_mut() {
            notify(received, total);
        }
        Ok(Some(Bytes::copy_from_slice(&buf[..nr])))
    }

    async fn read_raw(&mut self) -> Result<Vec<u8>, HttpClientError> {
        if self.failed {
            return Err(HttpClientError::BodyNotAvailable);
        }
        let Some(state) = self.body_state.as_mut() else {
            self.loaded = true;
            self.teardown_if_needed();
            return Ok(Vec::new());
        };
        if self.loaded {
            return Ok(Vec::new());
        }
        let Some(conn) = self.client.connection.as_mut() else {
            return Err(HttpClientError::BodyNotAvailable);
        };

        let mut raw = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let mut body_reader = state.reader(&mut conn.reader);
            let nr = match tokio::time::timeout(
                self.client.config.read_timeout,
                body_reader.read(&mut buf),
            )
            .await
            {
                Ok(Ok(nr)) => nr,
                Ok(Err(e)) => {
                    self.failed = true;
                    conn.set_dirty();
                    return Err(HttpClientError::ReadBodyFailed(e));
                }
                Err(_) => {
                    self.failed = true;
                    conn.set_dirty();
                    return Err(HttpClientError::RecvTimedOut);
                }
            };
            if nr == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..nr]);
            let received = state.wire_read();
            let total = self.body_total;
            if let Some(notify) = self.client.download_progress.as_mut() {
                notify(received, total);
            }
        }

        self.loaded = true;
        self.teardown_if_needed();
        Ok(raw)
    }

    fn teardown_if_needed(&mut self) {
        if !self.head.keep_alive() {
            self.client.connection = None;
        }
    }
}

impl Drop for HttpResponse<'_> {
    fn drop(&mut self) {
        if self.body_state.is_some() && !self.loaded {
            if let Some(conn) = self.client.connection.as_mut() {
                conn.set_dirty();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::str::FromStr;
    use tokio::io::BufReader;

    async fn parse_head(bytes: &[u8]) -> HttpResponseHead {
        let mut stream = BufReader::new(bytes);
        HttpResponseHead::parse(&mut stream, &Method::GET, true, 4096)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn content_type_and_charset() {
        let head = parse_head(
            b"HTTP/1.1 200 OK\r\n\
            Content-Type: text/html; charset=windows-1251\r\n\
            Content-Length: 0\r\n\r\n",
        )
        .await;
        assert_eq!(content_type_of(&head), Some("text/html"));
        assert_eq!(charset_of(&head), Some(encoding_rs::WINDOWS_1251));
    }

    #[tokio::test]
    async fn redirect_detection() {
        let head = parse_head(
            b"HTTP/1.1 302 Found\r\n\
            Location: /next?step=2\r\n\
            Content-Length: 0\r\n\r\n",
        )
        .await;
        assert!(is_redirect(&head));
        let base = Url::from_str("http://example.com/start").unwrap();
        let target = redirect_target(&head, &base).unwrap();
        assert_eq!(target.as_str(), "http://example.com/next?step=2");
    }

    #[tokio::test]
    async fn redirect_location_header_on_ok() {
        let head = parse_head(
            b"HTTP/1.1 200 OK\r\n\
            Redirect-Location: http://other.example/\r\n\
            Content-Length: 0\r\n\r\n",
        )
        .await;
        assert!(is_redirect(&head));
        let base = Url::from_str("http://example.com/").unwrap();
        let target = redirect_target(&head, &base).unwrap();
        assert_eq!(target.as_str(), "http://other.example/");
    }

    #[tokio::test]
    async fn plain_status_is_not_redirect() {
        let head = parse_head(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
        assert!(!is_redirect(&head));
        let base = Url::from_str("http://example.com/").unwrap();
        assert!(redirect_target(&head, &base).is_none());
    }

    #[test]
    fn decompress_gzip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello gzip").unwrap();
        let raw = encoder.finish().unwrap();

        let out = decompress(Some(ContentEncoding::Gzip), raw).unwrap();
        assert_eq!(&out, b"hello gzip");
    }

    #[test]
    fn decompress_deflate_both_framings() {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"zlib wrapped").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(raw[0], 0x78);
        let out = decompress(Some(ContentEncoding::Deflate), raw).unwrap();
        assert_eq!(&out, b"zlib wrapped");

        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"raw deflate").unwrap();
        let raw = encoder.finish().unwrap();
        let out = decompress(Some(ContentEncoding::Deflate), raw).unwrap();
        assert_eq!(&out, b"raw deflate");
    }

    #[test]
    fn decompress_rejects_garbage() {
        let err = decompress(Some(ContentEncoding::Gzip), b"not gzip at all".to_vec());
        assert!(matches!(
            err,
            Err(HttpClientError::InvalidCompressedBody(_))
        ));
    }
}
