/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

mod form;
mod multipart;

pub use form::FormContent;
pub use multipart::MultipartContent;

/// A request body producer.
///
/// The engine only needs the value for the Content-Type and Content-Length
/// headers and a way to write the body bytes onto the connection. A provider
/// returning `None` from [`length`](Self::length) sends no Content-Length
/// header, which usually requires the server to read until close.
#[async_trait]
pub trait ContentProvider: Send {
    fn content_type(&self) -> String;

    fn length(&self) -> Option<u64>;

    async fn write_into(&mut self, writer: &mut (dyn AsyncWrite + Send + Unpin))
    -> io::Result<()>;
}

pub struct BytesContent {
    data: Bytes,
    content_type: String,
}

impl BytesContent {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        BytesContent {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl ContentProvider for BytesContent {
    fn content_type(&self) -> String {
        self.content_type.clone()
    }

    fn length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn write_into(
        &mut self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> io::Result<()> {
        writer.write_all(&self.data).await
    }
}

pub struct StringContent {
    inner: BytesContent,
}

impl StringContent {
    pub fn new(data: impl Into<String>) -> Self {
        Self::with_content_type(data, "text/plain")
    }

    pub fn with_content_type(data: impl Into<String>, content_type: impl Into<String>) -> Self {
        StringContent {
            inner: BytesContent::new(data.into(), content_type),
        }
    }
}

#[async_trait]
impl ContentProvider for StringContent {
    fn content_type(&self) -> String {
        self.inner.content_type()
    }

    fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    async fn write_into(
        &mut self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> io::Result<()> {
        self.inner.write_into(writer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_content() {
        let mut content = BytesContent::new(&b"payload"[..], "application/octet-stream");
        assert_eq!(content.length(), Some(7));
        assert_eq!(content.content_type(), "application/octet-stream");

        let mut buf = Vec::new();
        content.write_into(&mut buf).await.unwrap();
        assert_eq!(&buf, b"payload");
    }
}
