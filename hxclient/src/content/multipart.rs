/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::ContentProvider;
use crate::HttpClientError;

const MAX_BOUNDARY_LEN: usize = 70;

struct Part {
    name: String,
    file_name: Option<String>,
    content: Box<dyn ContentProvider>,
}

impl Part {
    fn header(&self, boundary: &str) -> String {
        match &self.file_name {
            Some(file_name) => format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.name,
                file_name,
                self.content.content_type()
            ),
            None => format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                self.name
            ),
        }
    }
}

/// multipart/form-data body assembled from field and file parts
pub struct MultipartContent {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartContent {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartContent {
    /// use a random "----------------XXXXXXXXXXXXXXXX" boundary
    pub fn new() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        MultipartContent {
            boundary: format!("----------------{suffix}"),
            parts: Vec::new(),
        }
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Result<Self, HttpClientError> {
        let boundary = boundary.into();
        if boundary.is_empty() {
            return Err(HttpClientError::InvalidArgument("empty multipart boundary"));
        }
        if boundary.len() > MAX_BOUNDARY_LEN {
            return Err(HttpClientError::InvalidArgument(
                "multipart boundary longer than 70 characters",
            ));
        }
        Ok(MultipartContent {
            boundary,
            parts: Vec::new(),
        })
    }

    pub fn add_field(&mut self, name: impl Into<String>, content: Box<dyn ContentProvider>) {
        self.parts.push(Part {
            name: name.into(),
            file_name: None,
            content,
        });
    }

    pub fn add_file_part(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content: Box<dyn ContentProvider>,
    ) {
        self.parts.push(Part {
            name: name.into(),
            file_name: Some(file_name.into()),
            content,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[async_trait]
impl ContentProvider for MultipartContent {
    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn length(&self) -> Option<u64> {
        let mut total = 0u64;
        for part in &self.parts {
            total += part.header(&self.boundary).len() as u64;
            total += part.content.length()?;
            total += 2; // trailing \r\n
        }
        // closing "--boundary--\r\n"
        total += self.boundary.len() as u64 + 6;
        Some(total)
    }

    async fn write_into(
        &mut self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> io::Result<()> {
        let boundary = self.boundary.clone();
        for part in &mut self.parts {
            let header = part.header(&boundary);
            writer.write_all(header.as_bytes()).await?;
            part.content.write_into(writer).await?;
            writer.write_all(b"\r\n").await?;
        }
        writer
            .write_all(format!("--{boundary}--\r\n").as_bytes())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{BytesContent, StringContent};

    #[tokio::test]
    async fn two_parts() {
        let mut content = MultipartContent::with_boundary("XyZ").unwrap();
        content.add_field("note", Box::new(StringContent::new("hello")));
        content.add_file_part(
            "upload",
            "a.bin",
            Box::new(BytesContent::new(&b"\x00\x01"[..], "application/octet-stream")),
        );

        assert_eq!(content.content_type(), "multipart/form-data; boundary=XyZ");

        let mut buf = Vec::new();
        content.write_into(&mut buf).await.unwrap();
        let expected = b"--XyZ\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\r\n\
            hello\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.bin\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            \x00\x01\r\n\
            --XyZ--\r\n";
        assert_eq!(buf, expected);
        assert_eq!(content.length(), Some(buf.len() as u64));
    }

    #[test]
    fn boundary_limits() {
        assert!(MultipartContent::with_boundary("").is_err());
        assert!(MultipartContent::with_boundary("b".repeat(71)).is_err());
        let random = MultipartContent::new();
        assert_eq!(random.boundary.len(), 32);
    }
}
