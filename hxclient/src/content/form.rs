/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::ContentProvider;

/// application/x-www-form-urlencoded body built from key/value pairs
pub struct FormContent {
    encoded: Vec<u8>,
}

impl FormContent {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            serializer.append_pair(k.as_ref(), v.as_ref());
        }
        FormContent {
            encoded: serializer.finish().into_bytes(),
        }
    }

    /// take the values as already url encoded
    pub fn from_encoded<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut encoded = String::new();
        for (k, v) in pairs {
            if !encoded.is_empty() {
                encoded.push('&');
            }
            encoded.push_str(k.as_ref());
            encoded.push('=');
            encoded.push_str(v.as_ref());
        }
        FormContent {
            encoded: encoded.into_bytes(),
        }
    }
}

#[async_trait]
impl ContentProvider for FormContent {
    fn content_type(&self) -> String {
        "application/x-www-form-urlencoded".to_string()
    }

    fn length(&self) -> Option<u64> {
        Some(self.encoded.len() as u64)
    }

    async fn write_into(
        &mut self,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> io::Result<()> {
        writer.write_all(&self.encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encode_pairs() {
        let mut content = FormContent::new([("user", "max müller"), ("q", "a&b")]);
        let mut buf = Vec::new();
        content.write_into(&mut buf).await.unwrap();
        let body = String::from_utf8(buf).unwrap();
        assert_eq!(body, "user=max+m%C3%BCller&q=a%26b");
        assert_eq!(content.length(), Some(body.len() as u64));
    }

    #[tokio::test]
    async fn pre_encoded_pairs() {
        let mut content = FormContent::from_encoded([("a", "1"), ("b", "2")]);
        let mut buf = Vec::new();
        content.write_into(&mut buf).await.unwrap();
        assert_eq!(&buf, b"a=1&b=2");
    }
}
