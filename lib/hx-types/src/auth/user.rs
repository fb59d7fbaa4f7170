/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use thiserror::Error;

// the SOCKS user/pass sub-negotiation carries a single length byte
const USERNAME_MAX_LENGTH: usize = u8::MAX as usize;
const PASSWORD_MAX_LENGTH: usize = u8::MAX as usize;

#[derive(Debug, Error)]
pub enum UserParseError {
    #[error("string too long")]
    TooLong,
    #[error("colon character is not allowed")]
    ColonCharFound,
    #[error("percent decode failed")]
    PercentDecodeFailed,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Username {
    inner: String,
    len: u8,
}

impl Username {
    pub fn empty() -> Self {
        Username::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn from_original(s: &str) -> Result<Self, UserParseError> {
        if s.len() > USERNAME_MAX_LENGTH {
            return Err(UserParseError::TooLong);
        }
        if s.contains(':') {
            return Err(UserParseError::ColonCharFound);
        }
        Ok(Username {
            inner: s.to_string(),
            len: s.len() as u8,
        })
    }

    pub fn from_encoded(s: &str) -> Result<Self, UserParseError> {
        let decoded = percent_encoding::percent_decode_str(s)
            .decode_utf8()
            .map_err(|_| UserParseError::PercentDecodeFailed)?;
        Username::from_original(decoded.as_ref())
    }

    pub fn as_original(&self) -> &str {
        &self.inner
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Password {
    inner: String,
    len: u8,
}

impl Password {
    pub fn empty() -> Self {
        Password::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn from_original(s: &str) -> Result<Self, UserParseError> {
        if s.len() > PASSWORD_MAX_LENGTH {
            return Err(UserParseError::TooLong);
        }
        Ok(Password {
            inner: s.to_string(),
            len: s.len() as u8,
        })
    }

    pub fn from_encoded(s: &str) -> Result<Self, UserParseError> {
        let decoded = percent_encoding::percent_decode_str(s)
            .decode_utf8()
            .map_err(|_| UserParseError::PercentDecodeFailed)?;
        Password::from_original(decoded.as_ref())
    }

    pub fn as_original(&self) -> &str {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_reject_colon() {
        assert!(Username::from_original("a:b").is_err());
    }

    #[test]
    fn username_encoded() {
        let u = Username::from_encoded("a%40b").unwrap();
        assert_eq!(u.as_original(), "a@b");
        assert_eq!(u.len(), 3);
    }

    #[test]
    fn password_length_limit() {
        let long = "x".repeat(256);
        assert!(Password::from_original(&long).is_err());
        let max = "x".repeat(255);
        assert_eq!(Password::from_original(&max).unwrap().len(), 255);
    }
}
