/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use url::Url;

use crate::auth::{AuthParseError, Password, Username};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum SocksAuth {
    #[default]
    None,
    User(Username, Password),
}

impl TryFrom<&Url> for SocksAuth {
    type Error = AuthParseError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        let u = url.username();
        if u.is_empty() {
            return Ok(SocksAuth::None);
        }
        let username = Username::from_encoded(u).map_err(|_| AuthParseError::InvalidUsername)?;
        let password = match url.password() {
            Some(p) => Password::from_encoded(p).map_err(|_| AuthParseError::InvalidPassword)?,
            None => Password::empty(),
        };
        Ok(SocksAuth::User(username, password))
    }
}
