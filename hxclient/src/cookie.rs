/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// In-memory cookie store shared by all requests of one client.
///
/// Both the processed name/value map and the raw Set-Cookie lines are kept,
/// so callers can inspect attributes the engine itself ignores.
#[derive(Default)]
pub struct CookieJar {
    values: BTreeMap<String, String>,
    raw: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.raw.get(name).map(|v| v.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.raw.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// render the Cookie request header value
    pub(crate) fn header_value(&self) -> String {
        let mut value = String::new();
        for (name, v) in &self.values {
            if !value.is_empty() {
                value.push_str("; ");
            }
            value.push_str(name);
            value.push('=');
            value.push_str(v);
        }
        value
    }

    /// apply one received Set-Cookie line
    ///
    /// The value is taken between the first `=` and the first `;`. An empty
    /// or literal "deleted" value removes the cookie, as does an `expires=`
    /// attribute lying in the past. Lines without `=` are ignored.
    pub(crate) fn apply_set_cookie(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let Some(sep) = line.find('=') else {
            return;
        };
        let name = &line[..sep];
        let rest = &line[sep + 1..];

        let value = match rest.find(';') {
            Some(end) => {
                if let Some(expires) = attribute_value(line, "expires=") {
                    if let Ok(when) = parse_http_date(expires) {
                        if when < Utc::now() {
                            self.values.remove(name);
                            self.raw.insert(name.to_string(), line.to_string());
                            return;
                        }
                    }
                }
                &rest[..end]
            }
            None => rest,
        };

        if value.is_empty() || value.eq_ignore_ascii_case("deleted") {
            self.values.remove(name);
        } else {
            self.values.insert(name.to_string(), value.to_string());
        }
        self.raw.insert(name.to_string(), line.to_string());
    }
}

fn attribute_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let lower = line.to_ascii_lowercase();
    let start = lower.find(key)? + key.len();
    let rest = &line[start..];
    match rest.find(';') {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

fn parse_http_date(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc2822(s.trim()).map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_render() {
        let mut jar = CookieJar::default();
        jar.apply_set_cookie("sid=abc123; Path=/; HttpOnly");
        jar.apply_set_cookie("lang=en");
        assert_eq!(jar.get("sid"), Some("abc123"));
        assert_eq!(jar.get_raw("sid"), Some("sid=abc123; Path=/; HttpOnly"));
        assert_eq!(jar.header_value(), "lang=en; sid=abc123");
    }

    #[test]
    fn deleted_value_removes() {
        let mut jar = CookieJar::default();
        jar.apply_set_cookie("sid=abc123");
        jar.apply_set_cookie("sid=deleted");
        assert!(jar.get("sid").is_none());

        jar.apply_set_cookie("sid=abc123");
        jar.apply_set_cookie("sid=");
        assert!(jar.get("sid").is_none());
    }

    #[test]
    fn past_expires_removes() {
        let mut jar = CookieJar::default();
        jar.apply_set_cookie("sid=abc123");
        jar.apply_set_cookie("sid=new; expires=Wed, 01 Jan 2020 00:00:00 GMT; Path=/");
        assert!(jar.get("sid").is_none());
    }

    #[test]
    fn future_expires_keeps() {
        let mut jar = CookieJar::default();
        jar.apply_set_cookie("sid=abc123; expires=Fri, 01 Jan 2100 00:00:00 GMT");
        assert_eq!(jar.get("sid"), Some("abc123"));
    }
}
