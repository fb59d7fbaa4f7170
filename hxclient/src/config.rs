/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::time::Duration;

use encoding_rs::Encoding;
use url::Url;

use hx_types::net::{HttpAuth, Proxy};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_REDIRECTS: u32 = 5;
const DEFAULT_MAX_HEADER_SIZE: usize = 65536;

pub struct HttpClientConfig {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) max_redirects: u32,
    pub(crate) max_header_size: usize,
    pub(crate) keep_alive: bool,
    pub(crate) auto_redirect: bool,
    pub(crate) ignore_protocol_errors: bool,
    pub(crate) enable_additional_headers: bool,
    pub(crate) accept_encoding: bool,
    pub(crate) language: Option<String>,
    pub(crate) charset: Option<&'static Encoding>,
    pub(crate) auth: HttpAuth,
    pub(crate) proxy: Option<Proxy>,
    pub(crate) default_proxy: Option<Proxy>,
    pub(crate) disable_proxy_for_localhost: bool,
    pub(crate) accept_invalid_certs: bool,
    pub(crate) base_url: Option<Url>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        HttpClientConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            keep_alive: true,
            auto_redirect: true,
            ignore_protocol_errors: false,
            enable_additional_headers: true,
            accept_encoding: true,
            language: None,
            charset: None,
            auth: HttpAuth::None,
            proxy: None,
            default_proxy: None,
            disable_proxy_for_localhost: false,
            accept_invalid_certs: true,
            base_url: None,
        }
    }
}

impl HttpClientConfig {
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    /// a limit of 0 makes any followed redirect a terminal error
    pub fn set_max_redirects(&mut self, max: u32) {
        self.max_redirects = max;
    }

    pub fn set_max_header_size(&mut self, max: usize) {
        self.max_header_size = max;
    }

    pub fn set_keep_alive(&mut self, enable: bool) {
        self.keep_alive = enable;
    }

    pub fn set_auto_redirect(&mut self, enable: bool) {
        self.auto_redirect = enable;
    }

    pub fn set_ignore_protocol_errors(&mut self, enable: bool) {
        self.ignore_protocol_errors = enable;
    }

    pub fn set_additional_headers(&mut self, enable: bool) {
        self.enable_additional_headers = enable;
    }

    pub fn set_accept_encoding(&mut self, enable: bool) {
        self.accept_encoding = enable;
    }

    /// language tag for the Accept-Language header, e.g. "de-DE"
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = Some(language.into());
    }

    /// fallback charset for response text decode when the response
    /// carries no charset parameter
    pub fn set_charset(&mut self, charset: &'static Encoding) {
        self.charset = Some(charset);
    }

    pub fn set_auth(&mut self, auth: HttpAuth) {
        self.auth = auth;
    }

    pub fn set_proxy(&mut self, proxy: Proxy) {
        self.proxy = Some(proxy);
    }

    /// used when no per-client proxy is set
    pub fn set_default_proxy(&mut self, proxy: Proxy) {
        self.default_proxy = Some(proxy);
    }

    pub fn set_disable_proxy_for_localhost(&mut self, disable: bool) {
        self.disable_proxy_for_localhost = disable;
    }

    pub fn set_accept_invalid_certs(&mut self, accept: bool) {
        self.accept_invalid_certs = accept;
    }

    /// relative request urls are resolved against this address
    pub fn set_base_url(&mut self, url: Url) {
        self.base_url = Some(url);
    }

    pub(crate) fn accept_language_value(&self) -> String {
        let name = self.language.as_deref().unwrap_or("en-US");
        if name.starts_with("en") {
            name.to_string()
        } else {
            let primary = name.get(..2).unwrap_or(name);
            format!("{name},{primary};q=0.8,en-US;q=0.6,en;q=0.4")
        }
    }

    pub(crate) fn accept_charset_value(&self) -> String {
        let charset = self.charset.unwrap_or(encoding_rs::UTF_8);
        if charset == encoding_rs::UTF_8 {
            "utf-8;q=0.7,*;q=0.3".to_string()
        } else {
            format!(
                "{},utf-8;q=0.7,*;q=0.3",
                charset.name().to_ascii_lowercase()
            )
        }
    }
}
