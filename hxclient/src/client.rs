/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::future::Future;
use std::io;
use std::time::Duration;

use http::Method;
use log::debug;
use tokio::io::AsyncWriteExt;
use url::Url;

use hx_http::HttpBodyDecodeState;
use hx_http::client::HttpResponseHead;
use hx_types::net::{Proxy, UpstreamAddr};

use crate::config::HttpClientConfig;
use crate::connection::{
    ConnectionIdentity, HttpConnection, ProgressWriter, establish,
};
use crate::content::{BytesContent, ContentProvider, FormContent, MultipartContent, StringContent};
use crate::cookie::CookieJar;
use crate::error::HttpClientError;
use crate::request::{RequestContentMeta, check_settable_header, generate_request_head};
use crate::response::{BODY_LINE_MAX_LEN, HttpResponse, is_redirect, redirect_target};

type ProgressCallback = Box<dyn FnMut(u64, Option<u64>) + Send>;

/// An HTTP/1.1 client holding one reusable connection.
///
/// Persistent state (headers, cookies, config) applies to every request.
/// The `with_*` builders stage state for the next request only and reset
/// once it is sent. Responses borrow the client, so the body must be
/// consumed or dropped before the next request goes out.
pub struct HttpClient {
    pub(crate) config: HttpClientConfig,
    headers: Vec<(String, String)>,
    cookies: CookieJar,
    pub(crate) connection: Option<HttpConnection>,
    redirect_count: u32,
    added_url_params: Vec<(String, String)>,
    added_params: Vec<(String, String)>,
    added_multipart: Option<MultipartContent>,
    added_headers: Vec<(String, String)>,
    upload_progress: Option<ProgressCallback>,
    pub(crate) download_progress: Option<ProgressCallback>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(HttpClientConfig::default())
    }
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Self {
        HttpClient {
            config,
            headers: Vec::new(),
            cookies: CookieJar::default(),
            connection: None,
            redirect_count: 0,
            added_url_params: Vec::new(),
            added_params: Vec::new(),
            added_multipart: None,
            added_headers: Vec::new(),
            upload_progress: None,
            download_progress: None,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut HttpClientConfig {
        &mut self.config
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Set a header for every following request.
    pub fn set_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Result<&mut Self, HttpClientError> {
        let name = name.as_ref();
        let value = value.into();
        check_settable_header(name, &value)?;
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(kv) => kv.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
        Ok(self)
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Add a query parameter for the next request only. Any parameters
    /// staged this way replace the query of the request url.
    pub fn with_url_param(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.added_url_params.push((name.into(), value.into()));
        self
    }

    /// Add a urlencoded form field for the next request only.
    pub fn with_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.added_params.push((name.into(), value.into()));
        self
    }

    /// Add a multipart text field for the next request only.
    pub fn with_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.added_multipart
            .get_or_insert_with(MultipartContent::new)
            .add_field(name, Box::new(StringContent::new(value.into())));
        self
    }

    /// Add a multipart file part for the next request only.
    pub fn with_file_part(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> &mut Self {
        self.added_multipart
            .get_or_insert_with(MultipartContent::new)
            .add_file_part(name, file_name, Box::new(BytesContent::new(data, content_type)));
        self
    }

    /// Add a header for the next request only. It wins over a persistent
    /// header of the same name.
    pub fn with_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Result<&mut Self, HttpClientError> {
        let name = name.as_ref();
        let value = value.into();
        check_settable_header(name, &value)?;
        self.added_headers.push((name.to_string(), value));
        Ok(self)
    }

    /// Report request bytes written so far and the expected total,
    /// headers included.
    pub fn on_upload_progress(&mut self, notify: impl FnMut(u64, Option<u64>) + Send + 'static) {
        self.upload_progress = Some(Box::new(notify));
    }

    /// Report body wire bytes received so far and the content length
    /// when the response announces one.
    pub fn on_download_progress(&mut self, notify: impl FnMut(u64, Option<u64>) + Send + 'static) {
        self.download_progress = Some(Box::new(notify));
    }

    pub async fn get(&mut self, url: &str) -> Result<HttpResponse<'_>, HttpClientError> {
        self.send(Method::GET, url, None).await
    }

    pub async fn head(&mut self, url: &str) -> Result<HttpResponse<'_>, HttpClientError> {
        self.send(Method::HEAD, url, None).await
    }

    /// POST with the staged form fields or multipart parts as the body.
    pub async fn post(&mut self, url: &str) -> Result<HttpResponse<'_>, HttpClientError> {
        self.send(Method::POST, url, None).await
    }

    pub async fn post_content(
        &mut self,
        url: &str,
        content: Box<dyn ContentProvider>,
    ) -> Result<HttpResponse<'_>, HttpClientError> {
        self.send(Method::POST, url, Some(content)).await
    }

    /// Send one request and follow redirects up to the configured limit.
    ///
    /// An explicit `content` wins over staged multipart parts, which win
    /// over staged form fields. Redirects are re-issued as GET without a
    /// body. A request on a reused connection that dies before the status
    /// line is retried once on a fresh one.
    pub async fn send(
        &mut self,
        method: Method,
        url: &str,
        content: Option<Box<dyn ContentProvider>>,
    ) -> Result<HttpResponse<'_>, HttpClientError> {
        let mut url = self.resolve_url(url)?;

        let url_params = std::mem::take(&mut self.added_url_params);
        let one_shot_headers = std::mem::take(&mut self.added_headers);
        let mut content = self.select_content(content);
        if !body_carrying(&method) {
            content = None;
        }

        if !url_params.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(url_params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            url.set_query(Some(&query));
        }

        let mut method = method;
        let mut trip_headers: &[(String, String)] = &one_shot_headers;
        self.redirect_count = 0;
        loop {
            let head = self
                .send_trip(&method, &url, &mut content, trip_headers)
                .await?;

            for line in &head.set_cookie {
                self.cookies.apply_set_cookie(line);
            }

            if head.code >= 400 && !self.config.ignore_protocol_errors {
                if let Some(conn) = self.connection.as_mut() {
                    conn.set_dirty();
                }
                if !head.keep_alive() {
                    self.connection = None;
                }
                return Err(HttpClientError::ProtocolError(head.code, head.reason));
            }

            if self.config.auto_redirect && is_redirect(&head) {
                if let Some(target) = redirect_target(&head, &url) {
                    self.redirect_count += 1;
                    if self.redirect_count > self.config.max_redirects {
                        if let Some(conn) = self.connection.as_mut() {
                            conn.set_dirty();
                        }
                        return Err(HttpClientError::TooManyRedirects);
                    }
                    match target.scheme() {
                        "http" | "https" => {}
                        _ => return Err(HttpClientError::InvalidUrl(target.to_string())),
                    }
                    self.drain_trip_body(&head, &method).await;
                    debug!("following {} redirect to {target}", head.code);
                    url = target;
                    method = Method::GET;
                    content = None;
                    trip_headers = &[];
                    continue;
                }
            }

            self.redirect_count = 0;
            return HttpResponse::new(self, head, url, &method);
        }
    }

    fn resolve_url(&self, url: &str) -> Result<Url, HttpClientError> {
        let resolved = match &self.config.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        }
        .map_err(|_| HttpClientError::InvalidUrl(url.to_string()))?;
        match resolved.scheme() {
            "http" | "https" => {}
            _ => return Err(HttpClientError::InvalidUrl(url.to_string())),
        }
        if resolved.host().is_none() {
            return Err(HttpClientError::InvalidUrl(url.to_string()));
        }
        Ok(resolved)
    }

    fn select_content(
        &mut self,
        explicit: Option<Box<dyn ContentProvider>>,
    ) -> Option<Box<dyn ContentProvider>> {
        let params = std::mem::take(&mut self.added_params);
        let multipart = self.added_multipart.take();
        if explicit.is_some() {
            return explicit;
        }
        if !params.is_empty() {
            return Some(Box::new(FormContent::new(params)));
        }
        if let Some(multipart) = multipart {
            if !multipart.is_empty() {
                return Some(Box::new(multipart));
            }
        }
        None
    }

    fn effective_proxy(&self, url: &Url) -> Option<&Proxy> {
        if self.config.disable_proxy_for_localhost && is_local_destination(url) {
            return None;
        }
        self.config
            .proxy
            .as_ref()
            .or(self.config.default_proxy.as_ref())
    }

    fn identity_for(
        &self,
        url: &Url,
    ) -> Result<(ConnectionIdentity, UpstreamAddr), HttpClientError> {
        let host = url
            .host()
            .ok_or_else(|| HttpClientError::InvalidUrl(url.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpClientError::InvalidUrl(url.to_string()))?;
        let target = UpstreamAddr::from_url_host_and_port(host.to_owned(), port);
        let identity = ConnectionIdentity {
            host: target.host().clone(),
            port,
            tls: url.scheme() == "https",
            proxy: self.effective_proxy(url).cloned(),
        };
        Ok((identity, target))
    }

    /// make sure a usable connection for this url is in place, telling
    /// apart a newly dialed one from a reused one
    async fn ensure_connection(&mut self, url: &Url) -> Result<bool, HttpClientError> {
        let (identity, target) = self.identity_for(url)?;
        if let Some(conn) = self.connection.as_mut() {
            if conn.is_reusable(&identity) {
                return Ok(false);
            }
        }
        self.connection = None;
        let conn = establish(&self.config, &target, identity).await?;
        self.connection = Some(conn);
        Ok(true)
    }

    async fn send_trip(
        &mut self,
        method: &Method,
        url: &Url,
        content: &mut Option<Box<dyn ContentProvider>>,
        one_shot_headers: &[(String, String)],
    ) -> Result<HttpResponseHead, HttpClientError> {
        let mut retried = false;
        loop {
            let fresh = self.ensure_connection(url).await?;
            match self.send_once(method, url, content, one_shot_headers).await {
                Ok(head) => return Ok(head),
                Err(e) => {
                    self.connection = None;
                    let reused_keep_alive = !fresh && self.config.keep_alive;
                    let retry = !retried
                        && ((e.is_send_failure() && reused_keep_alive)
                            || (e.is_recv_failure()
                                && (e.is_empty_response() || reused_keep_alive)));
                    if retry {
                        debug!("retrying request to {url} on a fresh connection after: {e}");
                        retried = true;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &mut self,
        method: &Method,
        url: &Url,
        content: &mut Option<Box<dyn ContentProvider>>,
        one_shot_headers: &[(String, String)],
    ) -> Result<HttpResponseHead, HttpClientError> {
        let proxy = self.effective_proxy(url).cloned();
        let meta = content.as_ref().map(|c| RequestContentMeta {
            content_type: c.content_type(),
            length: c.length(),
        });
        let head_bytes = generate_request_head(
            method,
            url,
            proxy.as_ref(),
            meta.as_ref(),
            &self.config,
            &self.headers,
            one_shot_headers,
            &self.cookies,
        );
        let upload_total = match &meta {
            Some(m) => m.length.map(|l| head_bytes.len() as u64 + l),
            None => Some(head_bytes.len() as u64),
        };

        let Some(conn) = self.connection.as_mut() else {
            return Err(HttpClientError::InvalidArgument(
                "request sent without a connection",
            ));
        };
        let notify = self.upload_progress.as_mut();

        write_request(
            conn,
            &head_bytes,
            content.as_mut(),
            notify,
            upload_total,
            self.config.write_timeout,
        )
        .await?;

        match tokio::time::timeout(
            self.config.read_timeout,
            HttpResponseHead::parse(
                &mut conn.reader,
                method,
                self.config.keep_alive,
                self.config.max_header_size,
            ),
        )
        .await
        {
            Ok(Ok(head)) => Ok(head),
            Ok(Err(e)) => Err(HttpClientError::RecvFailed(e)),
            Err(_) => Err(HttpClientError::RecvTimedOut),
        }
    }

    /// consume a redirect body so the connection stays reusable, tearing
    /// the connection down when that is not possible
    async fn drain_trip_body(&mut self, head: &HttpResponseHead, method: &Method) {
        if !head.keep_alive() {
            self.connection = None;
            return;
        }
        let Some(body_type) = head.body_type(method) else {
            return;
        };
        let read_timeout = self.config.read_timeout;
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let drained = {
            let mut state = HttpBodyDecodeState::new(body_type, BODY_LINE_MAX_LEN);
            let mut body_reader = state.reader(&mut conn.reader);
            let mut sink = tokio::io::sink();
            tokio::time::timeout(read_timeout, tokio::io::copy(&mut body_reader, &mut sink)).await
        };
        if !matches!(drained, Ok(Ok(_))) {
            self.connection = None;
        }
    }
}

/// the write timeout bounds each write operation on its own, a slow but
/// progressing upload does not trip it
async fn write_request(
    conn: &mut HttpConnection,
    head_bytes: &[u8],
    content: Option<&mut Box<dyn ContentProvider>>,
    notify: Option<&mut ProgressCallback>,
    upload_total: Option<u64>,
    write_timeout: Duration,
) -> Result<(), HttpClientError> {
    match notify {
        Some(notify) => {
            let mut writer =
                ProgressWriter::new(&mut conn.writer, 0, |n| notify(n, upload_total));
            timed_write(write_timeout, writer.write_all(head_bytes)).await?;
            if let Some(content) = content {
                timed_write(write_timeout, content.write_into(&mut writer)).await?;
            }
            timed_write(write_timeout, writer.flush()).await
        }
        None => {
            timed_write(write_timeout, conn.writer.write_all(head_bytes)).await?;
            if let Some(content) = content {
                timed_write(write_timeout, content.write_into(&mut conn.writer)).await?;
            }
            timed_write(write_timeout, conn.writer.flush()).await
        }
    }
}

async fn timed_write<F>(limit: Duration, op: F) -> Result<(), HttpClientError>
where
    F: Future<Output = io::Result<()>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HttpClientError::SendFailed(e)),
        Err(_) => Err(HttpClientError::SendTimedOut),
    }
}

fn body_carrying(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn is_local_destination(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn proxy(s: &str) -> Proxy {
        Proxy::try_from(&Url::from_str(s).unwrap()).unwrap()
    }

    #[test]
    fn resolve_relative_against_base() {
        let mut client = HttpClient::default();
        client
            .config_mut()
            .set_base_url(Url::from_str("http://example.com/api/").unwrap());
        let url = client.resolve_url("status?full=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com/api/status?full=1");

        let url = client.resolve_url("http://other.example/").unwrap();
        assert_eq!(url.as_str(), "http://other.example/");
    }

    #[test]
    fn reject_non_http_urls() {
        let client = HttpClient::default();
        assert!(matches!(
            client.resolve_url("ftp://example.com/"),
            Err(HttpClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            client.resolve_url("not a url"),
            Err(HttpClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn write_timeout_applies_per_operation() {
        let limit = Duration::from_millis(40);
        // three slow writes together exceed the limit, each one alone does not
        for _ in 0..3 {
            timed_write(limit, async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            })
            .await
            .unwrap();
        }

        let err = timed_write(limit, std::future::pending::<io::Result<()>>())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, HttpClientError::SendTimedOut));
    }

    #[test]
    fn content_selection_precedence() {
        let mut client = HttpClient::default();
        client.with_param("a", "1");
        client.with_field("b", "2");
        let content = client
            .select_content(Some(Box::new(StringContent::new("explicit"))))
            .unwrap();
        assert_eq!(content.content_type(), "text/plain");
        // staged state is consumed even when an explicit body wins
        assert!(client.added_params.is_empty());
        assert!(client.added_multipart.is_none());

        client.with_param("a", "1");
        client.with_field("b", "2");
        let content = client.select_content(None).unwrap();
        assert_eq!(content.content_type(), "application/x-www-form-urlencoded");

        client.with_field("b", "2");
        let content = client.select_content(None).unwrap();
        assert!(content.content_type().starts_with("multipart/form-data"));

        assert!(client.select_content(None).is_none());
    }

    #[test]
    fn proxy_disabled_for_localhost() {
        let mut client = HttpClient::default();
        client.config_mut().set_proxy(proxy("socks5://10.0.0.1"));
        client.config_mut().set_disable_proxy_for_localhost(true);

        let remote = Url::from_str("http://example.com/").unwrap();
        assert!(client.effective_proxy(&remote).is_some());

        for local in ["http://localhost:8080/", "http://127.0.0.1/", "http://[::1]/"] {
            let url = Url::from_str(local).unwrap();
            assert!(client.effective_proxy(&url).is_none(), "{local}");
        }
    }

    #[test]
    fn default_proxy_is_a_fallback() {
        let mut client = HttpClient::default();
        client
            .config_mut()
            .set_default_proxy(proxy("http://10.0.0.1:3128"));
        let url = Url::from_str("http://example.com/").unwrap();
        assert!(matches!(client.effective_proxy(&url), Some(Proxy::Http(_))));

        client.config_mut().set_proxy(proxy("socks5://10.0.0.2"));
        assert!(matches!(
            client.effective_proxy(&url),
            Some(Proxy::Socks5(_))
        ));
    }

    #[test]
    fn persistent_header_rules() {
        let mut client = HttpClient::default();
        client.set_header("User-Agent", "hx/0.1").unwrap();
        client.set_header("user-agent", "hx/0.2").unwrap();
        assert_eq!(client.headers.len(), 1);
        assert_eq!(client.headers[0].1, "hx/0.2");

        assert!(matches!(
            client.set_header("Host", "evil.example"),
            Err(HttpClientError::ReservedHeader(_))
        ));

        client.remove_header("USER-AGENT");
        assert!(client.headers.is_empty());
    }
}
