/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx project authors.
 */

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use hxclient::{HttpClient, HttpClientError};

struct Request {
    head: String,
    body: Vec<u8>,
}

impl Request {
    fn path(&self) -> &str {
        self.head.split(' ').nth(1).unwrap()
    }

    fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}:").to_ascii_lowercase();
        self.head.lines().find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower.strip_prefix(&prefix)?;
            Some(line[prefix.len()..].trim())
        })
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(p) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break p + 4;
        }
        let nr = stream.read(&mut chunk).await.unwrap();
        if nr == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..nr]);
    };
    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();

    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().unwrap())
        })
        .unwrap_or(0);
    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let nr = stream.read(&mut chunk).await.unwrap();
        assert_ne!(nr, 0, "client closed mid body");
        body.extend_from_slice(&chunk[..nr]);
    }

    Some(Request { head, body })
}

/// serve each accepted connection with the handler until the client
/// closes it, counting accepted connections
async fn spawn_server<F>(handler: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(Request) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::Relaxed);
            let handler = handler.clone();
            tokio::spawn(async move {
                while let Some(req) = read_request(&mut stream).await {
                    let rsp = handler(req);
                    if stream.write_all(&rsp).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (format!("http://{addr}"), accepted)
}

fn text_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\n\
        Content-Type: text/plain\r\n\
        Content-Length: {}\r\n\
        Connection: keep-alive\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

#[tokio::test]
async fn content_length_body_read_once() {
    let (base, _) = spawn_server(|_| text_response("hello")).await;

    let mut client = HttpClient::default();
    let mut rsp = client.get(&base).await.unwrap();
    assert_eq!(rsp.status(), 200);
    assert_eq!(rsp.content_type(), Some("text/plain"));

    let header_size = rsp.header_size() as u64;
    let text = rsp.text().await.unwrap();
    assert_eq!(text, "hello");
    assert_eq!(rsp.wire_received(), header_size + 5);

    // the body is gone after the first read
    let again = rsp.bytes().await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn chunked_body_counts_framing() {
    let framed = "4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
    let rsp_bytes = format!(
        "HTTP/1.1 200 OK\r\n\
        Transfer-Encoding: chunked\r\n\
        Connection: keep-alive\r\n\r\n{framed}"
    )
    .into_bytes();
    let (base, _) = spawn_server(move |_| rsp_bytes.clone()).await;

    let mut client = HttpClient::default();
    let mut rsp = client.get(&base).await.unwrap();
    let header_size = rsp.header_size() as u64;
    let body = rsp.bytes().await.unwrap();
    assert_eq!(&body[..], b"Wikipedia");
    assert_eq!(rsp.wire_received(), header_size + framed.len() as u64);
}

#[tokio::test]
async fn gzip_body_is_decompressed() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"hello gzip").unwrap();
    let compressed = encoder.finish().unwrap();
    let compressed_len = compressed.len();

    let rsp_bytes = {
        let mut head = format!(
            "HTTP/1.1 200 OK\r\n\
            Content-Encoding: gzip\r\n\
            Content-Length: {compressed_len}\r\n\
            Connection: keep-alive\r\n\r\n"
        )
        .into_bytes();
        head.extend_from_slice(&compressed);
        head
    };
    let (base, _) = spawn_server(move |_| rsp_bytes.clone()).await;

    let mut client = HttpClient::default();
    let mut rsp = client.get(&base).await.unwrap();
    let header_size = rsp.header_size() as u64;
    let body = rsp.bytes().await.unwrap();
    assert_eq!(&body[..], b"hello gzip");
    // wire accounting sees the compressed bytes, not the decoded ones
    assert_eq!(rsp.wire_received(), header_size + compressed_len as u64);
}

#[tokio::test]
async fn redirect_is_followed_as_get() {
    let (base, accepted) = spawn_server(|req| match req.path() {
        "/start" => b"HTTP/1.1 302 Found\r\n\
            Location: /next\r\n\
            Content-Length: 0\r\n\
            Connection: keep-alive\r\n\r\n"
            .to_vec(),
        "/next" => {
            assert!(req.head.starts_with("GET /next"));
            text_response("landed")
        }
        other => panic!("unexpected path {other}"),
    })
    .await;

    let mut client = HttpClient::default();
    // a POST body must not survive the redirect
    client.with_param("a", "1");
    let mut rsp = client.post(&format!("{base}/start")).await.unwrap();
    assert_eq!(rsp.status(), 200);
    assert_eq!(rsp.request_url().path(), "/next");
    assert_eq!(rsp.text().await.unwrap(), "landed");
    drop(rsp);

    // both trips fit on the one keep-alive connection
    assert_eq!(accepted.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn redirect_loop_is_cut_off() {
    let (base, _) = spawn_server(|_| {
        b"HTTP/1.1 302 Found\r\n\
            Location: /loop\r\n\
            Content-Length: 0\r\n\
            Connection: keep-alive\r\n\r\n"
            .to_vec()
    })
    .await;

    let mut client = HttpClient::default();
    client.config_mut().set_max_redirects(2);
    let err = client.get(&base).await.err().unwrap();
    assert!(matches!(err, HttpClientError::TooManyRedirects));
}

#[tokio::test]
async fn zero_redirect_limit_rejects_the_first_redirect() {
    let (base, _) = spawn_server(|req| match req.path() {
        "/start" => b"HTTP/1.1 302 Found\r\n\
            Location: /next\r\n\
            Content-Length: 0\r\n\
            Connection: keep-alive\r\n\r\n"
            .to_vec(),
        _ => text_response("should not be reached"),
    })
    .await;

    let mut client = HttpClient::default();
    client.config_mut().set_max_redirects(0);
    let err = client.get(&format!("{base}/start")).await.err().unwrap();
    assert!(matches!(err, HttpClientError::TooManyRedirects));
}

#[tokio::test]
async fn protocol_errors_surface_unless_ignored() {
    let (base, _) = spawn_server(|_| {
        b"HTTP/1.1 404 Not Found\r\n\
            Content-Length: 0\r\n\
            Connection: keep-alive\r\n\r\n"
            .to_vec()
    })
    .await;

    let mut client = HttpClient::default();
    let err = client.get(&base).await.err().unwrap();
    assert!(matches!(err, HttpClientError::ProtocolError(404, _)));

    client.config_mut().set_ignore_protocol_errors(true);
    let rsp = client.get(&base).await.unwrap();
    assert_eq!(rsp.status(), 404);
}

#[tokio::test]
async fn keep_alive_connection_is_reused() {
    let (base, accepted) = spawn_server(|_| text_response("ok")).await;

    let mut client = HttpClient::default();
    for _ in 0..3 {
        let mut rsp = client.get(&base).await.unwrap();
        assert_eq!(rsp.text().await.unwrap(), "ok");
    }
    assert_eq!(accepted.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn new_host_forces_a_new_connection() {
    let (base1, accepted1) = spawn_server(|_| text_response("one")).await;
    let (base2, accepted2) = spawn_server(|_| text_response("two")).await;

    let mut client = HttpClient::default();
    for _ in 0..2 {
        let mut rsp = client.get(&base1).await.unwrap();
        assert_eq!(rsp.text().await.unwrap(), "one");
    }
    let mut rsp = client.get(&base2).await.unwrap();
    assert_eq!(rsp.text().await.unwrap(), "two");

    assert_eq!(accepted1.load(Ordering::Relaxed), 1);
    assert_eq!(accepted2.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn unread_body_forces_a_fresh_connection() {
    let (base, accepted) = spawn_server(|_| text_response("leftover")).await;

    let mut client = HttpClient::default();
    {
        let rsp = client.get(&base).await.unwrap();
        assert_eq!(rsp.status(), 200);
        // dropped with the body still on the wire
    }
    let mut rsp = client.get(&base).await.unwrap();
    assert_eq!(rsp.text().await.unwrap(), "leftover");
    assert_eq!(accepted.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn empty_response_is_retried_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // first connection: read the request, then close without answering
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await.unwrap();
        drop(stream);

        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await.unwrap();
        stream.write_all(&text_response("second try")).await.unwrap();
    });

    let mut client = HttpClient::default();
    let mut rsp = client.get(&format!("http://{addr}")).await.unwrap();
    assert_eq!(rsp.text().await.unwrap(), "second try");
}

#[tokio::test]
async fn form_post_sends_encoded_fields() {
    let (base, _) = spawn_server(|req| {
        assert!(req.head.starts_with("POST /submit"));
        assert_eq!(
            req.header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(req.header("Content-Length"), Some("7"));
        assert_eq!(&req.body, b"a=1&b=2");
        text_response("accepted")
    })
    .await;

    let mut client = HttpClient::default();
    client.with_param("a", "1").with_param("b", "2");
    let mut rsp = client.post(&format!("{base}/submit")).await.unwrap();
    assert_eq!(rsp.text().await.unwrap(), "accepted");
}

#[tokio::test]
async fn one_shot_state_resets_after_send() {
    let (base, _) = spawn_server(|req| {
        if req.path().starts_with("/first") {
            assert_eq!(req.path(), "/first?tag=x");
            assert_eq!(req.header("X-Once"), Some("yes"));
        } else {
            assert_eq!(req.path(), "/second");
            assert_eq!(req.header("X-Once"), None);
        }
        text_response("ok")
    })
    .await;

    let mut client = HttpClient::default();
    client.with_url_param("tag", "x");
    client.with_header("X-Once", "yes").unwrap();
    let mut rsp = client.get(&format!("{base}/first")).await.unwrap();
    rsp.skip().await.unwrap();
    drop(rsp);

    let mut rsp = client.get(&format!("{base}/second")).await.unwrap();
    assert_eq!(rsp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn cookies_are_stored_and_replayed() {
    let (base, _) = spawn_server(|req| match req.path() {
        "/login" => b"HTTP/1.1 200 OK\r\n\
            Set-Cookie: sid=abc123; Path=/\r\n\
            Content-Length: 0\r\n\
            Connection: keep-alive\r\n\r\n"
            .to_vec(),
        _ => {
            assert_eq!(req.header("Cookie"), Some("sid=abc123"));
            text_response("ok")
        }
    })
    .await;

    let mut client = HttpClient::default();
    let rsp = client.get(&format!("{base}/login")).await.unwrap();
    drop(rsp);
    assert_eq!(client.cookies().get("sid"), Some("abc123"));

    let mut rsp = client.get(&format!("{base}/page")).await.unwrap();
    assert_eq!(rsp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn download_progress_reports_wire_bytes() {
    let (base, _) = spawn_server(|_| text_response("0123456789")).await;

    let progress = Arc::new(AtomicUsize::new(0));
    let seen = progress.clone();
    let mut client = HttpClient::default();
    client.on_download_progress(move |received, total| {
        assert_eq!(total, Some(10));
        seen.store(received as usize, Ordering::Relaxed);
    });

    let mut rsp = client.get(&base).await.unwrap();
    rsp.skip().await.unwrap();
    assert_eq!(progress.load(Ordering::Relaxed), 10);
}
