//! Drives the per-connection state machine over an in-memory stream

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use webserver::config::ConnectionLimits;
use webserver::http::connection::{Connection, HeaderTimeout, is_peer_error};
use webserver::http::resolve::ServedRoot;

const NOT_FOUND: &[u8] = b"HTTP/1.0 404 Not Found\r\nContent-type: text/html\r\n\r\n\
<html><head><title>Error 404</title></head><body>Not Found</body></html>";

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>It works</h1>\n").unwrap();
    fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    fs::write(dir.path().join("data.bin"), [1u8, 2, 3]).unwrap();
    dir
}

fn spawn_connection(
    root: &Path,
    limits: ConnectionLimits,
) -> (DuplexStream, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let root = Arc::new(ServedRoot::new(root).unwrap());
    let handle = tokio::spawn(async move {
        let mut conn = Connection::new(server, root, limits);
        conn.run().await
    });
    (client, handle)
}

async fn exchange(root: &Path, request: &[u8]) -> Vec<u8> {
    let (mut client, handle) = spawn_connection(root, ConnectionLimits::default());
    client.write_all(request).await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap().unwrap();
    out
}

fn split(response: &[u8]) -> (String, &[u8]) {
    let end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no blank line after headers");
    let head = String::from_utf8(response[..end + 4].to_vec()).unwrap();
    (head, &response[end + 4..])
}

#[tokio::test]
async fn test_serves_existing_file() {
    let dir = site();
    let out = exchange(
        dir.path(),
        b"GET /index.html HTTP/1.0\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n",
    )
    .await;

    let (head, body) = split(&out);
    assert_eq!(head, "HTTP/1.0 200 OK\r\nContent-type: text/html\r\n\r\n");
    assert_eq!(body, b"<h1>It works</h1>\n");
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let dir = site();
    let out = exchange(dir.path(), b"GET /nope.txt HTTP/1.0\r\n\r\n").await;

    assert_eq!(out, NOT_FOUND);
}

#[tokio::test]
async fn test_content_type_follows_suffix() {
    let dir = site();

    let out = exchange(dir.path(), b"GET /logo.png HTTP/1.0\r\n\r\n").await;
    let (head, body) = split(&out);
    assert_eq!(head, "HTTP/1.0 200 OK\r\nContent-type: image/png\r\n\r\n");
    assert_eq!(body, [0x89, b'P', b'N', b'G']);

    let out = exchange(dir.path(), b"GET /data.bin HTTP/1.0\r\n\r\n").await;
    let (head, _) = split(&out);
    assert_eq!(
        head,
        "HTTP/1.0 200 OK\r\nContent-type: application/octet-stream\r\n\r\n"
    );
}

#[tokio::test]
async fn test_accepts_bare_lf_line_endings() {
    let dir = site();
    let out = exchange(dir.path(), b"GET /index.html HTTP/1.0\nHost: x\n\n").await;

    let (head, body) = split(&out);
    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
    assert_eq!(body, b"<h1>It works</h1>\n");
}

#[tokio::test]
async fn test_method_is_not_validated() {
    let dir = site();
    let out = exchange(dir.path(), b"POST /index.html HTTP/1.0\r\n\r\n").await;

    let (head, body) = split(&out);
    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
    assert_eq!(body, b"<h1>It works</h1>\n");
}

#[tokio::test]
async fn test_end_of_input_ends_header_block() {
    let dir = site();
    let (mut client, handle) = spawn_connection(dir.path(), ConnectionLimits::default());

    client.write_all(b"GET /index.html HTTP/1.0\r\nHost: x\r\n").await.unwrap();
    client.shutdown().await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap().unwrap();

    let (head, _) = split(&out);
    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
}

#[tokio::test]
async fn test_streams_large_file_intact() {
    let dir = site();
    let content: Vec<u8> = (0..10 * 1024 * 1024u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8)
        .collect();
    fs::write(dir.path().join("big.bin"), &content).unwrap();

    let out = exchange(dir.path(), b"GET /big.bin HTTP/1.0\r\n\r\n").await;

    let (head, body) = split(&out);
    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
    assert_eq!(body.len(), content.len());
    assert!(body == &content[..]);
}

#[tokio::test]
async fn test_single_token_request_is_400() {
    let dir = site();
    let out = exchange(dir.path(), b"GARBAGE\r\n\r\n").await;

    let (head, body) = split(&out);
    assert_eq!(head, "HTTP/1.0 400 Bad Request\r\nContent-type: text/html\r\n\r\n");
    assert_eq!(
        body,
        b"<html><head><title>Error 400</title></head><body>Bad Request</body></html>"
    );
}

#[tokio::test]
async fn test_overlong_line_is_400() {
    let dir = site();
    let limits = ConnectionLimits {
        max_line_len: 64,
        ..ConnectionLimits::default()
    };
    let (mut client, handle) = spawn_connection(dir.path(), limits);

    let request = format!("GET /{} HTTP/1.0\r\n\r\n", "a".repeat(200));
    client.write_all(request.as_bytes()).await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap().unwrap();

    let (head, _) = split(&out);
    assert!(head.starts_with("HTTP/1.0 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_empty_connection_gets_no_response() {
    let dir = site();
    let (mut client, handle) = spawn_connection(dir.path(), ConnectionLimits::default());

    client.shutdown().await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap().unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_header_timeout_drops_connection() {
    let dir = site();
    let limits = ConnectionLimits {
        header_timeout: Duration::from_millis(100),
        ..ConnectionLimits::default()
    };
    let (mut client, handle) = spawn_connection(dir.path(), limits);

    client.write_all(b"GET /index.html HTTP/1.0\r\n").await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    assert!(out.is_empty());

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(
        err.downcast_ref::<HeaderTimeout>(),
        Some(&HeaderTimeout(Duration::from_millis(100)))
    );
    assert!(is_peer_error(&err));
}

#[test]
fn test_peer_errors_are_told_apart_from_handler_errors() {
    let reset = anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
    assert!(is_peer_error(&reset));

    let pipe = anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        .context("writing body");
    assert!(is_peer_error(&pipe));

    let denied = anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
    assert!(!is_peer_error(&denied));
    assert!(!is_peer_error(&anyhow::anyhow!("handler bug")));
}

#[tokio::test]
async fn test_other_file_failure_is_500() {
    let dir = site();
    let request = format!("GET /{}.txt HTTP/1.0\r\n\r\n", "x".repeat(300));
    let out = exchange(dir.path(), request.as_bytes()).await;

    let (head, body) = split(&out);
    assert_eq!(
        head,
        "HTTP/1.0 500 Internal Server Error\r\nContent-type: text/html\r\n\r\n"
    );
    assert_eq!(
        body,
        b"<html><head><title>Error 500</title></head><body>Internal Server Error</body></html>"
    );
}

#[tokio::test]
async fn test_percent_encoded_target_is_decoded() {
    let dir = site();
    fs::write(dir.path().join("a b.txt"), "spaced").unwrap();

    let out = exchange(dir.path(), b"GET /a%20b.txt HTTP/1.0\r\n\r\n").await;

    let (head, body) = split(&out);
    assert_eq!(head, "HTTP/1.0 200 OK\r\nContent-type: text/plain\r\n\r\n");
    assert_eq!(body, b"spaced");
}

#[tokio::test]
async fn test_index_links_are_followable() {
    let dir = site();
    fs::write(dir.path().join("a b#1?.txt"), "odd name").unwrap();

    let out = exchange(dir.path(), b"GET / HTTP/1.0\r\n\r\n").await;
    let (_, body) = split(&out);
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("<a href=\"/a%20b%231%3F.txt\">a b#1?.txt</a>"));

    let out = exchange(dir.path(), b"GET /a%20b%231%3F.txt HTTP/1.0\r\n\r\n").await;
    assert_eq!(split(&out).1, b"odd name");
}

#[tokio::test]
async fn test_encoded_traversal_is_403() {
    let outer = tempfile::tempdir().unwrap();
    fs::write(outer.path().join("secret.txt"), "secret").unwrap();
    fs::create_dir(outer.path().join("www")).unwrap();

    let out = exchange(
        &outer.path().join("www"),
        b"GET /%2e%2e/secret.txt HTTP/1.0\r\n\r\n",
    )
    .await;

    assert!(out.starts_with(b"HTTP/1.0 403 Forbidden\r\n"));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_non_utf8_file_name_is_reachable() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = site();
    fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "latin-1").unwrap();

    let raw = exchange(dir.path(), b"GET /caf\xe9.txt HTTP/1.0\r\n\r\n").await;
    assert_eq!(split(&raw).1, b"latin-1");

    let encoded = exchange(dir.path(), b"GET /caf%E9.txt HTTP/1.0\r\n\r\n").await;
    assert_eq!(split(&encoded).1, b"latin-1");

    let index = exchange(dir.path(), b"GET / HTTP/1.0\r\n\r\n").await;
    let page = String::from_utf8(split(&index).1.to_vec()).unwrap();
    assert!(page.contains("<a href=\"/caf%E9.txt\">"));
}

#[tokio::test]
async fn test_traversal_is_403() {
    let outer = tempfile::tempdir().unwrap();
    fs::write(outer.path().join("secret.txt"), "secret").unwrap();
    fs::create_dir(outer.path().join("www")).unwrap();

    let out = exchange(&outer.path().join("www"), b"GET /../secret.txt HTTP/1.0\r\n\r\n").await;

    let (head, body) = split(&out);
    assert_eq!(head, "HTTP/1.0 403 Forbidden\r\nContent-type: text/html\r\n\r\n");
    assert!(!String::from_utf8_lossy(body).contains("secret"));
}

#[tokio::test]
async fn test_directory_gets_index_page() {
    let dir = site();
    let out = exchange(dir.path(), b"GET / HTTP/1.0\r\n\r\n").await;

    let (head, body) = split(&out);
    assert_eq!(head, "HTTP/1.0 200 OK\r\nContent-type: text/html\r\n\r\n");
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("<a href=\"/index.html\">index.html</a>"));
    assert!(body.contains("<a href=\"/logo.png\">logo.png</a>"));
}

#[tokio::test]
async fn test_read_request_collects_headers() {
    let dir = site();
    let (mut client, server) = tokio::io::duplex(1024);
    let root = Arc::new(ServedRoot::new(dir.path()).unwrap());
    let mut conn = Connection::new(server, root, ConnectionLimits::default());

    client
        .write_all(b"GET /a HTTP/1.0\r\nHost: h\r\nAccept: */*\r\n\r\n")
        .await
        .unwrap();

    let req = conn.read_request().await.unwrap().unwrap();
    assert_eq!(req.target, "/a");
    assert_eq!(req.header_lines, vec!["Host: h", "Accept: */*"]);
    assert_eq!(req.header("accept"), Some("*/*"));
}
