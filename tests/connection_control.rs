//! Abrupt close, raw replacement and connection timeouts.

mod common;

use std::time::{Duration, Instant};

use common::{client, quiet_config, raw_exchange, spawn_server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn empty_closes_without_a_response() {
    let server = spawn_server(quiet_config()).await;

    let received = raw_exchange(
        server.addr,
        b"GET /?empty=true HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;
    assert!(received.is_empty(), "got {:?}", String::from_utf8_lossy(&received));
}

#[tokio::test]
async fn empty_is_seen_as_a_transport_error() {
    let server = spawn_server(quiet_config()).await;
    assert!(client().get(server.url("/?empty=true")).send().await.is_err());
}

#[tokio::test]
async fn replace_writes_body_verbatim() {
    let server = spawn_server(quiet_config()).await;

    let body = br"a\nb\nc";
    let request = format!(
        "POST /?replace=true HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let mut bytes = request.into_bytes();
    bytes.extend_from_slice(body);

    let received = raw_exchange(server.addr, &bytes).await;
    assert_eq!(received, b"a\nb\nc\n");
}

#[tokio::test]
async fn hijack_is_an_alias_for_replace() {
    let server = spawn_server(quiet_config()).await;

    let body = br"HTTP/1.1 299 Whatever\nX-Forged: 1\n";
    let request = format!(
        "PUT /?hijack=true HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let mut bytes = request.into_bytes();
    bytes.extend_from_slice(body);

    let received = raw_exchange(server.addr, &bytes).await;
    assert_eq!(received, b"HTTP/1.1 299 Whatever\nX-Forged: 1\n\n");
}

#[tokio::test]
async fn takeover_does_not_persist() {
    let server = spawn_server(quiet_config()).await;

    raw_exchange(server.addr, b"GET /?empty=true HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    let response = client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn keep_alive_serves_several_requests() {
    let server = spawn_server(quiet_config()).await;
    let mut socket = TcpStream::connect(server.addr).await.unwrap();

    for code in ["201", "202"] {
        let request = format!("GET /?code={code} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        socket.write_all(request.as_bytes()).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = socket.read(&mut buf).await.unwrap();
        let head = String::from_utf8_lossy(&buf[..n]);
        assert!(head.starts_with(&format!("HTTP/1.1 {code}")), "got {head:?}");
    }
}

#[tokio::test]
async fn idle_connections_are_closed() {
    let mut config = quiet_config();
    config.timeouts.idle_ms = 200;
    let server = spawn_server(config).await;

    let mut socket = TcpStream::connect(server.addr).await.unwrap();
    let started = Instant::now();
    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut received))
        .await
        .expect("idle connection was not closed")
        .ok();

    assert!(received.is_empty() || received.starts_with(b"HTTP/1.1 408"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn long_delay_survives_idle_timeout() {
    let mut config = quiet_config();
    config.timeouts.idle_ms = 100;
    let server = spawn_server(config).await;

    let response = client().get(server.url("/?delay=400")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn write_timeout_bounds_slow_responses() {
    let mut config = quiet_config();
    config.timeouts.write_ms = 200;
    let server = spawn_server(config).await;

    let started = Instant::now();
    let result = client().get(server.url("/?delay=2000")).send().await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_millis(1500));
}
