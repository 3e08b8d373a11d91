//! End-to-end session scenarios, driven over a real TCP connection against a
//! server bound to an ephemeral port.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use engineio::{Config, Event, Server};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;

async fn spawn_server(config: Config) -> (SocketAddr, Arc<Server>, UnboundedReceiver<Event>) {
    let (server, events) = Server::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let accept_server = Arc::clone(&server);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };

            let io = TokioIo::new(stream);
            let server = Arc::clone(&accept_server);
            let service = service_fn(move |request| {
                let server = Arc::clone(&server);
                async move { Ok::<_, Infallible>(server.handle(request).await) }
            });

            tokio::spawn(async move {
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    (addr, server, events)
}

/// A bare-bones HTTP/1.1 client: writes one request over a fresh connection
/// and reads the response until the server closes it (`Connection: close`
/// makes that an unambiguous end-of-response signal).
async fn request(addr: SocketAddr, method: &str, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.expect("connect to test server");

    let head = format!(
        "{method} {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );

    stream.write_all(head.as_bytes()).await.expect("write request head");
    stream.write_all(body).await.expect("write request body");
    stream.shutdown().await.ok();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");

    let header_end = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .expect("response has a header/body separator")
        + 4;

    let status_line = std::str::from_utf8(&raw[..header_end]).expect("headers are ascii");
    let status: u16 = status_line
        .lines()
        .next()
        .expect("status line")
        .split_whitespace()
        .nth(1)
        .expect("status code")
        .parse()
        .expect("status code is numeric");

    (status, raw[header_end..].to_vec())
}

#[tokio::test]
async fn handshake_over_polling_returns_the_open_packet() {
    let (addr, _server, mut events) = spawn_server(Config::default()).await;

    let (status, body) = request(addr, "GET", "/engine.io/?transport=polling", b"").await;
    assert_eq!(status, 200);

    let body = String::from_utf8(body).expect("open packet is utf8");

    let (length_field, rest) = body.split_once(':').expect("length-prefixed frame");
    let length: usize = length_field.parse().expect("numeric length prefix");
    assert_eq!(length, rest.chars().count(), "stated length must match the codepoint count of the frame body");

    assert!(rest.starts_with("0{\"sid\":\""), "body was: {body}");
    assert!(rest.contains("\"upgrades\":[\"websocket\"]"), "body was: {body}");
    assert!(rest.contains("\"pingInterval\":25000"), "body was: {body}");
    assert!(rest.contains("\"pingTimeout\":60000"), "body was: {body}");

    match events.recv().await {
        Some(Event::Connect { sid }) => assert!(!sid.is_empty()),
        other => panic!("expected Connect, got {other:?}"),
    }
}

async fn handshake(addr: SocketAddr) -> String {
    let (status, body) = request(addr, "GET", "/engine.io/?transport=polling", b"").await;
    assert_eq!(status, 200);

    let body = String::from_utf8(body).unwrap();
    let prefix = "\"sid\":\"";
    let start = body.find(prefix).expect("open packet present") + prefix.len();
    body[start..].split('"').next().unwrap().to_string()
}

#[tokio::test]
async fn message_round_trip_over_polling() {
    let (addr, _server, mut events) = spawn_server(Config::default()).await;
    let sid = handshake(addr).await;

    let path = format!("/engine.io/?transport=polling&sid={sid}");
    let (status, _) = request(addr, "POST", &path, b"12:4hello world").await;
    assert_eq!(status, 200);

    let mut saw_message = false;
    while let Some(event) = events.recv().await {
        if let Event::Message { binary, data, .. } = event {
            assert!(!binary);
            assert_eq!(&data[..], b"hello world");
            saw_message = true;
            break;
        }
    }
    assert!(saw_message, "expected a Message event");
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (addr, _server, _events) = spawn_server(Config::default()).await;
    let sid = handshake(addr).await;
    let path = format!("/engine.io/?transport=polling&sid={sid}");

    let (status, _) = request(addr, "POST", &path, b"1:2").await;
    assert_eq!(status, 200);

    // Give the receive loop a moment to process the ping and enqueue a pong.
    for _ in 0..50 {
        let (status, body) = request(addr, "GET", &path, b"").await;
        assert_eq!(status, 200);

        if !body.is_empty() {
            assert!(body.starts_with(b"1:3"), "body was: {:?}", String::from_utf8_lossy(&body));
            return;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("no pong observed within the polling window");
}

#[tokio::test]
async fn binary_payload_round_trip() {
    let (addr, _server, mut events) = spawn_server(Config::default()).await;
    let sid = handshake(addr).await;
    let path = format!("/engine.io/?transport=polling&sid={sid}");

    let body = [0x01, 0x04, 0xFF, 0x04, 0x02, 0x04, 0x08];
    let (status, _) = request(addr, "POST", &path, &body).await;
    assert_eq!(status, 200);

    while let Some(event) = events.recv().await {
        if let Event::Message { binary, data, .. } = event {
            assert!(binary);
            assert_eq!(&data[..], &[2, 4, 8]);
            return;
        }
    }

    panic!("expected a binary Message event");
}

/// Writes a client-to-server text frame (RFC 6455 requires client frames to
/// be masked; the mask key is fixed since this is a test harness, not a
/// security-sensitive client).
fn encode_text_frame(payload: &str) -> Vec<u8> {
    const MASK_KEY: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

    let payload = payload.as_bytes();
    assert!(payload.len() < 126, "test frames are always short");

    let mut frame = vec![0x81, 0x80 | payload.len() as u8];
    frame.extend_from_slice(&MASK_KEY);
    frame.extend(payload.iter().enumerate().map(|(i, byte)| byte ^ MASK_KEY[i % 4]));
    frame
}

/// Reads one unmasked (server-to-client) text frame.
async fn read_text_frame(stream: &mut TcpStream) -> String {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.expect("read frame header");

    let opcode = header[0] & 0x0F;
    assert_eq!(opcode, 0x1, "expected a text frame");

    let masked = header[1] & 0x80 != 0;
    let mut len = (header[1] & 0x7F) as usize;

    if len == 126 {
        let mut extended = [0u8; 2];
        stream.read_exact(&mut extended).await.expect("read extended length");
        len = u16::from_be_bytes(extended) as usize;
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        stream.read_exact(&mut key).await.expect("read mask key");
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.expect("read frame payload");

    if let Some(key) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    String::from_utf8(payload).expect("frame payload is utf8")
}

/// Performs the upgrade handshake over a fresh TCP connection and hands back
/// the still-open socket for frame-level traffic. Uses the RFC 6455 §1.3
/// example key so the expected accept value is a literal, not a computation.
async fn ws_handshake(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("connect to test server");

    let head = format!(
        "GET {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream.write_all(head.as_bytes()).await.expect("write upgrade request");

    let mut raw = Vec::new();
    loop {
        let mut chunk = [0u8; 256];
        let n = stream.read(&mut chunk).await.expect("read upgrade response");
        raw.extend_from_slice(&chunk[..n]);
        if raw.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
    }

    let headers = std::str::from_utf8(&raw).expect("headers are ascii");
    assert!(headers.starts_with("HTTP/1.1 101"), "expected a 101 response, got: {headers}");
    assert!(
        headers.to_ascii_lowercase().contains("sec-websocket-accept: s3pplmbitxaq9kygzzhzrbk+xoo="),
        "accept key did not match the expected value for the RFC 6455 example key: {headers}"
    );

    stream
}

#[tokio::test]
async fn polling_session_upgrades_to_websocket() {
    let (addr, server, _events) = spawn_server(Config::default()).await;
    let sid = handshake(addr).await;

    let polling_path = format!("/engine.io/?transport=polling&sid={sid}");
    let stuck_get = {
        let polling_path = polling_path.clone();
        tokio::spawn(async move { request(addr, "GET", &polling_path, b"").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let ws_path = format!("/engine.io/?transport=websocket&sid={sid}");
    let mut socket = ws_handshake(addr, &ws_path).await;

    socket.write_all(&encode_text_frame("2probe")).await.expect("send probe ping");
    assert_eq!(read_text_frame(&mut socket).await, "3probe");

    let (status, body) = stuck_get.await.expect("stuck GET task");
    assert_eq!(status, 200);
    assert_eq!(body, b"1:6", "the stalled poll should be unblocked with a noop");

    socket.write_all(&encode_text_frame("5")).await.expect("send upgrade packet");

    // Give the session time to swap its active transport to the new socket.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.send(&sid, false, &b"hi"[..]).await.expect("send after upgrade");

    assert_eq!(read_text_frame(&mut socket).await, "4hi");
}

#[tokio::test]
async fn expired_session_is_swept_and_closed() {
    let config = Config::builder()
        .ping_interval(Duration::from_millis(10))
        .ping_timeout(Duration::from_millis(10))
        .build();

    let (addr, server, mut events) = spawn_server(config).await;
    let sid = handshake(addr).await;

    assert_eq!(server.session_count().await, 1);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut saw_disconnect = false;
    while let Some(event) = events.recv().await {
        if let Event::Disconnect { sid: disconnected, reason } = event {
            assert_eq!(disconnected, sid);
            assert_eq!(reason, "ping timeout");
            saw_disconnect = true;
            break;
        }
    }

    assert!(saw_disconnect, "expected a Disconnect event for the expired session");
}
