//! Integration tests
//!
//! End-to-end tests for portmux: real TCP listeners on both sides, the
//! multiplexer in the middle, and byte-for-byte verification that each
//! backend sees exactly what the client sent, sniffed prefix included.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use portmux::mux::Mux;
use portmux::server::{Forwarder, Server};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const BUFFER_SIZE: usize = 4096;

/// Backend that tags each connection with a label byte, then echoes
/// everything it receives.
async fn spawn_backend(label: u8) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                writer.write_all(&[label]).await.unwrap();
                tokio::io::copy(&mut reader, &mut writer).await.ok();
            });
        }
    });

    addr
}

/// Accept loop feeding every connection to the multiplexer.
async fn spawn_acceptor(mux: Arc<Mux<TcpStream>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let mux = Arc::clone(&mux);
            tokio::spawn(async move { mux.dispatch(stream).await });
        }
    });

    addr
}

fn forwarder(target: SocketAddr) -> Forwarder {
    Forwarder::new(target, CONNECT_TIMEOUT, BUFFER_SIZE)
}

/// Connect, send `payload`, and return the label byte plus the echo.
async fn exchange(mux_addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(mux_addr).await.unwrap();
    client.write_all(payload).await.unwrap();

    let mut response = vec![0u8; 1 + payload.len()];
    client.read_exact(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_routes_to_matching_backend() {
    let ping_backend = spawn_backend(b'P').await;
    let ssh_backend = spawn_backend(b'S').await;
    let fallback_backend = spawn_backend(b'F').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(ping_backend), ["PING"]).unwrap();
    mux.handle_prefix(forwarder(ssh_backend), ["SSH-2.0"]).unwrap();
    mux.not_found(forwarder(fallback_backend));
    let mux_addr = spawn_acceptor(Arc::new(mux)).await;

    // Each backend's echo must contain the sniffed prefix: the replay
    // makes the matching invisible to the backend.
    let response = exchange(mux_addr, b"PING rest of stream").await;
    assert_eq!(response[0], b'P');
    assert_eq!(&response[1..], b"PING rest of stream");

    let response = exchange(mux_addr, b"SSH-2.0-OpenSSH_9.7\r\n").await;
    assert_eq!(response[0], b'S');
    assert_eq!(&response[1..], b"SSH-2.0-OpenSSH_9.7\r\n");

    let response = exchange(mux_addr, b"HELO mail.example.com\r\n").await;
    assert_eq!(response[0], b'F');
    assert_eq!(&response[1..], b"HELO mail.example.com\r\n");
}

#[tokio::test]
async fn test_fragmented_delivery_resolves_identically() {
    let backend = spawn_backend(b'P').await;
    let fallback_backend = spawn_backend(b'F').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(backend), ["PING"]).unwrap();
    mux.not_found(forwarder(fallback_backend));
    let mux_addr = spawn_acceptor(Arc::new(mux)).await;

    let mut client = TcpStream::connect(mux_addr).await.unwrap();
    for fragment in [b"P".as_slice(), b"I", b"N", b"G", b" slowly"] {
        client.write_all(fragment).await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let expected = b"PING slowly";
    let mut response = vec![0u8; 1 + expected.len()];
    client.read_exact(&mut response).await.unwrap();
    assert_eq!(response[0], b'P');
    assert_eq!(&response[1..], expected);
}

#[tokio::test]
async fn test_longest_pattern_wins() {
    let get_backend = spawn_backend(b'G').await;
    let api_backend = spawn_backend(b'A').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(get_backend), ["GET "]).unwrap();
    mux.handle_prefix(forwarder(api_backend), ["GET /api"]).unwrap();
    let mux_addr = spawn_acceptor(Arc::new(mux)).await;

    let response = exchange(mux_addr, b"GET /api/v1 HTTP/1.1\r\n").await;
    assert_eq!(response[0], b'A');
    assert_eq!(&response[1..], b"GET /api/v1 HTTP/1.1\r\n");

    let response = exchange(mux_addr, b"GET /index HTTP/1.1\r\n").await;
    assert_eq!(response[0], b'G');
}

#[tokio::test]
async fn test_shorter_pattern_wins_on_early_close() {
    let ab_backend = spawn_backend(b'1').await;
    let abc_backend = spawn_backend(b'2').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(ab_backend), ["AB"]).unwrap();
    mux.handle_prefix(forwarder(abc_backend), ["ABC"]).unwrap();
    let mux_addr = spawn_acceptor(Arc::new(mux)).await;

    let mut client = TcpStream::connect(mux_addr).await.unwrap();
    client.write_all(b"AB").await.unwrap();
    // Half-close: matching sees end-of-stream after "AB" and must settle
    // for the shorter pattern instead of waiting for a 'C'.
    client.shutdown().await.unwrap();

    let mut response = vec![0u8; 3];
    client.read_exact(&mut response).await.unwrap();
    assert_eq!(response[0], b'1');
    assert_eq!(&response[1..], b"AB");
}

#[tokio::test]
async fn test_unmatched_connection_is_closed() {
    let backend = spawn_backend(b'Z').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(backend), ["ZZZ"]).unwrap();
    let mux_addr = spawn_acceptor(Arc::new(mux)).await;

    let mut client = TcpStream::connect(mux_addr).await.unwrap();
    client.write_all(b"QQQQ").await.unwrap();

    // No fallback: the multiplexer closes the stream without dispatching.
    let mut buf = [0u8; 16];
    match client.read(&mut buf).await {
        Ok(0) => {}
        Ok(n) => panic!("expected the connection to close, got {} bytes", n),
        Err(_) => {} // reset is fine too
    }
}

#[tokio::test]
async fn test_binary_prefix_routing() {
    let tls_backend = spawn_backend(b'T').await;
    let plain_backend = spawn_backend(b'N').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(tls_backend), [&b"\x16\x03"[..]]).unwrap();
    mux.not_found(forwarder(plain_backend));
    let mux_addr = spawn_acceptor(Arc::new(mux)).await;

    // First bytes of a TLS 1.2 ClientHello record
    let client_hello = [0x16u8, 0x03, 0x03, 0x00, 0x31, 0x01, 0x00];
    let mut client = TcpStream::connect(mux_addr).await.unwrap();
    client.write_all(&client_hello).await.unwrap();

    let mut response = vec![0u8; 1 + client_hello.len()];
    client.read_exact(&mut response).await.unwrap();
    assert_eq!(response[0], b'T');
    assert_eq!(&response[1..], &client_hello);
}

#[tokio::test]
async fn test_server_accept_loop() {
    let backend = spawn_backend(b'E').await;

    let mut mux = Mux::new();
    mux.handle_prefix(forwarder(backend), ["ECHO"]).unwrap();

    // Reserve an ephemeral port for the server to bind.
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = probe.local_addr().unwrap();
    drop(probe);

    let server = Server::new(server_addr, Arc::new(mux));
    tokio::spawn(async move { server.run().await });

    // Give the accept loop a moment to bind.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = exchange(server_addr, b"ECHO hello").await;
    assert_eq!(response[0], b'E');
    assert_eq!(&response[1..], b"ECHO hello");
}
