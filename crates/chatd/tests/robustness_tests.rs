//! Robustness tests for the chat server.
//!
//! These tests verify the server survives misbehaving and bursty clients:
//! over-long lines, invalid UTF-8, abrupt disconnects, name races, and
//! many concurrent sessions.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::net::SocketAddr;
use std::time::Duration;

use chatd::config::ServerConfig;
use chatd::registry::{spawn_registry, RegistryHandle};
use chatd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with_config(ServerConfig::default()).await
    }

    async fn spawn_with_config(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let server = ChatServer::new(config, registry.clone(), cancel_token.clone());

        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        TestServer {
            addr,
            registry,
            cancel_token,
        }
    }

    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.expect("SUBMITNAME").await;
        client.send(name).await;
        client.expect(&format!("NAMEACCEPTED {name}")).await;
        client
    }

    async fn wait_for(&self, claimed: usize, active: usize) {
        let start = tokio::time::Instant::now();
        while start.elapsed() < SETTLE_TIMEOUT {
            let stats = self.registry.stats().await;
            if stats.claimed_names == claimed && stats.active_writers == active {
                return;
            }
            sleep(POLL_INTERVAL).await;
        }
        panic!(
            "expected {claimed} names / {active} writers, found {:?}",
            self.registry.stats().await
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(line.as_bytes()).await;
        self.send_raw(b"\n").await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server line")
            .unwrap();
        if n == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn expect(&mut self, expected: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(expected));
    }
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[tokio::test]
async fn test_overlong_line_disconnects_only_that_client() {
    let server = TestServer::spawn_with_config(ServerConfig {
        max_line_length: 1024,
        ..Default::default()
    })
    .await;
    let mut alice = server.join("alice").await;
    server.wait_for(1, 1).await;
    let mut mallory = server.join("mallory").await;
    alice.expect("MESSAGE mallory has joined").await;

    mallory.send(&"x".repeat(4096)).await;

    alice.expect("MESSAGE mallory has left").await;
    server.wait_for(1, 1).await;

    // The room keeps working
    alice.send("still here").await;
    alice.expect("MESSAGE alice: still here").await;
}

#[tokio::test]
async fn test_overlong_name_disconnects_without_claiming() {
    let server = TestServer::spawn_with_config(ServerConfig {
        max_line_length: 64,
        ..Default::default()
    })
    .await;
    let mut client = server.connect().await;

    client.expect("SUBMITNAME").await;
    client.send(&"n".repeat(65)).await;

    assert_eq!(client.recv().await, None);
    server.wait_for(0, 0).await;
}

#[tokio::test]
async fn test_invalid_utf8_disconnects_sender() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    server.wait_for(1, 1).await;
    let mut eve = server.join("eve").await;
    alice.expect("MESSAGE eve has joined").await;

    eve.send_raw(&[0xff, 0xfe, b'\n']).await;

    alice.expect("MESSAGE eve has left").await;
    server.wait_for(1, 1).await;
}

#[tokio::test]
async fn test_partial_line_before_eof_is_processed() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    server.wait_for(1, 1).await;

    let mut ghost = server.connect().await;
    ghost.expect("SUBMITNAME").await;
    ghost.send_raw(b"ghost").await;
    ghost.writer.shutdown().await.unwrap();

    assert_eq!(ghost.recv().await.as_deref(), Some("NAMEACCEPTED ghost"));
    alice.expect("MESSAGE ghost has joined").await;
    alice.expect("MESSAGE ghost has left").await;
    server.wait_for(1, 1).await;
}

// ============================================================================
// Slow Peer Tests
// ============================================================================

#[tokio::test]
async fn test_silent_peer_is_evicted_once_and_room_keeps_flowing() {
    let server = TestServer::spawn_with_config(ServerConfig {
        outbound_buffer: 4,
        write_timeout_secs: 60,
        ..Default::default()
    })
    .await;
    let mut alice = server.join("alice").await;
    server.wait_for(1, 1).await;
    // Joins, then never reads again
    let _slow = server.join("slow").await;
    alice.expect("MESSAGE slow has joined").await;
    server.wait_for(2, 2).await;

    let payload = "x".repeat(8 * 1024);
    let echo = format!("MESSAGE alice: {payload}");
    let mut has_left = 0;
    let mut rounds = 0;

    while has_left == 0 {
        assert!(rounds < 20_000, "silent peer was never evicted");
        rounds += 1;

        alice.send(&payload).await;
        // Every send comes back, so alice is never stuck behind the silent peer
        loop {
            let line = alice.recv().await.expect("alice lost her connection");
            if line == "MESSAGE slow has left" {
                has_left += 1;
            } else {
                assert_eq!(line, echo);
                break;
            }
        }
    }

    server.wait_for(1, 1).await;
    let names: Vec<String> = server
        .registry
        .snapshot_names()
        .await
        .iter()
        .map(|n| n.as_str().to_string())
        .collect();
    assert_eq!(names, vec!["alice".to_string()]);

    // No second departure trails the flood
    for i in 0..5 {
        alice.send(&format!("after {i}")).await;
        alice.expect(&format!("MESSAGE alice: after {i}")).await;
    }
    assert_eq!(has_left, 1);
}

// ============================================================================
// Rapid Connect/Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for i in 0..30 {
        let mut client = server.connect().await;
        client.expect("SUBMITNAME").await;
        if i % 2 == 0 {
            client.send(&format!("rapid-{i}")).await;
        }
        // Drop without waiting
    }

    server.wait_for(0, 0).await;

    let mut last = server.join("final").await;
    last.send("done").await;
    last.expect("MESSAGE final: done").await;
}

#[tokio::test]
async fn test_concurrent_same_name_one_winner() {
    let server = TestServer::spawn().await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut client = TestClient::new(stream);
            client.expect("SUBMITNAME").await;
            client.send("dup").await;

            match client.recv().await.as_deref() {
                Some("NAMEACCEPTED dup") => (true, client),
                Some("SUBMITNAME") => {
                    let fallback = format!("dup-{i}");
                    client.send(&fallback).await;
                    client.expect(&format!("NAMEACCEPTED {fallback}")).await;
                    (false, client)
                }
                other => panic!("unexpected reply: {other:?}"),
            }
        }));
    }

    let mut winners = 0;
    let mut clients = Vec::new();
    for task in tasks {
        let (won, client) = task.await.unwrap();
        if won {
            winners += 1;
        }
        clients.push(client);
    }

    assert_eq!(winners, 1);
    server.wait_for(20, 20).await;
    assert_eq!(server.registry.snapshot_names().await.len(), 20);
}

#[tokio::test]
async fn test_many_concurrent_chatters() {
    let server = TestServer::spawn().await;
    let count = 10;

    let mut clients = Vec::new();
    for i in 0..count {
        clients.push(server.join(&format!("user{i}")).await);
        server.wait_for(i + 1, i + 1).await;
    }

    let mut tasks = Vec::new();
    for (i, mut client) in clients.into_iter().enumerate() {
        tasks.push(tokio::spawn(async move {
            client.send(&format!("hello from {i}")).await;

            let mut seen = Vec::new();
            while seen.len() < count {
                let line = client.recv().await.expect("connection closed early");
                if line.contains(": hello from ") {
                    seen.push(line);
                }
            }
            seen
        }));
    }

    for task in tasks {
        let mut seen = task.await.unwrap();
        seen.sort();
        let mut expected: Vec<String> = (0..count)
            .map(|i| format!("MESSAGE user{i}: hello from {i}"))
            .collect();
        expected.sort();
        assert_eq!(seen, expected);
    }
}

#[tokio::test]
async fn test_server_survives_client_reset_mid_message() {
    let server = TestServer::spawn().await;
    let mut alice = server.join("alice").await;
    server.wait_for(1, 1).await;

    {
        let mut bob = server.join("bob").await;
        alice.expect("MESSAGE bob has joined").await;
        bob.send_raw(b"half a mess").await;
    }

    // Partial line is delivered, then the departure
    alice.expect("MESSAGE bob: half a mess").await;
    alice.expect("MESSAGE bob has left").await;
    server.wait_for(1, 1).await;
}
