//! Common test utilities for `TvDrop` integration tests.
//!
//! Servers bind `127.0.0.1:0`; tests that start one must be `#[serial]`
//! because only one server runs per process.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

use tvdrop_core::catalog::Navigator;
use tvdrop_core::config::UploadConfig;
use tvdrop_core::reporter::{ChannelReporter, ServerEvent};
use tvdrop_core::sandbox::PathSandbox;
use tvdrop_core::web::{TransferServer, WebServerConfig};

/// Upload tuning with timers short enough for tests.
pub fn fast_upload_config() -> UploadConfig {
    UploadConfig {
        grace_window: Duration::from_millis(500),
        abandon_timeout: Duration::from_secs(2),
        idle_check_interval: Duration::from_millis(50),
        progress_interval: Duration::from_secs(1),
        progress_bytes: 1024 * 1024,
        keep_partial_on_timeout: true,
    }
}

/// A running server over a scratch root.
pub struct TestServer {
    pub server: TransferServer,
    pub addr: SocketAddr,
    pub events: UnboundedReceiver<ServerEvent>,
    root: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestServer {
    /// Start a server with the fast upload config.
    pub async fn start() -> Self {
        Self::start_with(fast_upload_config()).await
    }

    /// Start a server with the given upload config.
    pub async fn start_with(upload: UploadConfig) -> Self {
        let dir = create_temp_dir();
        let sandbox = PathSandbox::new(dir.path()).expect("sandbox");
        let root = sandbox.root().to_path_buf();
        let (reporter, events) = ChannelReporter::new();

        let server = TransferServer::with_navigator(
            WebServerConfig {
                port: 0,
                localhost_only: true,
                ..WebServerConfig::default()
            },
            Arc::new(Navigator::new(sandbox)),
            upload,
            Arc::new(reporter),
        );
        let addr = server.start().await.expect("server start");

        Self {
            server,
            addr,
            events,
            root,
            _dir: dir,
        }
    }

    /// Canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop the server.
    pub async fn shutdown(self) {
        self.server.stop().await.expect("server stop");
    }

    /// Drain every event received so far.
    pub fn drain_events(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait until an event matching `pred` arrives.
    pub async fn wait_for_event(
        &mut self,
        timeout: Duration,
        pred: impl Fn(&ServerEvent) -> bool,
    ) -> Option<ServerEvent> {
        tokio::time::timeout(timeout, async {
            while let Some(event) = self.events.recv().await {
                if pred(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }
}

/// Create a temporary directory for test files.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Open a raw upload that declares `content_length` bytes and sends `sent`.
///
/// The stream is returned open so the caller controls whether the client
/// goes quiet or disconnects.
pub async fn start_raw_upload(
    addr: SocketAddr,
    filename: &str,
    content_length: usize,
    sent: &[u8],
) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let head = format!(
        "POST /upload-simple?filename={filename} HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {content_length}\r\n\
         \r\n"
    );
    stream.write_all(head.as_bytes()).await.expect("write head");
    stream.write_all(sent).await.expect("write body");
    stream.flush().await.expect("flush");
    stream
}

/// A parsed HTTP response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Body parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("JSON body")
    }

    /// Whether a header line matches, case-insensitively.
    pub fn has_header(&self, name: &str, value: &str) -> bool {
        self.headers.lines().any(|line| {
            line.split_once(':').is_some_and(|(n, v)| {
                n.trim().eq_ignore_ascii_case(name) && v.trim().eq_ignore_ascii_case(value)
            })
        })
    }
}

/// Read one response from a raw stream.
pub async fn read_response(stream: &mut TcpStream, timeout: Duration) -> RawResponse {
    tokio::time::timeout(timeout, read_until_complete(stream))
        .await
        .expect("timed out waiting for response")
}

async fn read_until_complete(stream: &mut TcpStream) -> RawResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        if let Some(response) = parse_response(&buf) {
            return response;
        }
        let n = stream.read(&mut chunk).await.expect("read response");
        if n == 0 {
            return parse_response(&buf).expect("connection closed before a full response");
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn parse_response(buf: &[u8]) -> Option<RawResponse> {
    let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n")?;
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let body = &buf[header_end + 4..];

    let status = head
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()?;

    let length = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-length")
            .then(|| value.trim().parse::<usize>().ok())
            .flatten()
    })?;

    (body.len() >= length).then(|| RawResponse {
        status,
        headers: head,
        body: body[..length].to_vec(),
    })
}
