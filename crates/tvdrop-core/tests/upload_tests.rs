//! Upload completion, timeout and progress tests over real sockets.

mod common;

use std::time::{Duration, Instant};

use futures::stream;
use serial_test::serial;

use tvdrop_core::config::UploadConfig;
use tvdrop_core::reporter::ServerEvent;

use common::{fast_upload_config, read_response, start_raw_upload, TestServer};

const MIB: f64 = 1024.0 * 1024.0;

#[tokio::test]
#[serial]
async fn test_quiet_client_completes_after_grace_window() {
    let mut server = TestServer::start().await;
    let sent = vec![0x5au8; 1_000_000];

    let started = Instant::now();
    let mut stream = start_raw_upload(server.addr, "movie.mp4", 2_000_000, &sent).await;
    let response = read_response(&mut stream, Duration::from_secs(5)).await;

    assert_eq!(response.status, 200);
    assert!(response.has_header("connection", "close"));
    assert!(started.elapsed() < Duration::from_secs(2));

    let body = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["size"], 1_000_000);
    assert!(body.get("partial").is_none());

    let on_disk = std::fs::metadata(server.root().join("movie.mp4")).unwrap();
    assert_eq!(on_disk.len(), 1_000_000);

    let complete = server
        .wait_for_event(Duration::from_secs(1), |e| {
            matches!(e, ServerEvent::UploadComplete { .. })
        })
        .await;
    assert_eq!(
        complete,
        Some(ServerEvent::UploadComplete {
            filename: "movie.mp4".to_string(),
            final_size: 1_000_000,
        })
    );

    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_disconnect_without_data_leaves_no_file() {
    let mut server = TestServer::start().await;

    let stream = start_raw_upload(server.addr, "ghost.bin", 1000, &[]).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(stream);

    let failed = server
        .wait_for_event(Duration::from_secs(4), |e| {
            matches!(e, ServerEvent::UploadFailed { filename, .. } if filename == "ghost.bin")
        })
        .await;
    assert!(failed.is_some());
    assert!(!server.root().join("ghost.bin").exists());
    assert_eq!(server.server.active_uploads(), 0);

    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_silent_client_times_out() {
    let server = TestServer::start().await;

    let started = Instant::now();
    let mut stream = start_raw_upload(server.addr, "silent.bin", 1000, &[]).await;
    let response = read_response(&mut stream, Duration::from_secs(5)).await;

    assert_eq!(response.status, 408);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(response.json()["success"], false);
    assert!(!server.root().join("silent.bin").exists());

    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_partial_upload_kept_without_grace_window() {
    let mut server = TestServer::start_with(UploadConfig {
        grace_window: Duration::ZERO,
        abandon_timeout: Duration::from_secs(1),
        ..fast_upload_config()
    })
    .await;

    let mut stream = start_raw_upload(server.addr, "big.iso", 4096, &[9u8; 1500]).await;

    // Longer than the default grace window would have been.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.server.active_uploads(), 1);

    let response = read_response(&mut stream, Duration::from_secs(3)).await;
    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["size"], 1500);
    assert_eq!(body["partial"], true);
    assert_eq!(std::fs::read(server.root().join("big.iso")).unwrap().len(), 1500);

    let incomplete = server
        .wait_for_event(Duration::from_secs(1), |e| {
            matches!(e, ServerEvent::UploadIncomplete { .. })
        })
        .await;
    assert_eq!(
        incomplete,
        Some(ServerEvent::UploadIncomplete {
            filename: "big.iso".to_string(),
            bytes_written: 1500,
        })
    );

    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_progress_is_rate_limited() {
    const CHUNK: usize = 64 * 1024;
    const CHUNKS: usize = 128;

    let mut server = TestServer::start().await;

    let chunks = stream::unfold(0usize, |sent| async move {
        if sent == CHUNKS {
            return None;
        }
        if sent > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Some((Ok::<_, std::io::Error>(vec![sent as u8; CHUNK]), sent + 1))
    });

    let started = Instant::now();
    let response = reqwest::Client::new()
        .post(server.url("/upload-simple?filename=stream.bin"))
        .body(reqwest::Body::wrap_stream(chunks))
        .send()
        .await
        .unwrap();
    let total_elapsed = started.elapsed().as_secs_f64();
    assert_eq!(response.status(), 200);

    let progress: Vec<(u64, f64)> = server
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::UploadProgress {
                bytes_written,
                throughput_mbps,
                ..
            } => Some((bytes_written, throughput_mbps)),
            _ => None,
        })
        .collect();

    // 8 MiB at one notification per MiB, plus at most one per second.
    assert!(!progress.is_empty());
    assert!(progress.len() <= 12, "{} notifications", progress.len());
    assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));

    let (bytes, mbps) = *progress.last().unwrap();
    let received_chunks = bytes.div_ceil(CHUNK as u64) as f64;
    let lower = bytes as f64 / MIB / total_elapsed;
    let upper = bytes as f64 / MIB / ((received_chunks - 1.0) * 0.01);
    assert!(mbps >= lower, "{mbps} < {lower}");
    assert!(mbps <= upper * 1.5, "{mbps} > {upper}");

    assert_eq!(
        std::fs::metadata(server.root().join("stream.bin")).unwrap().len(),
        (CHUNK * CHUNKS) as u64
    );

    server.shutdown().await;
}
