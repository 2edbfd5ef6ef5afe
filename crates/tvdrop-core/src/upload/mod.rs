//! Streaming upload sessions.
//!
//! An [`UploadSession`] owns one open target file and drives it from the
//! first body chunk to a single final state. Uploads are unframed: the
//! body is the file, and the filename travels in the query string. An
//! upload normally ends when the body ends. Clients that never signal the
//! end are handled by a per-session watchdog with two idle tiers:
//!
//! - after a short grace window of silence following data, the upload is
//!   presumed finished and completes;
//! - after a long idle timeout, the upload is abandoned.
//!
//! Whichever of the driver (end of body, transport error) or the watchdog
//! moves the session out of `Receiving` first wins. Finalization then runs
//! exactly once, on the driver's task.
//!
//! ```text
//! Receiving ──end / grace──► Finalizing ──► Completed
//!     │                          ├────────► Failed    (empty, write error)
//!     │                          └────────► TimedOut  (abandoned, partial kept)
//!     └──abort / write error / shutdown──► Failed
//! ```

pub mod progress;
pub mod registry;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::catalog::epoch_millis;
use crate::config::UploadConfig;
use crate::error::{Error, Result};
use crate::reporter::SharedReporter;

pub use progress::{throughput_mbps, ProgressThrottle};
pub use registry::{TargetClaim, UploadRegistry};

const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Lifecycle state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Accepting body chunks
    Receiving,
    /// Claimed for finalization; no more writes
    Finalizing,
    /// File stored
    Completed,
    /// Upload failed; partial file removed
    Failed,
    /// Abandoned after the long idle timeout
    TimedOut,
}

/// Why a session stopped receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishCause {
    /// The body ended
    EndOfBody,
    /// Silence after data outlasted the grace window
    IdleGrace,
    /// Silence outlasted the abandon timeout
    Abandoned,
    /// The connection failed mid-body
    TransportError,
    /// Writing to disk failed
    WriteError,
    /// The server is stopping
    Cancelled,
}

/// A stored file after finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Size on disk
    pub size: u64,
    /// Modification time in epoch milliseconds
    pub last_modified: i64,
}

/// Final result of an upload session.
#[derive(Debug)]
pub struct UploadOutcome {
    /// Client-supplied file name
    pub filename: String,
    /// Absolute target path
    pub path: PathBuf,
    /// Final state
    pub state: UploadState,
    /// Why receiving stopped
    pub cause: FinishCause,
    /// Bytes accepted from the client
    pub bytes_written: u64,
    /// Time from session start to finalization
    pub elapsed: Duration,
    /// Present when the file was kept
    pub stored: Option<StoredFile>,
    /// Present when the upload failed or timed out without keeping data
    pub error: Option<Error>,
}

impl UploadOutcome {
    /// Average throughput over the whole session, in MB/s.
    #[must_use]
    pub fn throughput_mbps(&self) -> f64 {
        throughput_mbps(self.bytes_written, self.elapsed)
    }

    /// Convert into the stored file, or the error that prevented it.
    ///
    /// # Errors
    ///
    /// Returns the session error when nothing was stored.
    pub fn into_result(self) -> Result<(Self, StoredFile)> {
        match self.stored.clone() {
            Some(stored) => Ok((self, stored)),
            None => Err(self
                .error
                .unwrap_or_else(|| Error::Internal("upload stored nothing".into()))),
        }
    }
}

#[derive(Debug)]
struct Activity {
    state: UploadState,
    cause: Option<FinishCause>,
    bytes_written: u64,
    started_at: Instant,
    last_chunk_at: Option<Instant>,
}

impl Activity {
    fn idle_cause(&self, now: Instant, config: &UploadConfig) -> Option<FinishCause> {
        if self.state != UploadState::Receiving {
            return None;
        }

        let last_activity = self.last_chunk_at.unwrap_or(self.started_at);
        let idle = now.saturating_duration_since(last_activity);

        if config.grace_enabled() && self.bytes_written > 0 && idle >= config.grace_window {
            Some(FinishCause::IdleGrace)
        } else if idle >= config.abandon_timeout {
            Some(FinishCause::Abandoned)
        } else {
            None
        }
    }

    /// Move to `Finalizing` unless someone already did; returns the winning cause.
    fn claim(&mut self, cause: FinishCause) -> FinishCause {
        match self.cause {
            Some(existing) => existing,
            None => {
                self.state = UploadState::Finalizing;
                self.cause = Some(cause);
                cause
            }
        }
    }
}

#[derive(Debug)]
struct Shared {
    activity: Mutex<Activity>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One upload from open to final state.
pub struct UploadSession {
    filename: String,
    claim: TargetClaim,
    writer: Option<BufWriter<File>>,
    shared: Arc<Shared>,
    config: UploadConfig,
    throttle: ProgressThrottle,
    reporter: SharedReporter,
    watchdog: Option<JoinHandle<()>>,
    finalized: bool,
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("filename", &self.filename)
            .field("target", &self.claim.target())
            .field("state", &self.state())
            .field("bytes_written", &self.bytes_written())
            .finish_non_exhaustive()
    }
}

impl UploadSession {
    /// Open the claimed target for writing, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the existing file cannot be removed or the
    /// target cannot be created.
    pub async fn create(
        claim: TargetClaim,
        filename: impl Into<String>,
        config: UploadConfig,
        reporter: SharedReporter,
    ) -> Result<Self> {
        let filename = filename.into();
        let target = claim.target();

        match tokio::fs::remove_file(target).await {
            Ok(()) => tracing::debug!("Replacing existing file {}", target.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = File::create(target).await?;
        let started_at = Instant::now();

        tracing::info!("Receiving upload {} -> {}", filename, target.display());

        Ok(Self {
            filename,
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            shared: Arc::new(Shared {
                activity: Mutex::new(Activity {
                    state: UploadState::Receiving,
                    cause: None,
                    bytes_written: 0,
                    started_at,
                    last_chunk_at: None,
                }),
                wake: Notify::new(),
            }),
            throttle: ProgressThrottle::new(
                started_at,
                config.progress_interval,
                config.progress_bytes,
            ),
            config,
            reporter,
            claim,
            watchdog: None,
            finalized: false,
        })
    }

    /// Client-supplied file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Absolute target path.
    #[must_use]
    pub fn target(&self) -> &Path {
        self.claim.target()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> UploadState {
        self.shared.lock().state
    }

    /// Bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.shared.lock().bytes_written
    }

    /// Append one body chunk.
    ///
    /// Returns `Ok(false)` without writing when the session has already
    /// stopped receiving.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write fails.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<bool> {
        if chunk.is_empty() {
            return Ok(self.state() == UploadState::Receiving);
        }

        {
            let mut activity = self.shared.lock();
            if activity.state != UploadState::Receiving {
                tracing::debug!(
                    "Dropping {} bytes for {}: no longer receiving",
                    chunk.len(),
                    self.filename
                );
                return Ok(false);
            }
            // Counts as activity before the write so a slow disk never
            // looks like an idle client.
            activity.last_chunk_at = Some(Instant::now());
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Internal("upload writer already closed".into()))?;
        writer.write_all(chunk).await?;

        let now = Instant::now();
        let total = {
            let mut activity = self.shared.lock();
            activity.bytes_written += chunk.len() as u64;
            activity.last_chunk_at = Some(now);
            activity.bytes_written
        };

        if let Some(mbps) = self.throttle.observe(total, now) {
            tracing::debug!("{}: {} bytes ({:.2} MB/s)", self.filename, total, mbps);
            self.reporter.upload_progress(&self.filename, total, mbps);
        }

        Ok(true)
    }

    /// Stream `body` into the target until it ends, fails, goes idle, or
    /// `cancel` fires, then finalize.
    pub async fn run<S, B, E>(mut self, body: S, cancel: &CancellationToken) -> UploadOutcome
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        self.start_watchdog();
        let shared = Arc::clone(&self.shared);
        let mut body = std::pin::pin!(body);

        let (cause, error) = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    break (FinishCause::Cancelled, Some(Error::ShuttingDown));
                }
                () = shared.wake.notified() => {
                    let claimed = shared.lock().cause;
                    if let Some(cause) = claimed {
                        break (cause, None);
                    }
                }
                next = body.next() => match next {
                    Some(Ok(chunk)) => {
                        if let Err(e) = self.write_chunk(chunk.as_ref()).await {
                            break (FinishCause::WriteError, Some(e));
                        }
                    }
                    Some(Err(e)) => {
                        break (
                            FinishCause::TransportError,
                            Some(Error::UploadAborted(e.to_string())),
                        );
                    }
                    None => break (FinishCause::EndOfBody, None),
                },
            }
        };

        self.finish_with(cause, error).await
    }

    /// Finalize after the caller has written every chunk itself.
    pub async fn finish(self) -> UploadOutcome {
        self.finish_with(FinishCause::EndOfBody, None).await
    }

    fn start_watchdog(&mut self) {
        if self.watchdog.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let filename = self.filename.clone();

        self.watchdog = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.idle_check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let fired = {
                    let mut activity = shared.lock();
                    if activity.state != UploadState::Receiving {
                        return;
                    }
                    match activity.idle_cause(Instant::now(), &config) {
                        Some(cause) => Some(activity.claim(cause)),
                        None => None,
                    }
                };

                if let Some(cause) = fired {
                    match cause {
                        FinishCause::IdleGrace => tracing::info!(
                            "{}: no data for {:?}, treating upload as complete",
                            filename,
                            config.grace_window
                        ),
                        _ => tracing::warn!(
                            "{}: no data for {:?}, abandoning upload",
                            filename,
                            config.abandon_timeout
                        ),
                    }
                    shared.wake.notify_one();
                    return;
                }
            }
        }));
    }

    async fn finish_with(mut self, cause: FinishCause, error: Option<Error>) -> UploadOutcome {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }

        let winner = self.shared.lock().claim(cause);
        // Write failures always fail the upload, whoever claimed first.
        let (cause, mut error) = if winner == cause || cause == FinishCause::WriteError {
            (cause, error)
        } else {
            (winner, None)
        };

        if let Some(mut writer) = self.writer.take() {
            let closed = async {
                writer.flush().await?;
                writer.get_mut().sync_all().await
            }
            .await;
            if let Err(e) = closed {
                tracing::error!("Failed to flush {}: {}", self.target().display(), e);
                error.get_or_insert(Error::Io(e));
            }
        }

        let (bytes_written, elapsed) = {
            let activity = self.shared.lock();
            (activity.bytes_written, activity.started_at.elapsed())
        };

        let (state, keep, error) = match (cause, error) {
            (_, Some(e)) if e.discards_partial() => (UploadState::Failed, false, Some(e)),
            (FinishCause::EndOfBody | FinishCause::IdleGrace, None) if bytes_written > 0 => {
                (UploadState::Completed, true, None)
            }
            (FinishCause::EndOfBody | FinishCause::IdleGrace, None) => {
                (UploadState::Failed, false, Some(Error::EmptyUpload))
            }
            (FinishCause::Abandoned, None)
                if bytes_written > 0 && self.config.keep_partial_on_timeout =>
            {
                (UploadState::TimedOut, true, None)
            }
            (FinishCause::Abandoned, error) => (
                UploadState::TimedOut,
                false,
                error.or(Some(Error::UploadTimedOut(self.config.abandon_timeout.as_secs()))),
            ),
            (_, error) => (
                UploadState::Failed,
                false,
                error.or_else(|| Some(Error::Internal("upload ended without a cause".into()))),
            ),
        };

        let stored = if keep {
            match tokio::fs::metadata(self.target()).await {
                Ok(meta) => Some(StoredFile {
                    size: meta.len(),
                    last_modified: meta.modified().map(epoch_millis).unwrap_or(0),
                }),
                Err(e) => {
                    tracing::error!("Stored file {} vanished: {}", self.target().display(), e);
                    None
                }
            }
        } else {
            remove_partial(self.target()).await;
            None
        };

        self.shared.lock().state = state;
        self.finalized = true;

        let outcome = UploadOutcome {
            filename: self.filename.clone(),
            path: self.target().to_path_buf(),
            state,
            cause,
            bytes_written,
            elapsed,
            stored,
            error,
        };
        self.report(&outcome);
        outcome
    }

    fn report(&self, outcome: &UploadOutcome) {
        match (outcome.state, &outcome.stored, &outcome.error) {
            (UploadState::Completed, Some(stored), _) => {
                tracing::info!(
                    "Upload complete: {} ({} bytes, {:.2} MB/s, {} progress updates)",
                    outcome.filename,
                    stored.size,
                    outcome.throughput_mbps(),
                    self.throttle.emitted()
                );
                self.reporter.upload_complete(&outcome.filename, stored.size);
            }
            (UploadState::TimedOut, Some(_), _) => {
                tracing::warn!(
                    "Upload incomplete: {} ({} bytes kept)",
                    outcome.filename,
                    outcome.bytes_written
                );
                self.reporter
                    .upload_incomplete(&outcome.filename, outcome.bytes_written);
            }
            (_, _, error) => {
                let message = error
                    .as_ref()
                    .map_or_else(|| "upload failed".to_string(), ToString::to_string);
                tracing::warn!("Upload failed: {}: {}", outcome.filename, message);
                self.reporter.upload_failed(&outcome.filename, &message);
            }
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        if self.finalized {
            return;
        }

        // Only reached when the handler future is dropped mid-transfer,
        // e.g. hyper tore down the connection. Drop cannot await.
        self.shared.lock().state = UploadState::Failed;
        drop(self.writer.take());
        let target = self.claim.target();
        if let Err(e) = std::fs::remove_file(target) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove partial {}: {}", target.display(), e);
            }
        }
        tracing::warn!("Upload dropped before completion: {}", self.filename);
        self.reporter
            .upload_failed(&self.filename, "connection closed before completion");
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{ChannelReporter, ServerEvent};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fast_config() -> UploadConfig {
        UploadConfig {
            grace_window: Duration::from_millis(300),
            abandon_timeout: Duration::from_millis(1200),
            idle_check_interval: Duration::from_millis(50),
            progress_interval: Duration::from_secs(3600),
            progress_bytes: 1024 * 1024,
            keep_partial_on_timeout: true,
        }
    }

    async fn session(
        dir: &TempDir,
        name: &str,
        config: UploadConfig,
    ) -> (UploadSession, tokio::sync::mpsc::UnboundedReceiver<ServerEvent>) {
        let registry = UploadRegistry::new();
        let claim = registry.claim(&dir.path().join(name)).unwrap();
        let (reporter, rx) = ChannelReporter::new();
        let session = UploadSession::create(claim, name, config, Arc::new(reporter))
            .await
            .unwrap();
        (session, rx)
    }

    fn chunks(
        parts: Vec<Vec<u8>>,
    ) -> impl Stream<Item = std::result::Result<Vec<u8>, std::io::Error>> {
        futures::stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_end_of_body_completes() {
        let dir = TempDir::new().unwrap();
        let (session, mut rx) = session(&dir, "a.bin", fast_config()).await;

        let outcome = session
            .run(
                chunks(vec![vec![1u8; 1000], vec![2u8; 24]]),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.state, UploadState::Completed);
        assert_eq!(outcome.cause, FinishCause::EndOfBody);
        assert_eq!(outcome.stored.as_ref().unwrap().size, 1024);
        assert_eq!(std::fs::metadata(dir.path().join("a.bin")).unwrap().len(), 1024);

        let mut completes = 0;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::UploadComplete { final_size, .. } = event {
                assert_eq!(final_size, 1024);
                completes += 1;
            }
        }
        assert_eq!(completes, 1);
    }

    #[tokio::test]
    async fn test_empty_body_fails_and_removes_file() {
        let dir = TempDir::new().unwrap();
        let (session, mut rx) = session(&dir, "empty.bin", fast_config()).await;

        let outcome = session
            .run(chunks(Vec::new()), &CancellationToken::new())
            .await;

        assert_eq!(outcome.state, UploadState::Failed);
        assert!(matches!(outcome.error, Some(Error::EmptyUpload)));
        assert!(!dir.path().join("empty.bin").exists());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::UploadFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_error_discards_partial() {
        let dir = TempDir::new().unwrap();
        let (session, _rx) = session(&dir, "cut.bin", fast_config()).await;

        let body = futures::stream::iter(vec![
            Ok(vec![0u8; 4096]),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let outcome = session.run(body, &CancellationToken::new()).await;

        assert_eq!(outcome.state, UploadState::Failed);
        assert_eq!(outcome.cause, FinishCause::TransportError);
        assert!(matches!(outcome.error, Some(Error::UploadAborted(_))));
        assert!(!dir.path().join("cut.bin").exists());
    }

    #[tokio::test]
    async fn test_idle_grace_completes_without_end_of_body() {
        let dir = TempDir::new().unwrap();
        let (session, _rx) = session(&dir, "idle.bin", fast_config()).await;

        let body = chunks(vec![vec![7u8; 10_000]]).chain(futures::stream::pending());
        let started = Instant::now();
        let outcome = session.run(body, &CancellationToken::new()).await;

        assert_eq!(outcome.state, UploadState::Completed);
        assert_eq!(outcome.cause, FinishCause::IdleGrace);
        assert_eq!(outcome.stored.unwrap().size, 10_000);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_abandoned_without_data_is_removed() {
        let dir = TempDir::new().unwrap();
        let (session, _rx) = session(&dir, "never.bin", fast_config()).await;

        let body = futures::stream::pending::<std::result::Result<Vec<u8>, std::io::Error>>();
        let outcome = session.run(body, &CancellationToken::new()).await;

        assert_eq!(outcome.state, UploadState::TimedOut);
        assert_eq!(outcome.cause, FinishCause::Abandoned);
        assert!(matches!(outcome.error, Some(Error::UploadTimedOut(_))));
        assert!(!dir.path().join("never.bin").exists());
    }

    #[tokio::test]
    async fn test_abandoned_partial_kept_when_grace_disabled() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig {
            grace_window: Duration::ZERO,
            abandon_timeout: Duration::from_millis(400),
            ..fast_config()
        };
        let (session, mut rx) = session(&dir, "partial.bin", config).await;

        let body = chunks(vec![vec![1u8; 2048]]).chain(futures::stream::pending());
        let outcome = session.run(body, &CancellationToken::new()).await;

        assert_eq!(outcome.state, UploadState::TimedOut);
        assert_eq!(outcome.stored.as_ref().unwrap().size, 2048);
        assert!(dir.path().join("partial.bin").exists());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::UploadIncomplete {
                bytes_written: 2048,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_fails_in_flight_upload() {
        let dir = TempDir::new().unwrap();
        let (session, _rx) = session(&dir, "stop.bin", fast_config()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let body = chunks(vec![vec![1u8; 10]]).chain(futures::stream::pending());
        let outcome = session.run(body, &cancel).await;

        assert_eq!(outcome.state, UploadState::Failed);
        assert!(matches!(outcome.error, Some(Error::ShuttingDown)));
        assert!(!dir.path().join("stop.bin").exists());
    }

    #[tokio::test]
    async fn test_writes_after_claim_are_ignored() {
        let dir = TempDir::new().unwrap();
        let (mut session, _rx) = session(&dir, "late.bin", fast_config()).await;

        assert!(session.write_chunk(b"hello").await.unwrap());
        session.shared.lock().claim(FinishCause::IdleGrace);
        assert!(!session.write_chunk(b" world").await.unwrap());
        assert_eq!(session.bytes_written(), 5);

        let outcome = session.finish().await;
        assert_eq!(outcome.cause, FinishCause::IdleGrace);
        assert_eq!(std::fs::read(dir.path().join("late.bin")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("same.txt"), vec![9u8; 5000]).unwrap();
        let (mut session, _rx) = session(&dir, "same.txt", fast_config()).await;

        session.write_chunk(b"new").await.unwrap();
        let outcome = session.finish().await;

        assert_eq!(outcome.stored.unwrap().size, 3);
        assert_eq!(std::fs::read(dir.path().join("same.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_progress_is_rate_limited() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx) = session(&dir, "big.bin", fast_config()).await;

        let chunk = vec![0xABu8; 64 * 1024];
        for _ in 0..800 {
            session.write_chunk(&chunk).await.unwrap();
        }
        let outcome = session.finish().await;
        assert_eq!(outcome.bytes_written, 800 * 64 * 1024);

        let mut progress = 0;
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::UploadProgress {
                bytes_written,
                throughput_mbps,
                ..
            } = event
            {
                assert!(bytes_written <= outcome.bytes_written);
                assert!(throughput_mbps >= 0.0);
                progress += 1;
            }
        }
        assert_eq!(progress, 50);
    }

    #[tokio::test]
    async fn test_dropped_session_removes_partial() {
        let dir = TempDir::new().unwrap();
        let (mut session, mut rx) = session(&dir, "dropped.bin", fast_config()).await;
        session.write_chunk(b"abc").await.unwrap();
        drop(session);

        assert!(!dir.path().join("dropped.bin").exists());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::UploadFailed { .. }
        ));
    }

    #[test]
    fn test_idle_cause_tiers() {
        let config = fast_config();
        let start = Instant::now();
        let mut activity = Activity {
            state: UploadState::Receiving,
            cause: None,
            bytes_written: 0,
            started_at: start,
            last_chunk_at: None,
        };

        assert_eq!(
            activity.idle_cause(start + Duration::from_millis(500), &config),
            None
        );
        assert_eq!(
            activity.idle_cause(start + Duration::from_millis(1300), &config),
            Some(FinishCause::Abandoned)
        );

        activity.bytes_written = 10;
        activity.last_chunk_at = Some(start);
        assert_eq!(
            activity.idle_cause(start + Duration::from_millis(350), &config),
            Some(FinishCause::IdleGrace)
        );

        assert_eq!(activity.claim(FinishCause::EndOfBody), FinishCause::EndOfBody);
        assert_eq!(activity.claim(FinishCause::IdleGrace), FinishCause::EndOfBody);
        assert_eq!(activity.state, UploadState::Finalizing);
        assert_eq!(
            activity.idle_cause(start + Duration::from_secs(10), &config),
            None
        );
    }
}
