//! Observer interface for server and upload state changes.
//!
//! The core never renders anything. It reports to a [`ProgressReporter`]
//! supplied at construction, and the embedding UI decides what to show.
//! Calls are fire-and-forget: implementations must return promptly and the
//! core never waits on them. [`ChannelReporter`] is the non-blocking
//! adapter for UIs that prefer to consume events from a queue.

use std::sync::Arc;

use tokio::sync::mpsc;

/// Receives notifications from the transfer server.
///
/// Every method has an empty default body so implementors only override
/// what they display.
pub trait ProgressReporter: Send + Sync {
    /// The server is listening and reachable at `url`.
    fn server_started(&self, url: &str) {
        let _ = url;
    }

    /// The server stopped listening.
    fn server_stopped(&self) {}

    /// Binding or serving failed.
    fn server_error(&self, message: &str) {
        let _ = message;
    }

    /// Rate-limited progress for an upload in flight.
    fn upload_progress(&self, filename: &str, bytes_written: u64, throughput_mbps: f64) {
        let _ = (filename, bytes_written, throughput_mbps);
    }

    /// An upload completed and the file is stored.
    fn upload_complete(&self, filename: &str, final_size: u64) {
        let _ = (filename, final_size);
    }

    /// An upload was abandoned but its partial content was kept.
    fn upload_incomplete(&self, filename: &str, bytes_written: u64) {
        let _ = (filename, bytes_written);
    }

    /// An upload failed and its partial file was removed.
    fn upload_failed(&self, filename: &str, message: &str) {
        let _ = (filename, message);
    }

    /// A directory could not be read.
    fn directory_error(&self, path: &str, message: &str) {
        let _ = (path, message);
    }
}

/// Shared handle to a reporter.
pub type SharedReporter = Arc<dyn ProgressReporter>;

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}

/// A notification, as delivered by [`ChannelReporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// See [`ProgressReporter::server_started`]
    ServerStarted {
        /// Advertised URL
        url: String,
    },
    /// See [`ProgressReporter::server_stopped`]
    ServerStopped,
    /// See [`ProgressReporter::server_error`]
    ServerError {
        /// Error message
        message: String,
    },
    /// See [`ProgressReporter::upload_progress`]
    UploadProgress {
        /// File being uploaded
        filename: String,
        /// Bytes written so far
        bytes_written: u64,
        /// Average throughput in MB/s
        throughput_mbps: f64,
    },
    /// See [`ProgressReporter::upload_complete`]
    UploadComplete {
        /// File that was stored
        filename: String,
        /// Final size in bytes
        final_size: u64,
    },
    /// See [`ProgressReporter::upload_incomplete`]
    UploadIncomplete {
        /// File that was kept
        filename: String,
        /// Bytes kept
        bytes_written: u64,
    },
    /// See [`ProgressReporter::upload_failed`]
    UploadFailed {
        /// File that failed
        filename: String,
        /// Error message
        message: String,
    },
    /// See [`ProgressReporter::directory_error`]
    DirectoryError {
        /// Directory that failed
        path: String,
        /// Error message
        message: String,
    },
}

/// Reporter that forwards every notification into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: ServerEvent) {
        // A dropped receiver just means nobody is watching.
        let _ = self.tx.send(event);
    }
}

impl ProgressReporter for ChannelReporter {
    fn server_started(&self, url: &str) {
        self.emit(ServerEvent::ServerStarted {
            url: url.to_string(),
        });
    }

    fn server_stopped(&self) {
        self.emit(ServerEvent::ServerStopped);
    }

    fn server_error(&self, message: &str) {
        self.emit(ServerEvent::ServerError {
            message: message.to_string(),
        });
    }

    fn upload_progress(&self, filename: &str, bytes_written: u64, throughput_mbps: f64) {
        self.emit(ServerEvent::UploadProgress {
            filename: filename.to_string(),
            bytes_written,
            throughput_mbps,
        });
    }

    fn upload_complete(&self, filename: &str, final_size: u64) {
        self.emit(ServerEvent::UploadComplete {
            filename: filename.to_string(),
            final_size,
        });
    }

    fn upload_incomplete(&self, filename: &str, bytes_written: u64) {
        self.emit(ServerEvent::UploadIncomplete {
            filename: filename.to_string(),
            bytes_written,
        });
    }

    fn upload_failed(&self, filename: &str, message: &str) {
        self.emit(ServerEvent::UploadFailed {
            filename: filename.to_string(),
            message: message.to_string(),
        });
    }

    fn directory_error(&self, path: &str, message: &str) {
        self.emit(ServerEvent::DirectoryError {
            path: path.to_string(),
            message: message.to_string(),
        });
    }
}
