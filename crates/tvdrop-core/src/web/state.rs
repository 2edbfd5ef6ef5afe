//! Application state shared by every HTTP handler.
//!
//! One `AppState` is built per server run. The navigator and upload
//! registry outlive individual runs so local callers keep their current
//! directory across a stop and start.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::Navigator;
use crate::config::UploadConfig;
use crate::reporter::SharedReporter;
use crate::upload::UploadRegistry;

use super::ServerStatus;

/// Shared application state for all HTTP handlers.
pub struct AppState {
    /// Owner of the current directory
    pub navigator: Arc<Navigator>,
    /// Targets with an upload in flight
    pub uploads: Arc<UploadRegistry>,
    /// Upload session tuning
    pub upload_config: UploadConfig,
    /// Observer for server and upload events
    pub reporter: SharedReporter,
    /// Cancelled when the server stops
    pub shutdown: CancellationToken,
    /// Listen state of the owning server
    pub status: watch::Receiver<ServerStatus>,
    /// Bound address
    pub local_addr: SocketAddr,
    /// Advertised LAN URL, if a LAN address is known
    pub url: Option<String>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("navigator", &self.navigator)
            .field("active_uploads", &self.uploads.active_count())
            .field("status", &*self.status.borrow())
            .field("local_addr", &self.local_addr)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Thread-safe reference to application state.
pub type SharedState = Arc<AppState>;
