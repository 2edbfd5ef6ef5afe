//! Embedded HTTP transfer server.
//!
//! Browsers on the same network open the advertised URL, browse the
//! shared directory, download files and upload new ones as raw request
//! bodies.
//!
//! ## API Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | / | Browser page |
//! | GET | /styles.css, /scripts.js | Page assets |
//! | GET | /api/files?path= | Directory listing (JSON) |
//! | GET | /api/status | Server status |
//! | GET | /navigate?path= | Change the current directory |
//! | GET | /navigate/up | Move to the parent directory |
//! | GET | /files/{name} | Download from the current directory |
//! | DELETE | /files/{name} | Delete from the current directory |
//! | POST | /upload-simple?filename= | Upload; the body is the file |
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped ──start──► Starting ──bind ok──► Running(addr) ──stop──► Stopped
//!                        └──bind failed──► Error(message)
//! ```
//!
//! Only one server runs per process.

pub mod assets;
pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::Navigator;
use crate::config::{Config, ServerConfig, UploadConfig};
use crate::error::{Error, Result};
use crate::network;
use crate::reporter::SharedReporter;
use crate::sandbox::PathSandbox;
use crate::upload::UploadRegistry;

use self::state::{AppState, SharedState};

static INSTANCE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Bind to localhost only
    pub localhost_only: bool,
    /// How long `stop` waits for open connections to drain
    pub stop_timeout: Duration,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            localhost_only: false,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ServerConfig> for WebServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            port: config.port,
            localhost_only: config.localhost_only,
            ..Self::default()
        }
    }
}

impl WebServerConfig {
    /// Get the bind address for the server.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        if self.localhost_only {
            SocketAddr::from(([127, 0, 0, 1], self.port))
        } else {
            SocketAddr::from(([0, 0, 0, 0], self.port))
        }
    }
}

/// Listen state of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    /// Not listening
    Stopped,
    /// Binding the listener
    Starting,
    /// Accepting connections on the given address
    Running(SocketAddr),
    /// Bind or serve failed
    Error(String),
}

impl ServerStatus {
    /// Short lowercase name.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running(_) => "running",
            Self::Error(_) => "error",
        }
    }
}

/// Build the router for one server run.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/styles.css", get(assets::serve_static))
        .route("/scripts.js", get(assets::serve_static))
        .route("/api/files", get(handlers::list_files))
        .route("/api/status", get(handlers::status))
        .route("/navigate", get(handlers::navigate))
        .route("/navigate/up", get(handlers::navigate_up))
        .route(
            "/files/{*name}",
            get(handlers::download).delete(handlers::delete_file),
        )
        .route(
            "/upload-simple",
            post(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Process-wide single-instance token.
#[derive(Debug)]
struct InstanceGuard;

impl InstanceGuard {
    fn acquire() -> Result<Self> {
        INSTANCE_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| Error::AlreadyRunning)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        INSTANCE_ACTIVE.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct RunningServer {
    local_addr: SocketAddr,
    url: Option<String>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    _instance: InstanceGuard,
}

/// The transfer server.
///
/// The navigator and upload registry belong to the server rather than to
/// a run, so the current directory survives a stop and start and local
/// callers can navigate while the server is stopped.
pub struct TransferServer {
    config: WebServerConfig,
    navigator: Arc<Navigator>,
    uploads: Arc<UploadRegistry>,
    upload_config: UploadConfig,
    reporter: SharedReporter,
    status: Arc<watch::Sender<ServerStatus>>,
    running: Mutex<Option<RunningServer>>,
}

impl std::fmt::Debug for TransferServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferServer")
            .field("config", &self.config)
            .field("navigator", &self.navigator)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl TransferServer {
    /// Create a server from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage root is missing or `start_dir`
    /// is not a directory inside it.
    pub fn new(config: &Config, reporter: SharedReporter) -> Result<Self> {
        config.validate()?;
        let sandbox = PathSandbox::new(&config.storage.root)?;
        let navigator = match config.storage.start_dir.as_deref() {
            Some(start) => Navigator::with_start(sandbox, start)?,
            None => Navigator::new(sandbox),
        };

        Ok(Self::with_navigator(
            WebServerConfig::from(&config.server),
            Arc::new(navigator),
            config.upload.clone(),
            reporter,
        ))
    }

    /// Create a server around an existing navigator.
    #[must_use]
    pub fn with_navigator(
        config: WebServerConfig,
        navigator: Arc<Navigator>,
        upload_config: UploadConfig,
        reporter: SharedReporter,
    ) -> Self {
        let (status, _) = watch::channel(ServerStatus::Stopped);
        Self {
            config,
            navigator,
            uploads: UploadRegistry::new(),
            upload_config,
            reporter,
            status: Arc::new(status),
            running: Mutex::new(None),
        }
    }

    /// The navigator local callers use to change the current directory.
    #[must_use]
    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    /// Current listen state.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    /// Watch listen state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Number of uploads in flight.
    #[must_use]
    pub fn active_uploads(&self) -> usize {
        self.uploads.active_count()
    }

    /// Bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.local_addr)
    }

    /// Advertised LAN URL while running, `None` if no LAN address is known.
    pub async fn url(&self) -> Option<String> {
        self.running.lock().await.as_ref().and_then(|s| s.url.clone())
    }

    /// Bind and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRunning`] if a server is already running in
    /// this process, or [`Error::Bind`] if the port cannot be bound.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let instance = InstanceGuard::acquire()?;

        self.status.send_replace(ServerStatus::Starting);

        let addr = self.config.bind_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => return Err(self.fail(Error::Bind { addr, source })),
        };
        let local_addr = listener.local_addr().map_err(|e| self.fail(e.into()))?;

        let lan_ip = if self.config.localhost_only {
            None
        } else {
            network::local_ipv4()
        };
        let url = lan_ip.map(|ip| network::advertised_url(Some(ip), local_addr.port()));
        if url.is_none() && !self.config.localhost_only {
            tracing::warn!("No LAN address found; server is only reachable locally");
        }

        let shutdown = CancellationToken::new();
        let state = Arc::new(AppState {
            navigator: Arc::clone(&self.navigator),
            uploads: Arc::clone(&self.uploads),
            upload_config: self.upload_config.clone(),
            reporter: self.reporter.clone(),
            shutdown: shutdown.clone(),
            status: self.status.subscribe(),
            local_addr,
            url: url.clone(),
        });

        let app = router(state);
        let signal = shutdown.clone();
        let status = Arc::clone(&self.status);
        let reporter = self.reporter.clone();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
                status.send_replace(ServerStatus::Error(e.to_string()));
                reporter.server_error(&e.to_string());
            }
        });

        let advertised = network::advertised_url(lan_ip, local_addr.port());
        tracing::info!(
            "Sharing {} at {} (bound to {})",
            self.navigator.sandbox().root().display(),
            advertised,
            local_addr
        );

        *running = Some(RunningServer {
            local_addr,
            url,
            shutdown,
            task,
            _instance: instance,
        });
        self.status.send_replace(ServerStatus::Running(local_addr));
        self.reporter.server_started(&advertised);

        Ok(local_addr)
    }

    /// Stop serving.
    ///
    /// Closes the listener, fails uploads still streaming, and waits up to
    /// the configured stop timeout for connections to drain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] if the server is not running.
    pub async fn stop(&self) -> Result<()> {
        let server = self.running.lock().await.take().ok_or(Error::NotRunning)?;

        tracing::info!("Stopping server on {}", server.local_addr);
        server.shutdown.cancel();

        let abort = server.task.abort_handle();
        if tokio::time::timeout(self.config.stop_timeout, server.task)
            .await
            .is_err()
        {
            tracing::warn!(
                "Connections still open after {:?}, closing them",
                self.config.stop_timeout
            );
            abort.abort();
        }

        self.status.send_replace(ServerStatus::Stopped);
        self.reporter.server_stopped();
        Ok(())
    }

    fn fail(&self, err: Error) -> Error {
        tracing::error!("Failed to start server: {}", err);
        self.status.send_replace(ServerStatus::Error(err.to_string()));
        self.reporter.server_error(&err.to_string());
        err
    }
}

impl Drop for TransferServer {
    fn drop(&mut self) {
        if let Some(server) = self.running.get_mut().take() {
            server.shutdown.cancel();
            server.task.abort();
        }
    }
}
