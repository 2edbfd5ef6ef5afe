//! Error types for TvDrop.
//!
//! This module provides a unified error type for all TvDrop operations,
//! with specific error variants for different failure modes.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A specialized `Result` type for TvDrop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for TvDrop.
#[derive(Error, Debug)]
pub enum Error {
    /// Path resolves outside the sandbox root
    #[error("path is outside the shared root: {0}")]
    OutsideRoot(String),

    /// Path does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Path exists but is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Path exists but is not a regular file
    #[error("not a regular file: {0}")]
    NotAFile(String),

    /// File name supplied by a client is not a single plain component
    #[error("invalid file name: {0}")]
    InvalidName(String),

    /// Navigation above the sandbox root was requested
    #[error("already at the top level directory")]
    AtRoot,

    /// Another upload is writing to the same target
    #[error("upload already in progress for '{0}'")]
    UploadInProgress(String),

    /// Upload finished without a single byte
    #[error("no data received")]
    EmptyUpload,

    /// Upload abandoned after the long idle timeout
    #[error("upload timed out after {0} seconds of inactivity")]
    UploadTimedOut(u64),

    /// Transport failed while the body was streaming
    #[error("upload aborted: {0}")]
    UploadAborted(String),

    /// Server is stopping and the operation was cancelled
    #[error("server is shutting down")]
    ShuttingDown,

    /// Could not bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// A server is already running in this process
    #[error("server is already running")]
    AlreadyRunning,

    /// Server is not running
    #[error("server is not running")]
    NotRunning,

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns whether this error means a client-supplied path was refused
    /// by the sandbox.
    #[must_use]
    pub const fn is_path_rejection(&self) -> bool {
        matches!(
            self,
            Self::OutsideRoot(_)
                | Self::NotFound(_)
                | Self::NotADirectory(_)
                | Self::NotAFile(_)
                | Self::InvalidName(_)
                | Self::AtRoot
        )
    }

    /// Returns whether the partial upload target should be removed after
    /// this error.
    #[must_use]
    pub const fn discards_partial(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::UploadAborted(_) | Self::ShuttingDown | Self::EmptyUpload
        )
    }
}
