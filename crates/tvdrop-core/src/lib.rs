//! # TvDrop Core Library
//!
//! `tvdrop-core` provides the embedded file-transfer server behind TvDrop:
//! browsers on the local network browse one shared directory, download
//! files from it and upload large files into it as single streamed
//! requests.
//!
//! ## Modules
//!
//! - [`sandbox`] - Path containment for every client-supplied path
//! - [`catalog`] - Directory listing and the shared current directory
//! - [`upload`] - Streaming upload sessions with idle-based completion
//! - [`reporter`] - Observer interface for server and upload events
//! - [`web`] - HTTP transfer server
//! - [`network`] - Local address discovery
//! - [`mime`] - Content types for downloads
//! - [`config`] - Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tvdrop_core::{config::Config, reporter::NoopReporter, web::TransferServer};
//!
//! let config = Config::load()?;
//! let server = TransferServer::new(&config, Arc::new(NoopReporter))?;
//! server.start().await?;
//! // ...
//! server.stop().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod mime;
pub mod network;
pub mod reporter;
pub mod sandbox;
pub mod upload;

#[cfg(feature = "web")]
pub mod web;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;
