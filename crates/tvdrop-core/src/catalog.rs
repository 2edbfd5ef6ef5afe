//! Directory listing and the shared current directory.
//!
//! [`list_directory`] produces a fresh, sorted view of one directory on
//! every call; nothing is cached. [`Navigator`] owns the process-wide
//! current directory and is the single writer for it: HTTP handlers and
//! local callers both navigate through it, and a listing holds the read
//! guard for as long as it reads the directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::sandbox::PathSandbox;

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Whether this entry is a directory
    pub is_directory: bool,
    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification time in milliseconds since the Unix epoch
    pub last_modified: i64,
}

/// Result of listing a directory.
///
/// Read failures never propagate as faults: `entries` is then empty and
/// `error` describes what went wrong.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Directory that was listed
    pub directory: PathBuf,
    /// Sorted entries
    pub entries: Vec<DirectoryEntry>,
    /// Error encountered while reading, if any
    pub error: Option<String>,
}

impl Listing {
    /// Whether the directory could be read.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Convert a filesystem timestamp to epoch milliseconds.
#[must_use]
pub fn epoch_millis(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp_millis()
}

/// List the immediate children of `directory`.
///
/// Directories come first, then files; each group is ordered by name
/// (byte-wise, case-sensitive). Entries whose metadata cannot be read are
/// skipped.
pub fn list_directory(directory: &Path) -> Listing {
    let read_dir = match std::fs::read_dir(directory) {
        Ok(rd) => rd,
        Err(e) => {
            tracing::warn!("Failed to read directory {}: {}", directory.display(), e);
            return Listing {
                directory: directory.to_path_buf(),
                entries: Vec::new(),
                error: Some(format!("Cannot access {}: {e}", directory.display())),
            };
        }
    };

    let mut entries: Vec<DirectoryEntry> = read_dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let metadata = match std::fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    return None;
                }
            };
            let is_directory = metadata.is_dir();
            Some(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory,
                size: (!is_directory).then_some(metadata.len()),
                last_modified: metadata.modified().map(epoch_millis).unwrap_or(0),
            })
        })
        .collect();

    sort_entries(&mut entries);

    Listing {
        directory: directory.to_path_buf(),
        entries,
        error: None,
    }
}

/// Sort directories before files, then by name.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Owner of the current directory.
#[derive(Debug)]
pub struct Navigator {
    sandbox: PathSandbox,
    current: RwLock<PathBuf>,
}

impl Navigator {
    /// Create a navigator starting at the sandbox root.
    #[must_use]
    pub fn new(sandbox: PathSandbox) -> Self {
        let current = RwLock::new(sandbox.root().to_path_buf());
        Self { sandbox, current }
    }

    /// Create a navigator starting at `start`, which must be inside the root.
    pub fn with_start(sandbox: PathSandbox, start: &str) -> Result<Self> {
        let start = sandbox.resolve_dir(sandbox.root(), start)?;
        Ok(Self {
            sandbox,
            current: RwLock::new(start),
        })
    }

    /// The sandbox every path goes through.
    #[must_use]
    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Snapshot of the current directory.
    pub async fn current(&self) -> PathBuf {
        self.current.read().await.clone()
    }

    /// Navigate to `path` (absolute, or relative to the current directory).
    ///
    /// Calling this twice with the same valid path leaves the same current
    /// directory.
    pub async fn navigate(&self, path: &str) -> Result<PathBuf> {
        let mut current = self.current.write().await;
        let target = self.sandbox.resolve_dir(&current, path)?;
        tracing::debug!("Navigated to {}", target.display());
        current.clone_from(&target);
        Ok(target)
    }

    /// Set the current directory from a local caller.
    pub async fn set_current(&self, directory: &Path) -> Result<PathBuf> {
        let path = directory
            .to_str()
            .ok_or_else(|| Error::InvalidName(directory.display().to_string()))?;
        self.navigate(path).await
    }

    /// Move to the parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AtRoot`] when already at the root.
    pub async fn navigate_up(&self) -> Result<PathBuf> {
        let mut current = self.current.write().await;
        let parent = self.sandbox.parent_of(&current)?;
        current.clone_from(&parent);
        Ok(parent)
    }

    /// List the current directory.
    pub async fn list_current(&self) -> Listing {
        // The read guard stays alive so navigation waits for the listing.
        let current = self.current.read().await;
        list_blocking(current.clone()).await
    }

    /// List another directory inside the root without navigating to it.
    pub async fn list_path(&self, path: &str) -> Result<Listing> {
        let current = self.current().await;
        let dir = self.sandbox.resolve_dir(&current, path)?;
        Ok(list_blocking(dir).await)
    }
}

/// Run [`list_directory`] off the async workers; media folders can be large.
async fn list_blocking(directory: PathBuf) -> Listing {
    let fallback = directory.clone();
    tokio::task::spawn_blocking(move || list_directory(&directory))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Listing task for {} failed: {}", fallback.display(), e);
            Listing {
                directory: fallback,
                entries: Vec::new(),
                error: Some(format!("listing failed: {e}")),
            }
        })
}
