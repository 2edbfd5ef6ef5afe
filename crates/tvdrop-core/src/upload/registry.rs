//! One writer per upload target.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

/// Set of targets with an upload in flight.
#[derive(Debug, Default)]
pub struct UploadRegistry {
    active: Mutex<HashSet<PathBuf>>,
}

impl UploadRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve `target` for a new upload.
    ///
    /// The reservation is released when the returned claim is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadInProgress`] if another upload holds it.
    pub fn claim(self: &Arc<Self>, target: &Path) -> Result<TargetClaim> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(target.to_path_buf()) {
            let name = target
                .file_name()
                .map_or_else(|| target.display().to_string(), |n| n.to_string_lossy().into_owned());
            return Err(Error::UploadInProgress(name));
        }

        Ok(TargetClaim {
            registry: Arc::clone(self),
            target: target.to_path_buf(),
        })
    }

    /// Number of uploads in flight.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, target: &Path) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target);
    }
}

/// Exclusive right to write one upload target.
#[derive(Debug)]
pub struct TargetClaim {
    registry: Arc<UploadRegistry>,
    target: PathBuf,
}

impl TargetClaim {
    /// The reserved path.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Drop for TargetClaim {
    fn drop(&mut self) {
        self.registry.release(&self.target);
    }
}
