//! Path containment for every client-supplied path.
//!
//! [`PathSandbox`] is the only gate between untrusted input and the
//! filesystem. Every candidate path is canonicalized (which collapses `.`
//! and `..` and follows symlinks) and then checked component-wise against
//! the canonical root, so `/srv/share-evil` never matches `/srv/share`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tvdrop_core::sandbox::PathSandbox;
//!
//! let sandbox = PathSandbox::new("/srv/share")?;
//! let dir = sandbox.resolve_dir(sandbox.root(), "movies/../music")?;
//! assert!(dir.starts_with(sandbox.root()));
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// What kind of entry a resolved path must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Must be a directory (navigation, listing)
    Directory,
    /// Must be a regular file (download, delete)
    File,
}

/// Validates and resolves client paths against a fixed root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`.
    ///
    /// The root is canonicalized once here and is immutable afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(root.display().to_string()),
            _ => Error::Io(e),
        })?;

        if !canonical.is_dir() {
            return Err(Error::NotADirectory(canonical.display().to_string()));
        }

        Ok(Self { root: canonical })
    }

    /// The canonical sandbox root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an already-canonical path is the root or lies beneath it.
    #[must_use]
    pub fn contains(&self, canonical: &Path) -> bool {
        canonical.starts_with(&self.root)
    }

    /// Resolve `candidate` (absolute, or relative to `base`) to a path of
    /// the requested kind inside the root.
    ///
    /// # Errors
    ///
    /// - [`Error::OutsideRoot`] if the canonical form escapes the root
    /// - [`Error::NotFound`] if the target does not exist
    /// - [`Error::NotADirectory`] / [`Error::NotAFile`] on a kind mismatch
    pub fn resolve(&self, base: &Path, candidate: &str, kind: EntryKind) -> Result<PathBuf> {
        let joined = if Path::new(candidate).is_absolute() {
            PathBuf::from(candidate)
        } else {
            base.join(candidate)
        };

        let canonical = match std::fs::canonicalize(&joined) {
            Ok(path) => path,
            // NUL bytes and other malformed input never reach the filesystem.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                return Err(Error::InvalidName(candidate.to_string()));
            }
            // A path that walks through a regular file is just as missing.
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ) => {
                // A missing target that would still land outside the root is
                // reported as an escape, not as "not found".
                if !self.contains(&lexical_normalize(&joined)) {
                    return Err(Error::OutsideRoot(candidate.to_string()));
                }
                return Err(Error::NotFound(candidate.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        if !self.contains(&canonical) {
            tracing::warn!("Rejected path outside root: {}", candidate);
            return Err(Error::OutsideRoot(candidate.to_string()));
        }

        let metadata = std::fs::metadata(&canonical)?;
        match kind {
            EntryKind::Directory if !metadata.is_dir() => {
                Err(Error::NotADirectory(candidate.to_string()))
            }
            EntryKind::File if !metadata.is_file() => Err(Error::NotAFile(candidate.to_string())),
            _ => Ok(canonical),
        }
    }

    /// Resolve a directory for navigation or listing.
    pub fn resolve_dir(&self, base: &Path, candidate: &str) -> Result<PathBuf> {
        self.resolve(base, candidate, EntryKind::Directory)
    }

    /// Resolve a regular file for download or deletion.
    pub fn resolve_file(&self, base: &Path, candidate: &str) -> Result<PathBuf> {
        self.resolve(base, candidate, EntryKind::File)
    }

    /// Resolve the target of a new upload named `name` inside `dir`.
    ///
    /// The name must be a single plain path component. The target may not
    /// exist yet; if it does, it must be a regular file inside the root
    /// (a symlink pointing elsewhere is refused).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`], [`Error::OutsideRoot`],
    /// [`Error::NotAFile`], or [`Error::NotFound`] if `dir` has gone away.
    pub fn resolve_new_file(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;

        let dir = std::fs::canonicalize(dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                Error::NotFound(dir.display().to_string())
            }
            _ => Error::Io(e),
        })?;
        if !self.contains(&dir) {
            return Err(Error::OutsideRoot(dir.display().to_string()));
        }

        let target = dir.join(name);
        match std::fs::symlink_metadata(&target) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let resolved = std::fs::canonicalize(&target)
                    .map_err(|_| Error::NotAFile(name.to_string()))?;
                if !self.contains(&resolved) {
                    return Err(Error::OutsideRoot(name.to_string()));
                }
                if !resolved.is_file() {
                    return Err(Error::NotAFile(name.to_string()));
                }
                Ok(target)
            }
            Ok(meta) if !meta.is_file() => Err(Error::NotAFile(name.to_string())),
            Ok(_) => Ok(target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(target),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Parent of `current`, refusing to climb above the root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AtRoot`] if `current` already is the root, or
    /// [`Error::OutsideRoot`] if the parent is not inside the root.
    pub fn parent_of(&self, current: &Path) -> Result<PathBuf> {
        if current == self.root {
            return Err(Error::AtRoot);
        }

        let parent = current.parent().ok_or(Error::AtRoot)?.to_path_buf();

        if !self.contains(&parent) {
            return Err(Error::OutsideRoot(parent.display().to_string()));
        }

        Ok(parent)
    }
}

/// Check that a client file name is a single, plain path component.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] for empty names, `.`/`..`, names with
/// separators or NUL bytes, and absolute paths.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidName(name.to_string()));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::InvalidName(name.to_string())),
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
