//! Platform trash capability.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::OpsError;

/// Access to the operating system's trash.
pub trait TrashFacility: Send + Sync {
    /// Whether trashing works on this platform at all.
    fn is_available(&self) -> bool;

    /// Set up a batched transaction. Failing here means the batched path is
    /// unusable and the caller should use [`delete_legacy`](Self::delete_legacy).
    fn begin(&self) -> Result<Box<dyn TrashTransaction>, OpsError>;

    /// Trash every path in one call with a single success flag.
    fn delete_legacy(&self, paths: &[PathBuf]) -> Result<(), OpsError>;
}

/// A batched trash operation being assembled.
pub trait TrashTransaction: Send {
    /// Register one path. A failure affects only this path.
    fn register(&mut self, path: &Path) -> Result<(), OpsError>;

    /// Execute every registered path as one operation.
    fn perform(self: Box<Self>) -> Result<(), OpsError>;
}

/// Trash backed by the `trash` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsTrash;

struct OsTrashTransaction {
    items: Vec<PathBuf>,
}

/// Resolve to an absolute path without following a final symlink, so a link
/// is trashed rather than its target.
fn resolve(path: &Path) -> Result<PathBuf, OpsError> {
    let absolute = std::path::absolute(path).map_err(|e| OpsError::io(path, e))?;
    fs::symlink_metadata(&absolute).map_err(|e| OpsError::io(path, e))?;
    Ok(absolute)
}

impl TrashFacility for OsTrash {
    fn is_available(&self) -> bool {
        cfg!(any(
            windows,
            target_os = "macos",
            all(unix, not(any(target_os = "ios", target_os = "android")))
        ))
    }

    fn begin(&self) -> Result<Box<dyn TrashTransaction>, OpsError> {
        if !self.is_available() {
            return Err(OpsError::TrashUnavailable);
        }
        Ok(Box::new(OsTrashTransaction { items: Vec::new() }))
    }

    fn delete_legacy(&self, paths: &[PathBuf]) -> Result<(), OpsError> {
        let resolved = paths
            .iter()
            .map(|path| resolve(path))
            .collect::<Result<Vec<_>, _>>()?;
        trash::delete_all(&resolved)?;
        Ok(())
    }
}

impl TrashTransaction for OsTrashTransaction {
    fn register(&mut self, path: &Path) -> Result<(), OpsError> {
        let resolved = resolve(path)?;
        debug!("Registered for trash: {}", resolved.display());
        self.items.push(resolved);
        Ok(())
    }

    fn perform(self: Box<Self>) -> Result<(), OpsError> {
        if self.items.is_empty() {
            return Ok(());
        }
        trash::delete_all(&self.items)?;
        Ok(())
    }
}

/// Stand-in for platforms without a trash.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTrash;

impl TrashFacility for UnavailableTrash {
    fn is_available(&self) -> bool {
        false
    }

    fn begin(&self) -> Result<Box<dyn TrashTransaction>, OpsError> {
        Err(OpsError::TrashUnavailable)
    }

    fn delete_legacy(&self, _paths: &[PathBuf]) -> Result<(), OpsError> {
        Err(OpsError::TrashUnavailable)
    }
}

/// Check the platform and pick a trash facility.
pub fn platform_trash() -> std::sync::Arc<dyn TrashFacility> {
    if OsTrash.is_available() {
        std::sync::Arc::new(OsTrash)
    } else {
        tracing::warn!("Trash operations disabled on this platform");
        std::sync::Arc::new(UnavailableTrash)
    }
}
