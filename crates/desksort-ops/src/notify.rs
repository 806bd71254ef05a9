//! Best-effort change notifications for desktop file managers.
//!
//! Nothing here affects correctness. Every failure is logged and dropped.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use desksort_core::NotifyMode;
use indexmap::IndexSet;
use tracing::{debug, info, trace, warn};

use crate::OpsError;

/// Kind of change reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellEvent {
    /// The contents of a directory changed.
    UpdateDir,
    /// An item was removed.
    Delete,
}

impl fmt::Display for ShellEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateDir => write!(f, "UPDATEDIR"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Live identifier of a shell item, obtained from an existing path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(PathBuf);

impl ItemId {
    pub fn new(resolved: impl Into<PathBuf>) -> Self {
        Self(resolved.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// Platform change-notification primitives.
pub trait ShellBackend: Send + Sync {
    /// Resolve a path to a live item identifier. `None` when the item no
    /// longer exists or cannot be parsed.
    fn resolve_id(&self, path: &Path) -> Option<ItemId>;

    /// Identifier-based notification.
    fn notify_id(&self, event: ShellEvent, id: &ItemId) -> Result<(), OpsError>;

    /// Raw path notification.
    fn notify_path(&self, event: ShellEvent, path: &Path) -> Result<(), OpsError>;

    /// Desktop folders whose icons should refresh when anything below them
    /// changes.
    fn desktop_roots(&self) -> Vec<PathBuf> {
        platform_desktop_roots()
    }
}

/// User desktop plus the shared public desktop where the platform has one.
pub fn platform_desktop_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(desktop) = dirs::desktop_dir() {
        roots.push(desktop);
    }
    #[cfg(windows)]
    if let Some(public) = std::env::var_os("PUBLIC") {
        roots.push(PathBuf::from(public).join("Desktop"));
    }
    roots
}

/// Backend for desktops without a change-notification bus; file managers
/// there watch the filesystem themselves, so notifications are only traced.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingShell;

impl ShellBackend for LoggingShell {
    fn resolve_id(&self, path: &Path) -> Option<ItemId> {
        fs::canonicalize(path).ok().map(ItemId)
    }

    fn notify_id(&self, event: ShellEvent, id: &ItemId) -> Result<(), OpsError> {
        trace!("shell {event} (id): {}", id.as_path().display());
        Ok(())
    }

    fn notify_path(&self, event: ShellEvent, path: &Path) -> Result<(), OpsError> {
        trace!("shell {event} (path): {}", path.display());
        Ok(())
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Relays changed paths to the shell using the configured strategy.
pub struct ShellNotifier {
    backend: Arc<dyn ShellBackend>,
    mode: NotifyMode,
}

impl fmt::Debug for ShellNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellNotifier")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ShellNotifier {
    pub fn new(backend: Arc<dyn ShellBackend>, mode: NotifyMode) -> Self {
        Self { backend, mode }
    }

    pub fn mode(&self) -> NotifyMode {
        self.mode
    }

    /// Report that the contents of `dir` changed.
    pub fn notify_updatedir(&self, dir: &Path) {
        self.notify(ShellEvent::UpdateDir, dir);
    }

    /// Report that `path` was removed.
    pub fn notify_delete(&self, path: &Path) {
        self.notify(ShellEvent::Delete, path);
    }

    fn notify(&self, event: ShellEvent, path: &Path) {
        let path = absolutize(path);

        if self.mode == NotifyMode::IdList {
            match self.backend.resolve_id(&path) {
                Some(id) => match self.backend.notify_id(event, &id) {
                    Ok(()) => {
                        debug!("Shell notified {event} (id): {}", path.display());
                        return;
                    }
                    Err(e) => warn!("Id {event} notification failed for {}: {e}", path.display()),
                },
                // Deleted items usually cannot be resolved any more.
                None => warn!(
                    "Could not resolve item for {event} notification: {}",
                    path.display()
                ),
            }
        }

        match self.backend.notify_path(event, &path) {
            Ok(()) => debug!("Shell notified {event} (path): {}", path.display()),
            Err(e) => warn!("Path {event} notification failed for {}: {e}", path.display()),
        }
    }

    /// Notify a batch of changed directories and deleted items.
    ///
    /// Deleted items get a delete notification each. Their parents join
    /// `dirs`; the combined set is deduplicated and refreshed. Any desktop
    /// root containing a refreshed directory is refreshed too.
    pub fn notify_batch<I>(&self, dirs: I, deleted: &[PathBuf])
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in deleted {
            self.notify_delete(path);
        }

        let mut targets: IndexSet<PathBuf> = dirs.into_iter().map(|d| absolutize(&d)).collect();
        targets.extend(
            deleted
                .iter()
                .map(|p| absolutize(p))
                .filter_map(|p| p.parent().map(Path::to_path_buf)),
        );

        if targets.is_empty() {
            debug!("No directories to notify");
            return;
        }

        info!("Notifying shell about {} directories", targets.len());
        for dir in &targets {
            self.notify_updatedir(dir);
        }

        for root in self.backend.desktop_roots() {
            if targets.contains(&root) {
                continue;
            }
            if targets.iter().any(|dir| dir.starts_with(&root)) {
                info!("Desktop root touched, notifying: {}", root.display());
                self.notify_updatedir(&root);
            }
        }
    }
}
