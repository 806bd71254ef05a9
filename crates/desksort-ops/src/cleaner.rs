//! Housekeeping for backup session directories.

use std::fs;
use std::path::{Path, PathBuf};

use desksort_core::SessionId;
use tracing::{debug, info, warn};

/// Remove every empty session directory under `root` whose name is not in
/// `skip`.
///
/// Directories that still hold files are left alone. Errors are logged and
/// swallowed. Returns the number of directories removed.
pub fn prune_empty_sessions(root: &Path, skip: &[SessionId]) -> usize {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!("Cannot enumerate backup sessions in {}: {e}", root.display());
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read backup session entry: {e}");
                continue;
            }
        };

        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }

        let name = entry.file_name();
        if skip.iter().any(|id| name == id.as_str()) {
            debug!("Keeping skipped session {}", name.to_string_lossy());
            continue;
        }

        let path = entry.path();
        match is_empty_dir(&path) {
            Ok(true) => match fs::remove_dir(&path) {
                Ok(()) => {
                    debug!("Removed empty backup session {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Cannot remove backup session {}: {e}", path.display()),
            },
            Ok(false) => debug!("Backup session {} still holds files", path.display()),
            Err(e) => warn!("Cannot inspect backup session {}: {e}", path.display()),
        }
    }

    removed
}

fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Startup and shutdown pruning of the backup vault.
#[derive(Debug, Clone)]
pub struct BackupCleaner {
    root: PathBuf,
    current: SessionId,
}

impl BackupCleaner {
    pub fn new(root: impl Into<PathBuf>, current: SessionId) -> Self {
        Self {
            root: root.into(),
            current,
        }
    }

    /// Prune stale sessions left behind by earlier processes.
    pub fn on_startup(&self) -> usize {
        let removed = prune_empty_sessions(&self.root, std::slice::from_ref(&self.current));
        if removed > 0 {
            info!("Removed {removed} empty backup sessions at startup");
        }
        removed
    }

    /// Prune on exit, including the current session when it is empty.
    pub fn on_shutdown(&self) -> usize {
        let removed = prune_empty_sessions(&self.root, &[]);
        if removed > 0 {
            info!("Removed {removed} empty backup sessions at shutdown");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_prune_keeps_non_empty_and_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("empty1")).unwrap();
        fs::create_dir_all(root.join("empty2")).unwrap();
        fs::create_dir_all(root.join("current")).unwrap();
        fs::create_dir_all(root.join("full")).unwrap();
        fs::write(root.join("full").join("backup.txt_20240101_000000"), b"keep").unwrap();
        fs::write(root.join("stray-file"), b"x").unwrap();

        let removed = prune_empty_sessions(root, &[SessionId::from_name("current")]);

        assert_eq!(removed, 2);
        assert!(!root.join("empty1").exists());
        assert!(!root.join("empty2").exists());
        assert!(root.join("current").is_dir());
        assert!(root.join("full").is_dir());
        assert!(root.join("stray-file").is_file());
    }

    #[test]
    fn test_missing_root_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        assert_eq!(prune_empty_sessions(&temp.path().join("nope"), &[]), 0);
    }

    #[test]
    fn test_cleaner_startup_then_shutdown() {
        let temp = TempDir::new().unwrap();
        let current = SessionId::from_name("me");
        fs::create_dir_all(temp.path().join("me")).unwrap();
        fs::create_dir_all(temp.path().join("old")).unwrap();

        let cleaner = BackupCleaner::new(temp.path(), current);
        assert_eq!(cleaner.on_startup(), 1);
        assert!(temp.path().join("me").is_dir());

        assert_eq!(cleaner.on_shutdown(), 1);
        assert!(!temp.path().join("me").exists());
    }
}
