//! Session-scoped storage for overwritten items.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use desksort_core::{APP_DIR_NAME, SessionId};
use tracing::{debug, error};

use crate::cleaner::prune_empty_sessions;

/// Timestamp format appended to backup names.
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Backup vault for one session.
///
/// Layout is `<root>/<session>/<name>_<YYYYMMDD_HHMMSS>[_<n>]`. Only the move
/// engine writes here; the undo ledger consumes entries.
#[derive(Debug, Clone)]
pub struct BackupVault {
    root: PathBuf,
    session: SessionId,
}

impl BackupVault {
    pub fn new(root: impl Into<PathBuf>, session: SessionId) -> Self {
        Self {
            root: root.into(),
            session,
        }
    }

    /// Directory holding every session.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Session this vault writes into.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// The session directory under the vault root.
    pub fn session_dir(&self) -> PathBuf {
        self.root.join(&self.session)
    }

    /// Session directory used when the vault root is unusable.
    pub fn fallback_dir(&self) -> PathBuf {
        std::env::temp_dir()
            .join(APP_DIR_NAME)
            .join("backups")
            .join(&self.session)
    }

    /// Create the session directory if needed and return it.
    ///
    /// Falls back to a directory under the system temp dir when the vault
    /// root cannot be created. Never fails; a fallback that cannot be created
    /// either is logged and returned anyway, so the per-item backup move
    /// reports the real error.
    pub fn ensure_session_dir(&self) -> PathBuf {
        let dir = self.session_dir();
        match fs::create_dir_all(&dir) {
            Ok(()) => {
                debug!("Session backups directory: {}", dir.display());
                dir
            }
            Err(e) => {
                error!("Failed to create backups directory {}: {e}", dir.display());
                let fallback = self.fallback_dir();
                if let Err(e) = fs::create_dir_all(&fallback) {
                    error!(
                        "Failed to create fallback backups directory {}: {e}",
                        fallback.display()
                    );
                }
                fallback
            }
        }
    }

    /// Pick an unused backup path for `original_name` inside `dir`.
    pub fn make_unique_name(original_name: &OsStr, dir: &Path) -> PathBuf {
        let stamp = Local::now().format(STAMP_FORMAT).to_string();
        Self::make_unique_name_at(original_name, dir, &stamp)
    }

    /// Like [`make_unique_name`](Self::make_unique_name) with a fixed stamp.
    ///
    /// Tries `<name>_<stamp>`, then `<name>_<stamp>_1`, `_2`, ... until a
    /// path that does not exist is found.
    pub fn make_unique_name_at(original_name: &OsStr, dir: &Path, stamp: &str) -> PathBuf {
        let base = format!("{}_{stamp}", original_name.to_string_lossy());

        let candidate = dir.join(&base);
        if !occupied(&candidate) {
            return candidate;
        }

        (1u64..)
            .map(|counter| dir.join(format!("{base}_{counter}")))
            .find(|candidate| !occupied(candidate))
            .unwrap_or_else(|| dir.join(format!("{base}_{}", u64::MAX)))
    }

    /// Remove empty session directories other than `skip`.
    pub fn prune_empty_sessions(&self, skip: &[SessionId]) -> usize {
        prune_empty_sessions(&self.root, skip)
    }
}

/// Existence check that does not follow symlinks.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_ensure_session_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let vault = BackupVault::new(temp.path().join("backups"), SessionId::from_name("abcd1234"));

        let first = vault.ensure_session_dir();
        let second = vault.ensure_session_dir();
        assert_eq!(first, second);
        assert_eq!(first, temp.path().join("backups").join("abcd1234"));
        assert!(first.is_dir());
    }

    #[test]
    fn test_ensure_session_dir_falls_back() {
        let temp = TempDir::new().unwrap();
        // A file where the vault root should be makes creation fail.
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let session = SessionId::generate();
        let vault = BackupVault::new(&blocker, session.clone());
        let dir = vault.ensure_session_dir();

        assert_eq!(dir, vault.fallback_dir());
        assert!(dir.ends_with(session.as_str()));
        assert!(dir.is_dir());
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_unique_names_count_up() {
        let temp = TempDir::new().unwrap();
        let name = OsStr::new("report.txt");
        let stamp = "20240102_030405";

        let mut produced = Vec::new();
        for _ in 0..4 {
            let path = BackupVault::make_unique_name_at(name, temp.path(), stamp);
            fs::write(&path, b"x").unwrap();
            produced.push(path.file_name().unwrap().to_string_lossy().into_owned());
        }

        assert_eq!(
            produced,
            vec![
                "report.txt_20240102_030405",
                "report.txt_20240102_030405_1",
                "report.txt_20240102_030405_2",
                "report.txt_20240102_030405_3",
            ]
        );
    }

    #[test]
    fn test_unique_name_uses_current_stamp() {
        let temp = TempDir::new().unwrap();
        let path = BackupVault::make_unique_name(OsStr::new("a"), temp.path());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        // "a_" + YYYYMMDD_HHMMSS
        assert_eq!(name.len(), 2 + 15);
        assert!(name.starts_with("a_"));
    }
}
