//! Ordered move primitives.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::OpsError;

/// One way of moving a file or directory.
pub trait MoveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Move `src` to `dest`. `dest` names the final path, not its parent.
    fn move_item(&self, src: &Path, dest: &Path) -> Result<(), OpsError>;
}

/// Atomic rename. Only works within one filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameStrategy;

impl MoveStrategy for RenameStrategy {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn move_item(&self, src: &Path, dest: &Path) -> Result<(), OpsError> {
        fs::rename(src, dest).map_err(|e| OpsError::io(src, e))
    }
}

/// Copy then remove the source, for cross-filesystem moves.
///
/// If the source cannot be removed after copying, the copy is taken back so
/// the item exists in exactly one place.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyDeleteStrategy;

impl MoveStrategy for CopyDeleteStrategy {
    fn name(&self) -> &'static str {
        "copy+delete"
    }

    fn move_item(&self, src: &Path, dest: &Path) -> Result<(), OpsError> {
        copy_then_remove(src, dest, remove_path)
    }
}

fn remove_path(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_then_remove<R>(src: &Path, dest: &Path, remove: R) -> Result<(), OpsError>
where
    R: FnOnce(&Path, bool) -> io::Result<()>,
{
    let is_dir = fs::symlink_metadata(src)
        .map_err(|e| OpsError::io(src, e))?
        .is_dir();
    if fs::symlink_metadata(dest).is_ok() {
        return Err(OpsError::io(dest, io::Error::from(io::ErrorKind::AlreadyExists)));
    }

    let copied = if is_dir {
        let mut options = fs_extra::dir::CopyOptions::new();
        // Copy into `dest` itself rather than `dest/<name>`.
        options.copy_inside = true;
        fs_extra::dir::copy(src, dest, &options).map(drop)
    } else {
        fs_extra::file::copy(src, dest, &fs_extra::file::CopyOptions::new()).map(drop)
    };
    if let Err(e) = copied {
        // Anything at `dest` now is a partial copy.
        if fs::symlink_metadata(dest).is_ok() {
            if let Err(cleanup) = remove_path(dest, is_dir) {
                warn!("Could not remove partial copy {}: {cleanup}", dest.display());
            }
        }
        return Err(OpsError::transfer(src, e));
    }

    if let Err(e) = remove(src, is_dir) {
        take_back_copy(src, dest, is_dir);
        return Err(OpsError::io(src, e));
    }
    Ok(())
}

/// Undo a copy whose source could not be removed. Files the failed removal
/// already deleted from a source directory are restored from the copy first.
fn take_back_copy(src: &Path, dest: &Path, is_dir: bool) {
    if is_dir {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.content_only = true;
        options.skip_exist = true;
        if let Err(e) = fs_extra::dir::copy(dest, src, &options) {
            warn!(
                "Could not restore {} from its copy, keeping {}: {e}",
                src.display(),
                dest.display()
            );
            return;
        }
    } else if fs::symlink_metadata(src).is_err() {
        warn!("Source {} is gone, keeping copy {}", src.display(), dest.display());
        return;
    }

    match remove_path(dest, is_dir) {
        Ok(()) => debug!("Removed copy {} after failed move", dest.display()),
        Err(e) => warn!("Could not remove copy {}: {e}", dest.display()),
    }
}

/// Strategies tried in order for every item.
///
/// A failing strategy hands the item to the next one; only the last
/// strategy's error is reported. Each item starts again from the first
/// strategy.
pub struct MoveStrategies {
    chain: Vec<Box<dyn MoveStrategy>>,
}

impl std::fmt::Debug for MoveStrategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.chain.iter().map(|s| s.name()))
            .finish()
    }
}

impl Default for MoveStrategies {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl MoveStrategies {
    pub fn new(chain: Vec<Box<dyn MoveStrategy>>) -> Self {
        Self { chain }
    }

    /// Rename first, copy+delete as the fallback.
    pub fn platform_default() -> Self {
        Self::new(vec![Box::new(RenameStrategy), Box::new(CopyDeleteStrategy)])
    }

    /// Move one item, returning the name of the strategy that succeeded.
    pub fn move_item(&self, src: &Path, dest: &Path) -> Result<&'static str, OpsError> {
        let mut last_error = None;

        for (index, strategy) in self.chain.iter().enumerate() {
            match strategy.move_item(src, dest) {
                Ok(()) => {
                    debug!(strategy = strategy.name(), "Moved: {} -> {}", src.display(), dest.display());
                    return Ok(strategy.name());
                }
                Err(e) => {
                    if index + 1 < self.chain.len() {
                        warn!(
                            strategy = strategy.name(),
                            "Move of {} failed ({e}), falling back",
                            src.display()
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(OpsError::NoStrategy))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;

    struct AlwaysFails(Arc<AtomicUsize>);

    impl MoveStrategy for AlwaysFails {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn move_item(&self, src: &Path, _dest: &Path) -> Result<(), OpsError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(OpsError::io(src, std::io::Error::other("native move unavailable")))
        }
    }

    #[test]
    fn test_rename_moves_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&src, b"hello").unwrap();

        let used = MoveStrategies::platform_default().move_item(&src, &dest).unwrap();
        assert_eq!(used, "rename");
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
    }

    #[test]
    fn test_copy_delete_moves_directory_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tree");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested").join("leaf.txt"), b"leaf").unwrap();
        let dest = temp.path().join("moved");

        CopyDeleteStrategy.move_item(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(dest.join("nested").join("leaf.txt")).unwrap(), b"leaf");
    }

    #[test]
    fn test_failed_source_removal_takes_back_file_copy() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("locked.txt");
        let dest = temp.path().join("out.txt");
        fs::write(&src, b"keep me").unwrap();

        let err = copy_then_remove(&src, &dest, |_, _| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();

        assert!(matches!(err, OpsError::Io { .. }));
        assert_eq!(fs::read(&src).unwrap(), b"keep me");
        assert!(!dest.exists());
    }

    #[test]
    fn test_copy_refuses_occupied_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dest = temp.path().join("b.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        assert!(CopyDeleteStrategy.move_item(&src, &dest).is_err());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(src.exists());
    }

    #[test]
    fn test_partial_directory_removal_is_restored() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("album");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.jpg"), b"a").unwrap();
        fs::write(src.join("nested").join("b.jpg"), b"b").unwrap();
        let dest = temp.path().join("moved");

        // Removal deletes one file, then fails.
        let result = copy_then_remove(&src, &dest, |path, _| {
            fs::remove_file(path.join("nested").join("b.jpg"))?;
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(src.join("a.jpg")).unwrap(), b"a");
        assert_eq!(fs::read(src.join("nested").join("b.jpg")).unwrap(), b"b");
        assert!(!dest.exists());
    }

    #[test]
    fn test_fallback_is_tried_per_item() {
        let temp = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let strategies = MoveStrategies::new(vec![
            Box::new(AlwaysFails(Arc::clone(&calls))),
            Box::new(RenameStrategy),
        ]);

        for name in ["one", "two"] {
            let src = temp.path().join(name);
            fs::write(&src, name).unwrap();
            let used = strategies.move_item(&src, &temp.path().join(format!("{name}.moved"))).unwrap();
            assert_eq!(used, "rename");
        }

        // The preferred strategy is attempted again for the second item.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_last_error_is_reported() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let err = MoveStrategies::platform_default()
            .move_item(&missing, &temp.path().join("dest"))
            .unwrap_err();
        assert!(matches!(err, OpsError::Io { .. }));

        let empty = MoveStrategies::new(Vec::new());
        assert!(matches!(
            empty.move_item(&missing, &temp.path().join("dest")),
            Err(OpsError::NoStrategy)
        ));
    }
}
