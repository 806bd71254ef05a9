//! Background move engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use desksort_core::{
    BatchResult, ItemStatus, MoveItemResult, MoveOptions, MoveRequest, OverwriteChoice, SessionId,
    Settings, UndoAction, log_error,
};
use indexmap::IndexSet;
use tracing::{debug, error, info, warn};

use crate::worker::run_blocking;
use crate::{
    BackupCleaner, BackupVault, ConflictGateway, Dispatcher, MoveStrategies, OpsError,
    OverwritePrompt, SerialWorker, ShellNotifier,
};

/// Everything a batch needs, shared with the worker.
#[derive(Debug)]
struct MoveContext {
    vault: BackupVault,
    gateway: ConflictGateway,
    strategies: MoveStrategies,
    notifier: Arc<ShellNotifier>,
}

/// Moves batches of files and folders on a single background worker.
///
/// Conflicts are resolved with the batch option or, when unset, by asking the
/// interactive thread through the [`ConflictGateway`]. Replaced destinations
/// are preserved in the session's [`BackupVault`] so the returned
/// [`UndoAction`]s can restore them.
#[derive(Debug)]
pub struct MoveEngine {
    worker: SerialWorker,
    ctx: Arc<MoveContext>,
    dispatcher: Dispatcher,
    cleaner: BackupCleaner,
}

impl MoveEngine {
    /// Create an engine with a fresh session and the default strategies.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        settings: &Settings,
        dispatcher: Dispatcher,
        prompt: Arc<dyn OverwritePrompt>,
        notifier: Arc<ShellNotifier>,
    ) -> Self {
        let vault = BackupVault::new(settings.backups_root(), SessionId::generate());
        let gateway = ConflictGateway::new(dispatcher.clone(), prompt, settings.prompt_timeout);
        Self::with_parts(vault, gateway, MoveStrategies::platform_default(), notifier, dispatcher)
    }

    /// Create an engine from explicit parts.
    ///
    /// Empty backup sessions left by earlier runs are pruned here.
    pub fn with_parts(
        vault: BackupVault,
        gateway: ConflictGateway,
        strategies: MoveStrategies,
        notifier: Arc<ShellNotifier>,
        dispatcher: Dispatcher,
    ) -> Self {
        let cleaner = BackupCleaner::new(vault.root(), vault.session().clone());
        cleaner.on_startup();

        info!(session = %vault.session(), "Move engine ready");

        Self {
            worker: SerialWorker::spawn("move"),
            ctx: Arc::new(MoveContext {
                vault,
                gateway,
                strategies,
                notifier,
            }),
            dispatcher,
            cleaner,
        }
    }

    /// Backup session of this engine.
    pub fn session(&self) -> &SessionId {
        self.ctx.vault.session()
    }

    /// Vault that receives replaced items.
    pub fn vault(&self) -> &BackupVault {
        &self.ctx.vault
    }

    /// Move every source of `request` into its target directory.
    ///
    /// Runs behind any batch already submitted. `on_done` receives the batch
    /// result and the undo actions in the order performed, on the interactive
    /// thread.
    pub fn move_many<F>(&self, request: MoveRequest, on_done: F)
    where
        F: FnOnce(BatchResult, Vec<UndoAction>) + Send + 'static,
    {
        if !self.worker.is_open() {
            warn!("Move requested after shutdown");
            self.dispatcher
                .schedule(move || on_done(BatchResult::aborted("Move engine is shut down"), Vec::new()));
            return;
        }

        let ctx = Arc::clone(&self.ctx);
        let dispatcher = self.dispatcher.clone();
        let submitted = self.worker.submit(async move {
            let (result, actions) = run_batch(&ctx, request).await;

            let touched = touched_dirs(&result.items);
            let notifier = Arc::clone(&ctx.notifier);
            if let Err(e) = run_blocking(move || notifier.notify_batch(touched, &[])).await {
                warn!("Shell notification task failed: {e}");
            }

            dispatcher.schedule(move || on_done(result, actions));
        });

        if let Err(e) = submitted {
            error!("Could not queue move batch: {e}");
        }
    }

    /// Let queued batches finish, then prune empty backup sessions.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
        self.cleaner.on_shutdown();
    }
}

async fn run_batch(ctx: &Arc<MoveContext>, request: MoveRequest) -> (BatchResult, Vec<UndoAction>) {
    let MoveRequest {
        sources,
        target_dir,
        options,
    } = request;

    info!(
        "Starting move operation: {} items to {}",
        sources.len(),
        target_dir.display()
    );

    let created_root = topmost_missing(&target_dir);
    let nested_in_source = sources.iter().any(|src| target_dir.starts_with(src));

    let target = target_dir.clone();
    let created = run_blocking(move || fs::create_dir_all(&target))
        .await
        .and_then(|res| res.map_err(|e| OpsError::io(&target_dir, e)));
    if let Err(e) = created {
        let message = log_error(&e, Some(&target_dir));
        return (
            BatchResult::aborted(format!("Failed to create target directory: {message}")),
            Vec::new(),
        );
    }

    let vault = ctx.vault.clone();
    let backups_dir = run_blocking(move || vault.ensure_session_dir())
        .await
        .unwrap_or_else(|_| ctx.vault.fallback_dir());

    let started_at = Local::now();
    let mut items = Vec::with_capacity(sources.len());
    let mut actions = Vec::new();

    for src in sources {
        let (item, item_actions) = move_one(ctx, src, &target_dir, &backups_dir, options).await;
        actions.extend(item_actions);

        let cancelled = item.status == ItemStatus::Cancelled;
        items.push(item);
        if cancelled {
            info!("Move batch cancelled, remaining items left in place");
            break;
        }
    }

    if nested_in_source && !items.iter().any(MoveItemResult::is_ok) {
        if let Some(root) = created_root {
            let target = target_dir.clone();
            let _ = run_blocking(move || remove_created_dirs(&target, &root)).await;
        }
    }

    info!("Move operation completed: {} items processed", items.len());

    let result = BatchResult {
        items,
        started_at,
        finished_at: Local::now(),
        error: None,
    };
    (result, actions)
}

/// Existence check that does not follow symlinks.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// The outermost directory `create_dir_all(dir)` would create, if any.
fn topmost_missing(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .take_while(|ancestor| !occupied(ancestor))
        .last()
        .map(Path::to_path_buf)
}

/// Remove the empty directories from `dir` up to and including `root`.
fn remove_created_dirs(dir: &Path, root: &Path) {
    for ancestor in dir.ancestors() {
        if let Err(e) = fs::remove_dir(ancestor) {
            debug!("Keeping {}: {e}", ancestor.display());
            return;
        }
        if ancestor == root {
            return;
        }
    }
}

async fn move_one(
    ctx: &Arc<MoveContext>,
    src: PathBuf,
    target_dir: &Path,
    backups_dir: &Path,
    options: MoveOptions,
) -> (MoveItemResult, Vec<UndoAction>) {
    if !occupied(&src) {
        warn!("Source does not exist: {}", src.display());
        return (
            MoveItemResult::error(src, None, false, "Source does not exist"),
            Vec::new(),
        );
    }

    let Some(name) = src.file_name() else {
        let message = format!("Source has no file name ({})", src.display());
        return (MoveItemResult::error(src, None, false, message), Vec::new());
    };
    let dest = target_dir.join(name);

    if dest == src {
        debug!("Already in place: {}", src.display());
        return (MoveItemResult::skipped(src, dest, false), Vec::new());
    }
    if dest.starts_with(&src) {
        let message = format!("Cannot move a folder into itself ({})", src.display());
        warn!("{message}");
        return (MoveItemResult::error(src, Some(dest), false, message), Vec::new());
    }

    let conflict = occupied(&dest);
    let backup_dir = if conflict {
        let decision = match options.overwrite {
            Some(choice) => Some(choice),
            None => ctx.gateway.request_decision(&dest).await,
        };
        match decision {
            None => return (MoveItemResult::cancelled(src, dest), Vec::new()),
            Some(OverwriteChoice::Skip) => {
                debug!("Skipped existing {}", dest.display());
                return (MoveItemResult::skipped(src, dest, true), Vec::new());
            }
            Some(OverwriteChoice::Replace) => Some(backups_dir.to_path_buf()),
        }
    } else {
        None
    };

    let worker_ctx = Arc::clone(ctx);
    let (worker_src, worker_dest) = (src.clone(), dest.clone());
    let (actions, outcome) = run_blocking(move || {
        transfer(&worker_ctx.strategies, &worker_src, &worker_dest, backup_dir.as_deref())
    })
    .await
    .unwrap_or_else(|e| (Vec::new(), Err(e)));

    match outcome {
        Ok(()) => (MoveItemResult::ok(src, dest, conflict), actions),
        Err(e) => {
            let message = log_error(&e, Some(&src));
            (MoveItemResult::error(src, Some(dest), conflict, message), actions)
        }
    }
}

/// Back up an existing `dest` when `backup_dir` is given, then move `src`
/// onto `dest`. Returns the actions that actually happened, even on failure.
fn transfer(
    strategies: &MoveStrategies,
    src: &Path,
    dest: &Path,
    backup_dir: Option<&Path>,
) -> (Vec<UndoAction>, Result<(), OpsError>) {
    let mut actions = Vec::new();

    if let Some(dir) = backup_dir {
        let backup = BackupVault::make_unique_name(dest.file_name().unwrap_or_default(), dir);
        if let Err(e) = strategies.move_item(dest, &backup) {
            return (actions, Err(e));
        }
        debug!("Created backup: {} -> {}", dest.display(), backup.display());
        actions.push(UndoAction::replaced(dest, backup));
    }

    match strategies.move_item(src, dest) {
        Ok(_) => {
            actions.push(UndoAction::moved(src, dest));
            (actions, Ok(()))
        }
        Err(e) => (actions, Err(e)),
    }
}

/// Distinct parents of the sources and destinations of moved items.
fn touched_dirs(items: &[MoveItemResult]) -> IndexSet<PathBuf> {
    items
        .iter()
        .filter(|item| item.is_ok())
        .flat_map(|item| [Some(item.src.as_path()), item.dest.as_deref()])
        .flatten()
        .filter_map(Path::parent)
        .map(Path::to_path_buf)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touched_dirs_only_counts_moved_items() {
        let items = vec![
            MoveItemResult::ok("/a/one".into(), "/b/one".into(), false),
            MoveItemResult::ok("/a/two".into(), "/b/two".into(), false),
            MoveItemResult::skipped("/c/three".into(), "/b/three".into(), true),
            MoveItemResult::error("/d/four".into(), None, false, "Source does not exist"),
        ];

        let dirs: Vec<PathBuf> = touched_dirs(&items).into_iter().collect();
        assert_eq!(dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_topmost_missing_finds_first_created_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let target = temp.path().join("x").join("y").join("z");

        assert_eq!(topmost_missing(&target), Some(temp.path().join("x")));
        assert_eq!(topmost_missing(temp.path()), None);

        fs::create_dir_all(&target).unwrap();
        remove_created_dirs(&target, &temp.path().join("x"));
        assert!(!temp.path().join("x").exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn test_transfer_records_backup_before_move() {
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("in").join("doc.txt");
        let dest = temp.path().join("out").join("doc.txt");
        let vault = temp.path().join("vault");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::create_dir_all(&vault).unwrap();
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let (actions, outcome) =
            transfer(&MoveStrategies::platform_default(), &src, &dest, Some(&vault));
        outcome.unwrap();

        assert_eq!(actions.len(), 2);
        let UndoAction::Replace { backup, .. } = &actions[0] else {
            panic!("expected replace first, got {actions:?}");
        };
        assert_eq!(fs::read(backup).unwrap(), b"old");
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert_eq!(actions[1], UndoAction::moved(&src, &dest));
    }
}
