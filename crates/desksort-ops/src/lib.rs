//! File operation engines for desksort.
//!
//! Each engine owns one serial worker, so batches of the same kind never
//! overlap. Completion is delivered through a [`Dispatcher`], which queues
//! callbacks for the interactive thread's [`DispatchLoop`]. The only place a
//! worker waits on the interactive thread is the [`ConflictGateway`].

mod cleaner;
mod delete;
mod dispatch;
mod error;
mod gateway;
mod move_op;
mod notify;
mod strategy;
mod trash_facility;
mod undo;
mod vault;
mod worker;

pub use cleaner::{BackupCleaner, prune_empty_sessions};
pub use delete::DeleteEngine;
pub use dispatch::{DispatchLoop, Dispatcher, UiTask};
pub use error::OpsError;
pub use gateway::{ConflictGateway, OverwritePrompt, RecycleConfirm};
pub use move_op::MoveEngine;
pub use notify::{ItemId, LoggingShell, ShellBackend, ShellEvent, ShellNotifier, platform_desktop_roots};
pub use strategy::{CopyDeleteStrategy, MoveStrategies, MoveStrategy, RenameStrategy};
pub use trash_facility::{OsTrash, TrashFacility, TrashTransaction, UnavailableTrash, platform_trash};
pub use undo::{UndoLedger, UndoOutcome, undo_batch};
pub use vault::BackupVault;
pub use worker::SerialWorker;
