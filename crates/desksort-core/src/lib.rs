//! Core types for desksort.
//!
//! This crate holds the plain data exchanged between the interactive layer
//! and the background engines (move requests, per-item results, undo
//! actions, trash results), the error classifier every engine uses as its
//! terminal failure handler, and environment-driven settings.

mod action;
mod classify;
mod request;
mod result;
mod session;
mod settings;

pub use action::UndoAction;
pub use classify::{Classified, ErrorClass, Severity, classify, classify_io, log_error};
pub use request::{MoveOptions, MoveRequest, OverwriteChoice};
pub use result::{BatchResult, BatchSummary, DeleteResult, DeleteStatus, ItemStatus, MoveItemResult};
pub use session::SessionId;
pub use settings::{LogLevel, NotifyMode, Settings, SettingsBuilder};

/// Application directory name used under the platform config directory.
pub const APP_DIR_NAME: &str = "DesktopSorter";
