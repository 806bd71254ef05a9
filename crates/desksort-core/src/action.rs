//! Reversible actions recorded by the move engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One reversible filesystem mutation.
///
/// Actions are grouped into batches (one per submitted request, in the order
/// performed) and replayed in reverse by the undo ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UndoAction {
    /// Something moved from `src` to `dest`. Undo moves `dest` back to `src`.
    Move { src: PathBuf, dest: PathBuf },
    /// `dest` was overwritten and its original content preserved at
    /// `backup`. Undo moves `backup` back to `dest`.
    Replace { dest: PathBuf, backup: PathBuf },
}

impl UndoAction {
    pub fn moved(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self::Move {
            src: src.into(),
            dest: dest.into(),
        }
    }

    pub fn replaced(dest: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self::Replace {
            dest: dest.into(),
            backup: backup.into(),
        }
    }

    /// The path the action left behind, used to qualify failure messages.
    pub fn dest(&self) -> &Path {
        match self {
            Self::Move { dest, .. } | Self::Replace { dest, .. } => dest,
        }
    }

    /// Get a description of how to undo this action.
    pub fn undo_description(&self) -> String {
        match self {
            Self::Move { src, dest } => {
                format!("Move {} back to {}", dest.display(), src.display())
            }
            Self::Replace { dest, .. } => format!("Restore original {}", dest.display()),
        }
    }
}
