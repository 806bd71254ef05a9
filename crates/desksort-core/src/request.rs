//! Move request types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A user decision for an existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteChoice {
    /// Back up the existing destination, then move the source over it.
    Replace,
    /// Leave the destination alone and skip this source.
    Skip,
}

/// Batch-level options for a move request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOptions {
    /// Policy for every conflict in the batch. `None` asks per item.
    #[serde(default)]
    pub overwrite: Option<OverwriteChoice>,
}

impl MoveOptions {
    /// Options that apply one decision to every conflict.
    pub fn with_overwrite(choice: OverwriteChoice) -> Self {
        Self {
            overwrite: Some(choice),
        }
    }
}

/// A batch of sources to move into one target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Sources, processed strictly in this order.
    pub sources: Vec<PathBuf>,
    /// Directory the sources are moved into. Created with parents if missing.
    pub target_dir: PathBuf,
    #[serde(default)]
    pub options: MoveOptions,
}

impl MoveRequest {
    /// Create a request that asks about every conflict.
    pub fn new(sources: Vec<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            target_dir: target_dir.into(),
            options: MoveOptions::default(),
        }
    }

    /// Set the batch-level conflict policy.
    pub fn with_options(mut self, options: MoveOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_choice_parse() {
        assert_eq!("replace".parse::<OverwriteChoice>().unwrap(), OverwriteChoice::Replace);
        assert_eq!("SKIP".parse::<OverwriteChoice>().unwrap(), OverwriteChoice::Skip);
        assert!("cancel".parse::<OverwriteChoice>().is_err());
        assert_eq!(OverwriteChoice::Replace.to_string(), "replace");
    }

    #[test]
    fn test_request_defaults_to_prompting() {
        let request = MoveRequest::new(vec![PathBuf::from("/a/file1.txt")], "/b");
        assert_eq!(request.options.overwrite, None);

        let json = r#"{"sources": ["/a/x"], "target_dir": "/b"}"#;
        let parsed: MoveRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.options, MoveOptions::default());
    }
}
