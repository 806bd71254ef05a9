//! Per-process session identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short random token naming one process lifetime.
///
/// Used to namespace the backup vault and tag log output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Length of generated identifiers.
    pub const LEN: usize = 8;

    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let mut token = uuid::Uuid::new_v4().simple().to_string();
        token.truncate(Self::LEN);
        Self(token)
    }

    /// Wrap an existing identifier, e.g. a vault directory name.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for SessionId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}
