//! Environment-driven settings.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::APP_DIR_NAME;

/// Selects the shell notification strategy.
pub const ENV_NOTIFY_MODE: &str = "DS_SHELL_NOTIFY_MODE";
/// Minimum item count that requires confirmation before trashing.
pub const ENV_RECYCLE_CONFIRM_THRESHOLD: &str = "DS_RECYCLE_CONFIRM_THRESHOLD";
/// Log verbosity override.
pub const ENV_LOG_LEVEL: &str = "DS_LOG_LEVEL";

/// How shell change notifications address their targets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum NotifyMode {
    /// Resolve each path to a live item identifier first.
    #[default]
    #[strum(to_string = "idlist", serialize = "pidl")]
    IdList,
    /// Pass raw path strings.
    #[strum(to_string = "rawpath", serialize = "pathw", serialize = "path")]
    RawPath,
}

/// Log verbosity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[strum(to_string = "warn", serialize = "warning")]
    Warn,
    #[strum(to_string = "error", serialize = "critical")]
    Error,
}

impl LogLevel {
    /// Parse a level name or a numeric level (10 = debug, 20 = info,
    /// 30 = warn, 40 and above = error, below 10 = trace).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(level) = value.parse::<Self>() {
            return Some(level);
        }
        let numeric: i64 = value.parse().ok()?;
        Some(match numeric {
            i64::MIN..=9 => Self::Trace,
            10..=19 => Self::Debug,
            20..=29 => Self::Info,
            30..=39 => Self::Warn,
            _ => Self::Error,
        })
    }

    /// Directive string for a tracing filter.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Runtime settings for the engines.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Settings {
    /// Application data directory.
    #[builder(default = "default_app_dir()")]
    pub app_dir: PathBuf,

    /// Backup vault root. Defaults to `<app_dir>/backups`.
    #[builder(default)]
    #[serde(default)]
    pub backups_root: Option<PathBuf>,

    #[builder(default)]
    #[serde(default)]
    pub notify_mode: NotifyMode,

    /// Trash requests with at least this many items need confirmation.
    /// Zero disables confirmation.
    #[builder(default = "1")]
    #[serde(default = "default_confirm_threshold")]
    pub recycle_confirm_threshold: usize,

    #[builder(default)]
    #[serde(default)]
    pub log_level: LogLevel,

    /// How long a worker waits for an overwrite decision.
    #[builder(default = "Settings::DEFAULT_PROMPT_TIMEOUT")]
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout: Duration,
}

fn default_confirm_threshold() -> usize {
    1
}

fn default_prompt_timeout() -> Duration {
    Settings::DEFAULT_PROMPT_TIMEOUT
}

fn default_app_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

impl SettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(app_dir) = &self.app_dir {
            if app_dir.as_os_str().is_empty() {
                return Err("Application directory cannot be empty".to_string());
            }
        }
        if let Some(Some(root)) = &self.backups_root {
            if root.as_os_str().is_empty() {
                return Err("Backups root cannot be empty".to_string());
            }
        }
        if let Some(timeout) = self.prompt_timeout {
            if timeout.is_zero() {
                return Err("Prompt timeout must be positive".to_string());
            }
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_dir: default_app_dir(),
            backups_root: None,
            notify_mode: NotifyMode::default(),
            recycle_confirm_threshold: default_confirm_threshold(),
            log_level: LogLevel::default(),
            prompt_timeout: Self::DEFAULT_PROMPT_TIMEOUT,
        }
    }
}

impl Settings {
    /// Conflict prompts give up after five minutes.
    pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a new settings builder.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Read settings from the process environment.
    ///
    /// Never fails. Invalid values fall back to their defaults and are
    /// reported in the returned warnings, to be logged once logging is up.
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<String>) {
        let mut settings = Self::default();
        let mut warnings = Vec::new();

        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = present(ENV_NOTIFY_MODE) {
            match value.trim().parse::<NotifyMode>() {
                Ok(mode) => settings.notify_mode = mode,
                Err(_) => warnings.push(format!(
                    "Invalid {ENV_NOTIFY_MODE} value '{value}', falling back to {}",
                    settings.notify_mode
                )),
            }
        }

        if let Some(value) = present(ENV_RECYCLE_CONFIRM_THRESHOLD) {
            match value.trim().parse::<usize>() {
                Ok(threshold) => settings.recycle_confirm_threshold = threshold,
                Err(_) => warnings.push(format!(
                    "Invalid {ENV_RECYCLE_CONFIRM_THRESHOLD} value '{value}', falling back to {}",
                    settings.recycle_confirm_threshold
                )),
            }
        }

        if let Some(value) = present(ENV_LOG_LEVEL) {
            match LogLevel::parse(&value) {
                Some(level) => settings.log_level = level,
                None => warnings.push(format!(
                    "Invalid {ENV_LOG_LEVEL} value '{value}', falling back to {}",
                    settings.log_level
                )),
            }
        }

        (settings, warnings)
    }

    /// Root directory of the backup vault.
    pub fn backups_root(&self) -> PathBuf {
        self.backups_root
            .clone()
            .unwrap_or_else(|| self.app_dir.join("backups"))
    }

    /// Check whether trashing `count` items needs a confirmation prompt.
    pub fn needs_recycle_confirmation(&self, count: usize) -> bool {
        self.recycle_confirm_threshold > 0 && count >= self.recycle_confirm_threshold
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_absent() {
        let (settings, warnings) = Settings::from_lookup(lookup(&[]));
        assert!(warnings.is_empty());
        assert_eq!(settings.notify_mode, NotifyMode::IdList);
        assert_eq!(settings.recycle_confirm_threshold, 1);
        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.prompt_timeout, Duration::from_secs(300));
        assert!(settings.backups_root().ends_with("backups"));
    }

    #[test]
    fn test_recognized_values() {
        let (settings, warnings) = Settings::from_lookup(lookup(&[
            (ENV_NOTIFY_MODE, "PATHW"),
            (ENV_RECYCLE_CONFIRM_THRESHOLD, "5"),
            (ENV_LOG_LEVEL, "debug"),
        ]));
        assert!(warnings.is_empty());
        assert_eq!(settings.notify_mode, NotifyMode::RawPath);
        assert_eq!(settings.recycle_confirm_threshold, 5);
        assert_eq!(settings.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_values_fall_back_with_warning() {
        let (settings, warnings) = Settings::from_lookup(lookup(&[
            (ENV_NOTIFY_MODE, "carrier-pigeon"),
            (ENV_RECYCLE_CONFIRM_THRESHOLD, "-3"),
            (ENV_LOG_LEVEL, "loud"),
        ]));
        assert_eq!(warnings.len(), 3);
        assert!(warnings[2].contains("Invalid DS_LOG_LEVEL value 'loud'"));
        assert_eq!(settings.notify_mode, NotifyMode::IdList);
        assert_eq!(settings.recycle_confirm_threshold, 1);
        assert_eq!(settings.log_level, LogLevel::Info);
    }

    #[test]
    fn test_numeric_log_levels() {
        assert_eq!(LogLevel::parse("10"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("30"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("50"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("5"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("nope"), None);
    }

    #[test]
    fn test_confirmation_threshold() {
        let mut settings = Settings::default();
        assert!(settings.needs_recycle_confirmation(1));

        settings.recycle_confirm_threshold = 3;
        assert!(!settings.needs_recycle_confirmation(2));
        assert!(settings.needs_recycle_confirmation(3));

        settings.recycle_confirm_threshold = 0;
        assert!(!settings.needs_recycle_confirmation(100));
    }

    #[test]
    fn test_builder_validation() {
        let settings = Settings::builder()
            .app_dir("/tmp/desksort")
            .prompt_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        assert_eq!(settings.backups_root(), PathBuf::from("/tmp/desksort/backups"));

        let invalid = Settings::builder().prompt_timeout(Duration::ZERO).build();
        assert!(invalid.is_err());
    }
}
