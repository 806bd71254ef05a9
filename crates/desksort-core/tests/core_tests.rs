use desksort_core::{
    ErrorClass, LogLevel, NotifyMode, OverwriteChoice, Settings, UndoAction, classify, classify_io,
};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_settings_json_fills_defaults() {
    let json = r#"{ "app_dir": "/srv/desksort", "notify_mode": "RawPath" }"#;
    let settings: Settings = serde_json::from_str(json).unwrap();

    assert_eq!(settings.notify_mode, NotifyMode::RawPath);
    assert_eq!(settings.recycle_confirm_threshold, 1);
    assert_eq!(settings.log_level, LogLevel::Info);
    assert_eq!(settings.prompt_timeout, Duration::from_secs(300));
    assert_eq!(
        settings.backups_root(),
        std::path::PathBuf::from("/srv/desksort/backups")
    );
}

#[test]
fn test_settings_builder_overrides() {
    let settings = Settings::builder()
        .app_dir("/tmp/ds")
        .recycle_confirm_threshold(0usize)
        .notify_mode(NotifyMode::RawPath)
        .prompt_timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    assert!(!settings.needs_recycle_confirmation(50));
    assert_eq!(settings.prompt_timeout, Duration::from_secs(10));
}

#[test]
fn test_classify_real_filesystem_errors() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.txt");

    let err = fs::read(&missing).unwrap_err();
    let classified = classify_io(&err, Some(&missing));
    assert_eq!(classified.class, ErrorClass::NotFound);
    assert_eq!(
        classified.message,
        format!("File or folder not found ({})", missing.display())
    );

    let dir = temp.path().join("full");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("child"), b"x").unwrap();
    let err = fs::remove_dir(&dir).unwrap_err();
    assert_eq!(classify(&err, Some(&dir)).class, ErrorClass::DirectoryNotEmpty);
}

#[test]
fn test_undo_action_json_shape() {
    let action = UndoAction::moved("/a/file1.txt", "/b/file1.txt");
    let value = serde_json::to_value(&action).unwrap();

    assert_eq!(value["kind"], "move");
    assert_eq!(value["src"], "/a/file1.txt");
    assert_eq!(value["dest"], "/b/file1.txt");
}

#[test]
fn test_overwrite_choice_round_trips_display() {
    for choice in [OverwriteChoice::Replace, OverwriteChoice::Skip] {
        assert_eq!(choice.to_string().parse::<OverwriteChoice>().unwrap(), choice);
    }
}
