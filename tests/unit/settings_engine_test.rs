//! Integration-level unit tests for the SettingsEngine public API.

use eigo_browser::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use eigo_browser::types::errors::SettingsError;
use eigo_browser::types::settings::BrowserSettings;
use tempfile::TempDir;

fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, BrowserSettings::default());
    assert_eq!(settings.general.default_url, "https://www.reddit.com/");
    assert_eq!(settings.general.new_tab_url, "https://bbc.com");
    assert_eq!(settings.chrome.top_zone, 50.0);
    assert_eq!(settings.chrome.scroll_threshold, 10.0);
    assert_eq!(settings.session.save_debounce_ms, 1000);
}

#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value(
                "general.new_tab_url",
                serde_json::Value::String("https://example.com/".to_string()),
            )
            .unwrap();
    }

    let mut engine = engine_in_temp(&dir);
    let settings = engine.load().unwrap();
    assert_eq!(settings.general.new_tab_url, "https://example.com/");
}

#[test]
fn test_set_value_numeric_field() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    engine
        .set_value("session.save_debounce_ms", serde_json::json!(250))
        .unwrap();

    assert_eq!(engine.get_settings().session.save_debounce_ms, 250);
}

#[test]
fn test_set_value_unknown_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let err = engine
        .set_value("general.no_such_field", serde_json::json!(true))
        .unwrap_err();
    assert!(matches!(err, SettingsError::InvalidKey(_)));

    let err = engine.set_value("", serde_json::json!(true)).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidKey(_)));
}

#[test]
fn test_set_value_wrong_type_is_rejected_and_state_kept() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let err = engine
        .set_value("session.restore_on_launch", serde_json::json!("yes"))
        .unwrap_err();

    assert!(matches!(err, SettingsError::InvalidValue(_)));
    assert!(engine.get_settings().session.restore_on_launch);
}

#[test]
fn test_reset_restores_defaults_on_disk() {
    let dir = TempDir::new().unwrap();
    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine
            .set_value("translation.speech_language", serde_json::json!("en-GB"))
            .unwrap();
        engine.reset().unwrap();
    }

    let mut engine = engine_in_temp(&dir);
    assert_eq!(engine.load().unwrap(), BrowserSettings::default());
}

#[test]
fn test_malformed_file_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
    let mut engine = engine_in_temp(&dir);

    let err = engine.load().unwrap_err();
    assert!(matches!(err, SettingsError::Serialization(_)));
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{"backend": {"api_key": "k"}}"#,
    )
    .unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();
    assert_eq!(settings.backend.api_key, "k");
    assert_eq!(settings.backend.base_url, "http://127.0.0.1:8787");
    assert_eq!(settings.handoff.url_scheme, "eigobrowser");
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("settings.json");
    let engine = SettingsEngine::new(Some(path.to_string_lossy().to_string()));

    engine.save().unwrap();

    assert!(path.exists());
}
