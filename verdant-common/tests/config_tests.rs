//! Unit tests for configuration loading and credential resolution
//!
//! Uses serial_test: tests that touch process environment variables are
//! marked #[serial] so they never run in parallel.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use verdant_common::config::{
    is_valid_key, load_toml_config, resolve_root_folder, resolve_secret, TomlConfig,
    ROOT_FOLDER_ENV,
};
use verdant_common::Error;

#[test]
fn test_missing_config_file_yields_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();

    assert!(config.port.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.pipeline.catalog_sample_size, 50);
    assert_eq!(config.pipeline.inference_timeout_secs, 60);
    assert_eq!(config.pipeline.fetch_timeout_secs, 20);
    assert!(config.gemini.api_key.is_none());
}

/// Counts WARN events seen by the subscriber
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_missing_config_file_is_silent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));

    tracing::subscriber::with_default(subscriber, || {
        load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();
    });

    // The binary reports the missing file after its logger is installed
    assert_eq!(warnings.load(Ordering::SeqCst), 0);
}

#[test]
fn test_full_config_file_parses() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("verdant-ai.toml");
    std::fs::write(
        &path,
        r#"
port = 6100
database_path = "/tmp/verdant-test.db"

[logging]
level = "debug"

[gemini]
api_key = "gem-key"
model = "gemini-2.0-flash"

[storage]
api_key = "ut-secret"

[pipeline]
catalog_sample_size = 10
inference_timeout_secs = 45
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.port, Some(6100));
    assert_eq!(config.database_path, Some(PathBuf::from("/tmp/verdant-test.db")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.gemini.api_key.as_deref(), Some("gem-key"));
    assert_eq!(config.gemini.model.as_deref(), Some("gemini-2.0-flash"));
    assert!(config.gemini.api_base.is_none());
    assert_eq!(config.storage.api_key.as_deref(), Some("ut-secret"));
    assert_eq!(config.pipeline.catalog_sample_size, 10);
    assert_eq!(config.pipeline.inference_timeout_secs, 45);
    // Unset keys inside a present section keep their defaults
    assert_eq!(config.pipeline.fetch_timeout_secs, 20);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_root_folder_cli_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/from-cli")), &toml);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_env_before_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/from-toml"));
}

#[test]
#[serial]
fn test_root_folder_default_is_non_empty() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.ends_with("verdant") || resolved.ends_with("verdant_data"));
}

#[test]
#[serial]
fn test_secret_env_takes_priority_over_toml() {
    env::set_var("VERDANT_TEST_SECRET_A", "from-env");
    let key = resolve_secret("Test secret", &["VERDANT_TEST_SECRET_A"], Some("from-toml")).unwrap();
    assert_eq!(key, "from-env");
    env::remove_var("VERDANT_TEST_SECRET_A");
}

#[test]
#[serial]
fn test_secret_env_order_respected() {
    env::set_var("VERDANT_TEST_SECRET_A", "first");
    env::set_var("VERDANT_TEST_SECRET_B", "second");
    let key = resolve_secret(
        "Test secret",
        &["VERDANT_TEST_SECRET_A", "VERDANT_TEST_SECRET_B"],
        None,
    )
    .unwrap();
    assert_eq!(key, "first");
    env::remove_var("VERDANT_TEST_SECRET_A");
    env::remove_var("VERDANT_TEST_SECRET_B");
}

#[test]
#[serial]
fn test_secret_blank_env_falls_back_to_toml() {
    env::set_var("VERDANT_TEST_SECRET_A", "   ");
    let key = resolve_secret("Test secret", &["VERDANT_TEST_SECRET_A"], Some(" toml-key ")).unwrap();
    assert_eq!(key, "toml-key");
    env::remove_var("VERDANT_TEST_SECRET_A");
}

#[test]
#[serial]
fn test_secret_missing_everywhere_is_config_error() {
    env::remove_var("VERDANT_TEST_SECRET_A");
    let err = resolve_secret("Test secret", &["VERDANT_TEST_SECRET_A"], None).unwrap_err();
    match err {
        Error::Config(msg) => {
            assert!(msg.contains("Test secret"));
            assert!(msg.contains("VERDANT_TEST_SECRET_A"));
        }
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_is_valid_key() {
    assert!(is_valid_key("abc"));
    assert!(!is_valid_key(""));
    assert!(!is_valid_key(" \t\n"));
}
