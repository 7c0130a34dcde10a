//! Loading the memory probe configuration through the layered loader.
//!
//! Every test uses its own environment variable prefix, as tests run concurrently within the same process.

use std::{fs, path::PathBuf};

use memprobe_config::{ConfigurationError, ConfigurationLoader};
use process_memory::{ProbeConfiguration, StatSourceKind};

#[test]
fn defaults() {
    let config = ConfigurationLoader::default()
        .from_environment("MEMPROBE_TEST_DEFAULTS")
        .unwrap()
        .into_typed::<ProbeConfiguration>()
        .unwrap();

    assert_eq!(config, ProbeConfiguration::default());
    assert_eq!(config.stat_source, StatSourceKind::Auto);
    assert_eq!(config.procfs_root, PathBuf::from("/proc"));
    assert!(config.strict_parsing);
    assert!(!config.legacy_data_stack);
}

#[test]
fn environment_overrides() {
    std::env::set_var("MEMPROBE_TEST_ENV_STAT_SOURCE", "accounting");
    std::env::set_var("MEMPROBE_TEST_ENV_LEGACY_DATA_STACK", "true");
    std::env::set_var("MEMPROBE_TEST_ENV_PROCFS_ROOT", "/host/proc");

    let config = ConfigurationLoader::default()
        .from_environment("MEMPROBE_TEST_ENV")
        .unwrap()
        .into_typed::<ProbeConfiguration>()
        .unwrap();

    assert_eq!(config.stat_source, StatSourceKind::Accounting);
    assert!(config.legacy_data_stack);
    assert_eq!(config.procfs_root, PathBuf::from("/host/proc"));
    assert!(config.strict_parsing);
}

#[test]
fn environment_takes_precedence_over_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("memprobe.yaml");
    fs::write(&config_path, "stat_source: statm\nstrict_parsing: true\nprocfs_root: /yaml/proc\n").unwrap();

    std::env::set_var("MEMPROBE_TEST_LAYERED_STRICT_PARSING", "false");

    let config = ConfigurationLoader::default()
        .from_yaml(&config_path)
        .unwrap()
        .from_environment("MEMPROBE_TEST_LAYERED")
        .unwrap()
        .into_typed::<ProbeConfiguration>()
        .unwrap();

    assert_eq!(config.stat_source, StatSourceKind::Statm);
    assert_eq!(config.procfs_root, PathBuf::from("/yaml/proc"));
    assert!(!config.strict_parsing);
}

#[test]
fn invalid_field_type() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("memprobe.yaml");
    fs::write(&config_path, "strict_parsing: [1, 2]\n").unwrap();

    let result = ConfigurationLoader::default()
        .from_yaml(&config_path)
        .unwrap()
        .into_typed::<ProbeConfiguration>();

    match result {
        Err(ConfigurationError::InvalidFieldType { field, .. }) => assert_eq!(field, "strict_parsing"),
        other => panic!("expected invalid field type, got {:?}", other),
    }
}

#[test]
fn unknown_stat_source_rejected() {
    std::env::set_var("MEMPROBE_TEST_UNKNOWN_STAT_SOURCE", "smaps");

    let result = ConfigurationLoader::default()
        .from_environment("MEMPROBE_TEST_UNKNOWN")
        .unwrap()
        .into_typed::<ProbeConfiguration>();

    assert!(result.is_err());
}
