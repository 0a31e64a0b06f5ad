// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::DaemonConfig;

#[test]
fn no_path_yields_the_literal_defaults() {
    let config = DaemonConfig::load(None).unwrap();
    assert_eq!(config, DaemonConfig::default());
    assert_eq!(config.supervisor.retention, 10);
}

#[test]
fn a_toml_file_overrides_only_the_fields_it_sets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secd.toml");
    std::fs::write(&path, "retention = 5\nlog_dir = \"/var/log/secd\"\n").unwrap();

    let config = DaemonConfig::load(Some(&path)).unwrap();
    assert_eq!(config.supervisor.retention, 5);
    assert_eq!(config.supervisor.startup_timeout_ms, 3_000);
    assert_eq!(config.log_dir, Some(std::path::PathBuf::from("/var/log/secd")));
}

#[test]
fn a_missing_file_is_a_read_error() {
    let err = DaemonConfig::load(Some(std::path::Path::new("/no/such/secd.toml"))).unwrap_err();
    assert!(matches!(err, super::ConfigError::Read { .. }));
}
