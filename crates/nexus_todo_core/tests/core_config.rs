use nexus_todo_core::{ConfigError, CoreConfig, Priority, SyncOutbox};

#[test]
fn load_reads_partial_file_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nexus.json");
    std::fs::write(
        &path,
        r#"{
            "logLevel": "warn",
            "defaultCategory": "Inbox",
            "planning": { "backlogLimit": 3 },
            "sync": { "enabled": true, "maxAttempts": 2 }
        }"#,
    )
    .unwrap();

    let config = CoreConfig::load(&path).unwrap();
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.default_category, "Inbox");
    assert_eq!(config.planning.backlog_limit, 3);
    assert_eq!(config.planning.in_progress_limit, 3);
    assert_eq!(config.escalation.due_today_target, Priority::High);
    assert!(SyncOutbox::from_config(&config.sync).is_some());
}

#[test]
fn disabled_sync_builds_no_outbox() {
    assert!(SyncOutbox::from_config(&CoreConfig::default().sync).is_none());
}

#[test]
fn missing_file_and_bad_values_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = CoreConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));

    let err = CoreConfig::from_json_str(r#"{ "defaultCategory": "   " }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = CoreConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
