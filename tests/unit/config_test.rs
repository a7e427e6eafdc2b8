//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use counsellor_capacity::config::{
    JournalConfig, ServiceConfig, ENV_AUDIT_CAPACITY, ENV_DEFAULT_MAX_CAPACITY, ENV_JOURNAL_PATH,
    ENV_OP_TIMEOUT_MS,
};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = ServiceConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.default_max_capacity, 10);
    assert_eq!(cfg.op_timeout(), None);
    assert!(cfg.journal.is_none());
}

#[test]
fn test_zero_default_capacity_rejected() {
    let cfg = ServiceConfig {
        default_max_capacity: 0,
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_timeout_rejected() {
    let cfg = ServiceConfig {
        op_timeout_ms: Some(0),
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_blank_journal_stream_rejected() {
    let cfg = ServiceConfig {
        journal: Some(JournalConfig {
            dir: "/tmp/ledger".into(),
            stream: "  ".into(),
        }),
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg = ServiceConfig::from_json_str(r#"{"op_timeout_ms": 250, "journal": {"dir": "/tmp/j"}}"#)
        .unwrap();
    assert_eq!(cfg.default_max_capacity, 10);
    assert_eq!(cfg.op_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(cfg.journal.unwrap().stream, "ledger");
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(ServiceConfig::from_json_str(r#"{"default_max_capacity": 0}"#).is_err());
    assert!(ServiceConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_lookup_reads_variables() {
    let cfg = ServiceConfig::from_lookup(lookup(&[
        (ENV_DEFAULT_MAX_CAPACITY, "25"),
        (ENV_OP_TIMEOUT_MS, " 1500 "),
        (ENV_AUDIT_CAPACITY, "0"),
        (ENV_JOURNAL_PATH, "/var/lib/counsellors"),
    ]))
    .unwrap();
    assert_eq!(cfg.default_max_capacity, 25);
    assert_eq!(cfg.op_timeout_ms, Some(1500));
    assert_eq!(cfg.audit_capacity, 0);
    let journal = cfg.journal.unwrap();
    assert_eq!(journal.dir, std::path::PathBuf::from("/var/lib/counsellors"));
    assert_eq!(journal.stream, "ledger");
}

#[test]
fn test_from_lookup_keeps_defaults_when_unset() {
    let cfg = ServiceConfig::from_lookup(lookup(&[(ENV_JOURNAL_PATH, "")])).unwrap();
    assert_eq!(cfg, ServiceConfig::default());
}

#[test]
fn test_from_lookup_names_the_bad_variable() {
    let err = ServiceConfig::from_lookup(lookup(&[(ENV_DEFAULT_MAX_CAPACITY, "ten")]))
        .unwrap_err();
    assert!(format!("{err:#}").contains(ENV_DEFAULT_MAX_CAPACITY));

    let err = ServiceConfig::from_lookup(lookup(&[(ENV_DEFAULT_MAX_CAPACITY, "0")])).unwrap_err();
    assert!(err.to_string().contains("default_max_capacity"));
}
