use mnemo::core::broker::DbBroker;
use mnemo::core::config::StoreConfig;
use mnemo::core::db;
use mnemo::core::error::MnemoError;
use mnemo::core::schemas;
use mnemo::core::store::Store;
use rusqlite::Connection;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn test_initialize_creates_all_tables_and_is_idempotent() {
    let tmp = tempdir().unwrap();
    db::initialize_memory_db(tmp.path()).unwrap();
    db::initialize_memory_db(tmp.path()).unwrap();

    let conn = Connection::open(db::memory_db_path(tmp.path())).unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count as usize, schemas::MEMORY_DB_ALL_TABLES.len());

    let version: String = conn
        .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(version, schemas::MEMORY_SCHEMA_VERSION.to_string());
}

#[test]
fn test_store_open_survives_reopen() {
    let tmp = tempdir().unwrap();
    {
        let store = Store::open(tmp.path()).unwrap();
        mnemo::plugins::memory::set_context(&store, "k", "v").unwrap();
    }
    let store = Store::open(tmp.path()).unwrap();
    let pairs = mnemo::plugins::memory::get_context(&store).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].value, "v");
}

#[test]
fn test_broker_appends_audit_events() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    mnemo::plugins::memory::set_context(&store, "k", "v").unwrap();

    let log = fs::read_to_string(tmp.path().join("broker.events.jsonl")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert!(!lines.is_empty());

    let last: serde_json::Value = serde_json::from_str(lines.last().unwrap()).unwrap();
    assert_eq!(last["op"], "context.set");
    assert_eq!(last["db_id"], "memory.db");
    assert_eq!(last["status"], "success");
}

#[test]
fn test_broker_logs_failures_too() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let result = mnemo::plugins::memory::deactivate_memory(&store, "mem_missing");
    assert!(result.is_err());

    let log = fs::read_to_string(tmp.path().join("broker.events.jsonl")).unwrap();
    let last: serde_json::Value = serde_json::from_str(log.lines().last().unwrap()).unwrap();
    assert_eq!(last["op"], "memory.deactivate");
    assert_eq!(last["status"], "error");
}

#[test]
fn test_broker_serializes_concurrent_writers() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            mnemo::plugins::memory::set_context(&store, &format!("k{}", i), "v").unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let pairs = mnemo::plugins::memory::get_context(&store).unwrap();
    assert_eq!(pairs.len(), 8);
}

#[test]
fn test_config_defaults_without_file() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert_eq!(store.config.queue_capacity, 20);
    assert_eq!(store.config.request_ttl_days, 14);
}

#[test]
fn test_config_loads_overrides() {
    let tmp = tempdir().unwrap();
    fs::write(
        tmp.path().join("mnemo.toml"),
        "queue_capacity = 7\nrequest_ttl_days = 3\n",
    )
    .unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert_eq!(store.config.queue_capacity, 7);
    assert_eq!(store.config.request_ttl_days, 3);
    assert_eq!(store.config.results_retention_days, 90);
}

#[test]
fn test_config_rejects_zero_capacity_and_unknown_keys() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("mnemo.toml"), "queue_capacity = 0\n").unwrap();
    assert!(matches!(
        StoreConfig::load(tmp.path()),
        Err(MnemoError::ValidationError(_))
    ));

    fs::write(tmp.path().join("mnemo.toml"), "no_such_knob = true\n").unwrap();
    assert!(matches!(
        StoreConfig::load(tmp.path()),
        Err(MnemoError::ValidationError(_))
    ));
}

#[test]
fn test_foreign_keys_enforced_on_broker_connections() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let broker = DbBroker::new(tmp.path());
    let result = broker.with_conn(&store.db_path(), "mnemo", None, "test.fk", |conn| {
        conn.execute(
            "INSERT INTO conversations(id, session_id, role, content, created_at)
             VALUES('conv_x', 'ses_missing', 'user', 'hi', '1Z')",
            [],
        )
        .map_err(MnemoError::RusqliteError)?;
        Ok(())
    });
    assert!(result.is_err());
}
