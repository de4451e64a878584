use crate::core::db;
use crate::core::error;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the "thin waist" for state access: an in-process
/// serialized request layer that audit-logs every brokered operation.
///
/// Serialization here is belt-and-braces: callers that must be atomic
/// against other *processes* (queue capacity checks, dequeue claims) still
/// open an IMMEDIATE transaction on the connection they are handed.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub intent_ref: Option<String>,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join("broker.events.jsonl"),
        }
    }

    /// Execute a closure with a serialized, mutable connection to the
    /// specified DB. Mutability lets callers open explicit transactions.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        intent_ref: Option<&str>,
        op_name: &str,
        f: F,
    ) -> Result<R, error::MnemoError>
    where
        F: FnOnce(&mut Connection) -> Result<R, error::MnemoError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mut conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&mut conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, intent_ref, op_name, &db_id, status)?;

        result
    }

    fn log_event(
        &self,
        actor: &str,
        intent_ref: Option<&str>,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::MnemoError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            intent_ref: intent_ref.map(|s| s.to_string()),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::MnemoError::IoError)?;

        writeln!(
            f,
            "{}",
            serde_json::to_string(&ev).expect("broker event serializes")
        )
        .map_err(error::MnemoError::IoError)?;
        Ok(())
    }
}
