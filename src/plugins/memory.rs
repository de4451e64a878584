//! Memory ledger: durable facts/decisions/notes with importance scoring,
//! user-context key/value pairs, and agent session tracking.
//!
//! Encrypted memories keep only a placeholder in `content`; the payload
//! lives in `encrypted_content` and is invisible to plaintext search.

use crate::core::broker::DbBroker;
use crate::core::crypto;
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Placeholder stored in `content` for encrypted rows.
pub const ENCRYPTED_PLACEHOLDER: &str = "[encrypted]";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+").expect("token regex compiles"));

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Memory {
    pub id: String,
    pub memory_type: String,
    pub category: String,
    pub content: String,
    pub is_encrypted: bool,
    pub importance: i64,
    pub project_id: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextPair {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Options for `add_memory` beyond the content itself.
#[derive(Debug, Clone)]
pub struct AddMemory<'a> {
    pub memory_type: &'a str,
    pub category: &'a str,
    pub importance: i64,
    pub project_id: Option<&'a str>,
    /// Encrypt the content under this key; plaintext is then never stored.
    pub encrypt_key: Option<&'a str>,
}

impl Default for AddMemory<'_> {
    fn default() -> Self {
        Self {
            memory_type: "fact",
            category: "general",
            importance: 5,
            project_id: None,
            encrypt_key: None,
        }
    }
}

pub fn add_memory(
    store: &Store,
    content: &str,
    opts: &AddMemory,
) -> Result<String, error::MnemoError> {
    if content.is_empty() {
        return Err(error::MnemoError::ValidationError(
            "memory content must be non-empty".into(),
        ));
    }
    if !(1..=10).contains(&opts.importance) {
        return Err(error::MnemoError::ValidationError(format!(
            "importance {} out of range 1..=10",
            opts.importance
        )));
    }

    let (stored_content, encrypted_content) = match opts.encrypt_key {
        Some(key) => (
            ENCRYPTED_PLACEHOLDER.to_string(),
            Some(crypto::encrypt(content, key)?),
        ),
        None => (content.to_string(), None),
    };

    let id = time::new_id("mem");
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "memory.add", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO memories(id, memory_type, category, content, encrypted_content,
                                  is_encrypted, importance, project_id, active, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
            params![
                id,
                opts.memory_type,
                opts.category,
                stored_content,
                encrypted_content,
                encrypted_content.is_some(),
                opts.importance,
                opts.project_id,
                ts
            ],
        )?;
        Ok(())
    })?;
    Ok(id)
}

fn memory_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: row.get(0)?,
        memory_type: row.get(1)?,
        category: row.get(2)?,
        content: row.get(3)?,
        is_encrypted: row.get(4)?,
        importance: row.get(5)?,
        project_id: row.get(6)?,
        active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const MEMORY_COLUMNS: &str = "id, memory_type, category, content, is_encrypted, \
                              importance, project_id, active, created_at, updated_at";

fn query_tokens(query: &str) -> FxHashSet<String> {
    TOKEN_RE
        .find_iter(&query.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn matches_query(content: &str, query_lower: &str, tokens: &FxHashSet<String>) -> bool {
    let content_lower = content.to_lowercase();
    if content_lower.contains(query_lower) {
        return true;
    }
    TOKEN_RE
        .find_iter(&content_lower)
        .any(|m| tokens.contains(m.as_str()))
}

/// Search plaintext memories by case-insensitive substring or token
/// overlap, ordered `importance DESC, created_at DESC`. Encrypted rows are
/// opaque and never match.
pub fn search_memories(
    store: &Store,
    query: &str,
    memory_type: Option<&str>,
    category: Option<&str>,
    limit: usize,
) -> Result<Vec<Memory>, error::MnemoError> {
    let query_lower = query.to_lowercase();
    let tokens = query_tokens(query);

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "memory.search", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE active = 1 AND is_encrypted = 0
               AND (?1 IS NULL OR memory_type = ?1)
               AND (?2 IS NULL OR category = ?2)
             ORDER BY importance DESC, created_at DESC"
        ))?;
        let rows = stmt.query_map(params![memory_type, category], memory_from_row)?;

        let mut results = Vec::new();
        for r in rows {
            let memory = r?;
            if matches_query(&memory.content, &query_lower, &tokens) {
                results.push(memory);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    })
}

/// Most recent active memories, ordered `importance DESC, created_at DESC`.
pub fn recent_memories(
    store: &Store,
    limit: usize,
    memory_type: Option<&str>,
) -> Result<Vec<Memory>, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "memory.recent", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE active = 1 AND (?1 IS NULL OR memory_type = ?1)
             ORDER BY importance DESC, created_at DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![memory_type, limit as i64], memory_from_row)?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

pub fn get_memory(store: &Store, id: &str) -> Result<Memory, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "memory.get", |conn| {
        db::ensure_schema(conn)?;
        conn.query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
            params![id],
            memory_from_row,
        )
        .optional()
        .map_err(error::MnemoError::RusqliteError)?
        .ok_or_else(|| error::MnemoError::NotFound(format!("memory {}", id)))
    })
}

/// Decrypt the payload of an encrypted memory with the caller's key.
pub fn decrypt_memory(store: &Store, id: &str, key: &str) -> Result<String, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    let encrypted: String =
        broker.with_conn(&store.db_path(), "mnemo", None, "memory.decrypt", |conn| {
            db::ensure_schema(conn)?;
            conn.query_row(
                "SELECT encrypted_content FROM memories
                 WHERE id = ?1 AND is_encrypted = 1 AND active = 1",
                params![id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map_err(error::MnemoError::RusqliteError)?
            .flatten()
            .ok_or_else(|| error::MnemoError::NotFound(format!("encrypted memory {}", id)))
        })?;
    crypto::decrypt(&encrypted, key)
}

pub fn deactivate_memory(store: &Store, id: &str) -> Result<(), error::MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "memory.deactivate", |conn| {
        db::ensure_schema(conn)?;
        let changed = conn.execute(
            "UPDATE memories SET active = 0, updated_at = ?1 WHERE id = ?2 AND active = 1",
            params![ts, id],
        )?;
        if changed == 0 {
            return Err(error::MnemoError::NotFound(format!("memory {}", id)));
        }
        Ok(())
    })
}

// --- User context ---

pub fn set_context(store: &Store, key: &str, value: &str) -> Result<(), error::MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "context.set", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO user_context(context_key, context_value, updated_at)
             VALUES(?1, ?2, ?3)
             ON CONFLICT(context_key) DO UPDATE SET
                 context_value = excluded.context_value,
                 updated_at = excluded.updated_at",
            params![key, value, ts],
        )?;
        Ok(())
    })
}

/// All user-context pairs, most recently updated first.
pub fn get_context(store: &Store) -> Result<Vec<ContextPair>, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "context.get", |conn| {
        db::ensure_schema(conn)?;
        load_context(conn)
    })
}

pub(crate) fn load_context(conn: &Connection) -> Result<Vec<ContextPair>, error::MnemoError> {
    let mut stmt = conn.prepare(
        "SELECT context_key, context_value, updated_at FROM user_context
         ORDER BY updated_at DESC, context_key",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ContextPair {
            key: row.get(0)?,
            value: row.get(1)?,
            updated_at: row.get(2)?,
        })
    })?;
    let mut results = Vec::new();
    for r in rows {
        results.push(r?);
    }
    Ok(results)
}

// --- Agent sessions ---

pub fn start_session(
    store: &Store,
    session_id: &str,
    working_directory: &str,
) -> Result<String, error::MnemoError> {
    let id = time::new_id("ses");
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "session.start", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO sessions(id, session_id, working_directory, started_at, active)
             VALUES(?1, ?2, ?3, ?4, 1)
             ON CONFLICT(session_id) DO UPDATE SET
                 working_directory = excluded.working_directory,
                 ended_at = NULL,
                 active = 1",
            params![id, session_id, working_directory, ts],
        )?;
        let stored_id: String = conn.query_row(
            "SELECT id FROM sessions WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(stored_id)
    })
}

pub fn end_session(store: &Store, session_id: &str) -> Result<(), error::MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "session.end", |conn| {
        db::ensure_schema(conn)?;
        let changed = conn.execute(
            "UPDATE sessions SET ended_at = ?1, active = 0
             WHERE session_id = ?2 AND active = 1",
            params![ts, session_id],
        )?;
        if changed == 0 {
            return Err(error::MnemoError::NotFound(format!(
                "active session {}",
                session_id
            )));
        }
        Ok(())
    })
}

/// Append a conversation row owned by the session (cascade-deleted with it).
pub fn log_conversation(
    store: &Store,
    session_id: &str,
    role: &str,
    content: &str,
) -> Result<String, error::MnemoError> {
    let id = time::new_id("conv");
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "session.log", |conn| {
        db::ensure_schema(conn)?;
        let owner: Option<String> = conn
            .query_row(
                "SELECT id FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        let owner = owner
            .ok_or_else(|| error::MnemoError::NotFound(format!("session {}", session_id)))?;
        conn.execute(
            "INSERT INTO conversations(id, session_id, role, content, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![id, owner, role, content, ts],
        )?;
        Ok(())
    })?;
    Ok(id)
}
