//! Context aggregator: one read-only snapshot of everything an agent
//! should see at session start.
//!
//! All six sections are read inside a single transaction so the report is
//! internally consistent. Encrypted memories and anything below the
//! importance floor stay out; secrets appear as metadata only.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::MnemoError;
use crate::core::store::Store;
use crate::plugins::memory::{self, ContextPair, Memory};
use crate::plugins::research::Interest;
use crate::plugins::todo::{Project, Task};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// Importance floor for memories included in the report.
pub const CONTEXT_IMPORTANCE_FLOOR: i64 = 7;

pub const CONTEXT_MEMORY_LIMIT: usize = 100;
pub const CONTEXT_TASK_LIMIT: usize = 20;
pub const CONTEXT_INTEREST_LIMIT: usize = 10;

/// `(secret_type, name)` pairs; never plaintext, never ciphertext.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecretRef {
    pub secret_type: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextReport {
    pub user_context: Vec<ContextPair>,
    pub important_memories: Vec<Memory>,
    pub open_tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub active_interests: Vec<Interest>,
    pub available_secrets: Vec<SecretRef>,
    pub generated_at: String,
}

/// Build the full context report from one consistent snapshot.
/// `memory_limit` caps the memories section; `None` means the default of
/// [`CONTEXT_MEMORY_LIMIT`].
pub fn build_context(
    store: &Store,
    memory_limit: Option<usize>,
) -> Result<ContextReport, MnemoError> {
    let memory_limit = memory_limit.unwrap_or(CONTEXT_MEMORY_LIMIT) as i64;
    let generated_at = crate::core::time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "context.build", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction()?;

        let user_context = memory::load_context(&tx)?;

        let important_memories = {
            let mut stmt = tx.prepare(
                "SELECT id, memory_type, category, content, is_encrypted, importance,
                        project_id, active, created_at, updated_at
                 FROM memories
                 WHERE active = 1 AND is_encrypted = 0 AND importance >= ?1
                 ORDER BY importance DESC, created_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(
                params![CONTEXT_IMPORTANCE_FLOOR, memory_limit],
                |row| {
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
                },
            )?;
            collect(rows)?
        };

        let open_tasks = {
            let mut stmt = tx.prepare(
                "SELECT id, title, description, status, priority, project_id,
                        parent_task_id, created_at, updated_at, completed_at
                 FROM tasks
                 WHERE status IN ('pending', 'in_progress')
                 ORDER BY priority DESC, created_at
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![CONTEXT_TASK_LIMIT as i64], |row| {
                Ok(Task {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    status: row.get(3)?,
                    priority: row.get(4)?,
                    project_id: row.get(5)?,
                    parent_task_id: row.get(6)?,
                    created_at: row.get(7)?,
                    updated_at: row.get(8)?,
                    completed_at: row.get(9)?,
                })
            })?;
            collect(rows)?
        };

        let projects = {
            let mut stmt = tx.prepare(
                "SELECT id, name, path, tech_stack, last_accessed, created_at
                 FROM projects
                 ORDER BY last_accessed DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                let stack_json: String = row.get(3)?;
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    path: row.get(2)?,
                    tech_stack: serde_json::from_str(&stack_json).unwrap_or_default(),
                    last_accessed: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            collect(rows)?
        };

        let active_interests = {
            let mut stmt = tx.prepare(
                "SELECT id, topic, why_interested, sparked_by, status, priority,
                        insights_gained, remaining_questions, tags, paused_from,
                        last_explored_at, created_at, updated_at
                 FROM learning_interests
                 WHERE status IN ('curious', 'exploring')
                 ORDER BY priority DESC, created_at DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![CONTEXT_INTEREST_LIMIT as i64], |row| {
                let insights_json: String = row.get(6)?;
                let questions_json: String = row.get(7)?;
                let tags_json: String = row.get(8)?;
                Ok(Interest {
                    id: row.get(0)?,
                    topic: row.get(1)?,
                    why_interested: row.get(2)?,
                    sparked_by: row.get(3)?,
                    status: row.get(4)?,
                    priority: row.get(5)?,
                    insights_gained: serde_json::from_str(&insights_json).unwrap_or_default(),
                    remaining_questions: serde_json::from_str(&questions_json)
                        .unwrap_or_default(),
                    tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                    paused_from: row.get(9)?,
                    last_explored_at: row.get(10)?,
                    created_at: row.get(11)?,
                    updated_at: row.get(12)?,
                })
            })?;
            collect(rows)?
        };

        let available_secrets = {
            let mut stmt = tx.prepare(
                "SELECT secret_type, name FROM secrets
                 WHERE active = 1
                 ORDER BY secret_type, name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(SecretRef {
                    secret_type: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            collect(rows)?
        };

        // Read-only snapshot; nothing to commit, but close it cleanly.
        tx.commit()?;

        Ok(ContextReport {
            user_context,
            important_memories,
            open_tasks,
            projects,
            active_interests,
            available_secrets,
            generated_at,
        })
    })
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, MnemoError> {
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
