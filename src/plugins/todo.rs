//! Task and project ledger.
//!
//! Tasks carry a small status machine (`pending`, `in_progress`,
//! `completed`, `blocked`, `cancelled`) with `completed_at` stamped on the
//! way into `completed` and cleared on the way out. Projects are upserted
//! on their filesystem path; deleting a project nulls the soft references
//! on memories, tasks, and research requests via the schema's SET NULL
//! rules.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

pub const TASK_STATUSES: &[&str] =
    &["pending", "in_progress", "completed", "blocked", "cancelled"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: i64,
    pub project_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: String,
    pub tech_stack: Vec<String>,
    pub last_accessed: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct AddTask<'a> {
    pub description: Option<&'a str>,
    pub priority: Option<i64>,
    pub project_id: Option<&'a str>,
    pub parent_task_id: Option<&'a str>,
}

pub fn add_task(store: &Store, title: &str, opts: &AddTask) -> Result<String, error::MnemoError> {
    if title.is_empty() {
        return Err(error::MnemoError::ValidationError(
            "task title must be non-empty".into(),
        ));
    }
    let priority = opts.priority.unwrap_or(5);
    if !(1..=10).contains(&priority) {
        return Err(error::MnemoError::ValidationError(format!(
            "priority {} out of range 1..=10",
            priority
        )));
    }

    let id = time::new_id("task");
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "todo.add", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO tasks(id, title, description, status, priority,
                               project_id, parent_task_id, created_at, updated_at)
             VALUES(?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                title,
                opts.description.unwrap_or_default(),
                priority,
                opts.project_id,
                opts.parent_task_id,
                ts
            ],
        )?;
        Ok(())
    })?;
    Ok(id)
}

/// Move a task to `status`. Entering `completed` stamps `completed_at`;
/// leaving it clears the stamp.
pub fn update_task_status(
    store: &Store,
    id: &str,
    status: &str,
) -> Result<(), error::MnemoError> {
    if !TASK_STATUSES.contains(&status) {
        return Err(error::MnemoError::ValidationError(format!(
            "unknown task status '{}'",
            status
        )));
    }
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "todo.status", |conn| {
        db::ensure_schema(conn)?;
        let completed_at = if status == "completed" { Some(ts.as_str()) } else { None };
        let changed = conn.execute(
            "UPDATE tasks SET status = ?1, completed_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![status, completed_at, ts, id],
        )?;
        if changed == 0 {
            return Err(error::MnemoError::NotFound(format!("task {}", id)));
        }
        Ok(())
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
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
}

pub(crate) const TASK_COLUMNS: &str = "id, title, description, status, priority, project_id, \
                                       parent_task_id, created_at, updated_at, completed_at";

/// Tasks ordered `priority DESC, created_at`, optionally filtered by status.
pub fn list_tasks(store: &Store, status: Option<&str>) -> Result<Vec<Task>, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "todo.list", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY priority DESC, created_at"
        ))?;
        let rows = stmt.query_map(params![status], task_from_row)?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

pub fn get_task(store: &Store, id: &str) -> Result<Task, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "todo.get", |conn| {
        db::ensure_schema(conn)?;
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            task_from_row,
        )
        .optional()
        .map_err(error::MnemoError::RusqliteError)?
        .ok_or_else(|| error::MnemoError::NotFound(format!("task {}", id)))
    })
}

// --- Projects ---

/// Register a project, upserting on its unique path. Re-registering
/// refreshes the name, tech stack, and `last_accessed`.
pub fn upsert_project(
    store: &Store,
    name: &str,
    path: &str,
    tech_stack: &[String],
) -> Result<String, error::MnemoError> {
    if name.is_empty() || path.is_empty() {
        return Err(error::MnemoError::ValidationError(
            "project name and path must be non-empty".into(),
        ));
    }
    let id = time::new_id("proj");
    let ts = time::now_epoch_z();
    let stack_json = serde_json::to_string(tech_stack).expect("tech stack serializes");

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "project.upsert", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO projects(id, name, path, tech_stack, last_accessed, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(path) DO UPDATE SET
                 name = excluded.name,
                 tech_stack = excluded.tech_stack,
                 last_accessed = excluded.last_accessed",
            params![id, name, path, stack_json, ts],
        )?;
        let stored_id: String = conn.query_row(
            "SELECT id FROM projects WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(stored_id)
    })
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let stack_json: String = row.get(3)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        tech_stack: serde_json::from_str(&stack_json).unwrap_or_default(),
        last_accessed: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) const PROJECT_COLUMNS: &str =
    "id, name, path, tech_stack, last_accessed, created_at";

/// Projects ordered by most recent access.
pub fn list_projects(store: &Store) -> Result<Vec<Project>, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "project.list", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY last_accessed DESC"
        ))?;
        let rows = stmt.query_map([], project_from_row)?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

/// Bump a project's `last_accessed` to now.
pub fn touch_project(store: &Store, id: &str) -> Result<(), error::MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "project.touch", |conn| {
        db::ensure_schema(conn)?;
        let changed = conn.execute(
            "UPDATE projects SET last_accessed = ?1 WHERE id = ?2",
            params![ts, id],
        )?;
        if changed == 0 {
            return Err(error::MnemoError::NotFound(format!("project {}", id)));
        }
        Ok(())
    })
}

/// Delete a project. Referencing memories, tasks, and research requests
/// survive with their `project_id` nulled.
pub fn delete_project(store: &Store, id: &str) -> Result<(), error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "project.delete", |conn| {
        db::ensure_schema(conn)?;
        let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(error::MnemoError::NotFound(format!("project {}", id)));
        }
        Ok(())
    })
}
