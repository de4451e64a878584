//! Bounded research pipeline and learning ledger.
//!
//! Research requests flow through a capacity-bounded queue
//! (`pending` -> `in_progress` -> `completed`/`failed`, with `cancelled`
//! reachable from the first two). Enqueue and dequeue both open IMMEDIATE
//! transactions so the capacity check and the claim are atomic against
//! other writers. Learning interests carry their own ladder
//! (`curious` -> `exploring` -> `deepening` -> `integrated`) with a pause
//! state that remembers where it came from.
//!
//! External collaborators (the fetcher and the synthesizer) are plugged in
//! behind traits and every call is bounded by a wall-clock timeout; a slow
//! or failing collaborator leaves the claimed request in `failed`, never
//! stuck in `in_progress`.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::MnemoError;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const REQUEST_PRIORITIES: &[&str] = &["urgent", "high", "medium", "low"];

/// Numeric rank for queue ordering; higher dequeues first.
pub fn priority_rank(priority: &str) -> i64 {
    match priority {
        "urgent" => 4,
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}

const PRIORITY_RANK_SQL: &str = "CASE priority
    WHEN 'urgent' THEN 4
    WHEN 'high' THEN 3
    WHEN 'medium' THEN 2
    WHEN 'low' THEN 1
    ELSE 0 END";

pub const INTEREST_LADDER: &[&str] = &["curious", "exploring", "deepening", "integrated"];

/// Exploring tips into deepening once an interest has banked this many
/// insights.
pub const DEEPENING_INSIGHT_THRESHOLD: usize = 10;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResearchRequest {
    pub id: String,
    pub topic: String,
    pub search_queries: Vec<String>,
    pub why_researching: Option<String>,
    pub hoping_to_learn: Option<String>,
    pub priority: String,
    pub status: String,
    pub interest_id: Option<String>,
    pub project_id: Option<String>,
    pub requested_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub expires_at: String,
    pub error_message: Option<String>,
}

/// A single fetched source, as handed back by a [`ResearchFetcher`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchedResult {
    pub query_used: String,
    pub source_url: String,
    pub source_title: String,
    pub snippet: String,
    pub full_content: Option<String>,
    pub content_type: String,
    pub relevance_score: Option<f64>,
}

/// Synthesized takeaways for one completed request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Insight {
    pub topic: String,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub new_questions: Vec<String>,
    pub confidence_level: String,
    pub sources_used: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InsightRecord {
    pub id: String,
    pub request_id: Option<String>,
    pub interest_id: Option<String>,
    pub topic: String,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub new_questions: Vec<String>,
    pub confidence_level: String,
    pub sources_used: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Interest {
    pub id: String,
    pub topic: String,
    pub why_interested: String,
    pub sparked_by: Option<String>,
    pub status: String,
    pub priority: i64,
    pub insights_gained: Vec<String>,
    pub remaining_questions: Vec<String>,
    pub tags: Vec<String>,
    pub paused_from: Option<String>,
    pub last_explored_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CleanupReport {
    pub expired_requests: usize,
    pub expired_results: usize,
    pub old_results: usize,
    pub old_sessions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EnqueueResearch<'a> {
    pub search_queries: &'a [String],
    pub why_researching: Option<&'a str>,
    pub hoping_to_learn: Option<&'a str>,
    /// Defaults to `medium`.
    pub priority: Option<&'a str>,
    pub interest_id: Option<&'a str>,
    pub project_id: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct AddInterest<'a> {
    pub why_interested: Option<&'a str>,
    pub sparked_by: Option<&'a str>,
    pub priority: Option<i64>,
    pub tags: &'a [String],
}

// --- Queue operations ---

/// Enqueue a research request. The pending count is checked and the row
/// inserted inside one IMMEDIATE transaction, so the queue never exceeds
/// the configured capacity even under concurrent enqueues.
pub fn enqueue_research(
    store: &Store,
    topic: &str,
    opts: &EnqueueResearch,
) -> Result<String, MnemoError> {
    if topic.is_empty() {
        return Err(MnemoError::ValidationError(
            "research topic must be non-empty".into(),
        ));
    }
    let priority = opts.priority.unwrap_or("medium");
    if !REQUEST_PRIORITIES.contains(&priority) {
        return Err(MnemoError::ValidationError(format!(
            "unknown research priority '{}'",
            priority
        )));
    }

    let id = time::new_id("req");
    let requested_at = time::now_epoch_z();
    let expires_at = time::epoch_z_plus_days(&requested_at, store.config.request_ttl_days);
    let queries_json = serde_json::to_string(opts.search_queries).expect("queries serialize");
    let capacity = store.config.queue_capacity;

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.enqueue", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending = tx.query_row(
            "SELECT COUNT(*) FROM research_requests WHERE status = 'pending'",
            [],
            |row| row.get::<_, i64>(0),
        )? as usize;
        if pending >= capacity {
            return Err(MnemoError::QueueFull { pending, capacity });
        }

        tx.execute(
            "INSERT INTO research_requests(id, topic, search_queries, why_researching,
                 hoping_to_learn, priority, status, interest_id, project_id,
                 requested_at, expires_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9, ?10)",
            params![
                id,
                topic,
                queries_json,
                opts.why_researching,
                opts.hoping_to_learn,
                priority,
                opts.interest_id,
                opts.project_id,
                requested_at,
                expires_at
            ],
        )?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(id)
}

const REQUEST_COLUMNS: &str = "id, topic, search_queries, why_researching, hoping_to_learn, \
                               priority, status, interest_id, project_id, requested_at, \
                               started_at, completed_at, expires_at, error_message";

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResearchRequest> {
    let queries_json: String = row.get(2)?;
    Ok(ResearchRequest {
        id: row.get(0)?,
        topic: row.get(1)?,
        search_queries: serde_json::from_str(&queries_json).unwrap_or_default(),
        why_researching: row.get(3)?,
        hoping_to_learn: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        interest_id: row.get(7)?,
        project_id: row.get(8)?,
        requested_at: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        expires_at: row.get(12)?,
        error_message: row.get(13)?,
    })
}

fn is_expired(request: &ResearchRequest, now_secs: u64) -> bool {
    match time::parse_epoch_z(&request.expires_at) {
        Some(expiry) => expiry <= now_secs,
        None => false,
    }
}

/// Claim the next pending request: highest priority rank first, oldest
/// `requested_at` breaking ties. Expired pending rows are skipped (they
/// stay on disk until [`cleanup_research`] reaps them). The select and the
/// claim happen in one IMMEDIATE transaction so two dequeuers can never
/// claim the same row.
pub fn dequeue_research(store: &Store) -> Result<ResearchRequest, MnemoError> {
    let now_secs = time::now_unix_secs();
    let started_at = time::now_epoch_z();

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.dequeue", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claimed = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM research_requests
                 WHERE status = 'pending'
                 ORDER BY {PRIORITY_RANK_SQL} DESC, requested_at ASC"
            ))?;
            let rows = stmt.query_map([], request_from_row)?;
            let mut claimed = None;
            for r in rows {
                let request = r?;
                if !is_expired(&request, now_secs) {
                    claimed = Some(request);
                    break;
                }
            }
            claimed
        };

        let mut request = claimed.ok_or(MnemoError::EmptyQueue)?;
        tx.execute(
            "UPDATE research_requests SET status = 'in_progress', started_at = ?1 WHERE id = ?2",
            params![started_at, request.id],
        )?;
        tx.commit()?;

        request.status = "in_progress".to_string();
        request.started_at = Some(started_at.clone());
        Ok(request)
    })
}

/// Claim a specific pending request by id, bypassing the priority order.
/// Same atomicity as [`dequeue_research`]; a non-pending row is an
/// [`MnemoError::InvalidTransition`] and an expired one is rejected.
pub fn claim_research(store: &Store, request_id: &str) -> Result<ResearchRequest, MnemoError> {
    let now_secs = time::now_unix_secs();
    let started_at = time::now_epoch_z();

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.claim", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut request = tx
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM research_requests WHERE id = ?1"),
                params![request_id],
                request_from_row,
            )
            .optional()
            .map_err(MnemoError::RusqliteError)?
            .ok_or_else(|| MnemoError::NotFound(format!("research request {}", request_id)))?;

        if request.status != "pending" {
            return Err(MnemoError::InvalidTransition {
                from: request.status,
                to: "in_progress".to_string(),
            });
        }
        if is_expired(&request, now_secs) {
            return Err(MnemoError::ValidationError(format!(
                "research request {} has expired",
                request_id
            )));
        }

        tx.execute(
            "UPDATE research_requests SET status = 'in_progress', started_at = ?1 WHERE id = ?2",
            params![started_at, request.id],
        )?;
        tx.commit()?;

        request.status = "in_progress".to_string();
        request.started_at = Some(started_at.clone());
        Ok(request)
    })
}

fn request_status(tx: &Connection, id: &str) -> Result<String, MnemoError> {
    tx.query_row(
        "SELECT status FROM research_requests WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
    .map_err(MnemoError::RusqliteError)?
    .ok_or_else(|| MnemoError::NotFound(format!("research request {}", id)))
}

fn insert_insight_row(
    tx: &Connection,
    request_id: Option<&str>,
    interest_id: Option<&str>,
    insight: &Insight,
    ts: &str,
) -> Result<String, MnemoError> {
    let id = time::new_id("ins");
    tx.execute(
        "INSERT INTO learning_insights(id, request_id, interest_id, topic, summary,
             key_insights, new_questions, confidence_level, sources_used, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            request_id,
            interest_id,
            insight.topic,
            insight.summary,
            serde_json::to_string(&insight.key_insights).expect("insights serialize"),
            serde_json::to_string(&insight.new_questions).expect("questions serialize"),
            insight.confidence_level,
            serde_json::to_string(&insight.sources_used).expect("sources serialize"),
            ts
        ],
    )?;
    Ok(id)
}

/// Complete an in-progress request: persist the fetched results and the
/// synthesized insight and flip the status, all in one transaction. Any
/// other current status is an [`MnemoError::InvalidTransition`].
pub fn complete_research(
    store: &Store,
    request_id: &str,
    results: &[FetchedResult],
    insight: &Insight,
) -> Result<String, MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.complete", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = request_status(&tx, request_id)?;
        if current != "in_progress" {
            return Err(MnemoError::InvalidTransition {
                from: current,
                to: "completed".to_string(),
            });
        }

        let interest_id: Option<String> = tx.query_row(
            "SELECT interest_id FROM research_requests WHERE id = ?1",
            params![request_id],
            |row| row.get(0),
        )?;

        for result in results {
            tx.execute(
                "INSERT INTO research_results(id, request_id, query_used, source_url,
                     source_title, snippet, full_content, content_type, relevance_score,
                     created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    time::new_id("res"),
                    request_id,
                    result.query_used,
                    result.source_url,
                    result.source_title,
                    result.snippet,
                    result.full_content,
                    result.content_type,
                    result.relevance_score,
                    ts
                ],
            )?;
        }

        let insight_id =
            insert_insight_row(&tx, Some(request_id), interest_id.as_deref(), insight, &ts)?;

        tx.execute(
            "UPDATE research_requests SET status = 'completed', completed_at = ?1 WHERE id = ?2",
            params![ts, request_id],
        )?;
        tx.commit()?;
        Ok(insight_id)
    })
}

/// Mark an in-progress request failed, recording the error message.
pub fn fail_research(
    store: &Store,
    request_id: &str,
    error_message: &str,
) -> Result<(), MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.fail", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = request_status(&tx, request_id)?;
        if current != "in_progress" {
            return Err(MnemoError::InvalidTransition {
                from: current,
                to: "failed".to_string(),
            });
        }
        tx.execute(
            "UPDATE research_requests
             SET status = 'failed', completed_at = ?1, error_message = ?2
             WHERE id = ?3",
            params![ts, error_message, request_id],
        )?;
        tx.commit()?;
        Ok(())
    })
}

/// Cancel a request that is still `pending` or `in_progress`.
pub fn cancel_research(store: &Store, request_id: &str) -> Result<(), MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.cancel", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = request_status(&tx, request_id)?;
        if current != "pending" && current != "in_progress" {
            return Err(MnemoError::InvalidTransition {
                from: current,
                to: "cancelled".to_string(),
            });
        }
        tx.execute(
            "UPDATE research_requests SET status = 'cancelled', completed_at = ?1 WHERE id = ?2",
            params![ts, request_id],
        )?;
        tx.commit()?;
        Ok(())
    })
}

pub fn get_research_request(store: &Store, id: &str) -> Result<ResearchRequest, MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.get", |conn| {
        db::ensure_schema(conn)?;
        conn.query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM research_requests WHERE id = ?1"),
            params![id],
            request_from_row,
        )
        .optional()
        .map_err(MnemoError::RusqliteError)?
        .ok_or_else(|| MnemoError::NotFound(format!("research request {}", id)))
    })
}

/// Stored results for one request, highest relevance first.
pub fn list_research_results(
    store: &Store,
    request_id: &str,
) -> Result<Vec<FetchedResult>, MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.results", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(
            "SELECT query_used, source_url, source_title, snippet, full_content,
                    content_type, relevance_score
             FROM research_results WHERE request_id = ?1
             ORDER BY relevance_score DESC, created_at",
        )?;
        let rows = stmt.query_map(params![request_id], |row| {
            Ok(FetchedResult {
                query_used: row.get(0)?,
                source_url: row.get(1)?,
                source_title: row.get(2)?,
                snippet: row.get(3)?,
                full_content: row.get(4)?,
                content_type: row.get(5)?,
                relevance_score: row.get(6)?,
            })
        })?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

/// Reap aged rows: expired pending requests (their results cascade),
/// results older than `results_days`, and learning sessions started more
/// than `sessions_days` ago. Days default from the store config; zero
/// means "everything up to now".
pub fn cleanup_research(
    store: &Store,
    results_days: Option<u64>,
    sessions_days: Option<u64>,
) -> Result<CleanupReport, MnemoError> {
    let now_secs = time::now_unix_secs();
    let results_cutoff =
        time::epoch_z_days_ago(results_days.unwrap_or(store.config.results_retention_days));
    let sessions_cutoff =
        time::epoch_z_days_ago(sessions_days.unwrap_or(store.config.sessions_retention_days));
    let results_cutoff_secs = time::parse_epoch_z(&results_cutoff).unwrap_or(0);
    let sessions_cutoff_secs = time::parse_epoch_z(&sessions_cutoff).unwrap_or(0);

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "research.cleanup", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut report = CleanupReport::default();

        // Epoch-Z strings are compared numerically in Rust, not lexically
        // in SQL, so collect ids first.
        let expired_ids: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id, expires_at FROM research_requests WHERE status = 'pending'",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut ids = Vec::new();
            for r in rows {
                let (id, expires_at) = r?;
                if time::parse_epoch_z(&expires_at).is_some_and(|e| e <= now_secs) {
                    ids.push(id);
                }
            }
            ids
        };
        for id in &expired_ids {
            report.expired_results += tx.query_row(
                "SELECT COUNT(*) FROM research_results WHERE request_id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )? as usize;
            tx.execute("DELETE FROM research_requests WHERE id = ?1", params![id])?;
        }
        report.expired_requests = expired_ids.len();

        let old_result_ids: Vec<String> = collect_aged_ids(
            &tx,
            "SELECT id, created_at FROM research_results",
            results_cutoff_secs,
        )?;
        for id in &old_result_ids {
            tx.execute("DELETE FROM research_results WHERE id = ?1", params![id])?;
        }
        report.old_results = old_result_ids.len();

        let old_session_ids: Vec<String> = collect_aged_ids(
            &tx,
            "SELECT id, started_at FROM learning_sessions",
            sessions_cutoff_secs,
        )?;
        for id in &old_session_ids {
            tx.execute("DELETE FROM learning_sessions WHERE id = ?1", params![id])?;
        }
        report.old_sessions = old_session_ids.len();

        tx.commit()?;
        Ok(report)
    })
}

fn collect_aged_ids(
    tx: &Connection,
    sql: &str,
    cutoff_secs: u64,
) -> Result<Vec<String>, MnemoError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut ids = Vec::new();
    for r in rows {
        let (id, ts) = r?;
        if time::parse_epoch_z(&ts).is_some_and(|t| t <= cutoff_secs) {
            ids.push(id);
        }
    }
    Ok(ids)
}

// --- Learning interests ---

pub fn add_interest(
    store: &Store,
    topic: &str,
    opts: &AddInterest,
) -> Result<String, MnemoError> {
    if topic.is_empty() {
        return Err(MnemoError::ValidationError(
            "interest topic must be non-empty".into(),
        ));
    }
    let priority = opts.priority.unwrap_or(5);
    if !(1..=10).contains(&priority) {
        return Err(MnemoError::ValidationError(format!(
            "priority {} out of range 1..=10",
            priority
        )));
    }

    let id = time::new_id("int");
    let ts = time::now_epoch_z();
    let tags_json = serde_json::to_string(opts.tags).expect("tags serialize");

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "interest.add", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO learning_interests(id, topic, why_interested, sparked_by,
                 status, priority, tags, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, 'curious', ?5, ?6, ?7, ?7)",
            params![
                id,
                topic,
                opts.why_interested.unwrap_or_default(),
                opts.sparked_by,
                priority,
                tags_json,
                ts
            ],
        )?;
        Ok(())
    })?;
    Ok(id)
}

const INTEREST_COLUMNS: &str = "id, topic, why_interested, sparked_by, status, priority, \
                                insights_gained, remaining_questions, tags, paused_from, \
                                last_explored_at, created_at, updated_at";

fn interest_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Interest> {
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
        remaining_questions: serde_json::from_str(&questions_json).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        paused_from: row.get(9)?,
        last_explored_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Interests ordered `priority DESC, created_at DESC`. Without a status
/// filter, only the active ladder states (`curious`, `exploring`,
/// `deepening`) are returned.
pub fn list_interests(
    store: &Store,
    status: Option<&str>,
    limit: usize,
) -> Result<Vec<Interest>, MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "interest.list", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INTEREST_COLUMNS} FROM learning_interests
             WHERE (?1 IS NOT NULL AND status = ?1)
                OR (?1 IS NULL AND status IN ('curious', 'exploring', 'deepening'))
             ORDER BY priority DESC, created_at DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![status, limit as i64], interest_from_row)?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

pub fn get_interest(store: &Store, id: &str) -> Result<Interest, MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "interest.get", |conn| {
        db::ensure_schema(conn)?;
        get_interest_tx(conn, id)
    })
}

fn get_interest_tx(conn: &Connection, id: &str) -> Result<Interest, MnemoError> {
    conn.query_row(
        &format!("SELECT {INTEREST_COLUMNS} FROM learning_interests WHERE id = ?1"),
        params![id],
        interest_from_row,
    )
    .optional()
    .map_err(MnemoError::RusqliteError)?
    .ok_or_else(|| MnemoError::NotFound(format!("learning interest {}", id)))
}

fn ladder_successor(status: &str) -> Option<&'static str> {
    match status {
        "curious" => Some("exploring"),
        "exploring" => Some("deepening"),
        "deepening" => Some("integrated"),
        _ => None,
    }
}

/// Move an interest to `new_status`. Legal moves: one step up the ladder,
/// `paused` from any non-terminal ladder state (remembering where from),
/// and resuming a paused interest back to exactly that remembered state.
pub fn update_interest_status(
    store: &Store,
    id: &str,
    new_status: &str,
) -> Result<(), MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "interest.status", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let interest = get_interest_tx(&tx, id)?;

        let invalid = || MnemoError::InvalidTransition {
            from: interest.status.clone(),
            to: new_status.to_string(),
        };

        let paused_from: Option<String> = if new_status == "paused" {
            if interest.status == "paused" || interest.status == "integrated" {
                return Err(invalid());
            }
            Some(interest.status.clone())
        } else if interest.status == "paused" {
            if interest.paused_from.as_deref() != Some(new_status) {
                return Err(invalid());
            }
            None
        } else if ladder_successor(&interest.status) == Some(new_status) {
            None
        } else {
            return Err(invalid());
        };

        tx.execute(
            "UPDATE learning_interests
             SET status = ?1, paused_from = ?2, updated_at = ?3
             WHERE id = ?4",
            params![new_status, paused_from, ts, id],
        )?;
        tx.commit()?;
        Ok(())
    })
}

/// Append insights and open questions onto an interest, stamping
/// `last_explored_at`. First insights bump `curious` to `exploring`;
/// crossing [`DEEPENING_INSIGHT_THRESHOLD`] bumps `exploring` to
/// `deepening`.
pub fn record_interest_insights(
    store: &Store,
    interest_id: &str,
    insights: &[String],
    questions: &[String],
) -> Result<(), MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "interest.record", |conn| {
        db::ensure_schema(conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut interest = get_interest_tx(&tx, interest_id)?;

        interest.insights_gained.extend(insights.iter().cloned());
        interest.remaining_questions.extend(questions.iter().cloned());

        let status = if interest.status == "curious" && !interest.insights_gained.is_empty() {
            "exploring"
        } else if interest.status == "exploring"
            && interest.insights_gained.len() > DEEPENING_INSIGHT_THRESHOLD
        {
            "deepening"
        } else {
            interest.status.as_str()
        };

        tx.execute(
            "UPDATE learning_interests
             SET insights_gained = ?1, remaining_questions = ?2, status = ?3,
                 last_explored_at = ?4, updated_at = ?4
             WHERE id = ?5",
            params![
                serde_json::to_string(&interest.insights_gained).expect("insights serialize"),
                serde_json::to_string(&interest.remaining_questions)
                    .expect("questions serialize"),
                status,
                ts,
                interest_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    })
}

// --- Insights ---

/// Record a standalone insight, outside the complete_research path.
pub fn record_insight(
    store: &Store,
    request_id: Option<&str>,
    interest_id: Option<&str>,
    insight: &Insight,
) -> Result<String, MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "insight.record", |conn| {
        db::ensure_schema(conn)?;
        insert_insight_row(conn, request_id, interest_id, insight, &ts)
    })
}

pub fn recent_insights(store: &Store, limit: usize) -> Result<Vec<InsightRecord>, MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "insight.recent", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, request_id, interest_id, topic, summary, key_insights,
                    new_questions, confidence_level, sources_used, created_at
             FROM learning_insights
             ORDER BY created_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let insights_json: String = row.get(5)?;
            let questions_json: String = row.get(6)?;
            let sources_json: String = row.get(8)?;
            Ok(InsightRecord {
                id: row.get(0)?,
                request_id: row.get(1)?,
                interest_id: row.get(2)?,
                topic: row.get(3)?,
                summary: row.get(4)?,
                key_insights: serde_json::from_str(&insights_json).unwrap_or_default(),
                new_questions: serde_json::from_str(&questions_json).unwrap_or_default(),
                confidence_level: row.get(7)?,
                sources_used: serde_json::from_str(&sources_json).unwrap_or_default(),
                created_at: row.get(9)?,
            })
        })?;
        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

// --- Learning sessions ---

pub fn start_learning_session(
    store: &Store,
    session_type: &str,
) -> Result<String, MnemoError> {
    let id = time::new_id("ls");
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "learning.start", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO learning_sessions(id, session_type, status, started_at)
             VALUES(?1, ?2, 'started', ?3)",
            params![id, session_type, ts],
        )?;
        Ok(())
    })?;
    Ok(id)
}

#[derive(Debug, Clone, Default)]
pub struct SessionOutcome<'a> {
    pub status: &'a str,
    pub topic_chosen: Option<&'a str>,
    pub choice_reason: Option<&'a str>,
    pub insights_count: usize,
    pub new_questions_count: usize,
    pub new_interests_sparked: usize,
    pub error_message: Option<&'a str>,
}

/// Close a learning session, deriving `duration_seconds` from its
/// `started_at`.
pub fn complete_learning_session(
    store: &Store,
    session_id: &str,
    outcome: &SessionOutcome,
) -> Result<(), MnemoError> {
    let ts = time::now_epoch_z();
    let now_secs = time::now_unix_secs();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "learning.complete", |conn| {
        db::ensure_schema(conn)?;
        let started_at: String = conn
            .query_row(
                "SELECT started_at FROM learning_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(MnemoError::RusqliteError)?
            .ok_or_else(|| MnemoError::NotFound(format!("learning session {}", session_id)))?;

        let duration = time::parse_epoch_z(&started_at)
            .map(|start| now_secs.saturating_sub(start) as i64);

        conn.execute(
            "UPDATE learning_sessions
             SET status = ?1, topic_chosen = ?2, choice_reason = ?3, insights_count = ?4,
                 new_questions_count = ?5, new_interests_sparked = ?6, error_message = ?7,
                 duration_seconds = ?8, completed_at = ?9
             WHERE id = ?10",
            params![
                outcome.status,
                outcome.topic_chosen,
                outcome.choice_reason,
                outcome.insights_count as i64,
                outcome.new_questions_count as i64,
                outcome.new_interests_sparked as i64,
                outcome.error_message,
                duration,
                ts,
                session_id
            ],
        )?;
        Ok(())
    })
}

// --- Collaborators and the session loop ---

/// Fetches sources for a claimed research request.
pub trait ResearchFetcher: Send + Sync {
    fn fetch(&self, request: &ResearchRequest) -> anyhow::Result<Vec<FetchedResult>>;
}

/// Output of synthesis: the insight to persist plus any new interests the
/// material sparked.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub insight: Insight,
    /// `(topic, why_interested)` pairs to register as new curious interests.
    pub sparked_interests: Vec<(String, String)>,
}

/// Distills fetched results into an [`Insight`].
pub trait InsightSynthesizer: Send + Sync {
    fn synthesize(
        &self,
        request: &ResearchRequest,
        results: &[FetchedResult],
    ) -> anyhow::Result<Synthesis>;
}

/// Summary of one [`run_learning_session`] invocation.
#[derive(Debug, Clone)]
pub struct LearningOutcome {
    pub session_id: String,
    pub status: String,
    pub request_id: Option<String>,
    pub insights_count: usize,
    pub new_questions_count: usize,
    pub new_interests_sparked: usize,
}

/// Run a collaborator call on a worker thread, bounded by `timeout`. The
/// worker is detached on timeout; its eventual send lands on a dropped
/// channel.
fn call_bounded<T, F>(timeout: Duration, what: &str, f: F) -> Result<T, MnemoError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(MnemoError::Collaborator(e)),
        Err(_) => Err(MnemoError::Collaborator(anyhow::anyhow!(
            "{} timed out after {:?}",
            what,
            timeout
        ))),
    }
}

/// One full learning pass: claim a request (the queue head, or
/// `request_id` when the caller has already chosen one), fetch,
/// synthesize, persist, and feed the interest ledger. Collaborator errors
/// and timeouts fail the claimed request and close the session as
/// `failed`; an empty queue closes it as `skipped`. The session row always
/// reflects how the pass ended, whichever path it took.
pub fn run_learning_session(
    store: &Store,
    fetcher: Arc<dyn ResearchFetcher>,
    synthesizer: Arc<dyn InsightSynthesizer>,
    request_id: Option<&str>,
    timeout: Duration,
) -> Result<LearningOutcome, MnemoError> {
    let session_id = start_learning_session(store, "autonomous")?;

    let claimed = match request_id {
        Some(id) => claim_research(store, id),
        None => dequeue_research(store),
    };
    let request = match claimed {
        Ok(request) => request,
        Err(MnemoError::EmptyQueue) => {
            complete_learning_session(
                store,
                &session_id,
                &SessionOutcome {
                    status: "skipped",
                    choice_reason: Some("no pending research"),
                    ..Default::default()
                },
            )?;
            return Ok(LearningOutcome {
                session_id,
                status: "skipped".to_string(),
                request_id: None,
                insights_count: 0,
                new_questions_count: 0,
                new_interests_sparked: 0,
            });
        }
        Err(e) => {
            let message = e.to_string();
            complete_learning_session(
                store,
                &session_id,
                &SessionOutcome {
                    status: "failed",
                    error_message: Some(&message),
                    ..Default::default()
                },
            )?;
            return Err(e);
        }
    };

    match run_claimed_request(store, &fetcher, &synthesizer, timeout, &request) {
        Ok(synthesis) => {
            let outcome = LearningOutcome {
                session_id: session_id.clone(),
                status: "completed".to_string(),
                request_id: Some(request.id.clone()),
                insights_count: synthesis.insight.key_insights.len(),
                new_questions_count: synthesis.insight.new_questions.len(),
                new_interests_sparked: synthesis.sparked_interests.len(),
            };
            complete_learning_session(
                store,
                &session_id,
                &SessionOutcome {
                    status: "completed",
                    topic_chosen: Some(&request.topic),
                    choice_reason: request.why_researching.as_deref(),
                    insights_count: outcome.insights_count,
                    new_questions_count: outcome.new_questions_count,
                    new_interests_sparked: outcome.new_interests_sparked,
                    error_message: None,
                },
            )?;
            Ok(outcome)
        }
        Err(e) => {
            let message = e.to_string();
            // complete_research may have already landed before the failure
            // (interest bookkeeping runs after it); only fail a request
            // that is genuinely still claimed.
            let current = get_research_request(store, &request.id)?.status;
            if current == "in_progress" {
                fail_research(store, &request.id, &message)?;
            }
            complete_learning_session(
                store,
                &session_id,
                &SessionOutcome {
                    status: "failed",
                    topic_chosen: Some(&request.topic),
                    error_message: Some(&message),
                    ..Default::default()
                },
            )?;
            Ok(LearningOutcome {
                session_id,
                status: "failed".to_string(),
                request_id: Some(request.id.clone()),
                insights_count: 0,
                new_questions_count: 0,
                new_interests_sparked: 0,
            })
        }
    }
}

fn run_claimed_request(
    store: &Store,
    fetcher: &Arc<dyn ResearchFetcher>,
    synthesizer: &Arc<dyn InsightSynthesizer>,
    timeout: Duration,
    request: &ResearchRequest,
) -> Result<Synthesis, MnemoError> {
    let results = {
        let fetcher = Arc::clone(fetcher);
        let request = request.clone();
        call_bounded(timeout, "research fetch", move || fetcher.fetch(&request))?
    };

    let synthesis = {
        let synthesizer = Arc::clone(synthesizer);
        let request = request.clone();
        let results_for_call = results.clone();
        call_bounded(timeout, "insight synthesis", move || {
            synthesizer.synthesize(&request, &results_for_call)
        })?
    };

    complete_research(store, &request.id, &results, &synthesis.insight)?;

    if let Some(interest_id) = request.interest_id.as_deref() {
        record_interest_insights(
            store,
            interest_id,
            &synthesis.insight.key_insights,
            &synthesis.insight.new_questions,
        )?;
    }

    for (topic, why) in &synthesis.sparked_interests {
        add_interest(
            store,
            topic,
            &AddInterest {
                why_interested: Some(why),
                sparked_by: Some(&request.id),
                ..Default::default()
            },
        )?;
    }

    Ok(synthesis)
}
