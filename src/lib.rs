//! Mnemo: a persistent knowledge store for AI agents.
//!
//! **Mnemo is a local-first memory plane for agentic sessions.** Agents are
//! stateless between invocations; Mnemo gives them durable memory, a secret
//! vault, a task ledger, and a bounded autonomous research pipeline, all
//! backed by a single SQLite database.
//!
//! # Core Principles
//!
//! - **Local-first**: All state lives in one `memory.db` under the store
//!   root, versioned by a schema ladder and auditable via the broker log
//! - **Single snapshot**: The context report is computed inside one read
//!   transaction so an agent never sees a torn view
//! - **Bounded autonomy**: The research queue has a hard capacity and
//!   every collaborator call has a wall-clock timeout
//! - **Keys stay outside**: Encryption keys are supplied per call and are
//!   never persisted
//!
//! # The Thin Waist
//!
//! All state access routes through [`core::broker::DbBroker`] for:
//! - Serialization (in-process lock)
//! - Audit logging (`broker.events.jsonl`)
//!
//! Cross-process atomicity (queue capacity checks, dequeue claims) is
//! layered on top with IMMEDIATE transactions.
//!
//! # Subsystems (Plugins)
//!
//! - [`plugins::memory`]: Durable facts, user context, and agent sessions
//! - [`plugins::vault`]: Encrypted secrets and preferences
//! - [`plugins::todo`]: Tasks and projects
//! - [`plugins::research`]: The research queue and learning ledger
//! - [`plugins::context`]: The aggregated session-start report

pub mod core;
pub mod plugins;

pub use crate::core::error::MnemoError;
pub use crate::core::store::Store;
