use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MnemoError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Research queue full: {pending} pending requests at capacity {capacity}")]
    QueueFull { pending: usize, capacity: usize },
    #[error("Research queue empty: no pending requests")]
    EmptyQueue,
    #[error("Decryption failed: wrong key or corrupted ciphertext")]
    DecryptionFailed,
    #[error("Invalid status transition: '{from}' -> '{to}'")]
    InvalidTransition { from: String, to: String },
    // anyhow::Error has no std::error::Error impl, so no #[from]/#[source] here.
    #[error("Collaborator failure: {0}")]
    Collaborator(anyhow::Error),
}
