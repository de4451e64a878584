//! Secret vault: named credentials and encrypted preference pairs.
//!
//! Every payload is stored only as AES-256-GCM ciphertext under a
//! caller-supplied key (see `core::crypto`); the key itself never touches
//! the database. Writes are upserts on the natural key — `(secret_type,
//! name)` for secrets, `(category, key)` for preferences — so re-storing
//! overwrites in place and the row count for a pair stays at one.

use crate::core::broker::DbBroker;
use crate::core::crypto;
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// Secret metadata as exposed by `list_secrets`: never the plaintext,
/// never the ciphertext.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecretMeta {
    pub id: String,
    pub secret_type: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Store (or overwrite) a secret. Upsert keyed on `(secret_type, name)`:
/// the ciphertext is always replaced, the description is merged (a
/// non-empty new value wins, otherwise the existing one is kept), and a
/// previously deactivated row is revived. `expires_at` is advisory
/// metadata surfaced by `list_secrets`; retrieval does not enforce it.
pub fn store_secret(
    store: &Store,
    secret_type: &str,
    name: &str,
    plaintext: &str,
    key: &str,
    description: Option<&str>,
    tags: &[String],
    expires_at: Option<&str>,
) -> Result<String, error::MnemoError> {
    if secret_type.is_empty() || name.is_empty() {
        return Err(error::MnemoError::ValidationError(
            "secret type and name must be non-empty".into(),
        ));
    }
    let encrypted_value = crypto::encrypt(plaintext, key)?;
    let ts = time::now_epoch_z();
    let id = time::new_id("sec");
    let tags_json = serde_json::to_string(tags).expect("tags serialize");

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "vault.store", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO secrets(id, secret_type, name, encrypted_value, description, tags, active, expires_at, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)
             ON CONFLICT(secret_type, name) DO UPDATE SET
                 encrypted_value = excluded.encrypted_value,
                 description = CASE WHEN excluded.description != ''
                                    THEN excluded.description
                                    ELSE secrets.description END,
                 tags = excluded.tags,
                 active = 1,
                 expires_at = excluded.expires_at,
                 updated_at = excluded.updated_at",
            params![
                id,
                secret_type,
                name,
                encrypted_value,
                description.unwrap_or_default(),
                tags_json,
                expires_at,
                ts
            ],
        )?;
        // The conflict arm keeps the original row id.
        let stored_id: String = conn.query_row(
            "SELECT id FROM secrets WHERE secret_type = ?1 AND name = ?2",
            params![secret_type, name],
            |row| row.get(0),
        )?;
        Ok(stored_id)
    })
}

/// Retrieve and decrypt an active secret. `NotFound` when no active row
/// matches; `DecryptionFailed` when the key is wrong.
pub fn get_secret(
    store: &Store,
    secret_type: &str,
    name: &str,
    key: &str,
) -> Result<String, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    let encrypted: String =
        broker.with_conn(&store.db_path(), "mnemo", None, "vault.get", |conn| {
            db::ensure_schema(conn)?;
            conn.query_row(
                "SELECT encrypted_value FROM secrets
                 WHERE secret_type = ?1 AND name = ?2 AND active = 1",
                params![secret_type, name],
                |row| row.get(0),
            )
            .optional()
            .map_err(error::MnemoError::RusqliteError)?
            .ok_or_else(|| {
                error::MnemoError::NotFound(format!("secret {}/{}", secret_type, name))
            })
        })?;

    crypto::decrypt(&encrypted, key)
}

/// List active secret metadata, optionally filtered by type, ordered by
/// `(secret_type, name)`.
pub fn list_secrets(
    store: &Store,
    secret_type: Option<&str>,
) -> Result<Vec<SecretMeta>, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "vault.list", |conn| {
        db::ensure_schema(conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, secret_type, name, description, tags, expires_at, created_at, updated_at
             FROM secrets
             WHERE active = 1 AND (?1 IS NULL OR secret_type = ?1)
             ORDER BY secret_type, name",
        )?;
        let rows = stmt.query_map(params![secret_type], |row| {
            let tags_json: String = row.get(4)?;
            Ok(SecretMeta {
                id: row.get(0)?,
                secret_type: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                expires_at: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?;

        let mut results = Vec::new();
        for r in rows {
            results.push(r?);
        }
        Ok(results)
    })
}

/// Soft-delete a secret: the row survives for audit, but it disappears
/// from `list_secrets` and `get_secret`.
pub fn deactivate_secret(
    store: &Store,
    secret_type: &str,
    name: &str,
) -> Result<(), error::MnemoError> {
    let ts = time::now_epoch_z();
    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "vault.deactivate", |conn| {
        db::ensure_schema(conn)?;
        let changed = conn.execute(
            "UPDATE secrets SET active = 0, updated_at = ?1
             WHERE secret_type = ?2 AND name = ?3 AND active = 1",
            params![ts, secret_type, name],
        )?;
        if changed == 0 {
            return Err(error::MnemoError::NotFound(format!(
                "secret {}/{}",
                secret_type, name
            )));
        }
        Ok(())
    })
}

/// Upsert an encrypted preference pair keyed on `(category, key)`.
pub fn set_preference(
    store: &Store,
    category: &str,
    pref_key: &str,
    plaintext: &str,
    enc_key: &str,
) -> Result<String, error::MnemoError> {
    let encrypted_value = crypto::encrypt(plaintext, enc_key)?;
    let ts = time::now_epoch_z();
    let id = time::new_id("pref");

    let broker = DbBroker::new(&store.root);
    broker.with_conn(&store.db_path(), "mnemo", None, "vault.pref.set", |conn| {
        db::ensure_schema(conn)?;
        conn.execute(
            "INSERT INTO preferences(id, category, key, encrypted_value, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(category, key) DO UPDATE SET
                 encrypted_value = excluded.encrypted_value,
                 updated_at = excluded.updated_at",
            params![id, category, pref_key, encrypted_value, ts],
        )?;
        let stored_id: String = conn.query_row(
            "SELECT id FROM preferences WHERE category = ?1 AND key = ?2",
            params![category, pref_key],
            |row| row.get(0),
        )?;
        Ok(stored_id)
    })
}

pub fn get_preference(
    store: &Store,
    category: &str,
    pref_key: &str,
    enc_key: &str,
) -> Result<String, error::MnemoError> {
    let broker = DbBroker::new(&store.root);
    let encrypted: String =
        broker.with_conn(&store.db_path(), "mnemo", None, "vault.pref.get", |conn| {
            db::ensure_schema(conn)?;
            conn.query_row(
                "SELECT encrypted_value FROM preferences WHERE category = ?1 AND key = ?2",
                params![category, pref_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(error::MnemoError::RusqliteError)?
            .ok_or_else(|| {
                error::MnemoError::NotFound(format!("preference {}/{}", category, pref_key))
            })
        })?;

    crypto::decrypt(&encrypted, enc_key)
}
