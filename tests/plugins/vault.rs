use mnemo::core::error::MnemoError;
use mnemo::core::store::Store;
use mnemo::plugins::vault::{
    deactivate_secret, get_preference, get_secret, list_secrets, set_preference, store_secret,
};
use tempfile::tempdir;

#[test]
fn test_secret_roundtrip() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let id = store_secret(
        &store,
        "api_key",
        "anthropic",
        "sk-test-12345",
        "master",
        Some("primary key"),
        &["llm".to_string()],
        None,
    )
    .unwrap();
    assert!(id.starts_with("sec_"));

    let plaintext = get_secret(&store, "api_key", "anthropic", "master").unwrap();
    assert_eq!(plaintext, "sk-test-12345");
}

#[test]
fn test_wrong_key_is_decryption_failure() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    store_secret(&store, "api_key", "openai", "sk-abc", "right", None, &[], None).unwrap();
    let err = get_secret(&store, "api_key", "openai", "wrong").unwrap_err();
    assert!(matches!(err, MnemoError::DecryptionFailed));
}

#[test]
fn test_upsert_keeps_one_row_and_original_id() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let first = store_secret(&store, "token", "github", "v1", "k", Some("ci token"), &[], None).unwrap();
    let second = store_secret(&store, "token", "github", "v2", "k", None, &[], None).unwrap();
    assert_eq!(first, second);

    // New ciphertext wins; empty description keeps the old one.
    assert_eq!(get_secret(&store, "token", "github", "k").unwrap(), "v2");
    let listed = list_secrets(&store, Some("token")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "ci token");
}

#[test]
fn test_deactivate_hides_and_restore_revives() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    store_secret(&store, "api_key", "old", "payload", "k", None, &[], None).unwrap();
    deactivate_secret(&store, "api_key", "old").unwrap();

    assert!(matches!(
        get_secret(&store, "api_key", "old", "k"),
        Err(MnemoError::NotFound(_))
    ));
    assert!(list_secrets(&store, None).unwrap().is_empty());

    // Re-storing under the same natural key revives the row.
    store_secret(&store, "api_key", "old", "fresh", "k", None, &[], None).unwrap();
    assert_eq!(get_secret(&store, "api_key", "old", "k").unwrap(), "fresh");
}

#[test]
fn test_deactivate_missing_secret_is_not_found() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert!(matches!(
        deactivate_secret(&store, "api_key", "ghost"),
        Err(MnemoError::NotFound(_))
    ));
}

#[test]
fn test_list_secrets_is_metadata_only_and_ordered() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    store_secret(&store, "token", "zulip", "z", "k", None, &[], None).unwrap();
    store_secret(&store, "api_key", "brave", "b", "k", None, &[], None).unwrap();
    store_secret(&store, "api_key", "anthropic", "a", "k", None, &[], None).unwrap();

    let listed = list_secrets(&store, None).unwrap();
    let pairs: Vec<(String, String)> = listed
        .iter()
        .map(|s| (s.secret_type.clone(), s.name.clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("api_key".to_string(), "anthropic".to_string()),
            ("api_key".to_string(), "brave".to_string()),
            ("token".to_string(), "zulip".to_string()),
        ]
    );
}

#[test]
fn test_empty_type_or_name_rejected() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert!(matches!(
        store_secret(&store, "", "name", "v", "k", None, &[], None),
        Err(MnemoError::ValidationError(_))
    ));
    assert!(matches!(
        store_secret(&store, "api_key", "", "v", "k", None, &[], None),
        Err(MnemoError::ValidationError(_))
    ));
}

#[test]
fn test_preference_upsert_roundtrip() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    set_preference(&store, "editor", "theme", "gruvbox", "k").unwrap();
    set_preference(&store, "editor", "theme", "nord", "k").unwrap();
    assert_eq!(get_preference(&store, "editor", "theme", "k").unwrap(), "nord");

    assert!(matches!(
        get_preference(&store, "editor", "font", "k"),
        Err(MnemoError::NotFound(_))
    ));
}

#[test]
fn test_expires_at_stored_and_refreshed_on_upsert() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    store_secret(&store, "token", "gh", "v1", "k", None, &[], Some("2000000000Z")).unwrap();
    let listed = list_secrets(&store, Some("token")).unwrap();
    assert_eq!(listed[0].expires_at.as_deref(), Some("2000000000Z"));

    // The upsert replaces the expiry along with the payload.
    store_secret(&store, "token", "gh", "v2", "k", None, &[], Some("2100000000Z")).unwrap();
    let listed = list_secrets(&store, Some("token")).unwrap();
    assert_eq!(listed[0].expires_at.as_deref(), Some("2100000000Z"));

    store_secret(&store, "token", "gh", "v3", "k", None, &[], None).unwrap();
    let listed = list_secrets(&store, Some("token")).unwrap();
    assert_eq!(listed[0].expires_at, None);
}
