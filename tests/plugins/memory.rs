use mnemo::core::error::MnemoError;
use mnemo::core::store::Store;
use mnemo::plugins::memory::{
    AddMemory, ENCRYPTED_PLACEHOLDER, add_memory, deactivate_memory, decrypt_memory, end_session,
    get_context, get_memory, log_conversation, recent_memories, search_memories, set_context,
    start_session,
};
use rusqlite::Connection;
use tempfile::tempdir;

#[test]
fn test_memory_lifecycle() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    // 1. Add
    let id = add_memory(
        &store,
        "User prefers Rust for systems work",
        &AddMemory {
            memory_type: "preference",
            importance: 8,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(id.starts_with("mem_"));

    // 2. Fetch
    let memory = get_memory(&store, &id).unwrap();
    assert_eq!(memory.memory_type, "preference");
    assert_eq!(memory.importance, 8);
    assert!(memory.active);

    // 3. Deactivate
    deactivate_memory(&store, &id).unwrap();
    let memory = get_memory(&store, &id).unwrap();
    assert!(!memory.active);
    assert!(search_memories(&store, "rust", None, None, 20).unwrap().is_empty());
}

#[test]
fn test_search_substring_and_token_overlap() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    add_memory(&store, "Deploy pipeline uses GitHub Actions", &AddMemory::default()).unwrap();
    add_memory(&store, "Database is SQLite in WAL mode", &AddMemory::default()).unwrap();

    // Case-insensitive substring
    let hits = search_memories(&store, "github actions", None, None, 20).unwrap();
    assert_eq!(hits.len(), 1);

    // Token overlap without a full substring match
    let hits = search_memories(&store, "sqlite tuning", None, None, 20).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].content.contains("SQLite"));

    assert!(search_memories(&store, "kubernetes", None, None, 20).unwrap().is_empty());
}

#[test]
fn test_search_orders_by_importance_then_recency() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let low = add_memory(
        &store,
        "rust note low",
        &AddMemory { importance: 2, ..Default::default() },
    )
    .unwrap();
    let high = add_memory(
        &store,
        "rust note high",
        &AddMemory { importance: 9, ..Default::default() },
    )
    .unwrap();

    let hits = search_memories(&store, "rust", None, None, 20).unwrap();
    assert_eq!(hits[0].id, high);
    assert_eq!(hits[1].id, low);
}

#[test]
fn test_encrypted_memory_is_opaque_to_search() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let id = add_memory(
        &store,
        "the launch codes are 0000",
        &AddMemory {
            importance: 10,
            encrypt_key: Some("master"),
            ..Default::default()
        },
    )
    .unwrap();

    // Placeholder on disk, nothing searchable.
    let memory = get_memory(&store, &id).unwrap();
    assert!(memory.is_encrypted);
    assert_eq!(memory.content, ENCRYPTED_PLACEHOLDER);
    assert!(search_memories(&store, "launch codes", None, None, 20).unwrap().is_empty());

    // Recoverable with the right key only.
    assert_eq!(decrypt_memory(&store, &id, "master").unwrap(), "the launch codes are 0000");
    assert!(matches!(
        decrypt_memory(&store, &id, "wrong"),
        Err(MnemoError::DecryptionFailed)
    ));
}

#[test]
fn test_importance_out_of_range_rejected() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    for importance in [0, 11] {
        assert!(matches!(
            add_memory(&store, "x", &AddMemory { importance, ..Default::default() }),
            Err(MnemoError::ValidationError(_))
        ));
    }
}

#[test]
fn test_recent_memories_filters_by_type() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    add_memory(&store, "a fact", &AddMemory::default()).unwrap();
    add_memory(
        &store,
        "a decision",
        &AddMemory { memory_type: "decision", ..Default::default() },
    )
    .unwrap();

    assert_eq!(recent_memories(&store, 50, None).unwrap().len(), 2);
    let decisions = recent_memories(&store, 50, Some("decision")).unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].content, "a decision");
}

#[test]
fn test_user_context_upsert_and_ordering() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    set_context(&store, "name", "Ada").unwrap();
    set_context(&store, "timezone", "UTC").unwrap();
    set_context(&store, "name", "Ada Lovelace").unwrap();

    let pairs = get_context(&store).unwrap();
    assert_eq!(pairs.len(), 2);
    let name = pairs.iter().find(|p| p.key == "name").unwrap();
    assert_eq!(name.value, "Ada Lovelace");
}

#[test]
fn test_session_lifecycle_and_conversation_cascade() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let row_id = start_session(&store, "sess-1", "/work/repo").unwrap();
    log_conversation(&store, "sess-1", "user", "hello").unwrap();
    log_conversation(&store, "sess-1", "assistant", "hi").unwrap();
    end_session(&store, "sess-1").unwrap();

    // Ending twice is NotFound: the session is no longer active.
    assert!(matches!(
        end_session(&store, "sess-1"),
        Err(MnemoError::NotFound(_))
    ));

    // Deleting the session row cascades to its conversations.
    let conn = Connection::open(store.db_path()).unwrap();
    conn.execute("PRAGMA foreign_keys=ON;", []).unwrap();
    conn.execute("DELETE FROM sessions WHERE id = ?1", [&row_id]).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn test_log_conversation_requires_known_session() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert!(matches!(
        log_conversation(&store, "ghost", "user", "hello"),
        Err(MnemoError::NotFound(_))
    ));
}
