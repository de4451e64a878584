use mnemo::core::store::Store;
use mnemo::plugins::context::{CONTEXT_IMPORTANCE_FLOOR, build_context};
use mnemo::plugins::memory::{AddMemory, add_memory, deactivate_memory, set_context};
use mnemo::plugins::research::{AddInterest, add_interest, update_interest_status};
use mnemo::plugins::todo::{AddTask, add_task, update_task_status, upsert_project};
use mnemo::plugins::vault::store_secret;
use tempfile::tempdir;

#[test]
fn test_empty_store_yields_empty_report() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let report = build_context(&store, None).unwrap();
    assert!(report.user_context.is_empty());
    assert!(report.important_memories.is_empty());
    assert!(report.open_tasks.is_empty());
    assert!(report.projects.is_empty());
    assert!(report.active_interests.is_empty());
    assert!(report.available_secrets.is_empty());
    assert!(report.generated_at.ends_with('Z'));
}

#[test]
fn test_memories_filtered_by_floor_encryption_and_active() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    add_memory(&store, "important", &AddMemory { importance: 9, ..Default::default() }).unwrap();
    add_memory(
        &store,
        "at the floor",
        &AddMemory { importance: CONTEXT_IMPORTANCE_FLOOR, ..Default::default() },
    )
    .unwrap();
    add_memory(&store, "trivia", &AddMemory { importance: 3, ..Default::default() }).unwrap();
    add_memory(
        &store,
        "classified",
        &AddMemory { importance: 10, encrypt_key: Some("k"), ..Default::default() },
    )
    .unwrap();
    let gone = add_memory(
        &store,
        "retracted",
        &AddMemory { importance: 9, ..Default::default() },
    )
    .unwrap();
    deactivate_memory(&store, &gone).unwrap();

    let report = build_context(&store, None).unwrap();
    let contents: Vec<&str> = report
        .important_memories
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["important", "at the floor"]);
}

#[test]
fn test_tasks_limited_to_open_states() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let pending = add_task(&store, "pending", &AddTask::default()).unwrap();
    let active = add_task(&store, "active", &AddTask { priority: Some(9), ..Default::default() })
        .unwrap();
    update_task_status(&store, &active, "in_progress").unwrap();
    let done = add_task(&store, "done", &AddTask::default()).unwrap();
    update_task_status(&store, &done, "completed").unwrap();
    let blocked = add_task(&store, "blocked", &AddTask::default()).unwrap();
    update_task_status(&store, &blocked, "blocked").unwrap();

    let report = build_context(&store, None).unwrap();
    let ids: Vec<&str> = report.open_tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![active.as_str(), pending.as_str()]);
}

#[test]
fn test_interests_limited_to_curious_and_exploring() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    add_interest(&store, "curious one", &AddInterest::default()).unwrap();
    let exploring = add_interest(&store, "exploring one", &AddInterest::default()).unwrap();
    update_interest_status(&store, &exploring, "exploring").unwrap();
    let deep = add_interest(&store, "deep one", &AddInterest::default()).unwrap();
    update_interest_status(&store, &deep, "exploring").unwrap();
    update_interest_status(&store, &deep, "deepening").unwrap();

    let report = build_context(&store, None).unwrap();
    let topics: Vec<&str> = report
        .active_interests
        .iter()
        .map(|i| i.topic.as_str())
        .collect();
    assert_eq!(topics.len(), 2);
    assert!(topics.contains(&"curious one"));
    assert!(topics.contains(&"exploring one"));
}

#[test]
fn test_secrets_appear_as_metadata_only() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    store_secret(&store, "api_key", "anthropic", "sk-secret", "k", None, &[], None).unwrap();

    let report = build_context(&store, None).unwrap();
    assert_eq!(report.available_secrets.len(), 1);
    assert_eq!(report.available_secrets[0].secret_type, "api_key");
    assert_eq!(report.available_secrets[0].name, "anthropic");

    // Nothing secret-shaped leaks into the serialized report.
    let json = serde_json::to_string(&report).unwrap();
    assert!(!json.contains("sk-secret"));
    assert!(!json.contains("enc:"));
}

#[test]
fn test_full_report_sections_populate() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    set_context(&store, "name", "Ada").unwrap();
    add_memory(&store, "high note", &AddMemory { importance: 8, ..Default::default() }).unwrap();
    add_task(&store, "open task", &AddTask::default()).unwrap();
    upsert_project(&store, "mnemo", "/work/mnemo", &[]).unwrap();
    add_interest(&store, "topic", &AddInterest::default()).unwrap();
    store_secret(&store, "token", "gh", "v", "k", None, &[], None).unwrap();

    let report = build_context(&store, None).unwrap();
    assert_eq!(report.user_context.len(), 1);
    assert_eq!(report.important_memories.len(), 1);
    assert_eq!(report.open_tasks.len(), 1);
    assert_eq!(report.projects.len(), 1);
    assert_eq!(report.active_interests.len(), 1);
    assert_eq!(report.available_secrets.len(), 1);
}

#[test]
fn test_memory_limit_caps_the_memories_section() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    add_memory(&store, "top", &AddMemory { importance: 10, ..Default::default() }).unwrap();
    add_memory(&store, "mid", &AddMemory { importance: 9, ..Default::default() }).unwrap();
    add_memory(&store, "floor", &AddMemory { importance: 8, ..Default::default() }).unwrap();

    let report = build_context(&store, Some(2)).unwrap();
    let contents: Vec<&str> = report
        .important_memories
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["top", "mid"]);
}
