use mnemo::core::error::MnemoError;
use mnemo::core::store::Store;
use mnemo::plugins::memory::{AddMemory, add_memory, get_memory};
use mnemo::plugins::todo::{
    AddTask, add_task, delete_project, get_task, list_projects, list_tasks, touch_project,
    update_task_status, upsert_project,
};
use tempfile::tempdir;

#[test]
fn test_task_lifecycle() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    // 1. Add
    let id = add_task(
        &store,
        "Ship release",
        &AddTask { description: Some("cut 0.4.1"), priority: Some(8), ..Default::default() },
    )
    .unwrap();
    assert!(id.starts_with("task_"));

    let task = get_task(&store, &id).unwrap();
    assert_eq!(task.status, "pending");
    assert_eq!(task.priority, 8);
    assert!(task.completed_at.is_none());

    // 2. Complete stamps completed_at
    update_task_status(&store, &id, "completed").unwrap();
    let task = get_task(&store, &id).unwrap();
    assert_eq!(task.status, "completed");
    assert!(task.completed_at.is_some());

    // 3. Reopening clears the stamp
    update_task_status(&store, &id, "in_progress").unwrap();
    let task = get_task(&store, &id).unwrap();
    assert_eq!(task.status, "in_progress");
    assert!(task.completed_at.is_none());
}

#[test]
fn test_unknown_status_rejected() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    let id = add_task(&store, "t", &AddTask::default()).unwrap();
    assert!(matches!(
        update_task_status(&store, &id, "done"),
        Err(MnemoError::ValidationError(_))
    ));
}

#[test]
fn test_update_missing_task_is_not_found() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert!(matches!(
        update_task_status(&store, "task_missing", "completed"),
        Err(MnemoError::NotFound(_))
    ));
}

#[test]
fn test_list_tasks_orders_by_priority_and_filters() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let low = add_task(&store, "low", &AddTask { priority: Some(2), ..Default::default() }).unwrap();
    let high = add_task(&store, "high", &AddTask { priority: Some(9), ..Default::default() }).unwrap();
    update_task_status(&store, &low, "blocked").unwrap();

    let all = list_tasks(&store, None).unwrap();
    assert_eq!(all[0].id, high);
    assert_eq!(all[1].id, low);

    let blocked = list_tasks(&store, Some("blocked")).unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].id, low);
}

#[test]
fn test_subtask_references_parent() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let parent = add_task(&store, "parent", &AddTask::default()).unwrap();
    let child = add_task(
        &store,
        "child",
        &AddTask { parent_task_id: Some(&parent), ..Default::default() },
    )
    .unwrap();
    assert_eq!(get_task(&store, &child).unwrap().parent_task_id, Some(parent));
}

#[test]
fn test_project_upsert_refreshes_in_place() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let first = upsert_project(&store, "mnemo", "/work/mnemo", &["rust".to_string()]).unwrap();
    let second = upsert_project(
        &store,
        "mnemo-core",
        "/work/mnemo",
        &["rust".to_string(), "sqlite".to_string()],
    )
    .unwrap();
    assert_eq!(first, second);

    let projects = list_projects(&store).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "mnemo-core");
    assert_eq!(projects[0].tech_stack.len(), 2);

    touch_project(&store, &first).unwrap();
}

#[test]
fn test_delete_project_nulls_soft_references() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();

    let project = upsert_project(&store, "legacy", "/work/legacy", &[]).unwrap();
    let task = add_task(
        &store,
        "port it",
        &AddTask { project_id: Some(&project), ..Default::default() },
    )
    .unwrap();
    let memory = add_memory(
        &store,
        "legacy uses make",
        &AddMemory { project_id: Some(&project), ..Default::default() },
    )
    .unwrap();

    delete_project(&store, &project).unwrap();

    // Rows survive with the reference nulled.
    assert_eq!(get_task(&store, &task).unwrap().project_id, None);
    assert_eq!(get_memory(&store, &memory).unwrap().project_id, None);
    assert!(list_projects(&store).unwrap().is_empty());
}

#[test]
fn test_delete_missing_project_is_not_found() {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path()).unwrap();
    assert!(matches!(
        delete_project(&store, "proj_missing"),
        Err(MnemoError::NotFound(_))
    ));
}
