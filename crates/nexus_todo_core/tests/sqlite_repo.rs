use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use nexus_todo_core::db::{open_db, open_db_in_memory};
use nexus_todo_core::{
    BatchWrite, BulkMutation, BulkSelection, ManualClock, NewTodo, OwnerId, Priority, RepoError,
    SqliteTodoRepository, Todo, TodoFilter, TodoRepository, TodoService, TodoStatus,
    DEFAULT_CATEGORY,
};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

fn owner(key: &str) -> OwnerId {
    OwnerId::new(key).unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
    ))
}

fn sample(owner: &OwnerId, content: &str) -> Todo {
    Todo::create(
        owner.clone(),
        NewTodo::new(content),
        DEFAULT_CATEGORY,
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 15).unwrap(),
    )
    .unwrap()
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    let result = SqliteTodoRepository::try_new(&mut conn);
    assert!(matches!(result, Err(RepoError::InvalidData(_))));
}

#[test]
fn insert_and_get_preserve_every_field() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let acct = owner("acct");

    let mut todo = Todo::create(
        acct.clone(),
        NewTodo {
            description: Some("quarterly numbers".to_string()),
            ..NewTodo::new("Pay invoice")
        }
        .priority(Priority::High)
        .category("Finance")
        .tags(["Money", "q4"])
        .assigned_to("sam")
        .due_at(
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            NaiveTime::from_hms_opt(17, 45, 0).unwrap(),
        ),
        DEFAULT_CATEGORY,
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap() + Duration::milliseconds(123),
    )
    .unwrap();
    todo.set_status(
        TodoStatus::Completed,
        Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap(),
    );
    todo.touch(Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap());

    repo.insert(&todo).unwrap();
    let loaded = repo.get(&acct, todo.id).unwrap().unwrap();
    assert_eq!(loaded, todo);
}

#[test]
fn list_is_owner_scoped_and_in_insertion_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let alice = owner("alice");
    let bob = owner("bob");

    let first = sample(&alice, "first");
    let theirs = sample(&bob, "theirs");
    let second = sample(&alice, "second");
    for todo in [&first, &theirs, &second] {
        repo.insert(todo).unwrap();
    }

    let listed: Vec<String> = repo
        .list(&alice)
        .unwrap()
        .into_iter()
        .map(|todo| todo.content)
        .collect();
    assert_eq!(listed, vec!["first", "second"]);
    assert_eq!(repo.get(&alice, theirs.id).unwrap(), None);
}

#[test]
fn deleted_ids_are_never_reused() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let acct = owner("acct");
    let todo = sample(&acct, "once");

    repo.insert(&todo).unwrap();
    assert!(repo.remove(&acct, todo.id).unwrap());
    assert!(!repo.remove(&acct, todo.id).unwrap());

    let err = repo.insert(&todo).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn replace_of_missing_record_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let todo = sample(&owner("acct"), "ghost");

    let err = repo.replace(&todo).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == todo.id));
}

#[test]
fn failed_batch_rolls_back_earlier_writes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let acct = owner("acct");
    let kept = sample(&acct, "kept");
    repo.insert(&kept).unwrap();

    let mut renamed = kept.clone();
    renamed.content = "renamed".to_string();
    let ghost = sample(&acct, "ghost");

    let err = repo
        .apply_batch(
            &acct,
            &[BatchWrite::Replace(renamed), BatchWrite::Replace(ghost)],
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
    assert_eq!(repo.get(&acct, kept.id).unwrap().unwrap().content, "kept");
}

#[test]
fn removing_a_todo_drops_its_tags() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
        let acct = owner("acct");
        let todo = Todo::create(
            acct.clone(),
            NewTodo::new("tagged").tags(["a", "b"]),
            DEFAULT_CATEGORY,
            Utc::now(),
        )
        .unwrap();
        repo.insert(&todo).unwrap();
        repo.remove(&acct, todo.id).unwrap();
    }

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM todo_tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn service_over_sqlite_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.db");
    let acct = owner("acct");

    let (kept_id, deleted_id) = {
        let mut conn = open_db(&path).unwrap();
        let repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
        let mut service = TodoService::with_clock(repo, clock());
        let kept = service
            .create(&acct, NewTodo::new("kept").priority(Priority::Urgent))
            .unwrap();
        let deleted = service.create(&acct, NewTodo::new("deleted")).unwrap();
        let outcome = service
            .bulk(
                &acct,
                &BulkSelection::Ids(vec![deleted.id, Uuid::new_v4()]),
                &BulkMutation::Delete,
            )
            .unwrap();
        assert_eq!(outcome.affected_count, 1);
        (kept.id, deleted.id)
    };

    let mut conn = open_db(&path).unwrap();
    let repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let service = TodoService::with_clock(repo, clock());

    let listed = service.query(&acct, &TodoFilter::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept_id);
    assert_eq!(listed[0].priority, Priority::Urgent);
    assert_eq!(service.get_by_id(&acct, deleted_id).unwrap(), None);
    assert_eq!(service.stats(&acct).unwrap().urgent_pending, 1);
}

#[test]
fn planned_bulk_locks_out_other_writers_until_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.db");
    let acct = owner("acct");

    let mut conn = open_db(&path).unwrap();
    let mut repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let first = sample(&acct, "first");
    let second = sample(&acct, "second");
    repo.insert(&first).unwrap();
    repo.insert(&second).unwrap();

    let other = open_db(&path).unwrap();
    other.busy_timeout(StdDuration::ZERO).unwrap();
    let mut competing_delete = None;

    let committed = repo
        .apply_planned(&acct, &mut |snapshot| {
            competing_delete = Some(other.execute(
                "DELETE FROM todos WHERE id = ?1;",
                [second.id.to_string()],
            ));
            Ok(snapshot
                .into_iter()
                .map(|mut todo| {
                    todo.set_status(TodoStatus::Completed, todo.updated_at);
                    BatchWrite::Replace(todo)
                })
                .collect())
        })
        .unwrap();

    assert!(matches!(competing_delete, Some(Err(_))));
    assert_eq!(committed.len(), 2);
    let statuses: Vec<TodoStatus> = repo
        .list(&acct)
        .unwrap()
        .into_iter()
        .map(|todo| todo.status)
        .collect();
    assert_eq!(statuses, vec![TodoStatus::Completed, TodoStatus::Completed]);
}

#[test]
fn bulk_reports_rows_removed_by_another_connection_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.db");
    let acct = owner("acct");

    let mut conn = open_db(&path).unwrap();
    let repo = SqliteTodoRepository::try_new(&mut conn).unwrap();
    let mut service = TodoService::with_clock(repo, clock());
    let kept = service.create(&acct, NewTodo::new("kept")).unwrap();
    let gone = service.create(&acct, NewTodo::new("gone")).unwrap();

    let other = open_db(&path).unwrap();
    other
        .execute("DELETE FROM todos WHERE id = ?1;", [gone.id.to_string()])
        .unwrap();

    let outcome = service
        .bulk(
            &acct,
            &BulkSelection::Ids(vec![kept.id, gone.id]),
            &BulkMutation::Complete,
        )
        .unwrap();
    assert_eq!(outcome.affected_count, 1);
    assert_eq!(outcome.missing_ids, vec![gone.id]);

    let outcome = service
        .bulk(
            &acct,
            &BulkSelection::Filter(TodoFilter::default()),
            &BulkMutation::Prioritize {
                priority: Priority::High,
            },
        )
        .unwrap();
    assert_eq!(outcome.matched, 1);
    let stored = service.get_by_id(&acct, kept.id).unwrap().unwrap();
    assert_eq!(stored.status, TodoStatus::Completed);
    assert_eq!(stored.priority, Priority::High);
}
