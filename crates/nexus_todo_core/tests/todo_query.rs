use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use nexus_todo_core::{
    InMemoryTodoRepository, ManualClock, NewTodo, OwnerId, Priority, TodoFilter, TodoService,
    TodoStatus,
};

type Service = TodoService<InMemoryTodoRepository, ManualClock>;

fn service() -> Service {
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
    TodoService::with_clock(InMemoryTodoRepository::new(), ManualClock::new(now))
}

fn owner() -> OwnerId {
    OwnerId::new("acct").unwrap()
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap() + Duration::days(offset)
}

fn contents(service: &Service, filter: &TodoFilter) -> Vec<String> {
    service
        .query(&owner(), filter)
        .unwrap()
        .into_iter()
        .map(|todo| todo.content)
        .collect()
}

#[test]
fn empty_filter_lists_everything_in_listing_order() {
    let mut service = service();
    let acct = owner();
    service.create(&acct, NewTodo::new("undated")).unwrap();
    service
        .create(&acct, NewTodo::new("next week").due(day(7)))
        .unwrap();
    service
        .create(&acct, NewTodo::new("tomorrow low").due(day(1)).priority(Priority::Low))
        .unwrap();
    service
        .create(&acct, NewTodo::new("tomorrow urgent").due(day(1)).priority(Priority::Urgent))
        .unwrap();

    assert_eq!(
        contents(&service, &TodoFilter::default()),
        vec!["tomorrow urgent", "tomorrow low", "next week", "undated"]
    );
}

#[test]
fn equal_keys_keep_insertion_order() {
    let mut service = service();
    let acct = owner();
    for name in ["first", "second", "third"] {
        service.create(&acct, NewTodo::new(name)).unwrap();
    }
    assert_eq!(
        contents(&service, &TodoFilter::default()),
        vec!["first", "second", "third"]
    );
}

#[test]
fn criteria_are_combined_with_and() {
    let mut service = service();
    let acct = owner();
    service
        .create(&acct, NewTodo::new("Pay invoice").priority(Priority::High).category("Finance"))
        .unwrap();
    service
        .create(&acct, NewTodo::new("Pay rent").priority(Priority::Low).category("finance"))
        .unwrap();
    service
        .create(&acct, NewTodo::new("Plan trip").priority(Priority::High).category("Travel"))
        .unwrap();

    let filter = TodoFilter {
        priority: Some(Priority::High),
        category: Some("FINANCE".to_string()),
        ..TodoFilter::default()
    };
    assert_eq!(contents(&service, &filter), vec!["Pay invoice"]);

    let by_category = TodoFilter {
        category: Some("finance".to_string()),
        ..TodoFilter::default()
    };
    assert_eq!(contents(&service, &by_category).len(), 2);
}

#[test]
fn search_matches_content_description_and_tags_case_insensitively() {
    let mut service = service();
    let acct = owner();
    service.create(&acct, NewTodo::new("Email the BOARD")).unwrap();
    service
        .create(
            &acct,
            NewTodo {
                description: Some("prepare board deck".to_string()),
                ..NewTodo::new("slides")
            },
        )
        .unwrap();
    service
        .create(&acct, NewTodo::new("dinner").tags(["Board-Games"]))
        .unwrap();
    service.create(&acct, NewTodo::new("unrelated")).unwrap();

    assert_eq!(
        contents(&service, &TodoFilter::with_search("board")),
        vec!["Email the BOARD", "slides", "dinner"]
    );
}

#[test]
fn overdue_and_due_today_use_the_injected_clock() {
    let mut service = service();
    let acct = owner();
    service
        .create(&acct, NewTodo::new("yesterday").due(day(-1)))
        .unwrap();
    service
        .create(&acct, NewTodo::new("today date only").due(day(0)))
        .unwrap();
    service
        .create(
            &acct,
            NewTodo::new("today morning").due_at(day(0), NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
        )
        .unwrap();
    service
        .create(
            &acct,
            NewTodo::new("old but done")
                .due(day(-3))
                .status(TodoStatus::Completed),
        )
        .unwrap();

    let overdue = TodoFilter {
        overdue: true,
        ..TodoFilter::default()
    };
    assert_eq!(contents(&service, &overdue), vec!["yesterday", "today morning"]);

    let due_today = TodoFilter {
        due_today: true,
        ..TodoFilter::default()
    };
    assert_eq!(
        contents(&service, &due_today),
        vec!["today date only", "today morning"]
    );
}

#[test]
fn clock_jump_past_midnight_moves_todos_into_overdue() {
    let mut service = service();
    let acct = owner();
    service
        .create(&acct, NewTodo::new("due today").due(day(0)))
        .unwrap();
    let overdue = TodoFilter {
        overdue: true,
        ..TodoFilter::default()
    };
    assert!(contents(&service, &overdue).is_empty());

    service
        .clock()
        .set(Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 1).unwrap());
    assert_eq!(contents(&service, &overdue), vec!["due today"]);
}

#[test]
fn status_and_assignee_filters() {
    let mut service = service();
    let acct = owner();
    let started = service
        .create(&acct, NewTodo::new("started").assigned_to("kim"))
        .unwrap();
    service
        .set_status(&acct, started.id, TodoStatus::InProgress)
        .unwrap();
    service
        .create(&acct, NewTodo::new("waiting").assigned_to("lee"))
        .unwrap();

    assert_eq!(
        contents(&service, &TodoFilter::with_status(TodoStatus::InProgress)),
        vec!["started"]
    );
    let for_lee = TodoFilter {
        assigned_to: Some("lee".to_string()),
        ..TodoFilter::default()
    };
    assert_eq!(contents(&service, &for_lee), vec!["waiting"]);
}

#[test]
fn limit_and_offset_page_over_the_ordered_result() {
    let mut service = service();
    let acct = owner();
    for offset in 1..=5 {
        service
            .create(&acct, NewTodo::new(format!("day {offset}")).due(day(offset)))
            .unwrap();
    }

    let page = TodoFilter {
        limit: Some(2),
        offset: 1,
        ..TodoFilter::default()
    };
    assert_eq!(contents(&service, &page), vec!["day 2", "day 3"]);

    let past_end = TodoFilter {
        offset: 10,
        ..TodoFilter::default()
    };
    assert!(contents(&service, &past_end).is_empty());
}

#[test]
fn no_match_is_an_empty_list_not_an_error() {
    let mut service = service();
    service.create(&owner(), NewTodo::new("only")).unwrap();
    let filter = TodoFilter::with_priority(Priority::Urgent);
    assert!(service.query(&owner(), &filter).unwrap().is_empty());
}

#[test]
fn filter_deserializes_from_camel_case_json() {
    let filter: TodoFilter = serde_json::from_str(
        r#"{ "status": "in_progress", "dueToday": true, "includeArchived": true, "limit": 5 }"#,
    )
    .unwrap();
    assert_eq!(filter.status, Some(TodoStatus::InProgress));
    assert!(filter.due_today);
    assert!(filter.include_archived);
    assert_eq!(filter.limit, Some(5));
    assert_eq!(filter.offset, 0);
}
