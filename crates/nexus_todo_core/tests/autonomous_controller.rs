use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use nexus_todo_core::{
    ActionData, ActionResponse, AgentAction, AutonomousController, BatchWrite, Escalation,
    EscalationConfig, EscalationPolicy, EscalationReason, InMemoryTodoRepository,
    KeywordEscalationPolicy, ManualClock, NewTodo, OwnerId, Priority, RepoError, RepoResult, Todo,
    TodoFilter, TodoId, TodoRepository, TodoService, TodoSource, DEFAULT_CATEGORY,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

type Controller = AutonomousController<InMemoryTodoRepository, Arc<ManualClock>>;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn controller() -> Controller {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
    ));
    AutonomousController::new(TodoService::with_clock(InMemoryTodoRepository::new(), clock))
}

fn owner(key: &str) -> OwnerId {
    OwnerId::new(key).unwrap()
}

fn action(value: serde_json::Value) -> AgentAction {
    serde_json::from_value(value).unwrap()
}

fn created_todo(response: ActionResponse) -> Todo {
    match response.data {
        Some(ActionData::Todo(todo)) => todo,
        other => panic!("expected todo payload, got {other:?}"),
    }
}

#[test]
fn create_action_parses_wire_json_and_returns_the_record() {
    let mut controller = controller();
    let response = controller.handle(
        &owner("acct"),
        action(json!({
            "action": "create",
            "todo": { "content": "Call supplier", "priority": "high", "tags": ["Ops"] }
        })),
    );

    assert!(response.ok);
    assert_eq!(response.error_code, None);
    assert!(response.message.contains("Call supplier"));
    let todo = created_todo(response);
    assert_eq!(todo.priority, Priority::High);
    assert!(todo.tags.contains("ops"));
}

#[test]
fn failures_are_encoded_in_the_envelope() {
    let mut controller = controller();
    let acct = owner("acct");

    let blank = controller.handle(&acct, action(json!({ "action": "create", "todo": { "content": "" } })));
    assert!(!blank.ok);
    assert_eq!(blank.error_code.as_deref(), Some("validation_error"));
    assert!(blank.data.is_none());

    let missing = controller.handle(&acct, AgentAction::Get { id: Uuid::new_v4() });
    assert_eq!(missing.error_code.as_deref(), Some("not_found"));

    let serialized = serde_json::to_value(&missing).unwrap();
    assert_eq!(serialized["ok"], false);
    assert_eq!(serialized["errorCode"], "not_found");
    assert!(serialized.get("data").is_none());
}

#[test]
fn unknown_bulk_kind_is_bad_request() {
    let mut controller = controller();
    let response = controller.handle(
        &owner("acct"),
        action(json!({
            "action": "bulk",
            "kind": "explode",
            "selection": { "filter": {} }
        })),
    );
    assert!(!response.ok);
    assert_eq!(response.error_code.as_deref(), Some("bad_request"));
}

#[test]
fn bulk_action_reports_counts() {
    let mut controller = controller();
    let acct = owner("acct");
    let todo = created_todo(controller.handle(
        &acct,
        AgentAction::Create {
            todo: NewTodo::new("A"),
        },
    ));
    let unknown = Uuid::new_v4();

    let response = controller.handle(
        &acct,
        action(json!({
            "action": "bulk",
            "kind": "delete",
            "selection": { "ids": [todo.id, unknown] }
        })),
    );
    assert!(response.ok);
    match response.data {
        Some(ActionData::Bulk(outcome)) => {
            assert_eq!(outcome.affected_count, 1);
            assert_eq!(outcome.missing_ids, vec![unknown]);
        }
        other => panic!("expected bulk payload, got {other:?}"),
    }
}

#[test]
fn delete_of_missing_todo_is_not_an_error() {
    let mut controller = controller();
    let id = Uuid::new_v4();
    let response = controller.handle(&owner("acct"), AgentAction::Delete { id });
    assert!(response.ok);
    assert_eq!(
        response.data,
        Some(ActionData::Deleted { id, removed: false })
    );
}

#[test]
fn owners_cannot_see_each_others_todos() {
    let mut controller = controller();
    let alice = owner("alice");
    let bob = owner("bob");
    let todo = created_todo(controller.handle(
        &alice,
        AgentAction::Create {
            todo: NewTodo::new("secret"),
        },
    ));

    let response = controller.handle(&bob, AgentAction::Complete { id: todo.id });
    assert_eq!(response.error_code.as_deref(), Some("not_found"));

    let listing = controller.handle(&bob, AgentAction::Query { filter: TodoFilter::default() });
    assert_eq!(listing.data, Some(ActionData::Todos(Vec::new())));
}

#[test]
fn optimize_escalates_overdue_todo_to_urgent() {
    let mut controller = controller();
    let acct = owner("acct");
    let service = controller.service_mut();
    let invoice = service
        .create(
            &acct,
            NewTodo::new("Pay invoice").due(today() - Duration::days(1)),
        )
        .unwrap();
    service
        .create(&acct, NewTodo::new("Read book").priority(Priority::Low))
        .unwrap();

    let report = controller.optimize_priorities(&acct).unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].id, invoice.id);
    assert_eq!(report.changes[0].from, Priority::Medium);
    assert_eq!(report.changes[0].to, Priority::Urgent);
    assert_eq!(report.changes[0].reason, EscalationReason::Overdue);
    assert!(report.changelog[0].contains("overdue"));
    assert!(report.failures.is_empty());

    let stored = controller
        .service()
        .get_by_id(&acct, invoice.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.priority, Priority::Urgent);

    let again = controller.optimize_priorities(&acct).unwrap();
    assert!(again.changes.is_empty());
}

#[test]
fn optimize_uses_keyword_and_due_today_rules() {
    let mut controller = controller();
    let acct = owner("acct");
    let service = controller.service_mut();
    service
        .create(&acct, NewTodo::new("Server down, fix ASAP"))
        .unwrap();
    service
        .create(&acct, NewTodo::new("Water plants").due(today()).priority(Priority::Low))
        .unwrap();
    service
        .create(&acct, NewTodo::new("Plan the roadmap before the deadline"))
        .unwrap();

    let report = controller.optimize_priorities(&acct).unwrap();
    let reasons: Vec<(String, Priority, EscalationReason)> = report
        .changes
        .into_iter()
        .map(|change| (change.content, change.to, change.reason))
        .collect();

    assert!(reasons.contains(&(
        "Server down, fix ASAP".to_string(),
        Priority::Urgent,
        EscalationReason::UrgentKeyword("asap".to_string())
    )));
    assert!(reasons.contains(&(
        "Water plants".to_string(),
        Priority::High,
        EscalationReason::DueToday
    )));
    assert!(reasons.contains(&(
        "Plan the roadmap before the deadline".to_string(),
        Priority::High,
        EscalationReason::HighKeyword("deadline".to_string())
    )));
}

#[test]
fn configured_keywords_replace_the_defaults() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
    ));
    let policy = KeywordEscalationPolicy::new(EscalationConfig {
        urgent_keywords: vec!["outage".to_string()],
        high_keywords: Vec::new(),
        ..EscalationConfig::default()
    })
    .unwrap();
    let mut controller = AutonomousController::with_policy(
        TodoService::with_clock(InMemoryTodoRepository::new(), clock),
        policy,
    );
    let acct = owner("acct");
    controller
        .service_mut()
        .create(&acct, NewTodo::new("Outage postmortem"))
        .unwrap();
    controller
        .service_mut()
        .create(&acct, NewTodo::new("urgent but not configured"))
        .unwrap();

    let report = controller.optimize_priorities(&acct).unwrap();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].content, "Outage postmortem");
}

struct AlwaysHigh;

impl EscalationPolicy for AlwaysHigh {
    fn evaluate(&self, todo: &Todo, _now: DateTime<Utc>) -> Option<Escalation> {
        (todo.priority < Priority::High).then(|| Escalation {
            from: todo.priority,
            to: Priority::High,
            reason: EscalationReason::HighKeyword("any".to_string()),
        })
    }
}

#[test]
fn custom_policy_can_be_injected() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
    ));
    let mut controller = AutonomousController::with_policy(
        TodoService::with_clock(InMemoryTodoRepository::new(), clock),
        AlwaysHigh,
    );
    let acct = owner("acct");
    controller
        .service_mut()
        .create(&acct, NewTodo::new("anything").priority(Priority::Low))
        .unwrap();

    let response = controller.handle(&acct, action(json!({ "action": "optimize_priorities" })));
    assert!(response.ok);
    match response.data {
        Some(ActionData::Optimization(report)) => {
            assert_eq!(report.changes.len(), 1);
            assert_eq!(report.changes[0].to, Priority::High);
        }
        other => panic!("expected optimization payload, got {other:?}"),
    }
}

#[test]
fn plan_creates_one_review_todo_when_items_are_overdue() {
    let mut controller = controller();
    let acct = owner("acct");
    controller
        .service_mut()
        .create(
            &acct,
            NewTodo::new("Pay invoice").due(today() - Duration::days(2)),
        )
        .unwrap();

    let report = controller.plan(&acct, true).unwrap();
    assert_eq!(report.stats.overdue, 1);
    assert!(report
        .suggestions
        .iter()
        .any(|suggestion| suggestion.contains("overdue")));
    let review = report.created.unwrap();
    assert_eq!(review.content, "Review overdue tasks");
    assert_eq!(review.priority, Priority::High);
    assert_eq!(review.category, "Planning");
    assert_eq!(review.due_date, Some(today()));
    assert_eq!(review.source, TodoSource::Hybrid);
    assert!(review.tags.contains("review"));

    let second = controller.plan(&acct, true).unwrap();
    assert!(second.created.is_none());
    let all = controller
        .service()
        .query(&acct, &TodoFilter::default())
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn plan_without_auto_create_only_suggests() {
    let mut controller = controller();
    let acct = owner("acct");

    let empty = controller.plan(&acct, false).unwrap();
    assert!(empty.suggestions[0].starts_with("No open tasks."));

    controller
        .service_mut()
        .create(
            &acct,
            NewTodo::new("Pay invoice").due(today() - Duration::days(2)),
        )
        .unwrap();
    let report = controller.plan(&acct, false).unwrap();
    assert!(report.created.is_none());
    assert_eq!(
        controller
            .service()
            .query(&acct, &TodoFilter::default())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn stats_and_context_actions_wrap_read_models() {
    let mut controller = controller();
    let acct = owner("acct");
    controller
        .service_mut()
        .create(&acct, NewTodo::new("Fix outage").priority(Priority::Urgent))
        .unwrap();

    let stats = controller.handle(&acct, action(json!({ "action": "stats" })));
    match stats.data {
        Some(ActionData::Stats(stats)) => assert_eq!(stats.urgent_pending, 1),
        other => panic!("expected stats payload, got {other:?}"),
    }

    let context = controller.handle(&acct, action(json!({ "action": "context" })));
    match context.data {
        Some(ActionData::Context(text)) => assert!(text.contains("Urgent pending (1):")),
        other => panic!("expected context payload, got {other:?}"),
    }
}

/// Store whose `replace` fails for one id.
struct FailingReplaceRepo {
    inner: InMemoryTodoRepository,
    broken: TodoId,
}

impl TodoRepository for FailingReplaceRepo {
    fn insert(&mut self, todo: &Todo) -> RepoResult<()> {
        self.inner.insert(todo)
    }

    fn get(&self, owner: &OwnerId, id: TodoId) -> RepoResult<Option<Todo>> {
        self.inner.get(owner, id)
    }

    fn replace(&mut self, todo: &Todo) -> RepoResult<()> {
        if todo.id == self.broken {
            return Err(RepoError::InvalidData("disk is read-only".to_string()));
        }
        self.inner.replace(todo)
    }

    fn remove(&mut self, owner: &OwnerId, id: TodoId) -> RepoResult<bool> {
        self.inner.remove(owner, id)
    }

    fn list(&self, owner: &OwnerId) -> RepoResult<Vec<Todo>> {
        self.inner.list(owner)
    }

    fn apply_batch(&mut self, owner: &OwnerId, writes: &[BatchWrite]) -> RepoResult<()> {
        self.inner.apply_batch(owner, writes)
    }

    fn apply_planned(
        &mut self,
        owner: &OwnerId,
        plan: &mut dyn FnMut(Vec<Todo>) -> RepoResult<Vec<BatchWrite>>,
    ) -> RepoResult<Vec<BatchWrite>> {
        self.inner.apply_planned(owner, plan)
    }
}

#[test]
fn optimize_records_item_failures_and_keeps_going() {
    let acct = owner("acct");
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
    let yesterday = today() - Duration::days(1);
    let seed = |content: &str| {
        Todo::create(
            acct.clone(),
            NewTodo::new(content).due(yesterday),
            DEFAULT_CATEGORY,
            now,
        )
        .unwrap()
    };
    let stuck = seed("Renew lease");
    let fine = seed("Pay invoice");

    let mut inner = InMemoryTodoRepository::new();
    inner.insert(&stuck).unwrap();
    inner.insert(&fine).unwrap();
    let repo = FailingReplaceRepo {
        inner,
        broken: stuck.id,
    };
    let mut controller = AutonomousController::new(TodoService::with_clock(
        repo,
        Arc::new(ManualClock::new(now)),
    ));

    let report = controller.optimize_priorities(&acct).unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].id, fine.id);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, stuck.id);
    assert_eq!(report.failures[0].error_code, "internal_error");

    let service = controller.service();
    let escalated = service.get_by_id(&acct, fine.id).unwrap().unwrap();
    assert_eq!(escalated.priority, Priority::Urgent);
    let untouched = service.get_by_id(&acct, stuck.id).unwrap().unwrap();
    assert_eq!(untouched.priority, stuck.priority);
}
