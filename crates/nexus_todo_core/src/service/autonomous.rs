//! Agent-facing control surface.
//!
//! # Responsibility
//! - Map a fixed action vocabulary onto `TodoService` primitives.
//! - Provide planning and priority optimization on top of them.
//! - Convert every outcome into an `ActionResponse`; nothing escapes as `Err`.
//!
//! # Invariants
//! - One failing item never aborts planning/optimization; it is reported in
//!   the aggregate result.
//! - Planning creates at most one open review todo per owner.

use crate::clock::{Clock, SystemClock};
use crate::model::todo::{NewTodo, OwnerId, Priority, Todo, TodoId, TodoPatch, TodoSource};
use crate::policy::escalation::{
    EscalationPolicy, EscalationReason, KeywordEscalationPolicy,
};
use crate::query::filter::TodoFilter;
use crate::repo::todo_repo::TodoRepository;
use crate::service::bulk::{BulkMutation, BulkOutcome, BulkParams, BulkSelection};
use crate::service::stats::TodoStats;
use crate::service::todo_service::{ServiceResult, TodoService, TodoServiceError};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Thresholds and texts used by the planning action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanningConfig {
    /// More in-progress todos than this triggers a focus suggestion.
    pub in_progress_limit: usize,
    /// More pending todos than this triggers a backlog suggestion.
    pub backlog_limit: usize,
    pub review_task_content: String,
    pub review_task_category: String,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            in_progress_limit: 3,
            backlog_limit: 10,
            review_task_content: "Review overdue tasks".to_string(),
            review_task_category: "Planning".to_string(),
        }
    }
}

/// Action vocabulary accepted from an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Create {
        todo: NewTodo,
    },
    Get {
        id: TodoId,
    },
    Update {
        id: TodoId,
        patch: TodoPatch,
    },
    Complete {
        id: TodoId,
    },
    Delete {
        id: TodoId,
    },
    Archive {
        id: TodoId,
    },
    Unarchive {
        id: TodoId,
    },
    /// `kind` is validated at dispatch so unknown kinds surface as `bad_request`.
    Bulk {
        kind: String,
        selection: BulkSelection,
        #[serde(default)]
        params: BulkParams,
    },
    Query {
        #[serde(default)]
        filter: TodoFilter,
    },
    Stats,
    Context,
    Plan {
        #[serde(default, rename = "autoCreate")]
        auto_create: bool,
    },
    OptimizePriorities,
}

impl AgentAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Get { .. } => "get",
            Self::Update { .. } => "update",
            Self::Complete { .. } => "complete",
            Self::Delete { .. } => "delete",
            Self::Archive { .. } => "archive",
            Self::Unarchive { .. } => "unarchive",
            Self::Bulk { .. } => "bulk",
            Self::Query { .. } => "query",
            Self::Stats => "stats",
            Self::Context => "context",
            Self::Plan { .. } => "plan",
            Self::OptimizePriorities => "optimize_priorities",
        }
    }
}

/// Per-item failure inside an aggregate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub id: TodoId,
    pub error_code: String,
    pub message: String,
}

impl ItemFailure {
    fn new(id: TodoId, err: &TodoServiceError) -> Self {
        Self {
            id,
            error_code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of the planning action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub stats: TodoStats,
    pub suggestions: Vec<String>,
    pub created: Option<Todo>,
}

/// One applied escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityChange {
    pub id: TodoId,
    pub content: String,
    pub from: Priority,
    pub to: Priority,
    pub reason: EscalationReason,
}

/// Result of the priority optimization action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub scanned: usize,
    pub changes: Vec<PriorityChange>,
    /// Human-readable line per change.
    pub changelog: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// Typed payload of a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionData {
    Todo(Todo),
    Todos(Vec<Todo>),
    Deleted { id: TodoId, removed: bool },
    Bulk(BulkOutcome),
    Stats(TodoStats),
    Context(String),
    Plan(PlanReport),
    Optimization(OptimizationReport),
}

/// Envelope returned for every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ActionData>,
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, data: ActionData) -> Self {
        Self {
            ok: true,
            message: message.into(),
            error_code: None,
            data: Some(data),
        }
    }

    pub fn failure(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            error_code: Some(error_code.into()),
            data: None,
        }
    }

    fn from_error(err: &TodoServiceError) -> Self {
        Self::failure(err.code(), err.to_string())
    }
}

/// Façade used by LLM-driven callers.
pub struct AutonomousController<R, C = SystemClock, P = KeywordEscalationPolicy>
where
    R: TodoRepository,
    C: Clock,
    P: EscalationPolicy,
{
    service: TodoService<R, C>,
    policy: P,
    planning: PlanningConfig,
}

impl<R: TodoRepository, C: Clock> AutonomousController<R, C, KeywordEscalationPolicy> {
    /// Controller with the default keyword policy and planning thresholds.
    pub fn new(service: TodoService<R, C>) -> Self {
        Self::with_policy(service, KeywordEscalationPolicy::default())
    }
}

impl<R, C, P> AutonomousController<R, C, P>
where
    R: TodoRepository,
    C: Clock,
    P: EscalationPolicy,
{
    pub fn with_policy(service: TodoService<R, C>, policy: P) -> Self {
        Self {
            service,
            policy,
            planning: PlanningConfig::default(),
        }
    }

    pub fn with_planning(mut self, planning: PlanningConfig) -> Self {
        self.planning = planning;
        self
    }

    pub fn service(&self) -> &TodoService<R, C> {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut TodoService<R, C> {
        &mut self.service
    }

    /// Executes one action. Never returns an error; failures are encoded in
    /// the response envelope.
    pub fn handle(&mut self, owner: &OwnerId, action: AgentAction) -> ActionResponse {
        let name = action.name();
        let response = match self.dispatch(owner, action) {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "event=agent_action module=autonomous status=error owner={} action={} error_code={}",
                    owner,
                    name,
                    err.code()
                );
                return ActionResponse::from_error(&err);
            }
        };
        info!(
            "event=agent_action module=autonomous status=ok owner={} action={}",
            owner, name
        );
        response
    }

    fn dispatch(&mut self, owner: &OwnerId, action: AgentAction) -> ServiceResult<ActionResponse> {
        let response = match action {
            AgentAction::Create { todo } => {
                let created = self.service.create(owner, todo)?;
                ActionResponse::success(
                    format!("Created todo \"{}\".", created.content),
                    ActionData::Todo(created),
                )
            }
            AgentAction::Get { id } => {
                let todo = self
                    .service
                    .get_by_id(owner, id)?
                    .ok_or(TodoServiceError::NotFound(id))?;
                ActionResponse::success("Todo found.", ActionData::Todo(todo))
            }
            AgentAction::Update { id, patch } => {
                let updated = self.service.update(owner, id, &patch)?;
                ActionResponse::success("Todo updated.", ActionData::Todo(updated))
            }
            AgentAction::Complete { id } => {
                let completed = self.service.complete(owner, id)?;
                ActionResponse::success(
                    format!("Completed \"{}\".", completed.content),
                    ActionData::Todo(completed),
                )
            }
            AgentAction::Delete { id } => {
                let removed = self.service.delete(owner, id)?;
                let message = if removed {
                    "Todo deleted."
                } else {
                    "Todo did not exist; nothing deleted."
                };
                ActionResponse::success(message, ActionData::Deleted { id, removed })
            }
            AgentAction::Archive { id } => {
                let todo = self.service.archive(owner, id)?;
                ActionResponse::success("Todo archived.", ActionData::Todo(todo))
            }
            AgentAction::Unarchive { id } => {
                let todo = self.service.unarchive(owner, id)?;
                ActionResponse::success("Todo unarchived.", ActionData::Todo(todo))
            }
            AgentAction::Bulk {
                kind,
                selection,
                params,
            } => {
                let mutation = BulkMutation::from_request(&kind, params)?;
                let outcome = self.service.bulk(owner, &selection, &mutation)?;
                ActionResponse::success(
                    format!(
                        "Bulk {} affected {} of {} selected todos.",
                        outcome.kind, outcome.affected_count, outcome.matched
                    ),
                    ActionData::Bulk(outcome),
                )
            }
            AgentAction::Query { filter } => {
                let todos = self.service.query(owner, &filter)?;
                ActionResponse::success(format!("Found {} todos.", todos.len()), ActionData::Todos(todos))
            }
            AgentAction::Stats => {
                let stats = self.service.stats(owner)?;
                ActionResponse::success("Statistics computed.", ActionData::Stats(stats))
            }
            AgentAction::Context => {
                let context = self.service.context(owner)?;
                ActionResponse::success("Context generated.", ActionData::Context(context))
            }
            AgentAction::Plan { auto_create } => {
                let report = self.plan(owner, auto_create)?;
                ActionResponse::success(
                    format!("{} planning suggestions.", report.suggestions.len()),
                    ActionData::Plan(report),
                )
            }
            AgentAction::OptimizePriorities => {
                let report = self.optimize_priorities(owner)?;
                let message = format!(
                    "Escalated {} of {} open todos; {} failures.",
                    report.changes.len(),
                    report.scanned,
                    report.failures.len()
                );
                ActionResponse::success(message, ActionData::Optimization(report))
            }
        };
        Ok(response)
    }

    /// Builds suggestions from current stats and optionally creates one
    /// review todo when anything is overdue.
    pub fn plan(&mut self, owner: &OwnerId, auto_create: bool) -> ServiceResult<PlanReport> {
        let stats = self.service.stats(owner)?;
        let mut suggestions = Vec::new();

        if stats.open() == 0 {
            suggestions
                .push("No open tasks. Capture new work or review completed items.".to_string());
        }
        if stats.overdue > 0 {
            suggestions.push(format!(
                "{} overdue task(s) need attention; reschedule or complete them first.",
                stats.overdue
            ));
        }
        if stats.urgent_pending > 0 {
            suggestions.push(format!(
                "Focus on {} urgent task(s) before anything else.",
                stats.urgent_pending
            ));
        }
        if stats.due_today > 0 {
            suggestions.push(format!("{} task(s) are due today.", stats.due_today));
        }
        if stats.in_progress > self.planning.in_progress_limit {
            suggestions.push(format!(
                "{} tasks are in progress; finish some before starting new work.",
                stats.in_progress
            ));
        }
        if stats.pending > self.planning.backlog_limit {
            suggestions.push(format!(
                "Backlog holds {} pending tasks; archive or re-prioritize stale items.",
                stats.pending
            ));
        }

        let mut created = None;
        if auto_create && stats.overdue > 0 && !self.has_open_review_task(owner)? {
            let input = NewTodo {
                description: Some(format!("{} tasks were overdue at planning time.", stats.overdue)),
                due_date: Some(self.service.clock().today()),
                source: Some(TodoSource::Hybrid),
                ..NewTodo::new(self.planning.review_task_content.clone())
            }
            .priority(Priority::High)
            .category(self.planning.review_task_category.clone())
            .tags(["review"]);
            let todo = self.service.create(owner, input)?;
            suggestions.push(format!("Created \"{}\" to triage overdue items.", todo.content));
            created = Some(todo);
        }

        Ok(PlanReport {
            stats,
            suggestions,
            created,
        })
    }

    /// Escalates priorities per the injected policy, one update per todo.
    pub fn optimize_priorities(&mut self, owner: &OwnerId) -> ServiceResult<OptimizationReport> {
        let now = self.service.clock().now();
        let candidates: Vec<Todo> = self
            .service
            .query(owner, &TodoFilter::default())?
            .into_iter()
            .filter(Todo::is_open)
            .collect();

        let mut report = OptimizationReport {
            scanned: candidates.len(),
            ..OptimizationReport::default()
        };
        for todo in candidates {
            let Some(escalation) = self.policy.evaluate(&todo, now) else {
                continue;
            };
            let patch = TodoPatch {
                priority: Some(escalation.to),
                ..TodoPatch::default()
            };
            match self.service.update(owner, todo.id, &patch) {
                Ok(_) => {
                    report.changelog.push(format!(
                        "\"{}\": {} -> {} ({})",
                        todo.content, escalation.from, escalation.to, escalation.reason
                    ));
                    report.changes.push(PriorityChange {
                        id: todo.id,
                        content: todo.content,
                        from: escalation.from,
                        to: escalation.to,
                        reason: escalation.reason,
                    });
                }
                Err(err) => report.failures.push(ItemFailure::new(todo.id, &err)),
            }
        }
        Ok(report)
    }

    fn has_open_review_task(&self, owner: &OwnerId) -> ServiceResult<bool> {
        let review = self.planning.review_task_content.trim().to_lowercase();
        let open = self.service.query(owner, &TodoFilter::default())?;
        Ok(open
            .iter()
            .any(|todo| todo.is_open() && todo.content.to_lowercase() == review))
    }
}
