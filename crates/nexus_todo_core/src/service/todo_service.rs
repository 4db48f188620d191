//! Todo use-case service.
//!
//! # Responsibility
//! - Provide owner-scoped CRUD, query, bulk and read-model entry points.
//! - Stamp timestamps from the injected clock.
//! - Record successful mutations in the sync outbox when one is attached.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Every call is scoped to the `OwnerId` passed in; other owners' records
//!   are indistinguishable from missing ones.
//! - `updated_at` never moves backwards.

use crate::clock::{Clock, SystemClock};
use crate::model::todo::{
    NewTodo, OwnerId, Todo, TodoId, TodoPatch, TodoStatus, TodoValidationError, DEFAULT_CATEGORY,
};
use crate::query::filter::{run_query, TodoFilter};
use crate::repo::todo_repo::{BatchWrite, RepoError, TodoRepository};
use crate::service::bulk::{plan_bulk, BulkMutation, BulkOutcome, BulkSelection};
use crate::service::stats::{compute_stats, render_context, TodoStats};
use crate::sync::outbox::{SyncOperation, SyncOutbox};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, TodoServiceError>;

/// Service error for todo use-cases.
#[derive(Debug)]
pub enum TodoServiceError {
    /// Missing or invalid field.
    Validation(TodoValidationError),
    /// Malformed request, e.g. an unknown bulk mutation kind.
    BadRequest(String),
    /// Target todo does not exist for this owner.
    NotFound(TodoId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl TodoServiceError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Repo(_) => "internal_error",
        }
    }
}

impl Display for TodoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::NotFound(id) => write!(f, "todo not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TodoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TodoValidationError> for TodoServiceError {
    fn from(value: TodoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TodoServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Use-case service over a todo repository.
pub struct TodoService<R: TodoRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    default_category: String,
    outbox: Option<SyncOutbox>,
}

impl<R: TodoRepository> TodoService<R, SystemClock> {
    /// Creates a service on the system clock.
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, SystemClock)
    }
}

impl<R: TodoRepository, C: Clock> TodoService<R, C> {
    pub fn with_clock(repo: R, clock: C) -> Self {
        Self {
            repo,
            clock,
            default_category: DEFAULT_CATEGORY.to_string(),
            outbox: None,
        }
    }

    /// Overrides the category applied when creation input has none.
    /// Blank values keep the built-in default.
    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !category.trim().is_empty() {
            self.default_category = category.trim().to_string();
        }
        self
    }

    /// Attaches an outbox; every later mutation enqueues a sync event.
    pub fn with_outbox(mut self, outbox: SyncOutbox) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn outbox(&self) -> Option<&SyncOutbox> {
        self.outbox.as_ref()
    }

    pub fn outbox_mut(&mut self) -> Option<&mut SyncOutbox> {
        self.outbox.as_mut()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Creates one todo and returns the stored record.
    pub fn create(&mut self, owner: &OwnerId, input: NewTodo) -> ServiceResult<Todo> {
        let todo = Todo::create(
            owner.clone(),
            input,
            self.default_category.as_str(),
            self.clock.now(),
        )?;
        self.repo.insert(&todo)?;
        info!(
            "event=todo_create module=service status=ok owner={} todo_id={}",
            owner, todo.id
        );
        self.record(SyncOperation::Upsert { todo: todo.clone() });
        Ok(todo)
    }

    /// Returns `Ok(None)` for missing ids and for ids owned by someone else.
    pub fn get_by_id(&self, owner: &OwnerId, id: TodoId) -> ServiceResult<Option<Todo>> {
        Ok(self.repo.get(owner, id)?)
    }

    /// Merges `patch` into an existing todo.
    ///
    /// A patch that changes nothing returns the record unchanged and writes
    /// nothing.
    pub fn update(&mut self, owner: &OwnerId, id: TodoId, patch: &TodoPatch) -> ServiceResult<Todo> {
        patch.validate()?;
        let mut todo = self
            .repo
            .get(owner, id)?
            .ok_or(TodoServiceError::NotFound(id))?;

        if !todo.apply_patch(patch, self.clock.now())? {
            debug!(
                "event=todo_update module=service status=noop owner={} todo_id={}",
                owner, id
            );
            return Ok(todo);
        }

        self.repo.replace(&todo)?;
        info!(
            "event=todo_update module=service status=ok owner={} todo_id={}",
            owner, id
        );
        self.record(SyncOperation::Upsert { todo: todo.clone() });
        Ok(todo)
    }

    pub fn complete(&mut self, owner: &OwnerId, id: TodoId) -> ServiceResult<Todo> {
        self.set_status(owner, id, TodoStatus::Completed)
    }

    pub fn set_status(
        &mut self,
        owner: &OwnerId,
        id: TodoId,
        status: TodoStatus,
    ) -> ServiceResult<Todo> {
        let patch = TodoPatch {
            status: Some(status),
            ..TodoPatch::default()
        };
        self.update(owner, id, &patch)
    }

    /// Hides a todo from default listings. Idempotent.
    pub fn archive(&mut self, owner: &OwnerId, id: TodoId) -> ServiceResult<Todo> {
        self.set_archived(owner, id, true)
    }

    /// Idempotent.
    pub fn unarchive(&mut self, owner: &OwnerId, id: TodoId) -> ServiceResult<Todo> {
        self.set_archived(owner, id, false)
    }

    fn set_archived(&mut self, owner: &OwnerId, id: TodoId, archived: bool) -> ServiceResult<Todo> {
        let patch = TodoPatch {
            archived: Some(archived),
            ..TodoPatch::default()
        };
        self.update(owner, id, &patch)
    }

    /// Removes a todo. Returns `false` when nothing was removed.
    pub fn delete(&mut self, owner: &OwnerId, id: TodoId) -> ServiceResult<bool> {
        let removed = self.repo.remove(owner, id)?;
        if removed {
            info!(
                "event=todo_delete module=service status=ok owner={} todo_id={}",
                owner, id
            );
            self.record(SyncOperation::Delete {
                owner: owner.clone(),
                id,
            });
        }
        Ok(removed)
    }

    /// Lists todos matching `filter` in canonical listing order.
    pub fn query(&self, owner: &OwnerId, filter: &TodoFilter) -> ServiceResult<Vec<Todo>> {
        let todos = self.repo.list(owner)?;
        Ok(run_query(todos, filter, self.clock.now()))
    }

    /// Applies one mutation to every selected todo.
    ///
    /// Validation happens before the selection snapshot is taken. Selection
    /// and writes run inside one repository unit, so the snapshot cannot go
    /// stale before the commit.
    pub fn bulk(
        &mut self,
        owner: &OwnerId,
        selection: &BulkSelection,
        mutation: &BulkMutation,
    ) -> ServiceResult<BulkOutcome> {
        mutation.validate()?;
        let now = self.clock.now();
        let mut outcome: Option<BulkOutcome> = None;
        let writes = self.repo.apply_planned(owner, &mut |snapshot| {
            let plan = plan_bulk(snapshot, selection, mutation, now)?;
            outcome = Some(plan.outcome);
            Ok(plan.writes)
        })?;
        let outcome = outcome.ok_or_else(|| {
            TodoServiceError::Repo(RepoError::InvalidData(
                "repository committed a bulk batch without planning it".to_string(),
            ))
        })?;

        if !outcome.missing_ids.is_empty() {
            warn!(
                "event=todo_bulk module=service status=partial owner={} kind={} missing={}",
                owner,
                outcome.kind,
                outcome.missing_ids.len()
            );
        }
        info!(
            "event=todo_bulk module=service status=ok owner={} kind={} matched={} affected={}",
            owner, outcome.kind, outcome.matched, outcome.affected_count
        );

        for write in writes {
            let operation = match write {
                BatchWrite::Replace(todo) => SyncOperation::Upsert { todo },
                BatchWrite::Remove(id) => SyncOperation::Delete {
                    owner: owner.clone(),
                    id,
                },
            };
            self.record(operation);
        }
        Ok(outcome)
    }

    /// Aggregate counts over the owner's non-archived todos.
    pub fn stats(&self, owner: &OwnerId) -> ServiceResult<TodoStats> {
        let todos = self.repo.list(owner)?;
        Ok(compute_stats(&todos, self.clock.now()))
    }

    /// Prompt-ready status digest.
    pub fn context(&self, owner: &OwnerId) -> ServiceResult<String> {
        let todos = self.repo.list(owner)?;
        Ok(render_context(&todos, self.clock.now()))
    }

    fn record(&mut self, operation: SyncOperation) {
        if let Some(outbox) = self.outbox.as_mut() {
            outbox.enqueue(operation);
        }
    }
}
