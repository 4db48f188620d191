//! Core domain logic for the Nexus todo tracker.
//! This crate is the single source of truth for todo invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod query;
pub mod repo;
pub mod service;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::todo::{
    NewTodo, OwnerId, Priority, Todo, TodoId, TodoPatch, TodoSource, TodoStatus,
    TodoValidationError, DEFAULT_CATEGORY,
};
pub use policy::escalation::{
    Escalation, EscalationConfig, EscalationPolicy, EscalationReason, KeywordEscalationPolicy,
    PolicyError,
};
pub use query::filter::TodoFilter;
pub use repo::memory_repo::InMemoryTodoRepository;
pub use repo::sqlite_repo::SqliteTodoRepository;
pub use repo::todo_repo::{BatchWrite, RepoError, RepoResult, TodoRepository};
pub use service::autonomous::{
    ActionData, ActionResponse, AgentAction, AutonomousController, ItemFailure,
    OptimizationReport, PlanReport, PlanningConfig, PriorityChange,
};
pub use service::bulk::{BulkKind, BulkMutation, BulkOutcome, BulkParams, BulkSelection};
pub use service::stats::{PriorityBreakdown, TodoStats};
pub use service::todo_service::{ServiceResult, TodoService, TodoServiceError};
pub use sync::jsonl_sink::JsonLinesSink;
pub use sync::outbox::{
    DrainReport, SyncConfig, SyncError, SyncEvent, SyncOperation, SyncOutbox, SyncSink,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
