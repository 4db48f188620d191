//! Outbound sync queue for an external task-list provider.
//!
//! # Responsibility
//! - Record todo changes that must be mirrored to an external provider.
//! - Deliver them at-least-once with bounded retries and dead-lettering.
//!
//! # Invariants
//! - Events are delivered in enqueue order within one drain pass.
//! - An event is removed from `pending` only after successful delivery or
//!   after it is moved to `dead_letters`.
//! - `attempts` never exceeds `max_attempts`.

use crate::model::todo::{OwnerId, Todo, TodoId};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// When false, services do not record outbound events.
    pub enabled: bool,
    pub max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Change to mirror externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOperation {
    Upsert { todo: Todo },
    Delete { owner: OwnerId, id: TodoId },
}

impl SyncOperation {
    pub fn todo_id(&self) -> TodoId {
        match self {
            Self::Upsert { todo } => todo.id,
            Self::Delete { id, .. } => *id,
        }
    }
}

/// Queued change with delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub seq: u64,
    pub operation: SyncOperation,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Delivery failure reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl SyncError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for SyncError {}

/// External provider adapter.
pub trait SyncSink {
    fn sink_id(&self) -> &str;
    fn deliver(&self, event: &SyncEvent) -> Result<(), SyncError>;
}

/// Summary of one `drain` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

/// Ordered outbound queue with retry budget.
#[derive(Debug, Clone)]
pub struct SyncOutbox {
    pending: VecDeque<SyncEvent>,
    dead_letters: Vec<SyncEvent>,
    max_attempts: u32,
    next_seq: u64,
}

impl Default for SyncOutbox {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl SyncOutbox {
    /// Creates an outbox; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            dead_letters: Vec::new(),
            max_attempts: max_attempts.max(1),
            next_seq: 1,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.max_attempts))
    }

    pub fn enqueue(&mut self, operation: SyncOperation) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push_back(SyncEvent {
            seq,
            operation,
            attempts: 0,
            last_error: None,
        });
        seq
    }

    pub fn pending(&self) -> impl Iterator<Item = &SyncEvent> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dead_letters(&self) -> &[SyncEvent] {
        &self.dead_letters
    }

    /// Attempts every pending event once.
    ///
    /// Retryable failures stay queued (in order) until the attempt budget is
    /// spent; non-retryable failures are dead-lettered immediately.
    pub fn drain(&mut self, sink: &dyn SyncSink) -> DrainReport {
        let mut report = DrainReport::default();
        let mut still_pending = VecDeque::with_capacity(self.pending.len());

        while let Some(mut event) = self.pending.pop_front() {
            event.attempts += 1;
            match sink.deliver(&event) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    event.last_error = Some(err.to_string());
                    if err.retryable && event.attempts < self.max_attempts {
                        report.retried += 1;
                        still_pending.push_back(event);
                    } else {
                        warn!(
                            "event=sync_dead_letter module=sync status=error sink={} seq={} todo_id={} attempts={} error_code={}",
                            sink.sink_id(),
                            event.seq,
                            event.operation.todo_id(),
                            event.attempts,
                            err.code
                        );
                        report.dead_lettered += 1;
                        self.dead_letters.push(event);
                    }
                }
            }
        }

        self.pending = still_pending;
        info!(
            "event=sync_drain module=sync status=ok sink={} delivered={} retried={} dead_lettered={}",
            sink.sink_id(),
            report.delivered,
            report.retried,
            report.dead_lettered
        );
        report
    }

    /// Moves dead letters back to the tail of the queue with a fresh budget.
    pub fn requeue_dead_letters(&mut self) -> usize {
        let count = self.dead_letters.len();
        for mut event in self.dead_letters.drain(..) {
            event.attempts = 0;
            self.pending.push_back(event);
        }
        count
    }
}
