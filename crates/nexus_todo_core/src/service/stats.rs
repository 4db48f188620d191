//! Read-side statistics and prompt digest.
//!
//! # Invariants
//! - Pure projections: nothing here mutates state.
//! - One pass over the owner's todos; enumerated sections keep at most
//!   `DIGEST_SECTION_LIMIT` items and summarize the rest numerically.
//! - Archived todos are excluded.

use crate::model::todo::{Priority, Todo, TodoStatus};
use crate::query::filter::compare_for_listing;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Maximum items enumerated per digest section.
pub const DIGEST_SECTION_LIMIT: usize = 3;
const DIGEST_CONTENT_MAX_CHARS: usize = 80;

/// Counts per priority level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub urgent: usize,
}

impl PriorityBreakdown {
    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Medium => self.medium += 1,
            Priority::High => self.high += 1,
            Priority::Urgent => self.urgent += 1,
        }
    }
}

/// Aggregate counts for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoStats {
    /// Non-archived todos.
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Archived todos, excluded from every other counter.
    pub archived: usize,
    pub overdue: usize,
    pub due_today: usize,
    /// Urgent and not completed.
    pub urgent_pending: usize,
    pub by_priority: PriorityBreakdown,
    pub by_category: BTreeMap<String, usize>,
}

impl TodoStats {
    pub fn open(&self) -> usize {
        self.pending + self.in_progress
    }
}

/// Computes `TodoStats` in one pass.
pub fn compute_stats(todos: &[Todo], now: DateTime<Utc>) -> TodoStats {
    let today = now.date_naive();
    let mut stats = TodoStats::default();

    for todo in todos {
        if todo.archived {
            stats.archived += 1;
            continue;
        }
        stats.total += 1;
        match todo.status {
            TodoStatus::Pending => stats.pending += 1,
            TodoStatus::InProgress => stats.in_progress += 1,
            TodoStatus::Completed => stats.completed += 1,
        }
        if todo.is_overdue(now) {
            stats.overdue += 1;
        }
        if todo.is_due_today(today) {
            stats.due_today += 1;
        }
        if todo.priority == Priority::Urgent && todo.is_open() {
            stats.urgent_pending += 1;
        }
        stats.by_priority.bump(todo.priority);
        *stats.by_category.entry(todo.category.clone()).or_insert(0) += 1;
    }

    stats
}

/// Keeps the first `DIGEST_SECTION_LIMIT` items in listing order plus a total count.
struct DigestSection<'a> {
    title: &'static str,
    top: Vec<&'a Todo>,
    total: usize,
}

impl<'a> DigestSection<'a> {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            top: Vec::with_capacity(DIGEST_SECTION_LIMIT + 1),
            total: 0,
        }
    }

    // Items arrive in insertion order; inserting after equal keys keeps the
    // listing tie-break without sorting the whole section.
    fn offer(&mut self, todo: &'a Todo) {
        self.total += 1;
        let position = self
            .top
            .iter()
            .position(|kept| compare_for_listing(todo, kept) == Ordering::Less)
            .unwrap_or(self.top.len());
        if position < DIGEST_SECTION_LIMIT {
            self.top.insert(position, todo);
            self.top.truncate(DIGEST_SECTION_LIMIT);
        }
    }

    fn render(&self, out: &mut String) {
        if self.total == 0 {
            return;
        }
        let _ = writeln!(out, "{} ({}):", self.title, self.total);
        for todo in &self.top {
            let _ = writeln!(out, "- {}", describe(todo));
        }
        let remaining = self.total - self.top.len();
        if remaining > 0 {
            let _ = writeln!(out, "...and {remaining} more");
        }
    }
}

/// Renders a short status digest for prompt injection.
///
/// Lists up to three overdue, due-today and urgent-pending items; larger
/// sections are summarized with a count.
pub fn render_context(todos: &[Todo], now: DateTime<Utc>) -> String {
    let stats = compute_stats(todos, now);
    let today = now.date_naive();

    let mut overdue = DigestSection::new("Overdue");
    let mut due_today = DigestSection::new("Due today");
    let mut urgent = DigestSection::new("Urgent pending");
    for todo in todos.iter().filter(|todo| !todo.archived) {
        if todo.is_overdue(now) {
            overdue.offer(todo);
        }
        if todo.is_due_today(today) {
            due_today.offer(todo);
        }
        if todo.priority == Priority::Urgent && todo.is_open() {
            urgent.offer(todo);
        }
    }

    let mut out = String::new();
    if stats.total == 0 {
        out.push_str("No open tasks. The todo list is empty.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "Todo status: {} total ({} pending, {} in progress, {} completed); {} overdue, {} due today, {} urgent.",
        stats.total,
        stats.pending,
        stats.in_progress,
        stats.completed,
        stats.overdue,
        stats.due_today,
        stats.urgent_pending
    );
    if stats.open() == 0 {
        out.push_str("All tasks are completed.\n");
        return out;
    }

    overdue.render(&mut out);
    due_today.render(&mut out);
    urgent.render(&mut out);
    out
}

fn describe(todo: &Todo) -> String {
    let mut line = format!(
        "{} [{}, {}]",
        sanitize_content(&todo.content),
        todo.priority,
        todo.status
    );
    if let Some(date) = todo.due_date {
        let _ = write!(line, " due {date}");
        if let Some(time) = todo.due_time {
            let _ = write!(line, " {}", time.format("%H:%M"));
        }
    }
    line
}

fn sanitize_content(value: &str) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized
        .chars()
        .take(DIGEST_CONTENT_MAX_CHARS)
        .collect::<String>();
    if normalized.chars().count() > DIGEST_CONTENT_MAX_CHARS {
        truncated.push_str("...");
    }
    truncated
}
