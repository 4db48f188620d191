//! Todo filter evaluation and listing order.
//!
//! # Invariants
//! - All filter fields are ANDed; an empty filter keeps every non-archived todo.
//! - Ordering: dated before undated, date ascending, priority descending,
//!   then insertion order (stable sort over the repository order).
//! - No filter combination is an error; no match yields an empty list.

use crate::model::todo::{Priority, Todo, TodoStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

/// Filter specification for listing and bulk selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoFilter {
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    /// Case-insensitive equality.
    pub category: Option<String>,
    /// Exact match.
    pub assigned_to: Option<String>,
    /// Case-insensitive substring over content, description and tags.
    pub search: Option<String>,
    /// Keep only todos whose due instant has passed and that are not completed.
    pub overdue: bool,
    /// Keep only todos due today, any status.
    pub due_today: bool,
    pub include_archived: bool,
    /// Pagination over the ordered result; ignored by bulk selection.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl TodoFilter {
    pub fn with_status(status: TodoStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn with_search(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Self::default()
        }
    }

    /// Evaluates this filter against one todo.
    pub fn matches(&self, todo: &Todo, now: DateTime<Utc>) -> bool {
        CompiledFilter::new(self).matches(todo, now)
    }
}

/// Filter with search/category text lowered once per query.
struct CompiledFilter<'a> {
    filter: &'a TodoFilter,
    search: Option<String>,
    category: Option<String>,
}

impl<'a> CompiledFilter<'a> {
    fn new(filter: &'a TodoFilter) -> Self {
        let lowered = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_lowercase)
        };
        Self {
            filter,
            search: lowered(&filter.search),
            category: lowered(&filter.category),
        }
    }

    fn matches(&self, todo: &Todo, now: DateTime<Utc>) -> bool {
        let filter = self.filter;
        if todo.archived && !filter.include_archived {
            return false;
        }
        if filter.status.is_some_and(|status| todo.status != status) {
            return false;
        }
        if filter.priority.is_some_and(|priority| todo.priority != priority) {
            return false;
        }
        if let Some(category) = self.category.as_deref() {
            if todo.category.to_lowercase() != category {
                return false;
            }
        }
        if let Some(assignee) = filter.assigned_to.as_deref() {
            if todo.assigned_to.as_deref() != Some(assignee.trim()) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref() {
            if !todo.matches_text(search) {
                return false;
            }
        }
        if filter.overdue && !todo.is_overdue(now) {
            return false;
        }
        if filter.due_today && !todo.is_due_today(now.date_naive()) {
            return false;
        }
        true
    }
}

/// Returns every todo matching `filter`, keeping input (insertion) order.
///
/// Pagination fields are ignored; this is the bulk selection primitive.
pub fn select_matching(todos: Vec<Todo>, filter: &TodoFilter, now: DateTime<Utc>) -> Vec<Todo> {
    let compiled = CompiledFilter::new(filter);
    todos
        .into_iter()
        .filter(|todo| compiled.matches(todo, now))
        .collect()
}

/// Filters, orders and paginates an owner's insertion-ordered todos.
pub fn run_query(todos: Vec<Todo>, filter: &TodoFilter, now: DateTime<Utc>) -> Vec<Todo> {
    let mut selected = select_matching(todos, filter, now);
    sort_for_listing(&mut selected);

    let offset = filter.offset as usize;
    let limit = filter.limit.map_or(usize::MAX, |value| value as usize);
    selected.into_iter().skip(offset).take(limit).collect()
}

/// Sorts in listing order. Stable, so equal keys keep insertion order.
pub fn sort_for_listing(todos: &mut [Todo]) {
    todos.sort_by(compare_for_listing);
}

/// Listing comparator: dated first, date ascending, priority descending.
pub fn compare_for_listing(left: &Todo, right: &Todo) -> Ordering {
    let date_key = |todo: &Todo| (todo.due_date.is_none(), todo.due_date);
    date_key(left)
        .cmp(&date_key(right))
        .then_with(|| Reverse(left.priority).cmp(&Reverse(right.priority)))
}
