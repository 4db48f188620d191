//! Bulk mutation planning.
//!
//! # Responsibility
//! - Turn loosely-typed agent input into one typed `BulkMutation`.
//! - Resolve a selection once against a snapshot and compute the write set.
//!
//! # Invariants
//! - Invalid kinds or payloads are rejected before any record is touched.
//! - Selection is computed from the snapshot only; writes never influence it.
//! - Records whose state would not change are not written.
//! - Unknown ids are reported, never raised.

use crate::model::todo::{
    normalize_tags, Priority, Todo, TodoId, TodoPatch, TodoStatus, TodoValidationError,
};
use crate::query::filter::{select_matching, TodoFilter};
use crate::repo::todo_repo::BatchWrite;
use crate::service::todo_service::{ServiceResult, TodoServiceError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Discriminator of a bulk mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkKind {
    Complete,
    Uncomplete,
    Archive,
    Unarchive,
    Delete,
    Update,
    Prioritize,
    Categorize,
    Assign,
    Schedule,
    AddTags,
    RemoveTags,
}

impl BulkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Uncomplete => "uncomplete",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Prioritize => "prioritize",
            Self::Categorize => "categorize",
            Self::Assign => "assign",
            Self::Schedule => "schedule",
            Self::AddTags => "add_tags",
            Self::RemoveTags => "remove_tags",
        }
    }
}

impl Display for BulkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkKind {
    type Err = TodoServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "complete" => Ok(Self::Complete),
            "uncomplete" => Ok(Self::Uncomplete),
            "archive" => Ok(Self::Archive),
            "unarchive" => Ok(Self::Unarchive),
            "delete" => Ok(Self::Delete),
            "update" => Ok(Self::Update),
            "prioritize" => Ok(Self::Prioritize),
            "categorize" => Ok(Self::Categorize),
            "assign" => Ok(Self::Assign),
            "schedule" => Ok(Self::Schedule),
            "add_tags" => Ok(Self::AddTags),
            "remove_tags" => Ok(Self::RemoveTags),
            other => Err(TodoServiceError::BadRequest(format!(
                "unknown bulk mutation kind `{other}`"
            ))),
        }
    }
}

/// One mutation applied to every selected todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkMutation {
    Complete,
    /// Moves completed todos back to `pending`; others are left untouched.
    Uncomplete,
    Archive,
    Unarchive,
    Delete,
    Update {
        patch: TodoPatch,
    },
    Prioritize {
        priority: Priority,
    },
    Categorize {
        category: String,
    },
    /// `None` clears the assignee.
    Assign {
        assignee: Option<String>,
    },
    /// `None` clears the corresponding field.
    #[serde(rename_all = "camelCase")]
    Schedule {
        due_date: Option<NaiveDate>,
        due_time: Option<NaiveTime>,
    },
    AddTags {
        tags: Vec<String>,
    },
    RemoveTags {
        tags: Vec<String>,
    },
}

/// Untyped bulk payload as sent by the agent surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkParams {
    pub patch: Option<TodoPatch>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub tags: Option<Vec<String>>,
}

impl BulkMutation {
    /// Builds a typed mutation from a kind name and loose parameters.
    pub fn from_request(kind: &str, params: BulkParams) -> ServiceResult<Self> {
        let kind = BulkKind::from_str(kind)?;
        let missing = |field: &str| {
            TodoServiceError::BadRequest(format!("bulk `{kind}` requires `{field}`"))
        };

        let mutation = match kind {
            BulkKind::Complete => Self::Complete,
            BulkKind::Uncomplete => Self::Uncomplete,
            BulkKind::Archive => Self::Archive,
            BulkKind::Unarchive => Self::Unarchive,
            BulkKind::Delete => Self::Delete,
            BulkKind::Update => Self::Update {
                patch: params.patch.ok_or_else(|| missing("patch"))?,
            },
            BulkKind::Prioritize => Self::Prioritize {
                priority: params.priority.ok_or_else(|| missing("priority"))?,
            },
            BulkKind::Categorize => Self::Categorize {
                category: params.category.ok_or_else(|| missing("category"))?,
            },
            BulkKind::Assign => Self::Assign {
                assignee: params.assignee,
            },
            BulkKind::Schedule => Self::Schedule {
                due_date: params.due_date,
                due_time: params.due_time,
            },
            BulkKind::AddTags => Self::AddTags {
                tags: params.tags.ok_or_else(|| missing("tags"))?,
            },
            BulkKind::RemoveTags => Self::RemoveTags {
                tags: params.tags.ok_or_else(|| missing("tags"))?,
            },
        };
        mutation.validate()?;
        Ok(mutation)
    }

    pub fn kind(&self) -> BulkKind {
        match self {
            Self::Complete => BulkKind::Complete,
            Self::Uncomplete => BulkKind::Uncomplete,
            Self::Archive => BulkKind::Archive,
            Self::Unarchive => BulkKind::Unarchive,
            Self::Delete => BulkKind::Delete,
            Self::Update { .. } => BulkKind::Update,
            Self::Prioritize { .. } => BulkKind::Prioritize,
            Self::Categorize { .. } => BulkKind::Categorize,
            Self::Assign { .. } => BulkKind::Assign,
            Self::Schedule { .. } => BulkKind::Schedule,
            Self::AddTags { .. } => BulkKind::AddTags,
            Self::RemoveTags { .. } => BulkKind::RemoveTags,
        }
    }

    /// Rejects payloads that could never apply cleanly.
    pub fn validate(&self) -> ServiceResult<()> {
        match self {
            Self::Update { patch } => {
                if patch.is_empty() {
                    return Err(TodoServiceError::BadRequest(
                        "bulk `update` requires at least one field".to_string(),
                    ));
                }
                patch.validate()?;
            }
            Self::Categorize { category } if category.trim().is_empty() => {
                return Err(TodoValidationError::EmptyCategory.into());
            }
            Self::AddTags { tags } | Self::RemoveTags { tags } => {
                if tags.is_empty() {
                    return Err(TodoServiceError::BadRequest(format!(
                        "bulk `{}` requires at least one tag",
                        self.kind()
                    )));
                }
                normalize_tags(tags)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Computes the write for one todo, or `None` when nothing would change.
    fn write_for(
        &self,
        todo: &Todo,
        now: DateTime<Utc>,
    ) -> Result<Option<BatchWrite>, TodoValidationError> {
        let patch = match self {
            Self::Delete => return Ok(Some(BatchWrite::Remove(todo.id))),
            Self::Complete => TodoPatch {
                status: Some(TodoStatus::Completed),
                ..TodoPatch::default()
            },
            Self::Uncomplete if todo.status == TodoStatus::Completed => TodoPatch {
                status: Some(TodoStatus::Pending),
                ..TodoPatch::default()
            },
            Self::Uncomplete => return Ok(None),
            Self::Archive | Self::Unarchive => TodoPatch {
                archived: Some(matches!(self, Self::Archive)),
                ..TodoPatch::default()
            },
            Self::Update { patch } => patch.clone(),
            Self::Prioritize { priority } => TodoPatch {
                priority: Some(*priority),
                ..TodoPatch::default()
            },
            Self::Categorize { category } => TodoPatch {
                category: Some(category.clone()),
                ..TodoPatch::default()
            },
            Self::Assign { assignee } => TodoPatch {
                assigned_to: Some(assignee.clone()),
                ..TodoPatch::default()
            },
            Self::Schedule { due_date, due_time } => TodoPatch {
                due_date: Some(*due_date),
                due_time: Some(*due_time),
                ..TodoPatch::default()
            },
            Self::AddTags { tags } => {
                let mut merged = todo.tags.clone();
                merged.extend(normalize_tags(tags)?);
                TodoPatch {
                    tags: Some(merged.into_iter().collect()),
                    ..TodoPatch::default()
                }
            }
            Self::RemoveTags { tags } => {
                let removed = normalize_tags(tags)?;
                TodoPatch {
                    tags: Some(todo.tags.difference(&removed).cloned().collect()),
                    ..TodoPatch::default()
                }
            }
        };

        let mut updated = todo.clone();
        if updated.apply_patch(&patch, now)? {
            Ok(Some(BatchWrite::Replace(updated)))
        } else {
            Ok(None)
        }
    }
}

/// Which todos a bulk call targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkSelection {
    /// Explicit ids; archived todos are included, unknown ids are reported.
    Ids(Vec<TodoId>),
    /// Filter selection; pagination fields are ignored.
    Filter(TodoFilter),
}

/// Result of one bulk call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub kind: BulkKind,
    /// Todos selected from the snapshot.
    pub matched: usize,
    /// Todos actually written or removed.
    pub affected_count: usize,
    /// Requested ids that do not exist for this owner.
    pub missing_ids: Vec<TodoId>,
}

/// Outcome plus the write set to commit.
#[derive(Debug, Clone)]
pub(crate) struct BulkPlan {
    pub(crate) outcome: BulkOutcome,
    pub(crate) writes: Vec<BatchWrite>,
}

/// Resolves `selection` over `snapshot` and computes the writes for `mutation`.
pub(crate) fn plan_bulk(
    snapshot: Vec<Todo>,
    selection: &BulkSelection,
    mutation: &BulkMutation,
    now: DateTime<Utc>,
) -> Result<BulkPlan, TodoValidationError> {
    let (selected, missing_ids) = resolve_selection(snapshot, selection, mutation, now);

    let mut writes = Vec::new();
    for todo in &selected {
        if let Some(write) = mutation.write_for(todo, now)? {
            writes.push(write);
        }
    }

    Ok(BulkPlan {
        outcome: BulkOutcome {
            kind: mutation.kind(),
            matched: selected.len(),
            affected_count: writes.len(),
            missing_ids,
        },
        writes,
    })
}

fn resolve_selection(
    snapshot: Vec<Todo>,
    selection: &BulkSelection,
    mutation: &BulkMutation,
    now: DateTime<Utc>,
) -> (Vec<Todo>, Vec<TodoId>) {
    match selection {
        BulkSelection::Ids(ids) => {
            let mut by_id: HashMap<TodoId, Todo> =
                snapshot.into_iter().map(|todo| (todo.id, todo)).collect();
            let mut seen = HashSet::new();
            let mut selected = Vec::new();
            let mut missing = Vec::new();
            for id in ids {
                if !seen.insert(*id) {
                    continue;
                }
                match by_id.remove(id) {
                    Some(todo) => selected.push(todo),
                    None => missing.push(*id),
                }
            }
            (selected, missing)
        }
        BulkSelection::Filter(filter) => {
            // Archived todos are the only possible unarchive targets.
            let mut effective = filter.clone();
            if matches!(mutation, BulkMutation::Unarchive) {
                effective.include_archived = true;
            }
            (select_matching(snapshot, &effective, now), Vec::new())
        }
    }
}
