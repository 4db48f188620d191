//! Todo domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by the REST and agent surfaces.
//! - Own field-level validation and patch merge semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another todo.
//! - `owner` never changes after creation.
//! - `updated_at >= created_at`.
//! - `status` and `archived` are independent axes.
//! - `completed_at` is set iff `status == Completed`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Category applied when the caller supplies none.
pub const DEFAULT_CATEGORY: &str = "General";

/// Stable identifier of one todo.
pub type TodoId = Uuid;

/// Owning identity (account key) that scopes every read and write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    /// Builds an owner key from caller input; blank keys are rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, TodoValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TodoValidationError::EmptyOwner);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = TodoValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

/// Workflow state of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl Display for TodoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = TodoValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(TodoValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Task priority. Variant order is significant: `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// All priorities in ascending order.
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TodoValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(TodoValidationError::UnknownPriority(other.to_string())),
        }
    }
}

/// Provenance tag. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoSource {
    ClaudeCode,
    #[default]
    NexusPlatform,
    Hybrid,
}

impl TodoSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::NexusPlatform => "nexus_platform",
            Self::Hybrid => "hybrid",
        }
    }
}

impl FromStr for TodoSource {
    type Err = TodoValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "claude_code" => Ok(Self::ClaudeCode),
            "nexus_platform" => Ok(Self::NexusPlatform),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(TodoValidationError::UnknownSource(other.to_string())),
        }
    }
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoValidationError {
    EmptyContent,
    EmptyOwner,
    EmptyCategory,
    EmptyTag,
    UnknownStatus(String),
    UnknownPriority(String),
    UnknownSource(String),
    UpdatedBeforeCreated,
    CompletedAtMismatch,
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "todo content must not be empty"),
            Self::EmptyOwner => write!(f, "owner id must not be empty"),
            Self::EmptyCategory => write!(f, "category must not be empty"),
            Self::EmptyTag => write!(f, "tags must not be blank"),
            Self::UnknownStatus(value) => write!(
                f,
                "unknown status `{value}`; expected pending|in_progress|completed"
            ),
            Self::UnknownPriority(value) => write!(
                f,
                "unknown priority `{value}`; expected low|medium|high|urgent"
            ),
            Self::UnknownSource(value) => write!(
                f,
                "unknown source `{value}`; expected claude_code|nexus_platform|hybrid"
            ),
            Self::UpdatedBeforeCreated => write!(f, "updated_at must be >= created_at"),
            Self::CompletedAtMismatch => {
                write!(f, "completed_at must be set only for completed todos")
            }
        }
    }
}

impl Error for TodoValidationError {}

/// Canonical todo record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub owner: OwnerId,
    pub content: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub archived: bool,
    pub priority: Priority,
    pub category: String,
    /// Normalized (trimmed, lowercase), deduplicated labels.
    pub tags: BTreeSet<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub source: TodoSource,
}

/// Creation input. Everything except `content` is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTodo {
    pub content: String,
    pub description: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub source: Option<TodoSource>,
}

impl NewTodo {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn due_at(mut self, date: NaiveDate, time: NaiveTime) -> Self {
        self.due_date = Some(date);
        self.due_time = Some(time);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn assigned_to(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    pub fn status(mut self, status: TodoStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn source(mut self, source: TodoSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// Partial update. `None` leaves a field untouched; for clearable fields
/// `Some(None)` clears the value.
///
/// `id`, `owner` and `created_at` cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Replaces the whole tag set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<Option<String>>,
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_time: Option<Option<NaiveTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TodoSource>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Checks patch values without touching any record.
    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if let Some(content) = self.content.as_deref() {
            if content.trim().is_empty() {
                return Err(TodoValidationError::EmptyContent);
            }
        }
        if let Some(category) = self.category.as_deref() {
            if category.trim().is_empty() {
                return Err(TodoValidationError::EmptyCategory);
            }
        }
        if let Some(tags) = self.tags.as_ref() {
            normalize_tags(tags)?;
        }
        Ok(())
    }
}

// A present-but-null JSON field must become `Some(None)` rather than `None`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Todo {
    /// Builds a new record from creation input.
    ///
    /// # Invariants
    /// - `created_at == updated_at == now`.
    /// - Blank category falls back to `default_category`.
    pub fn create(
        owner: OwnerId,
        input: NewTodo,
        default_category: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, TodoValidationError> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(TodoValidationError::EmptyContent);
        }

        let category = input
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_category)
            .to_string();
        if category.is_empty() {
            return Err(TodoValidationError::EmptyCategory);
        }

        let status = input.status.unwrap_or_default();
        let todo = Self {
            id: Uuid::new_v4(),
            owner,
            content,
            description: normalize_optional_text(input.description),
            status,
            archived: false,
            priority: input.priority.unwrap_or_default(),
            category,
            tags: normalize_tags(&input.tags)?,
            assigned_to: normalize_optional_text(input.assigned_to),
            due_date: input.due_date,
            due_time: input.due_time,
            created_at: now,
            updated_at: now,
            completed_at: (status == TodoStatus::Completed).then_some(now),
            source: input.source.unwrap_or_default(),
        };
        todo.validate()?;
        Ok(todo)
    }

    /// Validates record-level invariants.
    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if self.content.trim().is_empty() {
            return Err(TodoValidationError::EmptyContent);
        }
        if self.owner.as_str().trim().is_empty() {
            return Err(TodoValidationError::EmptyOwner);
        }
        if self.category.trim().is_empty() {
            return Err(TodoValidationError::EmptyCategory);
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(TodoValidationError::EmptyTag);
        }
        if self.updated_at < self.created_at {
            return Err(TodoValidationError::UpdatedBeforeCreated);
        }
        if self.completed_at.is_some() != (self.status == TodoStatus::Completed) {
            return Err(TodoValidationError::CompletedAtMismatch);
        }
        Ok(())
    }

    /// Merges `patch` into this record.
    ///
    /// Returns `Ok(true)` when any field changed; in that case `updated_at`
    /// is advanced to `now` (never moved backwards). A patch that changes
    /// nothing leaves the record untouched.
    pub fn apply_patch(
        &mut self,
        patch: &TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, TodoValidationError> {
        patch.validate()?;
        let before = self.clone();

        if let Some(content) = patch.content.as_deref() {
            self.content = content.trim().to_string();
        }
        if let Some(description) = patch.description.as_ref() {
            self.description = normalize_optional_text(description.clone());
        }
        if let Some(status) = patch.status {
            self.set_status(status, now);
        }
        if let Some(archived) = patch.archived {
            self.archived = archived;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(category) = patch.category.as_deref() {
            self.category = category.trim().to_string();
        }
        if let Some(tags) = patch.tags.as_ref() {
            self.tags = normalize_tags(tags)?;
        }
        if let Some(assigned_to) = patch.assigned_to.as_ref() {
            self.assigned_to = normalize_optional_text(assigned_to.clone());
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(due_time) = patch.due_time {
            self.due_time = due_time;
        }
        if let Some(source) = patch.source {
            self.source = source;
        }

        if *self == before {
            return Ok(false);
        }
        self.touch(now);
        Ok(true)
    }

    /// Sets workflow status and keeps `completed_at` in sync.
    pub fn set_status(&mut self, status: TodoStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.completed_at = (status == TodoStatus::Completed).then_some(now.max(self.created_at));
    }

    /// Advances `updated_at` monotonically.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at);
    }

    pub fn is_open(&self) -> bool {
        self.status != TodoStatus::Completed
    }

    /// Due instant strictly before `now` and not completed.
    ///
    /// Date-only todos are compared by calendar day; a todo due today without
    /// a time is not overdue yet.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if !self.is_open() {
            return false;
        }
        let today = now.date_naive();
        match (self.due_date, self.due_time) {
            (Some(date), _) if date < today => true,
            (Some(date), Some(time)) if date == today => time < now.time(),
            _ => false,
        }
    }

    pub fn is_due_today(&self, today: NaiveDate) -> bool {
        self.due_date == Some(today)
    }

    /// Case-insensitive substring match over content, description and tags.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.content.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(needle))
            || self.tags.iter().any(|tag| tag.contains(needle))
    }
}

/// Normalizes one tag: trimmed and lowercase. Returns `None` for blank input.
pub fn normalize_tag(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Normalizes a tag list into a deduplicated set; blank tags are rejected.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Result<BTreeSet<String>, TodoValidationError> {
    tags.iter()
        .map(|tag| normalize_tag(tag.as_ref()).ok_or(TodoValidationError::EmptyTag))
        .collect()
}

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
