//! Priority escalation rules used by the optimization action.
//!
//! # Responsibility
//! - Decide, for one open todo, whether its priority should be raised.
//! - Keep keyword lists and targets in configuration, not in code paths.
//!
//! # Invariants
//! - Escalation only ever raises priority.
//! - Completed and archived todos are never escalated.
//! - Keyword matching is a case-insensitive substring match on content.

use crate::model::todo::{Priority, Todo};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tunable inputs for `KeywordEscalationPolicy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EscalationConfig {
    pub urgent_keywords: Vec<String>,
    pub high_keywords: Vec<String>,
    /// Overdue todos that are not yet urgent become urgent.
    pub escalate_overdue: bool,
    /// Low-priority todos due today are raised to `due_today_target`.
    pub escalate_due_today: bool,
    pub due_today_target: Priority,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        let words = |items: &[&str]| items.iter().map(|item| item.to_string()).collect();
        Self {
            urgent_keywords: words(&["urgent", "asap", "emergency", "critical", "immediately"]),
            high_keywords: words(&["important", "deadline", "priority", "soon", "follow up"]),
            escalate_overdue: true,
            escalate_due_today: true,
            due_today_target: Priority::High,
        }
    }
}

/// Why a todo was escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "keyword", rename_all = "snake_case")]
pub enum EscalationReason {
    Overdue,
    DueToday,
    UrgentKeyword(String),
    HighKeyword(String),
}

impl Display for EscalationReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overdue => write!(f, "overdue"),
            Self::DueToday => write!(f, "due today"),
            Self::UrgentKeyword(keyword) => write!(f, "urgent keyword \"{keyword}\""),
            Self::HighKeyword(keyword) => write!(f, "high keyword \"{keyword}\""),
        }
    }
}

/// One proposed priority change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub from: Priority,
    pub to: Priority,
    pub reason: EscalationReason,
}

/// Decides whether a todo's priority should be raised.
pub trait EscalationPolicy {
    fn evaluate(&self, todo: &Todo, now: DateTime<Utc>) -> Option<Escalation>;
}

#[derive(Debug)]
pub enum PolicyError {
    InvalidKeywords(regex::Error),
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeywords(err) => write!(f, "invalid escalation keywords: {err}"),
        }
    }
}

impl Error for PolicyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidKeywords(err) => Some(err),
        }
    }
}

/// Date and keyword based escalation.
///
/// When several rules apply, the highest target wins; among equal targets the
/// first rule in `overdue, due today, urgent keyword, high keyword` order is
/// reported.
#[derive(Debug, Clone)]
pub struct KeywordEscalationPolicy {
    config: EscalationConfig,
    urgent_matcher: Option<Regex>,
    high_matcher: Option<Regex>,
}

impl KeywordEscalationPolicy {
    pub fn new(config: EscalationConfig) -> Result<Self, PolicyError> {
        let urgent_matcher = build_matcher(&config.urgent_keywords)?;
        let high_matcher = build_matcher(&config.high_keywords)?;
        Ok(Self {
            config,
            urgent_matcher,
            high_matcher,
        })
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    fn candidates(&self, todo: &Todo, now: DateTime<Utc>) -> Vec<(Priority, EscalationReason)> {
        let mut candidates = Vec::new();
        if self.config.escalate_overdue && todo.is_overdue(now) {
            candidates.push((Priority::Urgent, EscalationReason::Overdue));
        }
        if self.config.escalate_due_today
            && todo.priority == Priority::Low
            && todo.is_due_today(now.date_naive())
        {
            candidates.push((self.config.due_today_target, EscalationReason::DueToday));
        }
        if let Some(keyword) = find_keyword(self.urgent_matcher.as_ref(), &todo.content) {
            candidates.push((Priority::Urgent, EscalationReason::UrgentKeyword(keyword)));
        }
        if let Some(keyword) = find_keyword(self.high_matcher.as_ref(), &todo.content) {
            candidates.push((Priority::High, EscalationReason::HighKeyword(keyword)));
        }
        candidates
    }
}

impl Default for KeywordEscalationPolicy {
    fn default() -> Self {
        let config = EscalationConfig::default();
        Self {
            urgent_matcher: build_matcher(&config.urgent_keywords).ok().flatten(),
            high_matcher: build_matcher(&config.high_keywords).ok().flatten(),
            config,
        }
    }
}

impl EscalationPolicy for KeywordEscalationPolicy {
    fn evaluate(&self, todo: &Todo, now: DateTime<Utc>) -> Option<Escalation> {
        if !todo.is_open() || todo.archived {
            return None;
        }

        let mut best: Option<(Priority, EscalationReason)> = None;
        for (target, reason) in self.candidates(todo, now) {
            if target <= todo.priority {
                continue;
            }
            if best.as_ref().map_or(true, |(current, _)| target > *current) {
                best = Some((target, reason));
            }
        }

        best.map(|(to, reason)| Escalation {
            from: todo.priority,
            to,
            reason,
        })
    }
}

fn build_matcher(keywords: &[String]) -> Result<Option<Regex>, PolicyError> {
    let escaped: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&format!("(?:{})", escaped.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(PolicyError::InvalidKeywords)
}

fn find_keyword(matcher: Option<&Regex>, text: &str) -> Option<String> {
    matcher
        .and_then(|matcher| matcher.find(text))
        .map(|found| found.as_str().to_lowercase())
}
