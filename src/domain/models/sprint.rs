//! Sprint issue and sprint state value types, including the bounded timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    Trivial,
    Minor,
    Major,
    Critical,
    Blocker,
    Unknown,
}

impl IssuePriority {
    pub fn score(&self) -> f32 {
        match self {
            Self::Blocker => 100.0,
            Self::Critical => 80.0,
            Self::Major => 50.0,
            Self::Minor => 20.0,
            Self::Trivial => 10.0,
            Self::Unknown => 30.0,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "blocker" => Self::Blocker,
            "critical" => Self::Critical,
            "major" => Self::Major,
            "minor" => Self::Minor,
            "trivial" => Self::Trivial,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    InProgress,
    Blocked,
    Completed,
}

/// A single append-only timeline entry on a [`SprintIssue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl TimelineEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Maximum number of entries kept in an issue's timeline; older entries are
/// trimmed on write.
pub const TIMELINE_MAX_LEN: usize = 50;

/// `refresh_from_tracker` must preserve the overlay fields below (`approval_status`,
/// `waiting_reason`, `chat_id`, `timeline`) across re-fetches from the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintIssue {
    pub key: String,
    pub title: String,
    pub description: String,
    pub jira_status: String,
    pub priority: IssuePriority,
    #[serde(rename = "type", default)]
    pub issue_type: String,
    #[serde(default)]
    pub story_points: Option<f32>,
    #[serde(default)]
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Overlay fields: owned by this system, never clobbered by a tracker refresh.
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub waiting_reason: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default)]
    pub priority_reasoning: Vec<String>,
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl SprintIssue {
    pub fn new(key: impl Into<String>, title: impl Into<String>, jira_status: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            title: title.into(),
            description: String::new(),
            jira_status: jira_status.into(),
            priority: IssuePriority::Unknown,
            issue_type: String::new(),
            story_points: None,
            assignee: None,
            created_at: now,
            updated_at: now,
            approval_status: ApprovalStatus::Pending,
            waiting_reason: None,
            chat_id: None,
            timeline: Vec::new(),
            priority_reasoning: Vec::new(),
        }
    }

    /// Append a timeline event, trimming the oldest entries once the list
    /// exceeds [`TIMELINE_MAX_LEN`].
    pub fn push_timeline(&mut self, event: TimelineEvent) {
        self.timeline.push(event);
        if self.timeline.len() > TIMELINE_MAX_LEN {
            let overflow = self.timeline.len() - TIMELINE_MAX_LEN;
            self.timeline.drain(0..overflow);
        }
    }

    pub fn carry_overlay_from(&mut self, previous: &SprintIssue) {
        self.approval_status = previous.approval_status;
        self.waiting_reason = previous.waiting_reason.clone();
        self.chat_id = previous.chat_id.clone();
        self.timeline = previous.timeline.clone();
    }

    /// Independent of `approval_status`.
    pub fn is_actionable(&self, actionable_statuses: &[String]) -> bool {
        let lowered = self.jira_status.to_lowercase();
        actionable_statuses.iter().any(|s| s.to_lowercase() == lowered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintState {
    pub sprint_id: String,
    pub sprint_name: String,
    pub issues: Vec<SprintIssue>,
    #[serde(default)]
    pub automatic_mode: bool,
    #[serde(default)]
    pub manually_started: bool,
    #[serde(default)]
    pub background_tasks: bool,
    #[serde(default)]
    pub processing_issue: Option<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SprintState {
    pub fn new(sprint_id: impl Into<String>, sprint_name: impl Into<String>) -> Self {
        Self {
            sprint_id: sprint_id.into(),
            sprint_name: sprint_name.into(),
            issues: Vec::new(),
            automatic_mode: false,
            manually_started: false,
            background_tasks: false,
            processing_issue: None,
            last_updated: Utc::now(),
            extra: HashMap::new(),
        }
    }

    pub fn find_issue(&self, key: &str) -> Option<&SprintIssue> {
        self.issues.iter().find(|i| i.key == key)
    }

    pub fn find_issue_mut(&mut self, key: &str) -> Option<&mut SprintIssue> {
        self.issues.iter_mut().find(|i| i.key == key)
    }

    /// Rewrites a legacy `bot_enabled` field into `automatic_mode`/`manually_started`
    /// in place, for state files persisted before the split.
    pub fn migrate_legacy_bot_enabled(value: &mut serde_json::Value) {
        if let Some(obj) = value.as_object_mut() {
            if let Some(enabled) = obj.remove("bot_enabled") {
                let enabled = enabled.as_bool().unwrap_or(false);
                obj.entry("automatic_mode").or_insert(serde_json::Value::Bool(enabled));
                obj.entry("manually_started").or_insert(serde_json::Value::Bool(false));
            }
        }
    }
}
