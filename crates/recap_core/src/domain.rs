//! crates/recap_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or storage format; field
//! names follow the persistence API's snake_case so the wire mapping in the
//! adapters stays mechanical.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The status of a task on the board.
///
/// `Pending` is a legacy value still present in older stored tasks. It is
/// read as `Todo` everywhere (see `normalized`) and never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Pending,
}

impl TaskStatus {
    /// Collapses the legacy `Pending` alias into `Todo` for display grouping.
    pub fn normalized(self) -> TaskStatus {
        match self {
            TaskStatus::Pending => TaskStatus::Todo,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A task as stored by the persistence API, with its remote-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: String,
    pub due_date: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The fields needed to create a task. The id is assigned remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: String,
    pub due_date: Option<String>,
}

/// A partial update to an existing task. `None` fields are left untouched,
/// and are omitted from the serialized form so the store never sees them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

/// A decision extracted from a transcript. Free-form text with attribution;
/// decisions have no identity beyond their position in the insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub text: String,
    pub made_by: String,
    pub timestamp: String,
}

/// An action item extracted from a transcript. The `id` is only unique
/// within its insight; promoting an action item to a task copies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: u32,
    pub task: String,
    pub owner: String,
    pub due: String,
    pub priority: Priority,
    pub context: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// The structured result of one transcript analysis. Immutable once
/// produced; a re-analysis replaces the whole insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub meeting_title: String,
    pub summary: String,
    pub decisions: Vec<Decision>,
    pub action_items: Vec<ActionItem>,
    pub follow_up_email: EmailDraft,
}

/// One user's working session: the transcript text, the extracted insight
/// (absent until the first successful analysis), and the editable follow-up
/// email draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub transcript: String,
    pub insight: Option<Insight>,
    pub email_draft: String,
    pub saved_at: DateTime<Utc>,
}

/// The serializable part of a session embedded in a stored transcript, so a
/// past session can be resumed on another device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub insight: Insight,
    pub email_draft: String,
}

/// A transcript persisted through the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub session: Option<SessionSnapshot>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTranscript {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub session: Option<SessionSnapshot>,
}

/// An insight persisted through the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: String,
    pub user_id: String,
    pub transcript_id: String,
    pub insight: Insight,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInsight {
    pub user_id: String,
    pub transcript_id: String,
    pub insight: Insight,
}

/// Per-user derived counters. Cumulative: values only ever grow, and every
/// increment corresponds to exactly one committed remote mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: String,
    pub transcripts_analyzed: u64,
    pub insights_generated: u64,
    pub hours_saved: f64,
    pub tasks_created: u64,
}

impl UserMetrics {
    /// The zero record a user starts from before anything is persisted.
    pub fn zeroed(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            transcripts_analyzed: 0,
            insights_generated: 0,
            hours_saved: 0.0,
            tasks_created: 0,
        }
    }
}

/// The counters the store knows how to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TranscriptsAnalyzed,
    InsightsGenerated,
    HoursSaved,
    TasksCreated,
}
