//! crates/recap_core/src/ports.rs
//!
//! The service contracts (traits) the core logic is written against.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! persistence API, the local cache, or the LLM providers.

use async_trait::async_trait;

use crate::domain::{
    Insight, InsightRecord, MetricKind, NewInsight, NewTask, NewTranscript, Session, Task,
    TaskPatch, TaskStatus, TranscriptRecord, UserMetrics,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The one error type every port operation returns.
///
/// Each variant is a category the core logic branches on; the adapters are
/// responsible for normalizing provider-specific failures into one of these.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The input was rejected before or by the remote side (empty transcript,
    /// empty title, over-long speech text, HTTP 400).
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The remote store or a provider could not be reached, or answered with
    /// a server-side failure. Retrying is the caller's decision.
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
    /// State moved underneath the caller (HTTP 409, or an operation rejected
    /// because an analysis is already in flight).
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The analyzer decided the submitted text is not a meeting transcript.
    #[error("The submitted text does not look like a meeting transcript")]
    AnalysisRejected,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// Shorthand for `Result<T, PortError>`, used throughout the ports.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The gateway to the persistence API. This is the only port that performs
/// persistence network I/O; everything it returns is already validated into
/// domain types.
#[async_trait]
pub trait RemoteStoreService: Send + Sync {
    // --- Tasks ---

    /// Creates a task and counts it toward the user's `tasks_created` metric
    /// in the same remote operation.
    async fn create_task(&self, task: NewTask) -> PortResult<Task>;

    /// Creates a batch of tasks in one call. On success the store also
    /// increments `tasks_created` by the number created.
    async fn create_tasks_bulk(&self, tasks: Vec<NewTask>, user_id: &str) -> PortResult<Vec<Task>>;

    /// Lists a user's tasks in the store's sort order (most recent first).
    async fn list_tasks_for_user(&self, user_id: &str) -> PortResult<Vec<Task>>;

    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> PortResult<Task>;

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> PortResult<Task>;

    /// Deletes a task. A missing task is reported as `NotFound`, distinct
    /// from success; the caller decides how to treat it.
    async fn delete_task(&self, task_id: &str) -> PortResult<()>;

    // --- Transcripts and Insights ---

    async fn create_transcript(&self, transcript: NewTranscript) -> PortResult<TranscriptRecord>;

    async fn get_transcript(&self, transcript_id: &str) -> PortResult<TranscriptRecord>;

    async fn list_transcripts_for_user(&self, user_id: &str) -> PortResult<Vec<TranscriptRecord>>;

    async fn create_insight(&self, insight: NewInsight) -> PortResult<InsightRecord>;

    async fn list_insights_for_user(&self, user_id: &str) -> PortResult<Vec<InsightRecord>>;

    // --- Metrics ---

    /// Fetches a user's metrics. A user with no record yet gets a zeroed one.
    async fn get_metrics(&self, user_id: &str) -> PortResult<UserMetrics>;

    /// Atomically adds `amount` to one counter and returns the new totals.
    async fn increment_metric(
        &self,
        user_id: &str,
        metric: MetricKind,
        amount: f64,
    ) -> PortResult<UserMetrics>;
}

/// Durable, local-only storage for the latest session of each user. Never
/// touches the remote store.
#[async_trait]
pub trait SessionCacheService: Send + Sync {
    /// Persists the session, overwriting any previous one for this user.
    async fn save(&self, user_id: &str, session: &Session) -> PortResult<()>;

    async fn load(&self, user_id: &str) -> PortResult<Option<Session>>;

    /// Removes the cached session. Clearing an absent entry is a no-op.
    async fn clear(&self, user_id: &str) -> PortResult<()>;
}

/// The LLM analysis provider: transcript text in, structured insight out.
#[async_trait]
pub trait InsightExtractionService: Send + Sync {
    /// Analyzes a transcript. `user_hint` is the display name or email the
    /// generated follow-up email should be signed with, when known.
    ///
    /// Returns `PortError::AnalysisRejected` when the provider decides the
    /// text is not a meeting transcript.
    async fn extract_insight(&self, transcript: &str, user_hint: Option<&str>)
        -> PortResult<Insight>;
}

/// The text-to-speech provider.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Synthesizes speech for the given text and returns the encoded audio.
    async fn synthesize(&self, text: &str) -> PortResult<Vec<u8>>;
}
