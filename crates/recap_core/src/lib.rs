pub mod board;
pub mod domain;
pub mod estimate;
pub mod metrics;
pub mod ports;
pub mod session;

#[cfg(test)]
mod testing;

pub use board::{BoardColumns, TaskBoard, TaskDraft};
pub use domain::{
    ActionItem, Decision, EmailDraft, Insight, InsightRecord, MetricKind, NewInsight, NewTask,
    NewTranscript, Priority, Session, SessionSnapshot, Task, TaskPatch, TaskStatus,
    TranscriptRecord, UserMetrics,
};
pub use estimate::{estimate_time_saved, TimeSaved};
pub use metrics::MetricsAggregator;
pub use ports::{
    InsightExtractionService, PortError, PortResult, RemoteStoreService, SessionCacheService,
    SpeechService,
};
pub use session::{AnalyzeOutcome, SessionPhase, SessionReconciler, SessionView};
