//! crates/recap_core/src/testing.rs
//!
//! In-memory port implementations shared by the unit tests: a scriptable
//! remote store, a serializing session cache, and an analyzer whose results
//! and timing the tests control.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::domain::{
    ActionItem, Decision, EmailDraft, Insight, InsightRecord, MetricKind, NewInsight, NewTask,
    NewTranscript, Priority, Session, Task, TaskPatch, TaskStatus, TranscriptRecord, UserMetrics,
};
use crate::ports::{
    InsightExtractionService, PortError, PortResult, RemoteStoreService, SessionCacheService,
};

/// A fully assembled insight for tests that just need "a successful analysis".
pub fn sample_insight() -> Insight {
    Insight {
        meeting_title: "Q3 Roadmap Sync".to_string(),
        summary: "The team agreed on the Q3 priorities.".to_string(),
        decisions: vec![Decision {
            text: "Ship the beta by July".to_string(),
            made_by: "Dana".to_string(),
            timestamp: "00:12:40".to_string(),
        }],
        action_items: vec![
            ActionItem {
                id: 1,
                task: "Draft the beta announcement".to_string(),
                owner: "Sam".to_string(),
                due: "2024-07-01".to_string(),
                priority: Priority::High,
                context: "Needed before the launch email".to_string(),
                confidence: 0.92,
            },
            ActionItem {
                id: 2,
                task: "Set up the feedback form".to_string(),
                owner: "Priya".to_string(),
                due: String::new(),
                priority: Priority::Medium,
                context: String::new(),
                confidence: 0.8,
            },
        ],
        follow_up_email: EmailDraft {
            subject: "Follow-up: Q3 Roadmap Sync".to_string(),
            body: "Hi all,\n\nSummary of what we agreed...".to_string(),
        },
    }
}

//=========================================================================================
// InMemoryStore
//=========================================================================================

/// An in-memory `RemoteStoreService`. Mirrors the persistence API's
/// behavior: task lists come back most-recent-first, metrics records are
/// lazily zero-created, and the task creation calls bump `tasks_created`
/// on the store side.
pub struct InMemoryStore {
    tasks: Mutex<Vec<Task>>,
    transcripts: Mutex<Vec<TranscriptRecord>>,
    insights: Mutex<Vec<InsightRecord>>,
    metrics: Mutex<HashMap<String, UserMetrics>>,
    staged_task_ids: Mutex<VecDeque<String>>,
    failures: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    metric_events: Mutex<Vec<(String, MetricKind, f64)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            transcripts: Mutex::new(Vec::new()),
            insights: Mutex::new(Vec::new()),
            metrics: Mutex::new(HashMap::new()),
            staged_task_ids: Mutex::new(VecDeque::new()),
            failures: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            metric_events: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next call to the named operation fail with `Unavailable`.
    pub fn fail_next(&self, operation: &str) {
        self.failures.lock().unwrap().push(operation.to_string());
    }

    /// Pre-assigns ids for upcoming task creations, oldest first.
    pub fn stage_task_ids<I: IntoIterator<Item = &'static str>>(&self, ids: I) {
        let mut staged = self.staged_task_ids.lock().unwrap();
        staged.extend(ids.into_iter().map(|s| s.to_string()));
    }

    /// Every explicit `increment_metric` call seen, in order.
    pub fn metric_events(&self) -> Vec<(String, MetricKind, f64)> {
        self.metric_events.lock().unwrap().clone()
    }

    pub fn stored_tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn stored_transcripts(&self) -> Vec<TranscriptRecord> {
        self.transcripts.lock().unwrap().clone()
    }

    pub fn stored_insights(&self) -> Vec<InsightRecord> {
        self.insights.lock().unwrap().clone()
    }

    pub fn metrics_for(&self, user_id: &str) -> UserMetrics {
        self.metrics
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserMetrics::zeroed(user_id))
    }

    fn take_failure(&self, operation: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|f| f == operation) {
            failures.remove(pos);
            true
        } else {
            false
        }
    }

    fn next_task_id(&self) -> String {
        if let Some(staged) = self.staged_task_ids.lock().unwrap().pop_front() {
            return staged;
        }
        format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn materialize(&self, new_task: NewTask) -> Task {
        Task {
            id: self.next_task_id(),
            user_id: new_task.user_id,
            title: new_task.title,
            description: new_task.description,
            status: new_task.status,
            priority: new_task.priority,
            assigned_to: new_task.assigned_to,
            due_date: new_task.due_date,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        }
    }

    fn bump_metric(&self, user_id: &str, kind: MetricKind, amount: f64) -> UserMetrics {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(user_id.to_string())
            .or_insert_with(|| UserMetrics::zeroed(user_id));
        match kind {
            MetricKind::TranscriptsAnalyzed => entry.transcripts_analyzed += amount as u64,
            MetricKind::InsightsGenerated => entry.insights_generated += amount as u64,
            MetricKind::HoursSaved => entry.hours_saved += amount,
            MetricKind::TasksCreated => entry.tasks_created += amount as u64,
        }
        entry.clone()
    }
}

#[async_trait]
impl RemoteStoreService for InMemoryStore {
    async fn create_task(&self, task: NewTask) -> PortResult<Task> {
        if self.take_failure("create_task") {
            return Err(PortError::Unavailable("create_task failed".to_string()));
        }
        let user_id = task.user_id.clone();
        let task = self.materialize(task);
        self.tasks.lock().unwrap().insert(0, task.clone());
        self.bump_metric(&user_id, MetricKind::TasksCreated, 1.0);
        Ok(task)
    }

    async fn create_tasks_bulk(&self, tasks: Vec<NewTask>, user_id: &str) -> PortResult<Vec<Task>> {
        if self.take_failure("create_tasks_bulk") {
            return Err(PortError::Unavailable("create_tasks_bulk failed".to_string()));
        }
        let created: Vec<Task> = tasks.into_iter().map(|t| self.materialize(t)).collect();
        {
            let mut stored = self.tasks.lock().unwrap();
            for task in &created {
                stored.insert(0, task.clone());
            }
        }
        self.bump_metric(user_id, MetricKind::TasksCreated, created.len() as f64);
        Ok(created)
    }

    async fn list_tasks_for_user(&self, user_id: &str) -> PortResult<Vec<Task>> {
        if self.take_failure("list_tasks_for_user") {
            return Err(PortError::Unavailable(
                "list_tasks_for_user failed".to_string(),
            ));
        }
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> PortResult<Task> {
        if self.take_failure("update_task") {
            return Err(PortError::Unavailable("update_task failed".to_string()));
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(assigned_to) = patch.assigned_to {
            task.assigned_to = assigned_to;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> PortResult<Task> {
        if self.take_failure("update_task_status") {
            return Err(PortError::Unavailable(
                "update_task_status failed".to_string(),
            ));
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;
        task.status = status;
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn delete_task(&self, task_id: &str) -> PortResult<()> {
        if self.take_failure("delete_task") {
            return Err(PortError::Unavailable("delete_task failed".to_string()));
        }
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() == before {
            return Err(PortError::NotFound(format!("Task {} not found", task_id)));
        }
        Ok(())
    }

    async fn create_transcript(&self, transcript: NewTranscript) -> PortResult<TranscriptRecord> {
        if self.take_failure("create_transcript") {
            return Err(PortError::Unavailable("create_transcript failed".to_string()));
        }
        let record = TranscriptRecord {
            id: format!("transcript-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            user_id: transcript.user_id,
            title: transcript.title,
            content: transcript.content,
            summary: transcript.summary,
            session: transcript.session,
            created_at: Some(Utc::now()),
        };
        self.transcripts.lock().unwrap().insert(0, record.clone());
        Ok(record)
    }

    async fn get_transcript(&self, transcript_id: &str) -> PortResult<TranscriptRecord> {
        if self.take_failure("get_transcript") {
            return Err(PortError::Unavailable("get_transcript failed".to_string()));
        }
        self.transcripts
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == transcript_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Transcript {} not found", transcript_id)))
    }

    async fn list_transcripts_for_user(&self, user_id: &str) -> PortResult<Vec<TranscriptRecord>> {
        if self.take_failure("list_transcripts_for_user") {
            return Err(PortError::Unavailable(
                "list_transcripts_for_user failed".to_string(),
            ));
        }
        let transcripts = self.transcripts.lock().unwrap();
        Ok(transcripts
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_insight(&self, insight: NewInsight) -> PortResult<InsightRecord> {
        if self.take_failure("create_insight") {
            return Err(PortError::Unavailable("create_insight failed".to_string()));
        }
        let record = InsightRecord {
            id: format!("insight-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            user_id: insight.user_id,
            transcript_id: insight.transcript_id,
            insight: insight.insight,
            created_at: Some(Utc::now()),
        };
        self.insights.lock().unwrap().insert(0, record.clone());
        Ok(record)
    }

    async fn list_insights_for_user(&self, user_id: &str) -> PortResult<Vec<InsightRecord>> {
        if self.take_failure("list_insights_for_user") {
            return Err(PortError::Unavailable(
                "list_insights_for_user failed".to_string(),
            ));
        }
        let insights = self.insights.lock().unwrap();
        Ok(insights
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_metrics(&self, user_id: &str) -> PortResult<UserMetrics> {
        if self.take_failure("get_metrics") {
            return Err(PortError::Unavailable("get_metrics failed".to_string()));
        }
        let mut metrics = self.metrics.lock().unwrap();
        Ok(metrics
            .entry(user_id.to_string())
            .or_insert_with(|| UserMetrics::zeroed(user_id))
            .clone())
    }

    async fn increment_metric(
        &self,
        user_id: &str,
        metric: MetricKind,
        amount: f64,
    ) -> PortResult<UserMetrics> {
        if self.take_failure("increment_metric") {
            return Err(PortError::Unavailable("increment_metric failed".to_string()));
        }
        self.metric_events
            .lock()
            .unwrap()
            .push((user_id.to_string(), metric, amount));
        Ok(self.bump_metric(user_id, metric, amount))
    }
}

//=========================================================================================
// InMemoryCache
//=========================================================================================

/// A `SessionCacheService` that stores serialized JSON per user, so the
/// round-trip exercises the same serialization the real cache uses.
pub struct InMemoryCache {
    rows: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.rows.lock().unwrap().contains_key(user_id)
    }
}

#[async_trait]
impl SessionCacheService for InMemoryCache {
    async fn save(&self, user_id: &str, session: &Session) -> PortResult<()> {
        let payload =
            serde_json::to_string(session).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.rows.lock().unwrap().insert(user_id.to_string(), payload);
        Ok(())
    }

    async fn load(&self, user_id: &str) -> PortResult<Option<Session>> {
        let rows = self.rows.lock().unwrap();
        match rows.get(user_id) {
            Some(payload) => {
                let session = serde_json::from_str(payload)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, user_id: &str) -> PortResult<()> {
        self.rows.lock().unwrap().remove(user_id);
        Ok(())
    }
}

//=========================================================================================
// ScriptedAnalyzer
//=========================================================================================

/// An `InsightExtractionService` that returns queued results. With a gate
/// attached, each call parks inside the analyzer until the test releases it,
/// which makes in-flight interleavings deterministic.
pub struct ScriptedAnalyzer {
    results: Mutex<VecDeque<PortResult<Insight>>>,
    calls: AtomicUsize,
    gate: Option<AnalyzerGate>,
}

#[derive(Clone)]
pub struct AnalyzerGate {
    entered: Arc<Semaphore>,
    release: Arc<Semaphore>,
}

impl AnalyzerGate {
    /// Waits until a call is parked inside the analyzer.
    pub async fn wait_entered(&self) {
        self.entered.acquire().await.unwrap().forget();
    }

    /// Lets one parked call proceed.
    pub fn release_one(&self) {
        self.release.add_permits(1);
    }
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Builds a gated analyzer plus the handle the test drives it with.
    pub fn gated() -> (Self, AnalyzerGate) {
        let gate = AnalyzerGate {
            entered: Arc::new(Semaphore::new(0)),
            release: Arc::new(Semaphore::new(0)),
        };
        let analyzer = Self {
            results: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: Some(gate.clone()),
        };
        (analyzer, gate)
    }

    pub fn push_success(&self, insight: Insight) {
        self.results.lock().unwrap().push_back(Ok(insight));
    }

    pub fn push_rejection(&self) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(PortError::AnalysisRejected));
    }

    pub fn push_failure(&self) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(PortError::Unavailable("analyzer down".to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InsightExtractionService for ScriptedAnalyzer {
    async fn extract_insight(
        &self,
        _transcript: &str,
        _user_hint: Option<&str>,
    ) -> PortResult<Insight> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.add_permits(1);
            gate.release.acquire().await.unwrap().forget();
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(sample_insight()))
    }
}
