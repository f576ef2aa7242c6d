//! services/engine/src/adapters/store.rs
//!
//! This module contains the remote store gateway, which is the concrete
//! implementation of the `RemoteStoreService` port from the `core` crate.
//! It talks HTTP to the persistence API that fronts the document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recap_core::domain::{
    Insight, InsightRecord, MetricKind, NewInsight, NewTask, NewTranscript, Priority,
    SessionSnapshot, Task, TaskPatch, TaskStatus, TranscriptRecord, UserMetrics,
};
use recap_core::ports::{PortError, PortResult, RemoteStoreService};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A gateway adapter that implements the `RemoteStoreService` port over the
/// persistence API's REST surface.
#[derive(Clone)]
pub struct HttpStoreAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStoreAdapter {
    /// Creates a new `HttpStoreAdapter` rooted at the store's base URL
    /// (without the `/api` prefix).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }
}

//=========================================================================================
// "Impure" Wire Document Structs
//=========================================================================================

// The store keys documents by `_id` and mirrors it to `id` on some routes.
// Both fields are read and whichever is present wins.

#[derive(Deserialize)]
struct TaskDoc {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    user_id: String,
    title: String,
    #[serde(default)]
    description: String,
    status: TaskStatus,
    priority: Priority,
    #[serde(default)]
    assigned_to: String,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl TaskDoc {
    fn to_domain(self) -> Task {
        Task {
            id: self.id.or(self.mongo_id).unwrap_or_default(),
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            assigned_to: self.assigned_to,
            due_date: self.due_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct TranscriptDoc {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    user_id: String,
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    session_state: Option<SessionSnapshot>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl TranscriptDoc {
    fn to_domain(self) -> TranscriptRecord {
        TranscriptRecord {
            id: self.id.or(self.mongo_id).unwrap_or_default(),
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            summary: self.summary,
            session: self.session_state,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
struct InsightDoc {
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    user_id: String,
    transcript_id: String,
    #[serde(flatten)]
    insight: Insight,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl InsightDoc {
    fn to_domain(self) -> InsightRecord {
        InsightRecord {
            id: self.id.or(self.mongo_id).unwrap_or_default(),
            user_id: self.user_id,
            transcript_id: self.transcript_id,
            insight: self.insight,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
struct MetricsDoc {
    user_id: String,
    #[serde(default)]
    transcripts_analyzed: u64,
    #[serde(default, rename = "ai_insights_generated")]
    insights_generated: u64,
    #[serde(default)]
    hours_saved: f64,
    #[serde(default)]
    tasks_created: u64,
}

impl MetricsDoc {
    fn to_domain(self) -> UserMetrics {
        UserMetrics {
            user_id: self.user_id,
            transcripts_analyzed: self.transcripts_analyzed,
            insights_generated: self.insights_generated,
            hours_saved: self.hours_saved,
            tasks_created: self.tasks_created,
        }
    }
}

//=========================================================================================
// Request Body Structs
//=========================================================================================

// The store's mutation routes use camelCase for the ad-hoc body fields and
// snake_case inside documents, so the bodies are spelled out here rather
// than serializing domain types straight onto the wire.

#[derive(Serialize)]
struct BulkTasksBody<'a> {
    tasks: &'a [NewTask],
    #[serde(rename = "userId")]
    user_id: &'a str,
}

#[derive(Serialize)]
struct StatusBody {
    status: TaskStatus,
}

#[derive(Serialize)]
struct NewTranscriptBody<'a> {
    user_id: &'a str,
    title: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_state: Option<&'a SessionSnapshot>,
}

#[derive(Serialize)]
struct NewInsightBody<'a> {
    user_id: &'a str,
    transcript_id: &'a str,
    #[serde(flatten)]
    insight: &'a Insight,
}

#[derive(Serialize)]
struct IncrementBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    metric: &'static str,
    amount: f64,
}

#[derive(Serialize)]
struct HoursBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    hours: f64,
}

//=========================================================================================
// `RemoteStoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteStoreService for HttpStoreAdapter {
    async fn create_task(&self, task: NewTask) -> PortResult<Task> {
        // The with-metrics route creates the task and bumps `tasks_created`
        // in the same request, which is what keeps that counter exact.
        let response = self
            .http
            .post(self.url("/tasks/with-metrics"))
            .json(&task)
            .send()
            .await
            .map_err(transport_error)?;
        let doc: TaskDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn create_tasks_bulk(&self, tasks: Vec<NewTask>, user_id: &str) -> PortResult<Vec<Task>> {
        let body = BulkTasksBody {
            tasks: &tasks,
            user_id,
        };
        let response = self
            .http
            .post(self.url("/tasks/bulk"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let docs: Vec<TaskDoc> = parse(response).await?;
        Ok(docs.into_iter().map(TaskDoc::to_domain).collect())
    }

    async fn list_tasks_for_user(&self, user_id: &str) -> PortResult<Vec<Task>> {
        let response = self
            .http
            .get(self.url(&format!("/tasks/user/{}", user_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let docs: Vec<TaskDoc> = parse(response).await?;
        Ok(docs.into_iter().map(TaskDoc::to_domain).collect())
    }

    async fn update_task(&self, task_id: &str, patch: TaskPatch) -> PortResult<Task> {
        let response = self
            .http
            .put(self.url(&format!("/tasks/{}", task_id)))
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        let doc: TaskDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> PortResult<Task> {
        let response = self
            .http
            .patch(self.url(&format!("/tasks/{}/status", task_id)))
            .json(&StatusBody { status })
            .send()
            .await
            .map_err(transport_error)?;
        let doc: TaskDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn delete_task(&self, task_id: &str) -> PortResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/tasks/{}", task_id)))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    async fn create_transcript(&self, transcript: NewTranscript) -> PortResult<TranscriptRecord> {
        let body = NewTranscriptBody {
            user_id: &transcript.user_id,
            title: &transcript.title,
            content: &transcript.content,
            summary: transcript.summary.as_deref(),
            session_state: transcript.session.as_ref(),
        };
        let response = self
            .http
            .post(self.url("/transcripts"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let doc: TranscriptDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn get_transcript(&self, transcript_id: &str) -> PortResult<TranscriptRecord> {
        let response = self
            .http
            .get(self.url(&format!("/transcripts/{}", transcript_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let doc: TranscriptDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn list_transcripts_for_user(&self, user_id: &str) -> PortResult<Vec<TranscriptRecord>> {
        let response = self
            .http
            .get(self.url(&format!("/transcripts/user/{}", user_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let docs: Vec<TranscriptDoc> = parse(response).await?;
        Ok(docs.into_iter().map(TranscriptDoc::to_domain).collect())
    }

    async fn create_insight(&self, insight: NewInsight) -> PortResult<InsightRecord> {
        let body = NewInsightBody {
            user_id: &insight.user_id,
            transcript_id: &insight.transcript_id,
            insight: &insight.insight,
        };
        let response = self
            .http
            .post(self.url("/insights"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let doc: InsightDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn list_insights_for_user(&self, user_id: &str) -> PortResult<Vec<InsightRecord>> {
        let response = self
            .http
            .get(self.url(&format!("/insights/user/{}", user_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let docs: Vec<InsightDoc> = parse(response).await?;
        Ok(docs.into_iter().map(InsightDoc::to_domain).collect())
    }

    async fn get_metrics(&self, user_id: &str) -> PortResult<UserMetrics> {
        // The store lazily creates a zeroed record on first read.
        let response = self
            .http
            .get(self.url(&format!("/metrics/user/{}", user_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let doc: MetricsDoc = parse(response).await?;
        Ok(doc.to_domain())
    }

    async fn increment_metric(
        &self,
        user_id: &str,
        metric: MetricKind,
        amount: f64,
    ) -> PortResult<UserMetrics> {
        // Hours have their own route; the other counters share the generic
        // increment route. Both add to the stored value and return the
        // updated totals.
        let response = match metric {
            MetricKind::HoursSaved => {
                self.http
                    .post(self.url("/metrics/hours"))
                    .json(&HoursBody {
                        user_id,
                        hours: amount,
                    })
                    .send()
                    .await
            }
            _ => {
                self.http
                    .post(self.url("/metrics/increment"))
                    .json(&IncrementBody {
                        user_id,
                        metric: metric_wire_name(metric),
                        amount,
                    })
                    .send()
                    .await
            }
        }
        .map_err(transport_error)?;
        let doc: MetricsDoc = parse(response).await?;
        Ok(doc.to_domain())
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// The counter names the store's increment route understands. The insight
/// counter keeps its historical `ai_` prefix on the wire.
fn metric_wire_name(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::TranscriptsAnalyzed => "transcripts_analyzed",
        MetricKind::InsightsGenerated => "ai_insights_generated",
        MetricKind::HoursSaved => "hours_saved",
        MetricKind::TasksCreated => "tasks_created",
    }
}

/// Checks the response status and deserializes the body.
async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Unexpected(format!("Malformed store response: {}", e)))
}

/// The store's error envelope.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Maps an HTTP error response from the store to a `PortError`.
async fn error_from_response(response: reqwest::Response) -> PortError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    match status {
        StatusCode::BAD_REQUEST => PortError::Validation(message),
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        StatusCode::CONFLICT => PortError::Conflict(message),
        _ => PortError::Unexpected(format!("Store returned {}: {}", status, message)),
    }
}

/// Maps a transport-level failure to a `PortError`.
fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_connect() || e.is_timeout() {
        PortError::Unavailable(format!("Store unreachable: {}", e))
    } else {
        PortError::Unexpected(e.to_string())
    }
}
