//! services/engine/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::middleware::UserId;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use recap_core::board::TaskDraft;
use recap_core::domain::{ActionItem, Insight, Priority, Task, TaskPatch, TaskStatus};
use recap_core::ports::PortError;
use recap_core::session::SessionView;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_session_handler,
        analyze_session_handler,
        update_transcript_handler,
        update_draft_handler,
        reset_session_handler,
        promote_handler,
        resume_session_handler,
        get_board_handler,
        load_board_handler,
        create_task_handler,
        update_task_handler,
        update_task_status_handler,
        delete_task_handler,
        get_metrics_handler,
        get_history_handler,
        speak_handler,
        current_speech_handler,
        health_handler,
    ),
    components(
        schemas(
            SessionEnvelope,
            SessionPayload,
            InsightPayload,
            DecisionPayload,
            ActionItemPayload,
            EmailPayload,
            TaskPayload,
            BoardPayload,
            MetricsPayload,
            TranscriptPayload,
            InsightSummaryPayload,
            HistoryPayload,
            MessageResponse,
            HealthResponse,
            AnalyzeRequest,
            TranscriptRequest,
            DraftRequest,
            PromoteRequest,
            ResumeRequest,
            CreateTaskRequest,
            UpdateTaskRequest,
            StatusRequest,
            SpeechRequest,
        )
    ),
    tags(
        (name = "Recap Engine API", description = "API endpoints for the meeting recap engine.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The session and the lifecycle phase it is in.
#[derive(Serialize, ToSchema)]
pub struct SessionEnvelope {
    /// One of `empty`, `analyzing`, `ready`, or `editing`.
    phase: String,
    session: Option<SessionPayload>,
}

impl SessionEnvelope {
    fn from_view(view: SessionView) -> Self {
        Self {
            phase: view.phase.as_str().to_string(),
            session: view.session.map(SessionPayload::from),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionPayload {
    transcript: String,
    insight: Option<InsightPayload>,
    email_draft: String,
    saved_at: DateTime<Utc>,
}

impl From<recap_core::domain::Session> for SessionPayload {
    fn from(session: recap_core::domain::Session) -> Self {
        Self {
            transcript: session.transcript,
            insight: session.insight.map(InsightPayload::from),
            email_draft: session.email_draft,
            saved_at: session.saved_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct InsightPayload {
    meeting_title: String,
    summary: String,
    decisions: Vec<DecisionPayload>,
    action_items: Vec<ActionItemPayload>,
    follow_up_email: EmailPayload,
}

impl From<Insight> for InsightPayload {
    fn from(insight: Insight) -> Self {
        Self {
            meeting_title: insight.meeting_title,
            summary: insight.summary,
            decisions: insight
                .decisions
                .into_iter()
                .map(|d| DecisionPayload {
                    text: d.text,
                    made_by: d.made_by,
                    timestamp: d.timestamp,
                })
                .collect(),
            action_items: insight
                .action_items
                .into_iter()
                .map(|item| ActionItemPayload {
                    id: item.id,
                    task: item.task,
                    owner: item.owner,
                    due: item.due,
                    priority: priority_label(item.priority).to_string(),
                    context: item.context,
                    confidence: item.confidence,
                })
                .collect(),
            follow_up_email: EmailPayload {
                subject: insight.follow_up_email.subject,
                body: insight.follow_up_email.body,
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DecisionPayload {
    text: String,
    made_by: String,
    timestamp: String,
}

#[derive(Serialize, ToSchema)]
pub struct ActionItemPayload {
    id: u32,
    task: String,
    owner: String,
    due: String,
    priority: String,
    context: String,
    confidence: f64,
}

#[derive(Serialize, ToSchema)]
pub struct EmailPayload {
    subject: String,
    body: String,
}

/// A task as the board displays it. The legacy `pending` status always
/// reads as `todo` here.
#[derive(Serialize, ToSchema)]
pub struct TaskPayload {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    assigned_to: String,
    due_date: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<Task> for TaskPayload {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: status_label(task.status).to_string(),
            priority: priority_label(task.priority).to_string(),
            assigned_to: task.assigned_to,
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BoardPayload {
    todo: Vec<TaskPayload>,
    in_progress: Vec<TaskPayload>,
    done: Vec<TaskPayload>,
}

impl From<recap_core::board::BoardColumns> for BoardPayload {
    fn from(columns: recap_core::board::BoardColumns) -> Self {
        Self {
            todo: columns.todo.into_iter().map(TaskPayload::from).collect(),
            in_progress: columns
                .in_progress
                .into_iter()
                .map(TaskPayload::from)
                .collect(),
            done: columns.done.into_iter().map(TaskPayload::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MetricsPayload {
    user_id: String,
    transcripts_analyzed: u64,
    insights_generated: u64,
    hours_saved: f64,
    tasks_created: u64,
}

impl From<recap_core::domain::UserMetrics> for MetricsPayload {
    fn from(metrics: recap_core::domain::UserMetrics) -> Self {
        Self {
            user_id: metrics.user_id,
            transcripts_analyzed: metrics.transcripts_analyzed,
            insights_generated: metrics.insights_generated,
            hours_saved: metrics.hours_saved,
            tasks_created: metrics.tasks_created,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TranscriptPayload {
    id: String,
    title: String,
    summary: Option<String>,
    content: String,
    /// Whether the transcript carries a session snapshot that can be resumed.
    resumable: bool,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct InsightSummaryPayload {
    id: String,
    transcript_id: String,
    meeting_title: String,
    summary: String,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryPayload {
    transcripts: Vec<TranscriptPayload>,
    insights: Vec<InsightSummaryPayload>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

//=========================================================================================
// API Request Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// The raw meeting transcript to analyze.
    transcript: String,
    /// The user's display name, used to sign the generated follow-up email.
    #[serde(default)]
    user_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct TranscriptRequest {
    text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DraftRequest {
    body: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PromoteRequest {
    /// The action item ids to promote. Omit to promote all of them.
    #[serde(default)]
    action_item_ids: Option<Vec<u32>>,
}

#[derive(Deserialize, ToSchema)]
pub struct ResumeRequest {
    transcript_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    /// One of `low`, `medium`, or `high`. Defaults to `medium`.
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusRequest {
    /// One of `todo`, `in_progress`, or `done`. The legacy `pending` is
    /// accepted and stored as `todo`.
    status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SpeechRequest {
    text: String,
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Get the current session and its phase.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "The current session", body = SessionEnvelope)
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    let view = engine.reconciler.view().await;
    Ok(Json(SessionEnvelope::from_view(view)))
}

/// Analyze a transcript and install the resulting session.
///
/// At most one analysis runs per user at a time; a second submit while one
/// is in flight is rejected with 409.
#[utoipa::path(
    post,
    path = "/api/session/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "The session after the analysis", body = SessionEnvelope),
        (status = 400, description = "The transcript was empty"),
        (status = 409, description = "An analysis is already in progress"),
        (status = 422, description = "The text was not recognized as a meeting transcript"),
        (status = 502, description = "The analyzer was unavailable")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn analyze_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine
        .reconciler
        .analyze(request.transcript, request.user_name)
        .await
    {
        Ok(_) => {
            // Covers both outcomes: a completed analysis reads as ready, a
            // discarded one as empty.
            let view = engine.reconciler.view().await;
            Ok(Json(SessionEnvelope::from_view(view)))
        }
        Err(e) => {
            error!("Analysis failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Update the working transcript before analysis.
#[utoipa::path(
    put,
    path = "/api/session/transcript",
    request_body = TranscriptRequest,
    responses(
        (status = 200, description = "The updated session", body = SessionEnvelope),
        (status = 409, description = "The session already has an insight or an analysis is running")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn update_transcript_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<TranscriptRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.reconciler.set_transcript(request.text).await {
        Ok(_) => {
            let view = engine.reconciler.view().await;
            Ok(Json(SessionEnvelope::from_view(view)))
        }
        Err(e) => {
            error!("Transcript update failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Edit the follow-up email draft.
#[utoipa::path(
    put,
    path = "/api/session/draft",
    request_body = DraftRequest,
    responses(
        (status = 200, description = "The updated session", body = SessionEnvelope),
        (status = 400, description = "There is no insight to draft an email for")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn update_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<DraftRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.reconciler.update_draft(request.body).await {
        Ok(_) => {
            let view = engine.reconciler.view().await;
            Ok(Json(SessionEnvelope::from_view(view)))
        }
        Err(e) => {
            error!("Draft update failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Discard the session and clear its cache entry.
#[utoipa::path(
    delete,
    path = "/api/session",
    responses(
        (status = 200, description = "The session was cleared", body = MessageResponse)
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn reset_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.reconciler.reset().await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Session cleared".to_string(),
        })),
        Err(e) => {
            error!("Reset failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Promote action items from the current insight onto the task board.
///
/// Promotion copies: the items stay on the insight, and the created tasks
/// live their own lives afterwards. The batch is all-or-nothing.
#[utoipa::path(
    post,
    path = "/api/session/promote",
    request_body = PromoteRequest,
    responses(
        (status = 201, description = "The created tasks", body = Vec<TaskPayload>),
        (status = 400, description = "No insight, or no matching action items"),
        (status = 502, description = "The store was unavailable; nothing was created")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn promote_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<PromoteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;

    let view = engine.reconciler.view().await;
    let insight = view
        .session
        .as_ref()
        .and_then(|s| s.insight.as_ref())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "There is no insight to promote action items from".to_string(),
            )
        })?;

    let items: Vec<ActionItem> = match &request.action_item_ids {
        None => insight.action_items.clone(),
        Some(ids) => insight
            .action_items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect(),
    };
    if items.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No matching action items to promote".to_string(),
        ));
    }

    match engine.board.add_action_items(&items).await {
        Ok(tasks) => {
            let payload: Vec<TaskPayload> = tasks.into_iter().map(TaskPayload::from).collect();
            Ok((StatusCode::CREATED, Json(payload)))
        }
        Err(e) => {
            error!("Promotion failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Resume a past session from a stored transcript's snapshot.
#[utoipa::path(
    post,
    path = "/api/session/resume",
    request_body = ResumeRequest,
    responses(
        (status = 200, description = "The resumed session", body = SessionEnvelope),
        (status = 404, description = "The transcript does not exist or has no snapshot"),
        (status = 409, description = "An analysis is already in progress")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn resume_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<ResumeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.reconciler.resume(&request.transcript_id).await {
        Ok(_) => {
            let view = engine.reconciler.view().await;
            Ok(Json(SessionEnvelope::from_view(view)))
        }
        Err(e) => {
            error!("Resume failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

//=========================================================================================
// Board Handlers
//=========================================================================================

/// Get the board grouped into columns, as currently held in memory.
#[utoipa::path(
    get,
    path = "/api/board",
    responses(
        (status = 200, description = "The board columns", body = BoardPayload)
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn get_board_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    Ok(Json(BoardPayload::from(engine.board.grouped().await)))
}

/// Reload the board from the remote store.
#[utoipa::path(
    post,
    path = "/api/board/load",
    responses(
        (status = 200, description = "The refreshed board columns", body = BoardPayload),
        (status = 502, description = "The store was unavailable; the previous board stands")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn load_board_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.board.load().await {
        Ok(_) => Ok(Json(BoardPayload::from(engine.board.grouped().await))),
        Err(e) => {
            error!("Board load failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Add a task to the board.
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "The created task", body = TaskPayload),
        (status = 400, description = "Missing title or unknown priority")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn create_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;

    let priority = match request.priority.as_deref() {
        None => Priority::Medium,
        Some(value) => parse_priority_label(value)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown priority '{}'", value)))?,
    };
    let draft = TaskDraft {
        title: request.title,
        description: request.description,
        assigned_to: request.assigned_to,
        due_date: request.due_date,
        priority,
    };

    match engine.board.add_task(draft).await {
        Ok(task) => Ok((StatusCode::CREATED, Json(TaskPayload::from(task)))),
        Err(e) => {
            error!("Task creation failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Edit a task's fields.
#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "The updated task", body = TaskPayload),
        (status = 400, description = "Empty title or unknown priority"),
        (status = 404, description = "The task does not exist")
    ),
    params(
        ("task_id" = String, Path, description = "The id of the task to edit."),
        ("x-user-id" = String, Header, description = "The id of the acting user.")
    )
)]
pub async fn update_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(task_id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;

    let priority = match request.priority.as_deref() {
        None => None,
        Some(value) => Some(parse_priority_label(value).ok_or_else(|| {
            (StatusCode::BAD_REQUEST, format!("Unknown priority '{}'", value))
        })?),
    };
    let patch = TaskPatch {
        title: request.title,
        description: request.description,
        assigned_to: request.assigned_to,
        due_date: request.due_date,
        priority,
    };

    match engine.board.edit_task(&task_id, patch).await {
        Ok(task) => Ok(Json(TaskPayload::from(task))),
        Err(e) => {
            error!("Task update failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Move a task to another column.
///
/// Applied optimistically: the board shows the new column immediately and
/// rolls back if the store rejects the move.
#[utoipa::path(
    patch,
    path = "/api/tasks/{task_id}/status",
    request_body = StatusRequest,
    responses(
        (status = 200, description = "The task as the store confirmed it", body = TaskPayload),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "The task does not exist")
    ),
    params(
        ("task_id" = String, Path, description = "The id of the task to move."),
        ("x-user-id" = String, Header, description = "The id of the acting user.")
    )
)]
pub async fn update_task_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(task_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;

    let status = parse_status(&request.status).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown status '{}'", request.status),
        )
    })?;

    match engine.board.update_status(&task_id, status).await {
        Ok(task) => Ok(Json(TaskPayload::from(task))),
        Err(e) => {
            error!("Status update failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Delete a task.
#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    responses(
        (status = 200, description = "The task is gone", body = MessageResponse),
        (status = 502, description = "The store was unavailable; the task remains")
    ),
    params(
        ("task_id" = String, Path, description = "The id of the task to delete."),
        ("x-user-id" = String, Header, description = "The id of the acting user.")
    )
)]
pub async fn delete_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.board.delete_task(&task_id).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Task deleted successfully".to_string(),
        })),
        Err(e) => {
            error!("Task deletion failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

//=========================================================================================
// Metrics and History Handlers
//=========================================================================================

/// Get the user's productivity counters.
///
/// Served from the store when it is reachable, and from the last-known
/// snapshot otherwise.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "The current counters", body = MetricsPayload),
        (status = 502, description = "The store was unavailable and no snapshot exists yet")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn get_metrics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.metrics.read().await {
        Ok(metrics) => Ok(Json(MetricsPayload::from(metrics))),
        Err(e) => {
            error!("Metrics read failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Get the user's stored transcripts and insights, newest first.
#[utoipa::path(
    get,
    path = "/api/history",
    responses(
        (status = 200, description = "The stored history", body = HistoryPayload),
        (status = 502, description = "The store was unavailable")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn get_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (transcripts, insights) = tokio::join!(
        app_state.store.list_transcripts_for_user(&user.0),
        app_state.store.list_insights_for_user(&user.0)
    );

    match (transcripts, insights) {
        (Ok(transcripts), Ok(insights)) => Ok(Json(HistoryPayload {
            transcripts: transcripts
                .into_iter()
                .map(|record| TranscriptPayload {
                    id: record.id,
                    title: record.title,
                    summary: record.summary,
                    content: record.content,
                    resumable: record.session.is_some(),
                    created_at: record.created_at,
                })
                .collect(),
            insights: insights
                .into_iter()
                .map(|record| InsightSummaryPayload {
                    id: record.id,
                    transcript_id: record.transcript_id,
                    meeting_title: record.insight.meeting_title,
                    summary: record.insight.summary,
                    created_at: record.created_at,
                })
                .collect(),
        })),
        (Err(e), _) | (_, Err(e)) => {
            error!("History load failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

//=========================================================================================
// Speech Handlers
//=========================================================================================

/// Synthesize speech for a piece of text and return the audio.
#[utoipa::path(
    post,
    path = "/api/speech",
    request_body = SpeechRequest,
    responses(
        (status = 200, description = "MP3 audio", content_type = "audio/mpeg", body = Vec<u8>),
        (status = 400, description = "Empty text or text over the speech limit"),
        (status = 502, description = "The speech service was unavailable")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn speak_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
    Json(request): Json<SpeechRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.speak(&request.text).await {
        Ok(audio) => Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio)),
        Err(e) => {
            error!("Speech synthesis failed for {}: {}", user.0, e);
            Err(port_error_response(e))
        }
    }
}

/// Replay the most recently synthesized clip.
#[utoipa::path(
    get,
    path = "/api/speech/current",
    responses(
        (status = 200, description = "MP3 audio", content_type = "audio/mpeg", body = Vec<u8>),
        (status = 404, description = "No speech has been generated yet")
    ),
    params(("x-user-id" = String, Header, description = "The id of the acting user."))
)]
pub async fn current_speech_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let engine = app_state.engine_for(&user.0).await;
    match engine.current_clip().await {
        Some(clip) => Ok(([(header::CONTENT_TYPE, "audio/mpeg")], clip.audio)),
        None => Err((
            StatusCode::NOT_FOUND,
            "No speech has been generated yet".to_string(),
        )),
    }
}

//=========================================================================================
// Health Handler
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "The engine is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Maps a port error to the HTTP status and message for the response body.
fn port_error_response(error: PortError) -> (StatusCode, String) {
    let status = match &error {
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::AnalysisRejected => StatusCode::UNPROCESSABLE_ENTITY,
        PortError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}

fn parse_status(value: &str) -> Option<TaskStatus> {
    match value {
        "todo" => Some(TaskStatus::Todo),
        "in_progress" => Some(TaskStatus::InProgress),
        "done" => Some(TaskStatus::Done),
        // Accepted from callers still sending the legacy value; the board
        // stores it as todo.
        "pending" => Some(TaskStatus::Pending),
        _ => None,
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status.normalized() {
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Done => "done",
        _ => "todo",
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn parse_priority_label(value: &str) -> Option<Priority> {
    match value {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        _ => None,
    }
}
