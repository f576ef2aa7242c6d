//! services/engine/src/bin/engine.rs

use async_openai::{
    config::OpenAIConfig,
    types::{SpeechModel, Voice},
    Client,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use engine_lib::{
    adapters::{
        analyzer::OpenAiAnalysisAdapter, cache::SqliteCacheAdapter, speech::OpenAiSpeechAdapter,
        store::HttpStoreAdapter,
    },
    config::Config,
    error::EngineError,
    web::{
        middleware::require_user,
        rest::{
            analyze_session_handler, create_task_handler, current_speech_handler,
            delete_task_handler, get_board_handler, get_history_handler, get_metrics_handler,
            get_session_handler, health_handler, load_board_handler, promote_handler,
            reset_session_handler, resume_session_handler, speak_handler,
            update_draft_handler, update_task_handler, update_task_status_handler,
            update_transcript_handler,
        },
        ApiDoc, AppState,
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting engine...");

    // --- 2. Open the Session Cache & Run Migrations ---
    let cache_options = SqliteConnectOptions::new()
        .filename(&config.cache_db_path)
        .create_if_missing(true);
    let cache_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(cache_options)
        .await?;
    let cache_adapter = Arc::new(SqliteCacheAdapter::new(cache_pool));
    cache_adapter.run_migrations().await?;
    info!("Session cache ready at {}", config.cache_db_path.display());

    // --- 3. Initialize Service Adapters ---
    let store_adapter = Arc::new(HttpStoreAdapter::new(config.store_base_url.clone()));
    info!("Using persistence API at {}", config.store_base_url);

    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| EngineError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let analysis_adapter = Arc::new(OpenAiAnalysisAdapter::new(
        openai_client.clone(),
        config.analysis_model.clone(),
    ));

    let speech_voice = match config.speech_voice.to_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => {
            return Err(EngineError::Internal(format!(
                "Invalid speech voice specified in config: '{}'",
                config.speech_voice
            )))
        }
    };
    let speech_adapter = Arc::new(OpenAiSpeechAdapter::new(
        openai_client,
        SpeechModel::Tts1,
        speech_voice,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        store_adapter,
        cache_adapter,
        analysis_adapter,
        speech_adapter,
        config.clone(),
    ));

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|_| {
        EngineError::Internal(format!(
            "Invalid ALLOWED_ORIGIN specified in config: '{}'",
            config.allowed_origin
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static("x-user-id")]);

    // --- 5. Create the Web Router ---
    // Public routes (no user header required)
    let public_routes = Router::new().route("/health", get(health_handler));

    // Protected routes (x-user-id required)
    let protected_routes = Router::new()
        .route(
            "/api/session",
            get(get_session_handler).delete(reset_session_handler),
        )
        .route("/api/session/analyze", post(analyze_session_handler))
        .route("/api/session/transcript", put(update_transcript_handler))
        .route("/api/session/draft", put(update_draft_handler))
        .route("/api/session/promote", post(promote_handler))
        .route("/api/session/resume", post(resume_session_handler))
        .route("/api/board", get(get_board_handler))
        .route("/api/board/load", post(load_board_handler))
        .route("/api/tasks", post(create_task_handler))
        .route(
            "/api/tasks/{task_id}",
            put(update_task_handler).delete(delete_task_handler),
        )
        .route("/api/tasks/{task_id}/status", patch(update_task_status_handler))
        .route("/api/metrics", get(get_metrics_handler))
        .route("/api/history", get(get_history_handler))
        .route("/api/speech", post(speak_handler))
        .route("/api/speech/current", get(current_speech_handler))
        .layer(axum_middleware::from_fn(require_user));

    // Combine API routes. Transcripts are text, so a small body cap is plenty.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting engine on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
