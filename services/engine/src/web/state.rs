//! services/engine/src/web/state.rs
//!
//! Defines the application's shared state and the per-user engines it hands
//! out.

use crate::config::Config;
use bytes::Bytes;
use recap_core::board::TaskBoard;
use recap_core::metrics::MetricsAggregator;
use recap_core::ports::{
    InsightExtractionService, PortError, PortResult, RemoteStoreService, SessionCacheService,
    SpeechService,
};
use recap_core::session::SessionReconciler;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The OpenAI speech endpoint rejects longer inputs.
const MAX_SPEECH_CHARS: usize = 4096;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers.
pub struct AppState {
    pub store: Arc<dyn RemoteStoreService>,
    pub cache: Arc<dyn SessionCacheService>,
    pub analyzer: Arc<dyn InsightExtractionService>,
    pub speech: Arc<dyn SpeechService>,
    pub config: Arc<Config>,
    engines: Mutex<HashMap<String, Arc<UserEngine>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RemoteStoreService>,
        cache: Arc<dyn SessionCacheService>,
        analyzer: Arc<dyn InsightExtractionService>,
        speech: Arc<dyn SpeechService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            cache,
            analyzer,
            speech,
            config,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the engine for one user, building and hydrating it on first
    /// use. Engines live for the lifetime of the process, so every request
    /// for a user sees the same session slot and board.
    pub async fn engine_for(&self, user_id: &str) -> Arc<UserEngine> {
        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(user_id) {
            return engine.clone();
        }

        let metrics = Arc::new(MetricsAggregator::new(self.store.clone(), user_id));
        let reconciler = SessionReconciler::hydrated(
            self.store.clone(),
            self.cache.clone(),
            self.analyzer.clone(),
            metrics.clone(),
            user_id,
        )
        .await;
        let board = TaskBoard::new(self.store.clone(), user_id);

        let engine = Arc::new(UserEngine {
            reconciler,
            board,
            metrics,
            speech: self.speech.clone(),
            speech_clip: Mutex::new(None),
        });
        engines.insert(user_id.to_string(), engine.clone());
        engine
    }
}

//=========================================================================================
// UserEngine (Specific to One User)
//=========================================================================================

/// One user's long-lived state: the session reconciler, the task board, the
/// metrics snapshot, and the most recent speech clip.
pub struct UserEngine {
    pub reconciler: SessionReconciler,
    pub board: TaskBoard,
    pub metrics: Arc<MetricsAggregator>,
    speech: Arc<dyn SpeechService>,
    speech_clip: Mutex<Option<SpeechClip>>,
}

/// The last synthesized clip, kept for replay without another paid call.
#[derive(Clone)]
pub struct SpeechClip {
    pub text: String,
    pub audio: Bytes,
}

impl UserEngine {
    /// Synthesizes speech for `text` and remembers the clip. Only the most
    /// recent clip is kept.
    pub async fn speak(&self, text: &str) -> PortResult<Bytes> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PortError::Validation("Text must not be empty".to_string()));
        }
        if trimmed.chars().count() > MAX_SPEECH_CHARS {
            return Err(PortError::Validation(format!(
                "Text is longer than the {} character speech limit",
                MAX_SPEECH_CHARS
            )));
        }

        let audio = Bytes::from(self.speech.synthesize(trimmed).await?);
        let mut clip = self.speech_clip.lock().await;
        *clip = Some(SpeechClip {
            text: trimmed.to_string(),
            audio: audio.clone(),
        });
        Ok(audio)
    }

    /// The most recent clip, if any.
    pub async fn current_clip(&self) -> Option<SpeechClip> {
        self.speech_clip.lock().await.clone()
    }
}
