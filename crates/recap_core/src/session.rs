//! crates/recap_core/src/session.rs
//!
//! The session reconciler: one user's transcript-to-insight workflow and the
//! state machine behind it (Empty -> Analyzing -> Ready <-> Editing, with
//! reset back to Empty).
//!
//! The reconciler coordinates three stores with different guarantees: the
//! analyzer (expensive, never retried automatically), the local session
//! cache (authoritative for what the user sees next launch), and the remote
//! store (history and metrics, persisted best-effort after the fact). Local
//! state is installed first and is never rolled back once an analysis has
//! succeeded; remote persistence failures are logged and swallowed.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::{MetricKind, NewInsight, NewTranscript, Session, SessionSnapshot};
use crate::estimate::estimate_time_saved;
use crate::metrics::MetricsAggregator;
use crate::ports::{
    InsightExtractionService, PortError, PortResult, RemoteStoreService, SessionCacheService,
};

//=========================================================================================
// Phases and Outcomes
//=========================================================================================

/// Where the session currently is in its lifecycle. Derived from the slot
/// contents, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No insight yet. A transcript may already be drafted.
    Empty,
    /// An analysis is in flight and its result is still wanted.
    Analyzing,
    /// An insight is present and the email draft matches it.
    Ready,
    /// An insight is present and the email draft has diverged from it.
    Editing,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Empty => "empty",
            SessionPhase::Analyzing => "analyzing",
            SessionPhase::Ready => "ready",
            SessionPhase::Editing => "editing",
        }
    }
}

/// A point-in-time view of the session for callers and the API layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub session: Option<Session>,
}

/// What became of one analyze call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    /// The analysis finished and the session now holds the new insight.
    Completed(Session),
    /// A reset arrived while the call was in flight; the result was thrown
    /// away on arrival and the session is empty.
    Discarded,
}

//=========================================================================================
// The Reconciler
//=========================================================================================

/// The per-user slot guarded by the reconciler's mutex.
///
/// `generation` increments whenever the session is replaced out from under
/// an in-flight analysis (reset, resume); `analysis_generation` remembers
/// the generation the current in-flight call started under. A mismatch on
/// arrival means the result is stale and gets discarded.
struct Slot {
    session: Option<Session>,
    analyzing: bool,
    generation: u64,
    analysis_generation: u64,
}

impl Slot {
    fn phase(&self) -> SessionPhase {
        if self.analyzing && self.analysis_generation == self.generation {
            return SessionPhase::Analyzing;
        }
        match &self.session {
            None => SessionPhase::Empty,
            Some(session) => match &session.insight {
                None => SessionPhase::Empty,
                Some(insight) => {
                    if session.email_draft == insight.follow_up_email.body {
                        SessionPhase::Ready
                    } else {
                        SessionPhase::Editing
                    }
                }
            },
        }
    }
}

/// One user's session reconciler.
pub struct SessionReconciler {
    store: Arc<dyn RemoteStoreService>,
    cache: Arc<dyn SessionCacheService>,
    analyzer: Arc<dyn InsightExtractionService>,
    metrics: Arc<MetricsAggregator>,
    user_id: String,
    slot: Mutex<Slot>,
}

impl SessionReconciler {
    /// Builds the reconciler and hydrates it from the session cache. A
    /// cache that cannot be read is treated as empty (and logged), never as
    /// a startup failure.
    pub async fn hydrated(
        store: Arc<dyn RemoteStoreService>,
        cache: Arc<dyn SessionCacheService>,
        analyzer: Arc<dyn InsightExtractionService>,
        metrics: Arc<MetricsAggregator>,
        user_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        let session = match cache.load(&user_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not hydrate session for {}: {}", user_id, e);
                None
            }
        };
        Self {
            store,
            cache,
            analyzer,
            metrics,
            user_id,
            slot: Mutex::new(Slot {
                session,
                analyzing: false,
                generation: 0,
                analysis_generation: 0,
            }),
        }
    }

    /// The current phase and session contents.
    pub async fn view(&self) -> SessionView {
        let slot = self.slot.lock().await;
        SessionView {
            phase: slot.phase(),
            session: slot.session.clone(),
        }
    }

    /// Runs one transcript analysis end to end.
    ///
    /// At most one analysis is in flight per user: a submit while one is
    /// running is rejected with `Conflict` rather than queued, so a single
    /// user action can never double-call the analyzer or double-count
    /// metrics. On success the session is installed and cached, and the
    /// transcript, insight, and metric increments are persisted remotely.
    /// That persistence is awaited but strictly non-fatal: the analyzer
    /// call already cost real money and is not re-run just because history
    /// could not be written.
    pub async fn analyze(
        &self,
        transcript: String,
        display_name: Option<String>,
    ) -> PortResult<AnalyzeOutcome> {
        if transcript.trim().is_empty() {
            return Err(PortError::Validation(
                "Transcript must not be empty".to_string(),
            ));
        }

        // Claim the single analysis slot.
        let started_generation = {
            let mut slot = self.slot.lock().await;
            if slot.analyzing {
                return Err(PortError::Conflict(
                    "An analysis is already in progress".to_string(),
                ));
            }
            slot.analyzing = true;
            slot.analysis_generation = slot.generation;
            slot.generation
        };

        info!("Analysis started for {}", self.user_id);
        let hint = display_name.as_deref().unwrap_or(&self.user_id);
        let result = self.analyzer.extract_insight(&transcript, Some(hint)).await;

        // Install the result, unless the session moved on while we were out.
        let session = {
            let mut slot = self.slot.lock().await;
            slot.analyzing = false;
            if slot.generation != started_generation {
                info!(
                    "Discarding analysis result for {}: session was reset in flight",
                    self.user_id
                );
                return Ok(AnalyzeOutcome::Discarded);
            }
            let insight = result?;
            let session = Session {
                transcript: transcript.clone(),
                email_draft: insight.follow_up_email.body.clone(),
                insight: Some(insight),
                saved_at: Utc::now(),
            };
            slot.session = Some(session.clone());
            // Cache writes happen under the slot lock so a concurrent reset
            // cannot interleave between install and save.
            if let Err(e) = self.cache.save(&self.user_id, &session).await {
                warn!("Could not cache session for {}: {}", self.user_id, e);
            }
            session
        };
        info!("Analysis complete for {}", self.user_id);

        self.persist_analysis(&session).await;

        Ok(AnalyzeOutcome::Completed(session))
    }

    /// Updates the working transcript while composing, before any analysis.
    /// Once an insight exists the transcript is pinned to the text that
    /// produced it; re-analyzing or resetting are the ways forward.
    pub async fn set_transcript(&self, text: String) -> PortResult<Session> {
        let mut slot = self.slot.lock().await;
        if slot.phase() == SessionPhase::Analyzing {
            return Err(PortError::Conflict(
                "An analysis is already in progress".to_string(),
            ));
        }
        if let Some(session) = &slot.session {
            if session.insight.is_some() {
                return Err(PortError::Conflict(
                    "The session already has an insight; re-analyze or reset instead".to_string(),
                ));
            }
        }

        let session = Session {
            transcript: text,
            insight: None,
            email_draft: String::new(),
            saved_at: Utc::now(),
        };
        slot.session = Some(session.clone());
        if let Err(e) = self.cache.save(&self.user_id, &session).await {
            warn!("Could not cache session for {}: {}", self.user_id, e);
        }
        Ok(session)
    }

    /// Edits the follow-up email draft. Local plus cache only; drafts are
    /// never auto-pushed to the remote store.
    pub async fn update_draft(&self, body: String) -> PortResult<Session> {
        let mut slot = self.slot.lock().await;
        if slot.phase() == SessionPhase::Analyzing {
            return Err(PortError::Conflict(
                "An analysis is already in progress".to_string(),
            ));
        }
        let session = match &mut slot.session {
            Some(session) if session.insight.is_some() => session,
            _ => {
                return Err(PortError::Validation(
                    "There is no insight to draft an email for".to_string(),
                ))
            }
        };

        session.email_draft = body;
        session.saved_at = Utc::now();
        let session = session.clone();
        if let Err(e) = self.cache.save(&self.user_id, &session).await {
            warn!("Could not cache session for {}: {}", self.user_id, e);
        }
        Ok(session)
    }

    /// Discards the session: the slot goes back to Empty and the cache entry
    /// is removed. The only way to drop a Ready or Editing session. An
    /// analysis in flight is not cancelled; its result is discarded when it
    /// arrives. Resetting an already-empty session is a no-op.
    pub async fn reset(&self) -> PortResult<()> {
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        slot.session = None;
        if let Err(e) = self.cache.clear(&self.user_id).await {
            warn!("Could not clear cached session for {}: {}", self.user_id, e);
        }
        info!("Session reset for {}", self.user_id);
        Ok(())
    }

    /// Rebuilds the session from a remote transcript that carries a session
    /// snapshot, overwriting whatever is local. Used to pick up a past
    /// session from the history list, possibly written by another device.
    pub async fn resume(&self, transcript_id: &str) -> PortResult<Session> {
        let record = self.store.get_transcript(transcript_id).await?;
        let snapshot = record.session.ok_or_else(|| {
            PortError::NotFound(format!(
                "Transcript {} has no session to resume",
                transcript_id
            ))
        })?;

        let mut slot = self.slot.lock().await;
        if slot.phase() == SessionPhase::Analyzing {
            return Err(PortError::Conflict(
                "An analysis is already in progress".to_string(),
            ));
        }
        slot.generation += 1;

        let session = Session {
            transcript: record.content,
            email_draft: snapshot.email_draft,
            insight: Some(snapshot.insight),
            saved_at: Utc::now(),
        };
        slot.session = Some(session.clone());
        if let Err(e) = self.cache.save(&self.user_id, &session).await {
            warn!("Could not cache session for {}: {}", self.user_id, e);
        }
        info!("Session resumed for {} from transcript {}", self.user_id, transcript_id);
        Ok(session)
    }

    /// Persists a completed analysis to the remote store: the transcript
    /// (carrying the session snapshot for later resume), the insight, and
    /// the three metric increments. Every failure here is logged and
    /// swallowed; the local Ready state is authoritative.
    async fn persist_analysis(&self, session: &Session) {
        let insight = match &session.insight {
            Some(insight) => insight,
            None => return,
        };

        let snapshot = SessionSnapshot {
            insight: insight.clone(),
            email_draft: session.email_draft.clone(),
        };
        match self
            .store
            .create_transcript(NewTranscript {
                user_id: self.user_id.clone(),
                title: insight.meeting_title.clone(),
                content: session.transcript.clone(),
                summary: Some(insight.summary.clone()),
                session: Some(snapshot),
            })
            .await
        {
            Ok(record) => {
                if let Err(e) = self
                    .store
                    .create_insight(NewInsight {
                        user_id: self.user_id.clone(),
                        transcript_id: record.id,
                        insight: insight.clone(),
                    })
                    .await
                {
                    error!("Failed to persist insight for {}: {}", self.user_id, e);
                }
            }
            Err(e) => {
                error!("Failed to persist transcript for {}: {}", self.user_id, e);
            }
        }

        let saved = estimate_time_saved(&session.transcript);
        for (kind, amount) in [
            (MetricKind::TranscriptsAnalyzed, 1.0),
            (MetricKind::InsightsGenerated, 1.0),
            (MetricKind::HoursSaved, saved.hours_saved),
        ] {
            if let Err(e) = self.metrics.increment(kind, amount).await {
                error!(
                    "Failed to record {:?} for {}: {}",
                    kind, self.user_id, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricKind, TranscriptRecord};
    use crate::testing::{sample_insight, InMemoryCache, InMemoryStore, ScriptedAnalyzer};

    const USER: &str = "ana@example.com";

    struct Harness {
        store: Arc<InMemoryStore>,
        cache: Arc<InMemoryCache>,
        analyzer: Arc<ScriptedAnalyzer>,
    }

    impl Harness {
        fn new(analyzer: ScriptedAnalyzer) -> Self {
            Self {
                store: Arc::new(InMemoryStore::new()),
                cache: Arc::new(InMemoryCache::new()),
                analyzer: Arc::new(analyzer),
            }
        }

        async fn reconciler(&self) -> SessionReconciler {
            let metrics = Arc::new(MetricsAggregator::new(self.store.clone(), USER));
            SessionReconciler::hydrated(
                self.store.clone(),
                self.cache.clone(),
                self.analyzer.clone(),
                metrics,
                USER,
            )
            .await
        }
    }

    fn transcript_of_200_words() -> String {
        // 5 words of header plus 195 filler words.
        format!("Team stand-up, 30 minute meeting. {}", vec!["word"; 195].join(" "))
    }

    #[tokio::test]
    async fn analyze_installs_caches_and_persists() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let reconciler = harness.reconciler().await;

        let outcome = reconciler
            .analyze(transcript_of_200_words(), None)
            .await
            .unwrap();
        let session = match outcome {
            AnalyzeOutcome::Completed(session) => session,
            AnalyzeOutcome::Discarded => panic!("analysis should have completed"),
        };

        let view = reconciler.view().await;
        assert_eq!(view.phase, SessionPhase::Ready);
        assert_eq!(view.session, Some(session.clone()));
        assert_eq!(
            session.email_draft,
            sample_insight().follow_up_email.body
        );
        assert!(harness.cache.contains(USER));

        // Remote history carries the resume snapshot, and the insight points
        // back at the stored transcript.
        let transcripts = harness.store.stored_transcripts();
        assert_eq!(transcripts.len(), 1);
        assert!(transcripts[0].session.is_some());
        let insights = harness.store.stored_insights();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].transcript_id, transcripts[0].id);

        // Exactly one increment per counter; 30 stated minutes minus one
        // minute of reading is 0.48 hours.
        let events = harness.store.metric_events();
        assert_eq!(
            events,
            vec![
                (USER.to_string(), MetricKind::TranscriptsAnalyzed, 1.0),
                (USER.to_string(), MetricKind::InsightsGenerated, 1.0),
                (USER.to_string(), MetricKind::HoursSaved, 0.48),
            ]
        );
    }

    #[tokio::test]
    async fn empty_transcript_is_rejected_before_any_call() {
        let harness = Harness::new(ScriptedAnalyzer::new());
        let reconciler = harness.reconciler().await;

        let err = reconciler.analyze("   \n\t".to_string(), None).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        assert_eq!(harness.analyzer.calls(), 0);
        assert_eq!(reconciler.view().await.phase, SessionPhase::Empty);
        assert!(!harness.cache.contains(USER));
        assert!(harness.store.metric_events().is_empty());
    }

    #[tokio::test]
    async fn concurrent_analyze_is_rejected_not_queued() {
        let (analyzer, gate) = ScriptedAnalyzer::gated();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let reconciler = Arc::new(harness.reconciler().await);

        let first = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.analyze("a real transcript".to_string(), None).await })
        };
        gate.wait_entered().await;
        assert_eq!(reconciler.view().await.phase, SessionPhase::Analyzing);

        let err = reconciler
            .analyze("another transcript".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        gate.release_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, AnalyzeOutcome::Completed(_)));

        // The second submit never reached the analyzer and never counted.
        assert_eq!(harness.analyzer.calls(), 1);
        assert_eq!(harness.store.metrics_for(USER).transcripts_analyzed, 1);
        assert_eq!(harness.store.metrics_for(USER).insights_generated, 1);
    }

    #[tokio::test]
    async fn rejected_text_leaves_the_session_empty() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_rejection();
        let harness = Harness::new(analyzer);
        let reconciler = harness.reconciler().await;

        let err = reconciler
            .analyze("please write me a poem".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::AnalysisRejected));

        assert_eq!(reconciler.view().await.phase, SessionPhase::Empty);
        assert!(!harness.cache.contains(USER));
        assert!(harness.store.metric_events().is_empty());
        assert!(harness.store.stored_transcripts().is_empty());
    }

    #[tokio::test]
    async fn failed_reanalysis_keeps_the_prior_session() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        analyzer.push_failure();
        let harness = Harness::new(analyzer);
        let reconciler = harness.reconciler().await;

        reconciler
            .analyze("the first transcript".to_string(), None)
            .await
            .unwrap();
        let before = reconciler.view().await;

        let err = reconciler
            .analyze("the second transcript".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unavailable(_)));
        assert_eq!(reconciler.view().await, before);
    }

    #[tokio::test]
    async fn reset_clears_the_slot_and_the_cache() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let reconciler = harness.reconciler().await;

        reconciler.analyze("a transcript".to_string(), None).await.unwrap();
        assert!(harness.cache.contains(USER));

        reconciler.reset().await.unwrap();
        let view = reconciler.view().await;
        assert_eq!(view.phase, SessionPhase::Empty);
        assert!(view.session.is_none());
        assert!(!harness.cache.contains(USER));

        // Resetting again is a harmless no-op.
        reconciler.reset().await.unwrap();
        assert_eq!(reconciler.view().await.phase, SessionPhase::Empty);
    }

    #[tokio::test]
    async fn reset_during_analysis_discards_the_result_on_arrival() {
        let (analyzer, gate) = ScriptedAnalyzer::gated();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let reconciler = Arc::new(harness.reconciler().await);

        let inflight = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.analyze("a transcript".to_string(), None).await })
        };
        gate.wait_entered().await;

        reconciler.reset().await.unwrap();
        // The reset already shows through, even though the call is parked.
        assert_eq!(reconciler.view().await.phase, SessionPhase::Empty);

        gate.release_one();
        let outcome = inflight.await.unwrap().unwrap();
        assert_eq!(outcome, AnalyzeOutcome::Discarded);

        // Nothing was kept, cached, persisted, or counted.
        assert_eq!(reconciler.view().await.phase, SessionPhase::Empty);
        assert!(!harness.cache.contains(USER));
        assert!(harness.store.stored_transcripts().is_empty());
        assert!(harness.store.metric_events().is_empty());
    }

    #[tokio::test]
    async fn draft_edits_persist_and_flip_between_editing_and_ready() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let reconciler = harness.reconciler().await;
        reconciler.analyze("a transcript".to_string(), None).await.unwrap();

        reconciler
            .update_draft("Hi all, rewritten from scratch.".to_string())
            .await
            .unwrap();
        assert_eq!(reconciler.view().await.phase, SessionPhase::Editing);
        let cached = harness.cache.load(USER).await.unwrap().unwrap();
        assert_eq!(cached.email_draft, "Hi all, rewritten from scratch.");

        // Putting the original body back reads as Ready again.
        reconciler
            .update_draft(sample_insight().follow_up_email.body)
            .await
            .unwrap();
        assert_eq!(reconciler.view().await.phase, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn draft_edit_without_an_insight_is_rejected() {
        let harness = Harness::new(ScriptedAnalyzer::new());
        let reconciler = harness.reconciler().await;

        let err = reconciler.update_draft("hello".to_string()).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn sessions_round_trip_through_the_cache() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);

        let first = harness.reconciler().await;
        let outcome = first
            .analyze("a transcript".to_string(), None)
            .await
            .unwrap();
        let session = match outcome {
            AnalyzeOutcome::Completed(session) => session,
            AnalyzeOutcome::Discarded => panic!("analysis should have completed"),
        };
        drop(first);

        // A fresh reconciler over the same cache sees the identical session.
        let second = harness.reconciler().await;
        let view = second.view().await;
        assert_eq!(view.phase, SessionPhase::Ready);
        assert_eq!(view.session, Some(session));
    }

    #[tokio::test]
    async fn hydrating_a_transcript_only_session_reads_as_empty() {
        let harness = Harness::new(ScriptedAnalyzer::new());
        let drafted = Session {
            transcript: "half-typed notes".to_string(),
            insight: None,
            email_draft: String::new(),
            saved_at: Utc::now(),
        };
        harness.cache.save(USER, &drafted).await.unwrap();

        let reconciler = harness.reconciler().await;
        let view = reconciler.view().await;
        assert_eq!(view.phase, SessionPhase::Empty);
        assert_eq!(view.session.unwrap().transcript, "half-typed notes");
    }

    #[tokio::test]
    async fn set_transcript_persists_the_working_text() {
        let harness = Harness::new(ScriptedAnalyzer::new());
        let reconciler = harness.reconciler().await;

        reconciler.set_transcript("typing away".to_string()).await.unwrap();
        assert_eq!(reconciler.view().await.phase, SessionPhase::Empty);
        let cached = harness.cache.load(USER).await.unwrap().unwrap();
        assert_eq!(cached.transcript, "typing away");
    }

    #[tokio::test]
    async fn set_transcript_after_analysis_is_rejected() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let reconciler = harness.reconciler().await;
        reconciler.analyze("a transcript".to_string(), None).await.unwrap();

        let err = reconciler
            .set_transcript("something else".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn resume_rebuilds_the_session_from_a_remote_snapshot() {
        let harness = Harness::new(ScriptedAnalyzer::new());
        let record = harness
            .store
            .create_transcript(NewTranscript {
                user_id: USER.to_string(),
                title: "Q3 Roadmap Sync".to_string(),
                content: "the original transcript".to_string(),
                summary: None,
                session: Some(SessionSnapshot {
                    insight: sample_insight(),
                    email_draft: "edited on the other laptop".to_string(),
                }),
            })
            .await
            .unwrap();

        let reconciler = harness.reconciler().await;
        let session = reconciler.resume(&record.id).await.unwrap();
        assert_eq!(session.transcript, "the original transcript");
        assert_eq!(session.email_draft, "edited on the other laptop");
        assert_eq!(reconciler.view().await.phase, SessionPhase::Editing);
        assert!(harness.cache.contains(USER));
    }

    #[tokio::test]
    async fn resume_without_a_snapshot_is_not_found() {
        let harness = Harness::new(ScriptedAnalyzer::new());
        let record = harness
            .store
            .create_transcript(NewTranscript {
                user_id: USER.to_string(),
                title: "Bare transcript".to_string(),
                content: "text".to_string(),
                summary: None,
                session: None,
            })
            .await
            .unwrap();

        let reconciler = harness.reconciler().await;
        let err = reconciler.resume(&record.id).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn resume_while_analyzing_is_rejected() {
        let (analyzer, gate) = ScriptedAnalyzer::gated();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        let record: TranscriptRecord = harness
            .store
            .create_transcript(NewTranscript {
                user_id: USER.to_string(),
                title: "History".to_string(),
                content: "text".to_string(),
                summary: None,
                session: Some(SessionSnapshot {
                    insight: sample_insight(),
                    email_draft: String::new(),
                }),
            })
            .await
            .unwrap();
        let reconciler = Arc::new(harness.reconciler().await);

        let inflight = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.analyze("a transcript".to_string(), None).await })
        };
        gate.wait_entered().await;

        let err = reconciler.resume(&record.id).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        gate.release_one();
        inflight.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn history_write_failures_do_not_fail_the_analysis() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        harness.store.fail_next("create_transcript");
        let reconciler = harness.reconciler().await;

        let outcome = reconciler
            .analyze("a transcript".to_string(), None)
            .await
            .unwrap();
        assert!(matches!(outcome, AnalyzeOutcome::Completed(_)));
        assert_eq!(reconciler.view().await.phase, SessionPhase::Ready);
        assert!(harness.cache.contains(USER));

        // No transcript, so no insight either; the metrics still landed.
        assert!(harness.store.stored_transcripts().is_empty());
        assert!(harness.store.stored_insights().is_empty());
        assert_eq!(harness.store.metrics_for(USER).transcripts_analyzed, 1);
        assert_eq!(harness.store.metrics_for(USER).insights_generated, 1);
    }

    #[tokio::test]
    async fn metric_write_failures_do_not_fail_the_analysis() {
        let analyzer = ScriptedAnalyzer::new();
        analyzer.push_success(sample_insight());
        let harness = Harness::new(analyzer);
        harness.store.fail_next("increment_metric");
        let reconciler = harness.reconciler().await;

        let outcome = reconciler
            .analyze("a transcript".to_string(), None)
            .await
            .unwrap();
        assert!(matches!(outcome, AnalyzeOutcome::Completed(_)));

        // The first increment was lost, the later ones still went through.
        let metrics = harness.store.metrics_for(USER);
        assert_eq!(metrics.transcripts_analyzed, 0);
        assert_eq!(metrics.insights_generated, 1);
    }
}
