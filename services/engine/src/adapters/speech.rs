//! services/engine/src/adapters/speech.rs
//!
//! This module contains the adapter for the text-to-speech service used to
//! read summaries and email drafts aloud. It implements the `SpeechService`
//! port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, SpeechResponseFormat, Voice},
    Client,
};
use async_trait::async_trait;
use recap_core::ports::{PortError, PortResult, SpeechService};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechService` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiSpeechAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiSpeechAdapter {
    /// Creates a new `OpenAiSpeechAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }
}

//=========================================================================================
// `SpeechService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechService for OpenAiSpeechAdapter {
    /// Renders `text` as MP3 audio. The web layer serves the result with an
    /// `audio/mpeg` content type, so the format is pinned here rather than
    /// left to the provider default.
    async fn synthesize(&self, text: &str) -> PortResult<Vec<u8>> {
        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            response_format: Some(SpeechResponseFormat::Mp3),
            ..Default::default()
        };

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        Ok(response.bytes.to_vec())
    }
}
