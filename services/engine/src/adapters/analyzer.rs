//! services/engine/src/adapters/analyzer.rs
//!
//! This module contains the adapter for the transcript-analysis LLM.
//! It implements the `InsightExtractionService` port from the `core` crate.

const ANALYSIS_INSTRUCTIONS: &str = r#"You are an assistant that analyzes meeting transcripts.

IMPORTANT: First, determine whether the provided text is actually a meeting transcript with real conversations between people. If it is not a genuine meeting transcript (e.g., random text, instructions, single-person notes, or clearly not a conversation), return exactly: {"error": "not_a_transcript"}

If it IS a valid meeting transcript with conversations between people, extract the key information and return ONLY valid JSON in this exact format:

{
  "meeting_title": "string",
  "summary": "string",
  "decisions": [
    {
      "text": "string",
      "made_by": "string",
      "timestamp": "string"
    }
  ],
  "action_items": [
    {
      "id": number,
      "task": "string",
      "owner": "string",
      "due": "YYYY-MM-DD",
      "priority": "High|Medium|Low",
      "context": "string",
      "confidence": number (0-1)
    }
  ],
  "follow_up_email": {
    "subject": "string",
    "body": "string"
  }
}

Rules:
- Number the action items sequentially starting at 1.
- Use YYYY-MM-DD for due dates, and leave "due" empty when no date was mentioned.
- "confidence" is how certain you are that the item is a real commitment.
- The follow-up email should be ready to send, written from the user's perspective."#;

const ANALYSIS_USER_TEMPLATE: &str = r#"{sender_clause}Analyze this meeting transcript:

{transcript}"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use recap_core::domain::{ActionItem, Decision, EmailDraft, Insight, Priority};
use recap_core::ports::{InsightExtractionService, PortError, PortResult};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InsightExtractionService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalysisAdapter {
    /// Creates a new `OpenAiAnalysisAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// "Impure" Response Structs
//=========================================================================================

// The model's output is parsed leniently: array fields may be missing and
// priorities arrive in whatever casing the model chose. `to_domain` is where
// the output is forced into shape.

#[derive(Deserialize)]
struct SentinelBody {
    error: String,
}

#[derive(Deserialize)]
struct RawInsight {
    meeting_title: String,
    summary: String,
    #[serde(default)]
    decisions: Vec<RawDecision>,
    #[serde(default)]
    action_items: Vec<RawActionItem>,
    #[serde(default)]
    follow_up_email: Option<EmailDraft>,
}

#[derive(Deserialize)]
struct RawDecision {
    text: String,
    #[serde(default)]
    made_by: String,
    #[serde(default)]
    timestamp: String,
}

#[derive(Deserialize)]
struct RawActionItem {
    task: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    due: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    confidence: f64,
}

impl RawInsight {
    fn to_domain(self) -> Insight {
        Insight {
            meeting_title: self.meeting_title,
            summary: self.summary,
            decisions: self
                .decisions
                .into_iter()
                .map(|d| Decision {
                    text: d.text,
                    made_by: d.made_by,
                    timestamp: d.timestamp,
                })
                .collect(),
            // Items are renumbered sequentially, which keeps the ids usable
            // for selection no matter what the model produced.
            action_items: self
                .action_items
                .into_iter()
                .enumerate()
                .map(|(index, item)| ActionItem {
                    id: index as u32 + 1,
                    task: item.task,
                    owner: item.owner,
                    due: item.due,
                    priority: parse_priority(&item.priority),
                    context: item.context,
                    confidence: item.confidence,
                })
                .collect(),
            follow_up_email: self.follow_up_email.unwrap_or(EmailDraft {
                subject: String::new(),
                body: String::new(),
            }),
        }
    }
}

//=========================================================================================
// `InsightExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InsightExtractionService for OpenAiAnalysisAdapter {
    /// Runs the analysis prompt over a transcript and parses the insight.
    async fn extract_insight(
        &self,
        transcript: &str,
        user_hint: Option<&str>,
    ) -> PortResult<Insight> {
        let sender_clause = match user_hint {
            Some(name) => format!(
                "The user's name is {}; write the follow-up email from their perspective and sign it with their name.\n\n",
                name
            ),
            None => String::new(),
        };
        let user_input = ANALYSIS_USER_TEMPLATE
            .replace("{sender_clause}", &sender_clause)
            .replace("{transcript}", transcript);

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(ANALYSIS_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Analysis LLM response contained no text content.".to_string())
            })?;

        parse_analysis(&content)
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

/// Parses the model's text output into an `Insight`, honoring the
/// not-a-transcript sentinel.
fn parse_analysis(content: &str) -> PortResult<Insight> {
    let block = extract_json_block(content).ok_or_else(|| {
        PortError::Unexpected("Analysis LLM returned no JSON object.".to_string())
    })?;

    // The sentinel comes back as a bare error object.
    if let Ok(sentinel) = serde_json::from_str::<SentinelBody>(block) {
        if sentinel.error == "not_a_transcript" {
            return Err(PortError::AnalysisRejected);
        }
        return Err(PortError::Unexpected(format!(
            "Analysis LLM returned an error: {}",
            sentinel.error
        )));
    }

    let raw: RawInsight = serde_json::from_str(block)
        .map_err(|e| PortError::Unexpected(format!("Malformed analysis JSON: {}", e)))?;
    Ok(raw.to_domain())
}

/// Pulls the JSON object out of the model's output, which may be wrapped in
/// prose or code fences. Matches greedily from the first brace to the last.
fn extract_json_block(content: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)\{.*\}").ok()?;
    re.find(content).map(|m| m.as_str())
}

fn parse_priority(value: &str) -> Priority {
    match value.to_lowercase().as_str() {
        "low" => Priority::Low,
        "medium" => Priority::Medium,
        "high" => Priority::High,
        other => {
            if !other.is_empty() {
                warn!("Unrecognized priority '{}'; defaulting to medium", other);
            }
            Priority::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ANALYSIS: &str = r#"{
        "meeting_title": "Q3 Roadmap Sync",
        "summary": "The team agreed on the Q3 priorities.",
        "decisions": [
            { "text": "Ship the beta by July", "made_by": "Dana", "timestamp": "00:12:40" }
        ],
        "action_items": [
            { "id": 7, "task": "Draft the beta announcement", "owner": "Sam", "due": "2024-07-01", "priority": "High", "context": "Before launch", "confidence": 0.92 },
            { "id": 7, "task": "Set up the feedback form", "owner": "Priya", "due": "", "priority": "MEDIUM", "context": "", "confidence": 0.8 }
        ],
        "follow_up_email": { "subject": "Follow-up", "body": "Hi all," }
    }"#;

    #[test]
    fn parses_a_clean_analysis() {
        let insight = parse_analysis(VALID_ANALYSIS).unwrap();
        assert_eq!(insight.meeting_title, "Q3 Roadmap Sync");
        assert_eq!(insight.decisions.len(), 1);
        assert_eq!(insight.action_items.len(), 2);
        assert_eq!(insight.follow_up_email.subject, "Follow-up");
    }

    #[test]
    fn parses_an_analysis_wrapped_in_prose_and_fences() {
        let content = format!(
            "Here is the analysis you asked for:\n```json\n{}\n```\nLet me know!",
            VALID_ANALYSIS
        );
        let insight = parse_analysis(&content).unwrap();
        assert_eq!(insight.meeting_title, "Q3 Roadmap Sync");
    }

    #[test]
    fn action_items_are_renumbered_sequentially() {
        // The model duplicated id 7; the parsed items get 1 and 2.
        let insight = parse_analysis(VALID_ANALYSIS).unwrap();
        let ids: Vec<u32> = insight.action_items.iter().map(|i| i.id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn priorities_parse_case_insensitively_with_a_medium_default() {
        let insight = parse_analysis(VALID_ANALYSIS).unwrap();
        assert_eq!(insight.action_items[0].priority, Priority::High);
        assert_eq!(insight.action_items[1].priority, Priority::Medium);
        assert_eq!(parse_priority("URGENT!!"), Priority::Medium);
        assert_eq!(parse_priority(""), Priority::Medium);
    }

    #[test]
    fn the_sentinel_maps_to_analysis_rejected() {
        let content = r#"{"error": "not_a_transcript"}"#;
        assert!(matches!(
            parse_analysis(content),
            Err(PortError::AnalysisRejected)
        ));
    }

    #[test]
    fn other_error_objects_are_not_treated_as_rejections() {
        let content = r#"{"error": "quota_exceeded"}"#;
        assert!(matches!(
            parse_analysis(content),
            Err(PortError::Unexpected(_))
        ));
    }

    #[test]
    fn output_without_json_is_an_error() {
        assert!(matches!(
            parse_analysis("I could not analyze that."),
            Err(PortError::Unexpected(_))
        ));
    }

    #[test]
    fn missing_optional_fields_get_defaults() {
        let content = r#"{
            "meeting_title": "Standup",
            "summary": "Quick sync.",
            "action_items": [ { "task": "Ping the vendor" } ]
        }"#;
        let insight = parse_analysis(content).unwrap();
        assert!(insight.decisions.is_empty());
        assert_eq!(insight.action_items[0].owner, "");
        assert_eq!(insight.action_items[0].priority, Priority::Medium);
        assert_eq!(insight.follow_up_email.body, "");
    }
}
