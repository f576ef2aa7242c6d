//! crates/recap_core/src/estimate.rs
//!
//! Estimates the time a user saved by reading an extracted summary instead
//! of sitting through (or re-reading) the whole meeting. The result feeds
//! the `hours_saved` metric and is advisory telemetry only.

use regex::Regex;

// Average speaking rate is 150-160 words per minute; the 1.5 factor accounts
// for pauses and discussion. Average reading speed is 200-250 words per
// minute.
const SPEAKING_WORDS_PER_MINUTE: f64 = 155.0;
const DISCUSSION_FACTOR: f64 = 1.5;
const READING_WORDS_PER_MINUTE: f64 = 225.0;

/// The breakdown behind one hours-saved figure. Durations are in minutes,
/// the saving in hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSaved {
    pub meeting_minutes: u64,
    pub reading_minutes: u64,
    pub hours_saved: f64,
}

/// Computes the estimated time saved for a transcript.
///
/// The meeting duration is taken from an explicit mention in the text when
/// one exists ("30 minute meeting", "meeting lasted 2 hours", ...), and
/// estimated from the word count otherwise. Reading time is always estimated
/// from the word count. The saving never goes below zero and is rounded to
/// two decimals.
pub fn estimate_time_saved(transcript: &str) -> TimeSaved {
    let words = count_words(transcript);

    let meeting_minutes = match extract_meeting_duration(transcript) {
        Some(stated) => stated,
        None => (words as f64 / SPEAKING_WORDS_PER_MINUTE * DISCUSSION_FACTOR).ceil() as u64,
    };
    let reading_minutes = (words as f64 / READING_WORDS_PER_MINUTE).ceil() as u64;

    let saved_minutes = meeting_minutes.saturating_sub(reading_minutes);
    let hours_saved = round2(saved_minutes as f64 / 60.0);

    TimeSaved {
        meeting_minutes,
        reading_minutes,
        hours_saved,
    }
}

/// Counts whitespace-separated words.
pub fn count_words(text: &str) -> u64 {
    if text.trim().is_empty() {
        return 0;
    }
    text.split_whitespace().count() as u64
}

/// Scans the transcript for an explicitly stated meeting duration and
/// returns it in minutes. Hour phrasings are converted to minutes.
pub fn extract_meeting_duration(transcript: &str) -> Option<u64> {
    let text = transcript.to_lowercase();

    // (pattern, minutes per matched unit)
    let patterns: [(&str, u64); 7] = [
        (r"(\d+)\s*minute\s*meeting", 1),
        (r"(\d+)\s*min\s*meeting", 1),
        (r"(\d+)\s*hour\s*meeting", 60),
        (r"meeting\s*lasted\s*(\d+)\s*minutes?", 1),
        (r"meeting\s*lasted\s*(\d+)\s*hours?", 60),
        (r"(\d+)\s*minute\s*call", 1),
        (r"(\d+)\s*hour\s*call", 60),
    ];

    for (pattern, unit_minutes) in patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        if let Some(caps) = re.captures(&text) {
            if let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                return Some(value * unit_minutes);
            }
        }
    }

    None
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
