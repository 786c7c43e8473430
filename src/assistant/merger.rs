use chrono::Utc;

use super::composer::ComposeOutcome;
use crate::config::prompt::CannedResponse;
use crate::models::chat::{ Language, ResponseEnvelope, ResponseSource };

/// Removes literal `**` emphasis markers and nothing else.
pub fn strip_emphasis(text: &str) -> String {
    text.replace("**", "")
}

pub fn merge_response(
    outcome: ComposeOutcome,
    canned: CannedResponse,
    topic: &str,
    language: Language,
    from_backend: bool
) -> ResponseEnvelope {
    let (text, source) = match outcome {
        ComposeOutcome::Composed(ai) if !ai.trim().is_empty() => (ai, ResponseSource::Ai),
        _ => (canned.text, ResponseSource::KnowledgeFallback),
    };

    ResponseEnvelope {
        response: strip_emphasis(&text),
        language,
        topic: topic.to_string(),
        options: canned.options,
        source,
        from_backend,
        timestamp: Utc::now().timestamp(),
    }
}
