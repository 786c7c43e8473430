use std::sync::Arc;

use crate::config::prompt::{ CannedResponse, PromptConfig, PromptError };
use crate::models::chat::Language;

pub struct KnowledgeResponder {
    config: Arc<PromptConfig>,
}

impl KnowledgeResponder {
    pub fn new(config: Arc<PromptConfig>) -> Self {
        Self { config }
    }

    /// Canned answer for `topic` in `language`, falling back to the default
    /// language when the topic has no such localization.
    pub fn respond(&self, topic: &str, language: Language) -> Result<CannedResponse, PromptError> {
        let definition = self.config
            .topic(topic)
            .ok_or_else(|| PromptError::TopicNotFound(topic.to_string()))?;

        definition.responses
            .get(&language)
            .or_else(|| definition.responses.get(&self.config.default_language))
            .cloned()
            .ok_or_else(|| {
                PromptError::Invalid(
                    format!(
                        "topic '{}' has no response for '{}' or the default language",
                        topic,
                        language
                    )
                )
            })
    }
}
