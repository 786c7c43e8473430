pub mod composer;
pub mod intent;
pub mod knowledge;
pub mod language;
pub mod merger;

use chrono::Utc;
use log::{ debug, info };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

use crate::backend::{ self, fetch_grounding_context, GroundingContext, PortfolioBackend };
use crate::cli::Args;
use crate::config::prompt::{ self, CannedResponse, PromptConfig, PromptError };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::{ parse_llm_type, LlmConfig, LlmType };
use crate::models::chat::{ HistoryTurn, Language, ResponseEnvelope, ResponseSource };

use self::composer::{ AiComposer, ComposeOutcome, SkipReason };
use self::intent::{ IntentMatcher, TopicMatch };
use self::knowledge::KnowledgeResponder;
use self::language::detect_language;
use self::merger::merge_response;

#[derive(Debug, ThisError)]
pub enum AssistantError {
    #[error("knowledge lookup failed for '{language}': {source}")]
    Knowledge {
        language: Language,
        #[source]
        source: PromptError,
    },
}

impl AssistantError {
    /// Reply language already chosen for the request when the failure happened.
    pub fn language(&self) -> Language {
        match self {
            AssistantError::Knowledge { language, .. } => *language,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub request_id: String,
    pub message: String,
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub history_limit: usize,
    pub ai_timeout: Duration,
    pub max_grounding_items: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            history_limit: 10,
            ai_timeout: Duration::from_secs(20),
            max_grounding_items: 12,
        }
    }
}

/// The chat helper pipeline: language, topic, canned answer, optional
/// completion, merge. Immutable once built and shared across requests.
pub struct Assistant {
    config: Arc<PromptConfig>,
    matcher: IntentMatcher,
    knowledge: KnowledgeResponder,
    composer: AiComposer,
    backend: Option<Arc<dyn PortfolioBackend>>,
    history_limit: usize,
}

impl Assistant {
    pub fn new(
        config: Arc<PromptConfig>,
        chat_client: Option<Arc<dyn ChatClient>>,
        backend: Option<Arc<dyn PortfolioBackend>>,
        settings: AssistantSettings
    ) -> Self {
        Self {
            matcher: IntentMatcher::new(Arc::clone(&config)),
            knowledge: KnowledgeResponder::new(Arc::clone(&config)),
            composer: AiComposer::new(
                chat_client,
                Arc::clone(&config),
                settings.ai_timeout,
                settings.history_limit,
                settings.max_grounding_items
            ),
            backend,
            history_limit: settings.history_limit,
            config,
        }
    }

    fn initialize_chat_client(
        args: &Args
    ) -> Result<Option<Arc<dyn ChatClient>>, Box<dyn Error + Send + Sync>> {
        let chat_llm_type = parse_llm_type(&args.chat_llm_type)?;
        if chat_llm_type == LlmType::None {
            info!("Chat client disabled; answers come from the topic table only.");
            return Ok(None);
        }

        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={:?}, BaseURL={:?}",
            chat_llm_type,
            chat_config.completion_model.as_deref().unwrap_or("adapter default"),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );
        Ok(chat_client)
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let config = prompt::initialize_prompts(args.topics_path.as_deref())?;
        let chat_client = Self::initialize_chat_client(args)?;
        let backend = backend::initialize_backend(args)?;
        let settings = AssistantSettings {
            history_limit: args.history_limit,
            ai_timeout: Duration::from_secs(args.ai_timeout_secs),
            max_grounding_items: args.max_grounding_items,
        };
        Ok(Self::new(config, chat_client, backend, settings))
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    pub fn ai_enabled(&self) -> bool {
        self.composer.is_enabled()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Best topic for `message` together with its canned answer in `language`.
    pub fn answer_from_knowledge(
        &self,
        message: &str,
        language: Language
    ) -> Result<(TopicMatch, CannedResponse), AssistantError> {
        let matched = self.matcher.match_topic(message);
        let canned = self.knowledge
            .respond(&matched.topic, language)
            .map_err(|source| AssistantError::Knowledge { language, source })?;
        Ok((matched, canned))
    }

    pub async fn respond(
        &self,
        request: AssistantRequest
    ) -> Result<ResponseEnvelope, AssistantError> {
        let AssistantRequest { request_id, message, history } = request;
        let skip = history.len().saturating_sub(self.history_limit);
        let history = &history[skip..];

        let language = detect_language(&message, history, self.config.default_language);
        let (matched, canned) = self.answer_from_knowledge(&message, language)?;
        debug!(
            "[{}] language={} topic={} score={} patterns={:?}",
            request_id,
            language,
            matched.topic,
            matched.score,
            matched.matched_patterns
        );

        let (outcome, from_backend) = if self.composer.is_enabled() {
            let context = match &self.backend {
                Some(b) => fetch_grounding_context(b.as_ref()).await,
                None => GroundingContext::default(),
            };
            // The fallback text only says "I didn't understand"; it would mislead the model.
            let seed = if matched.is_fallback { None } else { Some(canned.text.as_str()) };
            let outcome = self.composer.compose(
                &message,
                language,
                history,
                &context.projects,
                &context.experiences,
                seed
            ).await;
            (outcome, context.from_backend)
        } else {
            (ComposeOutcome::Skipped(SkipReason::Disabled), false)
        };

        let envelope = merge_response(outcome, canned, &matched.topic, language, from_backend);
        info!(
            "[{}] answered topic '{}' in '{}' from {:?} (fromBackend={})",
            request_id,
            envelope.topic,
            envelope.language,
            envelope.source,
            envelope.from_backend
        );
        Ok(envelope)
    }

    /// Static apology returned when the pipeline itself fails.
    pub fn error_envelope(&self, language: Option<Language>) -> ResponseEnvelope {
        let language = language.unwrap_or(self.config.default_language);
        ResponseEnvelope {
            response: self.config.apology(language).to_string(),
            language,
            topic: self.config.fallback_topic.clone(),
            options: Vec::new(),
            source: ResponseSource::ErrorFallback,
            from_backend: false,
            timestamp: Utc::now().timestamp(),
        }
    }
}
