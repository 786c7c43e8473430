use serde::Deserialize;
use std::collections::{ HashMap, HashSet };
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;

use crate::models::chat::Language;

const BUILTIN_TOPICS: &str = include_str!("../../json/topics.json");

pub const AI_SYSTEM_PROMPT: &str = "ai_system_prompt";

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    TopicNotFound(String),
    Invalid(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::TopicNotFound(key) => write!(f, "Topic definition '{}' not found", key),
            PromptError::Invalid(msg) => write!(f, "Invalid topic table: {}", msg),
            PromptError::IoError(e) => write!(f, "Topic file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Topic JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CannedResponse {
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TopicDefinition {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    pub responses: HashMap<Language, CannedResponse>,
}

/// Topic table plus the prompt templates used by the completion step.
/// Loaded once at start-up and shared read-only afterwards.
#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_language")]
    pub default_language: Language,
    pub fallback_topic: String,
    pub topics: Vec<TopicDefinition>,
    #[serde(default)]
    pub prompt_templates: HashMap<String, String>,
    #[serde(default)]
    pub apology: HashMap<Language, String>,
}

fn default_language() -> Language {
    Language::En
}

impl PromptConfig {
    pub fn validate(&self) -> Result<(), PromptError> {
        if self.topics.is_empty() {
            return Err(PromptError::Invalid("no topics defined".to_string()));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.name.trim().is_empty() {
                return Err(PromptError::Invalid("topic with an empty name".to_string()));
            }
            if !seen.insert(topic.name.as_str()) {
                return Err(PromptError::Invalid(format!("duplicate topic '{}'", topic.name)));
            }
            if !topic.responses.contains_key(&self.default_language) {
                return Err(
                    PromptError::Invalid(
                        format!(
                            "topic '{}' has no response for default language '{}'",
                            topic.name,
                            self.default_language
                        )
                    )
                );
            }
            if topic.patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(
                    PromptError::Invalid(format!("topic '{}' has a blank pattern", topic.name))
                );
            }
        }

        if self.topic(&self.fallback_topic).is_none() {
            return Err(PromptError::TopicNotFound(self.fallback_topic.clone()));
        }
        if !self.prompt_templates.contains_key(AI_SYSTEM_PROMPT) {
            return Err(
                PromptError::TemplateNotFound(format!("prompt_templates:{}", AI_SYSTEM_PROMPT))
            );
        }
        if !self.apology.contains_key(&self.default_language) {
            return Err(
                PromptError::Invalid(
                    format!("no apology message for default language '{}'", self.default_language)
                )
            );
        }
        Ok(())
    }

    pub fn topic(&self, name: &str) -> Option<&TopicDefinition> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn apology(&self, language: Language) -> &str {
        self.apology
            .get(&language)
            .or_else(|| self.apology.get(&self.default_language))
            .map(|s| s.as_str())
            .unwrap_or_default()
    }
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

pub fn builtin_prompts() -> Result<Arc<PromptConfig>, PromptError> {
    load_prompts_from_str(BUILTIN_TOPICS).map(Arc::new)
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read topics file '{}': {}", path, e))?;
    let config = load_prompts_from_str(&file_content).map_err(|e|
        format!("Failed to load topics file '{}': {}", path, e)
    )?;
    Ok(Arc::new(config))
}

/// Loads the topic table from `path`, or the built-in table when no path is configured.
pub fn initialize_prompts(
    path: Option<&str>
) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let config = match path {
        Some(p) if !p.trim().is_empty() => {
            info!("Loading topic table from: {}", p);
            load_prompts(p)?
        }
        _ => {
            info!("Using built-in topic table");
            builtin_prompts()?
        }
    };
    info!(
        "Topic table ready: {} topics, fallback '{}', default language '{}'",
        config.topics.len(),
        config.fallback_topic,
        config.default_language
    );
    Ok(config)
}

fn get_prompt_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.prompt_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("prompt_templates:{}", key)))
}

pub fn get_ai_system_prompt(
    config: &PromptConfig,
    language_name: &str,
    projects: &str,
    experiences: &str,
    seed: &str
) -> Result<String, PromptError> {
    let template = get_prompt_template(config, AI_SYSTEM_PROMPT)?;

    Ok(
        template
            .replace("{language_name}", language_name)
            .replace("{projects}", projects)
            .replace("{experiences}", experiences)
            .replace("{seed}", seed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_table() -> serde_json::Value {
        serde_json::json!({
            "fallback_topic": "fallback",
            "topics": [
                {
                    "name": "skills",
                    "patterns": ["skill"],
                    "responses": { "en": { "text": "Rust", "options": ["More"] } }
                },
                {
                    "name": "fallback",
                    "responses": { "en": { "text": "Pardon?" } }
                }
            ],
            "prompt_templates": { "ai_system_prompt": "Answer in {language_name}. {seed}" },
            "apology": { "en": "Sorry" }
        })
    }

    #[test]
    fn builtin_table_is_valid() {
        let config = builtin_prompts().unwrap();
        assert_eq!(config.default_language, Language::En);
        assert!(config.topic("skills").is_some());
        assert!(config.topic(&config.fallback_topic).is_some());
        for topic in &config.topics {
            assert!(topic.responses.contains_key(&Language::Ar), "{} lacks arabic", topic.name);
        }
    }

    #[test]
    fn minimal_table_loads_with_defaults() {
        let config = load_prompts_from_str(&minimal_table().to_string()).unwrap();
        assert_eq!(config.default_language, Language::En);
        assert!(config.topic("fallback").unwrap().patterns.is_empty());
        assert_eq!(config.apology(Language::Ar), "Sorry");
    }

    #[test]
    fn missing_fallback_topic_is_rejected() {
        let mut table = minimal_table();
        table["fallback_topic"] = "unknown".into();
        let err = load_prompts_from_str(&table.to_string()).unwrap_err();
        assert!(matches!(err, PromptError::TopicNotFound(name) if name == "unknown"));
    }

    #[test]
    fn missing_default_language_response_is_rejected() {
        let mut table = minimal_table();
        table["default_language"] = "ar".into();
        table["apology"]["ar"] = "Sorry".into();
        let err = load_prompts_from_str(&table.to_string()).unwrap_err();
        assert!(matches!(err, PromptError::Invalid(_)));
    }

    #[test]
    fn duplicate_topics_and_blank_patterns_are_rejected() {
        let mut table = minimal_table();
        table["topics"][1]["name"] = "skills".into();
        assert!(load_prompts_from_str(&table.to_string()).is_err());

        let mut table = minimal_table();
        table["topics"][0]["patterns"] = serde_json::json!(["  "]);
        assert!(load_prompts_from_str(&table.to_string()).is_err());
    }

    #[test]
    fn missing_system_prompt_is_rejected() {
        let mut table = minimal_table();
        table["prompt_templates"] = serde_json::json!({});
        let err = load_prompts_from_str(&table.to_string()).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(_)));
    }

    #[test]
    fn system_prompt_placeholders_are_filled() {
        let config = load_prompts_from_str(&minimal_table().to_string()).unwrap();
        let prompt = get_ai_system_prompt(&config, "Arabic", "", "", "Seed text").unwrap();
        assert_eq!(prompt, "Answer in Arabic. Seed text");
    }

    #[test]
    fn topics_load_from_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("portfolio-assistant-topics-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(minimal_table().to_string().as_bytes()).unwrap();

        let config = initialize_prompts(path.to_str()).unwrap();
        assert_eq!(config.topics.len(), 2);
        fs::remove_file(&path).ok();

        assert!(load_prompts("/nonexistent/topics.json").is_err());
    }
}
