use log::{ debug, info, warn };
use std::sync::Arc;
use std::time::Duration;

use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::llm::chat::{ ChatClient, CompletionRequest, PromptMessage };
use crate::models::chat::{ ChatRole, HistoryTurn, Language };
use crate::models::portfolio::{ Experience, Project };

const DESCRIPTION_CHARS: usize = 280;
const TEMPERATURE: f32 = 0.6;
const MAX_TOKENS: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    TimedOut,
    Failed(String),
    Empty,
}

/// Result of the optional completion step. Every branch is a normal outcome;
/// callers fall back to the canned answer on `Skipped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    Composed(String),
    Skipped(SkipReason),
}

pub struct AiComposer {
    client: Option<Arc<dyn ChatClient>>,
    config: Arc<PromptConfig>,
    timeout: Duration,
    history_limit: usize,
    max_grounding_items: usize,
}

fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

fn technologies_suffix(technologies: &[String]) -> String {
    if technologies.is_empty() {
        String::new()
    } else {
        format!(" (Tech: {})", technologies.join(", "))
    }
}

pub fn format_projects(projects: &[Project], max_items: usize) -> String {
    if projects.is_empty() {
        return "(none available)".to_string();
    }
    projects
        .iter()
        .take(max_items)
        .map(|p| {
            let mut line = format!("- {}", p.title.trim());
            if !p.description.trim().is_empty() {
                line.push_str(&format!(": {}", truncate_chars(&p.description, DESCRIPTION_CHARS)));
            }
            line.push_str(&technologies_suffix(&p.technologies));
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_experiences(experiences: &[Experience], max_items: usize) -> String {
    if experiences.is_empty() {
        return "(none available)".to_string();
    }
    experiences
        .iter()
        .take(max_items)
        .map(|e| {
            let mut line = format!("- {}", e.title.trim());
            if !e.company.trim().is_empty() {
                line.push_str(&format!(" at {}", e.company.trim()));
            }
            if !e.period.trim().is_empty() {
                line.push_str(&format!(" ({})", e.period.trim()));
            }
            if !e.description.trim().is_empty() {
                line.push_str(&format!(": {}", truncate_chars(&e.description, DESCRIPTION_CHARS)));
            }
            line.push_str(&technologies_suffix(&e.technologies));
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl AiComposer {
    pub fn new(
        client: Option<Arc<dyn ChatClient>>,
        config: Arc<PromptConfig>,
        timeout: Duration,
        history_limit: usize,
        max_grounding_items: usize
    ) -> Self {
        Self { client, config, timeout, history_limit, max_grounding_items }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn build_request(
        &self,
        message: &str,
        language: Language,
        history: &[HistoryTurn],
        projects: &[Project],
        experiences: &[Experience],
        seed_text: Option<&str>
    ) -> Result<CompletionRequest, PromptError> {
        let system = prompt::get_ai_system_prompt(
            &self.config,
            language.display_name(),
            &format_projects(projects, self.max_grounding_items),
            &format_experiences(experiences, self.max_grounding_items),
            seed_text.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("(none)")
        )?;

        let skip = history.len().saturating_sub(self.history_limit);
        let mut messages: Vec<PromptMessage> = history[skip..]
            .iter()
            .map(|turn| match turn.role {
                ChatRole::User => PromptMessage::user(turn.text.clone()),
                ChatRole::Assistant => PromptMessage::assistant(turn.text.clone()),
            })
            .collect();
        messages.push(PromptMessage::user(message));

        Ok(CompletionRequest {
            system,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        })
    }

    /// One best-effort completion call. Never retried; failures come back as `Skipped`.
    pub async fn compose(
        &self,
        message: &str,
        language: Language,
        history: &[HistoryTurn],
        projects: &[Project],
        experiences: &[Experience],
        seed_text: Option<&str>
    ) -> ComposeOutcome {
        let client = match &self.client {
            Some(c) => c,
            None => {
                return ComposeOutcome::Skipped(SkipReason::Disabled);
            }
        };

        let request = match
            self.build_request(message, language, history, projects, experiences, seed_text)
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not build completion prompt: {}", e);
                return ComposeOutcome::Skipped(SkipReason::Failed(e.to_string()));
            }
        };
        debug!(
            "Calling completion model '{}' with {} message(s)",
            client.get_model(),
            request.messages.len()
        );

        match tokio::time::timeout(self.timeout, client.complete(&request)).await {
            Err(_) => {
                warn!("Completion call timed out after {:?}", self.timeout);
                ComposeOutcome::Skipped(SkipReason::TimedOut)
            }
            Ok(Err(e)) => {
                warn!("Completion call failed: {}", e);
                ComposeOutcome::Skipped(SkipReason::Failed(e.to_string()))
            }
            Ok(Ok(resp)) => {
                let text = resp.response.trim();
                if text.is_empty() {
                    info!("Completion model returned no content");
                    ComposeOutcome::Skipped(SkipReason::Empty)
                } else {
                    ComposeOutcome::Composed(text.to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::builtin_prompts;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::error::Error as StdError;
    use std::sync::Mutex;

    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    struct StubClient {
        reply: Reply,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubClient {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self { reply, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatClient for StubClient {
        async fn complete(
            &self,
            request: &CompletionRequest
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            self.seen.lock().unwrap().push(request.clone());
            match self.reply {
                Reply::Text(t) => Ok(CompletionResponse { response: t.to_string() }),
                Reply::Fail => Err("upstream 502".into()),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(CompletionResponse { response: "late".into() })
                }
            }
        }

        fn get_model(&self) -> String {
            "stub".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn composer(client: Option<Arc<dyn ChatClient>>) -> AiComposer {
        AiComposer::new(client, builtin_prompts().unwrap(), Duration::from_millis(200), 10, 12)
    }

    fn history(n: usize) -> Vec<HistoryTurn> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
                HistoryTurn::new(role, format!("turn {}", i))
            })
            .collect()
    }

    #[test]
    fn prompt_keeps_last_ten_turns_then_current_message() {
        let c = composer(None);
        let request = c
            .build_request("Skills?", Language::En, &history(14), &[], &[], None)
            .unwrap();
        assert_eq!(request.messages.len(), 11);
        assert_eq!(request.messages[0].content, "turn 4");
        assert_eq!(request.messages[10], PromptMessage::user("Skills?"));
    }

    #[test]
    fn prompt_carries_language_grounding_and_seed() {
        let c = composer(None);
        let projects = vec![Project {
            title: "Shop".into(),
            description: "x".repeat(400),
            technologies: vec!["React".into(), "Node.js".into()],
        }];
        let experiences = vec![Experience {
            title: "Engineer".into(),
            company: "Acme".into(),
            period: "2022".into(),
            ..Experience::default()
        }];
        let request = c
            .build_request("hi", Language::Ar, &[], &projects, &experiences, Some("Canned seed"))
            .unwrap();
        assert!(request.system.contains("Reply in Arabic"));
        assert!(request.system.contains("- Shop: "));
        assert!(request.system.contains("... (Tech: React, Node.js)"));
        assert!(request.system.contains("- Engineer at Acme (2022)"));
        assert!(request.system.contains("Canned seed"));
        assert!(!request.system.contains(&"x".repeat(281)));
    }

    #[test]
    fn empty_grounding_is_stated() {
        assert_eq!(format_projects(&[], 5), "(none available)");
        let many = vec![Project { title: "P".into(), ..Project::default() }; 20];
        assert_eq!(format_projects(&many, 3).lines().count(), 3);
    }

    #[tokio::test]
    async fn disabled_composer_skips() {
        let outcome = composer(None).compose("hi", Language::En, &[], &[], &[], None).await;
        assert_eq!(outcome, ComposeOutcome::Skipped(SkipReason::Disabled));
    }

    #[tokio::test]
    async fn successful_completion_is_trimmed() {
        let stub = StubClient::new(Reply::Text("  I know Rust.  "));
        let client: Arc<dyn ChatClient> = stub.clone();
        let c = composer(Some(client));
        let outcome = c.compose("skills?", Language::En, &history(3), &[], &[], Some("seed")).await;
        assert_eq!(outcome, ComposeOutcome::Composed("I know Rust.".into()));
        assert_eq!(stub.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_completion_is_empty() {
        let c = composer(Some(StubClient::new(Reply::Text(" \n ")) as Arc<dyn ChatClient>));
        let outcome = c.compose("skills?", Language::En, &[], &[], &[], None).await;
        assert_eq!(outcome, ComposeOutcome::Skipped(SkipReason::Empty));
    }

    #[tokio::test]
    async fn failures_are_not_retried() {
        let stub = StubClient::new(Reply::Fail);
        let client: Arc<dyn ChatClient> = stub.clone();
        let c = composer(Some(client));
        let outcome = c.compose("skills?", Language::En, &[], &[], &[], None).await;
        assert!(matches!(outcome, ComposeOutcome::Skipped(SkipReason::Failed(msg)) if msg.contains("502")));
        assert_eq!(stub.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_completion_times_out() {
        let c = composer(Some(StubClient::new(Reply::Hang) as Arc<dyn ChatClient>));
        let outcome = c.compose("skills?", Language::En, &[], &[], &[], None).await;
        assert_eq!(outcome, ComposeOutcome::Skipped(SkipReason::TimedOut));
    }
}
