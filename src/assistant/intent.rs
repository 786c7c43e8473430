use log::debug;
use std::sync::Arc;

use crate::config::prompt::PromptConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMatch {
    pub topic: String,
    pub score: usize,
    pub matched_patterns: Vec<String>,
    pub is_fallback: bool,
}

struct CompiledTopic {
    name: String,
    patterns: Vec<String>,
}

/// Scores a message against the topic table by counting distinct pattern hits.
/// Ties go to the topic declared first; no hits selects the fallback topic.
pub struct IntentMatcher {
    topics: Vec<CompiledTopic>,
    fallback_topic: String,
}

/// Lowercases, folds Arabic letter variants, drops diacritics and turns
/// punctuation into single spaces so patterns and messages compare alike.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(|c| c.to_lowercase()) {
        match c {
            'أ' | 'إ' | 'آ' | 'ٱ' => out.push('ا'),
            'ى' => out.push('ي'),
            'ة' => out.push('ه'),
            // tashkeel and tatweel
            '\u{064B}'..='\u{0652}' | '\u{0670}' | '\u{0640}' => {}
            c if c.is_alphanumeric() => out.push(c),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl IntentMatcher {
    pub fn new(config: Arc<PromptConfig>) -> Self {
        let topics = config.topics
            .iter()
            .map(|topic| {
                let mut patterns: Vec<String> = Vec::with_capacity(topic.patterns.len());
                for pattern in &topic.patterns {
                    let normalized = normalize_text(pattern);
                    if !normalized.is_empty() && !patterns.contains(&normalized) {
                        patterns.push(normalized);
                    }
                }
                CompiledTopic { name: topic.name.clone(), patterns }
            })
            .collect();

        Self { topics, fallback_topic: config.fallback_topic.clone() }
    }

    pub fn match_topic(&self, message: &str) -> TopicMatch {
        let text = normalize_text(message);

        let mut best: Option<(&CompiledTopic, Vec<String>)> = None;
        for topic in &self.topics {
            let hits: Vec<String> = topic.patterns
                .iter()
                .filter(|p| text.contains(p.as_str()))
                .cloned()
                .collect();
            let best_score = best.as_ref().map_or(0, |(_, h)| h.len());
            if hits.len() > best_score {
                best = Some((topic, hits));
            }
        }

        match best {
            Some((topic, hits)) => {
                debug!("Matched topic '{}' with {} pattern(s): {:?}", topic.name, hits.len(), hits);
                TopicMatch {
                    topic: topic.name.clone(),
                    score: hits.len(),
                    matched_patterns: hits,
                    is_fallback: topic.name == self.fallback_topic,
                }
            }
            None => {
                debug!("No pattern matched; using fallback topic '{}'", self.fallback_topic);
                TopicMatch {
                    topic: self.fallback_topic.clone(),
                    score: 0,
                    matched_patterns: Vec::new(),
                    is_fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::{ builtin_prompts, load_prompts_from_str };
    use serde_json::json;

    fn matcher_for(topics: serde_json::Value) -> IntentMatcher {
        let table =
            json!({
            "fallback_topic": "fallback",
            "topics": topics,
            "prompt_templates": { "ai_system_prompt": "" },
            "apology": { "en": "Sorry" }
        });
        IntentMatcher::new(Arc::new(load_prompts_from_str(&table.to_string()).unwrap()))
    }

    fn topic(name: &str, patterns: &[&str]) -> serde_json::Value {
        json!({ "name": name, "patterns": patterns, "responses": { "en": { "text": name } } })
    }

    #[test]
    fn skills_question_matches_skills() {
        let matcher = IntentMatcher::new(builtin_prompts().unwrap());
        let m = matcher.match_topic("What are your skills?");
        assert_eq!(m.topic, "skills");
        assert!(!m.is_fallback);
    }

    #[test]
    fn no_hit_selects_fallback() {
        let matcher = IntentMatcher::new(builtin_prompts().unwrap());
        let m = matcher.match_topic("zzzz qqqq");
        assert_eq!(m.topic, "fallback");
        assert_eq!(m.score, 0);
        assert!(m.is_fallback);

        assert_eq!(matcher.match_topic("").topic, "fallback");
    }

    #[test]
    fn highest_distinct_hit_count_wins() {
        let matcher = matcher_for(
            json!([
            topic("contact", &["email"]),
            topic("hiring", &["hire", "freelance"]),
            topic("fallback", &[])
        ])
        );
        let m = matcher.match_topic("Can I email you to hire you for freelance work?");
        assert_eq!(m.topic, "hiring");
        assert_eq!(m.score, 2);
        assert_eq!(m.matched_patterns, vec!["hire", "freelance"]);
    }

    #[test]
    fn repeated_pattern_counts_once() {
        let matcher = matcher_for(
            json!([
            topic("a", &["rust", "Rust", "RUST!"]),
            topic("b", &["go", "web"]),
            topic("fallback", &[])
        ])
        );
        let m = matcher.match_topic("rust rust rust on the web with go");
        assert_eq!(m.topic, "b");
        assert_eq!(m.score, 2);
    }

    #[test]
    fn ties_go_to_first_declared_topic() {
        let matcher = matcher_for(
            json!([
            topic("first", &["project"]),
            topic("second", &["github"]),
            topic("fallback", &[])
        ])
        );
        assert_eq!(matcher.match_topic("Is the project on GitHub?").topic, "first");

        let reversed = matcher_for(
            json!([
            topic("second", &["github"]),
            topic("first", &["project"]),
            topic("fallback", &[])
        ])
        );
        assert_eq!(reversed.match_topic("Is the project on GitHub?").topic, "second");
    }

    #[test]
    fn matching_is_case_insensitive_and_ignores_punctuation() {
        let matcher = matcher_for(json!([topic("stack", &["tech stack"]), topic("fallback", &[])]));
        assert_eq!(matcher.match_topic("Your TECH-STACK?").topic, "stack");
    }

    #[test]
    fn arabic_letter_variants_match() {
        let matcher = IntentMatcher::new(builtin_prompts().unwrap());
        assert_eq!(matcher.match_topic("أهلاً").topic, "greeting");
        assert_eq!(matcher.match_topic("مَن أنتَ؟").topic, "about");
        assert_eq!(matcher.match_topic("اعرض مشاريعك").topic, "projects");
    }

    #[test]
    fn normalization_collapses_whitespace_and_folds_letters() {
        assert_eq!(normalize_text("  Hello,\n\tWORLD!! "), "hello world");
        assert_eq!(normalize_text("مدرسةٌ إلى"), "مدرسه الي");
    }

    #[test]
    fn same_input_always_yields_same_topic() {
        let matcher = IntentMatcher::new(builtin_prompts().unwrap());
        let first = matcher.match_topic("hello, can I see your projects?");
        for _ in 0..5 {
            assert_eq!(matcher.match_topic("hello, can I see your projects?"), first);
        }
    }
}
