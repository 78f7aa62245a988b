//! Deterministic system-prompt composition.

use super::types::{ConversationTurn, LocalRecord, QueryAnalysis};
use crate::config::PipelineConfig;
use crate::search::SearchResult;
use std::fmt::Write as _;

/// Default assistant persona.
pub const DEFAULT_PERSONA: &str = "\
You are JARVIS, the AI assistant of a personal developer portfolio.
You answer questions about the portfolio owner, their projects and writing,
and general technical topics, using web search results when provided.

STYLE:
- Speak like Tony Stark's JARVIS: composed, precise and courteous
- Address the user as \"Sir\"
- Be accurate and concise
- Cite your sources when you use them
- Stay professional and helpful";

const CLOSING: &str = "Now answer the user's question.";

/// Builds the system prompt from the persona and gathered context.
///
/// Output depends only on the inputs: no clock, no randomness. The result
/// is hard-cut to `max_chars` characters.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    max_chars: usize,
    max_records: usize,
    max_snippets: usize,
    max_turns: usize,
}

impl PromptBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            max_chars: config.max_prompt_chars,
            max_records: config.max_local_records,
            max_snippets: config.max_search_snippets,
            max_turns: config.max_history_turns,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn build(
        &self,
        analysis: &QueryAnalysis,
        records: &[LocalRecord],
        results: &[SearchResult],
        history: &[ConversationTurn],
    ) -> String {
        let mut prompt = String::with_capacity(self.max_chars.min(8192));
        prompt.push_str(self.persona.trim_end());

        prompt.push_str("\n\nQUERY ANALYSIS:\n");
        let _ = writeln!(prompt, "Type: {}", analysis.query_type);
        let _ = writeln!(prompt, "Category: {}", analysis.category);
        let _ = writeln!(prompt, "Complexity: {}", analysis.complexity);
        let _ = writeln!(prompt, "Sentiment: {}", analysis.sentiment);
        let _ = writeln!(prompt, "Language: {}", analysis.language);
        let topics = if analysis.topics.is_empty() {
            "none".to_string()
        } else {
            analysis.topics.join(", ")
        };
        let _ = writeln!(prompt, "Topics: {}", topics);

        if !records.is_empty() && self.max_records > 0 {
            prompt.push_str("\nPORTFOLIO DATA:\n");
            for record in records.iter().take(self.max_records) {
                let _ = writeln!(
                    prompt,
                    "- [{}] {}: {}",
                    record.kind.label(),
                    record.title,
                    record.description
                );
            }
        }

        if !results.is_empty() && self.max_snippets > 0 {
            prompt.push_str("\nWEB SEARCH RESULTS:\n");
            for result in results.iter().take(self.max_snippets) {
                let _ = writeln!(
                    prompt,
                    "- [{}] {}: {}",
                    result.source.label(),
                    result.title,
                    result.snippet
                );
            }
        }

        if !history.is_empty() && self.max_turns > 0 {
            prompt.push_str("\nPREVIOUS CONVERSATION:\n");
            let skip = history.len().saturating_sub(self.max_turns);
            for turn in &history[skip..] {
                let _ = writeln!(prompt, "User: {}", turn.query);
                let _ = writeln!(prompt, "JARVIS: {}", turn.response);
            }
        }

        prompt.push('\n');
        prompt.push_str(CLOSING);

        truncate_to_chars(prompt, self.max_chars)
    }
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
pub fn truncate_to_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::LocalRecordKind;
    use crate::search::{ResultKind, SearchSource};
    use chrono::Utc;

    fn builder(max_chars: usize) -> PromptBuilder {
        PromptBuilder::new(&PipelineConfig {
            max_prompt_chars: max_chars,
            ..PipelineConfig::default()
        })
    }

    fn turn(n: usize) -> ConversationTurn {
        ConversationTurn {
            query: format!("question {}", n),
            response: format!("answer {}", n),
        }
    }

    #[test]
    fn test_sections_in_order() {
        let records = vec![LocalRecord {
            kind: LocalRecordKind::Project,
            title: "Portfolio".into(),
            description: "Personal site".into(),
        }];
        let results = vec![SearchResult::new(
            SearchSource::Wikipedia,
            ResultKind::Encyclopedia,
            0.95,
            Utc::now(),
        )
        .title("Rust")
        .snippet("A language")
        .url("https://w")];

        let prompt = builder(10_000).build(&QueryAnalysis::default(), &records, &results, &[turn(1)]);

        let analysis = prompt.find("QUERY ANALYSIS:").unwrap();
        let portfolio = prompt.find("- [Project] Portfolio: Personal site").unwrap();
        let web = prompt.find("- [Wikipedia] Rust: A language").unwrap();
        let history = prompt.find("User: question 1").unwrap();
        assert!(prompt.starts_with("You are JARVIS"));
        assert!(analysis < portfolio && portfolio < web && web < history);
        assert!(prompt.ends_with(CLOSING));
    }

    #[test]
    fn test_only_most_recent_turns_kept() {
        let history: Vec<_> = (1..=8).map(turn).collect();
        let prompt = builder(10_000).build(&QueryAnalysis::default(), &[], &[], &history);
        assert!(!prompt.contains("question 3\n"));
        assert!(prompt.contains("question 4"));
        assert!(prompt.contains("question 8"));
    }

    #[test]
    fn test_deterministic() {
        let b = builder(4000);
        let history = vec![turn(1)];
        let a = b.build(&QueryAnalysis::default(), &[], &[], &history);
        assert_eq!(a, b.build(&QueryAnalysis::default(), &[], &[], &history));
    }

    #[test]
    fn test_truncated_to_exact_cutoff() {
        let history: Vec<_> = (0..5)
            .map(|_| ConversationTurn {
                query: "ж".repeat(2000),
                response: "x".repeat(2000),
            })
            .collect();
        let prompt = builder(4000).build(&QueryAnalysis::default(), &[], &[], &history);
        assert_eq!(prompt.chars().count(), 4000);
    }

    #[test]
    fn test_truncate_to_chars_respects_boundaries() {
        assert_eq!(truncate_to_chars("héllo".into(), 2), "hé");
        assert_eq!(truncate_to_chars("abc".into(), 10), "abc");
        assert_eq!(truncate_to_chars("abc".into(), 0), "");
    }
}
