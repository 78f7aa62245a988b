//! Text styles applied before encoding.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+[.)]|[-•*])").unwrap());

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").unwrap());

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s+(.*)$").unwrap());

static KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(summary|conclusion|recommendation):").unwrap());

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\*)?(\d+(?:[.,]\d+)?%)(\*\*)?").unwrap());

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.[ \t]+").unwrap());

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*?\b(amazing|incredible|wonderful|fantastic|ajoyib|hayratlanarli|mukammal)\b\*?")
        .unwrap()
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

static SPACED_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n+").unwrap());

/// Presentation style for answer text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    #[default]
    Jarvis,
    Technical,
    Creative,
    Simple,
    Raw,
}

impl ResponseStyle {
    /// Lenient lookup: unknown names map to [`ResponseStyle::Raw`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jarvis" => ResponseStyle::Jarvis,
            "technical" => ResponseStyle::Technical,
            "creative" => ResponseStyle::Creative,
            "simple" => ResponseStyle::Simple,
            _ => ResponseStyle::Raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStyle::Jarvis => "jarvis",
            ResponseStyle::Technical => "technical",
            ResponseStyle::Creative => "creative",
            ResponseStyle::Simple => "simple",
            ResponseStyle::Raw => "raw",
        }
    }

    pub fn apply(&self, text: &str, language: &str) -> String {
        match self {
            ResponseStyle::Jarvis => jarvis(text, language),
            ResponseStyle::Technical => technical(text),
            ResponseStyle::Creative => creative(text),
            ResponseStyle::Simple => simple(text),
            ResponseStyle::Raw => text.to_string(),
        }
    }
}

impl fmt::Display for ResponseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form of address for a language code. Unknown languages use the Uzbek form.
pub fn greeting(language: &str) -> &'static str {
    match language {
        "ru" => "Сэр, ",
        _ => "Sir, ",
    }
}

fn jarvis(text: &str, language: &str) -> String {
    let text = text.trim();
    let addressed = text.starts_with("Sir") || text.starts_with("Сэр");
    let text = if addressed || text.is_empty() {
        text.to_string()
    } else {
        format!("{}{}", greeting(language), text)
    };

    BLANK_LINES
        .split(&text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|paragraph| match LIST_MARKER.find(paragraph) {
            Some(marker) if matches!(marker.as_str(), "-" | "*" | "•") => {
                format!("• {}", paragraph[marker.end()..].trim_start())
            }
            Some(_) => format!("• {}", paragraph),
            None => paragraph.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn technical(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    for line in text.lines() {
        let line = line.trim();
        if let Some(caps) = HEADING.captures(line) {
            out.push_str("\n## ");
            out.push_str(&caps[1]);
            out.push('\n');
        } else if KEY_LINE.is_match(line) {
            let inner = line.trim_matches('*');
            out.push_str("\n**");
            out.push_str(inner);
            out.push_str("**\n");
        } else {
            out.push_str(&bold_percentages(line));
            out.push('\n');
        }
    }
    out.trim().to_string()
}

fn bold_percentages(line: &str) -> String {
    PERCENTAGE
        .replace_all(line, |caps: &regex::Captures<'_>| format!("**{}**", &caps[2]))
        .into_owned()
}

fn creative(text: &str) -> String {
    let text = SENTENCE_BREAK.replace_all(text.trim(), ".\n\n");
    EMPHASIS
        .replace_all(&text, |caps: &regex::Captures<'_>| format!("*{}*", &caps[1]))
        .into_owned()
}

fn simple(text: &str) -> String {
    let text = TAG.replace_all(text, "");
    SPACED_BLANK_LINES
        .replace_all(&text, "\n")
        .trim()
        .to_string()
}
