//! Output encodings for formatted answers.

use super::{FormattedAnswer, SourceRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// Wire encoding of the answer content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    PlainText,
    Markdown,
    Html,
    Structured,
}

impl Encoding {
    /// Lenient lookup: unknown names map to [`Encoding::PlainText`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Encoding::Markdown,
            "html" => Encoding::Html,
            "structured" | "json" => Encoding::Structured,
            _ => Encoding::PlainText,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::PlainText => "plain_text",
            Encoding::Markdown => "markdown",
            Encoding::Html => "html",
            Encoding::Structured => "structured",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render the styled text together with its sources and metadata.
pub(super) fn encode(
    encoding: Encoding,
    text: &str,
    sources: &[SourceRef],
    metadata: &BTreeMap<String, Value>,
    answer_style: &str,
) -> String {
    match encoding {
        Encoding::PlainText => text.to_string(),
        Encoding::Markdown => markdown(text, sources, metadata),
        Encoding::Html => html(text, sources, metadata),
        Encoding::Structured => {
            let doc = json!({
                "content": text,
                "sources": sources,
                "metadata": metadata,
                "style": answer_style,
            });
            serde_json::to_string_pretty(&doc).unwrap_or_else(|_| text.to_string())
        }
    }
}

fn markdown(text: &str, sources: &[SourceRef], metadata: &BTreeMap<String, Value>) -> String {
    let mut out = text.to_string();

    if !sources.is_empty() {
        out.push_str("\n\n**Sources:**\n");
        for source in sources {
            if source.url.is_empty() {
                let _ = write!(out, "\n- {} ({})", source.title, source.source.label());
            } else {
                let _ = write!(
                    out,
                    "\n- [{}]({}) ({})",
                    source.title,
                    source.url,
                    source.source.label()
                );
            }
        }
    }

    if !metadata.is_empty() {
        out.push_str("\n\n**Metadata:**\n");
        for (key, value) in metadata {
            let _ = write!(out, "\n- **{}:** {}", key_label(key), value_text(value));
        }
    }

    out
}

fn html(text: &str, sources: &[SourceRef], metadata: &BTreeMap<String, Value>) -> String {
    let body = escape_html(text).replace('\n', "<br>\n");
    let mut out = format!("<div class=\"jarvis-response\"><p>{}</p>", body);

    if !sources.is_empty() {
        out.push_str("<div class=\"sources-container\"><h4>Sources:</h4><ul class=\"sources-list\">");
        for source in sources {
            out.push_str("<li class=\"source-item\">");
            if source.url.is_empty() {
                let _ = write!(out, "<span class=\"source-name\">{}</span>", escape_html(&source.title));
            } else {
                let _ = write!(
                    out,
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener\" class=\"source-link\">{}</a>",
                    escape_html(&source.url),
                    escape_html(&source.title)
                );
            }
            let _ = write!(out, " <span class=\"source-type\">({})</span></li>", source.source.label());
        }
        out.push_str("</ul></div>");
    }

    if !metadata.is_empty() {
        out.push_str("<div class=\"metadata-grid\">");
        for (key, value) in metadata {
            let _ = write!(
                out,
                "<div class=\"metadata-item\"><span class=\"metadata-key\">{}:</span> <span class=\"metadata-value\">{}</span></div>",
                escape_html(&key_label(key)),
                escape_html(&value_text(value))
            );
        }
        out.push_str("</div>");
    }

    out.push_str("</div>");
    out
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `tokens_used` -> `Tokens used`, `analysis.type` -> `Analysis type`.
fn key_label(key: &str) -> String {
    let spaced = key.replace(['_', '.'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_falls_back_to_plain_text() {
        assert_eq!(Encoding::parse("HTML"), Encoding::Html);
        assert_eq!(Encoding::parse("json"), Encoding::Structured);
        assert_eq!(Encoding::parse("yaml"), Encoding::PlainText);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_key_labels_and_values() {
        assert_eq!(key_label("tokens_used"), "Tokens used");
        assert_eq!(key_label("analysis.type"), "Analysis type");
        assert_eq!(value_text(&json!(true)), "Yes");
        assert_eq!(value_text(&json!(["rust", "ai"])), "rust, ai");
        assert_eq!(value_text(&json!(42)), "42");
    }
}
