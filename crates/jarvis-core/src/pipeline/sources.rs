//! Portfolio data available to the pipeline.

use super::types::{LocalRecord, QueryAnalysis};
use crate::error::{JarvisError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Source of portfolio records.
#[async_trait]
pub trait LocalDataSource: Send + Sync {
    /// Up to `limit` records relevant to the message, most relevant first.
    async fn fetch(
        &self,
        message: &str,
        analysis: &QueryAnalysis,
        limit: usize,
    ) -> Result<Vec<LocalRecord>>;
}

/// In-memory record set, typically loaded from a JSON file at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalData {
    records: Vec<LocalRecord>,
}

impl StaticLocalData {
    pub fn new(records: Vec<LocalRecord>) -> Self {
        Self { records }
    }

    /// Load a JSON array of records.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| JarvisError::Config {
            message: format!("Failed to read records file {}: {}", path.display(), e),
        })?;
        let records: Vec<LocalRecord> = serde_json::from_str(&contents)?;
        debug!("Loaded {} local records from {}", records.len(), path.display());
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn terms(message: &str, analysis: &QueryAnalysis) -> HashSet<String> {
        message
            .split(|c: char| !c.is_alphanumeric())
            .chain(analysis.topics.iter().map(String::as_str))
            .map(str::to_lowercase)
            .filter(|t| t.chars().count() > 2)
            .collect()
    }
}

#[async_trait]
impl LocalDataSource for StaticLocalData {
    /// Ranks by how many query terms appear in the title and description.
    /// Records with no overlap still fill remaining slots in file order.
    async fn fetch(
        &self,
        message: &str,
        analysis: &QueryAnalysis,
        limit: usize,
    ) -> Result<Vec<LocalRecord>> {
        let terms = Self::terms(message, analysis);
        let mut scored: Vec<(usize, &LocalRecord)> = self
            .records
            .iter()
            .map(|record| {
                let haystack = format!("{} {}", record.title, record.description).to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score, record)
            })
            .collect();

        // Stable sort keeps file order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::LocalRecordKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(title: &str, description: &str) -> LocalRecord {
        LocalRecord {
            kind: LocalRecordKind::Project,
            title: title.into(),
            description: description.into(),
        }
    }

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let data = StaticLocalData::new(vec![
            record("Weather app", "Flutter mobile app"),
            record("Chat bot", "Rust backend for an AI assistant"),
            record("Blog engine", "Static site generator in Rust"),
        ]);

        let found = data
            .fetch("Tell me about your Rust AI assistant", &QueryAnalysis::default(), 2)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Chat bot");
        assert_eq!(found[1].title, "Blog engine");
    }

    #[tokio::test]
    async fn test_topics_contribute() {
        let data = StaticLocalData::new(vec![record("A", "nothing"), record("B", "kubernetes cluster")]);
        let analysis = QueryAnalysis {
            topics: vec!["kubernetes".into()],
            ..QueryAnalysis::default()
        };
        let found = data.fetch("hi", &analysis, 1).await.unwrap();
        assert_eq!(found[0].title, "B");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"kind": "blog", "title": "Ownership", "description": "Borrowing explained"}}]"#
        )
        .unwrap();
        let data = StaticLocalData::from_json_file(file.path()).unwrap();
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            StaticLocalData::from_json_file("/nonexistent/records.json"),
            Err(JarvisError::Config { .. })
        ));
    }
}
