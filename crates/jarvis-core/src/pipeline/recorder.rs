//! Analytics and learning records written after each pipeline run.

use super::types::ConversationTurn;
use crate::config::PipelineDefaults;
use crate::db::Database;
use crate::error::{JarvisError, Result};
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One pipeline run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub session_id: String,
    pub caller: Option<String>,
    pub query: String,
    /// `None` for failed runs.
    pub response: Option<String>,
    pub elapsed_ms: f64,
    pub tokens_used: u32,
    pub model: String,
    /// Where the answer came from: `completion`, `cache` or `error`.
    pub source: String,
    pub cache_hit: bool,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn response_length(&self) -> usize {
        self.response.as_deref().map_or(0, |r| r.chars().count())
    }
}

/// A query/response pair with a quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub query: String,
    pub response: String,
    pub category: String,
    /// Clamped into `0.0..=1.0` on write.
    pub quality_score: f64,
}

/// Aggregate learning statistics for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub query: String,
    pub category: String,
    pub quality_score: f64,
    pub usage_count: u32,
}

/// Sink for run analytics and learning data.
///
/// Recording is best-effort from the pipeline's point of view: errors are
/// logged by the caller and never fail a request.
pub trait InteractionRecorder: Send + Sync {
    fn record_run(&self, record: &RunRecord) -> Result<()>;

    fn record_learning(&self, record: &LearningRecord) -> Result<()>;

    /// The last `limit` successful turns for a session, oldest first.
    fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;
}

/// Recorder backed by the shared SQLite database.
pub struct SqliteRecorder {
    db: Database,
}

impl SqliteRecorder {
    /// Create the analytics tables on `db` if they don't exist.
    pub fn new(db: Database) -> Result<Self> {
        let recorder = Self { db };
        recorder.init_schema()?;
        Ok(recorder)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                caller TEXT,
                query TEXT NOT NULL,
                response_length INTEGER NOT NULL DEFAULT 0,
                response TEXT,
                response_time_ms REAL NOT NULL DEFAULT 0,
                tokens_used INTEGER NOT NULL DEFAULT 0,
                model TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL,
                cache_hit INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_analytics_session
                ON analytics(session_id, id);

            CREATE TABLE IF NOT EXISTS learning_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL UNIQUE,
                response TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                quality_score REAL NOT NULL DEFAULT 1.0,
                usage_count INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| JarvisError::Database {
            message: format!("Failed to initialize analytics schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    /// Stored learning statistics for `query`, if any.
    pub fn learning_summary(&self, query: &str) -> Result<Option<LearningSummary>> {
        use rusqlite::OptionalExtension;

        let query = truncate(query, PipelineDefaults::ANALYTICS_QUERY_CHARS);
        let conn = self.db.lock()?;
        let summary = conn
            .query_row(
                "SELECT query, category, quality_score, usage_count
                 FROM learning_data WHERE query = ?1",
                params![query],
                |row| {
                    Ok(LearningSummary {
                        query: row.get(0)?,
                        category: row.get(1)?,
                        quality_score: row.get(2)?,
                        usage_count: row.get::<_, i64>(3)?.max(0) as u32,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    /// Number of analytics rows for a session.
    pub fn run_count(&self, session_id: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM analytics WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

impl InteractionRecorder for SqliteRecorder {
    fn record_run(&self, record: &RunRecord) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO analytics
                (session_id, caller, query, response_length, response, response_time_ms,
                 tokens_used, model, source, cache_hit, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.session_id,
                record.caller,
                truncate(&record.query, PipelineDefaults::ANALYTICS_QUERY_CHARS),
                record.response_length() as i64,
                record
                    .response
                    .as_deref()
                    .map(|r| truncate(r, PipelineDefaults::LEARNING_RESPONSE_CHARS)),
                record.elapsed_ms,
                record.tokens_used,
                record.model,
                record.source,
                record.cache_hit,
                record.error,
                Utc::now().timestamp_millis(),
            ],
        )?;
        debug!(
            "Recorded {} run for session {}",
            record.source, record.session_id
        );
        Ok(())
    }

    fn record_learning(&self, record: &LearningRecord) -> Result<()> {
        let quality = if record.quality_score.is_finite() {
            record.quality_score.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let conn = self.db.lock()?;
        // Running mean over all recorded qualities for the query
        conn.execute(
            "INSERT INTO learning_data
                (query, response, category, quality_score, usage_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
             ON CONFLICT(query) DO UPDATE SET
                response = excluded.response,
                category = excluded.category,
                quality_score = (quality_score * usage_count + excluded.quality_score) / (usage_count + 1),
                usage_count = usage_count + 1,
                updated_at = excluded.updated_at",
            params![
                truncate(&record.query, PipelineDefaults::ANALYTICS_QUERY_CHARS),
                truncate(&record.response, PipelineDefaults::LEARNING_RESPONSE_CHARS),
                record.category,
                quality,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT query, response FROM analytics
             WHERE session_id = ?1 AND response IS NOT NULL AND error IS NULL
             ORDER BY id DESC LIMIT ?2",
        )?;
        let mut turns = stmt
            .query_map(params![session_id, limit as i64], |row| {
                Ok(ConversationTurn {
                    query: row.get(0)?,
                    response: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recorder() -> SqliteRecorder {
        SqliteRecorder::new(Database::open_in_memory().unwrap()).unwrap()
    }

    fn run(session: &str, query: &str, response: Option<&str>) -> RunRecord {
        RunRecord {
            session_id: session.into(),
            caller: Some("127.0.0.1".into()),
            query: query.into(),
            response: response.map(String::from),
            elapsed_ms: 12.5,
            tokens_used: 40,
            model: "test-model".into(),
            source: "completion".into(),
            cache_hit: false,
            error: response.is_none().then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_recent_turns_oldest_first() {
        let recorder = recorder();
        for i in 1..=4 {
            recorder
                .record_run(&run("s1", &format!("q{}", i), Some(&format!("a{}", i))))
                .unwrap();
        }
        recorder.record_run(&run("s1", "failed", None)).unwrap();
        recorder.record_run(&run("other", "q", Some("a"))).unwrap();

        let turns = recorder.recent_turns("s1", 3).unwrap();
        let queries: Vec<_> = turns.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["q2", "q3", "q4"]);
        assert_eq!(recorder.run_count("s1").unwrap(), 5);
        assert!(recorder.recent_turns("s1", 0).unwrap().is_empty());
    }

    #[test]
    fn test_learning_running_mean() {
        let recorder = recorder();
        let mut record = LearningRecord {
            query: "who are you".into(),
            response: "JARVIS".into(),
            category: "personal".into(),
            quality_score: 1.0,
        };
        recorder.record_learning(&record).unwrap();
        record.quality_score = 0.0;
        recorder.record_learning(&record).unwrap();
        record.quality_score = 7.0;
        recorder.record_learning(&record).unwrap();

        let summary = recorder.learning_summary("who are you").unwrap().unwrap();
        assert_eq!(summary.usage_count, 3);
        assert!((summary.quality_score - 2.0 / 3.0).abs() < 1e-9);
        assert!(recorder.learning_summary("unknown").unwrap().is_none());
    }

    #[test]
    fn test_long_text_truncated() {
        let recorder = recorder();
        let long_query = "q".repeat(900);
        recorder
            .record_learning(&LearningRecord {
                query: long_query.clone(),
                response: "r".repeat(5000),
                category: "general".into(),
                quality_score: 1.0,
            })
            .unwrap();
        let summary = recorder.learning_summary(&long_query).unwrap().unwrap();
        assert_eq!(summary.query.chars().count(), 500);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jarvis.db");
        {
            let recorder = SqliteRecorder::new(Database::open(&path).unwrap()).unwrap();
            recorder.record_run(&run("s", "hello", Some("hi"))).unwrap();
        }
        let recorder = SqliteRecorder::new(Database::open(&path).unwrap()).unwrap();
        assert_eq!(recorder.recent_turns("s", 5).unwrap().len(), 1);
    }
}
