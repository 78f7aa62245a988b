//! Response generation: the orchestration core.
//!
//! - [`ResponsePipeline`]: cache check, context gathering, prompt, completion, formatting
//! - [`PromptBuilder`]: deterministic system prompt with a hard length cutoff
//! - [`LocalDataSource`] / [`InteractionRecorder`]: injected collaborators

mod prompt;
mod recorder;
mod response;
mod sources;
mod types;

pub use prompt::{truncate_to_chars, PromptBuilder, DEFAULT_PERSONA};
pub use recorder::{InteractionRecorder, LearningRecord, LearningSummary, RunRecord, SqliteRecorder};
pub use response::ResponsePipeline;
pub use sources::{LocalDataSource, StaticLocalData};
pub use types::{
    AnswerMetadata, CachedAnswer, ConversationTurn, GenerateOptions, GeneratedAnswer,
    LocalRecord, LocalRecordKind, PipelineStage, QueryAnalysis, RequestContext,
};
