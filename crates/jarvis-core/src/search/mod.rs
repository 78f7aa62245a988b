//! Web search across pluggable providers.

mod aggregator;
pub mod providers;
mod types;

pub use aggregator::{merge_results, SearchAggregator};
pub use providers::default_providers;
pub use types::{ResultKind, SearchOptions, SearchProvider, SearchResult, SearchSource};
