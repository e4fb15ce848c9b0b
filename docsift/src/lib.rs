//! # docsift
//!
//! A documentation indexing and query engine.
//!
//! docsift provides:
//! - **Ingestion** of Markdown/MDX documents into heading-contextualized
//!   content blocks, and of OpenAPI/Swagger specifications into operation and
//!   deduplicated schema records
//! - **Snapshot artifacts**: one SQLite file per table, replaced atomically
//!   on every run
//! - **Tiered queries**: an exact type-name pass, then a multi-word
//!   fuzzy/substring scan, with context snippets
//! - **Fetch by path** from the index, falling back to the corpus on disk
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docsift::{Config, Indexer, QueryEngine, QueryOptions, RecordStore};
//!
//! let config = Config::load_or_default(None).unwrap();
//!
//! // Build both artifacts
//! let store = RecordStore::new(&config.index.dir);
//! Indexer::new(&config.corpus, store).run().unwrap();
//!
//! // Query them
//! let engine = QueryEngine::new(&config.index.dir, config.search.clone());
//! let hits = engine.query("voice settings", &QueryOptions::default()).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod indexer;
pub mod openapi;
pub mod parser;
pub mod records;
pub mod scanner;
pub mod search;
pub mod store;

// Re-exports for convenience
pub use config::{Config, MatchMode, SearchConfig};
pub use error::{Error, Result};
pub use fetch::{FetchStrategy, Fetched, Fetcher};
pub use indexer::{IndexStats, Indexer};
pub use records::{ApiRecord, ContentBlock, ContentType, OperationRecord, SchemaRecord, UsageRef};
pub use search::{HitKind, QueryEngine, QueryHit, QueryOptions, Tier};
pub use store::{Artifact, RecordStore, WriteStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default index directory
pub fn default_index_dir() -> std::path::PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("docsift")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_dir() {
        assert!(default_index_dir().ends_with("docsift"));
    }
}
