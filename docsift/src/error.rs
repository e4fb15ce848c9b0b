//! Error types for docsift

use std::path::PathBuf;
use thiserror::Error;

/// docsift error type
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document not found in the store or on disk
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Invalid query arguments (empty query, missing path)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Artifact has not been built yet
    #[error("Index artifact missing: {}. Run 'docsift index' first", .0.display())]
    ArtifactMissing(PathBuf),

    /// Table creation or export failed; the run is aborted
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Parse error for a single source file
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for docsift operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::Config(format!("Invalid glob pattern: {}", err))
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DocumentNotFound("guides/setup.md".to_string());
        assert_eq!(err.to_string(), "Document not found: guides/setup.md");
    }

    #[test]
    fn test_parse_error_display() {
        let err = Error::parse("specs/pets.yaml", "unresolved reference #/components/schemas/Pet");
        assert_eq!(
            err.to_string(),
            "Parse error in specs/pets.yaml: unresolved reference #/components/schemas/Pet"
        );
    }
}
