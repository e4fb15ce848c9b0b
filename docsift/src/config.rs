//! Configuration for ingestion and search
//!
//! Loaded from an optional TOML file. Every field has a default so an empty
//! file (or no file at all) yields a usable configuration:
//!
//! ```toml
//! [corpus]
//! root = "./docs"
//! exclude = ["drafts/**"]
//!
//! [index]
//! dir = "./.docsift"
//!
//! [search]
//! fuzzy_threshold = 2
//! context_lines = 3
//! default_limit = 20
//! match_mode = "fuzzy"
//! ```

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Root directory holding docs and specifications
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Glob patterns for Markdown/MDX documents
    #[serde(default = "default_markdown_patterns")]
    pub markdown_patterns: Vec<String>,
    /// Glob patterns for candidate specification files
    #[serde(default = "default_spec_patterns")]
    pub spec_patterns: Vec<String>,
    /// Extra exclude patterns, relative to the root
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            markdown_patterns: default_markdown_patterns(),
            spec_patterns: default_spec_patterns(),
            exclude: Vec::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_markdown_patterns() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.mdx".to_string()]
}

fn default_spec_patterns() -> Vec<String> {
    vec![
        "**/*.json".to_string(),
        "**/*.yaml".to_string(),
        "**/*.yml".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory receiving the exported artifacts
    #[serde(default = "crate::default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: crate::default_index_dir(),
        }
    }
}

/// How query words are matched against record fields
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Substring or bounded edit distance
    #[default]
    Fuzzy,
    /// Plain case-insensitive substring only (compatibility mode)
    Substring,
}

impl std::str::FromStr for MatchMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fuzzy" => Ok(MatchMode::Fuzzy),
            "substring" => Ok(MatchMode::Substring),
            _ => Err(crate::Error::Config(format!("Unknown match mode: {}", s))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Maximum edit distance for a word to hit a field
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: usize,
    /// Lines of context on each side of a snippet match
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Result limit when the caller gives none
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            context_lines: default_context_lines(),
            default_limit: default_limit(),
            match_mode: MatchMode::default(),
        }
    }
}

fn default_fuzzy_threshold() -> usize {
    2
}
fn default_context_lines() -> usize {
    3
}
fn default_limit() -> usize {
    20
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.search.fuzzy_threshold, 2);
        assert_eq!(config.search.context_lines, 3);
        assert_eq!(config.search.default_limit, 20);
        assert_eq!(config.search.match_mode, MatchMode::Fuzzy);
        assert_eq!(config.corpus.root, PathBuf::from("."));
        assert_eq!(config.corpus.markdown_patterns.len(), 2);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
[corpus]
root = "/srv/docs"
exclude = ["drafts/**"]

[search]
fuzzy_threshold = 1
match_mode = "substring"
"#,
        )
        .unwrap();

        assert_eq!(config.corpus.root, PathBuf::from("/srv/docs"));
        assert_eq!(config.corpus.exclude, vec!["drafts/**"]);
        assert_eq!(config.search.fuzzy_threshold, 1);
        assert_eq!(config.search.context_lines, 3);
        assert_eq!(config.search.match_mode, MatchMode::Substring);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[search]\nfuzzy_threshold = \"two\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_match_mode_from_str() {
        assert_eq!("fuzzy".parse::<MatchMode>().unwrap(), MatchMode::Fuzzy);
        assert_eq!("SUBSTRING".parse::<MatchMode>().unwrap(), MatchMode::Substring);
        assert!("regex".parse::<MatchMode>().is_err());
    }
}
