//! Tiered query engine over the snapshot artifacts
//!
//! Two tiers are tried in order and the first that produces hits wins:
//! - an exact-identifier pass for type-name shaped queries
//! - a multi-word scan where every word must hit some field
//!
//! Results are ordered by file path, then record family (content blocks
//! before api records), then ingestion order. There is no relevance score.

pub mod fuzzy;
pub mod snippet;

pub use fuzzy::{query_words, WordMatcher};
pub use snippet::{extract_snippet, Snippet};

use crate::config::{MatchMode, SearchConfig};
use crate::error::{Error, Result};
use crate::records::{rebuild_document, ApiRecord, ContentBlock};
use crate::store::{artifact_path, Artifact, API_SPECS_TABLE, CONTENT_BLOCKS_TABLE};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("identifier regex")
});

/// Per-call query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Maximum number of hits; the configured default when `None`
    pub limit: Option<usize>,
    pub include_full_content: bool,
    pub include_schema_definition: bool,
    /// Overrides the configured match mode
    pub match_mode: Option<MatchMode>,
}

/// Which record family a hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Content,
    Operation,
    Schema,
}

/// Matching tier that produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Exact,
    Scan,
}

/// One query result
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHit {
    pub name: String,
    pub path: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_definition: Option<String>,
    pub kind: HitKind,
    pub tier: Tier,
}

/// A record from either artifact with its ingestion position
#[derive(Clone, Copy)]
enum Candidate<'a> {
    Block(usize, &'a ContentBlock),
    Api(usize, &'a ApiRecord),
}

impl<'a> Candidate<'a> {
    /// (filePath, family, ingestion order)
    fn sort_key(self) -> (&'a str, u8, usize) {
        match self {
            Candidate::Block(i, block) => (block.file_path.as_str(), 0, i),
            Candidate::Api(i, record) => (record.file_path(), 1, i),
        }
    }

    fn content(self) -> &'a str {
        match self {
            Candidate::Block(_, block) => &block.content,
            Candidate::Api(_, ApiRecord::Operation(op)) => &op.content,
            Candidate::Api(_, ApiRecord::Schema(schema)) => &schema.content,
        }
    }
}

/// Answers queries against the artifacts in one index directory
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index_dir: PathBuf,
    config: SearchConfig,
}

impl QueryEngine {
    pub fn new<P: AsRef<Path>>(index_dir: P, config: SearchConfig) -> Self {
        Self {
            index_dir: index_dir.as_ref().to_path_buf(),
            config,
        }
    }

    /// Run `query` against freshly opened artifacts
    pub fn query(&self, query: &str, options: &QueryOptions) -> Result<Vec<QueryHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".to_string()));
        }
        let limit = options.limit.unwrap_or(self.config.default_limit);
        if limit == 0 {
            return Err(Error::InvalidQuery("limit must be at least 1".to_string()));
        }

        let blocks = Artifact::open(artifact_path(&self.index_dir, CONTENT_BLOCKS_TABLE))?
            .content_blocks()?;
        let api = Artifact::open(artifact_path(&self.index_dir, API_SPECS_TABLE))?.api_records()?;

        let candidates: Vec<Candidate<'_>> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| Candidate::Block(i, b))
            .chain(api.iter().enumerate().map(|(i, r)| Candidate::Api(i, r)))
            .collect();

        if IDENTIFIER_RE.is_match(query) {
            let exact = exact_tier(&candidates, query, limit);
            if !exact.is_empty() {
                tracing::debug!("Exact tier matched {} records for {}", exact.len(), query);
                return Ok(self.build_hits(&exact, &blocks, query, Tier::Exact, options));
            }
        }

        let mode = options.match_mode.unwrap_or(self.config.match_mode);
        let matcher = WordMatcher::new(mode, self.config.fuzzy_threshold);
        let scanned = scan_tier(&candidates, &query_words(query), &matcher, limit);
        tracing::debug!("Scan tier matched {} records for {}", scanned.len(), query);

        Ok(self.build_hits(&scanned, &blocks, query, Tier::Scan, options))
    }

    fn build_hits(
        &self,
        matched: &[Candidate<'_>],
        blocks: &[ContentBlock],
        query: &str,
        tier: Tier,
        options: &QueryOptions,
    ) -> Vec<QueryHit> {
        let mut documents: HashMap<&str, String> = HashMap::new();

        matched
            .iter()
            .map(|candidate| {
                let content = candidate.content();
                let snippet = self.snippet(content, query);

                let full_content = options.include_full_content.then(|| match candidate {
                    Candidate::Block(_, block) => documents
                        .entry(block.file_path.as_str())
                        .or_insert_with(|| {
                            rebuild_document(blocks.iter().filter(|b| b.file_path == block.file_path))
                        })
                        .clone(),
                    Candidate::Api(..) => content.to_string(),
                });

                match candidate {
                    Candidate::Block(_, block) => QueryHit {
                        name: block.file_name.clone(),
                        path: block.file_path.clone(),
                        snippet: snippet.text,
                        section: snippet.section.or_else(|| nearest_heading(block)),
                        line_number: Some(block.line_number),
                        full_content,
                        schema_definition: None,
                        kind: HitKind::Content,
                        tier,
                    },
                    Candidate::Api(_, ApiRecord::Operation(op)) => QueryHit {
                        name: format!("{} {}", op.method, op.api_path),
                        path: op.file_path.clone(),
                        snippet: snippet.text,
                        section: snippet.section,
                        line_number: snippet.line_number,
                        full_content,
                        schema_definition: None,
                        kind: HitKind::Operation,
                        tier,
                    },
                    Candidate::Api(_, ApiRecord::Schema(schema)) => QueryHit {
                        name: schema
                            .schema_name
                            .clone()
                            .or_else(|| schema.title.clone())
                            .unwrap_or_else(|| "(anonymous schema)".to_string()),
                        path: schema.file_path.clone(),
                        snippet: snippet.text,
                        section: snippet.section,
                        line_number: snippet.line_number,
                        full_content,
                        schema_definition: options
                            .include_schema_definition
                            .then(|| schema.schema_definition.clone()),
                        kind: HitKind::Schema,
                        tier,
                    },
                }
            })
            .collect()
    }

    /// Snippet around the whole query, else around the first word found
    fn snippet(&self, content: &str, query: &str) -> Snippet {
        let lines = self.config.context_lines;
        let whole = extract_snippet(content, query, lines);
        if whole.line_number.is_some() {
            return whole;
        }

        query
            .split_whitespace()
            .map(|word| extract_snippet(content, word, lines))
            .find(|s| s.line_number.is_some())
            .unwrap_or(whole)
    }
}

/// Equality-or-substring pass, case-sensitive. Exact schema names first.
fn exact_tier<'a>(candidates: &[Candidate<'a>], query: &str, limit: usize) -> Vec<Candidate<'a>> {
    let mut ranked: Vec<(u8, Candidate<'a>)> = candidates
        .iter()
        .filter_map(|candidate| {
            let rank = match candidate {
                Candidate::Api(_, ApiRecord::Schema(schema)) => {
                    if schema.schema_name.as_deref() == Some(query) {
                        Some(0)
                    } else {
                        [
                            schema.schema_name.as_deref().unwrap_or(""),
                            schema.file_name.as_str(),
                            schema.schema_definition.as_str(),
                            schema.content.as_str(),
                        ]
                        .iter()
                        .any(|field| field.contains(query))
                        .then_some(1)
                    }
                }
                Candidate::Api(_, ApiRecord::Operation(op)) => [&op.file_name, &op.content]
                    .iter()
                    .any(|field| field.contains(query))
                    .then_some(1),
                Candidate::Block(_, block) => [&block.file_name, &block.content]
                    .iter()
                    .any(|field| field.contains(query))
                    .then_some(1),
            };
            rank.map(|r| (r, *candidate))
        })
        .collect();

    ranked.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.sort_key().cmp(&b.sort_key())));
    ranked.into_iter().take(limit).map(|(_, c)| c).collect()
}

/// Every word must hit at least one tested field of a record
fn scan_tier<'a>(
    candidates: &[Candidate<'a>],
    words: &[String],
    matcher: &WordMatcher,
    limit: usize,
) -> Vec<Candidate<'a>> {
    let mut matched: Vec<Candidate<'a>> = candidates
        .iter()
        .filter(|candidate| match candidate {
            Candidate::Block(_, block) => matcher.matches_all(words, [block.content.as_str()]),
            Candidate::Api(_, ApiRecord::Operation(op)) => matcher.matches_all(
                words,
                [
                    op.content.as_str(),
                    op.summary.as_deref().unwrap_or(""),
                    op.description.as_deref().unwrap_or(""),
                    op.api_path.as_str(),
                    op.method.as_str(),
                ],
            ),
            Candidate::Api(_, ApiRecord::Schema(schema)) => matcher.matches_all(
                words,
                [
                    schema.content.as_str(),
                    schema.description.as_deref().unwrap_or(""),
                ],
            ),
        })
        .copied()
        .collect();

    matched.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    matched.truncate(limit);
    matched
}

fn nearest_heading(block: &ContentBlock) -> Option<String> {
    block
        .heading3
        .clone()
        .or_else(|| block.heading2.clone())
        .or_else(|| block.heading1.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ContentType, OperationRecord, SchemaRecord, UsageRef};
    use crate::store::{RecordStore, API_SPEC_SCHEMA, CONTENT_BLOCK_SCHEMA};
    use tempfile::TempDir;

    fn block(path: &str, order: usize, heading: &str, content: &str) -> ContentBlock {
        ContentBlock {
            file_path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            heading1: Some("Guide".to_string()),
            heading2: Some(heading.to_string()),
            heading3: None,
            content_type: ContentType::Paragraph,
            language: None,
            content: content.to_string(),
            line_number: order * 3,
            order,
        }
    }

    fn operation() -> ApiRecord {
        ApiRecord::Operation(OperationRecord {
            file_path: "specs/voices.yaml".to_string(),
            file_name: "voices.yaml".to_string(),
            api_path: "/v1/voices/{voice_id}/settings".to_string(),
            method: "GET".to_string(),
            operation_id: Some("getVoiceSettings".to_string()),
            summary: Some("Get voice".to_string()),
            description: Some("Returns the settings object for a voice".to_string()),
            content: "Get voice\nReturns the settings object for a voice".to_string(),
        })
    }

    fn schema(name: &str) -> ApiRecord {
        ApiRecord::Schema(SchemaRecord {
            file_path: "specs/voices.yaml".to_string(),
            file_name: "voices.yaml".to_string(),
            schema_name: Some(name.to_string()),
            title: None,
            description: Some(format!("{} payload", name)),
            content: format!("{}\nproperties:\n  stability: How stable the voice is", name),
            schema_definition: r#"{"type":"object","properties":{"stability":{"type":"number"}}}"#
                .to_string(),
            used_by: vec![UsageRef {
                api_path: "/v1/voices/{voice_id}/settings".to_string(),
                method: "GET".to_string(),
                operation_id: Some("getVoiceSettings".to_string()),
            }],
        })
    }

    fn engine(blocks: Vec<ContentBlock>, api: Vec<ApiRecord>) -> (TempDir, QueryEngine) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path());
        store.write(CONTENT_BLOCKS_TABLE, &CONTENT_BLOCK_SCHEMA, blocks).unwrap();
        store.write(API_SPECS_TABLE, &API_SPEC_SCHEMA, api).unwrap();
        let engine = QueryEngine::new(dir.path(), SearchConfig::default());
        (dir, engine)
    }

    fn sample() -> (TempDir, QueryEngine) {
        engine(
            vec![
                block("docs/voices.md", 1, "Voices", "Pick a voice for your project."),
                block("docs/voices.md", 2, "Settings", "Voice settings control stability."),
                block("docs/auth.md", 1, "Keys", "Send the xi-api-key header."),
            ],
            vec![
                schema("VoiceSettingsResponseModel"),
                operation(),
                schema("VoiceSettingsResponseModelV2"),
            ],
        )
    }

    #[test]
    fn test_empty_query_is_invalid() {
        let dir = TempDir::new().unwrap();
        let engine = QueryEngine::new(dir.path(), SearchConfig::default());
        // Rejected before any artifact is opened
        assert!(matches!(
            engine.query("   ", &QueryOptions::default()),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let engine = QueryEngine::new(dir.path(), SearchConfig::default());
        assert!(matches!(
            engine.query("voice", &QueryOptions::default()),
            Err(Error::ArtifactMissing(_))
        ));
    }

    #[test]
    fn test_exact_type_name_hits_exact_tier() {
        let (_dir, engine) = sample();
        let hits = engine
            .query("VoiceSettingsResponseModel", &QueryOptions::default())
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "VoiceSettingsResponseModel");
        assert_eq!(hits[0].tier, Tier::Exact);
        assert_eq!(hits[0].kind, HitKind::Schema);
        assert_eq!(hits[1].name, "VoiceSettingsResponseModelV2");
        assert!(hits[0].schema_definition.is_none());
    }

    #[test]
    fn test_exact_tier_respects_limit() {
        let (_dir, engine) = sample();
        let options = QueryOptions {
            limit: Some(1),
            include_schema_definition: true,
            ..Default::default()
        };
        let hits = engine.query("VoiceSettingsResponseModel", &options).unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].schema_definition.as_deref().unwrap().contains("stability"));
    }

    #[test]
    fn test_identifier_without_exact_hits_falls_through() {
        let (_dir, engine) = sample();
        let hits = engine.query("Pick", &QueryOptions::default()).unwrap();
        assert_eq!(hits[0].tier, Tier::Exact);

        // No field contains "Stability" case-sensitively
        let hits = engine.query("Stability", &QueryOptions::default()).unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.tier == Tier::Scan));
    }

    #[test]
    fn test_words_match_across_fields() {
        let (_dir, engine) = sample();
        let hits = engine.query("voice settings", &QueryOptions::default()).unwrap();

        let operation = hits
            .iter()
            .find(|h| h.kind == HitKind::Operation)
            .expect("operation should match");
        assert_eq!(operation.name, "GET /v1/voices/{voice_id}/settings");
        assert_eq!(operation.tier, Tier::Scan);
    }

    #[test]
    fn test_scan_ordering_is_deterministic() {
        let (_dir, engine) = sample();
        let hits = engine.query("voice", &QueryOptions::default()).unwrap();
        let order: Vec<(&str, HitKind)> = hits.iter().map(|h| (h.path.as_str(), h.kind)).collect();

        assert_eq!(
            order,
            vec![
                ("docs/voices.md", HitKind::Content),
                ("docs/voices.md", HitKind::Content),
                ("specs/voices.yaml", HitKind::Schema),
                ("specs/voices.yaml", HitKind::Operation),
                ("specs/voices.yaml", HitKind::Schema),
            ]
        );
    }

    #[test]
    fn test_fuzzy_and_substring_modes() {
        let (_dir, engine) = sample();
        let fuzzy = engine.query("gte", &QueryOptions::default()).unwrap();
        assert_eq!(fuzzy.len(), 1);
        assert_eq!(fuzzy[0].kind, HitKind::Operation);

        let options = QueryOptions {
            match_mode: Some(MatchMode::Substring),
            ..Default::default()
        };
        assert!(engine.query("gte", &options).unwrap().is_empty());
    }

    #[test]
    fn test_full_content_rebuilds_document() {
        let (_dir, engine) = sample();
        let options = QueryOptions {
            include_full_content: true,
            ..Default::default()
        };
        let hits = engine.query("stability control", &options).unwrap();
        let block = hits.iter().find(|h| h.kind == HitKind::Content).unwrap();

        assert_eq!(
            block.full_content.as_deref(),
            Some("# Guide\n## Voices\nPick a voice for your project.\n## Settings\n\nVoice settings control stability.")
        );
        assert_eq!(block.section.as_deref(), Some("Settings"));
    }

    #[test]
    fn test_schema_snippet_section() {
        let (_dir, engine) = sample();
        let hits = engine.query("stable", &QueryOptions::default()).unwrap();
        let schema = hits.iter().find(|h| h.kind == HitKind::Schema).unwrap();

        assert_eq!(schema.section.as_deref(), Some("properties"));
        assert_eq!(schema.line_number, Some(3));
    }
}
