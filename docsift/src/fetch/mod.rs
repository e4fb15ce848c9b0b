//! Raw document retrieval by path
//!
//! Strategies are tried in order; each either produces the document or
//! reports a named [`Miss`] that moves on to the next one. Database and
//! permission failures are surfaced as-is instead of falling through.

use crate::error::{Error, Result};
use crate::records::rebuild_document;
use crate::store::{artifact_path, Artifact, CONTENT_BLOCKS_TABLE};
use std::path::{Path, PathBuf};

/// Where a document can be fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// The content-block artifact
    Store,
    /// The original file under the corpus root
    Filesystem,
}

/// Why a strategy did not produce the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    ArtifactMissing,
    NoStoredRecord,
    FileMissing,
    /// Resolves to a file outside the corpus root
    OutsideCorpus,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Fetched {
    pub raw: String,
    pub source: FetchStrategy,
}

pub struct Fetcher {
    index_dir: PathBuf,
    corpus_root: PathBuf,
    strategies: Vec<FetchStrategy>,
}

impl Fetcher {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(index_dir: P, corpus_root: Q) -> Self {
        Self {
            index_dir: index_dir.as_ref().to_path_buf(),
            corpus_root: corpus_root.as_ref().to_path_buf(),
            strategies: vec![FetchStrategy::Store, FetchStrategy::Filesystem],
        }
    }

    /// Replace the strategy order
    pub fn with_strategies(mut self, strategies: Vec<FetchStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Fetch the raw text of `path`. Relative paths resolve against the corpus
    /// root; absolute paths must still point inside it.
    pub fn fetch_by_path(&self, path: &str) -> Result<Fetched> {
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::InvalidQuery("path must not be empty".to_string()));
        }
        let path = path.strip_prefix("./").unwrap_or(path);

        for strategy in &self.strategies {
            let attempt = match strategy {
                FetchStrategy::Store => self.from_store(path)?,
                FetchStrategy::Filesystem => self.from_filesystem(path)?,
            };

            match attempt {
                Ok(raw) => {
                    return Ok(Fetched {
                        raw,
                        source: *strategy,
                    })
                }
                Err(miss) => tracing::debug!("{:?} miss for {}: {:?}", strategy, path, miss),
            }
        }

        Err(Error::DocumentNotFound(path.to_string()))
    }

    fn from_store(&self, path: &str) -> Result<std::result::Result<String, Miss>> {
        let artifact = match Artifact::open(artifact_path(&self.index_dir, CONTENT_BLOCKS_TABLE)) {
            Ok(artifact) => artifact,
            Err(Error::ArtifactMissing(_)) => return Ok(Err(Miss::ArtifactMissing)),
            Err(e) => return Err(e),
        };

        let blocks = artifact.content_blocks_for(path)?;
        if blocks.is_empty() {
            return Ok(Err(Miss::NoStoredRecord));
        }
        Ok(Ok(rebuild_document(&blocks)))
    }

    fn from_filesystem(&self, path: &str) -> Result<std::result::Result<String, Miss>> {
        let root = match self.corpus_root.canonicalize() {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Err(Miss::FileMissing)),
            Err(e) => return Err(e.into()),
        };

        let full = match root.join(path).canonicalize() {
            Ok(full) => full,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Err(Miss::FileMissing)),
            Err(e) => return Err(e.into()),
        };
        if !full.starts_with(&root) {
            return Ok(Err(Miss::OutsideCorpus));
        }

        match std::fs::read(&full) {
            Ok(bytes) => Ok(Ok(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Err(Miss::FileMissing)),
            Err(e) if full.is_dir() => {
                tracing::debug!("{} is a directory: {}", full.display(), e);
                Ok(Err(Miss::FileMissing))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Split a trailing `:line` suffix off a path.
///
/// ```
/// use docsift::fetch::parse_path_with_line;
///
/// assert_eq!(parse_path_with_line("docs/guide.md:50"), ("docs/guide.md", Some(50)));
/// assert_eq!(parse_path_with_line("docs/10:30_notes.md"), ("docs/10:30_notes.md", None));
/// ```
pub fn parse_path_with_line(input: &str) -> (&str, Option<usize>) {
    if let Some((path, suffix)) = input.rsplit_once(':') {
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(line) = suffix.parse::<usize>() {
                return (path, Some(line));
            }
        }
    }
    (input, None)
}

/// Lines `from_line..` (1-based), at most `max_lines` of them
///
/// ```
/// use docsift::fetch::extract_lines;
///
/// let text = "a\nb\nc\nd";
/// assert_eq!(extract_lines(text, Some(2), Some(2)), "b\nc");
/// assert_eq!(extract_lines(text, Some(9), None), "");
/// ```
pub fn extract_lines(text: &str, from_line: Option<usize>, max_lines: Option<usize>) -> String {
    let start = from_line.unwrap_or(1).saturating_sub(1);
    let lines = text.lines().skip(start);
    match max_lines {
        Some(limit) => lines.take(limit).collect::<Vec<_>>().join("\n"),
        None => lines.collect::<Vec<_>>().join("\n"),
    }
}

/// Prefix each line with its number, counting from `start_line`
pub fn add_line_numbers(text: &str, start_line: usize) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", start_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ContentBlock, ContentType};
    use crate::store::{RecordStore, CONTENT_BLOCK_SCHEMA};
    use tempfile::TempDir;

    fn block(order: usize, content: &str) -> ContentBlock {
        ContentBlock {
            file_path: "docs/guide.md".to_string(),
            file_name: "guide.md".to_string(),
            heading1: Some("Guide".to_string()),
            heading2: None,
            heading3: None,
            content_type: ContentType::Paragraph,
            language: None,
            content: content.to_string(),
            line_number: order * 2 + 1,
            order,
        }
    }

    struct Fixture {
        index: TempDir,
        corpus: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let corpus = TempDir::new().unwrap();
            std::fs::create_dir_all(corpus.path().join("docs")).unwrap();
            std::fs::write(corpus.path().join("docs/guide.md"), "# Guide\n\nFrom disk\n").unwrap();
            std::fs::write(corpus.path().join("docs/extra.md"), "# Extra\n").unwrap();
            Self {
                index: TempDir::new().unwrap(),
                corpus,
            }
        }

        fn fetcher(&self) -> Fetcher {
            Fetcher::new(self.index.path(), self.corpus.path())
        }

        fn index(&self) {
            RecordStore::new(self.index.path())
                .write(
                    CONTENT_BLOCKS_TABLE,
                    &CONTENT_BLOCK_SCHEMA,
                    vec![block(2, "Second"), block(1, "First")],
                )
                .unwrap();
        }
    }

    #[test]
    fn test_store_preferred() {
        let fixture = Fixture::new();
        fixture.index();

        let fetched = fixture.fetcher().fetch_by_path("docs/guide.md").unwrap();
        assert_eq!(fetched.source, FetchStrategy::Store);
        assert_eq!(fetched.raw, "# Guide\n\nFirst\n\nSecond");
    }

    #[test]
    fn test_falls_back_without_artifact() {
        let fixture = Fixture::new();
        let fetched = fixture.fetcher().fetch_by_path("./docs/guide.md").unwrap();

        assert_eq!(fetched.source, FetchStrategy::Filesystem);
        assert_eq!(fetched.raw, "# Guide\n\nFrom disk\n");
    }

    #[test]
    fn test_falls_back_without_stored_record() {
        let fixture = Fixture::new();
        fixture.index();

        let fetched = fixture.fetcher().fetch_by_path("docs/extra.md").unwrap();
        assert_eq!(fetched.source, FetchStrategy::Filesystem);
    }

    #[test]
    fn test_not_found_when_both_miss() {
        let fixture = Fixture::new();
        fixture.index();

        let err = fixture.fetcher().fetch_by_path("docs/missing.md").unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(p) if p == "docs/missing.md"));
    }

    #[test]
    fn test_filesystem_only() {
        let fixture = Fixture::new();
        fixture.index();

        let fetched = fixture
            .fetcher()
            .with_strategies(vec![FetchStrategy::Filesystem])
            .fetch_by_path("docs/guide.md")
            .unwrap();
        assert_eq!(fetched.raw, "# Guide\n\nFrom disk\n");
    }

    #[test]
    fn test_paths_outside_corpus_are_not_read() {
        let outer = TempDir::new().unwrap();
        let corpus = outer.path().join("corpus");
        std::fs::create_dir_all(corpus.join("docs")).unwrap();
        std::fs::write(corpus.join("docs/inside.md"), "inside").unwrap();
        std::fs::write(outer.path().join("secret.txt"), "TOP SECRET").unwrap();

        let index = TempDir::new().unwrap();
        let fetcher = Fetcher::new(index.path(), &corpus);

        for path in [
            "../secret.txt".to_string(),
            "docs/../../secret.txt".to_string(),
            outer.path().join("secret.txt").display().to_string(),
        ] {
            assert!(
                matches!(fetcher.fetch_by_path(&path), Err(Error::DocumentNotFound(_))),
                "{} escaped the corpus",
                path
            );
        }

        let absolute = corpus.join("docs/inside.md").display().to_string();
        assert_eq!(fetcher.fetch_by_path(&absolute).unwrap().raw, "inside");
        assert_eq!(
            fetcher.fetch_by_path("docs/../docs/inside.md").unwrap().raw,
            "inside"
        );
    }

    #[test]
    fn test_line_helpers() {
        let text = "one\ntwo\nthree";
        assert_eq!(extract_lines(text, None, Some(1)), "one");
        assert_eq!(add_line_numbers("x\ny", 7), "7: x\n8: y");
        assert_eq!(parse_path_with_line("a.md:"), ("a.md:", None));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.fetcher().fetch_by_path("  "),
            Err(Error::InvalidQuery(_))
        ));
    }
}
