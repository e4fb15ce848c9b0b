//! Ingestion pass
//!
//! One run scans the corpus for documents and specifications, parses every
//! file independently and replaces both artifacts. A file that fails to read
//! or parse is logged and skipped; only artifact failures abort the run.

use crate::config::CorpusConfig;
use crate::error::Result;
use crate::openapi::{SchemaRegistry, SpecFile};
use crate::parser::{Flavor, MarkdownDocument, SpecFormat};
use crate::records::{ApiRecord, ContentBlock, OperationRecord};
use crate::scanner::{ScanResult, Scanner};
use crate::store::{
    RecordStore, API_SPECS_TABLE, API_SPEC_SCHEMA, CONTENT_BLOCKS_TABLE, CONTENT_BLOCK_SCHEMA,
};
use std::path::Path;
use std::time::{Duration, Instant};

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexStats {
    /// Markdown/MDX files parsed
    pub documents: usize,
    /// Specification files parsed
    pub specs: usize,
    /// JSON/YAML files that are not specifications
    pub files_ignored: usize,
    /// Files skipped because they failed to read or parse
    pub errors: usize,
    pub content_blocks: usize,
    pub operations: usize,
    pub schemas: usize,
    /// Rows that failed to encode
    pub rows_skipped: usize,
    #[serde(skip)]
    pub duration: Duration,
}

/// Progress callback for ingestion
pub trait IndexProgress {
    /// Called when a file is processed
    fn on_file(&mut self, path: &Path, status: FileStatus);
    /// Called when the run is complete
    fn on_complete(&mut self, stats: &IndexStats);
}

/// Status of a file during ingestion
#[derive(Debug, Clone)]
pub enum FileStatus {
    /// File produced this many records
    Indexed(usize),
    /// File was not a specification
    Ignored,
    /// Error processing file
    Error(String),
}

pub struct Indexer<'a> {
    corpus: &'a CorpusConfig,
    store: RecordStore,
}

impl<'a> Indexer<'a> {
    pub fn new(corpus: &'a CorpusConfig, store: RecordStore) -> Self {
        Indexer { corpus, store }
    }

    /// Run a full ingestion pass
    pub fn run(&self) -> Result<IndexStats> {
        self.run_with_progress(&mut NoopProgress)
    }

    pub fn run_with_progress(&self, progress: &mut dyn IndexProgress) -> Result<IndexStats> {
        let start = Instant::now();
        let mut stats = IndexStats::default();

        let blocks = self.collect_blocks(&mut stats, progress)?;
        let api = self.collect_api(&mut stats, progress)?;

        let written = self
            .store
            .write(CONTENT_BLOCKS_TABLE, &CONTENT_BLOCK_SCHEMA, blocks)?;
        stats.content_blocks = written.written;
        stats.rows_skipped += written.skipped;

        let written = self.store.write(API_SPECS_TABLE, &API_SPEC_SCHEMA, api)?;
        stats.rows_skipped += written.skipped;

        stats.duration = start.elapsed();
        tracing::info!(
            "Indexed {} documents and {} specs: {} blocks, {} operations, {} schemas ({} errors) in {:?}",
            stats.documents,
            stats.specs,
            stats.content_blocks,
            stats.operations,
            stats.schemas,
            stats.errors,
            stats.duration
        );
        progress.on_complete(&stats);

        Ok(stats)
    }

    fn collect_blocks(
        &self,
        stats: &mut IndexStats,
        progress: &mut dyn IndexProgress,
    ) -> Result<Vec<ContentBlock>> {
        let scanner = Scanner::new(
            &self.corpus.root,
            &self.corpus.markdown_patterns,
            &self.corpus.exclude,
        )?;

        let mut blocks = Vec::new();
        for scan in scanner.scan() {
            let Some(flavor) = Flavor::from_path(&scan.path) else {
                continue;
            };

            match read_document(&scan, flavor) {
                Ok(found) => {
                    tracing::debug!("{}: {} blocks", scan.relative_path, found.len());
                    stats.documents += 1;
                    progress.on_file(&scan.path, FileStatus::Indexed(found.len()));
                    blocks.extend(found);
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::warn!("Skipping {}: {}", scan.relative_path, e);
                    progress.on_file(&scan.path, FileStatus::Error(e.to_string()));
                }
            }
        }
        Ok(blocks)
    }

    fn collect_api(
        &self,
        stats: &mut IndexStats,
        progress: &mut dyn IndexProgress,
    ) -> Result<Vec<ApiRecord>> {
        let scanner = Scanner::new(
            &self.corpus.root,
            &self.corpus.spec_patterns,
            &self.corpus.exclude,
        )?;

        let mut registry = SchemaRegistry::new();
        let mut operations = Vec::new();

        for scan in scanner.scan() {
            let Some(format) = SpecFormat::from_path(&scan.path) else {
                continue;
            };

            match read_spec(&scan, format, &mut registry) {
                Ok(Some(found)) => {
                    tracing::debug!("{}: {} operations", scan.relative_path, found.len());
                    stats.specs += 1;
                    progress.on_file(&scan.path, FileStatus::Indexed(found.len()));
                    operations.extend(found);
                }
                Ok(None) => {
                    tracing::debug!("{}: not an API specification", scan.relative_path);
                    stats.files_ignored += 1;
                    progress.on_file(&scan.path, FileStatus::Ignored);
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::warn!("Skipping {}: {}", scan.relative_path, e);
                    progress.on_file(&scan.path, FileStatus::Error(e.to_string()));
                }
            }
        }

        let schemas = registry.finish();
        stats.operations = operations.len();
        stats.schemas = schemas.len();

        Ok(operations
            .into_iter()
            .map(ApiRecord::Operation)
            .chain(schemas.into_iter().map(ApiRecord::Schema))
            .collect())
    }
}

fn read_document(scan: &ScanResult, flavor: Flavor) -> Result<Vec<ContentBlock>> {
    let bytes = std::fs::read(&scan.path)?;
    let document = MarkdownDocument::from_bytes(&scan.relative_path, scan.file_name(), flavor, bytes)?;
    Ok(document.blocks().collect())
}

/// Parse failures happen before the registry is touched
fn read_spec(
    scan: &ScanResult,
    format: SpecFormat,
    registry: &mut SchemaRegistry,
) -> Result<Option<Vec<OperationRecord>>> {
    let bytes = std::fs::read(&scan.path)?;
    let Some(spec) = SpecFile::from_bytes(&scan.relative_path, scan.file_name(), format, &bytes)?
    else {
        return Ok(None);
    };
    Ok(Some(spec.extract(registry)))
}

/// No-op progress reporter
struct NoopProgress;

impl IndexProgress for NoopProgress {
    fn on_file(&mut self, _path: &Path, _status: FileStatus) {}
    fn on_complete(&mut self, _stats: &IndexStats) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{artifact_path, Artifact};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    const SPEC: &str = r##"
openapi: 3.0.0
info:
  title: Pets
  version: "1"
paths:
  /pets:
    get:
      summary: List pets
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: "#/components/schemas/Pet"
    post:
      summary: Create pet
      requestBody:
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/Pet"
      responses:
        "201":
          description: created
components:
  schemas:
    Pet:
      type: object
      properties:
        name:
          type: string
"##;

    fn touch(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap().write_all(body.as_bytes()).unwrap();
    }

    fn corpus(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        errors: Vec<String>,
        completed: bool,
    }

    impl IndexProgress for Recorder {
        fn on_file(&mut self, path: &Path, status: FileStatus) {
            if let FileStatus::Error(_) = status {
                self.errors.push(path.display().to_string());
            }
        }
        fn on_complete(&mut self, _stats: &IndexStats) {
            self.completed = true;
        }
    }

    #[test]
    fn test_index_corpus() {
        let dir = tempdir().unwrap();
        let index = tempdir().unwrap();
        touch(dir.path(), "docs/intro.md", "# Intro\n\nHello there\n");
        touch(dir.path(), "docs/guide.mdx", "# Guide\n\n- step one\n- step two\n");
        touch(dir.path(), "specs/pets.yaml", SPEC);
        touch(dir.path(), "package.json", r#"{"name": "site"}"#);

        let corpus = corpus(dir.path());
        let stats = Indexer::new(&corpus, RecordStore::new(index.path())).run().unwrap();

        assert_eq!(stats.documents, 2);
        assert_eq!(stats.specs, 1);
        assert_eq!(stats.files_ignored, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.content_blocks, 3);
        assert_eq!(stats.operations, 2);
        assert_eq!(stats.schemas, 1);

        let api = Artifact::open(artifact_path(index.path(), API_SPECS_TABLE))
            .unwrap()
            .api_records()
            .unwrap();
        let pet = api
            .iter()
            .find_map(|r| match r {
                ApiRecord::Schema(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(pet.schema_name.as_deref(), Some("Pet"));
        assert_eq!(pet.used_by.len(), 2);
    }

    #[test]
    fn test_bad_files_are_skipped() {
        let dir = tempdir().unwrap();
        let index = tempdir().unwrap();
        touch(dir.path(), "docs/ok.md", "# Ok\n\nFine\n");
        fs::write(dir.path().join("docs/bad.md"), [0xff, 0xfe, 0x00]).unwrap();
        touch(dir.path(), "specs/broken.yaml", "openapi: 3.0.0\npaths: [unclosed\n");
        touch(dir.path(), "specs/pets.yaml", SPEC);

        let corpus = corpus(dir.path());
        let mut recorder = Recorder::default();
        let stats = Indexer::new(&corpus, RecordStore::new(index.path()))
            .run_with_progress(&mut recorder)
            .unwrap();

        assert_eq!(stats.errors, 2);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.specs, 1);
        assert_eq!(recorder.errors.len(), 2);
        assert!(recorder.completed);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = tempdir().unwrap();
        let index = tempdir().unwrap();
        touch(dir.path(), "a.md", "# A\n\n## Setup\n\n```sh\nmake\n```\n");
        touch(dir.path(), "b/pets.yaml", SPEC);

        let corpus = corpus(dir.path());
        let indexer = Indexer::new(&corpus, RecordStore::new(index.path()));

        let snapshot = || {
            let blocks = Artifact::open(artifact_path(index.path(), CONTENT_BLOCKS_TABLE))
                .unwrap()
                .content_blocks()
                .unwrap();
            let api = Artifact::open(artifact_path(index.path(), API_SPECS_TABLE))
                .unwrap()
                .api_records()
                .unwrap();
            (blocks, api)
        };

        indexer.run().unwrap();
        let first = snapshot();
        indexer.run().unwrap();
        let second = snapshot();

        assert_eq!(first, second);
        assert!(!first.0.is_empty());
    }

    #[test]
    fn test_removed_files_disappear() {
        let dir = tempdir().unwrap();
        let index = tempdir().unwrap();
        touch(dir.path(), "keep.md", "# Keep\n\nkept\n");
        touch(dir.path(), "drop.md", "# Drop\n\ndropped\n");

        let corpus = corpus(dir.path());
        let indexer = Indexer::new(&corpus, RecordStore::new(index.path()));
        indexer.run().unwrap();

        fs::remove_file(dir.path().join("drop.md")).unwrap();
        let stats = indexer.run().unwrap();

        let blocks = Artifact::open(artifact_path(index.path(), CONTENT_BLOCKS_TABLE))
            .unwrap()
            .content_blocks()
            .unwrap();
        assert_eq!(stats.documents, 1);
        assert!(blocks.iter().all(|b| b.file_path == "keep.md"));
    }
}
