//! docsift CLI - index and query documentation corpora

use anyhow::Result;
use clap::{Parser, Subcommand};
use docsift::fetch::{add_line_numbers, extract_lines, parse_path_with_line};
use docsift::indexer::{FileStatus, IndexProgress};
use docsift::store::{artifact_path, API_SPECS_TABLE, CONTENT_BLOCKS_TABLE};
use docsift::{
    Artifact, Config, Fetcher, IndexStats, Indexer, MatchMode, QueryEngine, QueryOptions,
    RecordStore,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsift")]
#[command(
    author,
    version,
    about = "Index Markdown/MDX docs and OpenAPI specs, then query them"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', env = "DOCSIFT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Corpus root (overrides the configuration file)
    #[arg(long, short = 'r', env = "DOCSIFT_ROOT", global = true)]
    root: Option<PathBuf>,

    /// Index directory (default: ~/.cache/docsift)
    #[arg(long, short = 'd', env = "DOCSIFT_INDEX_DIR", global = true)]
    index_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild both index artifacts from the corpus
    Index,

    /// Search documents, operations and schemas
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Include the full document body or record content
        #[arg(long)]
        full: bool,

        /// Include the serialized schema definition
        #[arg(long)]
        schema: bool,

        /// Plain substring matching, no edit distance
        #[arg(long)]
        substring: bool,

        /// Output format (text, json)
        #[arg(long, short = 'o', default_value = "text")]
        format: String,
    },

    /// Get a document by path
    Get {
        /// Path relative to the corpus root (supports path:line)
        path: String,

        /// Start from this line number (1-indexed, overrides :line suffix)
        #[arg(long)]
        from: Option<usize>,

        /// Maximum number of lines to show
        #[arg(long, short = 'l')]
        max_lines: Option<usize>,

        /// Prefix lines with their numbers
        #[arg(long)]
        line_numbers: bool,

        /// Output format (text, json)
        #[arg(long, short = 'o', default_value = "text")]
        format: String,
    },

    /// Show index status
    Status {
        /// Output format (text, json)
        #[arg(long, short = 'o', default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.corpus.root = root;
    }
    if let Some(dir) = cli.index_dir {
        config.index.dir = dir;
    }
    tracing::debug!(
        "Corpus root {}, index directory {}",
        config.corpus.root.display(),
        config.index.dir.display()
    );

    match cli.command {
        Commands::Index => cmd_index(&config, cli.verbose),
        Commands::Search {
            query,
            limit,
            full,
            schema,
            substring,
            format,
        } => {
            let options = QueryOptions {
                limit,
                include_full_content: full,
                include_schema_definition: schema,
                match_mode: substring.then_some(MatchMode::Substring),
            };
            cmd_search(&config, &query, &options, &format)
        }
        Commands::Get {
            path,
            from,
            max_lines,
            line_numbers,
            format,
        } => cmd_get(&config, &path, from, max_lines, line_numbers, &format),
        Commands::Status { format } => cmd_status(&config, &format),
    }
}

/// Prints one line per file when verbose
struct ConsoleProgress {
    verbose: bool,
}

impl IndexProgress for ConsoleProgress {
    fn on_file(&mut self, path: &Path, status: FileStatus) {
        match status {
            FileStatus::Indexed(records) if self.verbose => {
                println!("  {} ({} records)", path.display(), records)
            }
            FileStatus::Error(e) => println!("  {} skipped: {}", path.display(), e),
            _ => {}
        }
    }

    fn on_complete(&mut self, _stats: &IndexStats) {}
}

fn cmd_index(config: &Config, verbose: bool) -> Result<()> {
    println!("Indexing {}...", config.corpus.root.display());

    let store = RecordStore::new(&config.index.dir);
    let indexer = Indexer::new(&config.corpus, store);
    let stats = indexer.run_with_progress(&mut ConsoleProgress { verbose })?;

    println!(
        "Indexing complete:\n  Documents: {}\n  Specs: {}\n  Content blocks: {}\n  Operations: {}\n  Schemas: {}\n  Files ignored: {}\n  Errors: {}\n  Rows skipped: {}\n  Duration: {:?}",
        stats.documents,
        stats.specs,
        stats.content_blocks,
        stats.operations,
        stats.schemas,
        stats.files_ignored,
        stats.errors,
        stats.rows_skipped,
        stats.duration
    );
    Ok(())
}

fn cmd_search(config: &Config, query: &str, options: &QueryOptions, format: &str) -> Result<()> {
    let engine = QueryEngine::new(&config.index.dir, config.search.clone());
    let hits = engine.query(query, options)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found for '{}'", query);
        return Ok(());
    }

    println!("Found {} results for '{}':\n", hits.len(), query);
    for (i, hit) in hits.iter().enumerate() {
        let location = match hit.line_number {
            Some(line) => format!("{}:{}", hit.path, line),
            None => hit.path.clone(),
        };
        println!("{}. {} ({})", i + 1, hit.name, location);
        if let Some(section) = &hit.section {
            println!("   Section: {}", section);
        }
        println!("   {}", hit.snippet.replace('\n', "\n   "));
        if let Some(full) = &hit.full_content {
            println!("\n   {}", full.replace('\n', "\n   "));
        }
        if let Some(definition) = &hit.schema_definition {
            println!("\n   Schema: {}", definition);
        }
        println!();
    }
    Ok(())
}

fn cmd_get(
    config: &Config,
    path: &str,
    from_line: Option<usize>,
    max_lines: Option<usize>,
    line_numbers: bool,
    format: &str,
) -> Result<()> {
    // Parse :line suffix if --from not provided
    let (clean_path, suffix_line) = parse_path_with_line(path);
    let effective_from = from_line.or(suffix_line);

    let fetcher = Fetcher::new(&config.index.dir, &config.corpus.root);
    let fetched = fetcher.fetch_by_path(clean_path)?;

    let mut output = extract_lines(&fetched.raw, effective_from, max_lines);
    if line_numbers {
        output = add_line_numbers(&output, effective_from.unwrap_or(1));
    }

    if format == "json" {
        let result = serde_json::json!({
            "path": clean_path,
            "source": fetched.source,
            "fromLine": effective_from,
            "lineCount": output.lines().count(),
            "raw": output,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Path: {}", clean_path);
        if let Some(from) = effective_from {
            println!("From line: {}", from);
        }
        println!("\n{}", output);
    }
    Ok(())
}

fn cmd_status(config: &Config, format: &str) -> Result<()> {
    let dir = &config.index.dir;
    let mut tables = Vec::new();

    for table in [CONTENT_BLOCKS_TABLE, API_SPECS_TABLE] {
        let path = artifact_path(dir, table);
        let state = if path.is_file() {
            Artifact::open(&path)?.state()?
        } else {
            None
        };
        tables.push((table, path, state));
    }

    if format == "json" {
        let data: Vec<_> = tables
            .iter()
            .map(|(table, path, state)| {
                serde_json::json!({
                    "table": table,
                    "artifact": path,
                    "state": state,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("docsift Status");
    println!("==============");
    println!("Corpus: {}", config.corpus.root.display());
    println!("Index: {}", dir.display());
    for (table, path, state) in &tables {
        match state {
            Some(state) => println!(
                "  {}: {} rows (built {}, schema v{})",
                table, state.row_count, state.built_at, state.schema_version
            ),
            None => println!("  {}: not built ({})", table, path.display()),
        }
    }

    if tables.iter().any(|(_, _, state)| state.is_none()) {
        println!("\nRun 'docsift index' to build missing artifacts.");
    }
    Ok(())
}
