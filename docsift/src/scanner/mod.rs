//! Recursive directory scan for corpus files
//!
//! Walks depth-first in file-name order so every ingestion run sees files in
//! the same sequence. Dependency and metadata directories are never entered,
//! and unreadable subtrees are logged and skipped.

use crate::error::Result;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories that never hold corpus content
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "venv",
    "dist",
    "build",
    "vendor",
];

/// A file found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Absolute (or root-joined) path to the file
    pub path: PathBuf,
    /// Path relative to the scan root, always `/`-separated
    pub relative_path: String,
}

impl ScanResult {
    /// Final path component
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.relative_path.clone())
    }
}

/// File scanner for discovering files matching patterns
pub struct Scanner {
    root: PathBuf,
    patterns: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Scanner {
    /// Create a new scanner
    pub fn new<P: AsRef<Path>, S: AsRef<str>>(
        root: P,
        patterns: &[S],
        exclude: &[S],
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let exclude = exclude
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Scanner {
            root: root.as_ref().to_path_buf(),
            patterns,
            exclude,
        })
    }

    /// Scan for all matching files
    pub fn scan(&self) -> impl Iterator<Item = ScanResult> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path(), e.file_type().is_dir()))
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    tracing::warn!("Skipping unreadable path {}: {}", path, err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches(e.path()))
            .map(|e| ScanResult {
                relative_path: self.relative(e.path()),
                path: e.into_path(),
            })
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Check if a path matches any include pattern
    fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let relative = self.relative(path);
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        self.patterns.iter().any(|p| {
            // "**/*.md" must also match files sitting directly in the root
            if let Some(suffix) = p.as_str().strip_prefix("**/") {
                if let Ok(suffix_pattern) = Pattern::new(suffix) {
                    if suffix_pattern.matches_with(filename, options) {
                        return true;
                    }
                }
            }
            p.matches_with(&relative, options) || p.matches_with(filename, options)
        })
    }

    /// Check if a path should be excluded
    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        if path == self.root {
            return false;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('.') {
            return true;
        }

        if is_dir && EXCLUDED_DIRS.contains(&name) {
            return true;
        }

        let relative = self.relative(path);
        self.exclude.iter().any(|p| p.matches(&relative))
    }
}
