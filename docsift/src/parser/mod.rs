//! Content parsers for corpus documents
//!
//! Markdown and MDX documents are split into heading-contextualized blocks by
//! [`markdown`]. API specifications are handled by [`crate::openapi`].

pub mod markdown;

pub use markdown::{Blocks, MarkdownDocument};

use std::path::Path;

/// Markdown dialect of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Markdown,
    Mdx,
}

impl Flavor {
    /// Detect the flavor from a file extension; `None` for non-Markdown files
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Flavor::Markdown),
            "mdx" => Some(Flavor::Mdx),
            _ => None,
        }
    }
}

/// Serialization format of a specification file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(SpecFormat::Json),
            "yaml" | "yml" => Some(SpecFormat::Yaml),
            _ => None,
        }
    }
}
