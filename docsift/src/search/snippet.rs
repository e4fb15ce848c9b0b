//! Context windows around the first match in a record

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Lines shown when nothing in the content matches
const FALLBACK_LINES: usize = 3;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{1,6}\s+(.+)").expect("heading regex")
});

static YAML_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][\w.-]*):").expect("yaml key regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub text: String,
    /// Nearest heading or top-level key at or above the match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// 1-based line of the match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
}

/// Window of `context_lines` either side of the first line containing
/// `query` (case-insensitive). Falls back to the first three lines.
pub fn extract_snippet(content: &str, query: &str, context_lines: usize) -> Snippet {
    let lines: Vec<&str> = content.lines().collect();
    let needle = query.to_lowercase();

    let found = if needle.is_empty() {
        None
    } else {
        lines
            .iter()
            .position(|line| line.to_lowercase().contains(&needle))
    };

    let Some(index) = found else {
        return Snippet {
            text: lines
                .iter()
                .take(FALLBACK_LINES)
                .copied()
                .collect::<Vec<_>>()
                .join("\n"),
            section: None,
            line_number: None,
        };
    };

    let start = index.saturating_sub(context_lines);
    let end = (index + context_lines + 1).min(lines.len());

    Snippet {
        text: lines[start..end].join("\n"),
        section: section_for(&lines, index),
        line_number: Some(index + 1),
    }
}

fn section_for(lines: &[&str], index: usize) -> Option<String> {
    lines[..=index].iter().rev().find_map(|line| {
        HEADING_RE
            .captures(line)
            .or_else(|| YAML_KEY_RE.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}
