//! Record families produced by an ingestion pass
//!
//! Content blocks come from Markdown/MDX documents. Operation and schema
//! records come from API specifications and share one table, discriminated
//! by the `type` column.

use serde::{Deserialize, Serialize};

/// Kind of Markdown node a [`ContentBlock`] was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    Paragraph,
    Code,
    ListItem,
    TableCell,
    Blockquote,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Paragraph => "paragraph",
            ContentType::Code => "code",
            ContentType::ListItem => "listItem",
            ContentType::TableCell => "tableCell",
            ContentType::Blockquote => "blockquote",
        }
    }
}

/// One heading-contextualized unit of prose or code from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub file_path: String,
    pub file_name: String,
    pub heading1: Option<String>,
    pub heading2: Option<String>,
    pub heading3: Option<String>,
    pub content_type: ContentType,
    pub language: Option<String>,
    pub content: String,
    /// 1-based line where the node starts
    pub line_number: usize,
    /// Per-file sequence number
    pub order: usize,
}

/// Rebuild a document from its blocks, in `order`.
///
/// Each block lands on its recorded `line_number` where the preceding output
/// leaves room, so line references from query hits stay valid. Heading
/// changes are written into the gap above the block, code gets its fence back
/// and table cells sharing a line are joined with ` | `.
pub fn rebuild_document<'a, I>(blocks: I) -> String
where
    I: IntoIterator<Item = &'a ContentBlock>,
{
    let mut parts: Vec<&ContentBlock> = blocks.into_iter().collect();
    parts.sort_by_key(|b| b.order);

    let mut lines: Vec<String> = Vec::new();
    let mut context: [Option<&str>; 3] = [None; 3];
    let mut previous: Option<&ContentBlock> = None;

    for block in parts {
        let same_row = previous.is_some_and(|p| {
            p.content_type == ContentType::TableCell && p.line_number == block.line_number
        });
        if same_row && block.content_type == ContentType::TableCell {
            if let Some(last) = lines.last_mut() {
                last.push_str(" | ");
                last.push_str(&block.content);
            }
            continue;
        }

        let levels = [
            block.heading1.as_deref(),
            block.heading2.as_deref(),
            block.heading3.as_deref(),
        ];
        let headings: Vec<String> = match (0..3).find(|&i| context[i] != levels[i]) {
            Some(first) => (first..3)
                .filter_map(|i| levels[i].map(|text| format!("{} {}", "#".repeat(i + 1), text)))
                .collect(),
            None => Vec::new(),
        };
        context = levels;

        let gap = block.line_number.saturating_sub(lines.len() + 1);
        let heading_lines: Vec<String> = if gap >= headings.len() * 2 {
            headings
                .into_iter()
                .flat_map(|h| [h, String::new()])
                .collect()
        } else {
            headings
        };
        let padding = gap.saturating_sub(heading_lines.len());
        lines.extend(std::iter::repeat(String::new()).take(padding));
        lines.extend(heading_lines);
        lines.extend(block_lines(block));
        previous = Some(block);
    }

    lines.join("\n")
}

fn block_lines(block: &ContentBlock) -> Vec<String> {
    let body = block.content.lines();
    match block.content_type {
        ContentType::Code => std::iter::once(format!(
            "```{}",
            block.language.as_deref().unwrap_or_default()
        ))
        .chain(body.map(str::to_string))
        .chain(std::iter::once("```".to_string()))
        .collect(),
        ContentType::Blockquote => body.map(|line| format!("> {}", line).trim_end().to_string()).collect(),
        ContentType::ListItem => body
            .enumerate()
            .map(|(i, line)| if i == 0 { format!("- {}", line) } else { format!("  {}", line) })
            .collect(),
        ContentType::Paragraph | ContentType::TableCell => body.map(str::to_string).collect(),
    }
}

/// One HTTP path + method entry from a specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub file_path: String,
    pub file_name: String,
    pub api_path: String,
    pub method: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Searchable text: summary, description, tags, parameters
    pub content: String,
}

/// An operation that references a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRef {
    pub api_path: String,
    pub method: String,
    pub operation_id: Option<String>,
}

/// A deduplicated data-model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRecord {
    pub file_path: String,
    pub file_name: String,
    pub schema_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: String,
    /// Cycle-safe JSON serialization of the inlined schema
    pub schema_definition: String,
    pub used_by: Vec<UsageRef>,
}

/// Records stored in the api table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ApiRecord {
    #[serde(rename = "api")]
    Operation(OperationRecord),
    #[serde(rename = "schema")]
    Schema(SchemaRecord),
}

impl ApiRecord {
    /// Value of the `type` discriminator column
    pub fn type_tag(&self) -> &'static str {
        match self {
            ApiRecord::Operation(_) => "api",
            ApiRecord::Schema(_) => "schema",
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            ApiRecord::Operation(op) => &op.file_path,
            ApiRecord::Schema(schema) => &schema.file_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_record_tagging() {
        let record = ApiRecord::Operation(OperationRecord {
            file_path: "specs/pets.yaml".to_string(),
            file_name: "pets.yaml".to_string(),
            api_path: "/pets".to_string(),
            method: "get".to_string(),
            operation_id: Some("listPets".to_string()),
            summary: Some("List pets".to_string()),
            description: None,
            content: "List pets".to_string(),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "api");
        assert_eq!(json["apiPath"], "/pets");
        assert_eq!(record.type_tag(), "api");
    }

    fn block(order: usize, line: usize, kind: ContentType, content: &str) -> ContentBlock {
        ContentBlock {
            file_path: "docs/guide.md".to_string(),
            file_name: "guide.md".to_string(),
            heading1: Some("Guide".to_string()),
            heading2: (line > 4).then(|| "Setup".to_string()),
            heading3: None,
            content_type: kind,
            language: (kind == ContentType::Code).then(|| "bash".to_string()),
            content: content.to_string(),
            line_number: line,
            order,
        }
    }

    #[test]
    fn test_rebuild_document_keeps_line_positions() {
        let blocks = vec![
            block(1, 3, ContentType::Paragraph, "Intro text."),
            block(2, 7, ContentType::Code, "npm install"),
            block(3, 11, ContentType::TableCell, "Name"),
            block(4, 11, ContentType::TableCell, "Value"),
            block(5, 13, ContentType::ListItem, "Stability matters here."),
        ];
        let rebuilt = rebuild_document(&blocks);
        let lines: Vec<&str> = rebuilt.lines().collect();

        assert_eq!(lines[0], "# Guide");
        assert_eq!(lines[2], "Intro text.");
        assert_eq!(lines[4], "## Setup");
        assert_eq!(&lines[6..9], &["```bash", "npm install", "```"]);
        assert_eq!(lines[10], "Name | Value");
        assert_eq!(lines[12], "- Stability matters here.");
    }

    #[test]
    fn test_content_type_names() {
        assert_eq!(ContentType::ListItem.as_str(), "listItem");
        assert_eq!(
            serde_json::to_value(ContentType::TableCell).unwrap(),
            "tableCell"
        );
    }
}
