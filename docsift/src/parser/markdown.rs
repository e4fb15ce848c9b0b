//! Markdown/MDX block extraction
//!
//! Walks the pulldown-cmark event stream and yields one [`ContentBlock`] per
//! allow-listed node, tagged with the enclosing h1/h2/h3 headings. When
//! allow-listed nodes nest (a paragraph inside a list item) only the
//! outermost one is emitted, carrying the text of its children.

use super::Flavor;
use crate::error::{Error, Result};
use crate::records::{ContentBlock, ContentType};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, OffsetIter, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// `import x from "y"`, `import "y"` and `export const|function|default ...`
static ESM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:import\s+(?:[^'"]+?\s+from\s+)?['"]|export\s+(?:const|let|var|default|function|async|class|\{|\*))"#,
    )
    .expect("esm regex")
});

/// A Markdown or MDX document held in memory
#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    file_path: String,
    file_name: String,
    flavor: Flavor,
    text: String,
}

impl MarkdownDocument {
    /// Decode raw file bytes. Fails on invalid UTF-8.
    pub fn from_bytes(
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        flavor: Flavor,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let file_path = file_path.into();
        let text = String::from_utf8(bytes).map_err(|e| Error::parse(file_path.clone(), e))?;
        Ok(Self::new(file_path, file_name, flavor, text))
    }

    pub fn new(
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        flavor: Flavor,
        text: impl Into<String>,
    ) -> Self {
        MarkdownDocument {
            file_path: file_path.into(),
            file_name: file_name.into(),
            flavor,
            text: text.into(),
        }
    }

    /// Lazily extract content blocks. Each call starts a fresh pass.
    pub fn blocks(&self) -> Blocks<'_> {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;

        Blocks {
            events: Parser::new_ext(&self.text, options).into_offset_iter(),
            lines: LineIndex::new(&self.text),
            doc: self,
            headings: HeadingStack::default(),
            heading: None,
            capture: None,
            depth: 0,
            order: 0,
        }
    }
}

/// Byte offset to 1-based line lookup
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        LineIndex { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

/// h1..h3 context; deeper headings leave it untouched
#[derive(Debug, Default)]
struct HeadingStack {
    levels: [Option<String>; 3],
}

impl HeadingStack {
    fn visit(&mut self, level: usize, text: &str) {
        if !(1..=3).contains(&level) {
            return;
        }
        let text = text.trim();
        self.levels[level - 1] = (!text.is_empty()).then(|| text.to_string());
        for deeper in self.levels.iter_mut().skip(level) {
            *deeper = None;
        }
    }
}

struct Capture {
    content_type: ContentType,
    language: Option<String>,
    text: String,
    offset: usize,
    depth: usize,
}

/// Iterator over the content blocks of one document
pub struct Blocks<'a> {
    events: OffsetIter<'a>,
    lines: LineIndex,
    doc: &'a MarkdownDocument,
    headings: HeadingStack,
    heading: Option<(usize, String)>,
    capture: Option<Capture>,
    depth: usize,
    order: usize,
}

impl Iterator for Blocks<'_> {
    type Item = ContentBlock;

    fn next(&mut self) -> Option<ContentBlock> {
        while let Some((event, range)) = self.events.next() {
            if let Some(block) = self.handle(event, range) {
                return Some(block);
            }
        }
        None
    }
}

impl Blocks<'_> {
    fn handle(&mut self, event: Event<'_>, range: Range<usize>) -> Option<ContentBlock> {
        match event {
            Event::Start(tag) => {
                self.start(tag, range.start);
                None
            }
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Code(text) => {
                self.push_text(&text);
                None
            }
            Event::SoftBreak | Event::HardBreak => {
                self.push_break();
                None
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " });
                None
            }
            _ => None,
        }
    }

    fn start(&mut self, tag: Tag<'_>, offset: usize) {
        let depth = self.depth;
        self.depth += 1;

        if self.capture.is_some() {
            return;
        }

        let (content_type, language) = match tag {
            Tag::Heading { level, .. } => {
                self.heading = Some((heading_level(level), String::new()));
                return;
            }
            Tag::Paragraph => (ContentType::Paragraph, None),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => (
                ContentType::Code,
                info.split_whitespace().next().map(str::to_string),
            ),
            Tag::CodeBlock(CodeBlockKind::Indented) => (ContentType::Code, None),
            Tag::Item => (ContentType::ListItem, None),
            Tag::TableCell => (ContentType::TableCell, None),
            Tag::BlockQuote(_) => (ContentType::Blockquote, None),
            _ => return,
        };

        self.capture = Some(Capture {
            content_type,
            language,
            text: String::new(),
            offset,
            depth,
        });
    }

    fn end(&mut self, tag: TagEnd) -> Option<ContentBlock> {
        self.depth = self.depth.saturating_sub(1);

        if let TagEnd::Heading(level) = tag {
            if let Some((_, text)) = self.heading.take() {
                self.headings.visit(heading_level(level), &text);
            }
            return None;
        }

        let closes_capture = self
            .capture
            .as_ref()
            .is_some_and(|c| c.depth == self.depth);

        if !closes_capture {
            // Keep nested block boundaries visible in the outer block text
            if matches!(
                tag,
                TagEnd::Paragraph | TagEnd::Item | TagEnd::CodeBlock | TagEnd::BlockQuote(_)
            ) {
                self.push_break();
            }
            return None;
        }

        let capture = self.capture.take()?;
        self.finish(capture)
    }

    fn finish(&mut self, capture: Capture) -> Option<ContentBlock> {
        let content = match capture.content_type {
            ContentType::Code => capture.text.trim_matches('\n').trim_end().to_string(),
            _ => capture.text.trim().to_string(),
        };

        if content.trim().is_empty() {
            return None;
        }

        if self.doc.flavor == Flavor::Mdx
            && capture.depth == 0
            && capture.content_type == ContentType::Paragraph
            && is_esm_statement(&content)
        {
            return None;
        }

        let [heading1, heading2, heading3] = self.headings.levels.clone();
        self.order += 1;

        Some(ContentBlock {
            file_path: self.doc.file_path.clone(),
            file_name: self.doc.file_name.clone(),
            heading1,
            heading2,
            heading3,
            content_type: capture.content_type,
            language: capture.language,
            content,
            line_number: self.lines.line_of(capture.offset),
            order: self.order,
        })
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.text.push_str(text);
        } else if let Some((_, heading)) = self.heading.as_mut() {
            heading.push_str(text);
        }
    }

    fn push_break(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            if !capture.text.is_empty() && !capture.text.ends_with('\n') {
                capture.text.push('\n');
            }
        } else if let Some((_, heading)) = self.heading.as_mut() {
            heading.push(' ');
        }
    }
}

fn heading_level(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn is_esm_statement(text: &str) -> bool {
    ESM_RE.is_match(text)
}
