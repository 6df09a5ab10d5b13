//! Indentation-based stylesheet syntax (`.sss` mixin libraries)
//!
//! ```text
//! @define-mixin icon $name
//!   background: url(/icons/$(name).png)
//!   &:hover
//!     opacity: 0.5
//! ```
//!
//! Nesting follows indentation instead of braces and there are no semicolons.
//! Nodes from this syntax carry no formatting raws: they only ever reach output
//! through mixin expansion, where they take on the style of the host document.

use crate::ast::{AtRule, Comment, Decl, Node, Root, Rule};
use crate::parser::{ParseError, ParseResult};
use crate::span::{LineIndex, SourceLocation, Span};
use std::path::PathBuf;
use std::sync::Arc;

/// A non-blank source line
#[derive(Debug, Clone, Copy)]
struct Line<'src> {
    indent: usize,
    text: &'src str,
    /// Byte offset of the first non-indent character
    offset: usize,
}

/// Parser for the indentation syntax
pub struct IndentParser<'src> {
    source: &'src str,
    lines: Vec<Line<'src>>,
    pos: usize,
    line_index: LineIndex,
    file: Option<Arc<PathBuf>>,
}

impl<'src> IndentParser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        for raw in source.split_inclusive('\n') {
            let content = raw.trim_end_matches(['\n', '\r']);
            let trimmed = content.trim_start_matches([' ', '\t']);
            let indent = content.len() - trimmed.len();
            let text = trimmed.trim_end();
            if !text.is_empty() {
                lines.push(Line {
                    indent,
                    text,
                    offset: start + indent,
                });
            }
            start += raw.len();
        }

        Self {
            source,
            lines,
            pos: 0,
            line_index: LineIndex::new(source),
            file: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(Arc::new(path.into()));
        self
    }

    pub fn parse(mut self) -> ParseResult<Root> {
        let nodes = self.children(None)?;
        let mut root = Root::with_nodes(nodes);
        root.file = self.file.clone();
        Ok(root)
    }

    fn location(&self, line: &Line<'_>) -> SourceLocation {
        SourceLocation::new(
            self.file.clone(),
            self.line_index.position(self.source, line.offset),
            Span::new(line.offset, line.offset + line.text.len()),
        )
    }

    /// Parse every following line indented deeper than `parent`
    fn children(&mut self, parent: Option<usize>) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            if parent.map_or(false, |indent| line.indent <= indent) {
                break;
            }
            self.pos += 1;

            let nested = self
                .lines
                .get(self.pos)
                .map_or(false, |next| next.indent > line.indent);
            let children = if nested {
                Some(self.children(Some(line.indent))?)
            } else {
                None
            };

            let mut node = self.node(&line, children)?;
            node.set_source(Some(self.location(&line)));
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn node(&self, line: &Line<'src>, children: Option<Vec<Node>>) -> ParseResult<Node> {
        let text = line.text;

        if let Some(inner) = text.strip_prefix("/*") {
            let inner = inner.strip_suffix("*/").unwrap_or(inner);
            return Ok(Comment::new(inner.trim()).into());
        }
        if let Some(inner) = text.strip_prefix("//") {
            return Ok(Comment::new(inner.trim()).into());
        }

        if let Some(at) = text.strip_prefix('@') {
            let (name, params) = match at.find(char::is_whitespace) {
                Some(end) => (&at[..end], at[end..].trim()),
                None => (at, ""),
            };
            let mut rule = AtRule::new(name, params);
            rule.nodes = children;
            return Ok(rule.into());
        }

        if let Some(children) = children {
            return Ok(Rule::with_nodes(text, children).into());
        }

        match text.find(':') {
            Some(colon) if colon > 0 => {
                let prop = text[..colon].trim();
                let mut value = text[colon + 1..].trim().to_string();
                let mut decl = Decl::new(prop, "");
                if let Some(bang) = value.rfind('!') {
                    if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
                        value.truncate(bang);
                        value.truncate(value.trim_end().len());
                        decl.important = true;
                    }
                }
                decl.value = value;
                Ok(decl.into())
            }
            _ => Err(ParseError::UnknownWord {
                word: text.split_whitespace().next().unwrap_or(text).to_string(),
                location: self.location(line),
            }),
        }
    }
}

/// Parse indented source without a file name
pub fn parse_indented(source: &str) -> ParseResult<Root> {
    IndentParser::new(source).parse()
}

/// Parse indented source read from `path`
pub fn parse_indented_file(source: &str, path: impl Into<PathBuf>) -> ParseResult<Root> {
    IndentParser::new(source).with_file(path).parse()
}
