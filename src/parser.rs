//! Parser for stylesheets
//!
//! This is a recursive descent parser that converts tokens into a [`Root`].
//! Whitespace and comments around nodes are kept in [`Raws`] so the stringifier
//! reproduces untouched input exactly.

use crate::ast::{AtRule, Comment, Decl, Node, Raws, Root, Rule};
use crate::lexer::{lex, LexerError};
use crate::span::{LineIndex, SourceLocation, Span};
use crate::token::{Token, TokenKind};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{location}: Unknown word {word}")]
    UnknownWord { word: String, location: SourceLocation },

    #[error("{location}: Unexpected }}")]
    UnexpectedClose { location: SourceLocation },

    #[error("{location}: Unclosed block")]
    UnclosedBlock { location: SourceLocation },

    #[error("{location}: Unclosed bracket")]
    UnclosedBracket { location: SourceLocation },

    #[error("{location}: {error}")]
    Lex { error: LexerError, location: SourceLocation },
}

impl ParseError {
    pub fn location(&self) -> &SourceLocation {
        match self {
            ParseError::UnknownWord { location, .. }
            | ParseError::UnexpectedClose { location }
            | ParseError::UnclosedBlock { location }
            | ParseError::UnclosedBracket { location }
            | ParseError::Lex { location, .. } => location,
        }
    }
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// Children of a block plus the raws that belong to the enclosing container
struct Body {
    nodes: Vec<Node>,
    after: String,
    semicolon: Option<bool>,
}

/// How a run of at-rule params or rule/declaration tokens ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Semicolon,
    Open,
    Close,
    Eof,
}

/// The stylesheet parser
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    line_index: LineIndex,
    file: Option<Arc<PathBuf>>,
    lex_errors: Vec<LexerError>,
    /// Whitespace and free semicolons waiting to become the next node's `before`
    spaces: String,
}

impl<'src> Parser<'src> {
    /// Create a new parser
    pub fn new(source: &'src str) -> Self {
        let (tokens, lex_errors) = lex(source);
        Self {
            source,
            tokens,
            pos: 0,
            line_index: LineIndex::new(source),
            file: None,
            lex_errors,
            spaces: String::new(),
        }
    }

    /// Attach the file path the source was read from (used in locations)
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(Arc::new(path.into()));
        self
    }

    /// Parse the whole input
    pub fn parse(mut self) -> ParseResult<Root> {
        if let Some(error) = self.lex_errors.first().cloned() {
            let location = self.location_at(error.offset());
            return Err(ParseError::Lex { error, location });
        }

        let body = self.parse_body(None)?;
        let mut root = Root::with_nodes(body.nodes);
        root.raws.after = Some(body.after);
        root.raws.semicolon = body.semicolon;
        root.file = self.file.clone();
        Ok(root)
    }

    // ============ Token helpers ============

    fn current(&self) -> &Token {
        // The token list always ends with EOF
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn text(&self, tokens: &[Token]) -> &'src str {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => &self.source[first.span.start..last.span.end],
            _ => "",
        }
    }

    fn location_at(&self, offset: usize) -> SourceLocation {
        SourceLocation::new(
            self.file.clone(),
            self.line_index.position(self.source, offset),
            Span::new(offset, offset),
        )
    }

    fn location(&self, token: &Token) -> SourceLocation {
        SourceLocation::new(
            self.file.clone(),
            self.line_index.position(self.source, token.span.start),
            token.span,
        )
    }

    fn take_spaces(&mut self) -> String {
        std::mem::take(&mut self.spaces)
    }

    // ============ Containers ============

    /// Parse nodes until the matching `}` (when `open` is the opening brace) or EOF
    fn parse_body(&mut self, open: Option<&Token>) -> ParseResult<Body> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut semicolon = false;

        loop {
            let token = self.current().clone();
            match token.kind {
                TokenKind::Space => {
                    self.spaces.push_str(token.text(self.source));
                    self.advance();
                }
                TokenKind::Comment => {
                    self.advance();
                    let comment = self.comment(&token);
                    nodes.push(comment.into());
                }
                TokenKind::Semicolon => {
                    self.advance();
                    self.spaces.push(';');
                    if let Some(Node::Rule(prev)) = nodes.last_mut() {
                        if prev.raws.own_semicolon.is_none() {
                            prev.raws.own_semicolon = Some(std::mem::take(&mut self.spaces));
                        }
                    }
                }
                TokenKind::CloseCurly => {
                    if open.is_none() {
                        return Err(ParseError::UnexpectedClose {
                            location: self.location(&token),
                        });
                    }
                    self.advance();
                    return Ok(self.finish_body(nodes, semicolon));
                }
                TokenKind::Eof => {
                    if let Some(open) = open {
                        return Err(ParseError::UnclosedBlock {
                            location: self.location(open),
                        });
                    }
                    return Ok(self.finish_body(nodes, semicolon));
                }
                TokenKind::AtWord => {
                    self.advance();
                    let (rule, ended_with_semicolon) = self.at_rule(&token)?;
                    semicolon = ended_with_semicolon;
                    nodes.push(rule.into());
                }
                _ => {
                    let (node, ended_with_semicolon) = self.rule_or_decl()?;
                    semicolon = ended_with_semicolon;
                    nodes.push(node);
                }
            }
        }
    }

    fn finish_body(&mut self, nodes: Vec<Node>, semicolon: bool) -> Body {
        let semicolon = if nodes.is_empty() { None } else { Some(semicolon) };
        Body {
            nodes,
            after: self.take_spaces(),
            semicolon,
        }
    }

    /// Collect tokens up to a top-level `;`, `{`, `}` or EOF.
    ///
    /// `;` and `{` are consumed, `}` is left for the enclosing body. At-rule
    /// params may run into EOF with a bracket still open; rules and
    /// declarations may not.
    fn collect_until_terminator(&mut self, allow_open_brackets: bool) -> ParseResult<(Vec<Token>, Terminator)> {
        let mut tokens = Vec::new();
        let mut brackets: Vec<(TokenKind, Token)> = Vec::new();

        loop {
            let token = self.current().clone();
            if token.kind == TokenKind::Eof {
                if let Some((_, opener)) = brackets.first().filter(|_| !allow_open_brackets) {
                    return Err(ParseError::UnclosedBracket {
                        location: self.location(opener),
                    });
                }
                return Ok((tokens, Terminator::Eof));
            }

            if brackets.is_empty() {
                match token.kind {
                    TokenKind::Semicolon => {
                        self.advance();
                        return Ok((tokens, Terminator::Semicolon));
                    }
                    TokenKind::OpenCurly => {
                        self.advance();
                        return Ok((tokens, Terminator::Open));
                    }
                    TokenKind::CloseCurly => return Ok((tokens, Terminator::Close)),
                    _ => {}
                }
            }

            match token.kind {
                TokenKind::OpenParen => brackets.push((TokenKind::CloseParen, token.clone())),
                TokenKind::OpenSquare => brackets.push((TokenKind::CloseSquare, token.clone())),
                TokenKind::OpenCurly => brackets.push((TokenKind::CloseCurly, token.clone())),
                kind if brackets.last().map(|(close, _)| *close) == Some(kind) => {
                    brackets.pop();
                }
                _ => {}
            }

            tokens.push(self.advance());
        }
    }

    // ============ Nodes ============

    fn comment(&mut self, token: &Token) -> Comment {
        let raw = token.text(self.source);
        let inner = &raw[2..raw.len() - 2];
        let mut raws = Raws {
            before: Some(self.take_spaces()),
            ..Raws::default()
        };

        let text = inner.trim();
        if text.is_empty() {
            raws.left = Some(inner.to_string());
            raws.right = Some(String::new());
        } else {
            let left_len = inner.len() - inner.trim_start().len();
            let right_len = inner.len() - inner.trim_end().len();
            raws.left = Some(inner[..left_len].to_string());
            raws.right = Some(inner[inner.len() - right_len..].to_string());
        }

        Comment {
            text: text.to_string(),
            raws,
            source: Some(self.location(token)),
        }
    }

    /// Parse an at-rule whose at-word was just consumed
    fn at_rule(&mut self, at: &Token) -> ParseResult<(AtRule, bool)> {
        let mut rule = AtRule::new(&at.text(self.source)[1..], "");
        rule.source = Some(self.location(at));
        rule.raws.before = Some(self.take_spaces());

        let (params, terminator) = self.collect_until_terminator(true)?;
        let (leading, middle, trailing) = split_trivia(&params);

        if middle.is_empty() {
            rule.raws.after_name = Some(String::new());
            rule.raws.between = Some(self.text(&params).to_string());
        } else {
            rule.raws.between = Some(self.text(trailing).to_string());
            rule.raws.after_name = Some(self.text(leading).to_string());
            rule.params = self.text(middle).to_string();
            if terminator == Terminator::Eof {
                // Whitespace at the very end belongs to the root
                self.spaces = rule.raws.between.take().unwrap_or_default();
                rule.raws.between = Some(String::new());
            }
        }

        if terminator == Terminator::Open {
            let open = self.tokens[self.pos - 1].clone();
            let body = self.parse_body(Some(&open))?;
            rule.nodes = Some(body.nodes);
            rule.raws.after = Some(body.after);
            rule.raws.semicolon = body.semicolon;
        }

        Ok((rule, terminator == Terminator::Semicolon))
    }

    /// Parse a rule (`selector {`) or a declaration (`prop: value`)
    fn rule_or_decl(&mut self) -> ParseResult<(Node, bool)> {
        let (tokens, terminator) = self.collect_until_terminator(false)?;

        if terminator == Terminator::Open {
            let (_, middle, trailing) = split_trivia(&tokens);
            let mut rule = Rule::new(self.text(middle));
            rule.source = middle.first().map(|t| self.location(t));
            rule.raws.before = Some(self.take_spaces());
            rule.raws.between = Some(self.text(trailing).to_string());

            let open = self.tokens[self.pos - 1].clone();
            let body = self.parse_body(Some(&open))?;
            rule.nodes = body.nodes;
            rule.raws.after = Some(body.after);
            rule.raws.semicolon = body.semicolon;
            return Ok((rule.into(), false));
        }

        let colon = tokens.iter().position(|t| t.kind == TokenKind::Colon);
        match colon {
            Some(colon) if colon > 0 => {
                let decl = self.decl(&tokens, colon, terminator);
                Ok((decl.into(), terminator == Terminator::Semicolon))
            }
            _ => {
                let first = tokens.first().cloned().unwrap_or_else(|| self.current().clone());
                Err(ParseError::UnknownWord {
                    word: first.text(self.source).to_string(),
                    location: self.location(&first),
                })
            }
        }
    }

    fn decl(&mut self, tokens: &[Token], colon: usize, terminator: Terminator) -> Decl {
        let prop_end = tokens
            .iter()
            .position(|t| t.is_trivia() || t.kind == TokenKind::Colon)
            .unwrap_or(colon);

        let mut decl = Decl::new(self.text(&tokens[..prop_end]), "");
        decl.source = Some(self.location(&tokens[0]));
        decl.raws.before = Some(self.take_spaces());

        let (leading, middle, trailing) = split_trivia(&tokens[colon + 1..]);
        let mut between = self.text(&tokens[prop_end..=colon]).to_string();
        between.push_str(self.text(leading));
        decl.raws.between = Some(between);

        let mut value = self.text(middle).to_string();
        if let Some(bang) = value.rfind('!') {
            if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
                let head_len = value[..bang].trim_end().len();
                decl.important = true;
                decl.raws.important = Some(value[head_len..].to_string());
                value.truncate(head_len);
            }
        }
        decl.value = value;

        let trailing = self.text(trailing).to_string();
        if terminator == Terminator::Semicolon {
            if !trailing.is_empty() {
                decl.raws.after = Some(trailing);
            }
        } else {
            self.spaces.push_str(&trailing);
        }

        decl
    }
}

/// Split tokens into (leading trivia, content, trailing trivia)
fn split_trivia(tokens: &[Token]) -> (&[Token], &[Token], &[Token]) {
    let start = tokens.iter().position(|t| !t.is_trivia()).unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| !t.is_trivia())
        .map(|i| i + 1)
        .unwrap_or(start);
    (&tokens[..start], &tokens[start..end], &tokens[end..])
}

/// Parse a stylesheet without a file name
pub fn parse(source: &str) -> ParseResult<Root> {
    Parser::new(source).parse()
}

/// Parse a stylesheet read from `path`
pub fn parse_file(source: &str, path: impl Into<PathBuf>) -> ParseResult<Root> {
    Parser::new(source).with_file(path).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    fn parse_ok(source: &str) -> Root {
        match parse(source) {
            Ok(root) => root,
            Err(e) => panic!("Parse error: {}", e),
        }
    }

    #[test]
    fn test_empty() {
        let root = parse_ok("");
        assert!(root.nodes.is_empty());
        assert_eq!(root.raws.after.as_deref(), Some(""));
    }

    #[test]
    fn test_rule_with_decl() {
        let root = parse_ok("a { color: black; }");
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.selector, "a");
        assert_eq!(rule.raws.between.as_deref(), Some(" "));
        assert_eq!(rule.raws.after.as_deref(), Some(" "));
        assert_eq!(rule.raws.semicolon, Some(true));

        let Node::Decl(decl) = &rule.nodes[0] else {
            panic!("expected decl");
        };
        assert_eq!(decl.prop, "color");
        assert_eq!(decl.value, "black");
        assert_eq!(decl.raws.before.as_deref(), Some(" "));
        assert_eq!(decl.raws.between.as_deref(), Some(": "));
    }

    #[test]
    fn test_at_rule_without_body() {
        let root = parse_ok("@mixin a 1, 2;");
        let Node::AtRule(rule) = &root.nodes[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(rule.name, "mixin");
        assert_eq!(rule.params, "a 1, 2");
        assert_eq!(rule.nodes, None);
        assert_eq!(rule.raws.after_name.as_deref(), Some(" "));
        assert_eq!(root.raws.semicolon, Some(true));
    }

    #[test]
    fn test_at_rule_with_body() {
        let root = parse_ok("@define-mixin m $a, $b: b { v: $a $b; }");
        let Node::AtRule(rule) = &root.nodes[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(rule.name, "define-mixin");
        assert_eq!(rule.params, "m $a, $b: b");
        assert_eq!(rule.children().len(), 1);
    }

    #[test]
    fn test_semicolon_inside_parens_does_not_end_params() {
        let root = parse_ok("@mixin a single-arg(1, 2;");
        let Node::AtRule(rule) = &root.nodes[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(rule.params, "a single-arg(1, 2;");
    }

    #[test]
    fn test_at_rule_closed_by_brace_keeps_trailing_space() {
        let root = parse_ok("b { @mixin-content }");
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.nodes[0].raws().between.as_deref(), Some(" "));
        assert_eq!(rule.raws.after.as_deref(), Some(""));
    }

    #[test]
    fn test_decl_trailing_space_goes_to_parent() {
        let root = parse_ok("a { b: 2 }");
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.raws.after.as_deref(), Some(" "));
        assert_eq!(rule.raws.semicolon, Some(false));
    }

    #[test]
    fn test_important() {
        let root = parse_ok("a { color: red !important }");
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        let Node::Decl(decl) = &rule.nodes[0] else {
            panic!("expected decl");
        };
        assert_eq!(decl.value, "red");
        assert!(decl.important);
    }

    #[test]
    fn test_free_semicolon_after_rule() {
        let root = parse_ok("a {}; b {}");
        let Node::Rule(rule) = &root.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.raws.own_semicolon.as_deref(), Some(";"));
        assert_eq!(root.nodes[1].raws().before.as_deref(), Some(" "));
    }

    #[test]
    fn test_free_semicolon_after_at_rule_joins_before() {
        let root = parse_ok("@define-mixin a { a: 1 }; @mixin a");
        assert_eq!(root.nodes[1].raws().before.as_deref(), Some("; "));
    }

    #[test]
    fn test_comment() {
        let root = parse_ok("/* hello */");
        let Node::Comment(comment) = &root.nodes[0] else {
            panic!("expected comment");
        };
        assert_eq!(comment.text, "hello");
        assert_eq!(comment.raws.left.as_deref(), Some(" "));
    }

    #[test]
    fn test_source_positions() {
        let root = parse_ok("a {}\n  @mixin b;");
        let loc = root.nodes[1].source().cloned().unwrap_or_default();
        assert_eq!(loc.start, Position::new(2, 3));
    }

    #[test]
    fn test_unknown_word() {
        let err = parse("a { color }").unwrap_err();
        assert!(matches!(err, ParseError::UnknownWord { ref word, .. } if word == "color"));
    }

    #[test]
    fn test_unexpected_close() {
        let err = parse("a {} }").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedClose { .. }));
        assert_eq!(err.location().start, Position::new(1, 6));
    }

    #[test]
    fn test_unclosed_bracket_in_decl() {
        let err = parse("a { b: calc(1 + 2 }").unwrap_err();
        assert!(matches!(err, ParseError::UnclosedBracket { .. }));
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse("a { b: 1").unwrap_err();
        assert!(matches!(err, ParseError::UnclosedBlock { .. }));
    }
}
