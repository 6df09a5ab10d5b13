//! Token definitions for stylesheets
//!
//! This module defines all the tokens that the lexer can produce. Whitespace and
//! comments are real tokens: the parser keeps them as formatting hints so the
//! stringifier can reproduce untouched input byte for byte.

use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get the text of this token from source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }

    /// Whitespace or comment: trimmed from the edges of selectors, params and values
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Space | TokenKind::Comment)
    }
}

/// All possible token types in a stylesheet
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ============ Trivia ============

    /// Spaces, tabs and newlines
    #[regex(r"[ \t\r\n\f]+")]
    Space,

    /// Block comment: `/* ... */`
    #[token("/*", block_comment)]
    Comment,

    // ============ Literals ============

    /// Quoted string: "a", 'b', with backslash escapes
    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r#"'([^'\\]|\\.)*'"#)]
    String,

    /// At-keyword: `@media`, `@define-mixin`, `@mixin`
    #[regex(r##"@[^ \t\r\n\f"#'()/;\[\\\]{}]*"##)]
    AtWord,

    /// Any run of ordinary characters: selectors, props, values, numbers
    #[regex(r#"([^ \t\r\n\f"'(){}\[\];:@/\\!#]|\\[^\r\n\f])+"#)]
    Word,

    // ============ Punctuation ============

    #[token("{")]
    OpenCurly,
    #[token("}")]
    CloseCurly,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenSquare,
    #[token("]")]
    CloseSquare,

    /// Lone `/`, `!`, `#` or `\`
    #[regex(r"[/!#\\]")]
    Punct,

    // ============ Special ============

    /// End of file
    Eof,
}

/// Consume a block comment body up to and including `*/`. An unclosed
/// comment swallows the rest of the input and lexes as an error.
fn block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Space => "whitespace",
            TokenKind::Comment => "comment",
            TokenKind::String => "string",
            TokenKind::AtWord => "at-word",
            TokenKind::Word => "word",
            TokenKind::OpenCurly => "{",
            TokenKind::CloseCurly => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenSquare => "[",
            TokenKind::CloseSquare => "]",
            TokenKind::Punct => "punctuation",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}
