//! Lexer for stylesheets
//!
//! The lexer converts source code into a stream of tokens.
//! It uses the `logos` crate for efficient lexing.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Lexer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    #[error("unexpected character at position {0}")]
    UnexpectedChar(usize),

    #[error("unclosed string at position {0}")]
    UnterminatedString(usize),

    #[error("unclosed comment at position {0}")]
    UnterminatedComment(usize),
}

impl LexerError {
    /// Byte offset the error points at
    pub fn offset(&self) -> usize {
        match self {
            LexerError::UnexpectedChar(pos)
            | LexerError::UnterminatedString(pos)
            | LexerError::UnterminatedComment(pos) => *pos,
        }
    }
}

/// The stylesheet lexer
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    errors: Vec<LexerError>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
            errors: Vec::new(),
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Get any errors that occurred during lexing
    pub fn errors(&self) -> &[LexerError] {
        &self.errors
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        loop {
            match self.inner.next() {
                Some(Ok(kind)) => {
                    let span = self.inner.span();
                    return Token::new(kind, Span::new(span.start, span.end));
                }
                Some(Err(())) => {
                    // Skip invalid input and record error
                    let span = self.inner.span();
                    let rest = &self.source[span.start..];
                    let error = if rest.starts_with('"') || rest.starts_with('\'') {
                        LexerError::UnterminatedString(span.start)
                    } else if rest.starts_with("/*") {
                        LexerError::UnterminatedComment(span.start)
                    } else {
                        LexerError::UnexpectedChar(span.start)
                    };
                    self.errors.push(error);
                    continue;
                }
                None => {
                    let pos = self.source.len();
                    return Token::new(TokenKind::Eof, Span::new(pos, pos));
                }
            }
        }
    }

    /// Collect all tokens into a vector, ending with an EOF token
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        (tokens, self.errors)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// Helper function to lex source code
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexerError>) {
    Lexer::new(source).tokenize()
}
