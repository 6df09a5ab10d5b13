//! Mixin expansion errors

use crate::parser::ParseError;
use crate::span::SourceLocation;
use std::fmt;
use thiserror::Error;

/// Result type for mixin expansion
pub type MixinResult<T> = Result<T, MixinError>;

/// An expansion error, located at the at-rule that caused it when known
#[derive(Debug, Clone, PartialEq)]
pub struct MixinError {
    pub kind: MixinErrorKind,
    pub location: Option<SourceLocation>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixinErrorKind {
    /// No mixin registered under this name
    #[error("Undefined mixin {name}")]
    UndefinedMixin { name: String },

    /// A `single-arg` argument without its parentheses
    #[error("Content of single-arg must be wrapped in brackets: {text}")]
    MalformedSingleArg { text: String },

    /// `@mixin name(args)` call syntax
    #[error("Remove brackets from mixin. Like: @mixin name(1px) → @mixin name 1px")]
    IllegalInvocationSyntax { name: String },

    /// The registered value is not a usable mixin
    #[error("Wrong {name} mixin type {type_name}")]
    UnsupportedMixinType { name: String, type_name: &'static str },

    /// A procedure returned something other than an object or nothing
    #[error("Mixin {name} returned unsupported type {type_name}")]
    UnsupportedResultType { name: String, type_name: &'static str },

    /// A procedure reported a failure
    #[error("Mixin {name} failed: {message}")]
    ProcedureFailed { name: String, message: String },

    /// Mixins nested deeper than the limit, usually a mixin calling itself
    #[error("recursion limit ({depth}) exceeded while expanding mixin {name}")]
    RecursionLimitExceeded { depth: usize, name: String },

    /// A mixin library file failed to parse
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl MixinError {
    pub fn new(kind: MixinErrorKind, location: Option<SourceLocation>) -> Self {
        Self { kind, location }
    }

    // ============ Error Constructors ============

    pub fn undefined_mixin(name: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::new(MixinErrorKind::UndefinedMixin { name: name.into() }, location)
    }

    /// Raised without a location: the problem is the registered value, not the call
    pub fn unsupported_mixin_type(name: impl Into<String>, type_name: &'static str) -> Self {
        Self::new(
            MixinErrorKind::UnsupportedMixinType {
                name: name.into(),
                type_name,
            },
            None,
        )
    }

    pub fn unsupported_result_type(
        name: impl Into<String>,
        type_name: &'static str,
        location: Option<SourceLocation>,
    ) -> Self {
        Self::new(
            MixinErrorKind::UnsupportedResultType {
                name: name.into(),
                type_name,
            },
            location,
        )
    }

    pub fn procedure_failed(
        name: impl Into<String>,
        message: impl Into<String>,
        location: Option<SourceLocation>,
    ) -> Self {
        Self::new(
            MixinErrorKind::ProcedureFailed {
                name: name.into(),
                message: message.into(),
            },
            location,
        )
    }

    pub fn recursion_limit(depth: usize, name: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::new(
            MixinErrorKind::RecursionLimitExceeded {
                depth,
                name: name.into(),
            },
            location,
        )
    }

    /// The message without the location prefix
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for MixinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for MixinError {}

impl From<ParseError> for MixinError {
    fn from(error: ParseError) -> Self {
        Self::new(MixinErrorKind::Parse(error), None)
    }
}
