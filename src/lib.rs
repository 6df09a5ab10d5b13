//! Stylemix
//!
//! A mixin expansion engine for stylesheet trees. Stylesheets define
//! reusable blocks with `@define-mixin` and splice them in with `@mixin`;
//! mixins can also come from JSON objects, mixin files on disk, or Rust
//! procedures registered by the embedder.
//!
//! # Architecture
//!
//! ```text
//! Stylesheet (.css)            Mixin dirs / files
//!       │                             │
//!       ▼                             ▼
//! ┌─────────────┐              ┌─────────────┐
//! │    Lexer    │  → Tokens    │  Discovery  │  → Mixins + dependency messages
//! └─────────────┘              └─────────────┘
//!       │                             │
//!       ▼                             │
//! ┌─────────────┐                     │
//! │   Parser    │  → Root             │
//! └─────────────┘                     │
//!       │                             │
//!       ▼                             ▼
//! ┌──────────────────────────────────────────┐
//! │             Mixin Expansion              │  → Root without mixins
//! └──────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Stringifier │  → CSS text
//! └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use stylemix::{Options, Processor};
//!
//! let processor = Processor::new(Options::new());
//! let (css, _) = processor
//!     .process_str("@define-mixin red { color: red; } a { @mixin red; }")
//!     .unwrap();
//! assert_eq!(css, "a { color: red; }");
//! ```

pub mod lexer;
pub mod token;
pub mod span;
pub mod ast;
pub mod parser;
pub mod sugarss;
pub mod stringify;
pub mod vars;
pub mod object;
pub mod expand;
pub mod config;
pub mod discovery;
pub mod processor;

// Re-exports for convenience
pub use ast::{AtRule, Comment, Decl, Node, Root, Rule};
pub use config::{Keywords, Options};
pub use discovery::{LoadedModule, Message, ModuleLoader, StaticModuleLoader};
pub use expand::{Arguments, InvocationSite, Mixin, MixinError, MixinErrorKind, MixinResult};
pub use parser::{parse, ParseError};
pub use processor::{ProcessOutput, Processor};
pub use span::{SourceLocation, Span};
pub use stringify::stringify;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
