//! Mixin expansion
//!
//! Replaces every `@mixin name args` call in a stylesheet with the nodes the
//! named mixin produces, and collects `@define-mixin` rules along the way.
//!
//! # Architecture
//!
//! ```text
//! @mixin name a, b { content }
//!        │
//!        ▼
//! ┌─────────────────┐
//! │  Params         │  → name, arguments, single-arg unwrapping
//! └─────────────────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │  Registry       │  → options > document > discovered
//! └─────────────────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │  Instantiate    │  → $vars bound, content injected
//! └─────────────────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │  Expand again   │  → calls inside the fragment, then splice
//! └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```css
//! @define-mixin icon $name, $size: 16px {
//!     .icon-$(name) { width: $size; @mixin-content; }
//! }
//!
//! @mixin icon search { color: blue; }
//! ```

pub mod content;
pub mod error;
pub mod expander;
pub mod instantiate;
pub mod params;
pub mod registry;

pub use content::inject_content;
pub use error::{MixinError, MixinErrorKind, MixinResult};
pub use expander::{expand, MixinExpander, MAX_MIXIN_RECURSION_DEPTH};
pub use instantiate::{instantiate_object, instantiate_template, unwrap_single_args};
pub use params::{
    list_comma, parse_definition_header, parse_invocation_params, Invocation, Param, SingleArg,
};
pub use registry::{
    definitions_in, Arguments, BoxError, Definition, InvocationSite, Mixin, Procedure,
    ProcedureResult, Registry,
};
