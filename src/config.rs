//! Processor configuration
//!
//! Options can be built in code or read from a JSON file:
//!
//! ```json
//! {
//!   "mixinsDir": ["mixins", "vendor/mixins"],
//!   "mixinsFiles": "shared/*.css",
//!   "silent": false,
//!   "mixins": { "clearfix": { "&::after": { "content": "''", "display": "table" } } },
//!   "rules": { "mixin": "include", "defineMixin": "mixin-def" }
//! }
//! ```
//!
//! Procedure mixins are Rust closures and can only be added in code.

use crate::expand::{Arguments, InvocationSite, Mixin, ProcedureResult};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Always accepted as an alias of the invocation keyword
pub const ADD_MIXIN_ALIAS: &str = "add-mixin";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// At-rule names the engine reacts to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Keywords {
    /// Invocation, `mixin` by default
    pub mixin: String,
    /// Definition, `define-mixin` by default
    pub define_mixin: String,
    /// Content placeholder, `mixin-content` by default
    pub mixin_content: String,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            mixin: "mixin".to_string(),
            define_mixin: "define-mixin".to_string(),
            mixin_content: "mixin-content".to_string(),
        }
    }
}

impl Keywords {
    pub fn is_invocation(&self, name: &str) -> bool {
        name == self.mixin || name == ADD_MIXIN_ALIAS
    }
}

/// Options for a [`Processor`](crate::Processor)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Built-in mixins; these win over every other source
    pub mixins: HashMap<String, Mixin>,
    /// Directories scanned (non-recursively) for mixin files
    #[serde(deserialize_with = "one_or_many")]
    pub mixins_dir: Vec<PathBuf>,
    /// Globs of mixin files; they override mixins from directories
    #[serde(deserialize_with = "one_or_many")]
    pub mixins_files: Vec<String>,
    /// Drop calls to undefined mixins instead of failing
    pub silent: bool,
    /// Reported as the parent of every discovered file
    pub parent: Option<PathBuf>,
    /// Renamed at-rules
    pub rules: Keywords,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_mixin(mut self, name: impl Into<String>, mixin: Mixin) -> Self {
        self.mixins.insert(name.into(), mixin);
        self
    }

    /// Register a procedure mixin
    pub fn with_procedure<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut InvocationSite, &Arguments) -> ProcedureResult + Send + Sync + 'static,
    {
        self.with_mixin(name, Mixin::procedure(f))
    }

    pub fn with_mixins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mixins_dir.push(dir.into());
        self
    }

    pub fn with_mixins_file(mut self, glob: impl Into<String>) -> Self {
        self.mixins_files.push(glob.into());
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_keywords(mut self, rules: Keywords) -> Self {
        self.rules = rules;
        self
    }
}

/// Accept `"x"` as well as `["x", "y"]`
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
