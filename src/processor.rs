//! Processing stylesheets with a fixed configuration
//!
//! A [`Processor`] is built once and reused for many documents. Each pass
//! scans the configured mixin sources (files unchanged since the last pass
//! come from cache), then expands the document.

use crate::ast::Root;
use crate::config::Options;
use crate::discovery::{Discovered, Discovery, Message, ModuleLoader};
use crate::expand::{MixinExpander, MixinResult, Registry};
use crate::parser::{parse, parse_file};
use crate::stringify::stringify;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a pass reports besides the rewritten tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub messages: Vec<Message>,
}

pub struct Processor {
    options: Options,
    discovery: Arc<Discovery>,
}

impl Processor {
    pub fn new(options: Options) -> Self {
        let discovery = Arc::new(Discovery::new(&options));
        Self { options, discovery }
    }

    /// A processor whose non-stylesheet mixin files go through `loader`
    pub fn with_loader(options: Options, loader: Arc<dyn ModuleLoader>) -> Self {
        let discovery = Arc::new(Discovery::with_loader(&options, loader));
        Self { options, discovery }
    }

    /// Expand every mixin in `root`
    pub fn process(&self, root: &mut Root) -> MixinResult<ProcessOutput> {
        let discovered = self.discovery.discover();
        self.expand(root, discovered)
    }

    /// Like [`process`](Self::process), with discovery on a blocking worker
    pub async fn process_async(&self, root: &mut Root) -> MixinResult<ProcessOutput> {
        if self.discovery.is_empty() {
            return self.expand(root, Discovered::default());
        }
        let discovery = Arc::clone(&self.discovery);
        let discovered = match tokio::task::spawn_blocking(move || discovery.discover()).await {
            Ok(discovered) => discovered,
            Err(error) => {
                warn!(%error, "mixin discovery task failed");
                Discovered::default()
            }
        };
        self.expand(root, discovered)
    }

    /// Parse, expand and print a stylesheet
    pub fn process_str(&self, input: &str) -> MixinResult<(String, ProcessOutput)> {
        let mut root = parse(input)?;
        let output = self.process(&mut root)?;
        Ok((stringify(&root), output))
    }

    /// Like [`process_str`](Self::process_str), with locations naming `path`
    pub fn process_file(&self, input: &str, path: impl Into<PathBuf>) -> MixinResult<(String, ProcessOutput)> {
        let mut root = parse_file(input, path)?;
        let output = self.process(&mut root)?;
        Ok((stringify(&root), output))
    }

    fn expand(&self, root: &mut Root, discovered: Discovered) -> MixinResult<ProcessOutput> {
        let mut registry = Registry::with_options(self.options.mixins.clone());
        registry.merge_external(discovered.mixins);
        debug!(mixins = registry.len(), "expanding stylesheet");

        MixinExpander::new(registry)
            .with_keywords(self.options.rules.clone())
            .silent(self.options.silent)
            .expand_root(root)?;

        Ok(ProcessOutput {
            messages: discovered.messages,
        })
    }
}
