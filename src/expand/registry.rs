//! Mixin registry
//!
//! A mixin is one of three kinds, unified behind the same `@mixin` call:
//!
//! | Kind        | Comes from                                   |
//! |-------------|----------------------------------------------|
//! | `Template`  | `@define-mixin` in the document or a library |
//! | `Object`    | a JSON object (options or a `.json` file)    |
//! | `Procedure` | a Rust callback registered by the embedder   |
//!
//! Names resolve through three layers: options first, then definitions from
//! the document being processed, then mixins discovered on disk.

use crate::ast::{walk, AtRule, Node, Root, Walk};
use crate::config::Keywords;
use crate::span::SourceLocation;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::params::{parse_definition_header, Param};

// ============ Mixin kinds ============

/// A registered mixin
#[derive(Clone)]
pub enum Mixin {
    /// `@define-mixin` body with parameters
    Template(Arc<Definition>),
    /// Stylesheet-shaped JSON object
    Object(Arc<Map<String, Value>>),
    /// Callback invoked with the call site and its arguments
    Procedure(Arc<dyn Procedure>),
    /// A value that cannot be expanded, kept for the error message
    Unsupported(Value),
}

impl Mixin {
    /// Objects become data-object mixins, anything else is unsupported
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Mixin::Object(Arc::new(map)),
            other => Mixin::Unsupported(other),
        }
    }

    pub fn procedure<F>(f: F) -> Self
    where
        F: Fn(&mut InvocationSite, &Arguments) -> ProcedureResult + Send + Sync + 'static,
    {
        Mixin::Procedure(Arc::new(f))
    }

    /// Run-time type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Mixin::Template(_) => "template",
            Mixin::Object(_) => "object",
            Mixin::Procedure(_) => "function",
            Mixin::Unsupported(value) => json_type_name(value),
        }
    }
}

impl fmt::Debug for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mixin::Template(def) => f.debug_tuple("Template").field(def).finish(),
            Mixin::Object(map) => f.debug_tuple("Object").field(map).finish(),
            Mixin::Procedure(_) => f.write_str("Procedure(..)"),
            Mixin::Unsupported(value) => f.debug_tuple("Unsupported").field(value).finish(),
        }
    }
}

impl<'de> Deserialize<'de> for Mixin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Mixin::from_value)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A `@define-mixin` rule, detached from its stylesheet
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Node>,
    /// Whether the body contains a content placeholder anywhere
    pub has_content: bool,
    /// Library file the definition was read from
    pub origin: Option<Arc<PathBuf>>,
}

impl Definition {
    /// Build a definition from its at-rule
    pub fn from_at_rule(rule: AtRule, keywords: &Keywords) -> Self {
        let (name, params) = parse_definition_header(&rule.params);
        let has_content = crate::ast::contains_at_rule(rule.children(), &keywords.mixin_content);
        let origin = rule.source.as_ref().and_then(|s| s.file.clone());
        Self {
            name,
            params,
            body: rule.nodes.unwrap_or_default(),
            has_content,
            origin,
        }
    }
}

/// Every definition anywhere in a library stylesheet, in document order
pub fn definitions_in(root: &Root, keywords: &Keywords) -> Vec<Definition> {
    let mut definitions = Vec::new();
    walk(&root.nodes, &mut |node| {
        if let Node::AtRule(rule) = node {
            if rule.name == keywords.define_mixin {
                definitions.push(Definition::from_at_rule(rule.clone(), keywords));
            }
        }
        Walk::Continue
    });
    definitions
}

// ============ Procedures ============

/// Error a procedure may fail with
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a procedure returns: a JSON object to insert as a data-object
/// mixin, or `None`/`null` when it edited the tree through the call site
pub type ProcedureResult = Result<Option<Value>, BoxError>;

/// A mixin implemented in Rust
pub trait Procedure: Send + Sync {
    fn call(&self, site: &mut InvocationSite, args: &Arguments) -> ProcedureResult;
}

impl<F> Procedure for F
where
    F: Fn(&mut InvocationSite, &Arguments) -> ProcedureResult + Send + Sync,
{
    fn call(&self, site: &mut InvocationSite, args: &Arguments) -> ProcedureResult {
        self(site, args)
    }
}

/// Positional arguments of a call. Reading past the last one yields `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: Vec<String>,
}

impl Arguments {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

/// The `@mixin` at-rule a procedure was called from.
///
/// The procedure may read the call, take its child nodes and decide what
/// replaces it. Whatever it does not replace is removed after the call.
#[derive(Debug, Clone)]
pub struct InvocationSite {
    rule: AtRule,
    replacement: Option<Vec<Node>>,
}

impl InvocationSite {
    pub fn new(rule: AtRule) -> Self {
        Self {
            rule,
            replacement: None,
        }
    }

    /// The called mixin's name
    pub fn name(&self) -> &str {
        self.rule.params.split(char::is_whitespace).next().unwrap_or("")
    }

    /// Raw parameter text of the at-rule, name included
    pub fn params(&self) -> &str {
        &self.rule.params
    }

    pub fn at_rule(&self) -> &AtRule {
        &self.rule
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        self.rule.source.as_ref()
    }

    /// Children of the call block, empty when the call has no block
    pub fn nodes(&self) -> &[Node] {
        self.rule.children()
    }

    /// Move the call block's children out
    pub fn take_nodes(&mut self) -> Vec<Node> {
        self.rule.nodes.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Put `nodes` where the call was
    pub fn replace_with<I, N>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.replacement = Some(nodes.into_iter().map(Into::into).collect());
    }

    /// Drop the call without inserting anything
    pub fn remove(&mut self) {
        self.replacement = Some(Vec::new());
    }

    pub(crate) fn into_parts(self) -> (AtRule, Option<Vec<Node>>) {
        (self.rule, self.replacement)
    }
}

// ============ Registry ============

/// Mixins by name, in three layers of precedence
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Mixins passed in the options
    options: HashMap<String, Mixin>,
    /// `@define-mixin` rules of the document being processed
    document: HashMap<String, Mixin>,
    /// Mixins discovered in mixin directories and files
    discovered: HashMap<String, Mixin>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose top layer is `mixins`
    pub fn with_options(mixins: HashMap<String, Mixin>) -> Self {
        Self {
            options: mixins,
            ..Self::default()
        }
    }

    /// Register a document definition. A later definition of the same name
    /// replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, mixin: Mixin) {
        self.document.insert(name.into(), mixin);
    }

    /// Add discovered mixins in order; later sources override earlier ones
    pub fn merge_external<I>(&mut self, discovered: I)
    where
        I: IntoIterator<Item = (String, Mixin)>,
    {
        self.discovered.extend(discovered);
    }

    pub fn lookup(&self, name: &str) -> Option<&Mixin> {
        self.options
            .get(name)
            .or_else(|| self.document.get(name))
            .or_else(|| self.discovered.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        let mut names: Vec<&String> = self
            .options
            .keys()
            .chain(self.document.keys())
            .chain(self.discovered.keys())
            .collect();
        names.sort();
        names.dedup();
        names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.document.is_empty() && self.discovered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn object(value: Value) -> Mixin {
        Mixin::from_value(value)
    }

    fn is_object_with(mixin: Option<&Mixin>, key: &str) -> bool {
        matches!(mixin, Some(Mixin::Object(map)) if map.contains_key(key))
    }

    #[test]
    fn test_precedence() {
        let mut options = HashMap::new();
        options.insert("a".to_string(), object(json!({ "from": "options" })));
        let mut registry = Registry::with_options(options);

        registry.register("a", object(json!({ "from-doc": "1" })));
        registry.register("b", object(json!({ "from-doc": "1" })));
        registry.merge_external(vec![
            ("b".to_string(), object(json!({ "from-disk": "1" }))),
            ("c".to_string(), object(json!({ "from-disk": "1" }))),
        ]);

        assert!(is_object_with(registry.lookup("a"), "from"));
        assert!(is_object_with(registry.lookup("b"), "from-doc"));
        assert!(is_object_with(registry.lookup("c"), "from-disk"));
        assert!(registry.lookup("d").is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_later_discovered_source_wins() {
        let mut registry = Registry::new();
        registry.merge_external(vec![
            ("a".to_string(), object(json!({ "dir": "1" }))),
            ("a".to_string(), object(json!({ "file": "1" }))),
        ]);
        assert!(is_object_with(registry.lookup("a"), "file"));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Mixin::from_value(json!(1)).type_name(), "number");
        assert_eq!(Mixin::from_value(json!("x")).type_name(), "string");
        assert_eq!(Mixin::from_value(json!({})).type_name(), "object");
        let proc = Mixin::procedure(|_site: &mut InvocationSite, _args: &Arguments| Ok(None));
        assert_eq!(proc.type_name(), "function");
    }

    #[test]
    fn test_definitions_in_library() {
        let root = parse("@define-mixin a $x { a: $x; } .wrap { @define-mixin b { @mixin-content; } }")
            .unwrap();
        let defs = definitions_in(&root, &Keywords::default());
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!defs[0].has_content);
        assert!(defs[1].has_content);
        assert_eq!(defs[0].params.len(), 1);
    }

    #[test]
    fn test_invocation_site_edits() {
        let mut rule = AtRule::with_nodes("mixin", "wrap 1", vec![crate::ast::Decl::new("a", "1").into()]);
        rule.raws.before = Some(" ".to_string());
        let mut site = InvocationSite::new(rule);
        assert_eq!(site.name(), "wrap");
        assert_eq!(site.nodes().len(), 1);

        let taken = site.take_nodes();
        site.replace_with(vec![crate::ast::Rule::with_nodes(".wrap", taken)]);
        let (rule, replacement) = site.into_parts();
        assert!(rule.children().is_empty());
        assert_eq!(replacement.map(|r| r.len()), Some(1));
    }
}
