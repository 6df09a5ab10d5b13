//! The expansion driver

use crate::ast::{insert_before, remove_child, Node, Root};
use crate::config::Keywords;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::error::{MixinError, MixinResult};
use super::instantiate::{instantiate_object, instantiate_template, unwrap_single_args};
use super::params::{parse_invocation_params, Invocation};
use super::registry::{json_type_name, Arguments, Definition, InvocationSite, Mixin, Procedure, Registry};

/// Maximum depth of nested mixin calls
pub const MAX_MIXIN_RECURSION_DEPTH: usize = 128;

/// What to do with the node at the cursor
enum Step {
    Define,
    Invoke,
    Descend,
}

/// Expands mixins in a tree, registering definitions as it meets them
pub struct MixinExpander {
    registry: Registry,
    keywords: Keywords,
    silent: bool,
}

impl MixinExpander {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            keywords: Keywords::default(),
            silent: false,
        }
    }

    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }

    /// Drop calls to undefined mixins instead of failing
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Register a definition under its own name
    pub fn define(&mut self, definition: Definition) {
        debug!(
            name = %definition.name,
            params = definition.params.len(),
            content = definition.has_content,
            "registered mixin"
        );
        self.registry
            .register(definition.name.clone(), Mixin::Template(Arc::new(definition)));
    }

    /// Expand every mixin in the stylesheet. Definitions are registered in
    /// document order and removed, so a call sees every definition above it.
    pub fn expand_root(&mut self, root: &mut Root) -> MixinResult<()> {
        self.expand_nodes(&mut root.nodes, true, 0, true)
    }

    /// Expand a node list. `in_root` selects top-level whitespace handling;
    /// with `define` off, definitions are skipped rather than registered.
    fn expand_nodes(&mut self, nodes: &mut Vec<Node>, in_root: bool, depth: usize, define: bool) -> MixinResult<()> {
        let mut index = 0;
        while index < nodes.len() {
            let step = match &nodes[index] {
                Node::AtRule(rule) if rule.name == self.keywords.define_mixin => Step::Define,
                Node::AtRule(rule) if self.keywords.is_invocation(&rule.name) => Step::Invoke,
                _ => Step::Descend,
            };

            match step {
                Step::Define if define => {
                    if let Node::AtRule(rule) = remove_child(nodes, index, in_root) {
                        self.define(Definition::from_at_rule(rule, &self.keywords));
                    }
                }
                Step::Define => index += 1,
                Step::Invoke => {
                    index += self.invoke(nodes, index, in_root, depth)?;
                }
                Step::Descend => {
                    if let Some(children) = nodes[index].children_mut() {
                        self.expand_nodes(children, false, depth, define)?;
                    }
                    index += 1;
                }
            }
        }
        Ok(())
    }

    /// Expand the call at `nodes[index]` and remove it. Returns how many nodes
    /// were inserted in its place.
    fn invoke(&mut self, nodes: &mut Vec<Node>, index: usize, in_root: bool, depth: usize) -> MixinResult<usize> {
        let Node::AtRule(rule) = &nodes[index] else {
            return Ok(1);
        };
        let location = rule.source.clone();
        let invocation = parse_invocation_params(&rule.params)
            .map_err(|kind| MixinError::new(kind, location.clone()))?;

        if depth >= MAX_MIXIN_RECURSION_DEPTH {
            return Err(MixinError::recursion_limit(depth, invocation.name, location));
        }

        let mixin = match self.registry.lookup(&invocation.name) {
            Some(mixin) => mixin.clone(),
            None if self.silent => {
                debug!(name = %invocation.name, "dropping call to undefined mixin");
                remove_child(nodes, index, in_root);
                return Ok(0);
            }
            None => return Err(MixinError::undefined_mixin(invocation.name, location)),
        };

        debug!(name = %invocation.name, kind = mixin.type_name(), args = invocation.args.len(), "expanding mixin");

        let fragment = match mixin {
            Mixin::Template(definition) => instantiate_template(
                &definition,
                &invocation.args,
                rule.children(),
                &self.keywords.mixin_content,
            ),
            Mixin::Object(object) => instantiate_object(
                &object,
                location.as_ref(),
                rule.children(),
                &self.keywords.mixin_content,
            ),
            Mixin::Procedure(procedure) => {
                return self.call_procedure(nodes, index, in_root, depth, &invocation, procedure.as_ref());
            }
            Mixin::Unsupported(value) => {
                return Err(MixinError::unsupported_mixin_type(
                    invocation.name,
                    json_type_name(&value),
                ));
            }
        };

        let inserted = self.splice(nodes, index, in_root, depth, fragment, &invocation)?;
        remove_child(nodes, index + inserted, in_root);
        Ok(inserted)
    }

    /// Expand a fragment, unwrap its single-arg values and insert it before
    /// `nodes[index]`
    fn splice(
        &mut self,
        nodes: &mut Vec<Node>,
        index: usize,
        in_root: bool,
        depth: usize,
        mut fragment: Vec<Node>,
        invocation: &Invocation,
    ) -> MixinResult<usize> {
        self.expand_nodes(&mut fragment, true, depth + 1, true)?;
        unwrap_single_args(&mut fragment, &invocation.single_args);
        let inserted = fragment.len();
        insert_before(nodes, index, fragment, in_root);
        Ok(inserted)
    }

    fn call_procedure(
        &mut self,
        nodes: &mut Vec<Node>,
        index: usize,
        in_root: bool,
        depth: usize,
        invocation: &Invocation,
        procedure: &dyn Procedure,
    ) -> MixinResult<usize> {
        // Calls inside the block are expanded in the caller's scope first
        let rule = match &mut nodes[index] {
            Node::AtRule(rule) => {
                if let Some(children) = rule.nodes.as_mut() {
                    self.expand_nodes(children, false, depth + 1, false)?;
                }
                std::mem::take(rule)
            }
            _ => return Ok(1),
        };
        let location = rule.source.clone();

        let mut site = InvocationSite::new(rule);
        let args = Arguments::new(invocation.args.clone());
        let result = procedure.call(&mut site, &args);
        let (rule, replacement) = site.into_parts();
        let content = rule.children().to_vec();
        nodes[index] = Node::AtRule(rule);

        let mut inserted = 0;
        match result {
            Ok(Some(Value::Object(object))) => {
                let fragment = instantiate_object(&object, location.as_ref(), &content, &self.keywords.mixin_content);
                inserted += self.splice(nodes, index, in_root, depth, fragment, invocation)?;
            }
            Ok(None) | Ok(Some(Value::Null)) => {}
            Ok(Some(other)) => {
                return Err(MixinError::unsupported_result_type(
                    invocation.name.clone(),
                    json_type_name(&other),
                    location,
                ));
            }
            Err(error) => {
                return Err(MixinError::procedure_failed(
                    invocation.name.clone(),
                    error.to_string(),
                    location,
                ));
            }
        }

        if let Some(replacement) = replacement {
            let at = index + inserted;
            inserted += self.splice(nodes, at, in_root, depth, replacement, invocation)?;
        }

        remove_child(nodes, index + inserted, in_root);
        Ok(inserted)
    }
}

/// Expand mixins in a standalone stylesheet with the given registry
pub fn expand(root: &mut Root, registry: Registry) -> MixinResult<Registry> {
    let mut expander = MixinExpander::new(registry);
    expander.expand_root(root)?;
    Ok(expander.into_registry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Rule;
    use crate::expand::error::MixinErrorKind;
    use crate::parser::parse;
    use crate::stringify::stringify;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    fn run(input: &str, registry: Registry) -> MixinResult<Root> {
        let mut root = parse(input)?;
        MixinExpander::new(registry).expand_root(&mut root)?;
        Ok(root)
    }

    fn expand_str(input: &str, registry: Registry) -> String {
        run(input, registry)
            .map(|root| stringify(&root))
            .unwrap()
    }

    fn with(name: &str, mixin: Mixin) -> Registry {
        let mut mixins = HashMap::new();
        mixins.insert(name.to_string(), mixin);
        Registry::with_options(mixins)
    }

    fn first_rule(root: &Root) -> &Rule {
        match &root.nodes[0] {
            Node::Rule(rule) => rule,
            other => panic!("expected rule, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_template_with_argument() {
        let output = expand_str("@define-mixin a $x { b: $x; } c { @mixin a 1; }", Registry::new());
        assert_eq!(output, "c { b: 1; }");
    }

    #[test]
    fn test_object_mixin() {
        let registry = with("b", Mixin::from_value(json!({ "c": "1" })));
        assert_eq!(expand_str("a { @mixin b; }", registry), "a { c: 1; }");
    }

    #[test]
    fn test_add_mixin_alias() {
        let registry = with("b", Mixin::from_value(json!({ "c": "1" })));
        assert_eq!(expand_str("a { @add-mixin b; }", registry), "a { c: 1; }");
    }

    #[test]
    fn test_call_before_definition_is_undefined() {
        let err = run("a { @mixin m; } @define-mixin m { b: 1 }", Registry::new()).unwrap_err();
        assert!(matches!(err.kind, MixinErrorKind::UndefinedMixin { ref name } if name == "m"));
    }

    #[test]
    fn test_undefined_mixin_location() {
        let err = run("a { @mixin x; }", Registry::new()).unwrap_err();
        assert_eq!(err.to_string(), "<css input>:1:5: Undefined mixin x");
    }

    #[test]
    fn test_silent_drops_undefined() {
        let mut root = parse("a { @mixin x; b: 1 }").unwrap();
        MixinExpander::new(Registry::new())
            .silent(true)
            .expand_root(&mut root)
            .unwrap();
        assert_eq!(stringify(&root), "a { b: 1 }");
    }

    #[test]
    fn test_unsupported_mixin_type() {
        let err = run("a { @mixin a; }", with("a", Mixin::from_value(json!(1)))).unwrap_err();
        assert_eq!(err.to_string(), "Wrong a mixin type number");
        assert!(err.location.is_none());
    }

    #[test]
    fn test_recursion_limit() {
        let err = run("@define-mixin a { @mixin a; } b { @mixin a; }", Registry::new()).unwrap_err();
        assert!(matches!(
            err.kind,
            MixinErrorKind::RecursionLimitExceeded { depth: MAX_MIXIN_RECURSION_DEPTH, .. }
        ));
    }

    #[test]
    fn test_expand_returns_definitions() {
        let mut root = parse("@define-mixin a { b: 1; }").unwrap();
        let registry = expand(&mut root, Registry::new()).unwrap();
        assert!(registry.contains("a"));
        assert!(root.nodes.is_empty());
    }

    #[test]
    fn test_later_definition_wins() {
        let output = expand_str(
            "@define-mixin a { b: 1; } @define-mixin a { b: 2; } c { @mixin a; }",
            Registry::new(),
        );
        assert_eq!(output, "c { b: 2; }");
    }

    #[test]
    fn test_content_is_injected() {
        let root = run(
            "@define-mixin m { .x { @mixin-content; } } a { @mixin m { b: 1 } }",
            Registry::new(),
        )
        .unwrap();
        let a = first_rule(&root);
        let Node::Rule(x) = &a.nodes[0] else {
            panic!("expected nested rule");
        };
        assert_eq!(x.selector, ".x");
        assert!(matches!(&x.nodes[0], Node::Decl(d) if d.prop == "b" && d.value == "1"));
    }

    #[test]
    fn test_procedure_returning_object() {
        let registry = with(
            "size",
            Mixin::procedure(|_site: &mut InvocationSite, args: &Arguments| {
                Ok(Some(json!({ "width": args.get(0).unwrap_or("0") })))
            }),
        );
        assert_eq!(expand_str("a { @mixin size 10px; }", registry), "a { width: 10px; }");
    }

    #[test]
    fn test_procedure_replacing_call() {
        let registry = with(
            "wrap",
            Mixin::procedure(|site: &mut InvocationSite, _args: &Arguments| {
                let nodes = site.take_nodes();
                site.replace_with(vec![Rule::with_nodes(".wrap", nodes)]);
                Ok(None)
            }),
        );
        let root = run("a { @mixin wrap { b: 1 } }", registry).unwrap();
        let a = first_rule(&root);
        assert_eq!(a.nodes.len(), 1);
        let Node::Rule(wrap) = &a.nodes[0] else {
            panic!("expected rule");
        };
        assert_eq!(wrap.selector, ".wrap");
        assert!(matches!(&wrap.nodes[0], Node::Decl(d) if d.prop == "b"));
    }

    #[test]
    fn test_procedure_sees_expanded_block() {
        let mut registry = with(
            "keep",
            Mixin::procedure(|site: &mut InvocationSite, _args: &Arguments| {
                let nodes = site.take_nodes();
                site.replace_with(nodes);
                Ok(None)
            }),
        );
        registry.merge_external(vec![("inner".to_string(), Mixin::from_value(json!({ "c": "1" })))]);
        let root = run("a { @mixin keep { @mixin inner; } }", registry).unwrap();
        let a = first_rule(&root);
        assert!(matches!(&a.nodes[0], Node::Decl(d) if d.prop == "c"));
    }

    #[test]
    fn test_procedure_unsupported_result() {
        let registry = with(
            "p",
            Mixin::procedure(|_site: &mut InvocationSite, _args: &Arguments| Ok(Some(json!("x")))),
        );
        let err = run("a { @mixin p; }", registry).unwrap_err();
        assert!(matches!(
            err.kind,
            MixinErrorKind::UnsupportedResultType { type_name: "string", .. }
        ));
    }

    #[test]
    fn test_procedure_failure() {
        let registry = with(
            "p",
            Mixin::procedure(|_site: &mut InvocationSite, _args: &Arguments| Err("no luck".into())),
        );
        let err = run("a { @mixin p; }", registry).unwrap_err();
        assert_eq!(err.message(), "Mixin p failed: no luck");
    }

    #[test]
    fn test_procedure_without_result_removes_call() {
        let registry = with(
            "p",
            Mixin::procedure(|_site: &mut InvocationSite, _args: &Arguments| Ok(None)),
        );
        let root = run("a { @mixin p; b: 1 }", registry).unwrap();
        let a = first_rule(&root);
        assert_eq!(a.nodes.len(), 1);
        assert!(matches!(&a.nodes[0], Node::Decl(d) if d.prop == "b"));
    }
}
