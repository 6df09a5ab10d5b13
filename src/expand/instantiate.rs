//! Turning a mixin into a fragment of new nodes

use crate::ast::{walk_decls_mut, walk_mut, Node};
use crate::object::object_to_nodes;
use crate::span::SourceLocation;
use crate::vars::{substitute, Scope};
use serde_json::{Map, Value};

use super::content::inject_content;
use super::params::SingleArg;
use super::registry::Definition;

/// Clone a template body with its parameters bound to `args`.
///
/// An empty or missing argument falls back to the parameter's default, and to
/// an empty string without one. Only the template's own parameters are
/// substituted.
pub fn instantiate_template(
    definition: &Definition,
    args: &[String],
    content: &[Node],
    content_keyword: &str,
) -> Vec<Node> {
    let mut fragment: Vec<Node> = definition.body.iter().map(Node::clone_detached).collect();

    if !definition.params.is_empty() {
        let scope: Scope = definition
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let value = args
                    .get(index)
                    .filter(|arg| !arg.is_empty())
                    .cloned()
                    .or_else(|| param.default.clone())
                    .unwrap_or_default();
                (param.name.clone(), value)
            })
            .collect();
        substitute(&mut fragment, &scope);
    }

    if definition.has_content {
        inject_content(&mut fragment, content, content_keyword, true);
    }

    fragment
}

/// Convert a data object into nodes located at the call site
pub fn instantiate_object(
    object: &Map<String, Value>,
    location: Option<&SourceLocation>,
    content: &[Node],
    content_keyword: &str,
) -> Vec<Node> {
    let mut fragment = object_to_nodes(object);
    walk_mut(&mut fragment, &mut |node| node.set_source(location.cloned()));
    inject_content(&mut fragment, content, content_keyword, true);
    fragment
}

/// Put the unwrapped text of each `single-arg(...)` back into declaration values
pub fn unwrap_single_args(fragment: &mut [Node], single_args: &[SingleArg]) {
    if single_args.is_empty() {
        return;
    }
    walk_decls_mut(fragment, &mut |decl| {
        for single in single_args {
            if decl.value.contains(&single.token) {
                decl.value = decl.value.replace(&single.token, &single.content);
            }
        }
    });
}
