//! Scoped variable substitution
//!
//! Rewrites `$name` and `$(name)` references in a fragment, but only for names
//! the scope knows about. Anything else that looks like a variable is left as
//! written, so a template's own parameters never touch variables that belong to
//! an outer stylesheet or to a nested mixin.

use crate::ast::{walk_mut, Node};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// `$name` or `$( name )`, not preceded by a word character or another `$`
static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w$])\$(?:\(\s*([\w-]+)\s*\)|([\w-]+))").expect("variable pattern is valid")
});

/// Names and the text they stand for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    values: HashMap<String, String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Scope {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut scope = Scope::new();
        for (name, value) in iter {
            scope.insert(name, value);
        }
        scope
    }
}

/// Replace known variables in `text`. Returns `None` when nothing changed.
pub fn replace_in(text: &str, scope: &Scope) -> Option<String> {
    if !text.contains('$') {
        return None;
    }
    let mut changed = false;
    let replaced = VARIABLE_RE.replace_all(text, |caps: &Captures| {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        match scope.get(name) {
            Some(value) => {
                changed = true;
                format!("{}{}", prefix, value)
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| replaced.into_owned())
}

/// Substitute scoped variables in declaration props and values, rule selectors
/// and at-rule params throughout `nodes`
pub fn substitute(nodes: &mut [Node], scope: &Scope) {
    if scope.is_empty() {
        return;
    }
    walk_mut(nodes, &mut |node| match node {
        Node::Decl(decl) => {
            if let Some(prop) = replace_in(&decl.prop, scope) {
                decl.prop = prop;
            }
            if let Some(value) = replace_in(&decl.value, scope) {
                tracing::trace!(prop = %decl.prop, from = %decl.value, to = %value, "substituted");
                decl.value = value;
                // Spacing recorded after the old value no longer applies
                decl.raws.after = None;
            }
        }
        Node::Rule(rule) => {
            if let Some(selector) = replace_in(&rule.selector, scope) {
                rule.selector = selector;
            }
        }
        Node::AtRule(rule) => {
            if let Some(params) = replace_in(&rule.params, scope) {
                rule.params = params;
            }
        }
        Node::Comment(_) => {}
    });
}
