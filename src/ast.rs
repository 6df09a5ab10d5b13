//! Stylesheet tree
//!
//! The tree represents a stylesheet after parsing. Every node keeps the formatting
//! it was parsed with in [`Raws`], so untouched input round-trips exactly. Nodes the
//! mixin engine creates have empty raws, and the stringifier infers their
//! formatting from the rest of the document.

use crate::span::SourceLocation;
use std::path::PathBuf;
use std::sync::Arc;

/// Formatting hints recorded by the parser.
///
/// `None` means "not recorded": the stringifier falls back to inference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Raws {
    /// Whitespace (and stray semicolons) before the node
    pub before: Option<String>,
    /// Between prop and value (`: `), or between selector/params and `{`
    pub between: Option<String>,
    /// Before the closing `}` of a block
    pub after: Option<String>,
    /// Between an at-rule's name and its params
    pub after_name: Option<String>,
    /// Whether the last child of a block ends with `;`
    pub semicolon: Option<bool>,
    /// A `;` written directly after a rule's closing brace
    pub own_semicolon: Option<String>,
    /// Comment padding after `/*`
    pub left: Option<String>,
    /// Comment padding before `*/`
    pub right: Option<String>,
    /// The exact `!important` text of a declaration
    pub important: Option<String>,
}

/// A parsed stylesheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Root {
    pub nodes: Vec<Node>,
    pub raws: Raws,
    /// The file the stylesheet was read from
    pub file: Option<Arc<PathBuf>>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }
}

/// A node in the stylesheet tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Style rule: `a, b { ... }`
    Rule(Rule),

    /// At-rule: `@media screen { ... }` or `@mixin name args;`
    AtRule(AtRule),

    /// Declaration: `color: black`
    Decl(Decl),

    /// Comment: `/* text */`
    Comment(Comment),
}

/// Style rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub selector: String,
    pub nodes: Vec<Node>,
    pub raws: Raws,
    pub source: Option<SourceLocation>,
}

impl Rule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Self::default()
        }
    }

    pub fn with_nodes(selector: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            selector: selector.into(),
            nodes,
            ..Self::default()
        }
    }
}

/// At-rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtRule {
    /// Name without the `@`
    pub name: String,
    /// Raw parameter text
    pub params: String,
    /// `None` for body-less at-rules (`@mixin a;`)
    pub nodes: Option<Vec<Node>>,
    pub raws: Raws,
    pub source: Option<SourceLocation>,
}

impl AtRule {
    pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
            ..Self::default()
        }
    }

    pub fn with_nodes(name: impl Into<String>, params: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
            nodes: Some(nodes),
            ..Self::default()
        }
    }

    /// Children of the block, empty for body-less at-rules
    pub fn children(&self) -> &[Node] {
        self.nodes.as_deref().unwrap_or(&[])
    }
}

/// Declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decl {
    pub prop: String,
    pub value: String,
    pub important: bool,
    pub raws: Raws,
    pub source: Option<SourceLocation>,
}

impl Decl {
    pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Comment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub text: String,
    pub raws: Raws,
    pub source: Option<SourceLocation>,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl From<Rule> for Node {
    fn from(rule: Rule) -> Self {
        Node::Rule(rule)
    }
}

impl From<AtRule> for Node {
    fn from(rule: AtRule) -> Self {
        Node::AtRule(rule)
    }
}

impl From<Decl> for Node {
    fn from(decl: Decl) -> Self {
        Node::Decl(decl)
    }
}

impl From<Comment> for Node {
    fn from(comment: Comment) -> Self {
        Node::Comment(comment)
    }
}

impl Node {
    pub fn raws(&self) -> &Raws {
        match self {
            Node::Rule(n) => &n.raws,
            Node::AtRule(n) => &n.raws,
            Node::Decl(n) => &n.raws,
            Node::Comment(n) => &n.raws,
        }
    }

    pub fn raws_mut(&mut self) -> &mut Raws {
        match self {
            Node::Rule(n) => &mut n.raws,
            Node::AtRule(n) => &mut n.raws,
            Node::Decl(n) => &mut n.raws,
            Node::Comment(n) => &mut n.raws,
        }
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        match self {
            Node::Rule(n) => n.source.as_ref(),
            Node::AtRule(n) => n.source.as_ref(),
            Node::Decl(n) => n.source.as_ref(),
            Node::Comment(n) => n.source.as_ref(),
        }
    }

    pub fn set_source(&mut self, source: Option<SourceLocation>) {
        match self {
            Node::Rule(n) => n.source = source,
            Node::AtRule(n) => n.source = source,
            Node::Decl(n) => n.source = source,
            Node::Comment(n) => n.source = source,
        }
    }

    /// Child nodes, `None` for declarations, comments and body-less at-rules
    pub fn children(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Rule(n) => Some(&n.nodes),
            Node::AtRule(n) => n.nodes.as_ref(),
            Node::Decl(_) | Node::Comment(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Rule(n) => Some(&mut n.nodes),
            Node::AtRule(n) => n.nodes.as_mut(),
            Node::Decl(_) | Node::Comment(_) => None,
        }
    }

    /// Short type name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Rule(_) => "rule",
            Node::AtRule(_) => "atrule",
            Node::Decl(_) => "decl",
            Node::Comment(_) => "comment",
        }
    }

    pub fn is_at_rule(&self, name: &str) -> bool {
        matches!(self, Node::AtRule(rule) if rule.name == name)
    }

    /// Deep clone without the leading whitespace, so the copy picks up the
    /// formatting of wherever it is inserted.
    pub fn clone_detached(&self) -> Node {
        let mut node = self.clone();
        node.raws_mut().before = None;
        node
    }
}

// ============ Traversal ============

/// Control flow for [`walk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    Stop,
}

/// Visit every node depth first, pre-order. Returns `Walk::Stop` if the visitor stopped.
pub fn walk(nodes: &[Node], visit: &mut impl FnMut(&Node) -> Walk) -> Walk {
    for node in nodes {
        if visit(node) == Walk::Stop {
            return Walk::Stop;
        }
        if let Some(children) = node.children() {
            if walk(children, visit) == Walk::Stop {
                return Walk::Stop;
            }
        }
    }
    Walk::Continue
}

/// Visit every declaration mutably, depth first
pub fn walk_decls_mut(nodes: &mut [Node], visit: &mut impl FnMut(&mut Decl)) {
    for node in nodes {
        match node {
            Node::Decl(decl) => visit(decl),
            other => {
                if let Some(children) = other.children_mut() {
                    walk_decls_mut(children, visit);
                }
            }
        }
    }
}

/// Visit every node mutably, depth first, pre-order
pub fn walk_mut(nodes: &mut [Node], visit: &mut impl FnMut(&mut Node)) {
    for node in nodes {
        visit(node);
        if let Some(children) = node.children_mut() {
            walk_mut(children, visit);
        }
    }
}

/// Whether an at-rule with this name appears anywhere below `nodes`
pub fn contains_at_rule(nodes: &[Node], name: &str) -> bool {
    walk(nodes, &mut |node| {
        if node.is_at_rule(name) {
            Walk::Stop
        } else {
            Walk::Continue
        }
    }) == Walk::Stop
}

// ============ Container edits ============

/// Insert `fragment` before `nodes[index]`, normalizing leading whitespace.
///
/// Outside a root, inserted nodes without their own `before` take the
/// whitespace of the node they are inserted before. In a root, inserting before
/// the first node keeps the fragment's own whitespace (the first node of a
/// document prints nothing before it), and inserting anywhere else gives every
/// inserted node the sibling's `before`.
pub fn insert_before(nodes: &mut Vec<Node>, index: usize, mut fragment: Vec<Node>, in_root: bool) {
    if let Some(sample) = nodes.get(index) {
        let sample_before = sample.raws().before.clone();
        if in_root {
            if index == 0 {
                let next_before = nodes.get(1).and_then(|n| n.raws().before.clone());
                nodes[0].raws_mut().before = next_before;
            } else {
                for node in &mut fragment {
                    node.raws_mut().before = sample_before.clone();
                }
            }
        } else if let Some(before) = sample_before {
            let spaces: String = before.chars().filter(|c| c.is_whitespace()).collect();
            for node in &mut fragment {
                let raws = node.raws_mut();
                if raws.before.is_none() {
                    raws.before = Some(spaces.clone());
                }
            }
        }
    }

    let tail = nodes.split_off(index);
    nodes.extend(fragment);
    nodes.extend(tail);
}

/// Remove `nodes[index]`. In a root, removing the first node hands its
/// leading whitespace to the node that becomes first.
pub fn remove_child(nodes: &mut Vec<Node>, index: usize, in_root: bool) -> Node {
    if in_root && index == 0 && nodes.len() > 1 {
        let before = nodes[0].raws().before.clone();
        nodes[1].raws_mut().before = before;
    }
    nodes.remove(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_before(node: impl Into<Node>, before: &str) -> Node {
        let mut node = node.into();
        node.raws_mut().before = Some(before.to_string());
        node
    }

    #[test]
    fn test_contains_at_rule_nested() {
        let nodes = vec![Node::from(Rule::with_nodes(
            "a",
            vec![Node::from(AtRule::with_nodes(
                "media",
                "screen",
                vec![AtRule::new("mixin-content", "").into()],
            ))],
        ))];
        assert!(contains_at_rule(&nodes, "mixin-content"));
        assert!(!contains_at_rule(&nodes, "mixin"));
    }

    #[test]
    fn test_clone_detached_strips_before() {
        let node = with_before(Decl::new("a", "1"), "\n  ");
        let copy = node.clone_detached();
        assert_eq!(copy.raws().before, None);
        assert_eq!(node.raws().before.as_deref(), Some("\n  "));
    }

    #[test]
    fn test_insert_before_inherits_whitespace() {
        let mut nodes = vec![with_before(AtRule::new("mixin", "a"), " ; ")];
        insert_before(&mut nodes, 0, vec![Decl::new("a", "1").into()], false);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].raws().before.as_deref(), Some("  "));
    }

    #[test]
    fn test_insert_before_keeps_own_whitespace() {
        let mut nodes = vec![with_before(AtRule::new("mixin", "a"), " ")];
        let fragment = vec![with_before(Decl::new("b", "2"), "\n")];
        insert_before(&mut nodes, 0, fragment, false);
        assert_eq!(nodes[0].raws().before.as_deref(), Some("\n"));
    }

    #[test]
    fn test_root_prepend_leaves_fragment_bare() {
        let mut nodes = vec![with_before(AtRule::new("mixin", "a"), "")];
        insert_before(&mut nodes, 0, vec![Decl::new("a", "1").into()], true);
        assert_eq!(nodes[0].raws().before, None);
    }

    #[test]
    fn test_root_insert_copies_sibling_whitespace() {
        let mut nodes = vec![
            Node::from(Rule::new("a")),
            with_before(AtRule::new("mixin", "a"), "\n\n"),
        ];
        insert_before(&mut nodes, 1, vec![with_before(Decl::new("a", "1"), " ")], true);
        assert_eq!(nodes[1].raws().before.as_deref(), Some("\n\n"));
    }

    #[test]
    fn test_root_remove_first_hands_over_whitespace() {
        let mut nodes = vec![
            with_before(AtRule::new("define-mixin", "a"), ""),
            with_before(AtRule::new("mixin", "a"), " "),
        ];
        remove_child(&mut nodes, 0, true);
        assert_eq!(nodes[0].raws().before.as_deref(), Some(""));
    }
}
