//! Tree to text
//!
//! Nodes that carry their parsed [`Raws`](crate::ast::Raws) print exactly as they
//! were read. Nodes built by the mixin engine have no raws, so their formatting is
//! inferred from the first node in the document that does have the raw in
//! question, falling back to fixed defaults.
//!
//! ```text
//!   node.raws.X set? ── yes ──▶ use it
//!         │ no
//!         ▼
//!   first child of root, asking for `before`? ── yes ──▶ ""
//!         │ no
//!         ▼
//!   scan the document (pre-order) for a sample ── found ──▶ normalize, cache
//!         │ none
//!         ▼
//!   default
//! ```

use crate::ast::{AtRule, Comment, Decl, Node, Root, Rule};
use std::collections::HashMap;

/// Raw kinds that are inferred from the rest of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Detect {
    BeforeDecl,
    BeforeComment,
    BeforeRule,
    BeforeClose,
    BeforeOpen,
    Colon,
    EmptyBody,
    Indent,
    CommentLeft,
    CommentRight,
}

impl Detect {
    fn default_value(self) -> &'static str {
        match self {
            Detect::BeforeDecl | Detect::BeforeComment | Detect::BeforeRule | Detect::BeforeClose => "\n",
            Detect::BeforeOpen => " ",
            Detect::Colon => ": ",
            Detect::EmptyBody => "",
            Detect::Indent => "    ",
            Detect::CommentLeft | Detect::CommentRight => " ",
        }
    }
}

/// Print a whole stylesheet
pub fn stringify(root: &Root) -> String {
    Stringifier::new(root).finish()
}

/// Print a node list as if it were a stylesheet of its own
pub fn stringify_nodes(nodes: &[Node]) -> String {
    stringify(&Root::with_nodes(nodes.to_vec()))
}

/// Stringifier with a per-document cache of inferred raws
pub struct Stringifier<'a> {
    root: &'a Root,
    cache: HashMap<Detect, String>,
    semicolon: Option<bool>,
    out: String,
}

impl<'a> Stringifier<'a> {
    pub fn new(root: &'a Root) -> Self {
        Self {
            root,
            cache: HashMap::new(),
            semicolon: None,
            out: String::new(),
        }
    }

    /// Consume the printer, returning the text
    pub fn finish(mut self) -> String {
        self.root();
        self.out
    }

    fn root(&mut self) {
        let root = self.root;
        self.body(&root.nodes, Some(root.raws.semicolon.unwrap_or(false)), 0, true);
        if let Some(after) = &root.raws.after {
            self.out.push_str(after);
        }
    }

    // ============ Printing ============

    /// Print children. `depth` is the depth of the children themselves, with
    /// the root's children at 0.
    fn body(&mut self, nodes: &[Node], semicolon: Option<bool>, depth: usize, in_root: bool) {
        let mut last = nodes.len().saturating_sub(1);
        while last > 0 && matches!(nodes[last], Node::Comment(_)) {
            last -= 1;
        }
        let semicolon = match semicolon {
            Some(semicolon) => semicolon,
            None => self.raw_semicolon(),
        };

        for (index, child) in nodes.iter().enumerate() {
            let before = self.raw_before(child, depth, in_root && index == 0);
            self.out.push_str(&before);
            self.node(child, depth, last != index || semicolon);
        }
    }

    fn node(&mut self, node: &Node, depth: usize, semicolon: bool) {
        match node {
            Node::Rule(rule) => self.rule(node, rule, depth),
            Node::AtRule(rule) => self.at_rule(node, rule, depth, semicolon),
            Node::Decl(decl) => self.decl(decl, semicolon),
            Node::Comment(comment) => self.comment(comment),
        }
    }

    fn rule(&mut self, node: &Node, rule: &Rule, depth: usize) {
        self.block(node, &rule.selector, &rule.nodes, depth);
        if let Some(own) = &rule.raws.own_semicolon {
            self.out.push_str(own);
        }
    }

    fn at_rule(&mut self, node: &Node, rule: &AtRule, depth: usize, semicolon: bool) {
        let mut start = format!("@{}", rule.name);
        match &rule.raws.after_name {
            Some(after_name) => start.push_str(after_name),
            None if !rule.params.is_empty() => start.push(' '),
            None => {}
        }
        start.push_str(&rule.params);

        match &rule.nodes {
            Some(children) => self.block(node, &start, children, depth),
            None => {
                self.out.push_str(&start);
                self.out.push_str(rule.raws.between.as_deref().unwrap_or(""));
                if semicolon {
                    self.out.push(';');
                }
            }
        }
    }

    fn block(&mut self, node: &Node, start: &str, children: &[Node], depth: usize) {
        let raws = node.raws();
        let between = match &raws.between {
            Some(between) => between.clone(),
            None => self.detect(Detect::BeforeOpen),
        };
        self.out.push_str(start);
        self.out.push_str(&between);
        self.out.push('{');

        let after = if children.is_empty() {
            match &raws.after {
                Some(after) => after.clone(),
                None => self.detect(Detect::EmptyBody),
            }
        } else {
            self.body(children, raws.semicolon, depth + 1, false);
            match &raws.after {
                Some(after) => after.clone(),
                None => self.before_after(node, depth, false),
            }
        };
        self.out.push_str(&after);
        self.out.push('}');
    }

    fn decl(&mut self, decl: &Decl, semicolon: bool) {
        let between = match &decl.raws.between {
            Some(between) => between.clone(),
            None => self.detect(Detect::Colon),
        };
        self.out.push_str(&decl.prop);
        self.out.push_str(&between);
        self.out.push_str(&decl.value);
        if decl.important {
            self.out
                .push_str(decl.raws.important.as_deref().unwrap_or(" !important"));
        }
        if let Some(after) = &decl.raws.after {
            self.out.push_str(after);
        }
        if semicolon {
            self.out.push(';');
        }
    }

    fn comment(&mut self, comment: &Comment) {
        let left = match &comment.raws.left {
            Some(left) => left.clone(),
            None => self.detect(Detect::CommentLeft),
        };
        let right = match &comment.raws.right {
            Some(right) => right.clone(),
            None => self.detect(Detect::CommentRight),
        };
        self.out.push_str("/*");
        self.out.push_str(&left);
        self.out.push_str(&comment.text);
        self.out.push_str(&right);
        self.out.push_str("*/");
    }

    // ============ Inference ============

    fn raw_before(&mut self, node: &Node, depth: usize, first_in_root: bool) -> String {
        if let Some(before) = &node.raws().before {
            return before.clone();
        }
        if first_in_root {
            return String::new();
        }
        self.before_after(node, depth, true)
    }

    /// Leading whitespace (`before`) or the whitespace before `}` (`after`),
    /// indented to the node's depth when it spans lines
    fn before_after(&mut self, node: &Node, depth: usize, before: bool) -> String {
        let detect = match node {
            Node::Decl(_) => Detect::BeforeDecl,
            Node::Comment(_) => Detect::BeforeComment,
            _ if before => Detect::BeforeRule,
            _ => Detect::BeforeClose,
        };
        let mut value = self.detect(detect);
        if value.contains('\n') {
            let indent = self.detect(Detect::Indent);
            for _ in 0..depth {
                value.push_str(&indent);
            }
        }
        value
    }

    fn detect(&mut self, detect: Detect) -> String {
        if let Some(value) = self.cache.get(&detect) {
            return value.clone();
        }
        let value = self
            .infer(detect)
            .unwrap_or_else(|| detect.default_value().to_string());
        self.cache.insert(detect, value.clone());
        value
    }

    fn infer(&mut self, detect: Detect) -> Option<String> {
        let root: &'a Root = self.root;
        let nodes = &root.nodes;
        match detect {
            Detect::BeforeDecl => match find(nodes, &mut |node, _, _| match node {
                Node::Decl(decl) => decl.raws.before.clone(),
                _ => None,
            }) {
                Some(before) => Some(strip_non_space(&trim_last_line(&before))),
                None => Some(self.detect(Detect::BeforeRule)),
            },
            Detect::BeforeComment => match find(nodes, &mut |node, _, _| match node {
                Node::Comment(comment) => comment.raws.before.clone(),
                _ => None,
            }) {
                Some(before) => Some(strip_non_space(&trim_last_line(&before))),
                None => Some(self.detect(Detect::BeforeDecl)),
            },
            Detect::BeforeRule => find(nodes, &mut |node, depth, index| {
                if node.children().is_some() && !(depth == 0 && index == 0) {
                    node.raws().before.as_deref().map(trim_last_line)
                } else {
                    None
                }
            })
            .map(|value| strip_non_space(&value)),
            Detect::BeforeClose => find(nodes, &mut |node, _, _| match node.children() {
                Some(children) if !children.is_empty() => {
                    node.raws().after.as_deref().map(trim_last_line)
                }
                _ => None,
            })
            .map(|value| strip_non_space(&value)),
            Detect::BeforeOpen => find(nodes, &mut |node, _, _| match node {
                Node::Decl(_) => None,
                other => other.raws().between.clone(),
            }),
            Detect::Colon => find(nodes, &mut |node, _, _| match node {
                Node::Decl(decl) => decl
                    .raws
                    .between
                    .as_ref()
                    .map(|between| between.chars().filter(|c| c.is_whitespace() || *c == ':').collect()),
                _ => None,
            }),
            Detect::EmptyBody => find(nodes, &mut |node, _, _| match node.children() {
                Some(children) if children.is_empty() => node.raws().after.clone(),
                _ => None,
            }),
            Detect::Indent => find(nodes, &mut |node, depth, _| {
                if depth != 1 {
                    return None;
                }
                node.raws().before.as_ref().map(|before| {
                    let last_line = before.rsplit('\n').next().unwrap_or("");
                    strip_non_space(last_line)
                })
            }),
            Detect::CommentLeft => find(nodes, &mut |node, _, _| match node {
                Node::Comment(comment) => comment.raws.left.clone(),
                _ => None,
            }),
            Detect::CommentRight => find(nodes, &mut |node, _, _| match node {
                Node::Comment(comment) => comment.raws.right.clone(),
                _ => None,
            }),
        }
    }

    /// Whether the last declaration of a block gets a `;`, taken from the first
    /// block that ends in a declaration and recorded it
    fn raw_semicolon(&mut self) -> bool {
        if let Some(semicolon) = self.semicolon {
            return semicolon;
        }
        let value = find(&self.root.nodes, &mut |node, _, _| match node.children() {
            Some(children) if matches!(children.last(), Some(Node::Decl(_))) => node.raws().semicolon,
            _ => None,
        })
        .unwrap_or(false);
        self.semicolon = Some(value);
        value
    }
}

/// Pre-order search passing each node with its depth (root children at 0) and
/// its index among its siblings
fn find<T>(nodes: &[Node], visit: &mut impl FnMut(&Node, usize, usize) -> Option<T>) -> Option<T> {
    fn go<T>(
        nodes: &[Node],
        depth: usize,
        visit: &mut impl FnMut(&Node, usize, usize) -> Option<T>,
    ) -> Option<T> {
        for (index, node) in nodes.iter().enumerate() {
            if let Some(found) = visit(node, depth, index) {
                return Some(found);
            }
            if let Some(children) = node.children() {
                if let Some(found) = go(children, depth + 1, visit) {
                    return Some(found);
                }
            }
        }
        None
    }
    go(nodes, 0, visit)
}

/// Drop whatever follows the last newline
fn trim_last_line(value: &str) -> String {
    match value.rfind('\n') {
        Some(newline) => value[..=newline].to_string(),
        None => value.to_string(),
    }
}

fn strip_non_space(value: &str) -> String {
    value.chars().filter(|c| c.is_whitespace()).collect()
}
