//! Data-object mixins to tree nodes
//!
//! A data object is a JSON mapping shaped like a stylesheet:
//!
//! ```json
//! { "@media screen": { "b": { "fontSize": 12, "color": "red !important" } } }
//! ```
//!
//! Keys starting with `@` become at-rules, object values become blocks and
//! everything else becomes a declaration.

use crate::ast::{AtRule, Decl, Node, Rule};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

static IMPORTANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*!\s*important\s*$").expect("important pattern is valid"));

/// Properties whose numeric values get no `px` suffix
const UNITLESS: &[&str] = &[
    "box-flex",
    "box-flex-group",
    "column-count",
    "flex",
    "flex-grow",
    "flex-positive",
    "flex-shrink",
    "flex-negative",
    "font-weight",
    "line-clamp",
    "line-height",
    "opacity",
    "order",
    "orphans",
    "tab-size",
    "widows",
    "z-index",
    "zoom",
    "fill-opacity",
    "stroke-dashoffset",
    "stroke-opacity",
    "stroke-width",
];

/// Convert a data object into nodes with no raws
pub fn object_to_nodes(object: &Map<String, Value>) -> Vec<Node> {
    let mut nodes = Vec::new();
    append_object(&mut nodes, object);
    nodes
}

fn append_object(nodes: &mut Vec<Node>, object: &Map<String, Value>) {
    for (key, value) in object {
        if value.is_null() {
            continue;
        }
        if let Some(at) = key.strip_prefix('@') {
            let (name, params) = split_at_key(at);
            match value {
                Value::Array(items) => {
                    for item in items {
                        nodes.push(at_rule(name, params, item));
                    }
                }
                other => nodes.push(at_rule(name, params, other)),
            }
            continue;
        }

        match value {
            Value::Array(items) => {
                for item in items {
                    append_decl(nodes, key, item);
                }
            }
            Value::Object(children) => {
                let mut rule = Rule::new(key.as_str());
                append_object(&mut rule.nodes, children);
                nodes.push(rule.into());
            }
            other => append_decl(nodes, key, other),
        }
    }
}

/// `@media screen` -> (`media`, `screen`)
fn split_at_key(key: &str) -> (&str, &str) {
    match key.find(char::is_whitespace) {
        Some(end) => (&key[..end], key[end..].trim()),
        None => (key, ""),
    }
}

fn at_rule(name: &str, params: &str, value: &Value) -> Node {
    let mut rule = AtRule::new(name, params);
    if let Value::Object(children) = value {
        let mut nodes = Vec::new();
        append_object(&mut nodes, children);
        rule.nodes = Some(nodes);
    }
    rule.into()
}

fn append_decl(nodes: &mut Vec<Node>, key: &str, value: &Value) {
    let prop = if key.starts_with("--") {
        key.to_string()
    } else {
        match dashify(key).as_str() {
            "css-float" => "float".to_string(),
            other => other.to_string(),
        }
    };

    let value = match value {
        Value::Null | Value::Bool(false) => return,
        Value::String(text) => text.clone(),
        Value::Number(number) => {
            let is_zero = number.as_f64().map_or(false, |n| n == 0.0);
            let text = number_text(number);
            if is_zero || UNITLESS.contains(&prop.as_str()) {
                text
            } else {
                format!("{}px", text)
            }
        }
        other => other.to_string(),
    };

    let mut decl = Decl::new(prop, value);
    if IMPORTANT_RE.is_match(&decl.value) {
        decl.value = IMPORTANT_RE.replace(&decl.value, "").into_owned();
        decl.important = true;
    }
    nodes.push(decl.into());
}

/// Integral floats print without a fraction: `10.0` is `10`
fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(n) if number.is_f64() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        _ => number.to_string(),
    }
}

/// `fontSize` -> `font-size`, `msTransform` -> `-ms-transform`
pub fn dashify(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
        }
        out.push(c.to_ascii_lowercase());
    }
    if out.starts_with("ms-") {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stringify::stringify_nodes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn convert(value: Value) -> Vec<Node> {
        match value {
            Value::Object(map) => object_to_nodes(&map),
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_dashify() {
        assert_eq!(dashify("fontSize"), "font-size");
        assert_eq!(dashify("msTransition"), "-ms-transition");
        assert_eq!(dashify("color"), "color");
    }

    #[test]
    fn test_nested_at_rule_and_rule() {
        let nodes = convert(json!({ "@media screen": { "b": { "one": "1" } } }));
        assert_eq!(
            stringify_nodes(&nodes),
            "@media screen {\n    b {\n        one: 1\n    }\n}"
        );
    }

    #[test]
    fn test_numbers() {
        let nodes = convert(json!({ "width": 10, "height": 0, "zIndex": 2, "lineHeight": 1.5 }));
        let values: Vec<_> = nodes
            .iter()
            .map(|n| match n {
                Node::Decl(d) => format!("{}={}", d.prop, d.value),
                _ => String::new(),
            })
            .collect();
        assert_eq!(values, vec!["width=10px", "height=0", "z-index=2", "line-height=1.5"]);
    }

    #[test]
    fn test_integral_floats() {
        let nodes = convert(json!({ "width": 10.0, "height": 0.0, "top": 2.5 }));
        assert_eq!(stringify_nodes(&nodes), stringify_nodes(&convert(json!({ "width": "10px", "height": "0", "top": "2.5px" }))));
    }

    #[test]
    fn test_skipped_and_repeated_values() {
        let nodes = convert(json!({
            "a": null,
            "b": false,
            "display": ["-webkit-box", "flex"],
            "--customProp": "x",
            "cssFloat": "left"
        }));
        let props: Vec<_> = nodes
            .iter()
            .map(|n| match n {
                Node::Decl(d) => d.prop.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(props, vec!["display", "display", "--customProp", "float"]);
    }

    #[test]
    fn test_important() {
        let nodes = convert(json!({ "color": "red !important" }));
        let Node::Decl(decl) = &nodes[0] else {
            panic!("expected decl");
        };
        assert_eq!(decl.value, "red");
        assert!(decl.important);
    }

    #[test]
    fn test_at_rule_shapes() {
        let nodes = convert(json!({ "@mixin-content": {}, "@import": true, "@mixin a 1": {} }));
        let Node::AtRule(content) = &nodes[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(content.name, "mixin-content");
        assert_eq!(content.nodes, Some(vec![]));

        let Node::AtRule(import) = &nodes[1] else {
            panic!("expected at-rule");
        };
        assert_eq!(import.nodes, None);

        let Node::AtRule(call) = &nodes[2] else {
            panic!("expected at-rule");
        };
        assert_eq!((call.name.as_str(), call.params.as_str()), ("mixin", "a 1"));
    }
}
