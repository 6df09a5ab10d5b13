//! Parameter parsing for definitions and calls

use super::error::MixinErrorKind;

/// Prefix of an argument whose commas must not split it
pub const SINGLE_ARG: &str = "single-arg";

/// A declared template parameter: `$name` or `$name: default`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub default: Option<String>,
}

/// A `single-arg(...)` argument: the text as written and what it unwraps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleArg {
    pub token: String,
    pub content: String,
}

/// A parsed `@mixin` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
    pub single_args: Vec<SingleArg>,
}

/// Split on top-level commas. Commas inside parentheses or quotes and escaped
/// characters do not split. Items are trimmed; the trailing item is always
/// kept, even when empty.
pub fn list_comma(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escape = false;

    for c in text.chars() {
        let mut split = false;
        if escape {
            escape = false;
        } else if c == '\\' {
            escape = true;
        } else if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == '(' {
            depth += 1;
        } else if c == ')' {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && c == ',' {
            split = true;
        }

        if split {
            if !current.is_empty() {
                items.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }

    items.push(current.trim().to_string());
    items
}

/// First whitespace-delimited word and the trimmed rest
fn split_name(params: &str) -> (&str, &str) {
    let end = params.find(char::is_whitespace).unwrap_or(params.len());
    (&params[..end], params[end..].trim())
}

/// Parse the params of a `@mixin` call.
///
/// `single-arg` arguments are validated and recorded so the caller can unwrap
/// them once the template is instantiated.
pub fn parse_invocation_params(params: &str) -> Result<Invocation, MixinErrorKind> {
    let (name, rest) = split_name(params);
    if name.contains('(') {
        return Err(MixinErrorKind::IllegalInvocationSyntax {
            name: name.to_string(),
        });
    }

    let args = if rest.is_empty() {
        Vec::new()
    } else {
        list_comma(rest)
    };

    let mut single_args = Vec::new();
    for arg in &args {
        if let Some(remainder) = arg.strip_prefix(SINGLE_ARG) {
            let content = unwrap_brackets(remainder.trim()).ok_or_else(|| {
                MixinErrorKind::MalformedSingleArg { text: arg.clone() }
            })?;
            single_args.push(SingleArg {
                token: arg.clone(),
                content: content.to_string(),
            });
        }
    }

    Ok(Invocation {
        name: name.to_string(),
        args,
        single_args,
    })
}

/// `(inner)` -> `inner`, only when the outer parentheses match each other
fn unwrap_brackets(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

/// Parse a `@define-mixin` header into the name and its parameters
pub fn parse_definition_header(params: &str) -> (String, Vec<Param>) {
    let (name, rest) = split_name(params);
    if rest.is_empty() {
        return (name.to_string(), Vec::new());
    }

    let params = list_comma(rest)
        .into_iter()
        .filter_map(|item| {
            let (var, default) = match item.split_once(':') {
                Some((var, default)) => (var, Some(default.trim())),
                None => (item.as_str(), None),
            };
            let name = var.trim().trim_start_matches('$').trim();
            if name.is_empty() {
                return None;
            }
            Some(Param {
                name: name.to_string(),
                default: default.filter(|d| !d.is_empty()).map(str::to_string),
            })
        })
        .collect();

    (name.to_string(), params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_comma() {
        assert_eq!(list_comma("1, 2"), vec!["1", "2"]);
        assert_eq!(list_comma("a(1, 2), 3"), vec!["a(1, 2)", "3"]);
        assert_eq!(list_comma("'a,b', \"c,d\""), vec!["'a,b'", "\"c,d\""]);
        assert_eq!(list_comma("a\\,b"), vec!["a\\,b"]);
        assert_eq!(list_comma("1,"), vec!["1", ""]);
    }

    #[test]
    fn test_invocation_without_args() {
        let call = parse_invocation_params("test").unwrap();
        assert_eq!(call.name, "test");
        assert!(call.args.is_empty());
    }

    #[test]
    fn test_invocation_args() {
        let call = parse_invocation_params("m 1, 2").unwrap();
        assert_eq!(call.name, "m");
        assert_eq!(call.args, vec!["1", "2"]);
    }

    #[test]
    fn test_brackets_in_name() {
        let err = parse_invocation_params("a($p)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Remove brackets from mixin. Like: @mixin name(1px) → @mixin name 1px"
        );
    }

    #[test]
    fn test_single_arg() {
        let call = parse_invocation_params("a single-arg(1, 2), 3").unwrap();
        assert_eq!(call.args, vec!["single-arg(1, 2)", "3"]);
        assert_eq!(
            call.single_args,
            vec![SingleArg {
                token: "single-arg(1, 2)".to_string(),
                content: "1, 2".to_string(),
            }]
        );
    }

    #[test]
    fn test_single_arg_whitespace_and_nesting() {
        let call = parse_invocation_params("a single-arg   (1, (2), 3)   , 3").unwrap();
        assert_eq!(call.single_args[0].token, "single-arg   (1, (2), 3)");
        assert_eq!(call.single_args[0].content, "1, (2), 3");
    }

    #[test]
    fn test_malformed_single_arg() {
        let err = parse_invocation_params("a single-arg 1, 2)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Content of single-arg must be wrapped in brackets: single-arg 1"
        );

        let err = parse_invocation_params("a single-arg(1, 2;").unwrap_err();
        assert_eq!(
            err,
            MixinErrorKind::MalformedSingleArg {
                text: "single-arg(1, 2;".to_string()
            }
        );
    }

    #[test]
    fn test_definition_header() {
        let (name, params) = parse_definition_header("m $a, $b: b, $c: 1px solid");
        assert_eq!(name, "m");
        assert_eq!(
            params,
            vec![
                Param { name: "a".into(), default: None },
                Param { name: "b".into(), default: Some("b".into()) },
                Param { name: "c".into(), default: Some("1px solid".into()) },
            ]
        );
    }

    #[test]
    fn test_definition_header_without_params() {
        assert_eq!(parse_definition_header("black"), ("black".to_string(), vec![]));
    }
}
