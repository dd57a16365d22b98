//! Helpers over single expressions: array literals, argument lists, string
//! literals and operator precedence.

use crate::tree::{self, render, significant, Grammar};
use tree_sitter::Node;

/// One item of an array literal. Integer and implicit keys are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayItem {
    pub key: Option<String>,
    pub value: String,
}

/// Parse `text;` and hand the statement's expression to `f`.
fn with_expression<T>(text: &str, f: impl FnOnce(Node<'_>, &str) -> Option<T>) -> Option<T> {
    let source = format!("{text};");
    let tree = tree::parse_tree(&source, Grammar::Code).ok()?;
    let statement = match significant(tree.root_node()).as_slice() {
        [statement] if statement.kind() == "expression_statement" => *statement,
        _ => return None,
    };
    let expr = match significant(statement).as_slice() {
        [expr] => *expr,
        _ => return None,
    };
    f(expr, &source)
}

/// Parse `[...]` or `array(...)` into items with printed values.
///
/// Returns `None` when the text is not exactly one array literal or a key is
/// neither a string nor an integer literal.
pub fn parse_array_literal(text: &str) -> Option<Vec<ArrayItem>> {
    with_expression(text, |expr, source| {
        if expr.kind() != "array_creation_expression" {
            return None;
        }
        let mut items = Vec::new();
        for element in significant(expr) {
            let children = tree::children(element);
            let arrow = children.iter().position(|c| c.kind() == "=>");
            let item = match arrow {
                Some(arrow) => {
                    let keys: Vec<Node<'_>> = children[..arrow]
                        .iter()
                        .copied()
                        .filter(|c| c.kind() != "comment")
                        .collect();
                    let key = match keys.as_slice() {
                        [single] if is_string(single.kind()) => {
                            Some(string_value(tree::text(*single, source))?)
                        }
                        [single] if single.kind() == "integer" => None,
                        _ => return None,
                    };
                    ArrayItem {
                        key,
                        value: tree::render_nodes(children[arrow + 1..].iter().copied(), source),
                    }
                }
                None => ArrayItem {
                    key: None,
                    value: render(element, source),
                },
            };
            items.push(item);
        }
        Some(items)
    })
}

/// Split a call's argument list (without parentheses) at top-level commas.
pub fn split_arguments(text: &str) -> Option<Vec<String>> {
    with_expression(&format!("f({text})"), |call, source| {
        let arguments = call.child_by_field_name("arguments")?;
        Some(
            significant(arguments)
                .into_iter()
                .map(|argument| render(argument, source))
                .collect(),
        )
    })
}

/// The value of a text that is exactly one string literal.
pub fn string_literal_value(text: &str) -> Option<String> {
    with_expression(text, |expr, source| {
        if !is_string(expr.kind()) {
            return None;
        }
        string_value(tree::text(expr, source))
    })
}

/// Whether `!expr` negates all of `expr`, so no parentheses are needed.
pub fn binds_tighter_than_not(expr: &str) -> bool {
    with_expression(expr, |node, source| {
        Some(match node.kind() {
            "binary_expression" => node
                .child_by_field_name("operator")
                .is_some_and(|op| tree::text(op, source).eq_ignore_ascii_case("instanceof")),
            "conditional_expression"
            | "assignment_expression"
            | "augmented_assignment_expression"
            | "reference_assignment_expression"
            | "arrow_function"
            | "anonymous_function"
            | "yield_expression"
            | "throw_expression"
            | "print_intrinsic"
            | "include_expression"
            | "include_once_expression"
            | "require_expression"
            | "require_once_expression" => false,
            _ => true,
        })
    })
    .unwrap_or(false)
}

fn is_string(kind: &str) -> bool {
    matches!(kind, "string" | "encapsed_string")
}

/// The prefix of `text` up to the delimiter closing its first token, which
/// must be an opening delimiter. Strings and comments are skipped.
pub fn balanced_prefix(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' | b'`' => {
                i = skip_quoted(bytes, i)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..].find("*/").map(|end| i + 2 + end + 2)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = text[i..].find('\n').map_or(bytes.len(), |end| i + end);
                continue;
            }
            b'#' if bytes.get(i + 1) != Some(&b'[') => {
                i = text[i..].find('\n').map_or(bytes.len(), |end| i + end);
                continue;
            }
            b'(' | b'[' | b'{' => stack.push(c),
            b')' | b']' | b'}' => {
                let open = stack.pop()?;
                if !matches!((open, c), (b'(', b')') | (b'[', b']') | (b'{', b'}')) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[..=i]);
                }
            }
            c if c.is_ascii_whitespace() => {}
            _ if stack.is_empty() => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index just past the string literal starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn string_value(raw: &str) -> Option<String> {
    if let Some(body) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        let mut out = String::with_capacity(body.len());
        let mut chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('\\', Some(&next)) if next == '\'' || next == '\\' => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        }
        return Some(out);
    }
    let body = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"'))?;
    if body.contains('$') && !body.contains("\\$") {
        return None;
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(c @ ('\\' | '"' | '$')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}
