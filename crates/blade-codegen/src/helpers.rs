//! Shared constants and small text helpers for code generation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Class standing in for Blade's `$loop` variable inside loops.
pub const LOOP_CLASS: &str = "\\Bladecheck\\Runtime\\Loop";

/// Stub declaring [`LOOP_CLASS`], loaded by the analyzer next to the
/// generated file.
pub const LOOP_STUB: &str = r#"<?php

namespace Bladecheck\Runtime;

final class Loop
{
    public int $index;

    /** @var positive-int */
    public int $iteration;

    public int $remaining;

    /** @var positive-int */
    public int $count;

    public bool $first;

    public bool $last;

    public bool $even;

    public bool $odd;

    /** @var positive-int */
    public int $depth;

    public ?Loop $parent = null;
}
"#;

/// Variables every template can see, with their types.
pub const DEFAULT_VARIABLES: &[(&str, &str)] = &[
    ("__env", "Illuminate\\View\\Factory"),
    ("errors", "Illuminate\\Support\\ViewErrorBag"),
];

/// The data merged into views rendered from inside another view.
pub const DEFINED_VARS: &str =
    "\\Illuminate\\Support\\Arr::except(get_defined_vars(), ['__data', '__path'])";

/// Default `$slot` of an anonymous component.
pub const COMPONENT_SLOT: &str = "new \\Illuminate\\View\\ComponentSlot()";
/// Default `$attributes` of an anonymous component.
pub const ATTRIBUTE_BAG: &str = "new \\Illuminate\\View\\ComponentAttributeBag()";

static VARIABLE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"\$([a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*)").ok()
});

/// Check if `name` is a valid PHP variable name (without `$`).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() || !first.is_ascii() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric() || !c.is_ascii())
        }
        _ => false,
    }
}

/// Names of the variables referenced in a PHP expression, in order.
pub fn referenced_variables(expr: &str) -> Vec<String> {
    match VARIABLE.as_ref() {
        Some(re) => re
            .captures_iter(expr)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// A single-quoted PHP string literal.
pub fn php_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Render a closure `use` list, skipping `$this`.
pub fn use_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .filter(|name| *name != "this")
        .map(|name| format!("${name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Push `name` unless already present.
pub(crate) fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("user"));
        assert!(is_identifier("_private1"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("data-id"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_referenced_variables() {
        assert_eq!(
            referenced_variables("$user->name . $other['x'] . e($this->y)"),
            vec!["user", "other", "this"]
        );
        assert!(referenced_variables("'plain'").is_empty());
    }

    #[test]
    fn test_use_list() {
        assert_eq!(use_list(["__env", "this", "user"]), "$__env, $user");
        assert_eq!(php_string("it's"), "'it\\'s'");
    }
}
