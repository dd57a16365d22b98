//! Includes and anonymous components found in generated code.
//!
//! Each element knows the call-site text it replaces, the view to inline and
//! the variables passed to it, and renders the closure(s) that scope the
//! inlined child code.

use crate::helpers::{
    is_identifier, push_unique, referenced_variables, use_list, ATTRIBUTE_BAG, COMPONENT_SLOT,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use php_syntax::{parse_array_literal, string_literal_value};
use regex::Regex;

static PROPS_DIRECTIVE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)@props\((\[.*?\])\)").ok());

/// A view inlined at its call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlinedElement {
    /// `@include`, `@extends` and friends.
    Include {
        raw_host_code: String,
        view_name: String,
        captured_variables: IndexMap<String, String>,
        /// Variable whose keys are extracted into the child scope.
        extract_source: Option<String>,
    },
    /// An anonymous `<x-...>` component.
    Component {
        raw_host_code: String,
        view_name: String,
        captured_variables: IndexMap<String, String>,
    },
}

/// The child template prepared for inlining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildScope {
    /// Child template source, with `@props(...)` removed.
    pub content: String,
    /// Variables visible inside the child.
    pub inner_scope_names: Vec<String>,
    /// `@props` defaults not overridden by the call site.
    pub defaults: IndexMap<String, String>,
    outer_use: Vec<String>,
}

impl InlinedElement {
    /// `@include` and friends. `extract_source` holds the data expression when
    /// it is not an array literal.
    pub fn include(
        raw_host_code: impl Into<String>,
        view_name: impl Into<String>,
        captured_variables: IndexMap<String, String>,
        extract_source: Option<String>,
    ) -> Self {
        Self::Include {
            raw_host_code: raw_host_code.into(),
            view_name: view_name.into(),
            captured_variables,
            extract_source,
        }
    }

    /// Anonymous component; `slot`, `attributes` and `componentName` are
    /// added unless passed explicitly.
    pub fn component(
        raw_host_code: impl Into<String>,
        view_name: impl Into<String>,
        mut captured_variables: IndexMap<String, String>,
    ) -> Self {
        for (name, value) in [
            ("slot", COMPONENT_SLOT),
            ("attributes", ATTRIBUTE_BAG),
            ("componentName", "''"),
        ] {
            captured_variables
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        Self::Component {
            raw_host_code: raw_host_code.into(),
            view_name: view_name.into(),
            captured_variables,
        }
    }

    /// The generated code this element replaces.
    pub fn raw_host_code(&self) -> &str {
        match self {
            Self::Include { raw_host_code, .. } | Self::Component { raw_host_code, .. } => {
                raw_host_code
            }
        }
    }

    /// Name of the included view.
    pub fn view_name(&self) -> &str {
        match self {
            Self::Include { view_name, .. } | Self::Component { view_name, .. } => view_name,
        }
    }

    /// Variables passed to the view, name to PHP expression.
    pub fn captured_variables(&self) -> &IndexMap<String, String> {
        match self {
            Self::Include {
                captured_variables, ..
            }
            | Self::Component {
                captured_variables, ..
            } => captured_variables,
        }
    }

    /// Work out the child's scope given the variables visible at the call
    /// site, stripping the `@props` directive from component templates.
    pub fn scope(&self, content: &str, visible: &[String]) -> ChildScope {
        match self {
            Self::Include {
                captured_variables,
                extract_source,
                ..
            } => {
                let mut outer_use = Vec::new();
                for name in visible {
                    push_unique(&mut outer_use, name);
                }
                for value in captured_variables.values() {
                    for name in referenced_variables(value) {
                        push_unique(&mut outer_use, &name);
                    }
                }
                if let Some(source) = extract_source {
                    push_unique(&mut outer_use, source.trim_start_matches('$'));
                }
                let mut inner = outer_use.clone();
                for key in captured_variables.keys() {
                    push_unique(&mut inner, key);
                }
                ChildScope {
                    content: content.to_string(),
                    inner_scope_names: inner,
                    defaults: IndexMap::new(),
                    outer_use,
                }
            }
            Self::Component {
                captured_variables, ..
            } => {
                let mut outer_use = vec!["__env".to_string()];
                for value in captured_variables.values() {
                    for name in referenced_variables(value) {
                        push_unique(&mut outer_use, &name);
                    }
                }

                let (content, props) = strip_props(content);
                let mut inner = vec!["__env".to_string()];
                let mut defaults = IndexMap::new();
                match props {
                    Some(Props { defaults: all, names }) => {
                        for (name, value) in all {
                            push_unique(&mut inner, &name);
                            if !captured_variables.contains_key(&name) {
                                defaults.insert(name, value);
                            }
                        }
                        for name in names.iter().map(String::as_str).chain(["slot", "attributes"]) {
                            push_unique(&mut inner, name);
                        }
                    }
                    None => {
                        for name in captured_variables.keys() {
                            push_unique(&mut inner, name);
                        }
                    }
                }
                ChildScope {
                    content,
                    inner_scope_names: inner,
                    defaults,
                    outer_use,
                }
            }
        }
    }

    /// The code replacing the call site.
    pub fn inline_representation(&self, scope: &ChildScope, child_code: &str) -> String {
        let assignments: Vec<String> = self
            .captured_variables()
            .iter()
            .chain(scope.defaults.iter())
            .map(|(name, value)| format!("${name} = {value};"))
            .collect();
        let outer_use = use_list(scope.outer_use.iter().map(String::as_str));

        match self {
            Self::Include { extract_source, .. } => {
                let mut body = assignments;
                if let Some(source) = extract_source {
                    body.push(format!("extract({source});"));
                }
                body.push(child_code.to_string());
                closure(&outer_use, &body)
            }
            Self::Component { .. } => {
                let inner_use = use_list(scope.inner_scope_names.iter().map(String::as_str));
                let mut body = assignments;
                body.push(closure(&inner_use, &[child_code.to_string()]));
                closure(&outer_use, &body)
            }
        }
    }
}

fn closure(uses: &str, body: &[String]) -> String {
    let head = if uses.is_empty() {
        "(function () {".to_string()
    } else {
        format!("(function () use({uses}) {{")
    };
    let mut lines = vec![head];
    for part in body.iter().filter(|part| !part.trim().is_empty()) {
        lines.extend(part.lines().map(|line| match line {
            "" => String::new(),
            line => format!("    {line}"),
        }));
    }
    lines.push("});".to_string());
    lines.join("\n")
}

/// Data passed to an include, keeping identifier keys only. A lone variable
/// becomes the extract source.
pub(crate) fn include_data(data: Option<&str>) -> (IndexMap<String, String>, Option<String>) {
    let Some(data) = data.map(str::trim) else {
        return (IndexMap::new(), None);
    };
    if let Some(name) = data.strip_prefix('$') {
        if is_identifier(name) {
            return (IndexMap::new(), Some(data.to_string()));
        }
    }
    (array_variables(data), None)
}

/// Identifier-keyed items of an array literal.
pub(crate) fn array_variables(array: &str) -> IndexMap<String, String> {
    parse_array_literal(array)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match item.key {
            Some(key) if is_identifier(&key) => Some((key, item.value)),
            _ => None,
        })
        .collect()
}

struct Props {
    defaults: IndexMap<String, String>,
    names: Vec<String>,
}

/// Remove `@props([...])` from a component template.
///
/// The directive is replaced by as many newlines as it spanned so template
/// lines keep their numbers. Returns no props when the directive never
/// balances its parentheses.
fn strip_props(content: &str) -> (String, Option<Props>) {
    let Some(found) = PROPS_DIRECTIVE.as_ref().and_then(|re| re.find(content)) else {
        return (content.to_string(), None);
    };
    let start = found.start();
    let mut end = found.end();
    while !balanced(&content[start..end]) {
        match content[end..].chars().next() {
            Some(c) => end += c.len_utf8(),
            None => return (content.to_string(), None),
        }
    }

    let directive = &content[start..end];
    let array = &directive["@props(".len()..directive.len() - 1];
    let mut props = Props {
        defaults: IndexMap::new(),
        names: Vec::new(),
    };
    for item in parse_array_literal(array).unwrap_or_default() {
        match item.key {
            Some(key) => {
                props.defaults.insert(key, item.value);
            }
            None => {
                if let Some(name) = string_literal_value(&item.value) {
                    props.names.push(name);
                }
            }
        }
    }

    let filler = "\n".repeat(directive.matches('\n').count());
    (content.replace(directive, &filler), Some(props))
}

fn balanced(text: &str) -> bool {
    text.matches('(').count() == text.matches(')').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_include_scope() {
        let element = InlinedElement::include(
            "raw",
            "partials.card",
            vars(&[("title", "$post->title"), ("foo", "'bar'")]),
            None,
        );
        let scope = element.scope("{{ $title }}", &names(&["__env", "errors"]));
        assert_eq!(
            scope.inner_scope_names,
            names(&["__env", "errors", "post", "title", "foo"])
        );
        assert_eq!(
            element.inline_representation(&scope, "echo e($title);"),
            "(function () use($__env, $errors, $post) {\n    $title = $post->title;\n    $foo = 'bar';\n    echo e($title);\n});"
        );
    }

    #[test]
    fn test_include_extract() {
        let (data, extract) = include_data(Some("$data"));
        assert!(data.is_empty());
        let element = InlinedElement::include("raw", "v", data, extract);
        let scope = element.scope("", &names(&["__env"]));
        assert_eq!(scope.inner_scope_names, names(&["__env", "data"]));
        assert_eq!(
            element.inline_representation(&scope, ""),
            "(function () use($__env, $data) {\n    extract($data);\n});"
        );
    }

    #[test]
    fn test_include_data_filters_keys() {
        let (data, extract) = include_data(Some("['ok' => 1, 'data-id' => 2, 3, 'user' => $u]"));
        assert_eq!(data, vars(&[("ok", "1"), ("user", "$u")]));
        assert_eq!(extract, None);
        assert!(include_data(None).0.is_empty());
    }

    #[test]
    fn test_component_props_defaults() {
        let element =
            InlinedElement::component("raw", "components.button", vars(&[("type", "'submit'")]));
        let scope = element.scope(
            "@props(['type' => 'button', 'size' => 'large', 'icon'])\n<button>{{ $size }}</button>",
            &names(&["__env", "user"]),
        );
        assert_eq!(scope.content, "\n<button>{{ $size }}</button>");
        assert_eq!(
            scope.inner_scope_names,
            names(&["__env", "type", "size", "icon", "slot", "attributes"])
        );
        assert_eq!(scope.defaults, vars(&[("size", "'large'")]));
        assert_eq!(
            element.inline_representation(&scope, "echo e($size);"),
            "(function () use($__env) {\n    $type = 'submit';\n    $slot = new \\Illuminate\\View\\ComponentSlot();\n    $attributes = new \\Illuminate\\View\\ComponentAttributeBag();\n    $componentName = '';\n    $size = 'large';\n    (function () use($__env, $type, $size, $icon, $slot, $attributes) {\n        echo e($size);\n    });\n});"
        );
    }

    #[test]
    fn test_component_without_props() {
        let element = InlinedElement::component("raw", "components.alert", vars(&[("msg", "$m")]));
        let scope = element.scope("<div>{{ $msg }}</div>", &names(&["__env"]));
        assert_eq!(
            scope.inner_scope_names,
            names(&["__env", "msg", "slot", "attributes", "componentName"])
        );
        assert!(element
            .inline_representation(&scope, "")
            .starts_with("(function () use($__env, $m) {"));
    }

    #[test]
    fn test_props_nested_parentheses() {
        let (content, props) =
            strip_props("@props(['items' => collect([1, 2])->map(fn ($i) => $i)])\nbody");
        assert_eq!(content, "\nbody");
        let props = props.unwrap();
        assert_eq!(
            props.defaults.get("items").map(String::as_str),
            Some("collect([1, 2])->map(fn ($i) => $i)")
        );
    }

    #[test]
    fn test_props_multiline_keeps_lines() {
        let (content, props) = strip_props("@props([\n    'a' => 1,\n])\n{{ $a }}");
        assert_eq!(content, "\n\n\n{{ $a }}");
        assert_eq!(props.unwrap().defaults, vars(&[("a", "1")]));
    }

    #[test]
    fn test_props_unbalanced() {
        let (content, props) = strip_props("@props(['a' => f(])\nrest");
        assert_eq!(content, "@props(['a' => f(])\nrest");
        assert!(props.is_none());
    }
}
