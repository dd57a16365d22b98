//! Component and Livewire blocks in printed template code.
//!
//! Blade resolves components through the container at render time. The
//! analyzer cannot follow that, so the resolve blocks are rewritten into
//! direct `new` expressions with the constructor or `mount()` arguments the
//! tag supplies, filling required ones from their declared types.

use crate::reflect::ClassReflector;
use blade_compiler::component_class_name;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use php_syntax::{balanced_prefix, parse_array_literal, Parameter};
use regex::Regex;
use std::ops::Range;

static COMPONENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?s)if \(isset\(\$component\)\).+?\$component = (.*?)::resolve\(.+?\$component->withAttributes\(\[.*?\]\);",
    )
    .ok()
});

static COMPONENT_END: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?s)echo \$__env->renderComponent\(\);.+?unset\(\$__componentOriginal.+?\}").ok()
});

static LIVEWIRE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?s)\$__split = function \(\$name, \$params = \[\]\) \{\s*return \[\$name, \$params\];\s*\};",
        r"\s*\[\$__name, \$__params\] = \$__split\('([^']*)'(?:, (.+?))?\);",
        r"\s*\$__html = app\('livewire'\)->mount\(.+?\);",
        r"\s*echo \$__html;",
        r"\s*unset\(\$__html\);",
        r"\s*unset\(\$__name\);",
        r"\s*unset\(\$__params\);",
        r"\s*unset\(\$__split\);",
        r"\s*if \(isset\(\$__slots\)\) \{\s*unset\(\$__slots\);\s*\}",
    ))
    .ok()
});

/// A `$component = <class>::resolve(...)` block, from the `isset($component)`
/// guard through `withAttributes(...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBlock<'a> {
    pub range: Range<usize>,
    pub class: &'a str,
    /// The array literal passed to `resolve`.
    pub data: Option<&'a str>,
}

impl<'a> ComponentBlock<'a> {
    /// The block as written in `code`.
    pub fn text(&self, code: &'a str) -> &'a str {
        &code[self.range.clone()]
    }
}

/// Find component resolve blocks in document order.
pub fn component_blocks(code: &str) -> Vec<ComponentBlock<'_>> {
    let Some(re) = COMPONENT.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(code)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let class = caps.get(1)?;
            let args_start = class.end() + "::resolve(".len();
            let data = code
                .get(args_start..whole.end())
                .and_then(balanced_prefix)
                .filter(|data| data.starts_with('['));
            Some(ComponentBlock {
                range: whole.range(),
                class: class.as_str().trim().trim_start_matches('\\'),
                data,
            })
        })
        .collect()
}

/// Keyed items of an array literal.
fn keyed_items(array: Option<&str>) -> IndexMap<String, String> {
    array
        .and_then(parse_array_literal)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| Some((item.key?, item.value)))
        .collect()
}

/// An argument for a parameter nothing was passed for.
fn synthesized_argument<C: ClassReflector + ?Sized>(
    param: &Parameter,
    reflector: &C,
) -> Option<String> {
    let type_name = param.type_name.as_deref()?;
    if param.nullable {
        return Some("null".to_string());
    }
    if !param.builtin && reflector.class_exists(type_name) {
        return Some(format!("resolve({type_name}::class)"));
    }
    None
}

fn named_arguments(args: &IndexMap<String, String>) -> String {
    args.iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replace component resolve blocks with constructor calls and strip their
/// render teardown.
pub fn resolve_components<C: ClassReflector + ?Sized>(code: &str, reflector: &C) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;
    for block in component_blocks(code) {
        let mut args = keyed_items(block.data);
        if let Some(params) = reflector.method_parameters(block.class, "__construct") {
            for param in params {
                if param.has_default || args.contains_key(&param.name) {
                    continue;
                }
                if let Some(value) = synthesized_argument(&param, reflector) {
                    args.insert(param.name, value);
                }
            }
        }
        tracing::debug!(class = block.class, args = args.len(), "resolved component");

        out.push_str(&code[last..block.range.start]);
        out.push_str(&format!(
            "$component = new {}({});",
            block.class,
            named_arguments(&args)
        ));
        last = block.range.end;
    }
    out.push_str(&code[last..]);

    match COMPONENT_END.as_ref() {
        Some(re) => re.replace_all(&out, "").into_owned(),
        None => out,
    }
}

/// Replace Livewire mount blocks with direct instantiation of the component
/// class under `namespace`.
pub fn rewrite_livewire<C: ClassReflector + ?Sized>(
    code: &str,
    reflector: &C,
    namespace: &str,
) -> String {
    let Some(re) = LIVEWIRE.as_ref() else {
        return code.to_string();
    };
    re.replace_all(code, |caps: &regex::Captures| {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let attributes = keyed_items(caps.get(2).map(|m| m.as_str()));
        livewire_component(&component_class_name(namespace, name), attributes, reflector)
    })
    .into_owned()
}

fn livewire_component<C: ClassReflector + ?Sized>(
    class: &str,
    mut attributes: IndexMap<String, String>,
    reflector: &C,
) -> String {
    let mut code = format!("$component = new {class}();");

    if let Some(params) = reflector.method_parameters(class, "mount") {
        let mut mount = IndexMap::new();
        for param in params {
            if let Some(value) = attributes.shift_remove(&param.name) {
                mount.insert(param.name, value);
                continue;
            }
            if param.has_default {
                continue;
            }
            if let Some(value) = synthesized_argument(&param, reflector) {
                mount.insert(param.name, value);
            }
        }
        if !mount.is_empty() {
            code.push_str(&format!(" $component->mount({});", named_arguments(&mount)));
        }
    }

    for (name, value) in attributes {
        code.push_str(&format!(" $component->{name} = {value};"));
    }
    code
}
