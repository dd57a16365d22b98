//! `<x-...>` component tags, `<x-slot>` tags and `<livewire:...>` tags.

use crate::echo::echo_expression;
use crate::error::{CompileError, CompileResult};
use crate::naming::camel_case;
use crate::scan::{find_balanced_close, map_markup, quote};
use crate::{ComponentLookup, Session};
use source_map::Span;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Class of components backed only by a view.
pub const ANONYMOUS_COMPONENT: &str = "Illuminate\\View\\AnonymousComponent";
/// Class behind `<x-dynamic-component>`.
pub const DYNAMIC_COMPONENT: &str = "Illuminate\\View\\DynamicComponent";
const ATTRIBUTE_BAG: &str = "Illuminate\\View\\ComponentAttributeBag";

/// A tag attribute with its value compiled to a PHP expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    value: String,
    bound: bool,
}

#[derive(Debug)]
struct Tag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
    /// Byte offset just past the tag.
    end: usize,
}

/// Compile component, slot and Livewire tags outside existing PHP blocks.
pub(crate) fn compile_component_tags<L: ComponentLookup + ?Sized>(
    content: &str,
    lookup: &L,
    session: &mut Session,
) -> CompileResult<String> {
    map_markup(content, |run, offset| compile_run(run, offset, lookup, session))
}

fn is_slot_close(rest: &str) -> bool {
    ["</x-slot", "</x:slot"].iter().any(|prefix| {
        rest.strip_prefix(prefix)
            .and_then(|after| after.chars().next())
            .is_some_and(|c| c == '>' || c == ':' || c.is_whitespace())
    })
}

fn compile_run<L: ComponentLookup + ?Sized>(
    run: &str,
    offset: usize,
    lookup: &L,
    session: &mut Session,
) -> CompileResult<String> {
    let mut out = String::with_capacity(run.len());
    let mut last = 0;
    let mut cursor = 0;
    while let Some(found) = run[cursor..].find('<') {
        let at = cursor + found;
        cursor = at + 1;
        let rest = &run[at..];
        let span = |end: usize| Span::new((offset + at) as u32, (offset + end) as u32);

        let (compiled, end) = if rest.starts_with("</") {
            let Some(close) = rest.find('>') else {
                continue;
            };
            let end = at + close + 1;
            if is_slot_close(rest) {
                ("<?php $__env->endSlot(); ?>".to_string(), end)
            } else if rest.starts_with("</x-") || rest.starts_with("</x:") {
                let name = rest[4..close].trim();
                let hash = session
                    .components
                    .pop()
                    .ok_or_else(|| CompileError::unbalanced_tag(name, span(end)))?;
                (close_component(&hash), end)
            } else if rest.starts_with("</livewire:") {
                (String::new(), end)
            } else {
                continue;
            }
        } else if rest.starts_with("<x-") || rest.starts_with("<x:") {
            let Some(tag) = parse_tag(run, at + 3) else {
                continue;
            };
            let end = tag.end;
            if tag.name == "slot" || tag.name.starts_with("slot:") {
                (compile_slot(&tag), end)
            } else {
                (open_component(&tag, lookup, session, span(end))?, end)
            }
        } else if rest.starts_with("<livewire:") {
            let Some(tag) = parse_tag(run, at + 10) else {
                continue;
            };
            session.livewire += 1;
            let params = attribute_array(tag.attributes.iter(), true, false);
            let args = format!("{}, {params}", quote(&tag.name));
            (livewire_mount(&args, session.livewire), tag.end)
        } else {
            continue;
        };

        out.push_str(&run[last..at]);
        out.push_str(&compiled);
        last = end;
        cursor = end;
    }
    out.push_str(&run[last..]);
    Ok(out)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | ':' | '.' | '_')
}

/// Parse a tag whose name starts at `name_start`.
fn parse_tag(text: &str, name_start: usize) -> Option<Tag> {
    let name_len = text[name_start..]
        .find(|c: char| !is_name_char(c))
        .unwrap_or(text.len() - name_start);
    if name_len == 0 {
        return None;
    }
    let name = text[name_start..name_start + name_len].to_string();
    let mut pos = name_start + name_len;
    let mut attributes = Vec::new();
    loop {
        pos = text.len() - text[pos..].trim_start().len();
        let rest = &text[pos..];
        if rest.starts_with("/>") || rest.starts_with('>') {
            let self_closing = rest.starts_with('/');
            return Some(Tag {
                name,
                attributes,
                self_closing,
                end: pos + if self_closing { 2 } else { 1 },
            });
        }
        if rest.starts_with("{{") {
            pos += rest.find("}}")? + 2;
            continue;
        }
        for (directive, helper) in [("@class(", "toCssClasses"), ("@style(", "toCssStyles")] {
            if rest.starts_with(directive) {
                let close = find_balanced_close(rest, directive.len() - 1)?;
                let args = &rest[directive.len()..close];
                attributes.push(Attribute {
                    name: directive[1..directive.len() - 1].to_string(),
                    value: format!("\\Illuminate\\Support\\Arr::{helper}({})", args.trim()),
                    bound: true,
                });
                pos += close + 1;
            }
        }
        if pos != text.len() - rest.len() {
            continue;
        }

        let name_len = attribute_name_len(rest);
        if name_len == 0 {
            return None;
        }
        let raw_name = &rest[..name_len];
        pos += name_len;
        let after = text[pos..].trim_start();
        let value = if let Some(value_text) = after.strip_prefix('=') {
            let value_text = value_text.trim_start();
            let quote_char = value_text.chars().next()?;
            let (value, consumed) = if quote_char == '"' || quote_char == '\'' {
                let len = value_text[1..].find(quote_char)?;
                (&value_text[1..1 + len], len + 2)
            } else {
                let len = value_text
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(value_text.len());
                (&value_text[..len], len)
            };
            pos = text.len() - value_text.len() + consumed;
            Some(value)
        } else {
            None
        };
        attributes.push(attribute(raw_name, value));
    }
}

fn attribute_name_len(text: &str) -> usize {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let closes = c == '/' && chars.peek().is_some_and(|(_, next)| *next == '>');
        if c.is_whitespace() || c == '=' || c == '>' || c == '"' || c == '\'' || closes {
            return i;
        }
    }
    text.len()
}

fn attribute(raw_name: &str, value: Option<&str>) -> Attribute {
    if let Some(escaped) = raw_name.strip_prefix("::") {
        return Attribute {
            name: format!(":{escaped}"),
            value: attribute_string(value.unwrap_or_default()),
            bound: false,
        };
    }
    if let Some(bound) = raw_name.strip_prefix(':') {
        return match (bound.strip_prefix('$'), value) {
            (Some(variable), None) => Attribute {
                name: variable.to_string(),
                value: bound.to_string(),
                bound: true,
            },
            _ => Attribute {
                name: bound.to_string(),
                value: value.unwrap_or("null").trim().to_string(),
                bound: true,
            },
        };
    }
    Attribute {
        name: raw_name.to_string(),
        value: value.map_or_else(|| "true".to_string(), attribute_string),
        bound: false,
    }
}

/// Compile a literal attribute value, turning inner echoes into concatenation.
fn attribute_string(raw: &str) -> String {
    let mut parts = Vec::new();
    let mut rest = raw;
    loop {
        let next = [("{{", "}}", true), ("{!!", "!!}", false)]
            .into_iter()
            .filter_map(|(open, close, escape)| rest.find(open).map(|at| (at, open, close, escape)))
            .min_by_key(|(at, ..)| *at);
        let Some((at, open, close, escape)) = next else {
            break;
        };
        let body_start = at + open.len();
        let Some(len) = rest[body_start..].find(close) else {
            break;
        };
        parts.push(quote(&rest[..at]));
        parts.push(echo_expression(rest[body_start..body_start + len].trim(), escape));
        rest = &rest[body_start + len + close.len()..];
    }
    parts.push(quote(rest));
    parts.join(" . ")
}

/// `[...]` from attributes, keyed by camel-cased names for component data.
fn attribute_array<'a>(
    attributes: impl Iterator<Item = &'a Attribute>,
    camel: bool,
    sanitize: bool,
) -> String {
    let items: Vec<String> = attributes
        .map(|attribute| {
            let key = if camel {
                camel_case(&attribute.name)
            } else {
                attribute.name.clone()
            };
            let value = if sanitize && attribute.bound {
                format!(
                    "\\Illuminate\\View\\Compilers\\BladeCompiler::sanitizeComponentAttribute({})",
                    attribute.value
                )
            } else {
                attribute.value.clone()
            };
            format!("{} => {value}", quote(&key))
        })
        .collect();
    format!("[{}]", items.join(", "))
}

pub(crate) fn component_hash(seed: &str, counter: usize) -> String {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    counter.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn anonymous_view<L: ComponentLookup + ?Sized>(name: &str, lookup: &L) -> Option<String> {
    let (prefix, name) = match name.split_once("::") {
        Some((namespace, name)) => (format!("{namespace}::components."), name),
        None => ("components.".to_string(), name),
    };
    [format!("{prefix}{name}"), format!("{prefix}{name}.index")]
        .into_iter()
        .find(|view| lookup.view_exists(view))
}

fn is_parameter(params: &[String], attribute: &Attribute) -> bool {
    params.contains(&camel_case(&attribute.name))
}

fn open_component<L: ComponentLookup + ?Sized>(
    tag: &Tag,
    lookup: &L,
    session: &mut Session,
    span: Span,
) -> CompileResult<String> {
    let (class, data, attributes) = if tag.name == "dynamic-component" {
        let params = vec!["component".to_string()];
        (
            DYNAMIC_COMPONENT.to_string(),
            attribute_array(tag.attributes.iter().filter(|a| is_parameter(&params, a)), true, false),
            attribute_array(tag.attributes.iter().filter(|a| !is_parameter(&params, a)), false, true),
        )
    } else if let Some(class) = lookup.component_class(&tag.name) {
        let (data, attributes) = match lookup.constructor_parameters(&class) {
            Some(params) => (
                attribute_array(tag.attributes.iter().filter(|a| is_parameter(&params, a)), true, false),
                attribute_array(tag.attributes.iter().filter(|a| !is_parameter(&params, a)), false, true),
            ),
            None => (
                attribute_array(tag.attributes.iter(), true, false),
                attribute_array(tag.attributes.iter(), false, true),
            ),
        };
        (class, data, attributes)
    } else {
        let view = anonymous_view(&tag.name, lookup)
            .ok_or_else(|| CompileError::unknown_component(&tag.name, span))?;
        let data = format!(
            "['view' => {}, 'data' => {}]",
            quote(&view),
            attribute_array(tag.attributes.iter(), true, false)
        );
        (
            ANONYMOUS_COMPONENT.to_string(),
            data,
            attribute_array(tag.attributes.iter(), false, true),
        )
    };
    tracing::trace!(component = %tag.name, %class, "compiling component tag");

    session.component_count += 1;
    let hash = component_hash(&tag.name, session.component_count);
    let name = quote(&tag.name);
    let mut php = [
        format!("<?php if (isset($component)) {{ $__componentOriginal{hash} = $component; }} ?>"),
        format!("<?php if (isset($attributes)) {{ $__attributesOriginal{hash} = $attributes; }} ?>"),
        format!("<?php $component = {class}::resolve({data} + (isset($attributes) && $attributes instanceof {ATTRIBUTE_BAG} ? $attributes->all() : [])); ?>"),
        format!("<?php $component->withName({name}); ?>"),
        "<?php if ($component->shouldRender()): ?>".to_string(),
        "<?php $__env->startComponent($component->resolveView(), $component->data()); ?>".to_string(),
        format!("<?php if (isset($attributes) && $attributes instanceof {ATTRIBUTE_BAG}): ?>"),
        format!("<?php $attributes = $attributes->except(\\{class}::ignoredParameterNames()); ?>"),
        "<?php endif; ?>".to_string(),
        format!("<?php $component->withAttributes({attributes}); ?>"),
    ]
    .concat();
    if tag.self_closing {
        php.push_str(&close_component(&hash));
    } else {
        session.components.push(hash);
    }
    Ok(php)
}

fn close_component(hash: &str) -> String {
    [
        "<?php echo $__env->renderComponent(); ?>".to_string(),
        "<?php endif; ?>".to_string(),
        format!("<?php if (isset($__attributesOriginal{hash})): ?>"),
        format!("<?php $attributes = $__attributesOriginal{hash}; ?>"),
        format!("<?php unset($__attributesOriginal{hash}); ?>"),
        "<?php endif; ?>".to_string(),
        format!("<?php if (isset($__componentOriginal{hash})): ?>"),
        format!("<?php $component = $__componentOriginal{hash}; ?>"),
        format!("<?php unset($__componentOriginal{hash}); ?>"),
        "<?php endif; ?>".to_string(),
    ]
    .concat()
}

fn compile_slot(tag: &Tag) -> String {
    let (name, attributes): (String, Vec<&Attribute>) = match tag.name.strip_prefix("slot:") {
        Some(name) => (quote(&camel_case(name)), tag.attributes.iter().collect()),
        None => {
            let name = tag
                .attributes
                .iter()
                .find(|a| a.name == "name")
                .map_or_else(|| quote("slot"), |a| a.value.clone());
            (name, tag.attributes.iter().filter(|a| a.name != "name").collect())
        }
    };
    let mut php = format!(
        "<?php $__env->slot({name}, null, {}); ?>",
        attribute_array(attributes.into_iter(), false, true)
    );
    if tag.self_closing {
        php.push_str("<?php $__env->endSlot(); ?>");
    }
    php
}

/// Livewire's mount block for `$__split(<args>)`.
pub(crate) fn livewire_mount(args: &str, counter: usize) -> String {
    let key = format!("lw-{}", component_hash(args, counter));
    format!(
        "<?php $__split = function ($name, $params = []) {{ return [$name, $params]; }}; [$__name, $__params] = $__split({args}); $__html = app('livewire')->mount($__name, $__params, '{key}', $__slots ?? [], get_defined_vars()); echo $__html; unset($__html); unset($__name); unset($__params); unset($__split); if (isset($__slots)) unset($__slots); ?>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileErrorCode;
    use pretty_assertions::assert_eq;

    struct Fixture;

    impl ComponentLookup for Fixture {
        fn component_class(&self, name: &str) -> Option<String> {
            (name == "alert").then(|| "App\\View\\Components\\Alert".to_string())
        }

        fn constructor_parameters(&self, _class: &str) -> Option<Vec<String>> {
            Some(vec!["type".to_string(), "message".to_string()])
        }

        fn view_exists(&self, view: &str) -> bool {
            view == "components.button" || view == "components.card.index"
        }
    }

    fn compile(content: &str) -> CompileResult<String> {
        compile_component_tags(content, &Fixture, &mut Session::default())
    }

    #[test]
    fn test_class_component_partitions_attributes() {
        let out = compile("<x-alert type=\"error\" :message=\"$msg\" class=\"mt-4\"/>").unwrap();
        assert!(out.contains(
            "$component = App\\View\\Components\\Alert::resolve(['type' => 'error', 'message' => $msg] + (isset($attributes)"
        ));
        assert!(out.contains("$component->withAttributes(['class' => 'mt-4']);"));
        assert!(out.ends_with("<?php endif; ?>"));
        assert!(out.contains("echo $__env->renderComponent();"));
    }

    #[test]
    fn test_anonymous_component_with_slot_content() {
        let out = compile("<x-button size=\"lg\" :disabled=\"$busy\">\nSave\n</x-button>").unwrap();
        assert!(out.contains(
            "Illuminate\\View\\AnonymousComponent::resolve(['view' => 'components.button', 'data' => ['size' => 'lg', 'disabled' => $busy]] + "
        ));
        let (open, close) = out.split_once("\nSave\n").unwrap();
        assert!(open.ends_with("]); ?>"));
        assert!(close.starts_with("<?php echo $__env->renderComponent(); ?>"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_index_view_and_unknown_component() {
        assert!(compile("<x-card />").unwrap().contains("'view' => 'components.card.index'"));
        let err = compile("<p><x-missing /></p>").unwrap_err();
        assert_eq!(err.code, CompileErrorCode::UnknownComponent);
        assert_eq!(
            err.message,
            "Unable to locate a class or view for component [missing]."
        );
        assert_eq!(err.span, Span::new(3, 16));
    }

    #[test]
    fn test_slots() {
        assert_eq!(
            compile("<x-slot:page-title class=\"a\">Hi</x-slot>").unwrap(),
            "<?php $__env->slot('pageTitle', null, ['class' => 'a']); ?>Hi<?php $__env->endSlot(); ?>"
        );
        assert_eq!(
            compile("<x-slot name=\"footer\"></x-slot>").unwrap(),
            "<?php $__env->slot('footer', null, []); ?><?php $__env->endSlot(); ?>"
        );
    }

    #[test]
    fn test_livewire_tag() {
        let out = compile("<livewire:counter :start=\"$n\" step=\"2\" />").unwrap();
        assert!(out.contains("[$__name, $__params] = $__split('counter', ['start' => $n, 'step' => '2']);"));
        assert!(out.starts_with("<?php $__split = function ($name, $params = []) { return [$name, $params]; };"));
    }

    #[test]
    fn test_attribute_string_with_echo() {
        assert_eq!(attribute_string("{{$c}}"), "'' . e($c) . ''");
        assert_eq!(attribute_string("btn {!! $x !!}-lg"), "'btn ' . $x . '-lg'");
        assert_eq!(attribute_string("it's"), "'it\\'s'");
    }

    #[test]
    fn test_short_bound_and_boolean_attributes() {
        let tag = parse_tag("<x-alert :$type dismissible wire:click=\"go\">", 3).unwrap();
        assert_eq!(tag.name, "alert");
        assert_eq!(
            tag.attributes,
            vec![
                Attribute {
                    name: "type".to_string(),
                    value: "$type".to_string(),
                    bound: true,
                },
                Attribute {
                    name: "dismissible".to_string(),
                    value: "true".to_string(),
                    bound: false,
                },
                Attribute {
                    name: "wire:click".to_string(),
                    value: "'go'".to_string(),
                    bound: false,
                },
            ]
        );
        assert!(!tag.self_closing);
    }

    #[test]
    fn test_unbalanced_closing_tag() {
        let err = compile("</x-alert>").unwrap_err();
        assert_eq!(err.code, CompileErrorCode::UnbalancedTag);
    }
}
