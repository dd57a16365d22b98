//! Recursive inlining of includes and anonymous components.

use crate::annotate::annotate;
use crate::components::{component_blocks, rewrite_livewire};
use crate::context::CompileContext;
use crate::element::{array_variables, include_data, InlinedElement};
use crate::engine::ProjectComponents;
use crate::error::StructuralErrorCode;
use crate::extract::extract;
use crate::finder::{FileReader, TemplateFinder};
use crate::reflect::ClassReflector;
use crate::visitors;
use crate::TemplateCompiler;
use blade_compiler::{BladeCompiler, ANONYMOUS_COMPONENT};
use once_cell::sync::Lazy;
use php_syntax::{
    balanced_prefix, parse, parse_array_literal, print, print_file, split_arguments,
    string_literal_value,
};
use regex::Regex;
use source_map::{LocationMarker, TemplateLocation};
use std::ops::Range;
use std::path::{Path, PathBuf};

static VIEW_INCLUDE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"echo \$__env->make\(").ok());

const RENDER_CALL: &str = "->render();";

impl<F, R, C> TemplateCompiler<F, R, C>
where
    F: TemplateFinder,
    R: FileReader,
    C: ClassReflector,
{
    /// Compile one template and everything it includes into PHP code.
    pub(crate) fn inline_include(
        &self,
        ctx: &mut CompileContext,
        path: &Path,
        content: &str,
        visible: &[String],
        emit_module_header: bool,
    ) -> String {
        ctx.enter(path);
        let code = self.inline_entered(ctx, path, content, visible, emit_module_header);
        ctx.leave();
        code
    }

    fn inline_entered(
        &self,
        ctx: &mut CompileContext,
        path: &Path,
        content: &str,
        visible: &[String],
        emit_module_header: bool,
    ) -> String {
        let relative = self.paths.relative_path(path);
        let start_of_file = || TemplateLocation::new(relative.clone(), 1);
        tracing::debug!(template = %relative, depth = ctx.depth(), "inlining template");

        let annotated = annotate(&relative, content);
        let lookup = ProjectComponents::new(
            &self.finder,
            &self.reflector,
            &self.options.component_namespace,
        );
        let compiled = match BladeCompiler::new(lookup).compile_string(&annotated) {
            Ok(compiled) => compiled,
            Err(err) => {
                let location = err.location.clone().unwrap_or_else(start_of_file);
                ctx.error(err.message, StructuralErrorCode::Missing, location);
                return String::new();
            }
        };
        if let Err(err) = parse(&compiled) {
            let end = (err.span.start as usize).min(compiled.len());
            let location = compiled
                .get(..end)
                .and_then(LocationMarker::find_last)
                .map_or_else(start_of_file, |marker| marker.location);
            ctx.error(
                format!("View [{relative}] contains syntax errors."),
                StructuralErrorCode::Parsing,
                location,
            );
            return String::new();
        }

        let mut stmts = match parse(&extract(&compiled, true)) {
            Ok(stmts) => stmts,
            Err(err) => {
                tracing::warn!(template = %relative, error = %err, "extracted code does not parse");
                ctx.error(
                    format!("View [{relative}] contains syntax errors."),
                    StructuralErrorCode::Parsing,
                    start_of_file(),
                );
                return String::new();
            }
        };
        visitors::rewrite(&mut stmts);
        let printed = if emit_module_header {
            print_file(&stmts)
        } else if stmts.is_empty() {
            String::new()
        } else {
            format!("{}\n", print(&stmts))
        };
        let code = rewrite_livewire(&printed, &self.reflector, &self.options.livewire_namespace);

        let elements = find_elements(&code);
        if elements.is_empty() {
            return code;
        }
        let mut out = String::with_capacity(code.len());
        let mut last = 0;
        for (range, element) in elements {
            let location = LocationMarker::find_last(&code[..range.start])
                .map_or_else(start_of_file, |marker| marker.location);
            out.push_str(&code[last..range.start]);
            out.push_str(&self.inline_element(ctx, &element, location, visible));
            last = range.end;
        }
        out.push_str(&code[last..]);
        out
    }

    fn inline_element(
        &self,
        ctx: &mut CompileContext,
        element: &InlinedElement,
        location: TemplateLocation,
        visible: &[String],
    ) -> String {
        let view = element.view_name();
        let found = self.finder.find(view).and_then(|path| {
            let content = self.reader.read_to_string(&path)?;
            Ok((path, content))
        });
        let (path, content): (Option<PathBuf>, String) = match found {
            Ok((path, _)) if ctx.is_active(&path) => {
                ctx.error(
                    format!("View [{view}] is already being rendered."),
                    StructuralErrorCode::Recursion,
                    location,
                );
                (None, String::new())
            }
            Ok((path, content)) => (Some(path), content),
            Err(err) => {
                ctx.error(err.to_string(), StructuralErrorCode::Missing, location);
                (None, String::new())
            }
        };

        let scope = element.scope(&content, visible);
        let child = match path {
            Some(path) => {
                tracing::debug!(view, path = %path.display(), "resolved view");
                self.inline_include(ctx, &path, &scope.content, &scope.inner_scope_names, false)
            }
            None => String::new(),
        };
        element.inline_representation(&scope, &child)
    }
}

/// Includes and anonymous components in printed code, in document order and
/// without overlaps.
fn find_elements(code: &str) -> Vec<(Range<usize>, InlinedElement)> {
    let mut found = find_includes(code);
    found.extend(find_anonymous_components(code));
    found.sort_by_key(|(range, _)| range.start);

    let mut elements: Vec<(Range<usize>, InlinedElement)> = Vec::with_capacity(found.len());
    for (range, element) in found {
        if elements.last().is_some_and(|(prev, _)| range.start < prev.end) {
            continue;
        }
        elements.push((range, element));
    }
    elements
}

fn find_includes(code: &str) -> Vec<(Range<usize>, InlinedElement)> {
    let Some(re) = VIEW_INCLUDE.as_ref() else {
        return Vec::new();
    };
    re.find_iter(code)
        .filter_map(|found| {
            let open = found.end() - 1;
            let call = balanced_prefix(&code[open..])?;
            let call_end = open + call.len();
            if !code[call_end..].starts_with(RENDER_CALL) {
                return None;
            }
            let args = split_arguments(&call[1..call.len() - 1])?;
            let view = args.first().and_then(|arg| string_literal_value(arg))?;
            let (data, extract) = include_data(args.get(1).map(String::as_str));
            let range = found.start()..call_end + RENDER_CALL.len();
            let element = InlinedElement::include(&code[range.clone()], view, data, extract);
            Some((range, element))
        })
        .collect()
}

fn find_anonymous_components(code: &str) -> Vec<(Range<usize>, InlinedElement)> {
    component_blocks(code)
        .into_iter()
        .filter(|block| block.class == ANONYMOUS_COMPONENT)
        .filter_map(|block| {
            let items = parse_array_literal(block.data?)?;
            let mut view = None;
            let mut data = Default::default();
            for item in items {
                match item.key.as_deref() {
                    Some("view") => view = string_literal_value(&item.value),
                    Some("data") => data = array_variables(&item.value),
                    _ => {}
                }
            }
            let element = InlinedElement::component(block.text(code), view?, data);
            Some((block.range, element))
        })
        .collect()
}
