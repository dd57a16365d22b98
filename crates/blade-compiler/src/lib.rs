//! Blade template compiler.
//!
//! Compiles Blade source into the mixed PHP and markup that Laravel's view
//! factory caches. Passes run in a fixed order: `@verbatim` and `@php` blocks
//! are set aside, comments are stripped, component tags are expanded, and then
//! directives and echoes are compiled outside existing PHP blocks.
//!
//! # Example
//!
//! ```ignore
//! use blade_compiler::{BladeCompiler, ComponentLookup};
//!
//! let compiler = BladeCompiler::new(lookup);
//! let php = compiler.compile_string("@if($user) {{ $user->name }} @endif")?;
//! ```

mod components;
mod directives;
mod echo;
pub mod error;
pub mod naming;
mod scan;

pub use components::{ANONYMOUS_COMPONENT, DYNAMIC_COMPONENT};
pub use error::{CompileError, CompileErrorCode, CompileResult};
pub use naming::{camel_case, component_class_name, studly_case};

use source_map::LocationMarker;

/// Resolves `<x-...>` tags to classes or anonymous views.
pub trait ComponentLookup {
    /// Fully-qualified class backing `<x-{name}>`, if one exists.
    fn component_class(&self, name: &str) -> Option<String>;

    /// Constructor parameter names of a component class, when known.
    fn constructor_parameters(&self, class: &str) -> Option<Vec<String>>;

    /// Whether a view with this dotted name exists.
    fn view_exists(&self, view: &str) -> bool;
}

impl<T: ComponentLookup + ?Sized> ComponentLookup for &T {
    fn component_class(&self, name: &str) -> Option<String> {
        (**self).component_class(name)
    }

    fn constructor_parameters(&self, class: &str) -> Option<Vec<String>> {
        (**self).constructor_parameters(class)
    }

    fn view_exists(&self, view: &str) -> bool {
        (**self).view_exists(view)
    }
}

/// An open block that changes how later directives compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Block {
    Loop { forelse: Option<usize> },
    ForelseEmpty,
    Switch(usize),
}

/// State carried across the passes of one compilation.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) blocks: Vec<Block>,
    pub(crate) forelse: usize,
    pub(crate) switches: usize,
    pub(crate) once: usize,
    pub(crate) livewire: usize,
    pub(crate) component_count: usize,
    /// Hashes of component tags still open.
    pub(crate) components: Vec<String>,
    pub(crate) footer: Vec<String>,
}

impl Session {
    pub(crate) fn pop_loop(&mut self) {
        if matches!(self.blocks.last(), Some(Block::Loop { .. })) {
            self.blocks.pop();
        }
    }
}

/// Blade compiler.
pub struct BladeCompiler<L> {
    lookup: L,
}

impl<L: ComponentLookup> BladeCompiler<L> {
    /// Create a new compiler.
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Get the component lookup.
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Compile Blade source to PHP.
    pub fn compile_string(&self, content: &str) -> CompileResult<String> {
        let mut session = Session::default();
        let mut raw_blocks = Vec::new();

        let content = store_raw_blocks(content, &mut raw_blocks);
        let content = strip_comments(&content);
        let content =
            components::compile_component_tags(&content, &self.lookup, &mut session)
                .map_err(|e| locate(e, &content))?;
        let content = directives::compile_statements(&content, &mut session)
            .map_err(|e| locate(e, &content))?;
        let mut content = echo::compile_echos(&content);

        for (i, block) in raw_blocks.iter().enumerate() {
            content = content.replace(&placeholder(i), block);
        }
        if !session.footer.is_empty() {
            content.push('\n');
            content.push_str(&session.footer.join("\n"));
        }
        tracing::trace!(
            components = session.component_count,
            raw_blocks = raw_blocks.len(),
            "compiled blade template"
        );
        Ok(content)
    }
}

fn locate(mut error: CompileError, input: &str) -> CompileError {
    let end = (error.span.start as usize).min(input.len());
    error.location = input
        .get(..end)
        .and_then(LocationMarker::find_last)
        .map(|marker| marker.location);
    error
}

fn placeholder(index: usize) -> String {
    format!("@__raw_block_{index}__@")
}

fn next_raw_block(text: &str) -> Option<(usize, &'static str, &'static str)> {
    let verbatim = text
        .find("@verbatim")
        .map(|at| (at, "@verbatim", "@endverbatim"));
    let php = text
        .match_indices("@php")
        .map(|(at, _)| at)
        .find(|&at| {
            let after = &text[at + 4..];
            !text[..at].ends_with('@')
                && !after.chars().next().is_some_and(scan::is_word_char)
                && !after.trim_start_matches([' ', '\t']).starts_with('(')
        })
        .map(|at| (at, "@php", "@endphp"));
    [verbatim, php]
        .into_iter()
        .flatten()
        .min_by_key(|(at, ..)| *at)
}

/// Replace `@verbatim` and `@php` blocks with placeholders.
fn store_raw_blocks(content: &str, blocks: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some((at, open, close)) = next_raw_block(rest) {
        let body_start = at + open.len();
        let Some(len) = rest[body_start..].find(close) else {
            break;
        };
        let body = &rest[body_start..body_start + len];
        out.push_str(&rest[..at]);
        out.push_str(&placeholder(blocks.len()));
        blocks.push(if open == "@php" {
            format!("<?php{body}?>")
        } else {
            body.to_string()
        });
        rest = &rest[body_start + len + close.len()..];
    }
    out.push_str(rest);
    out
}

fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(at) = rest.find("{{--") {
        let Some(len) = rest[at + 4..].find("--}}") else {
            break;
        };
        out.push_str(&rest[..at]);
        rest = &rest[at + 4 + len + 4..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use source_map::TemplateLocation;

    struct NoComponents;

    impl ComponentLookup for NoComponents {
        fn component_class(&self, _name: &str) -> Option<String> {
            None
        }

        fn constructor_parameters(&self, _class: &str) -> Option<Vec<String>> {
            None
        }

        fn view_exists(&self, view: &str) -> bool {
            view == "components.alert"
        }
    }

    fn compile(content: &str) -> CompileResult<String> {
        BladeCompiler::new(NoComponents).compile_string(content)
    }

    #[test]
    fn test_compile_if_and_foreach() {
        let source = "@if(isset($errors))\n<ul>\n@foreach($errors->all() as $error)\n<li>{{ $error }}</li>\n@endforeach\n</ul>\n@endif\n";
        assert_eq!(
            compile(source).unwrap(),
            "<?php if(isset($errors)): ?>\n<ul>\n<?php $__currentLoopData = $errors->all(); $__env->addLoop($__currentLoopData); foreach($__currentLoopData as $error): $__env->incrementLoopIndices(); $loop = $__env->getLastLoop(); ?>\n<li><?php echo e($error); ?></li>\n<?php endforeach; $__env->popLoop(); $loop = $__env->getLastLoop(); ?>\n</ul>\n<?php endif; ?>\n"
        );
    }

    #[test]
    fn test_output_parses_as_php() {
        let source = "@extends('layouts.app')\n@section('content')\n<x-alert type=\"info\">{{ $message }}</x-alert>\n@error('email') <span>{{ $message }}</span> @enderror\n@livewire('counter', ['start' => 1])\n@endsection\n";
        let php = compile(source).unwrap();
        assert!(php_syntax::parse(&php).is_ok(), "{php}");
        assert!(php.ends_with("->render(); ?>"));
    }

    #[test]
    fn test_raw_blocks_and_comments() {
        let source = "{{-- hidden {{ $x }} --}}@verbatim{{ $raw }} @if@endverbatim\n@php\n$a = 1;\n@endphp\n{{ $a }}";
        assert_eq!(
            compile(source).unwrap(),
            "{{ $raw }} @if\n<?php\n$a = 1;\n?>\n<?php echo e($a); ?>"
        );
    }

    #[test]
    fn test_inline_php_directive_is_not_a_block() {
        assert_eq!(compile("@php($a = 1)").unwrap(), "<?php ($a = 1); ?>");
    }

    #[test]
    fn test_error_carries_marker_location() {
        let source = "/** file: a.blade.php, line: 1 */<p>\n/** file: a.blade.php, line: 2 */<x-nope />";
        let err = compile(source).unwrap_err();
        assert_eq!(err.code, CompileErrorCode::UnknownComponent);
        assert_eq!(err.location, Some(TemplateLocation::new("a.blade.php", 2)));
    }
}
