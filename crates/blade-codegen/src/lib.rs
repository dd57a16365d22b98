//! Flattens Blade templates into one PHP unit for static analysis.
//!
//! A template is compiled by the Blade first pass, its PHP is extracted and
//! normalized, and every `@include`, layout and anonymous component it uses is
//! inlined recursively inside closures that reproduce Blade's variable
//! scoping. Location markers added before compilation let the resulting
//! [`LineMap`] send every generated line back to the template line it came
//! from.
//!
//! # Example
//!
//! ```ignore
//! use blade_codegen::{FileViewFinder, FsReader, SourceReflector, TemplateCompiler, TemplatePaths};
//!
//! let finder = FileViewFinder::new(FsReader, vec!["resources/views".into()]);
//! let reflector = SourceReflector::new(FsReader).with_autoload("App\\", "app/");
//! let compiler = TemplateCompiler::new(finder, FsReader, reflector, TemplatePaths::new(["resources/views"]));
//! let unit = compiler.compile_template(path, &content, &variables);
//! ```

pub mod annotate;
pub mod class_properties;
pub mod components;
pub mod context;
pub mod decorate;
pub mod element;
pub mod engine;
pub mod error;
pub mod extract;
pub mod finder;
pub mod helpers;
mod inline;
pub mod line_resolver;
pub mod reflect;
pub mod visitors;

pub use annotate::{annotate, TemplatePaths};
pub use class_properties::class_variables;
pub use components::resolve_components;
pub use context::CompileContext;
pub use decorate::{PhpType, VariableAndType};
pub use element::{ChildScope, InlinedElement};
pub use error::{CodegenError, CodegenResult, StructuralError, StructuralErrorCode};
pub use extract::extract;
pub use finder::{FileReader, FileViewFinder, FsReader, MemoryReader, TemplateFinder};
pub use helpers::LOOP_STUB;
pub use reflect::{ClassReflector, SourceReflector, StaticReflector};
pub use source_map::{LineMap, TemplateLocation};

use helpers::DEFAULT_VARIABLES;
use php_syntax::{parse, print_file};
use std::path::Path;

/// Namespaces used to turn component names into classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Namespace of class-backed `<x-...>` components.
    pub component_namespace: String,
    /// Namespace of Livewire components.
    pub livewire_namespace: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            component_namespace: "App\\View\\Components".to_string(),
            livewire_namespace: "App\\Livewire".to_string(),
        }
    }
}

/// A flattened template ready for analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Complete PHP file.
    pub host_code: String,
    /// Generated line to template location.
    pub line_map: LineMap,
    pub compile_errors: Vec<StructuralError>,
}

/// Compiles templates against a project's views and classes.
///
/// Holds no per-compile state; one compiler can serve many threads.
pub struct TemplateCompiler<F, R, C> {
    finder: F,
    reader: R,
    reflector: C,
    paths: TemplatePaths,
    options: CompilerOptions,
}

impl<F, R, C> TemplateCompiler<F, R, C>
where
    F: TemplateFinder,
    R: FileReader,
    C: ClassReflector,
{
    /// A compiler with the default component namespaces.
    pub fn new(finder: F, reader: R, reflector: C, paths: TemplatePaths) -> Self {
        Self {
            finder,
            reader,
            reflector,
            paths,
            options: CompilerOptions::default(),
        }
    }

    /// Replace the component namespaces.
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Component namespaces in use.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Resolves view names to template files.
    pub fn finder(&self) -> &F {
        &self.finder
    }

    /// Template roots used to name templates in location markers.
    pub fn paths(&self) -> &TemplatePaths {
        &self.paths
    }

    /// Class metadata used for components and class-backed renders.
    pub fn reflector(&self) -> &C {
        &self.reflector
    }

    /// Compile `content`, the template stored at `path`, rendered with
    /// `variables`.
    ///
    /// Problems with the template or anything it includes are collected in
    /// [`CompiledUnit::compile_errors`]; they never abort the compile.
    pub fn compile_template(
        &self,
        path: &Path,
        content: &str,
        variables: &[VariableAndType],
    ) -> CompiledUnit {
        let mut ctx = CompileContext::new();
        let mut variables = variables.to_vec();
        for (name, class) in DEFAULT_VARIABLES {
            if !variables.iter().any(|v| v.name == *name) {
                variables.push(VariableAndType::new(*name, PhpType::object(*class)));
            }
        }
        let visible: Vec<String> = variables.iter().map(|v| v.name.clone()).collect();

        let code = self.inline_include(&mut ctx, path, content, &visible, true);
        let code = resolve_components(&code, &self.reflector);

        let mut stmts = match parse(&code) {
            Ok(stmts) => stmts,
            Err(err) => {
                let relative = self.paths.relative_path(path);
                tracing::warn!(template = %relative, error = %err, "flattened code does not parse");
                ctx.error(
                    format!("View [{relative}] contains syntax errors."),
                    StructuralErrorCode::Parsing,
                    TemplateLocation::new(relative.clone(), 1),
                );
                Vec::new()
            }
        };
        let mut file = visitors::hoist_imports(&mut stmts);
        file.extend(decorate::var_docs(&variables));
        file.append(&mut stmts);

        let host_code = print_file(&file);
        let line_map = line_resolver::resolve_stmts(&parse(&host_code).unwrap_or_default());
        CompiledUnit {
            host_code,
            line_map,
            compile_errors: ctx.into_errors(),
        }
    }

    /// Read a template through the reader and compile it.
    pub fn compile_file(
        &self,
        path: &Path,
        variables: &[VariableAndType],
    ) -> CodegenResult<CompiledUnit> {
        let content = self.reader.read_to_string(path)?;
        Ok(self.compile_template(path, &content, variables))
    }

    /// Find a view by name and compile it.
    pub fn compile_view(
        &self,
        view: &str,
        variables: &[VariableAndType],
    ) -> CodegenResult<CompiledUnit> {
        let path = self.finder.find(view)?;
        self.compile_file(&path, variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use php_syntax::Parameter;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    type TestCompiler = TemplateCompiler<FileViewFinder<MemoryReader>, MemoryReader, StaticReflector>;

    const HEADER: &str = "<?php\n\n/** @var Illuminate\\View\\Factory $__env */\n/** @var Illuminate\\Support\\ViewErrorBag $errors */\n";

    fn compiler_with(
        reader: MemoryReader,
        reflector: StaticReflector,
    ) -> TestCompiler {
        let finder = FileViewFinder::new(reader.clone(), vec![PathBuf::from("/views")]);
        TemplateCompiler::new(finder, reader, reflector, TemplatePaths::new(["/views"]))
    }

    fn compiler(files: &[(&str, &str)]) -> TestCompiler {
        let mut reader = MemoryReader::new();
        for (path, content) in files {
            reader.insert(format!("/views/{path}"), *content);
        }
        compiler_with(reader, StaticReflector::new())
    }

    fn compile(compiler: &TestCompiler, content: &str) -> CompiledUnit {
        compiler.compile_template(Path::new("foo.blade.php"), content, &[])
    }

    const NESTED_IF_AND_FOREACH: &str = "@if (isset($errors))
    @if (count($errors) > 0)
        <div class=\"alert alert-danger\">
            <ul>
                @foreach ($errors->all() as $error)
                    <li>{{ $error }}</li>
                @endforeach
            </ul>
        </div>
    @endif
@endif
";

    #[test]
    fn test_nested_if_and_foreach() {
        let unit = compile(&compiler(&[]), NESTED_IF_AND_FOREACH);
        let expected = format!(
            "{HEADER}{}",
            r#"/** file: foo.blade.php, line: 1 */
if (isset($errors)) {
    /** file: foo.blade.php, line: 2 */
    if (count($errors) > 0) {
        /** file: foo.blade.php, line: 5 */
        $__currentLoopData = $errors->all();
        $__env->addLoop($__currentLoopData);
        foreach ($__currentLoopData as $error) {
            $__env->incrementLoopIndices();
            $loop = new \Bladecheck\Runtime\Loop();
            /** file: foo.blade.php, line: 6 */
            echo e($error);
            /** file: foo.blade.php, line: 7 */
        }
        $__env->popLoop();
        $loop = null;
        /** file: foo.blade.php, line: 10 */
    }
    /** file: foo.blade.php, line: 11 */
}
"#
        );
        assert_eq!(unit.host_code, expected);
        assert!(unit.compile_errors.is_empty());
    }

    #[test]
    fn test_line_map_round_trip() {
        let unit = compile(&compiler(&[]), NESTED_IF_AND_FOREACH);
        let echo_line = unit
            .host_code
            .lines()
            .position(|line| line.trim() == "echo e($error);")
            .unwrap() as u32
            + 1;
        assert_eq!(
            unit.line_map.get(echo_line),
            Some(&TemplateLocation::new("foo.blade.php", 6))
        );
        let first_if = unit
            .host_code
            .lines()
            .position(|line| line == "if (isset($errors)) {")
            .unwrap() as u32
            + 1;
        assert_eq!(unit.line_map.resolve(first_if), TemplateLocation::new("foo.blade.php", 1));
        assert_eq!(unit.line_map.resolve(1), TemplateLocation::unknown());
    }

    #[test]
    fn test_idempotent() {
        let compiler = compiler(&[("partials/row.blade.php", "<td>{{ $cell }}</td>\n")]);
        let content = "@foreach ($rows as $row)\n@include('partials.row', ['cell' => $row])\n@endforeach\n";
        assert_eq!(compile(&compiler, content), compile(&compiler, content));
    }

    /// Generated lines other than the header, `@var` docs and location markers.
    fn statement_lines(code: &str) -> Vec<String> {
        code.lines()
            .map(str::trim_end)
            .filter(|line| {
                let line = line.trim_start();
                !line.is_empty()
                    && line != "<?php"
                    && !line.starts_with("/** file: ")
                    && !line.starts_with("/** @var ")
            })
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_markers_do_not_change_statements() {
        let templates = [
            NESTED_IF_AND_FOREACH,
            "<p>{{ $title }}</p>\n{!! $body !!}\n",
            "@unless ($user->isAdmin())\n    <b>{{ $user->name }}</b>\n@else\n    <i>admin</i>\n@endunless\n",
            "@forelse ($items as $key => $item)\n    {{ $key }}: {{ $item }}\n    @if ($loop->last) end @endif\n@empty\n    none\n@endforelse\n",
            "@isset($records)\n    @for ($i = 0; $i < 3; $i++)\n        {{ $records[$i] }}\n    @endfor\n@endisset\n@php($total = count($records ?? []))\n{{ $total }}\n",
        ];
        let compiler = compiler(&[]);
        for template in templates {
            let unit = compile(&compiler, template);
            assert!(unit.compile_errors.is_empty(), "{template}");

            let lookup = engine::ProjectComponents::new(
                &compiler.finder,
                &compiler.reflector,
                &compiler.options.component_namespace,
            );
            let compiled = blade_compiler::BladeCompiler::new(lookup)
                .compile_string(template)
                .unwrap();
            let mut stmts = php_syntax::parse_code(&extract(&compiled, false)).unwrap();
            visitors::rewrite(&mut stmts);

            assert_eq!(
                statement_lines(&unit.host_code),
                statement_lines(&php_syntax::print(&stmts)),
                "{template}"
            );
        }
    }

    #[test]
    fn test_when_and_unless_with_missing_view() {
        let unit = compile(
            &compiler(&[]),
            "@includeWhen($condition, 'view.name', ['foo' => 'bar'])\n@includeUnless(!$condition, 'view.name', ['foo' => 'bar'])\n",
        );
        let expected = format!(
            "{HEADER}{}",
            r#"/** file: foo.blade.php, line: 1 */
if ($condition) {
    function () use ($__env, $errors) {
        $foo = 'bar';
    };
}
/** file: foo.blade.php, line: 2 */
if (!!$condition) {
    function () use ($__env, $errors) {
        $foo = 'bar';
    };
}
"#
        );
        assert_eq!(unit.host_code, expected);
        assert_eq!(
            unit.compile_errors,
            vec![
                StructuralError::new(
                    "View [view.name] not found.",
                    StructuralErrorCode::Missing,
                    TemplateLocation::new("foo.blade.php", 1),
                ),
                StructuralError::new(
                    "View [view.name] not found.",
                    StructuralErrorCode::Missing,
                    TemplateLocation::new("foo.blade.php", 2),
                ),
            ]
        );
    }

    #[test]
    fn test_include_scoping() {
        let compiler = compiler(&[("partials/title.blade.php", "<h1>{{ $foo }}</h1>\n")]);
        let unit = compiler.compile_template(
            Path::new("/views/page.blade.php"),
            "@include('partials.title', ['foo' => 'bar'])\n",
            &[VariableAndType::new("user", PhpType::object("App\\Models\\User"))],
        );
        let expected = r#"<?php

/** @var App\Models\User $user */
/** @var Illuminate\View\Factory $__env */
/** @var Illuminate\Support\ViewErrorBag $errors */
/** file: page.blade.php, line: 1 */
function () use ($user, $__env, $errors) {
    $foo = 'bar';
    /** file: partials/title.blade.php, line: 1 */
    echo e($foo);
};
"#;
        assert_eq!(unit.host_code, expected);
        assert!(unit.compile_errors.is_empty());
        let echo_line = unit
            .host_code
            .lines()
            .position(|line| line.trim() == "echo e($foo);")
            .unwrap() as u32
            + 1;
        assert_eq!(
            unit.line_map.get(echo_line),
            Some(&TemplateLocation::new("partials/title.blade.php", 1))
        );
    }

    #[test]
    fn test_component_props_default() {
        let compiler = compiler(&[(
            "components/button.blade.php",
            "@props(['size' => 'large'])\n<button>{{ $size }}</button>\n",
        )]);
        let unit = compile(&compiler, "<x-button />\n");
        assert!(unit.compile_errors.is_empty(), "{:?}", unit.compile_errors);
        assert!(unit.host_code.contains("$size = 'large';"));
        assert!(unit
            .host_code
            .contains("function () use ($__env, $size, $slot, $attributes) {"));
        assert!(unit
            .host_code
            .contains("/** file: components/button.blade.php, line: 2 */"));
        assert!(!unit.host_code.contains("renderComponent"));
        assert!(php_syntax::parse(&unit.host_code).is_ok());
    }

    #[test]
    fn test_missing_view_does_not_abort_siblings() {
        let compiler = compiler(&[("partials/ok.blade.php", "{{ $ok }}\n")]);
        let unit = compile(
            &compiler,
            "@include('partials.missing')\n@include('partials.ok', ['ok' => 1])\n",
        );
        assert_eq!(unit.compile_errors.len(), 1);
        assert_eq!(unit.compile_errors[0].message, "View [partials.missing] not found.");
        assert_eq!(unit.compile_errors[0].code, StructuralErrorCode::Missing);
        assert!(unit.host_code.contains("echo e($ok);"));
    }

    #[test]
    fn test_recursive_include() {
        let compiler = compiler(&[(
            "tree.blade.php",
            "<li>{{ $node }}</li>\n@include('tree', ['node' => $node])\n",
        )]);
        let unit = compiler
            .compile_view("tree", &[VariableAndType::new("node", PhpType::Mixed)])
            .unwrap();
        assert_eq!(
            unit.compile_errors,
            vec![StructuralError::new(
                "View [tree] is already being rendered.",
                StructuralErrorCode::Recursion,
                TemplateLocation::new("tree.blade.php", 2),
            )]
        );
        assert_eq!(unit.host_code.matches("echo e($node);").count(), 1);
    }

    #[test]
    fn test_mutual_include_cycle() {
        let compiler = compiler(&[
            ("a.blade.php", "<p>{{ $x }}</p>\n@include('b')\n"),
            ("b.blade.php", "<span>{{ $x }}</span>\n@include('a')\n"),
        ]);
        let unit = compiler
            .compile_view("a", &[VariableAndType::new("x", PhpType::Mixed)])
            .unwrap();
        assert_eq!(
            unit.compile_errors,
            vec![StructuralError::new(
                "View [a] is already being rendered.",
                StructuralErrorCode::Recursion,
                TemplateLocation::new("b.blade.php", 2),
            )]
        );
        assert_eq!(unit.host_code.matches("echo e($x);").count(), 2);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let unit = compile(&compiler(&[]), "<p>\n{{ $a + }}\n</p>\n");
        assert_eq!(
            unit.compile_errors,
            vec![StructuralError::new(
                "View [foo.blade.php] contains syntax errors.",
                StructuralErrorCode::Parsing,
                TemplateLocation::new("foo.blade.php", 2),
            )]
        );
        assert_eq!(unit.host_code, HEADER);
    }

    #[test]
    fn test_livewire_component() {
        let reflector = StaticReflector::new().with_method(
            "App\\View\\Components\\WiredComponent",
            "mount",
            vec![Parameter {
                name: "b".to_string(),
                type_name: Some("string".to_string()),
                builtin: true,
                nullable: false,
                has_default: false,
            }],
        );
        let compiler = compiler_with(MemoryReader::new(), reflector).with_options(CompilerOptions {
            livewire_namespace: "App\\View\\Components".to_string(),
            ..CompilerOptions::default()
        });
        let unit = compile(&compiler, "<livewire:wired-component :b=\"$b\" c=\"{{$c}}\"/>\n");
        let expected = format!(
            "{HEADER}{}",
            r#"/** file: foo.blade.php, line: 1 */
$component = new App\View\Components\WiredComponent();
$component->mount(b: $b);
$component->c = '' . e($c) . '';
"#
        );
        assert_eq!(unit.host_code, expected);
    }

    #[test]
    fn test_imports_are_hoisted() {
        let unit = compile(
            &compiler(&[]),
            "@use('App\\Models\\User')\n{{ User::count() }}\n",
        );
        assert!(unit.host_code.starts_with("<?php\n\nuse App\\Models\\User;\n/** @var"));
    }
}
