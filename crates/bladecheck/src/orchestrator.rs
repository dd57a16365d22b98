//! Orchestrator for running template checks.

use crate::cli::Args;
use crate::config::{Config, ProjectCompiler, RenderConfig};
use crate::output::OutputFormatter;
use blade_codegen::{
    CompiledUnit, StructuralError, StructuralErrorCode, TemplateFinder, TemplateLocation,
};
use blade_diagnostics::{project_diagnostics, Diagnostic, ErrorFilter, ProjectedDiagnostic};
use miette::{IntoDiagnostic, Result, WrapErr};
use phpstan_runner::{AnalysisReport, PhpstanRunner, ScratchDir};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Result of a check run.
#[derive(Debug, Default)]
pub struct CheckResult {
    /// Number of renders checked.
    pub render_count: usize,
    /// Number of errors.
    pub error_count: usize,
    /// Time taken.
    pub duration_ms: u64,
}

/// A render after compilation.
struct CompiledRender<'a> {
    render: &'a RenderConfig,
    unit: CompiledUnit,
    /// Where the generated file was written.
    path: PathBuf,
}

/// Orchestrator for running bladecheck.
pub struct Orchestrator {
    config: Config,
    args: Args,
    formatter: OutputFormatter,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(workspace: PathBuf, args: Args) -> Result<Self> {
        let config = Config::load(&workspace, &args)?;
        let formatter = OutputFormatter::new(args.output);

        Ok(Self {
            config,
            args,
            formatter,
        })
    }

    /// Run a single check.
    pub async fn run_single_check(&mut self) -> Result<CheckResult> {
        let start = Instant::now();
        let compiler = self.config.compiler();
        let filter = ErrorFilter::with_patterns(&self.config.project.ignore_errors)
            .into_diagnostic()
            .wrap_err("Invalid ignoreErrors pattern")?;
        let scratch = match &self.args.emit_php {
            Some(dir) => ScratchDir::at(dir),
            None => ScratchDir::temporary(),
        }
        .into_diagnostic()?;

        let renders = self.selected_renders(&compiler);
        tracing::debug!(renders = renders.len(), "compiling templates");
        let compiled = self.compile_renders(&compiler, &renders, &scratch)?;
        let compile_ms = start.elapsed().as_millis();

        let report = if self.args.skip_analysis {
            AnalysisReport::default()
        } else {
            let paths: Vec<PathBuf> = compiled.iter().map(|c| c.path.clone()).collect();
            self.run_analysis(&paths, &scratch).await?
        };
        let analysis_ms = start.elapsed().as_millis() - compile_ms;

        let mut diagnostics: Vec<ProjectedDiagnostic> = Vec::new();
        for entry in &compiled {
            let found: Vec<Diagnostic> = report.diagnostics_for(&entry.path).to_vec();
            diagnostics.extend(project_diagnostics(
                &filter.filter(found),
                &entry.unit,
                &entry.render.host_file,
                entry.render.host_line,
            ));
        }

        let error_count = diagnostics.len() + report.errors.len();
        let shown = self.args.max_errors.unwrap_or(usize::MAX);
        for diagnostic in diagnostics.iter().take(shown) {
            self.formatter.print_diagnostic(diagnostic);
        }
        for message in &report.errors {
            self.formatter.print_general_error(message);
        }
        if diagnostics.len() > shown {
            eprintln!("... and {} more", diagnostics.len() - shown);
        }

        let check_result = CheckResult {
            render_count: compiled.len(),
            error_count,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if self.args.timings {
            eprintln!("\nTiming: compile {compile_ms}ms, analysis {analysis_ms}ms");
        }

        self.formatter.print_summary(&check_result);

        Ok(check_result)
    }

    /// Run in watch mode.
    pub async fn run_watch_mode(&mut self) -> Result<()> {
        use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
        use std::sync::mpsc::channel;
        use std::time::Duration;

        eprintln!("Starting watch mode...\n");

        if let Err(err) = self.run_single_check().await {
            eprintln!("{err:?}");
        }

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            NotifyConfig::default().with_poll_interval(Duration::from_millis(500)),
        )
        .into_diagnostic()?;

        watcher
            .watch(self.config.workspace.as_std_path(), RecursiveMode::Recursive)
            .into_diagnostic()?;

        loop {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    let should_recheck = event.paths.iter().any(|p| self.is_watched(p));
                    if should_recheck {
                        if !self.args.preserve_watch_output {
                            print!("\x1B[2J\x1B[1;1H");
                        }

                        eprintln!("File change detected. Rerunning...\n");
                        if let Err(err) = self.run_single_check().await {
                            eprintln!("{err:?}");
                        }
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(())
    }

    /// PHP sources and the configuration file, excluding dependencies and
    /// emitted code.
    fn is_watched(&self, path: &Path) -> bool {
        let relative = path
            .strip_prefix(self.config.workspace.as_std_path())
            .unwrap_or(path);
        if relative.starts_with("vendor") || relative.starts_with("node_modules") {
            return false;
        }
        if let Some(emit) = &self.args.emit_php {
            let emit = self.config.workspace.as_std_path().join(emit);
            if path.starts_with(&emit) {
                return false;
            }
        }
        path.extension().is_some_and(|e| e == "php")
            || path.file_name().is_some_and(|n| n == crate::config::CONFIG_FILE)
    }

    /// Renders whose template is not ignored.
    fn selected_renders(&self, compiler: &ProjectCompiler) -> Vec<&RenderConfig> {
        self.config
            .project
            .renders
            .iter()
            .filter(|render| match compiler.finder().find(&render.template) {
                Ok(path) if self.config.is_ignored(&path) => {
                    tracing::debug!(template = %render.template, "ignored");
                    false
                }
                _ => true,
            })
            .collect()
    }

    /// Compile every render in parallel and write the generated files.
    fn compile_renders<'a>(
        &self,
        compiler: &ProjectCompiler,
        renders: &[&'a RenderConfig],
        scratch: &ScratchDir,
    ) -> Result<Vec<CompiledRender<'a>>> {
        renders
            .par_iter()
            .map(|render| {
                let unit = compile_render(compiler, render);
                let path = scratch
                    .write_compiled(&render.key(), &unit.host_code)
                    .into_diagnostic()?;
                // PHPStan reports canonical paths.
                let path = std::fs::canonicalize(&path).unwrap_or(path);
                Ok(CompiledRender {
                    render: *render,
                    unit,
                    path,
                })
            })
            .collect()
    }

    async fn run_analysis(&self, paths: &[PathBuf], scratch: &ScratchDir) -> Result<AnalysisReport> {
        let runner = PhpstanRunner::new(&self.config.workspace, self.config.project.analyzer.clone())
            .into_diagnostic()?;
        let stub = scratch.write_loop_stub().into_diagnostic()?;
        runner
            .analyse(paths, &stub)
            .await
            .into_diagnostic()
            .wrap_err("PHPStan analysis failed")
    }
}

/// Compile one render. A template that cannot be loaded becomes a structural
/// error on an empty unit.
fn compile_render(compiler: &ProjectCompiler, render: &RenderConfig) -> CompiledUnit {
    let variables = render.resolved_variables(compiler.reflector());
    match compiler.compile_view(&render.template, &variables) {
        Ok(unit) => unit,
        Err(err) => {
            tracing::warn!(template = %render.template, error = %err, "template not compiled");
            CompiledUnit {
                compile_errors: vec![StructuralError::new(
                    err.to_string(),
                    StructuralErrorCode::Missing,
                    TemplateLocation::unknown(),
                )],
                ..Default::default()
            }
        }
    }
}
