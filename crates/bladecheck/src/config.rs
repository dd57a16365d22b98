//! Configuration loading and management.

use crate::cli::Args;
use blade_codegen::{
    class_variables, ClassReflector, CompilerOptions, FileViewFinder, FsReader, PhpType,
    SourceReflector, TemplateCompiler, TemplatePaths, VariableAndType,
};
use camino::Utf8PathBuf;
use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use phpstan_runner::AnalyzerConfig;
use serde::Deserialize;
use std::path::Path;

/// Project configuration file, relative to the workspace.
pub const CONFIG_FILE: &str = "bladecheck.json";

/// Compiler wired to the project's files.
pub type ProjectCompiler =
    TemplateCompiler<FileViewFinder<FsReader>, FsReader, SourceReflector<FsReader>>;

/// Contents of `bladecheck.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// View directories; `ns:dir` registers a `ns::` hint path.
    pub template_paths: Vec<String>,
    /// PSR-4 namespace prefix to directory.
    pub autoload: IndexMap<String, String>,
    pub known_classes: Vec<String>,
    pub component_namespace: Option<String>,
    pub livewire_namespace: Option<String>,
    /// Analyzer messages to drop, as regexes.
    pub ignore_errors: Vec<String>,
    pub analyzer: AnalyzerConfig,
    pub renders: Vec<RenderConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            template_paths: vec!["resources/views".to_string()],
            autoload: IndexMap::from([("App\\".to_string(), "app/".to_string())]),
            known_classes: Vec::new(),
            component_namespace: None,
            livewire_namespace: None,
            ignore_errors: Vec::new(),
            analyzer: AnalyzerConfig::default(),
            renders: Vec::new(),
        }
    }
}

/// One place in the application that renders a template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// View name, e.g. `users.index` or `mail::message`.
    pub template: String,
    pub host_file: String,
    #[serde(default = "default_host_line")]
    pub host_line: u32,
    /// Variable name to PHPDoc type.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    /// Component or Livewire class whose public properties the view sees.
    #[serde(default)]
    pub class: Option<String>,
}

fn default_host_line() -> u32 {
    1
}

impl RenderConfig {
    /// The explicitly configured variables, in order.
    pub fn variables(&self) -> Vec<VariableAndType> {
        self.variables
            .iter()
            .map(|(name, ty)| VariableAndType::new(name.as_str(), PhpType::parse(ty)))
            .collect()
    }

    /// The render's variables: properties of `class` first, then the
    /// configured variables, which win on a name clash.
    pub fn resolved_variables<C: ClassReflector + ?Sized>(
        &self,
        reflector: &C,
    ) -> Vec<VariableAndType> {
        let mut resolved = match &self.class {
            Some(class) => class_variables(reflector, class).unwrap_or_else(|| {
                tracing::warn!(class = %class, template = %self.template, "render class not found");
                Vec::new()
            }),
            None => Vec::new(),
        };
        for variable in self.variables() {
            match resolved.iter_mut().find(|v| v.name == variable.name) {
                Some(existing) => *existing = variable,
                None => resolved.push(variable),
            }
        }
        resolved
    }

    /// Identifies the render among all renders of a run.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.host_file, self.host_line, self.template)
    }
}

/// Configuration for a check run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root directory.
    pub workspace: Utf8PathBuf,
    pub project: ProjectConfig,
    /// Templates to skip, relative to the workspace.
    pub ignore: GlobSet,
}

impl Config {
    /// Load configuration from CLI arguments and workspace.
    pub fn load(workspace: &Path, args: &Args) -> Result<Self> {
        let workspace = Utf8PathBuf::from_path_buf(workspace.to_path_buf())
            .map_err(|path| miette!("workspace path is not UTF-8: {}", path.display()))?;

        let project = match &args.config {
            Some(path) => read_project_config(path)?,
            None => {
                let path = workspace.join(CONFIG_FILE);
                if path.exists() {
                    read_project_config(path.as_std_path())?
                } else {
                    tracing::warn!(path = %path, "no configuration file, using defaults");
                    ProjectConfig::default()
                }
            }
        };

        let ignore = build_globset(&args.ignore)?;

        Ok(Self {
            workspace,
            project,
            ignore,
        })
    }

    /// Whether a template file should be skipped.
    pub fn is_ignored(&self, template: &Path) -> bool {
        let relative = template
            .strip_prefix(self.workspace.as_std_path())
            .unwrap_or(template);
        self.ignore.is_match(relative)
    }

    /// Build the template compiler for this project.
    pub fn compiler(&self) -> ProjectCompiler {
        let mut roots = Vec::new();
        let mut hints = Vec::new();
        for entry in &self.project.template_paths {
            match entry.split_once(':') {
                Some((namespace, dir)) if !namespace.is_empty() && !dir.starts_with('\\') => {
                    hints.push((namespace.to_string(), self.workspace.join(dir)))
                }
                _ => roots.push(self.workspace.join(entry)),
            }
        }

        let mut finder = FileViewFinder::new(
            FsReader,
            roots.iter().map(|root| root.clone().into_std_path_buf()).collect(),
        );
        for (namespace, dir) in &hints {
            finder.add_namespace(namespace.as_str(), dir.clone().into_std_path_buf());
        }

        let reflector = self.project.autoload.iter().fold(
            SourceReflector::new(FsReader).with_known_classes(&self.project.known_classes),
            |reflector, (prefix, dir)| {
                reflector.with_autoload(prefix, self.workspace.join(dir).into_std_path_buf())
            },
        );

        let paths = TemplatePaths::new(
            self.project
                .template_paths
                .iter()
                .map(|entry| template_root(entry)),
        );

        let mut options = CompilerOptions::default();
        if let Some(namespace) = &self.project.component_namespace {
            options.component_namespace = namespace.clone();
        }
        if let Some(namespace) = &self.project.livewire_namespace {
            options.livewire_namespace = namespace.clone();
        }

        TemplateCompiler::new(finder, FsReader, reflector, paths).with_options(options)
    }
}

fn template_root(entry: &str) -> &str {
    match entry.split_once(':') {
        Some((namespace, dir)) if !namespace.is_empty() && !dir.starts_with('\\') => dir,
        _ => entry,
    }
}

fn read_project_config(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid ignore pattern {pattern}"))?;
        builder.add(glob);
    }
    builder.build().into_diagnostic()
}
