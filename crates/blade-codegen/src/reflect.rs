//! Class metadata for component and Livewire argument synthesis.

use crate::finder::FileReader;
use php_syntax::{ClassDecl, Parameter};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;

/// Answers questions about PHP classes of the analyzed project.
pub trait ClassReflector: Send + Sync {
    /// Whether a class or interface with this fully-qualified name exists.
    fn class_exists(&self, class: &str) -> bool;

    /// Parameters of `class::method`, or `None` when the class or method is
    /// unknown.
    fn method_parameters(&self, class: &str, method: &str) -> Option<Vec<Parameter>>;

    /// Parent and public properties of a project class, or `None` when its
    /// declaration is not available.
    fn class_declaration(&self, class: &str) -> Option<ClassDecl>;
}

impl<T: ClassReflector + ?Sized> ClassReflector for &T {
    fn class_exists(&self, class: &str) -> bool {
        (**self).class_exists(class)
    }

    fn method_parameters(&self, class: &str, method: &str) -> Option<Vec<Parameter>> {
        (**self).method_parameters(class, method)
    }

    fn class_declaration(&self, class: &str) -> Option<ClassDecl> {
        (**self).class_declaration(class)
    }
}

fn normalize(class: &str) -> &str {
    class.trim().trim_start_matches('\\')
}

/// Reflects classes by reading their source through a PSR-4 autoload map.
#[derive(Debug, Clone)]
pub struct SourceReflector<R> {
    reader: R,
    /// Namespace prefix (with trailing `\`) to directory, longest first.
    autoload: Vec<(String, PathBuf)>,
    /// Classes assumed to exist without a source file, such as framework
    /// classes outside the autoload map.
    known_classes: FxHashSet<String>,
}

impl<R: FileReader> SourceReflector<R> {
    /// A reflector with no autoload prefixes.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            autoload: Vec::new(),
            known_classes: FxHashSet::default(),
        }
    }

    /// Map a namespace prefix such as `App\` to a directory.
    pub fn with_autoload(mut self, prefix: &str, dir: impl Into<PathBuf>) -> Self {
        let mut prefix = normalize(prefix).trim_end_matches('\\').to_string();
        if !prefix.is_empty() {
            prefix.push('\\');
        }
        self.autoload.push((prefix, dir.into()));
        self.autoload.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Treat these classes as existing.
    pub fn with_known_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.known_classes
            .extend(classes.into_iter().map(|c| normalize(c.as_ref()).to_string()));
        self
    }

    /// Candidate source files for a class, in autoload order.
    pub fn class_files(&self, class: &str) -> Vec<PathBuf> {
        let class = normalize(class);
        self.autoload
            .iter()
            .filter_map(|(prefix, dir)| {
                let rest = class.strip_prefix(prefix.as_str())?;
                Some(dir.join(format!("{}.php", rest.replace('\\', "/"))))
            })
            .collect()
    }

    fn class_file(&self, class: &str) -> Option<PathBuf> {
        self.class_files(class)
            .into_iter()
            .find(|path| self.reader.exists(path))
    }

    fn class_source(&self, class: &str) -> Option<String> {
        let path = self.class_file(class)?;
        match self.reader.read_to_string(&path) {
            Ok(source) => Some(source),
            Err(err) => {
                tracing::warn!(class, error = %err, "could not read class source");
                None
            }
        }
    }
}

impl<R: FileReader> ClassReflector for SourceReflector<R> {
    fn class_exists(&self, class: &str) -> bool {
        self.known_classes.contains(normalize(class)) || self.class_file(class).is_some()
    }

    fn method_parameters(&self, class: &str, method: &str) -> Option<Vec<Parameter>> {
        let source = self.class_source(class)?;
        match php_syntax::method_parameters(&source, method) {
            Ok(params) => params,
            Err(err) => {
                tracing::warn!(class, method, error = %err, "could not parse class source");
                None
            }
        }
    }

    fn class_declaration(&self, class: &str) -> Option<ClassDecl> {
        let source = self.class_source(class)?;
        match php_syntax::class_declaration(&source) {
            Ok(decl) => decl,
            Err(err) => {
                tracing::warn!(class, error = %err, "could not parse class source");
                None
            }
        }
    }
}

/// In-memory class metadata.
#[derive(Debug, Clone, Default)]
pub struct StaticReflector {
    classes: FxHashMap<String, FxHashMap<String, Vec<Parameter>>>,
    declarations: FxHashMap<String, ClassDecl>,
}

impl StaticReflector {
    /// A reflector that knows no classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class without methods.
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.entry(normalize(class).to_string()).or_default();
        self
    }

    /// Register a parsed class declaration under its own name.
    pub fn with_declaration(mut self, decl: ClassDecl) -> Self {
        let name = normalize(&decl.name).to_string();
        self.classes.entry(name.clone()).or_default();
        self.declarations.insert(name, decl);
        self
    }

    /// Register `class::method` with these parameters.
    pub fn with_method(mut self, class: &str, method: &str, params: Vec<Parameter>) -> Self {
        self.classes
            .entry(normalize(class).to_string())
            .or_default()
            .insert(method.to_ascii_lowercase(), params);
        self
    }
}

impl ClassReflector for StaticReflector {
    fn class_exists(&self, class: &str) -> bool {
        self.classes.contains_key(normalize(class))
    }

    fn method_parameters(&self, class: &str, method: &str) -> Option<Vec<Parameter>> {
        self.classes
            .get(normalize(class))?
            .get(&method.to_ascii_lowercase())
            .cloned()
    }

    fn class_declaration(&self, class: &str) -> Option<ClassDecl> {
        self.declarations.get(normalize(class)).cloned()
    }
}
