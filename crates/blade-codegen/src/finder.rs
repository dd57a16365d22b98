//! Locating and reading view files.

use crate::error::{CodegenError, CodegenResult};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Reads template and class source files.
pub trait FileReader: Send + Sync {
    fn read_to_string(&self, path: &Path) -> CodegenResult<String>;

    fn exists(&self, path: &Path) -> bool;
}

/// Resolves dotted view names to files.
pub trait TemplateFinder: Send + Sync {
    fn find(&self, view: &str) -> CodegenResult<PathBuf>;
}

impl<T: FileReader + ?Sized> FileReader for &T {
    fn read_to_string(&self, path: &Path) -> CodegenResult<String> {
        (**self).read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

impl<T: TemplateFinder + ?Sized> TemplateFinder for &T {
    fn find(&self, view: &str) -> CodegenResult<PathBuf> {
        (**self).find(view)
    }
}

/// Reads from the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read_to_string(&self, path: &Path) -> CodegenResult<String> {
        std::fs::read_to_string(path).map_err(|source| CodegenError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory files, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: FxHashMap<PathBuf, String>,
}

impl MemoryReader {
    /// An empty in-memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Builder form of [`MemoryReader::insert`].
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }
}

impl FileReader for MemoryReader {
    fn read_to_string(&self, path: &Path) -> CodegenResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CodegenError::FileNotFound {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

const HINT_DELIMITER: &str = "::";

/// Laravel-style view finder over base directories and `ns::` hint paths.
#[derive(Debug, Clone)]
pub struct FileViewFinder<R = FsReader> {
    reader: R,
    paths: Vec<PathBuf>,
    hints: IndexMap<String, Vec<PathBuf>>,
    extensions: Vec<String>,
}

impl<R: FileReader> FileViewFinder<R> {
    /// Search `paths` in order for dotted view names.
    pub fn new(reader: R, paths: Vec<PathBuf>) -> Self {
        Self {
            reader,
            paths,
            hints: IndexMap::new(),
            extensions: vec!["blade.php".to_string(), "php".to_string()],
        }
    }

    /// Register a directory for views named `namespace::...`.
    pub fn add_namespace(&mut self, namespace: impl Into<String>, path: impl Into<PathBuf>) {
        self.hints.entry(namespace.into()).or_default().push(path.into());
    }

    /// Directories searched for non-namespaced views.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn find_in_paths(&self, view: &str, name: &str, paths: &[PathBuf]) -> CodegenResult<PathBuf> {
        let relative = name.replace('.', "/");
        let relative = relative.as_str();
        paths
            .iter()
            .flat_map(|dir| {
                self.extensions
                    .iter()
                    .map(move |ext| dir.join(format!("{relative}.{ext}")))
            })
            .find(|candidate| self.reader.exists(candidate))
            .ok_or_else(|| CodegenError::ViewNotFound(view.to_string()))
    }
}

impl<R: FileReader> TemplateFinder for FileViewFinder<R> {
    fn find(&self, view: &str) -> CodegenResult<PathBuf> {
        let view = view.trim();
        match view.split_once(HINT_DELIMITER) {
            Some((namespace, name)) => {
                let paths = self
                    .hints
                    .get(namespace)
                    .ok_or_else(|| CodegenError::UnknownNamespace(namespace.to_string()))?;
                self.find_in_paths(view, name, paths)
            }
            None => self.find_in_paths(view, view, &self.paths),
        }
    }
}
