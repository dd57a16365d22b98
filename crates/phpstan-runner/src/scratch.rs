//! Scratch directory holding the generated PHP files.

use crate::{AnalyzerError, AnalyzerResult};
use blade_codegen::LOOP_STUB;
use rustc_hash::FxHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const COMPILED_SUFFIX: &str = "-blade-compiled.php";
const LOOP_STUB_FILE: &str = "bladecheck-loop.php";

/// Directory the analyzer reads generated files from.
///
/// A temporary directory is removed when the value is dropped; a directory
/// given with [`ScratchDir::at`] is kept so the generated code can be read.
#[derive(Debug)]
pub struct ScratchDir {
    root: PathBuf,
    _temp: Option<TempDir>,
}

impl ScratchDir {
    /// A fresh temporary directory, removed on drop.
    pub fn temporary() -> AnalyzerResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("bladecheck-")
            .tempdir()
            .map_err(|source| AnalyzerError::Write {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok(Self {
            root: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    /// Use `root`, creating it if needed; it is kept after the run.
    pub fn at(root: impl Into<PathBuf>) -> AnalyzerResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| AnalyzerError::Write {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root, _temp: None })
    }

    /// Directory holding the generated files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<hash of key>-blade-compiled.php`. The key identifies one
    /// render, usually `host_file:host_line`.
    pub fn compiled_path(&self, key: &str) -> PathBuf {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        self.root
            .join(format!("{:016x}{COMPILED_SUFFIX}", hasher.finish()))
    }

    /// Write a generated file at [`ScratchDir::compiled_path`].
    pub fn write_compiled(&self, key: &str, code: &str) -> AnalyzerResult<PathBuf> {
        let path = self.compiled_path(key);
        self.write(&path, code)?;
        Ok(path)
    }

    /// Write the `$loop` class stub and return its path.
    pub fn write_loop_stub(&self) -> AnalyzerResult<PathBuf> {
        let path = self.root.join(LOOP_STUB_FILE);
        self.write(&path, LOOP_STUB)?;
        Ok(path)
    }

    fn write(&self, path: &Path, content: &str) -> AnalyzerResult<()> {
        tracing::trace!(path = %path.display(), bytes = content.len(), "writing scratch file");
        fs::write(path, content).map_err(|source| AnalyzerError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compiled_path() {
        let scratch = ScratchDir::temporary().unwrap();
        let a = scratch.compiled_path("app/Http/HomeController.php:14");
        let b = scratch.compiled_path("app/Http/HomeController.php:20");
        assert_ne!(a, b);
        assert_eq!(a, scratch.compiled_path("app/Http/HomeController.php:14"));
        assert!(a.to_string_lossy().ends_with("-blade-compiled.php"));
        assert_eq!(a.parent(), Some(scratch.root()));
    }

    #[test]
    fn test_write_files() {
        let scratch = ScratchDir::temporary().unwrap();
        let path = scratch.write_compiled("h.php:1", "<?php\necho 1;\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<?php\necho 1;\n");
        let stub = scratch.write_loop_stub().unwrap();
        assert!(fs::read_to_string(stub).unwrap().contains("final class Loop"));
    }

    #[test]
    fn test_temporary_removed_on_drop() {
        let scratch = ScratchDir::temporary().unwrap();
        let root = scratch.root().to_path_buf();
        assert!(root.exists());
        drop(scratch);
        assert!(!root.exists());
    }

    #[test]
    fn test_kept_directory() {
        let dir = tempfile::tempdir().unwrap();
        let emit = dir.path().join("emit");
        let scratch = ScratchDir::at(&emit).unwrap();
        scratch.write_compiled("k", "<?php\n").unwrap();
        drop(scratch);
        assert!(emit.exists());
    }
}
