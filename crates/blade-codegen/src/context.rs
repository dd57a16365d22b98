//! Per-compile state threaded through the include recursion.

use crate::error::{StructuralError, StructuralErrorCode};
use source_map::TemplateLocation;
use std::path::{Path, PathBuf};

/// Structural errors found so far and the chain of templates being inlined.
#[derive(Debug, Default)]
pub struct CompileContext {
    errors: Vec<StructuralError>,
    stack: Vec<PathBuf>,
}

impl CompileContext {
    /// An empty context for one top-level compile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a structural error and log it.
    pub fn error(
        &mut self,
        message: impl Into<String>,
        code: StructuralErrorCode,
        location: TemplateLocation,
    ) {
        let error = StructuralError::new(message, code, location);
        tracing::warn!(code = %error.code, location = %error.location, "{}", error.message);
        self.errors.push(error);
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[StructuralError] {
        &self.errors
    }

    /// Consume the context, keeping its errors.
    pub fn into_errors(self) -> Vec<StructuralError> {
        self.errors
    }

    /// Whether `path` is being inlined further up the chain.
    pub fn is_active(&self, path: &Path) -> bool {
        self.stack.iter().any(|p| p == path)
    }

    pub(crate) fn enter(&mut self, path: &Path) {
        self.stack.push(path.to_path_buf());
    }

    pub(crate) fn leave(&mut self) {
        self.stack.pop();
    }

    /// Number of templates being inlined.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_active_chain() {
        let mut ctx = CompileContext::new();
        ctx.enter(Path::new("/views/a.blade.php"));
        ctx.enter(Path::new("/views/b.blade.php"));
        assert!(ctx.is_active(Path::new("/views/a.blade.php")));
        assert_eq!(ctx.depth(), 2);
        ctx.leave();
        assert!(!ctx.is_active(Path::new("/views/b.blade.php")));
    }

    #[test]
    fn test_errors_accumulate() {
        let mut ctx = CompileContext::new();
        ctx.error(
            "View [x] not found.",
            StructuralErrorCode::Missing,
            TemplateLocation::new("a.blade.php", 3),
        );
        assert_eq!(
            ctx.into_errors(),
            vec![StructuralError::new(
                "View [x] not found.",
                StructuralErrorCode::Missing,
                TemplateLocation::new("a.blade.php", 3),
            )]
        );
    }
}
