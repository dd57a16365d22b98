//! Error types for template code generation.

use source_map::TemplateLocation;
use std::fmt;
use std::path::PathBuf;

/// Result type for code generation operations.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Failures of the collaborators the inliner depends on.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("View [{0}] not found.")]
    ViewNotFound(String),

    #[error("No hint path defined for [{0}].")]
    UnknownNamespace(String),

    #[error("File does not exist at path {}.", .path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] blade_compiler::CompileError),

    #[error(transparent)]
    Parse(#[from] php_syntax::ParseError),
}

/// Kind of a structural error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralErrorCode {
    /// A view or component could not be found or compiled.
    Missing,
    /// A template compiled to invalid PHP.
    Parsing,
    /// A template is included while it is already being rendered.
    Recursion,
}

impl StructuralErrorCode {
    /// Stable identifier reported with the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "bladecheck.missing",
            Self::Parsing => "bladecheck.parsing",
            Self::Recursion => "bladecheck.recursion",
        }
    }
}

impl fmt::Display for StructuralErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found while flattening templates, reported alongside analyzer
/// diagnostics instead of aborting the compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralError {
    pub message: String,
    pub code: StructuralErrorCode,
    pub location: TemplateLocation,
}

impl StructuralError {
    /// An error at a template location.
    pub fn new(
        message: impl Into<String>,
        code: StructuralErrorCode,
        location: TemplateLocation,
    ) -> Self {
        Self {
            message: message.into(),
            code,
            location,
        }
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.message, self.code, self.location)
    }
}
