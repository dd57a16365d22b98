//! Error types for the Blade compiler.

use source_map::{Span, TemplateLocation};
use std::fmt;

/// Result type for Blade compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// A Blade compilation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    /// Error message.
    pub message: String,
    /// Byte span of the offending construct in the text of the failing pass.
    pub span: Span,
    /// Error code.
    pub code: CompileErrorCode,
    /// Template location from the nearest preceding location marker.
    pub location: Option<TemplateLocation>,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, span: Span, code: CompileErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
            location: None,
        }
    }

    /// A `<x-...>` tag with neither a backing class nor a view.
    pub fn unknown_component(name: &str, span: Span) -> Self {
        Self::new(
            format!("Unable to locate a class or view for component [{name}]."),
            span,
            CompileErrorCode::UnknownComponent,
        )
    }

    /// A directive whose arguments cannot be compiled.
    pub fn malformed_directive(directive: &str, span: Span) -> Self {
        Self::new(
            format!("Malformed @{directive} statement."),
            span,
            CompileErrorCode::MalformedDirective,
        )
    }

    /// A closing tag with no matching opening tag.
    pub fn unbalanced_tag(tag: &str, span: Span) -> Self {
        Self::new(
            format!("Unexpected closing tag [{tag}]."),
            span,
            CompileErrorCode::UnbalancedTag,
        )
    }
}

/// Error codes for Blade compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorCode {
    /// Component tag that resolves to nothing.
    UnknownComponent,
    /// Directive with invalid arguments.
    MalformedDirective,
    /// Closing component tag without an opening one.
    UnbalancedTag,
}

impl CompileErrorCode {
    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownComponent => "unknown-component",
            Self::MalformedDirective => "malformed-directive",
            Self::UnbalancedTag => "unbalanced-tag",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
