//! Error types for PHP parsing.

use source_map::Span;
use std::borrow::Borrow;
use std::fmt;

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A syntax error reported by the PHP grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", line_suffix(.line))]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The span where the error occurred.
    pub span: Span,
    /// The error code.
    pub code: ErrorCode,
    /// 1-based line of `span.start`; 0 when there is no position.
    pub line: u32,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
            line: 0,
        }
    }

    /// Create an unexpected token error.
    pub fn unexpected(found: &str, span: Span) -> Self {
        Self::new(
            format!("Syntax error, unexpected '{}'", found),
            span,
            ErrorCode::UnexpectedToken,
        )
    }

    /// Create an unexpected end of file error.
    pub fn unexpected_eof(offset: u32) -> Self {
        Self::new(
            "Syntax error, unexpected end of file",
            Span::empty(offset),
            ErrorCode::UnexpectedEof,
        )
    }

    /// Create an error for a token the grammar had to insert.
    pub fn missing(expected: &str, offset: u32) -> Self {
        Self::new(
            format!("Syntax error, expecting '{}'", expected),
            Span::empty(offset),
            ErrorCode::MissingToken,
        )
    }

    /// The grammar could not be loaded or produced no tree.
    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::new(
            format!("PHP grammar unavailable: {reason}"),
            Span::default(),
            ErrorCode::GrammarUnavailable,
        )
    }

    /// Attach the 1-based line the error starts on.
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

fn line_suffix(line: impl Borrow<u32>) -> String {
    match *line.borrow() {
        0 => String::new(),
        line => format!(" on line {line}"),
    }
}

/// Error codes for categorizing parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Tokens the grammar could not place.
    UnexpectedToken,
    /// Input ended inside a construct.
    UnexpectedEof,
    /// A required token is absent.
    MissingToken,
    /// The parser could not run.
    GrammarUnavailable,
}

impl ErrorCode {
    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnexpectedToken => "unexpected-token",
            ErrorCode::UnexpectedEof => "unexpected-eof",
            ErrorCode::MissingToken => "missing-token",
            ErrorCode::GrammarUnavailable => "grammar-unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
