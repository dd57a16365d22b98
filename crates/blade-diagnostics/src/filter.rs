//! Drops analyzer messages caused by flattening rather than by the template.

use crate::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_PATTERNS: &[&str] = &[
    // Inlined templates receive every variable in scope.
    r"Anonymous function has an unused use (.*?)",
    r"Parameter #1 \$value of function e expects BackedEnum\|Illuminate(.*?)\|string\|null, (int|float) given",
    r"Offset 1 on array\{'(.*?)'\} on left side of \?\? does not exist",
    r"(?:Undefined variable: |Variable )\$__\w+",
];

static DEFAULTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// A configured ignore pattern that is not a valid regex.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid ignore pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Analyzer messages to ignore: the built-in patterns plus configured ones.
#[derive(Debug, Clone, Default)]
pub struct ErrorFilter {
    extra: Vec<Regex>,
}

impl ErrorFilter {
    /// A filter with only the built-in patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add patterns written either as plain regexes or PHPStan-style with
    /// delimiters (`#...#`, `/.../i`).
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&undelimit(pattern)).map_err(|source| FilterError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { extra })
    }

    /// Whether any pattern matches `message`.
    pub fn is_ignored(&self, message: &str) -> bool {
        DEFAULTS
            .iter()
            .chain(&self.extra)
            .any(|re| re.is_match(message))
    }

    /// Drop ignored diagnostics.
    pub fn filter(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        let before = diagnostics.len();
        let kept: Vec<Diagnostic> = diagnostics
            .into_iter()
            .filter(|d| !self.is_ignored(&d.message))
            .collect();
        if kept.len() < before {
            tracing::debug!(ignored = before - kept.len(), "filtered analyzer messages");
        }
        kept
    }
}

fn undelimit(pattern: &str) -> String {
    let mut chars = pattern.chars();
    let Some(delimiter) = chars.next() else {
        return String::new();
    };
    if delimiter.is_alphanumeric() || delimiter == '\\' || delimiter.is_whitespace() {
        return pattern.to_string();
    }
    let Some(end) = pattern.rfind(delimiter).filter(|&end| end > 0) else {
        return pattern.to_string();
    };
    let flags = &pattern[end + delimiter.len_utf8()..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return pattern.to_string();
    }
    let body = &pattern[delimiter.len_utf8()..end];
    if flags.contains('i') {
        format!("(?i){body}")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_patterns() {
        let filter = ErrorFilter::new();
        assert!(filter.is_ignored("Variable $__env might not be defined."));
        assert!(filter.is_ignored("Undefined variable: $__data"));
        assert!(filter.is_ignored("Anonymous function has an unused use $user."));
        assert!(filter.is_ignored(
            "Parameter #1 $value of function e expects BackedEnum|Illuminate\\Contracts\\Support\\DeferringDisplayableValue|Illuminate\\Contracts\\Support\\Htmlable|string|null, int given."
        ));
        assert!(filter.is_ignored("Offset 1 on array{'name'} on left side of ?? does not exist."));
        assert!(!filter.is_ignored("Undefined variable: $user"));
    }

    #[test]
    fn test_configured_patterns() {
        let filter = ErrorFilter::with_patterns(["#^Call to an undefined method#", "/unknown class/i"]).unwrap();
        assert!(filter.is_ignored("Call to an undefined method App\\Models\\User::foo()."));
        assert!(filter.is_ignored("Instantiated Unknown Class Foo."));
        assert!(!filter.is_ignored("Undefined variable: $user"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ErrorFilter::with_patterns(["#(unclosed#"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid ignore pattern `#(unclosed#`");
    }

    #[test]
    fn test_undelimit() {
        assert_eq!(undelimit("#a|b#"), "a|b");
        assert_eq!(undelimit("/x/i"), "(?i)x");
        assert_eq!(undelimit("plain text"), "plain text");
        assert_eq!(undelimit("#"), "#");
    }

    #[test]
    fn test_filter_keeps_order() {
        let kept = ErrorFilter::new().filter(vec![
            Diagnostic::new("Undefined variable: $a", "variable.undefined", 3),
            Diagnostic::new("Variable $__env might not be defined.", "variable.undefined", 4),
            Diagnostic::new("Undefined variable: $b", "variable.undefined", 5),
        ]);
        assert_eq!(
            kept.iter().map(|d| d.generated_line).collect::<Vec<_>>(),
            vec![3, 5]
        );
    }
}
