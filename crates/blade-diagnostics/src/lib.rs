//! Analyzer diagnostics projected onto Blade templates.
//!
//! The analyzer reports problems against the flattened PHP file. Every
//! diagnostic is attributed back to the call that rendered the template
//! (`host_file:host_line`) and carries the template location it came from,
//! resolved through the unit's [`LineMap`].

pub mod filter;

pub use filter::{ErrorFilter, FilterError};

use blade_codegen::{CompiledUnit, StructuralError};
use serde::{Deserialize, Serialize};
use source_map::{LineMap, TemplateLocation};
use std::fmt;

/// A diagnostic reported by the analyzer on the generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    /// Analyzer rule identifier, e.g. `variable.undefined`.
    #[serde(default)]
    pub identifier: String,
    /// 1-based line in the generated file.
    pub generated_line: u32,
}

impl Diagnostic {
    /// A diagnostic on a line of the generated file.
    pub fn new(message: impl Into<String>, identifier: impl Into<String>, generated_line: u32) -> Self {
        Self {
            message: message.into(),
            identifier: identifier.into(),
            generated_line,
        }
    }
}

/// Where a projected diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Found while flattening the template.
    Structural,
    /// Reported by the analyzer.
    Analyzer,
}

impl DiagnosticKind {
    /// Lowercase name used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Analyzer => "analyzer",
        }
    }
}

/// A diagnostic attributed to the rendering call, with its template location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedDiagnostic {
    pub message: String,
    pub identifier: String,
    pub template: TemplateLocation,
    pub host_file: String,
    pub host_line: u32,
    pub kind: DiagnosticKind,
}

impl ProjectedDiagnostic {
    /// Attribute a structural error to a render call.
    pub fn structural(error: &StructuralError, host_file: &str, host_line: u32) -> Self {
        Self {
            message: error.message.clone(),
            identifier: error.code.as_str().to_string(),
            template: error.location.clone(),
            host_file: host_file.to_string(),
            host_line,
            kind: DiagnosticKind::Structural,
        }
    }

    /// Whether the template location could not be resolved.
    pub fn is_unmapped(&self) -> bool {
        self.template.is_unknown()
    }
}

impl fmt::Display for ProjectedDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.host_file, self.host_line, self.message)?;
        if !self.identifier.is_empty() {
            write!(f, " [{}]", self.identifier)?;
        }
        if !self.is_unmapped() {
            write!(f, " (rendered in: {})", self.template)?;
        }
        Ok(())
    }
}

/// Attribute analyzer diagnostics to `host_file:host_line`.
///
/// Each generated line is looked up exactly, then at the nearest preceding
/// mapped line, and finally falls back to the unknown location `("", 1)`.
pub fn project(
    diagnostics: &[Diagnostic],
    line_map: &LineMap,
    host_file: &str,
    host_line: u32,
) -> Vec<ProjectedDiagnostic> {
    diagnostics
        .iter()
        .map(|diagnostic| {
            let template = match line_map.get(diagnostic.generated_line) {
                Some(location) => location.clone(),
                None => line_map.resolve(diagnostic.generated_line),
            };
            if template.is_unknown() {
                tracing::debug!(
                    line = diagnostic.generated_line,
                    "diagnostic precedes every mapped line"
                );
            }
            ProjectedDiagnostic {
                message: diagnostic.message.clone(),
                identifier: diagnostic.identifier.clone(),
                template,
                host_file: host_file.to_string(),
                host_line,
                kind: DiagnosticKind::Analyzer,
            }
        })
        .collect()
}

/// The unit's structural errors followed by the projected analyzer
/// diagnostics.
pub fn project_diagnostics(
    diagnostics: &[Diagnostic],
    unit: &CompiledUnit,
    host_file: &str,
    host_line: u32,
) -> Vec<ProjectedDiagnostic> {
    let mut projected: Vec<ProjectedDiagnostic> = unit
        .compile_errors
        .iter()
        .map(|error| ProjectedDiagnostic::structural(error, host_file, host_line))
        .collect();
    projected.extend(project(diagnostics, &unit.line_map, host_file, host_line));
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use blade_codegen::StructuralErrorCode;
    use pretty_assertions::assert_eq;

    fn line_map() -> LineMap {
        [
            (5, TemplateLocation::new("welcome.blade.php", 1)),
            (7, TemplateLocation::new("welcome.blade.php", 2)),
            (12, TemplateLocation::new("partials/nav.blade.php", 4)),
        ]
        .into_iter()
        .collect()
    }

    fn templates(projected: &[ProjectedDiagnostic]) -> Vec<String> {
        projected.iter().map(|d| d.template.to_string()).collect()
    }

    #[test]
    fn test_exact_and_nearest() {
        let diagnostics = [
            Diagnostic::new("a", "x", 7),
            Diagnostic::new("b", "x", 9),
            Diagnostic::new("c", "x", 40),
        ];
        let projected = project(&diagnostics, &line_map(), "app/Http/HomeController.php", 14);
        assert_eq!(
            templates(&projected),
            vec![
                "welcome.blade.php:2",
                "welcome.blade.php:2",
                "partials/nav.blade.php:4",
            ]
        );
        assert!(projected
            .iter()
            .all(|d| d.host_file == "app/Http/HomeController.php" && d.host_line == 14));
    }

    #[test]
    fn test_before_first_mapped_line() {
        let projected = project(&[Diagnostic::new("a", "x", 3)], &line_map(), "h.php", 1);
        assert_eq!(projected[0].template, TemplateLocation::new("", 1));
        assert!(projected[0].is_unmapped());
    }

    #[test]
    fn test_structural_errors_first() {
        let unit = CompiledUnit {
            host_code: String::new(),
            line_map: line_map(),
            compile_errors: vec![StructuralError::new(
                "View [missing] not found.",
                StructuralErrorCode::Missing,
                TemplateLocation::new("welcome.blade.php", 3),
            )],
        };
        let projected = project_diagnostics(
            &[Diagnostic::new("Undefined variable: $user", "variable.undefined", 12)],
            &unit,
            "h.php",
            20,
        );
        assert_eq!(
            projected
                .iter()
                .map(|d| (d.kind, d.identifier.as_str()))
                .collect::<Vec<_>>(),
            vec![
                (DiagnosticKind::Structural, "bladecheck.missing"),
                (DiagnosticKind::Analyzer, "variable.undefined"),
            ]
        );
        assert_eq!(
            projected[1].to_string(),
            "h.php:20: Undefined variable: $user [variable.undefined] (rendered in: partials/nav.blade.php:4)"
        );
    }

    #[test]
    fn test_serialize() {
        let projected = project(&[Diagnostic::new("m", "id", 5)], &line_map(), "h.php", 2);
        let json = serde_json::to_value(&projected[0]).unwrap();
        assert_eq!(json["hostFile"], "h.php");
        assert_eq!(json["kind"], "analyzer");
        assert_eq!(json["template"]["file"], "welcome.blade.php");
    }
}
