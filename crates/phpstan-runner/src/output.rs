//! PHPStan `--error-format=json` output.

use blade_diagnostics::Diagnostic;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;

/// Diagnostics per analysed file plus errors not tied to a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub files: IndexMap<PathBuf, Vec<Diagnostic>>,
    pub errors: Vec<String>,
}

impl AnalysisReport {
    /// Diagnostics reported on `path`, empty when PHPStan found none.
    pub fn diagnostics_for(&self, path: &std::path::Path) -> &[Diagnostic] {
        self.files.get(path).map_or(&[], Vec::as_slice)
    }

    /// File diagnostics plus general errors.
    pub fn error_count(&self) -> usize {
        self.files.values().map(Vec::len).sum::<usize>() + self.errors.len()
    }
}

#[derive(Deserialize)]
struct RawReport {
    #[serde(default)]
    files: RawFiles,
    #[serde(default)]
    errors: Vec<String>,
}

/// PHP encodes an empty `files` map as `[]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFiles {
    Map(IndexMap<PathBuf, RawFile>),
    Empty(Vec<serde_json::Value>),
}

impl Default for RawFiles {
    fn default() -> Self {
        Self::Empty(Vec::new())
    }
}

#[derive(Deserialize)]
struct RawFile {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    message: String,
    line: Option<u32>,
    #[serde(default)]
    identifier: Option<String>,
}

/// Parse PHPStan's JSON report. Anything printed before the report, such as
/// PHP deprecation notices, is skipped.
pub fn parse_output(output: &str) -> serde_json::Result<AnalysisReport> {
    let start = output.find('{').unwrap_or(0);
    let raw: RawReport = serde_json::from_str(output[start..].trim_end())?;
    let files = match raw.files {
        RawFiles::Map(files) => files,
        RawFiles::Empty(_) => IndexMap::new(),
    };
    let files = files
        .into_iter()
        .map(|(path, file)| {
            let diagnostics = file
                .messages
                .into_iter()
                .map(|m| {
                    Diagnostic::new(
                        m.message,
                        m.identifier.unwrap_or_default(),
                        m.line.unwrap_or(0),
                    )
                })
                .collect();
            (path, diagnostics)
        })
        .collect();
    Ok(AnalysisReport {
        files,
        errors: raw.errors,
    })
}
