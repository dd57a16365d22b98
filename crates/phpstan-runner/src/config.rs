//! Analyzer settings from `bladecheck.json`.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

const CONFIG_FILES: &[&str] = &["phpstan.neon", "phpstan.neon.dist", "phpstan.dist.neon"];

/// How PHPStan is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerConfig {
    /// PHPStan executable. Found in `vendor/bin` or on `PATH` when unset.
    pub binary: Option<Utf8PathBuf>,
    /// Rule level passed with `--level`.
    pub level: Option<String>,
    /// PHPStan configuration file. Searched for in the workspace when unset.
    pub configuration: Option<Utf8PathBuf>,
    pub memory_limit: Option<String>,
    /// Extra arguments appended to `analyse`.
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            level: Some("5".to_string()),
            configuration: None,
            memory_limit: Some("1G".to_string()),
            args: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// The configured PHPStan configuration file, or the first standard one
    /// found in `workspace` or its parents.
    pub fn configuration_file(&self, workspace: &Utf8Path) -> Option<Utf8PathBuf> {
        if let Some(path) = &self.configuration {
            return Some(workspace.join(path));
        }
        find_configuration(workspace)
    }
}

/// Find a PHPStan configuration file in a directory or its parents.
pub fn find_configuration(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut current = dir;
    loop {
        for name in CONFIG_FILES {
            let candidate = current.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        current = current.parent()?;
    }
}
