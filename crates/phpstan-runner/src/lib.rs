//! PHPStan runner for bladecheck.
//!
//! This crate provides the analyzer side of a check:
//! - Writing flattened templates to a scratch directory
//! - Running PHPStan on them with JSON output
//! - Parsing that output into per-file diagnostics

pub mod config;
pub mod output;
pub mod runner;
pub mod scratch;

pub use config::AnalyzerConfig;
pub use output::{parse_output, AnalysisReport};
pub use runner::PhpstanRunner;
pub use scratch::ScratchDir;

use std::path::PathBuf;

/// Result type for analyzer operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// An error from running the analyzer.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("PHPStan not found. Install it with: composer require --dev phpstan/phpstan")]
    NotFound,

    #[error("failed to run {}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PHPStan exited with status {status} without a report: {stderr}")]
    NoReport { status: i32, stderr: String },

    #[error("unreadable PHPStan output")]
    Output(#[from] serde_json::Error),

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
