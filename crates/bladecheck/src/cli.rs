//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Blade template checker - type-checks templates with PHPStan
#[derive(Parser, Debug, Clone)]
#[command(name = "bladecheck")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Workspace directory to check
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Path to bladecheck.json
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run in watch mode
    #[arg(long)]
    pub watch: bool,

    /// Output format
    #[arg(long, default_value = "human")]
    pub output: OutputFormat,

    /// Keep the generated PHP files in this directory
    #[arg(long, value_name = "DIR")]
    pub emit_php: Option<PathBuf>,

    /// Show timing information
    #[arg(long)]
    pub timings: bool,

    /// Maximum number of errors to show
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Only compile templates, without running PHPStan
    #[arg(long)]
    pub skip_analysis: bool,

    /// Skip templates matching these globs
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Preserve watch output (don't clear screen)
    #[arg(long)]
    pub preserve_watch_output: bool,
}

/// Output format for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// One JSON object per line
    Json,
    /// Colon-separated fields
    Machine,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "bladecheck",
            "--output",
            "json",
            "--ignore",
            "vendor/**",
            "--ignore",
            "mail/**",
            "--max-errors",
            "10",
            "--skip-analysis",
        ]);
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.ignore, vec!["vendor/**", "mail/**"]);
        assert_eq!(args.max_errors, Some(10));
        assert!(args.skip_analysis);
        assert!(!args.watch);
    }
}
