//! Output formatting for diagnostics.

use crate::cli::OutputFormat;
use crate::orchestrator::CheckResult;
use blade_diagnostics::{DiagnosticKind, ProjectedDiagnostic};

/// Formatter for diagnostic output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a projected diagnostic.
    pub fn print_diagnostic(&self, diagnostic: &ProjectedDiagnostic) {
        println!("{}", self.format_diagnostic(diagnostic));
    }

    /// Print an analyzer error not tied to a file.
    pub fn print_general_error(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("\x1b[31merror\x1b[0m: {message}"),
            OutputFormat::Json => {
                let json = serde_json::json!({ "type": "error", "message": message });
                println!("{json}");
            }
            OutputFormat::Machine => println!("::error:{}", escape(message)),
        }
    }

    /// Print the summary.
    pub fn print_summary(&self, result: &CheckResult) {
        match self.format {
            OutputFormat::Human => self.print_summary_human(result),
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "type": "summary",
                    "renders": result.render_count,
                    "errors": result.error_count,
                    "duration_ms": result.duration_ms
                });
                println!("{json}");
            }
            OutputFormat::Machine => {}
        }
    }

    /// Render one diagnostic in the selected format.
    pub fn format_diagnostic(&self, diagnostic: &ProjectedDiagnostic) -> String {
        match self.format {
            OutputFormat::Human => format_human(diagnostic),
            OutputFormat::Json => {
                let mut json = serde_json::json!({ "type": "diagnostic" });
                if let (Some(object), Ok(serde_json::Value::Object(fields))) =
                    (json.as_object_mut(), serde_json::to_value(diagnostic))
                {
                    object.extend(fields);
                }
                json.to_string()
            }
            OutputFormat::Machine => format!(
                "{}:{}:{}:{}:{}:{}",
                diagnostic.host_file,
                diagnostic.host_line,
                diagnostic.template,
                diagnostic.kind.as_str(),
                diagnostic.identifier,
                escape(&diagnostic.message)
            ),
        }
    }

    fn print_summary_human(&self, result: &CheckResult) {
        println!();
        if result.error_count == 0 {
            println!(
                "\x1b[32m✓\x1b[0m No errors in {} render{} ({}ms)",
                result.render_count,
                plural(result.render_count),
                result.duration_ms
            );
        } else {
            println!(
                "\x1b[31m✗\x1b[0m Found {} error{} in {} render{}",
                result.error_count,
                plural(result.error_count),
                result.render_count,
                plural(result.render_count)
            );
            println!("Time: {}ms", result.duration_ms);
        }
    }
}

fn format_human(diagnostic: &ProjectedDiagnostic) -> String {
    let label = match diagnostic.kind {
        DiagnosticKind::Structural => "\x1b[31mtemplate error\x1b[0m",
        DiagnosticKind::Analyzer => "\x1b[31merror\x1b[0m",
    };
    let mut out = format!(
        "{}:{}: {}: {}",
        diagnostic.host_file, diagnostic.host_line, label, diagnostic.message
    );
    if !diagnostic.identifier.is_empty() {
        out.push_str(&format!(" [{}]", diagnostic.identifier));
    }
    if !diagnostic.is_unmapped() {
        out.push_str(&format!("\n    rendered in: {}", diagnostic.template));
    }
    out
}

fn escape(message: &str) -> String {
    message.replace(':', "\\:").replace('\n', " ")
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
