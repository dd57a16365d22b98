//! Location markers for template lines.
//!
//! Every line that can produce code gets a `/** file: <path>, line: <n> */`
//! prefix before the Blade compiler runs. The markers survive compilation as
//! inline markup or PHP comments and later tell the line resolver where each
//! generated statement came from.

use once_cell::sync::Lazy;
use regex::Regex;
use source_map::LocationMarker;
use std::path::Path;

static SINGLE_LINE_DOC: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^/\*\*.*?\*/$").ok());

static PARTIAL_DOC_TAG: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^(\* )?@(var|param|method|extends|implements|template) +(.*?) \$[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*",
    )
    .ok()
});

static TAG_START: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"^.*<(?:livewire:|x-)\S+[^>](?:\s+[^>]+?="[^"]*?")*[^>]*$"#).ok()
});

static TAG_END: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"^(?:\s+[^>]+?="[^"]*?")*\s*/?>"#).ok());

fn matches(re: &Lazy<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

/// Prefix each code-bearing line of `content` with a location marker.
pub fn annotate(relative_path: &str, content: &str) -> String {
    let mut inside_tag = false;
    let mut lines = Vec::new();
    for (index, line) in content.split('\n').enumerate() {
        if !inside_tag && !should_skip(line) {
            let marker = LocationMarker::new(relative_path, index as u32 + 1);
            lines.push(format!("{}{line}", marker.render()));
        } else {
            lines.push(line.to_string());
        }

        inside_tag = if inside_tag {
            !matches(&TAG_END, line)
        } else {
            matches(&TAG_START, line)
        };
    }
    lines.join("\n")
}

fn should_skip(line: &str) -> bool {
    let trimmed = line.trim();
    matches!(trimmed, "" | "/**" | "*/")
        || matches(&SINGLE_LINE_DOC, trimmed)
        || matches(&PARTIAL_DOC_TAG, trimmed)
}

/// Configured template roots, used to shorten absolute file names.
#[derive(Debug, Clone, Default)]
pub struct TemplatePaths {
    roots: Vec<String>,
}

impl TemplatePaths {
    /// Template roots, tried in order when naming a file.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: roots
                .into_iter()
                .map(|root| {
                    let root = root.as_ref().to_string_lossy();
                    format!("{}/", root.trim_end_matches('/'))
                })
                .collect(),
        }
    }

    /// The part of `file` after the first root it contains.
    pub fn relative_path(&self, file: &Path) -> String {
        let name = file.to_string_lossy();
        let relative = self
            .roots
            .iter()
            .find_map(|root| name.find(root.as_str()).map(|at| &name[at + root.len()..]))
            .unwrap_or(&name);
        if relative == "0" {
            return String::new();
        }
        relative.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_annotate_lines() {
        let out = annotate("foo.blade.php", "@if($a)\n\n  {{ $a }}\n@endif");
        assert_eq!(
            out,
            "/** file: foo.blade.php, line: 1 */@if($a)\n\n/** file: foo.blade.php, line: 3 */  {{ $a }}\n/** file: foo.blade.php, line: 4 */@endif"
        );
    }

    #[test]
    fn test_skips_doc_comments() {
        let out = annotate(
            "a.blade.php",
            "/** @var \\App\\User $user */\n/**\n * @var int $count\n */\n{{ $user }}",
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "/** @var \\App\\User $user */");
        assert_eq!(lines[1], "/**");
        assert_eq!(lines[2], " * @var int $count");
        assert_eq!(lines[3], " */");
        assert_eq!(lines[4], "/** file: a.blade.php, line: 5 */{{ $user }}");
    }

    #[test]
    fn test_multiline_component_tag() {
        let out = annotate(
            "a.blade.php",
            "<x-alert\n    type=\"error\"\n    :message=\"$message\"\n/>\n<p>after</p>",
        );
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("/** file: a.blade.php, line: 1 */<x-alert"));
        assert_eq!(lines[1], "    type=\"error\"");
        assert_eq!(lines[2], "    :message=\"$message\"");
        assert_eq!(lines[3], "/>");
        assert_eq!(lines[4], "/** file: a.blade.php, line: 5 */<p>after</p>");
    }

    #[test]
    fn test_relative_path() {
        let paths = TemplatePaths::new(["/app/resources/views", "/app/vendor/views/"]);
        assert_eq!(
            paths.relative_path(Path::new("/app/resources/views/users/show.blade.php")),
            "users/show.blade.php"
        );
        assert_eq!(
            paths.relative_path(Path::new("/app/vendor/views/mail.blade.php")),
            "mail.blade.php"
        );
        assert_eq!(paths.relative_path(Path::new("other.blade.php")), "other.blade.php");
        assert_eq!(paths.relative_path(Path::new("0")), "");
    }
}
