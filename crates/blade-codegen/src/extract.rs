//! Pull the PHP code out of compiled Blade output.

use once_cell::sync::Lazy;
use regex::Regex;
use source_map::LocationMarker;

const OPEN_TAG: &str = "<?php";
const CLOSE_TAG: &str = "?>";

static SAME_LINE_BLOCKS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\s*\?>.*?<\?php\s*").ok());

static CODE_BLOCK: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?ms)^\s*(/\*\* file: [^*]+, line: \d+ \*/)?.*?<\?php(.*?)\?>.*?$").ok()
});

/// Extract the statements of every `<?php ... ?>` block, one block per line,
/// each prefixed with the location marker of the template line it came from.
pub fn extract(compiled: &str, wrap_in_module: bool) -> String {
    let terminated = terminate_blocks(compiled);
    let merged = match SAME_LINE_BLOCKS.as_ref() {
        Some(re) => re.replace_all(&terminated, " ").into_owned(),
        None => terminated,
    };

    let mut fragments = Vec::new();
    if wrap_in_module {
        fragments.push(OPEN_TAG.to_string());
    }
    if let Some(re) = CODE_BLOCK.as_ref() {
        for captures in re.captures_iter(&merged) {
            let (Some(whole), Some(code)) = (captures.get(0), captures.get(2)) else {
                continue;
            };
            let marker = match captures.get(1) {
                Some(_) => {
                    let before_code = &merged[whole.start()..code.start()];
                    LocationMarker::find_last(before_code)
                        .map(|marker| marker.render())
                        .unwrap_or_default()
                }
                None => String::new(),
            };
            fragments.push(format!("{marker}{}", code.as_str().trim_end()));
        }
    }

    let mut out = fragments.join("\n");
    out.push('\n');
    out
}

/// Insert `;` into every block whose last code character is not `;` or `:`.
fn terminate_blocks(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(open) = rest.find(OPEN_TAG) {
        let body_start = open + OPEN_TAG.len();
        let Some(close) = rest[body_start..].find(CLOSE_TAG).map(|at| body_start + at) else {
            break;
        };
        let body = &rest[body_start..close];
        let code_end = code_end(body);

        out.push_str(&rest[..body_start]);
        out.push_str(&body[..code_end]);
        if !body[..code_end].ends_with([';', ':']) {
            out.push(';');
        }
        out.push_str(&body[code_end..]);
        out.push_str(CLOSE_TAG);
        rest = &rest[close + CLOSE_TAG.len()..];
    }
    out.push_str(rest);
    out
}

/// Length of `body` without trailing whitespace and block comments.
fn code_end(body: &str) -> usize {
    let mut end = body.len();
    loop {
        let trimmed = body[..end].trim_end();
        end = trimmed.len();
        if !trimmed.ends_with("*/") {
            return end;
        }
        match trimmed[..end - 2].rfind("/*") {
            Some(start) => end = start,
            None => return end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_terminate_blocks() {
        assert_eq!(
            terminate_blocks("<?php echo e($a) ?> <?php if ($b): ?> <?php foo(); /* x */ ?>"),
            "<?php echo e($a); ?> <?php if ($b): ?> <?php foo(); /* x */ ?>"
        );
        assert_eq!(
            terminate_blocks("<?php bar() /** c */ ?>"),
            "<?php bar(); /** c */ ?>"
        );
    }

    #[test]
    fn test_extract_with_markers() {
        let compiled = "/** file: a.blade.php, line: 1 */<?php if($x): ?>\n/** file: a.blade.php, line: 2 */<p><?php echo e($x); ?></p>\n/** file: a.blade.php, line: 3 */<?php endif; ?>\n";
        assert_eq!(
            extract(compiled, true),
            "<?php\n/** file: a.blade.php, line: 1 */ if($x):\n/** file: a.blade.php, line: 2 */ echo e($x);\n/** file: a.blade.php, line: 3 */ endif;\n"
        );
    }

    #[test]
    fn test_extract_merges_blocks_on_one_line() {
        let compiled = "<?php $a = 1; ?> text <?php $b = 2; ?>\n";
        assert_eq!(extract(compiled, false), " $a = 1; $b = 2;\n");
    }

    #[test]
    fn test_last_marker_before_code_wins() {
        let compiled = "/** file: a.blade.php, line: 4 */</ul>\n/** file: a.blade.php, line: 5 */</div>\n/** file: a.blade.php, line: 6 */<?php endif; ?>\n";
        assert_eq!(
            extract(compiled, false),
            "/** file: a.blade.php, line: 6 */ endif;\n"
        );
    }

    #[test]
    fn test_markup_only_yields_nothing() {
        assert_eq!(extract("<div>\n</div>\n", true), "<?php\n");
    }
}
