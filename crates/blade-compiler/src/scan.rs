//! Low-level scanning over template text.

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte length of the leading `\w+` run.
pub(crate) fn word_len(text: &str) -> usize {
    text.find(|c: char| !is_word_char(c)).unwrap_or(text.len())
}

/// Index of the `)` closing the `(` at `open`, skipping quoted strings.
pub(crate) fn find_balanced_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Apply `f` to every markup run of `content`, leaving `<?php ... ?>` and
/// `<?= ... ?>` blocks untouched. `f` receives the run and its byte offset.
pub(crate) fn map_markup<E>(
    content: &str,
    mut f: impl FnMut(&str, usize) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(content.len());
    let mut pos = 0;
    while pos < content.len() {
        let rest = &content[pos..];
        let open = [rest.find("<?php"), rest.find("<?=")]
            .into_iter()
            .flatten()
            .min();
        let Some(open) = open else {
            out.push_str(&f(rest, pos)?);
            break;
        };
        out.push_str(&f(&rest[..open], pos)?);
        let block = &rest[open..];
        let len = block.find("?>").map_or(block.len(), |close| close + 2);
        out.push_str(&block[..len]);
        pos += open + len;
    }
    Ok(out)
}

/// Escape text for a single-quoted PHP string.
pub(crate) fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_balanced_close() {
        let text = "@if(count($a) > 0 && $b === ')')";
        assert_eq!(find_balanced_close(text, 3), Some(text.len() - 1));
        assert_eq!(find_balanced_close("(a", 0), None);
    }

    #[test]
    fn test_map_markup_skips_php() {
        let out: Result<String, ()> =
            map_markup("a<?php echo 'a'; ?>a<?= 'a' ?>", |run, _| Ok(run.replace('a', "b")));
        assert_eq!(out.unwrap(), "b<?php echo 'a'; ?>b<?= 'a' ?>");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("it's"), "'it\\'s'");
        assert_eq!(word_len("foreach($a)"), 7);
    }
}
