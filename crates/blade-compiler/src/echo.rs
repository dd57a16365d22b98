//! `{{ }}`, `{!! !!}` and `@{{ }}` echoes.

use crate::scan::map_markup;
use std::convert::Infallible;

#[derive(Clone, Copy)]
enum Echo {
    Escaped,
    Raw,
    Regular,
}

impl Echo {
    fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Echo::Escaped => ("@{{", "}}"),
            Echo::Raw => ("{!!", "!!}"),
            Echo::Regular => ("{{", "}}"),
        }
    }
}

/// Compile echoes outside existing PHP blocks.
pub(crate) fn compile_echos(content: &str) -> String {
    let compiled: Result<String, Infallible> = map_markup(content, |run, _| Ok(compile_run(run)));
    match compiled {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

/// The PHP for one echo expression, as used inside attribute strings too.
pub(crate) fn echo_expression(expression: &str, escape: bool) -> String {
    if escape {
        format!("e({expression})")
    } else {
        expression.to_string()
    }
}

fn next_echo(text: &str) -> Option<(usize, Echo)> {
    [Echo::Escaped, Echo::Raw, Echo::Regular]
        .into_iter()
        .filter_map(|kind| text.find(kind.delimiters().0).map(|at| (at, kind)))
        .min_by_key(|(at, _)| *at)
}

fn compile_run(run: &str) -> String {
    let mut out = String::with_capacity(run.len());
    let mut rest = run;
    while let Some((at, kind)) = next_echo(rest) {
        let (open, close) = kind.delimiters();
        out.push_str(&rest[..at]);
        let body_start = at + open.len();
        let Some(len) = rest[body_start..].find(close) else {
            out.push_str(open);
            rest = &rest[body_start..];
            continue;
        };
        let body = &rest[body_start..body_start + len];
        let mut after = &rest[body_start + len + close.len()..];
        let expression = body.trim();
        match kind {
            Echo::Escaped => {
                out.push_str(&open[1..]);
                out.push_str(body);
                out.push_str(close);
            }
            _ if expression.is_empty() => {
                out.push_str(open);
                out.push_str(body);
                out.push_str(close);
            }
            Echo::Raw | Echo::Regular => {
                let escape = matches!(kind, Echo::Regular);
                out.push_str(&format!("<?php echo {}; ?>", echo_expression(expression, escape)));
                // The closing tag swallows one newline.
                for newline in ["\r\n", "\n"] {
                    if let Some(stripped) = after.strip_prefix(newline) {
                        out.push_str(newline);
                        out.push_str(newline);
                        after = stripped;
                        break;
                    }
                }
            }
        }
        rest = after;
    }
    out.push_str(rest);
    out
}
