//! Maps lines of the generated file back to template lines.

use php_syntax::{parse, walk, ParseResult, Stmt};
use source_map::{LineMap, LocationMarker};

/// Parse generated code and record, for every statement line after a marker,
/// the template location of the closest preceding marker.
pub fn resolve(code: &str) -> ParseResult<LineMap> {
    let stmts = parse(code)?;
    Ok(resolve_stmts(&stmts))
}

/// Like [`resolve`], on statements already parsed.
pub fn resolve_stmts(stmts: &[Stmt]) -> LineMap {
    let mut map = LineMap::new();
    let mut current = None;
    walk(stmts, &mut |stmt| {
        if let Some(marker) = stmt
            .comments
            .iter()
            .rev()
            .find_map(|comment| LocationMarker::parse(&comment.text))
        {
            current = Some(marker.location);
        }
        if let Some(location) = &current {
            if stmt.line > 0 {
                map.insert(stmt.line, location.clone());
            }
        }
    });
    map
}
