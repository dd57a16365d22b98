//! Source position tracking and line mapping for bladecheck.
//!
//! Templates are flattened into a single PHP unit before analysis. Every
//! statement group in that unit carries a location marker comment naming the
//! template file and line it came from; the [`LineMap`] built from those
//! markers projects generated lines back onto templates.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// A span in the source code, representing a half-open range [start, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Start offset (inclusive)
    pub start: u32,
    /// End offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Create a new span from start and end offsets.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Create an empty span at the given offset.
    #[inline]
    pub const fn empty(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Get the length of the span.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Convert to a Range<usize>.
    #[inline]
    pub fn to_range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start as u32,
            end: range.end as u32,
        }
    }
}

/// A line index for converting byte offsets to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of the start of each line.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Create a new line index from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Get the line and column for a byte offset.
    /// Line and column are 0-indexed.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        LineCol {
            line: line as u32,
            col: offset - line_start,
        }
    }

    /// 1-indexed line number of a byte offset.
    #[inline]
    pub fn line_number(&self, offset: u32) -> u32 {
        self.line_col(offset).line + 1
    }

    /// Get the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// A line and column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineCol {
    /// 0-indexed line number.
    pub line: u32,
    /// 0-indexed column (byte offset within line).
    pub col: u32,
}

impl LineCol {
    /// Create a new line/column position.
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Convert to 1-indexed for display.
    #[inline]
    pub const fn to_display(self) -> (u32, u32) {
        (self.line + 1, self.col + 1)
    }
}

/// A position in a template: relative file path and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateLocation {
    pub file: String,
    pub line: u32,
}

impl TemplateLocation {
    /// A line of a template, by path relative to its root.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location reported when nothing in the map precedes a generated line.
    pub fn unknown() -> Self {
        Self::new("", 1)
    }

    /// Whether this is [`TemplateLocation::unknown`].
    pub fn is_unknown(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for TemplateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

const MARKER_PREFIX: &str = "/** file: ";
const MARKER_LINE: &str = ", line: ";
const MARKER_SUFFIX: &str = " */";

/// A location marker comment: `/** file: <path>, line: <n> */`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMarker {
    pub location: TemplateLocation,
}

impl LocationMarker {
    /// A marker for `line` of `file`.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            location: TemplateLocation::new(file, line),
        }
    }

    /// Render the marker as a PHP doc comment.
    pub fn render(&self) -> String {
        format!(
            "{MARKER_PREFIX}{}{MARKER_LINE}{}{MARKER_SUFFIX}",
            self.location.file, self.location.line
        )
    }

    /// Parse a comment that is exactly one marker.
    pub fn parse(comment: &str) -> Option<Self> {
        let body = comment
            .trim()
            .strip_prefix(MARKER_PREFIX)?
            .strip_suffix(MARKER_SUFFIX)?;
        let (file, line) = body.rsplit_once(MARKER_LINE)?;
        if file.is_empty() || file.contains('*') || file.contains('\n') {
            return None;
        }
        let line = line.parse().ok()?;
        Some(Self::new(file, line))
    }

    /// Find every marker in `text` with its byte range.
    pub fn find_all(text: &str) -> Vec<(Range<usize>, LocationMarker)> {
        let mut found = Vec::new();
        let mut from = 0;
        while let Some(rel) = text[from..].find(MARKER_PREFIX) {
            let start = from + rel;
            let Some(end_rel) = text[start..].find(MARKER_SUFFIX) else {
                break;
            };
            let end = start + end_rel + MARKER_SUFFIX.len();
            match Self::parse(&text[start..end]) {
                Some(marker) => {
                    found.push((start..end, marker));
                    from = end;
                }
                None => from = start + MARKER_PREFIX.len(),
            }
        }
        found
    }

    /// The last marker in `text`, if any.
    pub fn find_last(text: &str) -> Option<LocationMarker> {
        Self::find_all(text).pop().map(|(_, marker)| marker)
    }
}

impl fmt::Display for LocationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Ordered mapping from generated (1-based) line numbers to template locations.
///
/// Keys are strictly increasing by construction; the first location recorded
/// for a line is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineMap {
    entries: BTreeMap<u32, TemplateLocation>,
}

impl LineMap {
    /// Create a new empty line map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a location for a generated line. Returns false when the line
    /// already had one.
    pub fn insert(&mut self, generated_line: u32, location: TemplateLocation) -> bool {
        match self.entries.entry(generated_line) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(location);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Exact lookup.
    pub fn get(&self, generated_line: u32) -> Option<&TemplateLocation> {
        self.entries.get(&generated_line)
    }

    /// The entry with the greatest generated line not after `generated_line`.
    pub fn nearest(&self, generated_line: u32) -> Option<&TemplateLocation> {
        self.entries
            .range(..=generated_line)
            .next_back()
            .map(|(_, location)| location)
    }

    /// Exact or nearest-preceding location, falling back to
    /// [`TemplateLocation::unknown`].
    pub fn resolve(&self, generated_line: u32) -> TemplateLocation {
        self.nearest(generated_line)
            .cloned()
            .unwrap_or_else(TemplateLocation::unknown)
    }

    /// Mapped generated lines and their locations, in line order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TemplateLocation)> {
        self.entries.iter().map(|(line, location)| (*line, location))
    }

    /// Number of mapped generated lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no line is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u32, TemplateLocation)> for LineMap {
    fn from_iter<I: IntoIterator<Item = (u32, TemplateLocation)>>(iter: I) -> Self {
        let mut map = LineMap::new();
        for (line, location) in iter {
            map.insert(line, location);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_span() {
        let span = Span::new(10, 20);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());
        assert_eq!(span.to_range(), 10..20);
        assert_eq!(Span::new(10, 20).merge(Span::new(15, 30)), Span::new(10, 30));
    }

    #[test]
    fn test_line_index() {
        let text = "hello\nworld\nfoo";
        let index = LineIndex::new(text);

        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_col(0), LineCol::new(0, 0));
        assert_eq!(index.line_col(6), LineCol::new(1, 0));
        assert_eq!(index.line_col(12), LineCol::new(2, 0));
        assert_eq!(index.line_number(13), 3);
        assert_eq!(index.line_col(7).to_display(), (2, 2));
    }

    #[test]
    fn test_marker_render_and_parse() {
        let marker = LocationMarker::new("users/index.blade.php", 12);
        let text = marker.render();
        assert_eq!(text, "/** file: users/index.blade.php, line: 12 */");
        assert_eq!(LocationMarker::parse(&text), Some(marker));
        assert_eq!(LocationMarker::parse("/** @var int $x */"), None);
        assert_eq!(LocationMarker::parse("/** file: a.php, line: x */"), None);
    }

    #[test]
    fn test_marker_find_last() {
        let text = "/** file: a.php, line: 1 */ foo(); /** file: a.php, line: 3 */ bar();";
        let all = LocationMarker::find_all(text);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, 0..27);
        assert_eq!(
            LocationMarker::find_last(text),
            Some(LocationMarker::new("a.php", 3))
        );
        assert_eq!(LocationMarker::find_last("no markers"), None);
    }

    #[test]
    fn test_line_map_first_insert_wins() {
        let mut map = LineMap::new();
        assert!(map.insert(4, TemplateLocation::new("a.php", 1)));
        assert!(!map.insert(4, TemplateLocation::new("a.php", 2)));
        assert_eq!(map.get(4), Some(&TemplateLocation::new("a.php", 1)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_line_map_nearest_preceding() {
        let map: LineMap = [
            (1, TemplateLocation::new("t.php", 1)),
            (5, TemplateLocation::new("t.php", 2)),
            (9, TemplateLocation::new("t.php", 3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.resolve(5), TemplateLocation::new("t.php", 2));
        assert_eq!(map.resolve(7), TemplateLocation::new("t.php", 2));
        assert_eq!(map.resolve(100), TemplateLocation::new("t.php", 3));

        let keys: Vec<u32> = map.iter().map(|(line, _)| line).collect();
        assert_eq!(keys, vec![1, 5, 9]);
    }

    #[test]
    fn test_line_map_sentinel() {
        let map: LineMap = [(3, TemplateLocation::new("t.php", 1))].into_iter().collect();
        assert_eq!(map.resolve(2), TemplateLocation::unknown());
        assert!(map.resolve(2).is_unknown());
        assert_eq!(LineMap::new().resolve(1).to_string(), ":1");
    }
}
