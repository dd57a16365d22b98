//! tree-sitter plumbing shared by the lowering passes.

use crate::error::{ParseError, ParseResult};
use source_map::Span;
use tree_sitter::{Language, Node, Parser, Tree};

/// Which PHP grammar to parse with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// A file: markup until the first `<?php`.
    File,
    /// Bare code without an open tag.
    Code,
}

impl Grammar {
    fn language(self) -> Language {
        match self {
            Grammar::File => tree_sitter_php::LANGUAGE_PHP.into(),
            Grammar::Code => tree_sitter_php::LANGUAGE_PHP_ONLY.into(),
        }
    }
}

/// Nodes printed as one piece; their inside is not tokenized.
const ATOMIC: &[&str] = &[
    "string",
    "encapsed_string",
    "heredoc",
    "nowdoc",
    "shell_command_expression",
];

/// Parse `source`, failing on the first syntax error.
pub fn parse_tree(source: &str, grammar: Grammar) -> ParseResult<Tree> {
    let tree = parse_lenient(source, grammar)?;
    let root = tree.root_node();
    if root.has_error() {
        let node = first_error(root).unwrap_or(root);
        return Err(syntax_error(node, source));
    }
    Ok(tree)
}

/// Parse `source`, keeping error nodes in the tree.
pub(crate) fn parse_lenient(source: &str, grammar: Grammar) -> ParseResult<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language())
        .map_err(ParseError::unavailable)?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParseError::unavailable("parser returned no tree"))
}

/// The first error or missing node in document order.
pub(crate) fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    children(node).into_iter().find_map(first_error)
}

fn syntax_error(node: Node<'_>, source: &str) -> ParseError {
    if node.is_missing() {
        return ParseError::missing(node.kind(), node.start_byte() as u32).at_line(line(node));
    }
    let mut leaves = Vec::new();
    collect_leaves(node, &mut leaves);
    match leaves.first() {
        Some(leaf) => {
            let found: String = text(*leaf, source).chars().take(40).collect();
            let span = Span::new(leaf.start_byte() as u32, leaf.end_byte() as u32);
            ParseError::unexpected(&found, span).at_line(line(*leaf))
        }
        None => ParseError::unexpected_eof(node.start_byte() as u32).at_line(line(node)),
    }
}

/// Source text of a node.
pub(crate) fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// 1-based start line.
pub(crate) fn line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

pub(crate) fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Named children other than comments.
pub(crate) fn significant(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Children with the field name each one is stored under.
pub(crate) fn fields(node: Node<'_>) -> Vec<(Option<&'static str>, Node<'_>)> {
    let mut cursor = node.walk();
    let mut out = Vec::new();
    if cursor.goto_first_child() {
        loop {
            out.push((cursor.field_name(), cursor.node()));
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    out
}

fn collect_leaves<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "comment" || node.start_byte() == node.end_byte() {
        return;
    }
    if node.child_count() == 0 || ATOMIC.contains(&node.kind()) {
        out.push(node);
        return;
    }
    for child in children(node) {
        collect_leaves(child, out);
    }
}

/// Print nodes on one line, keeping a single space wherever the source had
/// whitespace or a comment between two tokens.
pub(crate) fn render_nodes<'t>(nodes: impl IntoIterator<Item = Node<'t>>, source: &str) -> String {
    let mut leaves = Vec::new();
    for node in nodes {
        collect_leaves(node, &mut leaves);
    }

    let mut out = String::new();
    let mut prev: Option<(usize, &str)> = None;
    for leaf in leaves {
        let token = text(leaf, source);
        if let Some((end, prev_token)) = prev {
            let tight = matches!(prev_token, "(" | "[" | "#[")
                || matches!(token, ")" | "]" | "," | ";");
            if leaf.start_byte() > end && !tight {
                out.push(' ');
            }
        }
        out.push_str(token);
        prev = Some((leaf.end_byte(), token));
    }
    out
}

pub(crate) fn render(node: Node<'_>, source: &str) -> String {
    render_nodes([node], source)
}

/// Print a delimited node without its first and last child.
pub(crate) fn render_inner(node: Node<'_>, source: &str) -> String {
    let children = children(node);
    match children.len() {
        0..=2 => String::new(),
        len => render_nodes(children[1..len - 1].iter().copied(), source),
    }
}
