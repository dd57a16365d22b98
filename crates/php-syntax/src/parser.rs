//! Statement trees lowered from tree-sitter-php syntax trees.
//!
//! Control structures in brace and alternative (`if: ... endif;`) syntax
//! lower to the same nodes. Expressions keep their source text, printed on
//! one line.

use crate::ast::*;
use crate::error::ParseResult;
use crate::tree::{self, fields, render, render_inner, render_nodes, significant, Grammar};
use smol_str::SmolStr;
use tree_sitter::Node;

/// Parse a PHP file (markup mode until the first `<?php`).
pub fn parse(source: &str) -> ParseResult<Vec<Stmt>> {
    let tree = tree::parse_tree(source, Grammar::File)?;
    Ok(Lowering { source }.block(tree.root_node()))
}

/// Parse a bare code fragment without an open tag.
pub fn parse_code(source: &str) -> ParseResult<Vec<Stmt>> {
    let tree = tree::parse_tree(source, Grammar::Code)?;
    Ok(Lowering { source }.block(tree.root_node()))
}

/// Kinds that hold a statement list.
const BLOCKS: &[&str] = &["compound_statement", "colon_block"];

const CLOSURES: &[&str] = &["anonymous_function", "anonymous_function_creation_expression"];

struct Lowering<'s> {
    source: &'s str,
}

impl<'s> Lowering<'s> {
    fn comment(&self, node: Node<'_>) -> Comment {
        Comment::new(tree::text(node, self.source), tree::line(node))
    }

    fn block(&self, node: Node<'_>) -> Vec<Stmt> {
        self.statements(tree::children(node))
    }

    /// Lower a run of sibling nodes. Comments attach to the next statement;
    /// those left at the end become a [`StmtKind::Nop`].
    fn statements(&self, nodes: Vec<Node<'_>>) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        let mut comments = Vec::new();
        let mut echo_tag = false;
        for node in nodes {
            match node.kind() {
                "comment" => comments.push(self.comment(node)),
                "php_tag" => echo_tag = tree::text(node, self.source) == "<?=",
                "text_interpolation" => {
                    echo_tag = tree::children(node)
                        .last()
                        .is_some_and(|tag| tree::text(*tag, self.source) == "<?=");
                    if let Some(html) = self.inline_html(node) {
                        let mut stmt = Stmt::new(StmtKind::InlineHtml(html));
                        stmt.line = tree::line(node);
                        stmts.push(stmt.with_comments(std::mem::take(&mut comments)));
                    }
                }
                _ if !node.is_named() => {}
                _ => {
                    if let Some(mut stmt) = self.statement(node, echo_tag) {
                        stmt.comments.splice(0..0, std::mem::take(&mut comments));
                        stmts.push(stmt);
                    }
                    echo_tag = false;
                }
            }
        }
        push_trailing(&mut stmts, comments);
        stmts
    }

    /// Markup of a `?> ... <?php` run, without the newline PHP drops after
    /// `?>`.
    fn inline_html(&self, node: Node<'_>) -> Option<String> {
        let text = tree::children(node)
            .into_iter()
            .find(|child| child.kind() == "text")
            .map(|child| tree::text(child, self.source))?;
        let text = text
            .strip_prefix("\r\n")
            .or_else(|| text.strip_prefix('\n'))
            .unwrap_or(text);
        (!text.is_empty()).then(|| text.to_string())
    }

    fn statement(&self, node: Node<'_>, echo_tag: bool) -> Option<Stmt> {
        let mut leading = Vec::new();
        let kind = match node.kind() {
            "empty_statement" => return None,
            "text" => StmtKind::InlineHtml(tree::text(node, self.source).to_string()),
            "expression_statement" => {
                let expr = significant(node).into_iter().next()?;
                match self.closure(expr) {
                    Some(closure) => StmtKind::Closure(closure),
                    None if echo_tag => StmtKind::Echo(vec![self.expr(expr)]),
                    None => StmtKind::Expression(self.expr(expr)),
                }
            }
            "echo_statement" => StmtKind::Echo(self.echo_args(node)),
            "compound_statement" => StmtKind::Block(self.block(node)),
            "if_statement" => StmtKind::If(self.if_statement(node, &mut leading)),
            "foreach_statement" => self.foreach_statement(node, &mut leading),
            "for_statement" => {
                let children = tree::children(node);
                let open = children.iter().position(|c| c.kind() == "(" && !c.is_named());
                let close = children.iter().rposition(|c| c.kind() == ")" && !c.is_named());
                let header = match (open, close) {
                    (Some(open), Some(close)) if open < close => {
                        render_nodes(children[open + 1..close].iter().copied(), self.source)
                    }
                    _ => String::new(),
                };
                StmtKind::For {
                    header: Expr::new(header),
                    body: self.loop_body(node, &mut leading),
                }
            }
            "while_statement" => StmtKind::While {
                cond: self.condition(node),
                body: self.loop_body(node, &mut leading),
            },
            "namespace_use_declaration" => {
                let clause: Vec<Node<'_>> = tree::children(node)
                    .into_iter()
                    .filter(|c| !matches!(c.kind(), "use" | ";"))
                    .collect();
                StmtKind::Use(render_nodes(clause, self.source))
            }
            _ => StmtKind::Raw(self.raw(node)),
        };
        let mut stmt = Stmt::new(kind).with_comments(leading);
        stmt.line = tree::line(node);
        Some(stmt)
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        Expr::new(render(node, self.source))
    }

    /// Declarations and other statements kept verbatim, terminated.
    fn raw(&self, node: Node<'_>) -> String {
        let mut text = render(node, self.source);
        if !text.ends_with(';') && !text.ends_with('}') {
            text.push(';');
        }
        text
    }

    fn echo_args(&self, node: Node<'_>) -> Vec<Expr> {
        let mut exprs = Vec::new();
        let mut pending: Vec<Node<'_>> = significant(node);
        while let Some(next) = pending.pop() {
            if next.kind() == "sequence_expression" {
                pending.extend(significant(next));
            } else {
                exprs.push(self.expr(next));
            }
        }
        exprs.reverse();
        exprs
    }

    /// The inside of a statement's parenthesized `condition`.
    fn condition(&self, node: Node<'_>) -> Expr {
        Expr::new(
            node.child_by_field_name("condition")
                .map(|cond| render_inner(cond, self.source))
                .unwrap_or_default(),
        )
    }

    /// A body given as a block or a single statement.
    fn body(&self, node: Node<'_>) -> Vec<Stmt> {
        if BLOCKS.contains(&node.kind()) {
            return self.block(node);
        }
        self.statements(vec![node])
    }

    /// The statements after a loop header. Comments inside the header move
    /// to `leading`.
    fn loop_body(&self, node: Node<'_>, leading: &mut Vec<Comment>) -> Vec<Stmt> {
        let parts = fields(node);
        let start = parts
            .iter()
            .rposition(|(field, child)| {
                *field == Some("condition") || (child.kind() == ")" && !child.is_named())
            })
            .map_or(0, |i| i + 1);
        for (_, child) in &parts[..start] {
            if child.kind() == "comment" {
                leading.push(self.comment(*child));
            }
        }
        let nodes = parts[start..]
            .iter()
            .flat_map(|(_, child)| {
                if BLOCKS.contains(&child.kind()) {
                    tree::children(*child)
                } else {
                    vec![*child]
                }
            })
            .collect();
        self.statements(nodes)
    }

    fn foreach_statement(&self, node: Node<'_>, leading: &mut Vec<Comment>) -> StmtKind {
        let children = tree::children(node);
        let close = children
            .iter()
            .rposition(|c| c.kind() == ")" && !c.is_named())
            .unwrap_or(children.len());
        let header: Vec<Node<'_>> = children[..close]
            .iter()
            .copied()
            .filter(|c| c.is_named() && c.kind() != "comment")
            .collect();
        let subject = header.first().map(|n| self.expr(*n)).unwrap_or_default();
        let (key, value) = match header.get(1) {
            Some(pair) if pair.kind() == "pair" => {
                let sides = significant(*pair);
                (
                    sides.first().map(|n| self.expr(*n)),
                    sides.last().map(|n| self.expr(*n)).unwrap_or_default(),
                )
            }
            Some(value) => (None, self.expr(*value)),
            None => (None, Expr::default()),
        };
        StmtKind::Foreach(ForeachStmt {
            subject,
            key,
            value,
            body: self.loop_body(node, leading),
        })
    }

    fn if_statement(&self, node: Node<'_>, leading: &mut Vec<Comment>) -> IfStmt {
        let mut arms = Arms::default();
        for (field, child) in fields(node) {
            match (field, child.kind()) {
                (_, "comment") => arms.comment(self.comment(child), leading),
                (Some("condition"), _) => {
                    arms.conds.push(Expr::new(render_inner(child, self.source)))
                }
                (Some("body"), _) => arms.bodies.push(self.body(child)),
                (_, "else_if_clause" | "else_if_clause_2") => {
                    for (field, part) in fields(child) {
                        match (field, part.kind()) {
                            (_, "comment") => arms.comment(self.comment(part), leading),
                            (Some("condition"), _) => {
                                arms.conds.push(Expr::new(render_inner(part, self.source)))
                            }
                            (Some("body"), _) => arms.bodies.push(self.body(part)),
                            _ => {}
                        }
                    }
                }
                (_, "else_clause" | "else_clause_2") => {
                    for (field, part) in fields(child) {
                        match (field, part.kind()) {
                            (_, "comment") => arms.comment(self.comment(part), leading),
                            (Some("body"), "if_statement") => {
                                let mut nested_leading = Vec::new();
                                let nested = self.if_statement(part, &mut nested_leading);
                                for comment in nested_leading {
                                    arms.comment(comment, leading);
                                }
                                arms.conds.push(nested.cond);
                                arms.bodies.push(nested.then);
                                for else_if in nested.else_ifs {
                                    arms.conds.push(else_if.cond);
                                    arms.bodies.push(else_if.body);
                                }
                                if let Some(otherwise) = nested.otherwise {
                                    arms.bodies.push(otherwise);
                                }
                            }
                            (Some("body"), _) => arms.bodies.push(self.body(part)),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        arms.finish()
    }

    /// A closure used as a statement, bare or parenthesized.
    fn closure(&self, node: Node<'_>) -> Option<Closure> {
        let node = match node.kind() {
            "parenthesized_expression" => match significant(node).as_slice() {
                [inner] => *inner,
                _ => return None,
            },
            _ => node,
        };
        if !CLOSURES.contains(&node.kind()) {
            return None;
        }
        let mut closure = Closure {
            is_static: false,
            params: String::new(),
            uses: Vec::new(),
            body: Vec::new(),
        };
        for (field, child) in fields(node) {
            match (field, child.kind()) {
                (Some("parameters"), _) => closure.params = render_inner(child, self.source),
                (Some("body"), _) => closure.body = self.block(child),
                (_, "static_modifier" | "static") => closure.is_static = true,
                (_, "anonymous_function_use_clause") => {
                    closure.uses = significant(child)
                        .into_iter()
                        .map(|var| SmolStr::new(render(var, self.source)))
                        .collect();
                }
                _ => {}
            }
        }
        Some(closure)
    }
}

/// Conditions and bodies of an `if` chain, in source order.
#[derive(Default)]
struct Arms {
    conds: Vec<Expr>,
    bodies: Vec<Vec<Stmt>>,
}

impl Arms {
    /// A comment between arms ends the body before it.
    fn comment(&mut self, comment: Comment, leading: &mut Vec<Comment>) {
        match self.bodies.last_mut() {
            Some(body) => match body.last_mut() {
                Some(last) if matches!(last.kind, StmtKind::Nop) => last.comments.push(comment),
                _ => body.push(Stmt::nop(vec![comment])),
            },
            None => leading.push(comment),
        }
    }

    fn finish(self) -> IfStmt {
        let mut conds = self.conds.into_iter();
        let mut bodies = self.bodies.into_iter();
        let cond = conds.next().unwrap_or_default();
        let then = bodies.next().unwrap_or_default();
        let else_ifs = conds
            .map(|cond| ElseIf {
                cond,
                body: bodies.next().unwrap_or_default(),
            })
            .collect();
        IfStmt {
            cond,
            then,
            else_ifs,
            otherwise: bodies.next(),
        }
    }
}

fn push_trailing(stmts: &mut Vec<Stmt>, comments: Vec<Comment>) {
    if !comments.is_empty() {
        stmts.push(Stmt::nop(comments));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alternative_syntax_matches_braces() {
        let alt = parse("<?php if($a): ?>\n<p><?php echo e($a); ?></p>\n<?php endif; ?>").unwrap();
        let braces = parse_code("if ($a) { echo e($a); }").unwrap();

        let (StmtKind::If(left), StmtKind::If(right)) = (&alt[0].kind, &braces[0].kind) else {
            panic!("expected if statements");
        };
        assert_eq!(left.cond, right.cond);
        let echoes = |body: &[Stmt]| {
            body.iter()
                .filter(|s| matches!(s.kind, StmtKind::Echo(_)))
                .count()
        };
        assert_eq!(echoes(&left.then), 1);
        assert_eq!(echoes(&right.then), 1);
    }

    #[test]
    fn test_elseif_chain() {
        let stmts = parse_code(
            "if ($a): echo 1; elseif ($b): echo 2; else: echo 3; endif;\nif ($c) {} else if ($d) {} else {}",
        )
        .unwrap();
        assert_eq!(stmts.len(), 2);
        for stmt in &stmts {
            let StmtKind::If(stmt) = &stmt.kind else {
                panic!("expected if");
            };
            assert_eq!(stmt.else_ifs.len(), 1);
            assert!(stmt.otherwise.is_some());
        }
    }

    #[test]
    fn test_comments_attach_to_statements() {
        let stmts =
            parse_code("/** file: a.php, line: 1 */ foo();\n/** file: a.php, line: 2 */ bar();")
                .unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].comments[0].text, "/** file: a.php, line: 1 */");
        assert_eq!(stmts[1].line, 2);
    }

    #[test]
    fn test_trailing_comments_become_nop() {
        let stmts = parse_code("if ($a) {\n foo();\n /** end */\n}").unwrap();
        let StmtKind::If(stmt) = &stmts[0].kind else {
            panic!("expected if");
        };
        assert_eq!(stmt.then.len(), 2);
        assert!(matches!(stmt.then[1].kind, StmtKind::Nop));
        assert_eq!(stmt.then[1].line, 3);
    }

    #[test]
    fn test_comment_before_else_ends_then_branch() {
        let stmts = parse(
            "<?php if ($a): ?>\n<?php echo 1; ?>\n<?php /** file: a.php, line: 3 */ else: ?>\n<?php echo 2; ?>\n<?php endif; ?>",
        )
        .unwrap();
        let StmtKind::If(stmt) = &stmts[0].kind else {
            panic!("expected if");
        };
        let marker_in = |body: &[Stmt]| {
            body.iter()
                .any(|s| s.comments.iter().any(|c| c.text.contains("line: 3")))
        };
        assert!(stmts[0].comments.is_empty());
        assert!(marker_in(&stmt.then) || stmt.otherwise.as_deref().is_some_and(marker_in));
    }

    #[test]
    fn test_foreach_key_value() {
        let stmts = parse_code("foreach ($items as $key => $item): endforeach;").unwrap();
        let StmtKind::Foreach(stmt) = &stmts[0].kind else {
            panic!("expected foreach");
        };
        assert_eq!(stmt.subject.as_str(), "$items");
        assert_eq!(stmt.key.as_ref().map(Expr::as_str), Some("$key"));
        assert_eq!(stmt.value.as_str(), "$item");
        assert!(stmt.body.is_empty());
    }

    #[test]
    fn test_loops_keep_bodies() {
        let stmts = parse_code(
            "for ($i = 0; $i < 3; $i++): echo $i; endfor;\nwhile ($a) { $a--; }\nforeach ($rows as $row) echo $row;",
        )
        .unwrap();
        let StmtKind::For { header, body } = &stmts[0].kind else {
            panic!("expected for");
        };
        assert_eq!(header.as_str(), "$i = 0; $i < 3; $i++");
        assert_eq!(body.len(), 1);
        let StmtKind::While { cond, body } = &stmts[1].kind else {
            panic!("expected while");
        };
        assert_eq!(cond.as_str(), "$a");
        assert_eq!(body, &vec![Stmt {
            kind: StmtKind::Expression(Expr::new("$a--")),
            comments: Vec::new(),
            line: 2,
        }]);
        let StmtKind::Foreach(stmt) = &stmts[2].kind else {
            panic!("expected foreach");
        };
        assert_eq!(stmt.body.len(), 1);
    }

    #[test]
    fn test_closure_statement() {
        let stmts = parse_code("(function () use($__env, $a) {\n $b = 1;\n});").unwrap();
        let StmtKind::Closure(closure) = &stmts[0].kind else {
            panic!("expected closure");
        };
        assert_eq!(closure.uses, vec![SmolStr::new("$__env"), SmolStr::new("$a")]);
        assert_eq!(closure.body.len(), 1);

        let stmts = parse_code("$f = function () { return 1; };").unwrap();
        assert!(matches!(stmts[0].kind, StmtKind::Expression(_)));
    }

    #[test]
    fn test_use_and_raw() {
        let stmts =
            parse_code("use App\\Models\\User;\nfunction foo() { return 1; }\nswitch ($a) { case 1: break; }")
                .unwrap();
        assert_eq!(stmts[0].kind, StmtKind::Use("App\\Models\\User".to_string()));
        assert!(matches!(stmts[1].kind, StmtKind::Raw(_)));
        assert!(matches!(stmts[2].kind, StmtKind::Raw(_)));
    }

    #[test]
    fn test_echo_tag() {
        let stmts = parse("<p><?= $a ?></p>").unwrap();
        assert_eq!(stmts[0].kind, StmtKind::InlineHtml("<p>".to_string()));
        assert_eq!(stmts[1].kind, StmtKind::Echo(vec![Expr::new("$a")]));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_code("echo $a +;").is_err());
        assert!(parse_code("foo($a];").is_err());
        assert!(parse_code("foo($a;").is_err());
        assert!(parse_code("$a $b;").is_err());
        assert!(parse_code("endif;").is_err());
        assert!(parse_code("if ($a) { foo(); ").is_err());
        assert!(parse("<?php if ($a): ?> x").is_err());
    }

    #[test]
    fn test_close_tag_terminates() {
        let stmts = parse("<?php echo $a ?>").unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0].kind, StmtKind::Echo(_)));
    }
}
