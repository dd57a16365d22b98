//! Pretty printer for the statement AST.

use crate::ast::*;

const INDENT: &str = "    ";

/// Print statements, one per line, with four-space indentation.
pub fn print(stmts: &[Stmt]) -> String {
    let mut printer = Printer::default();
    printer.stmts(stmts);
    printer.lines.join("\n")
}

/// Print statements as a complete PHP file.
pub fn print_file(stmts: &[Stmt]) -> String {
    let body = print(stmts);
    if body.is_empty() {
        "<?php\n".to_string()
    } else {
        format!("<?php\n\n{body}\n")
    }
}

#[derive(Default)]
struct Printer {
    lines: Vec<String>,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        self.lines.push(format!("{}{}", INDENT.repeat(self.indent), text));
    }

    fn comment(&mut self, comment: &Comment) {
        for (i, part) in comment.text.lines().enumerate() {
            let part = part.trim();
            if i > 0 && part.starts_with('*') {
                self.line(&format!(" {part}"));
            } else {
                self.line(part);
            }
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        self.stmts(stmts);
        self.indent -= 1;
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        for comment in &stmt.comments {
            self.comment(comment);
        }
        match &stmt.kind {
            StmtKind::Nop => {}
            StmtKind::Expression(expr) => self.line(&format!("{expr};")),
            StmtKind::Echo(exprs) => {
                let args: Vec<&str> = exprs.iter().map(Expr::as_str).collect();
                self.line(&format!("echo {};", args.join(", ")));
            }
            StmtKind::If(stmt) => {
                self.line(&format!("if ({}) {{", stmt.cond));
                self.block(&stmt.then);
                for else_if in &stmt.else_ifs {
                    self.line(&format!("}} elseif ({}) {{", else_if.cond));
                    self.block(&else_if.body);
                }
                if let Some(otherwise) = &stmt.otherwise {
                    self.line("} else {");
                    self.block(otherwise);
                }
                self.line("}");
            }
            StmtKind::Foreach(stmt) => {
                let target = match &stmt.key {
                    Some(key) => format!("{key} => {}", stmt.value),
                    None => stmt.value.to_string(),
                };
                self.line(&format!("foreach ({} as {target}) {{", stmt.subject));
                self.block(&stmt.body);
                self.line("}");
            }
            StmtKind::For { header, body } => {
                self.line(&format!("for ({header}) {{"));
                self.block(body);
                self.line("}");
            }
            StmtKind::While { cond, body } => {
                self.line(&format!("while ({cond}) {{"));
                self.block(body);
                self.line("}");
            }
            StmtKind::Closure(closure) => {
                let mut head = String::new();
                if closure.is_static {
                    head.push_str("static ");
                }
                head.push_str(&format!("function ({})", closure.params));
                if !closure.uses.is_empty() {
                    head.push_str(&format!(" use ({})", closure.uses.join(", ")));
                }
                head.push_str(" {");
                self.line(&head);
                self.block(&closure.body);
                self.line("};");
            }
            StmtKind::Block(body) => {
                self.line("{");
                self.block(body);
                self.line("}");
            }
            StmtKind::Use(name) => self.line(&format!("use {name};")),
            StmtKind::InlineHtml(html) => self.line(&format!("?>{html}<?php")),
            StmtKind::Raw(text) => self.line(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_code};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_control_flow() {
        let stmts = parse_code(
            "if(isset($errors)): if(count($errors) > 0): foreach($errors->all() as $error): echo e($error); endforeach; else: echo 'none'; endif; endif;",
        )
        .unwrap();
        assert_eq!(
            print(&stmts),
            "if (isset($errors)) {\n    if (count($errors) > 0) {\n        foreach ($errors->all() as $error) {\n            echo e($error);\n        }\n    } else {\n        echo 'none';\n    }\n}"
        );
    }

    #[test]
    fn test_print_closure_and_comments() {
        let stmts = parse_code(
            "/** file: a.php, line: 1 */ (function () use($__env, $a) { $b = $a; });",
        )
        .unwrap();
        assert_eq!(
            print_file(&stmts),
            "<?php\n\n/** file: a.php, line: 1 */\nfunction () use ($__env, $a) {\n    $b = $a;\n};\n"
        );
    }

    #[test]
    fn test_print_is_stable() {
        let source = "<?php\n\nif ($a) {\n    echo $a, $b;\n} elseif ($c) {\n    for ($i = 0; $i < 3; $i++) {\n    }\n}\nuse Foo\\Bar;\n";
        let once = print_file(&parse(source).unwrap());
        assert_eq!(once, source);
        assert_eq!(print_file(&parse(&once).unwrap()), once);
    }

    #[test]
    fn test_print_multiline_doc_comment() {
        let stmts = parse_code("/**\n   * @var int $a\n   */\n$a = 1;").unwrap();
        assert_eq!(print(&stmts), "/**\n * @var int $a\n */\n$a = 1;");
    }
}
