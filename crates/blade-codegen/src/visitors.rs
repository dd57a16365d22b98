//! Statement rewrites applied to each template's extracted code.
//!
//! - `$loop = $__env->getLastLoop();` gets a concrete type: a fresh
//!   [`LOOP_CLASS`] inside a `foreach`, `null` outside.
//! - `echo $__env->renderEach(...)` becomes a loop over `$__env->make(...)`.
//! - `echo $__env->renderWhen(...)` / `renderUnless(...)` become a guarded
//!   `$__env->make(...)`, so the include can be inlined like any other.
//! - `use` imports are lifted to the top of the final file.

use crate::helpers::{php_string, DEFINED_VARS, LOOP_CLASS};
use indexmap::IndexSet;
use php_syntax::{
    balanced_prefix, binds_tighter_than_not, split_arguments, string_literal_value, ElseIf, Expr,
    ForeachStmt, IfStmt, Stmt, StmtKind,
};

const LOOP_ASSIGNMENT: &str = "$loop = $__env->getLastLoop()";

/// Apply the loop, each and conditional-include rewrites.
pub fn rewrite(stmts: &mut [Stmt]) {
    rewrite_block(stmts, false);
}

fn rewrite_block(stmts: &mut [Stmt], in_loop: bool) {
    for stmt in stmts.iter_mut() {
        if let Some(kind) = rewrite_statement(&stmt.kind, in_loop) {
            stmt.kind = kind;
        }
        let nested_in_loop = in_loop || matches!(stmt.kind, StmtKind::Foreach(_));
        for body in stmt.bodies_mut() {
            rewrite_block(body, nested_in_loop);
        }
    }
}

fn rewrite_statement(kind: &StmtKind, in_loop: bool) -> Option<StmtKind> {
    match kind {
        StmtKind::Expression(expr) if expr.as_str() == LOOP_ASSIGNMENT => {
            let value = if in_loop {
                format!("new {LOOP_CLASS}()")
            } else {
                "null".to_string()
            };
            Some(StmtKind::Expression(Expr::new(format!("$loop = {value}"))))
        }
        StmtKind::Echo(exprs) if exprs.len() == 1 => {
            let expr = exprs[0].as_str();
            if let Some(args) = env_call(expr, "renderEach") {
                return render_each(&args);
            }
            if let Some(args) = env_call(expr, "renderWhen") {
                return render_when(&args, false);
            }
            if let Some(args) = env_call(expr, "renderUnless") {
                return render_when(&args, true);
            }
            None
        }
        _ => None,
    }
}

/// Arguments of `$__env-><method>(...)` when `expr` is exactly that call.
fn env_call(expr: &str, method: &str) -> Option<Vec<String>> {
    let rest = expr.strip_prefix("$__env->")?.strip_prefix(method)?;
    let call = balanced_prefix(rest)?;
    if call.len() != rest.len() || !call.starts_with('(') {
        return None;
    }
    split_arguments(&call[1..call.len() - 1])
}

fn make(view: &str, data: &str) -> Stmt {
    Stmt::echo(format!(
        "$__env->make({view}, {data}, {DEFINED_VARS})->render()"
    ))
}

fn render_each(args: &[String]) -> Option<StmtKind> {
    let [view, items, name, rest @ ..] = args else {
        return None;
    };
    let name = string_literal_value(name)?;
    let foreach = Stmt::new(StmtKind::Foreach(ForeachStmt {
        subject: Expr::new(items.as_str()),
        key: Some(Expr::new("$key")),
        value: Expr::new(format!("${name}")),
        body: vec![make(
            view,
            &format!("['key' => $key, {} => ${name}]", php_string(&name)),
        )],
    }));

    let Some(empty) = rest.first() else {
        return Some(foreach.kind);
    };
    let otherwise = match string_literal_value(empty)
        .as_deref()
        .and_then(|text| text.strip_prefix("raw|"))
    {
        Some(text) => Stmt::echo(php_string(text)),
        None => make(empty, "[]"),
    };
    Some(StmtKind::If(IfStmt {
        cond: Expr::new(format!("count({items})")),
        then: vec![foreach],
        else_ifs: Vec::<ElseIf>::new(),
        otherwise: Some(vec![otherwise]),
    }))
}

fn render_when(args: &[String], negate: bool) -> Option<StmtKind> {
    let [cond, view, data, ..] = args else {
        return None;
    };
    let cond = if negate { negated(cond) } else { cond.clone() };
    Some(StmtKind::If(IfStmt {
        cond: Expr::new(cond),
        then: vec![Stmt::echo(format!("$__env->make({view}, {data})->render()"))],
        else_ifs: Vec::new(),
        otherwise: None,
    }))
}

/// `!expr`, parenthesized when a top-level operator binds looser than `!`.
fn negated(expr: &str) -> String {
    if binds_tighter_than_not(expr) {
        format!("!{expr}")
    } else {
        format!("!({expr})")
    }
}

/// Remove `use` imports anywhere in `stmts` and return them, deduplicated and
/// in first-seen order. Comments on removed imports stay in place.
pub fn hoist_imports(stmts: &mut Vec<Stmt>) -> Vec<Stmt> {
    let mut imports = IndexSet::new();
    collect_imports(stmts, &mut imports);
    imports
        .into_iter()
        .map(|name| Stmt::new(StmtKind::Use(name)))
        .collect()
}

fn collect_imports(stmts: &mut Vec<Stmt>, imports: &mut IndexSet<String>) {
    let mut kept = Vec::with_capacity(stmts.len());
    for mut stmt in stmts.drain(..) {
        if let StmtKind::Use(name) = &stmt.kind {
            imports.insert(name.trim_start_matches('\\').to_string());
            if !stmt.comments.is_empty() {
                kept.push(Stmt::nop(stmt.comments));
            }
            continue;
        }
        for body in stmt.bodies_mut() {
            collect_imports(body, imports);
        }
        kept.push(stmt);
    }
    *stmts = kept;
}
