//! Statement-level AST for PHP.
//!
//! Only statements are structured. Expressions keep their normalized source
//! text, which is all the template pipeline needs to match and rewrite them.

use smol_str::SmolStr;
use std::fmt;

/// A comment attached to the statement that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    /// 1-based line of the comment start.
    pub line: u32,
}

impl Comment {
    /// A comment starting on `line`.
    pub fn new(text: impl Into<String>, line: u32) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }

    /// Check if this is a `/** ... */` doc comment.
    pub fn is_doc(&self) -> bool {
        self.text.starts_with("/**")
    }
}

/// An expression as normalized single-line source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Expr(String);

impl Expr {
    /// Wrap already normalized expression text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The expression text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Expr {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// A statement with its leading comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub comments: Vec<Comment>,
    /// 1-based start line; 0 for synthesized statements.
    pub line: u32,
}

impl Stmt {
    /// Create a synthesized statement.
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            comments: Vec::new(),
            line: 0,
        }
    }

    /// A statement that only carries comments.
    pub fn nop(comments: Vec<Comment>) -> Self {
        let line = comments.first().map_or(0, |c| c.line);
        Self {
            kind: StmtKind::Nop,
            comments,
            line,
        }
    }

    /// A synthesized `expr;` statement.
    pub fn expression(expr: impl Into<Expr>) -> Self {
        Self::new(StmtKind::Expression(expr.into()))
    }

    /// A synthesized `echo expr;` statement.
    pub fn echo(expr: impl Into<Expr>) -> Self {
        Self::new(StmtKind::Echo(vec![expr.into()]))
    }

    /// Replace the leading comments.
    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = comments;
        self
    }

    /// Nested statement lists, in document order.
    pub fn bodies(&self) -> Vec<&Vec<Stmt>> {
        match &self.kind {
            StmtKind::If(stmt) => {
                let mut bodies = vec![&stmt.then];
                bodies.extend(stmt.else_ifs.iter().map(|e| &e.body));
                bodies.extend(stmt.otherwise.as_ref());
                bodies
            }
            StmtKind::Foreach(stmt) => vec![&stmt.body],
            StmtKind::For { body, .. } | StmtKind::While { body, .. } => vec![body],
            StmtKind::Closure(closure) => vec![&closure.body],
            StmtKind::Block(body) => vec![body],
            _ => Vec::new(),
        }
    }

    /// Mutable nested statement lists, in document order.
    pub fn bodies_mut(&mut self) -> Vec<&mut Vec<Stmt>> {
        match &mut self.kind {
            StmtKind::If(stmt) => {
                let mut bodies = vec![&mut stmt.then];
                bodies.extend(stmt.else_ifs.iter_mut().map(|e| &mut e.body));
                bodies.extend(stmt.otherwise.as_mut());
                bodies
            }
            StmtKind::Foreach(stmt) => vec![&mut stmt.body],
            StmtKind::For { body, .. } | StmtKind::While { body, .. } => vec![body],
            StmtKind::Closure(closure) => vec![&mut closure.body],
            StmtKind::Block(body) => vec![body],
            _ => Vec::new(),
        }
    }
}

/// What a statement is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// `expr;`
    Expression(Expr),
    /// `echo a, b;`
    Echo(Vec<Expr>),
    If(IfStmt),
    Foreach(ForeachStmt),
    For { header: Expr, body: Vec<Stmt> },
    While { cond: Expr, body: Vec<Stmt> },
    /// A closure used as a statement: `function () use ($a) { ... };`
    Closure(Closure),
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `use Foo\Bar;` (the text after `use`)
    Use(String),
    InlineHtml(String),
    /// Declarations kept verbatim (functions, classes, switch, try).
    Raw(String),
    /// Comments only.
    Nop,
}

/// `if` with its `elseif` and `else` arms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub else_ifs: Vec<ElseIf>,
    pub otherwise: Option<Vec<Stmt>>,
}

/// One `elseif` arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// `foreach (subject as key => value)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeachStmt {
    pub subject: Expr,
    pub key: Option<Expr>,
    pub value: Expr,
    pub body: Vec<Stmt>,
}

/// An anonymous function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub is_static: bool,
    pub params: String,
    /// Captured variables as written, e.g. `$a` or `&$b`.
    pub uses: Vec<SmolStr>,
    pub body: Vec<Stmt>,
}

/// Visit every statement in document order, parents before children.
pub fn walk<'a>(stmts: &'a [Stmt], visit: &mut impl FnMut(&'a Stmt)) {
    for stmt in stmts {
        visit(stmt);
        for body in stmt.bodies() {
            walk(body, visit);
        }
    }
}
