use crate::lexer::TokenKind;

/// An ordered sequence of statements.
pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A binary operation (e.g. `a + b`), or a unary one when `lhs` is `None` (e.g. `!a`).
    Operation {
        op: TokenKind,
        lhs: Option<Box<Expr>>,
        rhs: Box<Expr>,
    },
    Bool(bool),
    Nil,
    /// A numeric literal. Literals written in source are always floating point.
    Number { value: f64, is_float: bool },
    Str(String),
    /// An identifier (e.g. `foo`).
    Identifier(String),
    /// A function call (e.g. `foo(1, bar)`).
    FuncCall { callee: String, args: Vec<Expr> },
}

impl Expr {
    pub fn binary(op: TokenKind, lhs: Expr, rhs: Expr) -> Self {
        Expr::Operation {
            op,
            lhs: Some(Box::new(lhs)),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: TokenKind, rhs: Expr) -> Self {
        Expr::Operation {
            op,
            lhs: None,
            rhs: Box::new(rhs),
        }
    }

    /// A floating point literal.
    pub fn number(value: f64) -> Self {
        Expr::Number {
            value,
            is_float: true,
        }
    }

    /// An integer literal. Only synthesized by the compiler.
    pub fn integer(value: i64) -> Self {
        Expr::Number {
            value: value as f64,
            is_float: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CondBlock {
    pub condition: Expr,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// The `if` branch followed by every `elif` branch, in source order.
    pub branches: Vec<CondBlock>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<String>,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_type: String,
    /// Empty for a forward declaration.
    pub body: Block,
}

impl FuncDecl {
    pub fn is_forward_decl(&self) -> bool {
        self.body.is_empty()
    }
}

/// A statement and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    /// 1-based.
    pub line: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    If(IfStmt),
    Assign { ident: String, value: Expr },
    DeclareVar(VarDecl),
    DeclareFunc(FuncDecl),
    While { condition: Expr, body: Block },
    /// Only the first value is lowered.
    Return(Vec<Expr>),
    /// An expression evaluated for its side effects (e.g. `print(x);`).
    Expr(Expr),
}
