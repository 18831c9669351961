use crate::ast::{Block, CondBlock, Expr, FuncDecl, IfStmt, Param, Stmt, StmtKind, VarDecl};
use crate::lexer::{Lexer, Token, TokenKind};
use begonia_source::{CompileError, CompileResult, Source};

mod expr;
mod stmt;

/// Deepest nesting of blocks and sub-expressions accepted before giving up.
pub const MAX_NESTING_DEPTH: usize = 64;
/// Longest run of operators of one precedence level folded into a single expression.
pub const MAX_OPERATOR_CHAIN: usize = 256;

/// Statement classes recognised from the next one or two tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementKind {
    If,
    DeclareVar,
    DeclareFunc,
    Assign,
    While,
    Return,
    Expr,
    /// A lone `;`.
    Empty,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Blocks and sub-expressions currently being parsed.
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a Source) -> Self {
        Self {
            lexer: Lexer::new(source),
            depth: 0,
        }
    }

    /// Parses statements until `Eof` and returns them as the top-level block.
    pub fn parse_program(&mut self) -> CompileResult<Block> {
        let mut block = Block::new();
        while self.peek_kind(0)? != TokenKind::Eof {
            if let Some(stmt) = self.parse_stmt()? {
                block.push(stmt);
            }
        }
        Ok(block)
    }
}

/// Parse utilities
impl<'a> Parser<'a> {
    fn next(&mut self) -> CompileResult<Token> {
        self.lexer.next_token()
    }

    fn peek(&mut self, step: usize) -> CompileResult<Token> {
        self.lexer.look_ahead(step)
    }

    fn peek_kind(&mut self, step: usize) -> CompileResult<TokenKind> {
        Ok(self.lexer.look_ahead(step)?.kind)
    }

    /// Predicate that tests whether the next token is of `kind` and eats it if yes as a side effect.
    fn eat(&mut self, kind: TokenKind) -> CompileResult<bool> {
        if self.peek_kind(0)? == kind {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consumes the next token, which must be of `kind`.
    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(unexpected(&token, kind))
        }
    }

    /// Runs `parse` one nesting level deeper. Fails on the next token once
    /// [`MAX_NESTING_DEPTH`] is reached.
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek(0)?;
            return Err(unexpected(&token, format!("less deeply nested {}", what)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_ident(&mut self) -> CompileResult<String> {
        Ok(self.expect(TokenKind::Identifier)?.lexeme)
    }

    /// Consumes a type name: an identifier or one of the `double` and `string` keywords.
    fn expect_type_name(&mut self) -> CompileResult<String> {
        let token = self.next()?;
        if token.kind.is_type_name() {
            Ok(token.lexeme)
        } else {
            Err(unexpected(&token, "type"))
        }
    }
}

/// Raises an unexpected token error.
fn unexpected(token: &Token, expected: impl ToString) -> CompileError {
    CompileError::Parse {
        location: token.location(),
        expected: expected.to_string(),
        found: token.lexeme.clone(),
    }
}
