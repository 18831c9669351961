use super::*;

impl<'a> Parser<'a> {
    /// Classifies the next statement by looking at the next one or two tokens.
    pub(crate) fn try_next_statement_kind(&mut self) -> CompileResult<StatementKind> {
        let token = self.peek(0)?;
        let kind = match token.kind {
            TokenKind::If => StatementKind::If,
            TokenKind::Var => StatementKind::DeclareVar,
            TokenKind::Func => StatementKind::DeclareFunc,
            TokenKind::While => StatementKind::While,
            TokenKind::Return => StatementKind::Return,
            TokenKind::Semicolon => StatementKind::Empty,
            TokenKind::Identifier if self.peek_kind(1)? == TokenKind::Assign => {
                StatementKind::Assign
            }
            // identifiers followed by `(` are calls, anything else is a bare expression
            kind if kind.starts_expr() => StatementKind::Expr,
            _ => return Err(unexpected(&token, "statement")),
        };
        Ok(kind)
    }

    /// Parses a statement. Returns `None` for an empty statement.
    pub fn parse_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        let kind = self.try_next_statement_kind()?;
        let line = self.peek(0)?.line;
        tracing::debug!(?kind, line, "parsing statement");

        let stmt = match kind {
            StatementKind::If => self.parse_if_stmt()?,
            StatementKind::DeclareVar => self.parse_var_declaration()?,
            StatementKind::DeclareFunc => self.parse_func_declaration()?,
            StatementKind::Assign => self.parse_assign_stmt()?,
            StatementKind::While => self.parse_while_stmt()?,
            StatementKind::Return => self.parse_return_stmt()?,
            StatementKind::Expr => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Expr(expr)
            }
            StatementKind::Empty => {
                self.expect(TokenKind::Semicolon)?;
                return Ok(None);
            }
        };
        Ok(Some(Stmt::new(stmt, line)))
    }

    /// Parses `{ stmt* }`.
    pub fn parse_curly_block(&mut self) -> CompileResult<Block> {
        self.nested("block", |parser| {
            parser.expect(TokenKind::LCurly)?;

            let mut body = Block::new();
            loop {
                match parser.peek_kind(0)? {
                    TokenKind::RCurly | TokenKind::Eof => break,
                    _ => {
                        if let Some(stmt) = parser.parse_stmt()? {
                            body.push(stmt);
                        }
                    }
                }
            }

            parser.expect(TokenKind::RCurly)?;
            Ok(body)
        })
    }

    /// `if expr { block } [elif expr { block }]* [else { block }]`
    fn parse_if_stmt(&mut self) -> CompileResult<StmtKind> {
        self.expect(TokenKind::If)?;

        let mut branches = Vec::new();
        let condition = self.parse_expr()?;
        let block = self.parse_curly_block()?;
        branches.push(CondBlock { condition, block });

        while self.eat(TokenKind::Elif)? {
            let condition = self.parse_expr()?;
            let block = self.parse_curly_block()?;
            branches.push(CondBlock { condition, block });
        }

        let else_block = if self.eat(TokenKind::Else)? {
            Some(self.parse_curly_block()?)
        } else {
            None
        };

        Ok(StmtKind::If(IfStmt {
            branches,
            else_block,
        }))
    }

    /// `var name [type] [= expr] ;`
    fn parse_var_declaration(&mut self) -> CompileResult<StmtKind> {
        self.expect(TokenKind::Var)?;
        let name = self.expect_ident()?;

        let ty = if self.peek_kind(0)?.is_type_name() {
            Some(self.next()?.lexeme)
        } else {
            None
        };

        let initializer = if self.eat(TokenKind::Assign)? {
            Some(self.parse_expr()?)
        } else {
            None
        };

        if ty.is_none() && initializer.is_none() {
            let token = self.peek(0)?;
            return Err(unexpected(
                &token,
                format!("type or initializer to infer the type of `{}`", name),
            ));
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(StmtKind::DeclareVar(VarDecl {
            name,
            ty,
            initializer,
        }))
    }

    /// `func name ( [name type [, name type]*] ) type ( ; | { block } )`
    fn parse_func_declaration(&mut self) -> CompileResult<StmtKind> {
        self.expect(TokenKind::Func)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.eat(TokenKind::RParen)? {
            loop {
                let name = self.expect_ident()?;
                let ty = self.expect_type_name()?;
                params.push(Param { name, ty });

                if self.eat(TokenKind::RParen)? {
                    break;
                }
                let token = self.next()?;
                if token.kind != TokenKind::Comma {
                    return Err(unexpected(&token, ", )"));
                }
            }
        }

        let ret_type = self.expect_type_name()?;

        let body = if self.eat(TokenKind::Semicolon)? {
            Block::new() // forward declaration
        } else {
            self.parse_curly_block()?
        };

        Ok(StmtKind::DeclareFunc(FuncDecl {
            name,
            params,
            ret_type,
            body,
        }))
    }

    /// `name = expr ;`
    fn parse_assign_stmt(&mut self) -> CompileResult<StmtKind> {
        let ident = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(StmtKind::Assign { ident, value })
    }

    /// `while expr { block }`
    fn parse_while_stmt(&mut self) -> CompileResult<StmtKind> {
        self.expect(TokenKind::While)?;
        let condition = self.parse_expr()?;
        let body = self.parse_curly_block()?;
        Ok(StmtKind::While { condition, body })
    }

    /// `return [expr [, expr]*] ;`
    fn parse_return_stmt(&mut self) -> CompileResult<StmtKind> {
        self.expect(TokenKind::Return)?;
        let values = if self.peek_kind(0)? == TokenKind::Semicolon {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(StmtKind::Return(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(source: &str) -> StmtKind {
        let source = source.into();
        let mut block = Parser::new(&source).parse_program().unwrap();
        assert_eq!(block.len(), 1);
        block.remove(0).kind
    }

    /// A statement written on the first line.
    fn first_line(kind: StmtKind) -> Stmt {
        Stmt::new(kind, 1)
    }

    fn parse_error(source: &str) -> CompileError {
        let source = source.into();
        Parser::new(&source).parse_program().unwrap_err()
    }

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_string())
    }

    #[test]
    fn test_statement_classification() {
        let cases = vec![
            ("if a { }", StatementKind::If),
            ("var a = 1;", StatementKind::DeclareVar),
            ("func f() void;", StatementKind::DeclareFunc),
            ("a = 1;", StatementKind::Assign),
            ("while a { }", StatementKind::While),
            ("return;", StatementKind::Return),
            ("foo(1);", StatementKind::Expr),
            ("a;", StatementKind::Expr),
            ("(1 + 2);", StatementKind::Expr),
            (";", StatementKind::Empty),
        ];
        for (text, expected) in cases {
            let source = text.into();
            let kind = Parser::new(&source).try_next_statement_kind().unwrap();
            assert_eq!(kind, expected, "classifying {:?}", text);
        }
    }

    #[test]
    fn test_if_elif_else() {
        let stmt = stmt("if a { b = 1; } elif c { } elif d { return; } else { foo(); }");
        assert_eq!(
            stmt,
            StmtKind::If(IfStmt {
                branches: vec![
                    CondBlock {
                        condition: ident("a"),
                        block: vec![first_line(StmtKind::Assign {
                            ident: "b".to_string(),
                            value: Expr::number(1.0),
                        })],
                    },
                    CondBlock {
                        condition: ident("c"),
                        block: vec![],
                    },
                    CondBlock {
                        condition: ident("d"),
                        block: vec![first_line(StmtKind::Return(vec![]))],
                    },
                ],
                else_block: Some(vec![first_line(StmtKind::Expr(Expr::FuncCall {
                    callee: "foo".to_string(),
                    args: vec![],
                }))]),
            })
        );
    }

    #[test]
    fn test_if_without_else() {
        match stmt("if a { }") {
            StmtKind::If(if_stmt) => {
                assert_eq!(if_stmt.branches.len(), 1);
                assert_eq!(if_stmt.else_block, None);
            }
            other => panic!("expected if statement, got {:?}", other),
        }
    }

    #[test]
    fn test_var_declarations() {
        assert_eq!(
            stmt("var a double;"),
            StmtKind::DeclareVar(VarDecl {
                name: "a".to_string(),
                ty: Some("double".to_string()),
                initializer: None,
            })
        );
        assert_eq!(
            stmt("var s string = 'hi';"),
            StmtKind::DeclareVar(VarDecl {
                name: "s".to_string(),
                ty: Some("string".to_string()),
                initializer: Some(Expr::Str("hi".to_string())),
            })
        );
        assert_eq!(
            stmt("var flag bool;"),
            StmtKind::DeclareVar(VarDecl {
                name: "flag".to_string(),
                ty: Some("bool".to_string()),
                initializer: None,
            })
        );
    }

    #[test]
    fn test_var_cannot_infer_type() {
        match parse_error("var a;") {
            CompileError::Parse {
                expected, found, ..
            } => {
                assert_eq!(expected, "type or initializer to infer the type of `a`");
                assert_eq!(found, ";");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_forward_declaration() {
        match stmt("func puts(text string) int;") {
            StmtKind::DeclareFunc(func) => {
                assert!(func.is_forward_decl());
                assert_eq!(func.ret_type, "int");
                assert_eq!(
                    func.params,
                    vec![Param {
                        name: "text".to_string(),
                        ty: "string".to_string(),
                    }]
                );
            }
            other => panic!("expected function declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_func_declaration_errors() {
        assert!(matches!(
            parse_error("func f(a double b double) void;"),
            CompileError::Parse { ref expected, .. } if expected == ", )"
        ));
        assert!(matches!(
            parse_error("func f(a) void;"),
            CompileError::Parse { ref expected, .. } if expected == "type"
        ));
        assert!(matches!(
            parse_error("func f() { }"),
            CompileError::Parse { ref expected, ref found, .. } if expected == "type" && found == "{"
        ));
    }

    #[test]
    fn test_while() {
        assert_eq!(
            stmt("while a { a = 0; }"),
            StmtKind::While {
                condition: ident("a"),
                body: vec![first_line(StmtKind::Assign {
                    ident: "a".to_string(),
                    value: Expr::number(0.0),
                })],
            }
        );
    }

    #[test]
    fn test_return_values() {
        assert_eq!(stmt("return;"), StmtKind::Return(vec![]));
        assert_eq!(stmt("return a;"), StmtKind::Return(vec![ident("a")]));
        assert_eq!(
            stmt("return a, b;"),
            StmtKind::Return(vec![ident("a"), ident("b")])
        );
    }

    #[test]
    fn test_missing_semicolon() {
        match parse_error("a = 1\nb = 2;") {
            CompileError::Parse {
                location,
                expected,
                found,
            } => {
                assert_eq!(location.line, 2);
                assert_eq!(expected, ";");
                assert_eq!(found, "b");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_block() {
        match parse_error("func f() void { return;") {
            CompileError::Parse {
                expected, found, ..
            } => {
                assert_eq!(expected, "}");
                assert_eq!(found, "EOF");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
