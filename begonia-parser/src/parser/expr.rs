use super::*;

/// A precedence level: parses the next tighter level.
type SubExprParser<'a> = fn(&mut Parser<'a>) -> CompileResult<Expr>;

impl<'a> Parser<'a> {
    /* Expressions */
    /// Parses any expression. Logical or has the lowest precedence.
    pub fn parse_expr(&mut self) -> CompileResult<Expr> {
        self.nested("expression", |parser| {
            parser.parse_op_expr(&[TokenKind::Or], Self::parse_and_expr)
        })
    }

    /// Parses a left associative chain of `sub_expr` separated by any of the `accepted` operators.
    fn parse_op_expr(
        &mut self,
        accepted: &[TokenKind],
        sub_expr: SubExprParser<'a>,
    ) -> CompileResult<Expr> {
        let mut lhs = sub_expr(self)?;
        let mut chain = 0;

        loop {
            let op = self.peek_kind(0)?;
            if !accepted.contains(&op) {
                break; // not an operator of this level, stop parsing
            }
            let token = self.next()?;

            // every fold deepens the left spine of the tree
            chain += 1;
            if chain > MAX_OPERATOR_CHAIN {
                return Err(unexpected(
                    &token,
                    format!("shorter chain of `{}` operators", op),
                ));
            }

            let rhs = sub_expr(self)?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_and_expr(&mut self) -> CompileResult<Expr> {
        self.parse_op_expr(&[TokenKind::And], Self::parse_relational_expr)
    }

    fn parse_relational_expr(&mut self) -> CompileResult<Expr> {
        self.parse_op_expr(
            &[
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Neq,
            ],
            Self::parse_additive_expr,
        )
    }

    fn parse_additive_expr(&mut self) -> CompileResult<Expr> {
        self.parse_op_expr(
            &[TokenKind::Add, TokenKind::Sub],
            Self::parse_multiplicative_expr,
        )
    }

    fn parse_multiplicative_expr(&mut self) -> CompileResult<Expr> {
        self.parse_op_expr(
            &[TokenKind::Mul, TokenKind::Div, TokenKind::Mod],
            Self::parse_bitwise_expr,
        )
    }

    fn parse_bitwise_expr(&mut self) -> CompileResult<Expr> {
        self.parse_op_expr(
            &[TokenKind::BitOr, TokenKind::BitAnd, TokenKind::Xor],
            Self::parse_unary_expr,
        )
    }

    /// `!` is right associative and has no left operand.
    fn parse_unary_expr(&mut self) -> CompileResult<Expr> {
        if self.eat(TokenKind::Not)? {
            let rhs = self.nested("expression", Self::parse_unary_expr)?;
            return Ok(Expr::unary(TokenKind::Not, rhs));
        }
        self.parse_primary_expr()
    }

    /// Parses a primary (atom) expression.
    fn parse_primary_expr(&mut self) -> CompileResult<Expr> {
        let token = self.peek(0)?;
        let expr = match token.kind {
            TokenKind::LParen => {
                self.next()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::Identifier => return self.parse_identifier_or_call_expr(),
            TokenKind::Nil => Expr::Nil,
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::Number => match token.lexeme.parse::<f64>() {
                Ok(value) => Expr::number(value),
                Err(_) => return Err(unexpected(&token, "number")),
            },
            TokenKind::Str => Expr::Str(token.lexeme.clone()),
            _ => {
                return Err(unexpected(
                    &token,
                    "(, false, true, nil, number, string, identifier",
                ))
            }
        };
        self.next()?; // eat parsed literal
        Ok(expr)
    }

    /* Expressions.Identifier */
    /// Parses an identifier or a call expression.
    fn parse_identifier_or_call_expr(&mut self) -> CompileResult<Expr> {
        let ident = self.expect_ident()?;

        if self.eat(TokenKind::LParen)? {
            let args = if self.peek_kind(0)? == TokenKind::RParen {
                Vec::new()
            } else {
                self.parse_expr_list()?
            };
            self.expect(TokenKind::RParen)?;
            Ok(Expr::FuncCall {
                callee: ident,
                args,
            })
        } else {
            Ok(Expr::Identifier(ident))
        }
    }

    /// Parses one or more comma separated expressions.
    pub(crate) fn parse_expr_list(&mut self) -> CompileResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(TokenKind::Comma)? {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }
}
