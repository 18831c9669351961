use super::*;
use begonia_ir::BinOp;
use begonia_parser::lexer::TokenKind;

impl<B: IrBackend> Codegen<B> {
    /// Lowers an expression. Identifiers evaluate to their stack slot.
    pub fn generate_expr(&mut self, expr: &Expr) -> CompileResult<ValueId> {
        match expr {
            Expr::Operation { op, lhs, rhs } => match lhs {
                Some(lhs) => self.generate_binary(*op, lhs, rhs),
                None => Err(SemanticError::Unsupported(format!("unary operator `{}`", op)).into()),
            },
            Expr::Bool(value) => Ok(self.backend.const_bool(*value)),
            Expr::Nil => Err(SemanticError::Unsupported("`nil`".to_string()).into()),
            Expr::Number { value, is_float } => Ok(if *is_float {
                self.backend.const_double(*value)
            } else {
                self.backend.const_int(*value as i64)
            }),
            Expr::Str(value) => Ok(self.backend.const_str(value)),
            Expr::Identifier(ident) => self.env.lookup_variable(ident),
            Expr::FuncCall { callee, args } => self.generate_call(callee, args),
        }
    }

    /// Lowers an expression to a value, loading it if it names a stack slot.
    pub fn generate_rvalue(&mut self, expr: &Expr) -> CompileResult<ValueId> {
        let value = self.generate_expr(expr)?;
        self.load_if_slot(value)
    }

    /// Arithmetic is only defined over `double`.
    fn generate_binary(&mut self, op: TokenKind, lhs: &Expr, rhs: &Expr) -> CompileResult<ValueId> {
        let bin_op = match op {
            TokenKind::Add => BinOp::FAdd,
            TokenKind::Sub => BinOp::FSub,
            TokenKind::Mul => BinOp::FMul,
            TokenKind::Div => BinOp::FDiv,
            _ => return Err(SemanticError::Unsupported(format!("operator `{}`", op)).into()),
        };

        let lhs = self.generate_rvalue(lhs)?;
        let rhs = self.generate_rvalue(rhs)?;
        for operand in [lhs, rhs].iter() {
            let ty = self.backend.value_type(*operand);
            if ty != IrType::Double {
                return Err(SemanticError::OperandMismatch {
                    op: op.to_string(),
                    expected: IrType::Double.to_string(),
                    found: ty.to_string(),
                }
                .into());
            }
        }

        Ok(self.backend.binop(bin_op, lhs, rhs, "")?)
    }

    fn generate_call(&mut self, callee: &str, args: &[Expr]) -> CompileResult<ValueId> {
        let entry = self.env.lookup_function(callee)?.clone();
        if entry.sig.params.len() != args.len() {
            return Err(SemanticError::ArgumentCount {
                name: callee.to_string(),
                expected: entry.sig.params.len(),
                found: args.len(),
            }
            .into());
        }

        let mut values = Vec::with_capacity(args.len());
        for (i, (arg, param)) in args.iter().zip(&entry.sig.params).enumerate() {
            let value = self.generate_rvalue(arg)?;
            let found = self.backend.value_type(value);
            if &found != param {
                return Err(SemanticError::TypeMismatch {
                    context: format!("argument {} of `{}`", i + 1, callee),
                    expected: param.to_string(),
                    found: found.to_string(),
                }
                .into());
            }
            values.push(value);
        }

        Ok(self.backend.call(entry.handle, &values, callee)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{entry_instrs, lower, semantic_error};
    use super::*;
    use begonia_ir::chunk::Instr;

    #[test]
    fn test_arithmetic() {
        let module = lower("func f(a double, b double) double { return a - b * a / b; }").unwrap();
        let ops = entry_instrs(&module, "f")
            .into_iter()
            .filter_map(|instr| match instr {
                Instr::Binary { op, .. } => Some(op),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(ops, vec![BinOp::FMul, BinOp::FDiv, BinOp::FSub]);
    }

    #[test]
    fn test_operand_mismatch() {
        assert_eq!(
            semantic_error("func f() void { var s = 'a' + 1; }"),
            SemanticError::OperandMismatch {
                op: "+".to_string(),
                expected: "double".to_string(),
                found: "string".to_string(),
            }
        );
        assert_eq!(
            semantic_error("func f() void { var b = 1 * true; }"),
            SemanticError::OperandMismatch {
                op: "*".to_string(),
                expected: "double".to_string(),
                found: "bool".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_operators() {
        for source in &[
            "func f() void { var b = 1 < 2; }",
            "func f() void { var b = true && false; }",
            "func f() void { var b = 1 % 2; }",
            "func f() void { var b = !true; }",
            "func f() void { var b = nil; }",
        ] {
            assert!(
                matches!(semantic_error(source), SemanticError::Unsupported(_)),
                "{}",
                source
            );
        }
    }

    #[test]
    fn test_call_checks() {
        assert_eq!(
            semantic_error("func f() void { g(); }"),
            SemanticError::UndefinedFunction("g".to_string())
        );
        assert_eq!(
            semantic_error("func f() void { puts(); }"),
            SemanticError::ArgumentCount {
                name: "puts".to_string(),
                expected: 1,
                found: 0,
            }
        );
        assert_eq!(
            semantic_error("func f() void { puts(1); }"),
            SemanticError::TypeMismatch {
                context: "argument 1 of `puts`".to_string(),
                expected: "string".to_string(),
                found: "double".to_string(),
            }
        );
    }

    #[test]
    fn test_string_variables_are_loaded_once() {
        let module = lower("func f() void { var s = 'hi'; puts(s); }").unwrap();
        let instrs = entry_instrs(&module, "f");
        match instrs.as_slice() {
            [Instr::Alloca { dest: slot }, Instr::Store { .. }, Instr::Load { dest, slot: loaded }, Instr::Call { args, .. }, Instr::Ret { value: None }] =>
            {
                assert_eq!(loaded, slot);
                assert_eq!(args, &vec![*dest]);
                assert_eq!(module.value(*dest).ty, IrType::Str);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_recursive_call() {
        let module = lower(
            "func count(n double) double { if n { return count(n - 1); } return n; }",
        )
        .unwrap();
        module.verify().unwrap();
    }

    #[test]
    fn test_outer_function_locals_are_not_shared() {
        // `x` belongs to the entry function and cannot be used from `f`
        assert!(matches!(
            lower("var x = 1; func f() double { return x; }"),
            Err(CompileError::Backend(_))
        ));
    }
}
