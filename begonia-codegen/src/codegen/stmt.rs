use super::*;
use begonia_ir::BinOp;
use begonia_parser::ast::{IfStmt, VarDecl};

impl<B: IrBackend> Codegen<B> {
    /// Lowers `stmt`. Semantic errors are reported on the line of the innermost statement.
    pub fn generate_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let result = match &stmt.kind {
            StmtKind::If(if_stmt) => self.generate_if(if_stmt),
            StmtKind::Assign { ident, value } => self.generate_assign(ident, value),
            StmtKind::DeclareVar(decl) => self.generate_var_declaration(decl),
            StmtKind::DeclareFunc(decl) => self.generate_function(decl).map(|_| ()),
            StmtKind::While { condition, body } => self.generate_while(condition, body),
            StmtKind::Return(values) => self.generate_return(values),
            StmtKind::Expr(expr) => self.generate_expr(expr).map(|_| ()),
        };
        result.map_err(|err| err.at_line(stmt.line))
    }

    fn generate_var_declaration(&mut self, decl: &VarDecl) -> CompileResult<()> {
        let slot = match (&decl.ty, &decl.initializer) {
            (Some(ty), initializer) => {
                let ty = self.lookup_type(ty)?;
                if ty == IrType::Void {
                    return Err(SemanticError::VoidVariable(decl.name.clone()).into());
                }
                let value = match initializer {
                    Some(initializer) => Some(self.generate_rvalue(initializer)?),
                    None => None,
                };
                let slot = self.backend.alloca(ty.clone(), &decl.name)?;
                if let Some(value) = value {
                    self.expect_value_type(value, &ty, || {
                        format!("initializer of `{}`", decl.name)
                    })?;
                    self.backend.store(value, slot)?;
                }
                slot
            }
            (None, Some(initializer)) => {
                let value = self.generate_rvalue(initializer)?;
                let ty = self.backend.value_type(value);
                if ty == IrType::Void {
                    return Err(SemanticError::VoidVariable(decl.name.clone()).into());
                }
                let slot = self.backend.alloca(ty, &decl.name)?;
                self.backend.store(value, slot)?;
                slot
            }
            (None, None) => return Err(SemanticError::CannotInferType(decl.name.clone()).into()),
        };

        self.env.declare_variable(&decl.name, slot);
        Ok(())
    }

    fn generate_assign(&mut self, ident: &str, value: &Expr) -> CompileResult<()> {
        let slot = self.env.lookup_variable(ident)?;
        let value = self.generate_rvalue(value)?;

        if let Some(ty) = self.backend.value_type(slot).pointee() {
            self.expect_value_type(value, ty, || format!("assignment to `{}`", ident))?;
        }
        self.backend.store(value, slot)?;
        Ok(())
    }

    /// Lowers the first returned value. Any further values are evaluated and dropped.
    fn generate_return(&mut self, values: &[Expr]) -> CompileResult<()> {
        let (func, name) = self.current_function()?;
        let ret = self.backend.function_sig(func).ret.clone();
        let context = || format!("return value of `{}`", name);

        match values.split_first() {
            None => {
                if ret != IrType::Void {
                    return Err(SemanticError::TypeMismatch {
                        context: context(),
                        expected: ret.to_string(),
                        found: IrType::Void.to_string(),
                    }
                    .into());
                }
                self.backend.ret(None)?;
            }
            Some((value, rest)) => {
                let value = self.generate_rvalue(value)?;
                if !rest.is_empty() {
                    tracing::warn!(
                        function = %name,
                        count = rest.len(),
                        "extra return values are ignored"
                    );
                    for extra in rest {
                        self.generate_expr(extra)?;
                    }
                }

                if ret == IrType::Void && self.backend.value_type(value) == IrType::Void {
                    // `return f();` where `f` returns nothing
                    self.backend.ret(None)?;
                } else {
                    self.expect_value_type(value, &ret, context)?;
                    self.backend.ret(Some(value))?;
                }
            }
        }
        Ok(())
    }

    /// Lowers
    /// ```text
    /// if c0 { b0 } elif c1 { b1 } else { b2 }
    /// ```
    /// into `n.if -> n.then | n.if -> n.then | n.else`, each arm falling through to `n.ifend`.
    fn generate_if(&mut self, if_stmt: &IfStmt) -> CompileResult<()> {
        let mut cond_blocks = Vec::with_capacity(if_stmt.branches.len());
        for i in 0..if_stmt.branches.len() {
            cond_blocks.push(self.new_labeled_block(if i == 0 { "if" } else { "elif" })?);
        }
        let mut then_blocks = Vec::with_capacity(if_stmt.branches.len());
        for _ in &if_stmt.branches {
            then_blocks.push(self.new_labeled_block("then")?);
        }
        let else_block = match if_stmt.else_block {
            Some(_) => Some(self.new_labeled_block("else")?),
            None => None,
        };
        let merge_block = self.new_labeled_block("ifend")?;

        match cond_blocks.first() {
            Some(first) => self.backend.branch(*first)?,
            None => self.backend.branch(merge_block)?,
        }

        for (i, branch) in if_stmt.branches.iter().enumerate() {
            self.switch_to(cond_blocks[i]);
            let guard = self.generate_condition(&branch.condition)?;
            let otherwise = cond_blocks
                .get(i + 1)
                .copied()
                .or(else_block)
                .unwrap_or(merge_block);
            self.backend.cond_branch(guard, then_blocks[i], otherwise)?;
        }

        for (branch, then_block) in if_stmt.branches.iter().zip(then_blocks) {
            self.generate_arm(then_block, &branch.block, merge_block)?;
        }
        if let (Some(block), Some(body)) = (else_block, &if_stmt.else_block) {
            self.generate_arm(block, body, merge_block)?;
        }

        self.switch_to(merge_block);
        Ok(())
    }

    /// Lowers `body` into `block` in its own frame, then falls through to `merge_block`.
    fn generate_arm(
        &mut self,
        block: BlockId,
        body: &Block,
        merge_block: BlockId,
    ) -> CompileResult<()> {
        self.env.push(FrameKind::Block);
        self.switch_to(block);
        self.generate_block(body)?;

        let last = self.insertion_block()?;
        if !self.backend.block_has_terminator(last) {
            self.backend.branch(merge_block)?;
        }
        self.env.pop();
        Ok(())
    }

    fn generate_while(&mut self, condition: &Expr, body: &Block) -> CompileResult<()> {
        let cond_block = self.new_labeled_block("while")?;
        let body_block = self.new_labeled_block("body")?;
        let end_block = self.new_labeled_block("wend")?;

        self.backend.branch(cond_block)?;
        self.switch_to(cond_block);
        let guard = self.generate_condition(condition)?;
        self.backend.cond_branch(guard, body_block, end_block)?;

        // the body jumps back to re-evaluate the condition
        self.generate_arm(body_block, body, cond_block)?;

        self.switch_to(end_block);
        Ok(())
    }

    /// Lowers a guard to a `bool`: zero, `false` and `void` are false.
    fn generate_condition(&mut self, condition: &Expr) -> CompileResult<ValueId> {
        let value = self.generate_rvalue(condition)?;
        let zero = match self.backend.value_type(value) {
            IrType::Bool => self.backend.const_bool(false),
            IrType::Int => self.backend.const_int(0),
            IrType::Double => self.backend.const_double(0.0),
            IrType::Void => return Ok(self.backend.const_bool(false)),
            ty => return Err(SemanticError::InvalidCondition(ty.to_string()).into()),
        };
        Ok(self.backend.binop(BinOp::CmpNe, value, zero, "cond")?)
    }

    fn expect_value_type(
        &self,
        value: ValueId,
        expected: &IrType,
        context: impl FnOnce() -> String,
    ) -> CompileResult<()> {
        let found = self.backend.value_type(value);
        if &found == expected {
            Ok(())
        } else {
            Err(SemanticError::TypeMismatch {
                context: context(),
                expected: expected.to_string(),
                found: found.to_string(),
            }
            .into())
        }
    }
}
