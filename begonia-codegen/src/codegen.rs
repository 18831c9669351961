//! Lowers a syntax tree into basic blocks.

use crate::env::{Environment, FrameKind};
use begonia_ir::{BlockId, FuncId, FuncSig, IrBackend, IrError, IrType, ValueId};
use begonia_parser::ast::{Block, Expr, FuncDecl, Stmt, StmtKind};
use begonia_source::{CompileError, CompileResult, SemanticError};
use std::collections::HashMap;

mod expr;
mod stmt;

/// Maps type names written in source to IR types.
type TypeTable = HashMap<&'static str, IrType>;

fn type_table() -> TypeTable {
    let mut types = TypeTable::new();
    types.insert("bool", IrType::Bool);
    types.insert("int", IrType::Int);
    types.insert("double", IrType::Double);
    types.insert("string", IrType::Str);
    types.insert("void", IrType::Void);
    types
}

/// Generate IR from an abstract syntax tree.
pub struct Codegen<B: IrBackend> {
    backend: B,
    env: Environment,
    types: TypeTable,
}

impl<B: IrBackend> Codegen<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            env: Environment::new(),
            types: type_table(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Consumes `self` and returns the backend holding the generated IR.
    #[must_use]
    pub fn into_inner_backend(self) -> B {
        self.backend
    }

    /// Registers the prelude in the outermost frame. The prelude may only contain function declarations.
    pub fn declare_prelude(&mut self, prelude: &Block) -> CompileResult<()> {
        for stmt in prelude {
            match &stmt.kind {
                StmtKind::DeclareFunc(func) => {
                    self.generate_function(func)
                        .map_err(|err| err.at_line(stmt.line))?;
                }
                _ => {
                    return Err(CompileError::from(SemanticError::Unsupported(
                        "a prelude statement other than a function declaration".to_string(),
                    ))
                    .at_line(stmt.line))
                }
            }
        }
        Ok(())
    }

    /// Lowers the top-level statements into a `void()` function called `entry_symbol`.
    /// The entry function then calls `main()` and `exit(0)` when they are declared.
    pub fn generate_program(
        &mut self,
        program: &Block,
        entry_symbol: &str,
    ) -> CompileResult<FuncId> {
        tracing::debug!(entry_symbol, "lowering program");
        let func = self.backend.declare_function(
            entry_symbol,
            FuncSig {
                params: Vec::new(),
                ret: IrType::Void,
            },
        );
        let entry = self.enter_function(func, entry_symbol);

        self.generate_block(program)?;

        if self.env.has_function("main") {
            self.ensure_open_block()?;
            self.generate_expr(&Expr::FuncCall {
                callee: "main".to_string(),
                args: Vec::new(),
            })?;
        }
        if self.env.has_function("exit") {
            self.ensure_open_block()?;
            self.generate_expr(&Expr::FuncCall {
                callee: "exit".to_string(),
                args: vec![Expr::integer(0)],
            })?;
        }

        self.finish_function(entry_symbol, func, entry)?;
        self.leave_function();
        Ok(func)
    }

    /// Registers `decl` in the current frame and lowers its body if it has one.
    pub fn generate_function(&mut self, decl: &FuncDecl) -> CompileResult<FuncId> {
        let sig = self.func_sig(decl)?;
        let func = self.backend.declare_function(&decl.name, sig.clone());
        self.env.declare_function(&decl.name, sig.clone(), func)?;

        if decl.is_forward_decl() {
            return Ok(func);
        }

        tracing::debug!(name = %decl.name, %sig, "lowering function");
        let entry = self.enter_function(func, &decl.name);

        // parameters live in stack slots so that they can be assigned to
        for (index, (param, ty)) in decl.params.iter().zip(sig.params).enumerate() {
            let slot = self.backend.alloca(ty, &param.name)?;
            let value = self
                .backend
                .param(func, index)
                .ok_or_else(|| CompileError::Backend(format!("missing parameter {}", index)))?;
            self.backend.store(value, slot)?;
            self.env.declare_variable(&param.name, slot);
        }

        self.generate_block(&decl.body)?;
        self.finish_function(&decl.name, func, entry)?;
        self.leave_function();
        Ok(func)
    }

    /// Lowers the statements of `block` into the current insertion block.
    pub fn generate_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in block {
            self.ensure_open_block()?;
            self.generate_stmt(stmt)?;
        }
        Ok(())
    }

    fn func_sig(&self, decl: &FuncDecl) -> CompileResult<FuncSig> {
        let params = decl
            .params
            .iter()
            .map(|param| -> CompileResult<IrType> {
                match self.lookup_type(&param.ty)? {
                    IrType::Void => Err(SemanticError::VoidVariable(param.name.clone()).into()),
                    ty => Ok(ty),
                }
            })
            .collect::<CompileResult<Vec<_>>>()?;
        let ret = self.lookup_type(&decl.ret_type)?;
        Ok(FuncSig { params, ret })
    }

    pub(crate) fn lookup_type(&self, name: &str) -> CompileResult<IrType> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| SemanticError::UnknownType(name.to_string()).into())
    }

    /// Creates the entry block of `func`, moves the insertion point into it and pushes a function frame.
    fn enter_function(&mut self, func: FuncId, name: &str) -> BlockId {
        let entry = self.backend.new_block(func, "entry");
        self.backend.set_insertion(entry);
        self.env.push(FrameKind::Function {
            handle: func,
            name: name.to_string(),
        });
        self.env.set_current_block(entry);
        entry
    }

    /// Pops the function frame and resumes lowering where the enclosing frame left off.
    fn leave_function(&mut self) {
        self.env.pop();
        if let Some(block) = self.env.current_block() {
            self.backend.set_insertion(block);
        }
    }

    /// Terminates the last block of a function body if its statements did not.
    fn finish_function(&mut self, name: &str, func: FuncId, entry: BlockId) -> CompileResult<()> {
        let block = self.insertion_block()?;
        if self.backend.block_has_terminator(block) {
            return Ok(());
        }

        if self.backend.function_sig(func).ret == IrType::Void {
            self.backend.ret(None)?;
        } else if block != entry && !self.backend.block_has_predecessors(block) {
            // e.g. the merge block of an if whose arms all return
            self.backend.unreachable()?;
        } else {
            return Err(SemanticError::MissingReturn(name.to_string()).into());
        }
        Ok(())
    }

    pub(crate) fn insertion_block(&self) -> CompileResult<BlockId> {
        Ok(self
            .backend
            .insertion_block()
            .ok_or(IrError::NoInsertionPoint)?)
    }

    pub(crate) fn current_function(&self) -> CompileResult<(FuncId, String)> {
        match self.env.current_function() {
            Some((func, name)) => Ok((func, name.to_string())),
            None => Err(IrError::NoInsertionPoint.into()),
        }
    }

    /// Creates a block in the current function labelled `{n}.{suffix}`.
    pub(crate) fn new_labeled_block(&mut self, suffix: &str) -> CompileResult<BlockId> {
        let (func, _) = self.current_function()?;
        let id = self.env.next_label_id();
        Ok(self.backend.new_block(func, &format!("{}.{}", id, suffix)))
    }

    /// Moves the insertion point (and the current frame) to `block`.
    pub(crate) fn switch_to(&mut self, block: BlockId) {
        self.backend.set_insertion(block);
        self.env.set_current_block(block);
    }

    /// Statements following a terminator go into a fresh block without predecessors.
    fn ensure_open_block(&mut self) -> CompileResult<()> {
        let block = self.insertion_block()?;
        if self.backend.block_has_terminator(block) {
            let dead = self.new_labeled_block("dead")?;
            tracing::warn!("unreachable statement after a terminator");
            self.switch_to(dead);
        }
        Ok(())
    }

    /// Loads `value` if it is a stack slot. String handles are never dereferenced.
    pub(crate) fn load_if_slot(&mut self, value: ValueId) -> CompileResult<ValueId> {
        match self.backend.value_type(value) {
            IrType::Ptr(_) => Ok(self.backend.load(value, "")?),
            _ => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use begonia_ir::chunk::Instr;
    use begonia_ir::{BinOp, Module};
    use begonia_parser::parser::Parser;
    use begonia_source::Source;

    pub(crate) fn parse(text: &str) -> Block {
        let source = Source::from(text);
        Parser::new(&source).parse_program().unwrap()
    }

    /// Lowers `text` with the usual prelude and returns the module.
    pub(crate) fn lower(text: &str) -> CompileResult<Module> {
        let mut codegen = Codegen::new(Module::new("test"));
        codegen.declare_prelude(&parse(
            "func exit(code int) void; func puts(text string) int;",
        ))?;
        codegen.generate_program(&parse(text), "begonia_start")?;
        Ok(codegen.into_inner_backend())
    }

    pub(crate) fn semantic_error(text: &str) -> SemanticError {
        match lower(text) {
            Err(CompileError::Semantic { error, .. }) => error,
            other => panic!("expected semantic error, got {:?}", other),
        }
    }

    pub(crate) fn entry_instrs(module: &Module, name: &str) -> Vec<Instr> {
        let func = module.find_function(name).unwrap();
        let entry = module.function(func).blocks[0];
        module.instructions(entry).unwrap()
    }

    #[test]
    fn test_end_to_end_program() {
        let module = lower(
            r#"
            func add(a double, b double) double { return a + b; }
            func main() void { var x = add(1, 2); }"#,
        )
        .unwrap();
        module.verify().unwrap();

        let add = module.find_function("add").unwrap();
        assert_eq!(module.function(add).blocks.len(), 1);
        let add_instrs = entry_instrs(&module, "add");
        assert!(matches!(
            add_instrs.as_slice(),
            [
                Instr::Alloca { .. },
                Instr::Store { .. },
                Instr::Alloca { .. },
                Instr::Store { .. },
                Instr::Load { .. },
                Instr::Load { .. },
                Instr::Binary {
                    op: BinOp::FAdd,
                    ..
                },
                Instr::Ret { value: Some(_) },
            ]
        ));

        let main = module.find_function("main").unwrap();
        assert_eq!(module.function(main).blocks.len(), 1);
        match entry_instrs(&module, "main").as_slice() {
            [Instr::Call { dest, func, args }, Instr::Alloca { dest: slot }, Instr::Store { value, slot: store_slot }, Instr::Ret { value: None }] =>
            {
                assert_eq!(*func, add);
                let consts = args
                    .iter()
                    .map(|arg| module.value(*arg).kind.clone())
                    .collect::<Vec<_>>();
                assert_eq!(
                    consts,
                    vec![
                        begonia_ir::module::ValueKind::Const(begonia_ir::Constant::Double(1.0)),
                        begonia_ir::module::ValueKind::Const(begonia_ir::Constant::Double(2.0)),
                    ]
                );
                assert_eq!(value, dest);
                assert_eq!(slot, store_slot);
                assert_eq!(module.value(*slot).name, "x");
                assert_eq!(module.value(*slot).ty, IrType::ptr_to(IrType::Double));
            }
            other => panic!("unexpected body for main: {:?}", other),
        }
    }

    #[test]
    fn test_entry_function_calls_main_then_exit() {
        let module = lower("func main() void { }").unwrap();
        let exit = module.find_function("exit").unwrap();
        let main = module.find_function("main").unwrap();

        match entry_instrs(&module, "begonia_start").as_slice() {
            [Instr::Call {
                func: first,
                args: main_args,
                ..
            }, Instr::Call {
                func: second,
                args: exit_args,
                ..
            }, Instr::Ret { value: None }] => {
                assert_eq!(*first, main);
                assert!(main_args.is_empty());
                assert_eq!(*second, exit);
                assert_eq!(
                    module.value(exit_args[0]).kind,
                    begonia_ir::module::ValueKind::Const(begonia_ir::Constant::Int(0))
                );
            }
            other => panic!("unexpected entry function: {:?}", other),
        }
    }

    #[test]
    fn test_entry_function_without_main() {
        let mut codegen = Codegen::new(Module::new("test"));
        codegen
            .generate_program(&parse("var a = 1;"), "start")
            .unwrap();
        let module = codegen.into_inner_backend();
        assert!(matches!(
            entry_instrs(&module, "start").as_slice(),
            [
                Instr::Alloca { .. },
                Instr::Store { .. },
                Instr::Ret { value: None }
            ]
        ));
    }

    #[test]
    fn test_forward_declaration_has_no_blocks() {
        let module = lower("func sqrt(x double) double;").unwrap();
        let sqrt = module.find_function("sqrt").unwrap();
        assert!(module.function(sqrt).is_declaration());
        assert_eq!(
            module.function(sqrt).sig,
            FuncSig {
                params: vec![IrType::Double],
                ret: IrType::Double,
            }
        );
    }

    #[test]
    fn test_duplicate_function() {
        assert_eq!(
            semantic_error("func f() void { } func f() void { }"),
            SemanticError::DuplicateFunction("f".to_string())
        );
    }

    #[test]
    fn test_program_may_shadow_prelude() {
        let module = lower("func puts(text string) int { return 0; }");
        // `0` is a floating point literal and cannot be returned as `int`
        assert!(matches!(
            module,
            Err(CompileError::Semantic {
                error: SemanticError::TypeMismatch { .. },
                ..
            })
        ));

        lower("func puts(text string) void { }").unwrap();
    }

    #[test]
    fn test_parameter_shadows_outer_variable() {
        let module = lower("var x = 1; func f(x double) double { return x; }").unwrap();
        let f = module.find_function("f").unwrap();
        let param = module.function(f).params[0];

        match entry_instrs(&module, "f").as_slice() {
            [Instr::Alloca { dest: slot }, Instr::Store { value, slot: stored }, Instr::Load { slot: loaded, .. }, Instr::Ret { .. }] =>
            {
                assert_eq!(*value, param);
                assert_eq!(stored, slot);
                assert_eq!(loaded, slot);
                assert_eq!(module.value(*slot).func, Some(f));
            }
            other => panic!("unexpected body for f: {:?}", other),
        }
    }

    #[test]
    fn test_type_errors() {
        assert_eq!(
            semantic_error("func f(a wat) void { }"),
            SemanticError::UnknownType("wat".to_string())
        );
        assert_eq!(
            semantic_error("func f(a void) void { }"),
            SemanticError::VoidVariable("a".to_string())
        );
    }

    #[test]
    fn test_missing_return() {
        assert_eq!(
            semantic_error("func f() double { var a = 1; }"),
            SemanticError::MissingReturn("f".to_string())
        );
        assert_eq!(
            semantic_error("func f(a double) double { if a { return a; } }"),
            SemanticError::MissingReturn("f".to_string())
        );
    }

    #[test]
    fn test_unreachable_merge_block() {
        let module =
            lower("func f(a double) double { if a { return 1; } else { return 2; } }").unwrap();
        module.verify().unwrap();

        let f = module.find_function("f").unwrap();
        let merge = *module.function(f).blocks.last().unwrap();
        assert_eq!(module.block(merge).name, "3.ifend");
        assert_eq!(module.instructions(merge).unwrap(), vec![Instr::Unreachable]);
    }

    #[test]
    fn test_statements_after_return() {
        let module = lower("func f() void { return; puts('dead'); }").unwrap();
        module.verify().unwrap();

        let f = module.find_function("f").unwrap();
        let blocks = &module.function(f).blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(module.block(blocks[1]).name, "0.dead");
        assert!(module.block(blocks[1]).predecessors.is_empty());
    }

    #[test]
    fn test_errors_report_innermost_statement_line() {
        let err = lower("func f(a double) void {\n  if a {\n    b = 1;\n  }\n}").unwrap_err();
        assert_eq!(
            err,
            CompileError::Semantic {
                line: Some(3),
                error: SemanticError::UndefinedVariable("b".to_string()),
            }
        );

        // a missing return is reported on the function declaration
        let err = lower("var a = 1;\nfunc f() double {\n  var b = 2;\n}").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_prelude_rejects_statements() {
        let mut codegen = Codegen::new(Module::new("test"));
        assert!(matches!(
            codegen.declare_prelude(&parse("var a = 1;")),
            Err(CompileError::Semantic {
                line: Some(1),
                error: SemanticError::Unsupported(_),
            })
        ));
    }
}
