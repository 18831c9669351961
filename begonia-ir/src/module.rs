//! The reference [`IrBackend`]: an in-memory module that assembles every basic block into a [`Chunk`].

use crate::backend::{BinOp, IrBackend};
use crate::chunk::{Chunk, Instr};
use crate::{BlockId, Constant, FuncId, FuncSig, IrError, IrResult, IrType, ValueId};

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub sig: FuncSig,
    pub params: Vec<ValueId>,
    /// In creation order. The first block is the entry block.
    pub blocks: Vec<BlockId>,
}

impl Function {
    /// A function without a body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub name: String,
    pub func: FuncId,
    pub chunk: Chunk,
    pub predecessors: Vec<BlockId>,
    terminated: bool,
}

impl BasicBlock {
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Const(Constant),
    /// The n-th parameter of a function.
    Param(usize),
    /// The result of an instruction.
    Instr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    pub ty: IrType,
    pub kind: ValueKind,
    pub name: String,
    /// The function the value is defined in. `None` for constants.
    pub func: Option<FuncId>,
}

/// A translation unit. Owns every function, block and value it hands out handles to.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    functions: Vec<Function>,
    blocks: Vec<BasicBlock>,
    values: Vec<ValueInfo>,
    insertion: Option<BlockId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
            insertion: None,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, func)| (FuncId(i as u32), func))
    }

    pub fn function(&self, func: FuncId) -> &Function {
        &self.functions[func.0 as usize]
    }

    /// Returns the last function declared with `name`.
    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .rposition(|func| func.name == name)
            .map(|i| FuncId(i as u32))
    }

    pub fn block(&self, block: BlockId) -> &BasicBlock {
        &self.blocks[block.0 as usize]
    }

    /// Finds a block of `func` by label.
    pub fn find_block(&self, func: FuncId, name: &str) -> Option<BlockId> {
        self.function(func)
            .blocks
            .iter()
            .copied()
            .find(|block| self.block(*block).name == name)
    }

    pub fn value(&self, value: ValueId) -> &ValueInfo {
        &self.values[value.0 as usize]
    }

    /// Decoded instructions of `block`.
    pub fn instructions(&self, block: BlockId) -> IrResult<Vec<Instr>> {
        Ok(self
            .block(block)
            .chunk
            .instructions()?
            .into_iter()
            .map(|(_, instr)| instr)
            .collect())
    }

    /// Checks that every block ends in exactly one terminator.
    pub fn verify(&self) -> IrResult<()> {
        for block in &self.blocks {
            let instrs = block.chunk.instructions()?;
            let terminators = instrs
                .iter()
                .filter(|(_, instr)| instr.is_terminator())
                .count();
            let last_is_terminator = instrs
                .last()
                .map(|(_, instr)| instr.is_terminator())
                .unwrap_or(false);
            if terminators != 1 || !last_is_terminator {
                return Err(IrError::Unterminated(block.name.clone()));
            }
        }
        Ok(())
    }

    fn new_value(
        &mut self,
        ty: IrType,
        kind: ValueKind,
        name: &str,
        func: Option<FuncId>,
    ) -> ValueId {
        self.values.push(ValueInfo {
            ty,
            kind,
            name: name.to_string(),
            func,
        });
        ValueId(self.values.len() as u32 - 1)
    }

    fn new_const(&mut self, constant: Constant) -> ValueId {
        let ty = constant.ty();
        self.new_value(ty, ValueKind::Const(constant), "", None)
    }

    /// The block instructions are appended to. Must not be terminated yet.
    fn open_block(&self) -> IrResult<BlockId> {
        let block = self.insertion.ok_or(IrError::NoInsertionPoint)?;
        let bb = self.block(block);
        if bb.terminated {
            return Err(IrError::BlockTerminated(bb.name.clone()));
        }
        Ok(block)
    }

    fn emit(&mut self, block: BlockId, instr: Instr) {
        let bb = &mut self.blocks[block.0 as usize];
        instr.encode(&mut bb.chunk);
        if instr.is_terminator() {
            bb.terminated = true;
        }

        for succ in instr.successors() {
            let preds = &mut self.blocks[succ.0 as usize].predecessors;
            if !preds.contains(&block) {
                preds.push(block);
            }
        }
    }

    /// `dest` must live in the same function as `from`.
    fn check_target(&self, from: BlockId, dest: BlockId) -> IrResult<()> {
        if self.block(from).func == self.block(dest).func {
            Ok(())
        } else {
            Err(IrError::ForeignBlock(self.block(dest).name.clone()))
        }
    }

    /// Values defined in another function cannot be used in `block`.
    fn check_operand(&self, block: BlockId, value: ValueId) -> IrResult<()> {
        match self.value(value).func {
            Some(func) if func != self.block(block).func => Err(IrError::ForeignValue(value)),
            _ => Ok(()),
        }
    }

    /// An instruction result defined in `block`.
    fn new_instr_value(&mut self, block: BlockId, ty: IrType, name: &str) -> ValueId {
        let func = self.block(block).func;
        self.new_value(ty, ValueKind::Instr, name, Some(func))
    }

    fn expect_type(&self, value: ValueId, expected: &IrType) -> IrResult<()> {
        let found = &self.value(value).ty;
        if found == expected {
            Ok(())
        } else {
            Err(IrError::TypeMismatch {
                expected: expected.clone(),
                found: found.clone(),
            })
        }
    }

    fn slot_type(&self, slot: ValueId) -> IrResult<IrType> {
        let ty = &self.value(slot).ty;
        ty.pointee().cloned().ok_or_else(|| IrError::NotASlot {
            value: slot,
            ty: ty.clone(),
        })
    }
}

impl IrBackend for Module {
    fn declare_function(&mut self, name: &str, sig: FuncSig) -> FuncId {
        let func = FuncId(self.functions.len() as u32);
        let params = sig
            .params
            .clone()
            .into_iter()
            .enumerate()
            .map(|(i, ty)| self.new_value(ty, ValueKind::Param(i), "", Some(func)))
            .collect();

        tracing::debug!(name, %sig, "declaring function");
        self.functions.push(Function {
            name: name.to_string(),
            sig,
            params,
            blocks: Vec::new(),
        });
        func
    }

    fn function_sig(&self, func: FuncId) -> &FuncSig {
        &self.function(func).sig
    }

    fn param(&self, func: FuncId, index: usize) -> Option<ValueId> {
        self.function(func).params.get(index).copied()
    }

    fn new_block(&mut self, func: FuncId, name: &str) -> BlockId {
        let block = BlockId(self.blocks.len() as u32);
        tracing::debug!(func = %self.function(func).name, block = name, "new basic block");
        self.blocks.push(BasicBlock {
            name: name.to_string(),
            func,
            chunk: Chunk::new(),
            predecessors: Vec::new(),
            terminated: false,
        });
        self.functions[func.0 as usize].blocks.push(block);
        block
    }

    fn set_insertion(&mut self, block: BlockId) {
        self.insertion = Some(block);
    }

    fn insertion_block(&self) -> Option<BlockId> {
        self.insertion
    }

    fn value_type(&self, value: ValueId) -> IrType {
        self.value(value).ty.clone()
    }

    fn const_double(&mut self, value: f64) -> ValueId {
        self.new_const(Constant::Double(value))
    }

    fn const_int(&mut self, value: i64) -> ValueId {
        self.new_const(Constant::Int(value))
    }

    fn const_bool(&mut self, value: bool) -> ValueId {
        self.new_const(Constant::Bool(value))
    }

    fn const_str(&mut self, value: &str) -> ValueId {
        self.new_const(Constant::Str(value.to_string()))
    }

    fn alloca(&mut self, ty: IrType, name: &str) -> IrResult<ValueId> {
        let block = self.open_block()?;
        if ty == IrType::Void {
            return Err(IrError::InvalidSlotType(ty));
        }
        let dest = self.new_instr_value(block, IrType::ptr_to(ty), name);
        self.emit(block, Instr::Alloca { dest });
        Ok(dest)
    }

    fn load(&mut self, slot: ValueId, name: &str) -> IrResult<ValueId> {
        let block = self.open_block()?;
        self.check_operand(block, slot)?;
        let ty = self.slot_type(slot)?;
        let dest = self.new_instr_value(block, ty, name);
        self.emit(block, Instr::Load { dest, slot });
        Ok(dest)
    }

    fn store(&mut self, value: ValueId, slot: ValueId) -> IrResult<()> {
        let block = self.open_block()?;
        self.check_operand(block, value)?;
        self.check_operand(block, slot)?;
        let ty = self.slot_type(slot)?;
        self.expect_type(value, &ty)?;
        self.emit(block, Instr::Store { value, slot });
        Ok(())
    }

    fn binop(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId, name: &str) -> IrResult<ValueId> {
        let block = self.open_block()?;
        self.check_operand(block, lhs)?;
        self.check_operand(block, rhs)?;
        let lhs_ty = self.value_type(lhs);
        let result_ty = match op {
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv => {
                if lhs_ty != IrType::Double {
                    return Err(IrError::InvalidOperand { op, ty: lhs_ty });
                }
                IrType::Double
            }
            BinOp::CmpNe => {
                match lhs_ty {
                    IrType::Bool | IrType::Int | IrType::Double => {}
                    _ => return Err(IrError::InvalidOperand { op, ty: lhs_ty }),
                }
                IrType::Bool
            }
        };
        self.expect_type(rhs, &lhs_ty)?;

        let dest = self.new_instr_value(block, result_ty, name);
        self.emit(block, Instr::Binary { op, dest, lhs, rhs });
        Ok(dest)
    }

    fn call(&mut self, func: FuncId, args: &[ValueId], name: &str) -> IrResult<ValueId> {
        let block = self.open_block()?;
        let callee = self.function(func);
        if callee.sig.params.len() != args.len() {
            return Err(IrError::ArityMismatch {
                name: callee.name.clone(),
                expected: callee.sig.params.len(),
                found: args.len(),
            });
        }
        for (arg, param) in args.iter().zip(&callee.sig.params) {
            self.check_operand(block, *arg)?;
            self.expect_type(*arg, param)?;
        }

        let ret = callee.sig.ret.clone();
        let dest = self.new_instr_value(block, ret, name);
        self.emit(
            block,
            Instr::Call {
                dest,
                func,
                args: args.to_vec(),
            },
        );
        Ok(dest)
    }

    fn branch(&mut self, dest: BlockId) -> IrResult<()> {
        let block = self.open_block()?;
        self.check_target(block, dest)?;
        self.emit(block, Instr::Br { dest });
        Ok(())
    }

    fn cond_branch(
        &mut self,
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> IrResult<()> {
        let block = self.open_block()?;
        self.check_operand(block, cond)?;
        self.expect_type(cond, &IrType::Bool)?;
        self.check_target(block, then_block)?;
        self.check_target(block, else_block)?;
        self.emit(
            block,
            Instr::CondBr {
                cond,
                then_block,
                else_block,
            },
        );
        Ok(())
    }

    fn ret(&mut self, value: Option<ValueId>) -> IrResult<()> {
        let block = self.open_block()?;
        let ret = self.function(self.block(block).func).sig.ret.clone();
        if let Some(value) = value {
            self.check_operand(block, value)?;
        }
        match value {
            Some(value) if ret != IrType::Void => self.expect_type(value, &ret)?,
            Some(value) => {
                return Err(IrError::TypeMismatch {
                    expected: IrType::Void,
                    found: self.value_type(value),
                })
            }
            None if ret != IrType::Void => {
                return Err(IrError::TypeMismatch {
                    expected: ret,
                    found: IrType::Void,
                })
            }
            None => {}
        }
        self.emit(block, Instr::Ret { value });
        Ok(())
    }

    fn unreachable(&mut self) -> IrResult<()> {
        let block = self.open_block()?;
        self.emit(block, Instr::Unreachable);
        Ok(())
    }

    fn block_has_terminator(&self, block: BlockId) -> bool {
        self.block(block).terminated
    }

    fn block_has_predecessors(&self, block: BlockId) -> bool {
        !self.block(block).predecessors.is_empty()
    }
}
