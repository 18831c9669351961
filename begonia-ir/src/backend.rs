//! The narrow interface the code generator lowers through.

use crate::{BlockId, FuncId, FuncSig, IrResult, IrType, ValueId};
use std::fmt;

/// Binary instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    FAdd,
    FSub,
    FMul,
    FDiv,
    /// Compares two values of the same scalar type. Yields a `bool`.
    CmpNe,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::CmpNe => "cmp_ne",
        };
        write!(f, "{}", name)
    }
}

/// A builder that owns functions, basic blocks and values, and appends instructions at an
/// insertion point.
///
/// Handles are only meaningful to the backend that issued them.
/// Instructions that would break the IR (wrong operand types, emitting after a terminator...)
/// are rejected with an [`IrError`](crate::IrError) instead of being emitted.
pub trait IrBackend {
    /// Declares a function. A function without blocks is an external declaration.
    fn declare_function(&mut self, name: &str, sig: FuncSig) -> FuncId;

    fn function_sig(&self, func: FuncId) -> &FuncSig;

    /// The `index`-th incoming argument of `func`.
    fn param(&self, func: FuncId, index: usize) -> Option<ValueId>;

    /// Appends a new empty block to `func`. Does not move the insertion point.
    fn new_block(&mut self, func: FuncId, name: &str) -> BlockId;

    fn set_insertion(&mut self, block: BlockId);

    fn insertion_block(&self) -> Option<BlockId>;

    fn value_type(&self, value: ValueId) -> IrType;

    fn const_double(&mut self, value: f64) -> ValueId;
    fn const_int(&mut self, value: i64) -> ValueId;
    fn const_bool(&mut self, value: bool) -> ValueId;
    fn const_str(&mut self, value: &str) -> ValueId;

    /// Reserves a stack slot holding a `ty`. The result has type `ty*`.
    fn alloca(&mut self, ty: IrType, name: &str) -> IrResult<ValueId>;

    fn load(&mut self, slot: ValueId, name: &str) -> IrResult<ValueId>;

    fn store(&mut self, value: ValueId, slot: ValueId) -> IrResult<()>;

    fn binop(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId, name: &str) -> IrResult<ValueId>;

    /// Calls `func`. The result has the return type of `func` (possibly `void`).
    fn call(&mut self, func: FuncId, args: &[ValueId], name: &str) -> IrResult<ValueId>;

    /* Terminators */
    fn branch(&mut self, dest: BlockId) -> IrResult<()>;

    fn cond_branch(
        &mut self,
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> IrResult<()>;

    /// `ret value` or `ret void` when `value` is `None`.
    fn ret(&mut self, value: Option<ValueId>) -> IrResult<()>;

    fn unreachable(&mut self) -> IrResult<()>;

    fn block_has_terminator(&self, block: BlockId) -> bool;

    /// Whether any branch in the same function targets `block`.
    fn block_has_predecessors(&self, block: BlockId) -> bool;
}
