//! Definitions for [`Chunk`], [`OpCode`] and the decoded [`Instr`] form.

use crate::backend::BinOp;
use crate::{BlockId, FuncId, IrError, IrResult, ValueId};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;

/// Represents an opcode. Internally represented using 1 byte (`u8`).
/// Every operand is a 4 byte little endian index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum OpCode {
    /// Reserves a stack slot.
    /// *dest*
    Alloca = 0,
    /// *dest, slot*
    Load = 1,
    /// *value, slot*
    Store = 2,
    /// *dest, lhs, rhs*
    FAdd = 3,
    FSub = 4,
    FMul = 5,
    FDiv = 6,
    CmpNe = 7,
    /// Calls a function.
    /// *dest, func, argc, args...*
    Call = 8,
    /// Unconditional branch.
    /// *block*
    Br = 9,
    /// *cond, then block, else block*
    CondBr = 10,
    /// *value*
    Ret = 11,
    RetVoid = 12,
    Unreachable = 13,
}

impl From<BinOp> for OpCode {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::FAdd => OpCode::FAdd,
            BinOp::FSub => OpCode::FSub,
            BinOp::FMul => OpCode::FMul,
            BinOp::FDiv => OpCode::FDiv,
            BinOp::CmpNe => OpCode::CmpNe,
        }
    }
}

/// `u8` and `OpCode` should implement this trait.
pub trait ToByteCode {
    fn to_byte_code(&self) -> u8;
}

impl ToByteCode for OpCode {
    fn to_byte_code(&self) -> u8 {
        *self as u8
    }
}

impl ToByteCode for u8 {
    fn to_byte_code(&self) -> u8 {
        *self
    }
}

/// The body of one basic block as bytecode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub code: Vec<u8>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an [`OpCode`] or a raw byte to the [`Chunk`].
    pub fn write_chunk(&mut self, byte: impl ToByteCode) {
        self.code.push(byte.to_byte_code());
    }

    pub fn write_operand(&mut self, operand: u32) {
        self.code.extend_from_slice(&operand.to_le_bytes());
    }

    fn read_operand(&self, offset: usize) -> IrResult<u32> {
        match self.code.get(offset..offset + 4) {
            Some(bytes) => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            None => Err(IrError::Truncated(offset)),
        }
    }

    /// Decodes the instruction at `offset`. Returns it along with the offset of the next one.
    pub fn decode_at(&self, offset: usize) -> IrResult<(Instr, usize)> {
        let byte = *self.code.get(offset).ok_or(IrError::Truncated(offset))?;
        let opcode = OpCode::from_u8(byte).ok_or(IrError::InvalidOpCode(byte))?;
        let operand = |i: usize| self.read_operand(offset + 1 + 4 * i);

        let (instr, operands) = match opcode {
            OpCode::Alloca => (
                Instr::Alloca {
                    dest: ValueId(operand(0)?),
                },
                1,
            ),
            OpCode::Load => (
                Instr::Load {
                    dest: ValueId(operand(0)?),
                    slot: ValueId(operand(1)?),
                },
                2,
            ),
            OpCode::Store => (
                Instr::Store {
                    value: ValueId(operand(0)?),
                    slot: ValueId(operand(1)?),
                },
                2,
            ),
            OpCode::FAdd | OpCode::FSub | OpCode::FMul | OpCode::FDiv | OpCode::CmpNe => {
                let op = match opcode {
                    OpCode::FAdd => BinOp::FAdd,
                    OpCode::FSub => BinOp::FSub,
                    OpCode::FMul => BinOp::FMul,
                    OpCode::FDiv => BinOp::FDiv,
                    _ => BinOp::CmpNe,
                };
                (
                    Instr::Binary {
                        op,
                        dest: ValueId(operand(0)?),
                        lhs: ValueId(operand(1)?),
                        rhs: ValueId(operand(2)?),
                    },
                    3,
                )
            }
            OpCode::Call => {
                let dest = ValueId(operand(0)?);
                let func = FuncId(operand(1)?);
                let argc = operand(2)? as usize;
                let args = (0..argc)
                    .map(|i| operand(3 + i).map(ValueId))
                    .collect::<IrResult<Vec<_>>>()?;
                (Instr::Call { dest, func, args }, 3 + argc)
            }
            OpCode::Br => (
                Instr::Br {
                    dest: BlockId(operand(0)?),
                },
                1,
            ),
            OpCode::CondBr => (
                Instr::CondBr {
                    cond: ValueId(operand(0)?),
                    then_block: BlockId(operand(1)?),
                    else_block: BlockId(operand(2)?),
                },
                3,
            ),
            OpCode::Ret => (
                Instr::Ret {
                    value: Some(ValueId(operand(0)?)),
                },
                1,
            ),
            OpCode::RetVoid => (Instr::Ret { value: None }, 0),
            OpCode::Unreachable => (Instr::Unreachable, 0),
        };

        Ok((instr, offset + 1 + 4 * operands))
    }

    /// Decodes the whole chunk along with the offset of each instruction.
    pub fn instructions(&self) -> IrResult<Vec<(usize, Instr)>> {
        let mut instrs = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let (instr, next) = self.decode_at(offset)?;
            instrs.push((offset, instr));
            offset = next;
        }
        Ok(instrs)
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Alloca {
        dest: ValueId,
    },
    Load {
        dest: ValueId,
        slot: ValueId,
    },
    Store {
        value: ValueId,
        slot: ValueId,
    },
    Binary {
        op: BinOp,
        dest: ValueId,
        lhs: ValueId,
        rhs: ValueId,
    },
    Call {
        dest: ValueId,
        func: FuncId,
        args: Vec<ValueId>,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret {
        value: Option<ValueId>,
    },
    Unreachable,
}

impl Instr {
    pub fn encode(&self, chunk: &mut Chunk) {
        match self {
            Instr::Alloca { dest } => {
                chunk.write_chunk(OpCode::Alloca);
                chunk.write_operand(dest.0);
            }
            Instr::Load { dest, slot } => {
                chunk.write_chunk(OpCode::Load);
                chunk.write_operand(dest.0);
                chunk.write_operand(slot.0);
            }
            Instr::Store { value, slot } => {
                chunk.write_chunk(OpCode::Store);
                chunk.write_operand(value.0);
                chunk.write_operand(slot.0);
            }
            Instr::Binary { op, dest, lhs, rhs } => {
                chunk.write_chunk(OpCode::from(*op));
                chunk.write_operand(dest.0);
                chunk.write_operand(lhs.0);
                chunk.write_operand(rhs.0);
            }
            Instr::Call { dest, func, args } => {
                chunk.write_chunk(OpCode::Call);
                chunk.write_operand(dest.0);
                chunk.write_operand(func.0);
                chunk.write_operand(args.len() as u32);
                for arg in args {
                    chunk.write_operand(arg.0);
                }
            }
            Instr::Br { dest } => {
                chunk.write_chunk(OpCode::Br);
                chunk.write_operand(dest.0);
            }
            Instr::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                chunk.write_chunk(OpCode::CondBr);
                chunk.write_operand(cond.0);
                chunk.write_operand(then_block.0);
                chunk.write_operand(else_block.0);
            }
            Instr::Ret { value: Some(value) } => {
                chunk.write_chunk(OpCode::Ret);
                chunk.write_operand(value.0);
            }
            Instr::Ret { value: None } => chunk.write_chunk(OpCode::RetVoid),
            Instr::Unreachable => chunk.write_chunk(OpCode::Unreachable),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret { .. } | Instr::Unreachable
        )
    }

    /// Blocks this instruction may transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instr::Br { dest } => vec![*dest],
            Instr::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}
