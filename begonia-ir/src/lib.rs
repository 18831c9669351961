//! The interface the code generator drives, and a reference backend that assembles bytecode.

pub mod backend;
pub mod chunk;
pub mod disassemble;
pub mod module;

pub use backend::{BinOp, IrBackend};
pub use module::Module;

use begonia_source::CompileError;
use std::fmt;
use thiserror::Error;

/// Handle to a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Handle to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Handle to a value: a constant, a function parameter or the result of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    /// Single bit integer.
    Bool,
    /// 64 bit signed integer.
    Int,
    Double,
    /// Opaque handle to string data. Passed around as is and never dereferenced.
    Str,
    Void,
    /// Address of a stack slot holding the inner type.
    Ptr(Box<IrType>),
}

impl IrType {
    pub fn ptr_to(inner: IrType) -> Self {
        IrType::Ptr(Box::new(inner))
    }

    /// Returns the pointee type if `self` is a slot address.
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Bool => write!(f, "bool"),
            IrType::Int => write!(f, "int"),
            IrType::Double => write!(f, "double"),
            IrType::Str => write!(f, "string"),
            IrType::Void => write!(f, "void"),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
        }
    }
}

/// A function prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSig {
    pub params: Vec<IrType>,
    pub ret: IrType,
}

impl fmt::Display for FuncSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Double(f64),
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::Double(_) => IrType::Double,
            Constant::Int(_) => IrType::Int,
            Constant::Bool(_) => IrType::Bool,
            Constant::Str(_) => IrType::Str,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Double(val) => write!(f, "{:?}", val),
            Constant::Int(val) => write!(f, "{}", val),
            Constant::Bool(val) => write!(f, "{}", val),
            Constant::Str(val) => write!(f, "{:?}", val),
        }
    }
}

pub type IrResult<T> = Result<T, IrError>;

/// An instruction the backend refuses to emit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IrError {
    #[error("no insertion block has been set")]
    NoInsertionPoint,
    #[error("block `{0}` already ends in a terminator")]
    BlockTerminated(String),
    #[error("block `{0}` belongs to another function")]
    ForeignBlock(String),
    #[error("{0} is defined in another function")]
    ForeignValue(ValueId),
    #[error("{value} of type `{ty}` is not a stack slot")]
    NotASlot { value: ValueId, ty: IrType },
    #[error("cannot allocate a slot of type `{0}`")]
    InvalidSlotType(IrType),
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: IrType, found: IrType },
    #[error("`{op}` is not defined for `{ty}`")]
    InvalidOperand { op: BinOp, ty: IrType },
    #[error("function `{name}` takes {expected} argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("block `{0}` does not end in a terminator")]
    Unterminated(String),
    #[error("invalid opcode {0}")]
    InvalidOpCode(u8),
    #[error("instruction at offset {0} is truncated")]
    Truncated(usize),
}

impl From<IrError> for CompileError {
    fn from(err: IrError) -> Self {
        CompileError::Backend(err.to_string())
    }
}
