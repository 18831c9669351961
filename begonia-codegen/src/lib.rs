//! Lowers Begonia syntax trees into basic blocks through an [`IrBackend`](begonia_ir::IrBackend).

pub mod codegen;
pub mod env;

pub use codegen::Codegen;
pub use env::Environment;
