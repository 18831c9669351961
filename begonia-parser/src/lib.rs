//! Lexer, abstract syntax tree and recursive descent parser for Begonia.

pub mod ast;
pub mod lexer;
pub mod parser;
