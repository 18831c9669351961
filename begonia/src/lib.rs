//! The Begonia compiler front end: source text in, a module of basic blocks out.

pub mod logger;
pub mod prelude;

use begonia_codegen::Codegen;
use begonia_ir::Module;
use begonia_parser::ast::Block;
use begonia_parser::lexer::{Lexer, Token};
use begonia_parser::parser::Parser;
use begonia_source::{CompileResult, Source};
use std::path::Path;

/// Symbol of the synthesized function that runs the top-level statements.
pub const DEFAULT_ENTRY_SYMBOL: &str = "begonia_start";

/// Settings of a compilation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Name of the produced [`Module`].
    pub module_name: String,
    pub entry_symbol: String,
    /// Declare [`prelude::PRELUDE`] before the program.
    pub prelude: bool,
    /// Print the disassembled module to stderr once it is generated.
    pub dump_ir: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module_name: "main".to_string(),
            entry_symbol: DEFAULT_ENTRY_SYMBOL.to_string(),
            prelude: true,
            dump_ir: false,
        }
    }
}

impl CompileOptions {
    /// Default options with the module named after the stem of `source`'s file name.
    pub fn for_source(source: &Source) -> Self {
        let module_name = Path::new(&source.name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.name.clone());
        Self {
            module_name,
            ..Self::default()
        }
    }
}

/// Scans the whole source. The last token is always `EOF`.
pub fn tokenize(source: &Source) -> CompileResult<Vec<Token>> {
    Lexer::new(source).tokenize()
}

pub fn parse(source: &Source) -> CompileResult<Block> {
    tracing::info!(file = %source.name, "parsing");
    Parser::new(source).parse_program()
}

/// Parses and lowers `source` into a verified [`Module`].
pub fn compile(source: &Source, options: &CompileOptions) -> CompileResult<Module> {
    let program = parse(source)?;

    let mut codegen = Codegen::new(Module::new(options.module_name.as_str()));
    if options.prelude {
        let prelude = prelude::prelude_source();
        codegen.declare_prelude(&Parser::new(&prelude).parse_program()?)?;
    }

    tracing::info!(entry = %options.entry_symbol, "generating code");
    codegen.generate_program(&program, &options.entry_symbol)?;
    let module = codegen.into_inner_backend();
    module.verify()?;

    if options.dump_ir {
        eprintln!("{}", module);
    }
    tracing::info!(module = %module.name, "done");
    Ok(module)
}
