use anyhow::{Context, Result};
use begonia::{compile, logger, parse, tokenize, CompileOptions};
use begonia_source::{CompileResult, Source};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

/// Compiles a Begonia source file into basic blocks.
#[derive(Parser, Debug)]
#[command(name = "begonia", version, long_about = None)]
struct Args {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// What to print
    #[arg(long, value_enum, default_value_t = Emit::Ir)]
    emit: Emit,

    /// Do not declare the prelude functions
    #[arg(long)]
    no_prelude: bool,

    /// Symbol of the function running the top-level statements
    #[arg(long, value_name = "NAME", default_value = begonia::DEFAULT_ENTRY_SYMBOL)]
    entry: String,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
    Ir,
}

fn run(source: &Source, args: &Args) -> CompileResult<()> {
    match args.emit {
        Emit::Tokens => {
            for token in tokenize(source)? {
                let kind = format!("{:?}", token.kind);
                println!("{:>4} {:<14} {}", token.line, kind, token.lexeme);
            }
        }
        Emit::Ast => println!("{:#?}", parse(source)?),
        Emit::Ir => {
            let options = CompileOptions {
                entry_symbol: args.entry.clone(),
                prelude: !args.no_prelude,
                ..CompileOptions::for_source(source)
            };
            println!("{}", compile(source, &options)?);
        }
    }
    Ok(())
}

fn load(path: &Path) -> Result<Source> {
    Source::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);

    let source = load(&args.file)?;

    match run(&source, &args) {
        Ok(()) => Ok(()),
        Err(err) => {
            eprint!("{}", source.diagnostic(&err));
            process::exit(1);
        }
    }
}
