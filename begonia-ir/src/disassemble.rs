//! [`Module`] disassembling support.

use crate::chunk::Instr;
use crate::module::{Module, ValueKind};
use crate::{BlockId, FuncId, ValueId};
use console::style;
use std::fmt;

impl Module {
    /// Formats an operand. Constants are printed inline.
    fn operand(&self, value: ValueId) -> String {
        match &self.value(value).kind {
            ValueKind::Const(constant) => format!("{} {}", self.value(value).ty, constant),
            _ => format!("{} {}", self.value(value).ty, value),
        }
    }

    fn label(&self, block: BlockId) -> String {
        format!("%{}", self.block(block).name)
    }

    /// Annotation for the result of an instruction.
    fn comment(&self, value: ValueId) -> String {
        let name = &self.value(value).name;
        if name.is_empty() {
            String::new()
        } else {
            format!("{}", style(format!("// {}", name)).color256(29)) // dark green
        }
    }

    fn disassemble_instr(&self, f: &mut fmt::Formatter<'_>, instr: &Instr) -> fmt::Result {
        match instr {
            Instr::Alloca { dest } => writeln!(
                f,
                "{} = {:<10} {} {}",
                dest,
                "alloca",
                self.value(*dest).ty,
                self.comment(*dest)
            ),
            Instr::Load { dest, slot } => writeln!(
                f,
                "{} = {:<10} {} {}",
                dest,
                "load",
                self.operand(*slot),
                self.comment(*dest)
            ),
            Instr::Store { value, slot } => writeln!(
                f,
                "{:<10} {}, {}",
                "store",
                self.operand(*value),
                self.operand(*slot)
            ),
            Instr::Binary { op, dest, lhs, rhs } => writeln!(
                f,
                "{} = {:<10} {}, {} {}",
                dest,
                op.to_string(),
                self.operand(*lhs),
                self.operand(*rhs),
                self.comment(*dest)
            ),
            Instr::Call { dest, func, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.operand(*arg))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    f,
                    "{} = {:<10} @{}({}) {}",
                    dest,
                    "call",
                    self.function(*func).name,
                    args,
                    self.comment(*dest)
                )
            }
            Instr::Br { dest } => writeln!(f, "{:<10} {}", "br", self.label(*dest)),
            Instr::CondBr {
                cond,
                then_block,
                else_block,
            } => writeln!(
                f,
                "{:<10} {}, {}, {}",
                "cond_br",
                self.operand(*cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Instr::Ret { value: Some(value) } => {
                writeln!(f, "{:<10} {}", "ret", self.operand(*value))
            }
            Instr::Ret { value: None } => writeln!(f, "{:<10} void", "ret"),
            Instr::Unreachable => writeln!(f, "unreachable"),
        }
    }

    fn disassemble_block(&self, f: &mut fmt::Formatter<'_>, block: BlockId) -> fmt::Result {
        writeln!(f, "{}:", style(&self.block(block).name).bold())?;

        let chunk = &self.block(block).chunk;
        let mut offset = 0;
        while offset < chunk.code.len() {
            write!(f, "  {:04} ", style(offset).black().bright())?;
            match chunk.decode_at(offset) {
                Ok((instr, next)) => {
                    self.disassemble_instr(f, &instr)?;
                    offset = next;
                }
                Err(err) => {
                    // stop at the first bad instruction
                    writeln!(f, "{}", style(format!("<{}>", err)).red())?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn disassemble_function(&self, f: &mut fmt::Formatter<'_>, func: FuncId) -> fmt::Result {
        let function = self.function(func);
        if function.is_declaration() {
            return writeln!(f, "declare @{}{}", function.name, function.sig);
        }

        writeln!(f, "define @{}{} {{", function.name, function.sig)?;
        for block in &function.blocks {
            self.disassemble_block(f, *block)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.name)?;

        for (func, _) in self.functions() {
            self.disassemble_function(f, func)?;
        }

        Ok(())
    }
}
