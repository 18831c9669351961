//! Scope chain used while lowering.

use begonia_ir::{BlockId, FuncId, FuncSig, ValueId};
use begonia_source::{CompileResult, SemanticError};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// Outermost frame holding the prelude declarations.
    Prelude,
    /// The body of a function (including the synthesized program entry).
    Function { handle: FuncId, name: String },
    /// An if/elif/else arm or a loop body.
    Block,
}

/// A function visible in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub sig: FuncSig,
    pub handle: FuncId,
}

/// One level of the lookup chain, corresponding to one lexical block.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    /// Maps variable names to their stack slots.
    variables: HashMap<String, ValueId>,
    functions: HashMap<String, FunctionEntry>,
    /// The block statements of this frame are currently lowered into.
    current_block: Option<BlockId>,
    block_counter: u64,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            variables: HashMap::new(),
            functions: HashMap::new(),
            current_block: None,
            block_counter: 0,
        }
    }
}

/// A stack of [`Frame`]s, innermost last.
#[derive(Debug, Clone)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates an environment with a single [`FrameKind::Prelude`] frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Prelude)],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind));
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    fn innermost(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Binds `name` in the innermost frame. Replaces a variable of the same name in that frame.
    pub fn declare_variable(&mut self, name: &str, slot: ValueId) {
        if let Some(frame) = self.innermost() {
            frame.variables.insert(name.to_string(), slot);
        }
    }

    /// Registers a function in the innermost frame.
    /// A function may be declared at most once per frame but may shadow functions of outer frames.
    pub fn declare_function(
        &mut self,
        name: &str,
        sig: FuncSig,
        handle: FuncId,
    ) -> CompileResult<()> {
        if let Some(frame) = self.innermost() {
            if frame.functions.contains_key(name) {
                return Err(SemanticError::DuplicateFunction(name.to_string()).into());
            }
            frame
                .functions
                .insert(name.to_string(), FunctionEntry { sig, handle });
        }
        Ok(())
    }

    /// Returns the slot of the innermost variable called `name`.
    pub fn lookup_variable(&self, name: &str) -> CompileResult<ValueId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.variables.get(name).copied())
            .ok_or_else(|| SemanticError::UndefinedVariable(name.to_string()).into())
    }

    pub fn lookup_function(&self, name: &str) -> CompileResult<&FunctionEntry> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.functions.get(name))
            .ok_or_else(|| SemanticError::UndefinedFunction(name.to_string()).into())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.lookup_function(name).is_ok()
    }

    /// The handle and name of the function being lowered.
    pub fn current_function(&self) -> Option<(FuncId, &str)> {
        self.frames.iter().rev().find_map(|frame| match &frame.kind {
            FrameKind::Function { handle, name } => Some((*handle, name.as_str())),
            _ => None,
        })
    }

    /// Returns a fresh number for a block label. Numbers are unique within the enclosing function.
    pub fn next_label_id(&mut self) -> u64 {
        let index = self
            .frames
            .iter()
            .rposition(|frame| matches!(frame.kind, FrameKind::Function { .. }))
            .or_else(|| self.frames.len().checked_sub(1));
        match index {
            Some(index) => {
                let frame = &mut self.frames[index];
                let id = frame.block_counter;
                frame.block_counter += 1;
                id
            }
            None => 0,
        }
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        if let Some(frame) = self.innermost() {
            frame.current_block = Some(block);
        }
    }

    /// The block the innermost frame is lowering into.
    pub fn current_block(&self) -> Option<BlockId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.current_block)
    }
}
