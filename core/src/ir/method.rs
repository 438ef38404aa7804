use serde::{Deserialize, Serialize};

use super::op::Instruction;

/// A named, separately addressable instruction list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub exported: bool,
    pub instructions: Vec<Instruction>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Method { name: name.into(), exported: false, instructions: Vec::new() }
    }

    /// Label placed after the method's prologue; callers jump here.
    pub fn entry_label(&self) -> String {
        entry_label(&self.name)
    }

    /// Label placed before the method's return sequence.
    pub fn end_label(&self) -> String {
        format!("{}__end", self.name)
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn extend(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.instructions.extend(instructions);
    }

    pub fn prepend(&mut self, instructions: Vec<Instruction>) {
        self.instructions.splice(0..0, instructions);
    }

    pub fn contains_sentinel(&self) -> bool {
        self.instructions.iter().any(|i| matches!(i, Instruction::Sentinel))
    }

    pub fn size(&self) -> u32 {
        self.instructions.iter().map(Instruction::size).sum()
    }
}

pub fn entry_label(method: &str) -> String {
    format!("{}__entry", method)
}
