use serde::{Deserialize, Serialize};

/// Jump destination: a label until addresses are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Label(String),
    Address(u32),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Label(name) => write!(f, "{}", name),
            Target::Address(addr) => write!(f, "0x{:08X}", addr),
        }
    }
}

/// One VM instruction. Operands name heap symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Nop,
    /// No-op marking a write to a synced variable.
    Sentinel,
    Push(String),
    Pop,
    Copy,
    Jump(Target),
    JumpIfFalse(Target),
    JumpIndirect(String),
    Extern(String),
    Label(String),
    Comment(String),
}

impl Instruction {
    pub fn jump(label: impl Into<String>) -> Self {
        Instruction::Jump(Target::Label(label.into()))
    }

    pub fn jump_if_false(label: impl Into<String>) -> Self {
        Instruction::JumpIfFalse(Target::Label(label.into()))
    }

    pub fn push(symbol: impl Into<String>) -> Self {
        Instruction::Push(symbol.into())
    }

    /// Encoded size in bytes. Labels and comments occupy no space.
    pub fn size(&self) -> u32 {
        match self {
            Instruction::Nop | Instruction::Sentinel | Instruction::Pop | Instruction::Copy => 4,
            Instruction::Push(_)
            | Instruction::Jump(_)
            | Instruction::JumpIfFalse(_)
            | Instruction::JumpIndirect(_)
            | Instruction::Extern(_) => 8,
            Instruction::Label(_) | Instruction::Comment(_) => 0,
        }
    }

    /// Heap symbol read or written by this instruction, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Instruction::Push(s) | Instruction::JumpIndirect(s) => Some(s),
            _ => None,
        }
    }

    pub fn symbol_mut(&mut self) -> Option<&mut String> {
        match self {
            Instruction::Push(s) | Instruction::JumpIndirect(s) => Some(s),
            _ => None,
        }
    }

    pub fn target_label(&self) -> Option<&str> {
        match self {
            Instruction::Jump(Target::Label(l)) | Instruction::JumpIfFalse(Target::Label(l)) => Some(l),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Nop => write!(f, "NOP"),
            Instruction::Sentinel => write!(f, "NOP # sync"),
            Instruction::Push(s) => write!(f, "PUSH, {}", s),
            Instruction::Pop => write!(f, "POP"),
            Instruction::Copy => write!(f, "COPY"),
            Instruction::Jump(t) => write!(f, "JUMP, {}", t),
            Instruction::JumpIfFalse(t) => write!(f, "JUMP_IF_FALSE, {}", t),
            Instruction::JumpIndirect(s) => write!(f, "JUMP_INDIRECT, {}", s),
            Instruction::Extern(sig) => write!(f, "EXTERN, \"{}\"", sig),
            Instruction::Label(l) => write!(f, "{}:", l),
            Instruction::Comment(c) => write!(f, "# {}", c),
        }
    }
}
