pub mod asm;
pub mod bytecode;
pub mod method;
pub mod op;
pub mod program;
pub mod symbols;

pub use asm::{HeapEntry, ProgramImage};
pub use bytecode::{AssembleError, Assembler, BytecodeAssembler, Executable};
pub use method::Method;
pub use op::{Instruction, Target};
pub use program::{MethodTable, Program};
pub use symbols::{SymbolTable, SystemVariable, VarId, Variable, VariableKind};
