pub mod actions;
pub mod batch;
pub mod compile;
pub mod error;
pub mod ir;
pub mod location;
pub mod trigger;

pub use actions::{ActionRegistry, BUILTIN_REGISTRY};
pub use batch::{BatchReport, LinkableProgram, ModuleCache, compile_batch};
pub use compile::{CompileOutcome, CompileSettings, CompiledProgram, compile_program};
pub use error::{CompileError, Diagnostic, Level, SigilErrorExt};
pub use ir::{Assembler, BytecodeAssembler, Executable, ProgramImage};
pub use location::ActionLocation;
pub use trigger::{ProgramSource, TriggerData};

/// One-line report for a diagnostic, as printed by the command line.
pub fn generate_error_report<E: SigilErrorExt>(error: &E) -> String {
    let level = error.level();
    let location = match error.location() {
        Some(loc) => loc.to_string(),
        None => "program".to_string(),
    };
    format!("SIGIL | {} | {} | {}", level, location, error.message())
}
