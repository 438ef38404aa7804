#![allow(dead_code)]

use sigil_core::compile::{CompileOutcome, CompileSettings, CompiledProgram, compile_program};
use sigil_core::ir::{BytecodeAssembler, Instruction, Method, Program};
use sigil_core::{ActionRegistry, ModuleCache, ProgramSource};

pub fn compile(source: &ProgramSource) -> CompiledProgram {
    compile_with(source, &ModuleCache::new(), &CompileSettings::default()).compiled
}

pub fn compile_with(source: &ProgramSource, modules: &ModuleCache, settings: &CompileSettings) -> CompileOutcome {
    let registry = ActionRegistry::builtin();
    compile_program(source, &registry, modules, settings, &BytecodeAssembler)
}

/// Compiles a module and publishes its linkable program to `modules`.
pub fn publish(source: &ProgramSource, modules: &ModuleCache) {
    let outcome = compile_with(source, modules, &CompileSettings::default());
    assert!(outcome.compiled.is_success(), "module failed: {:?}", outcome.compiled.errors);
    modules.insert(outcome.linkable.expect("module source must produce a linkable program"));
}

pub fn program(compiled: &CompiledProgram) -> &Program {
    compiled.program.as_ref().expect("successful compile keeps its program")
}

pub fn method<'a>(compiled: &'a CompiledProgram, name: &str) -> &'a Method {
    program(compiled)
        .methods
        .get(name)
        .unwrap_or_else(|| panic!("no method '{}' in {:?}", name, program(compiled).methods.names()))
}

pub fn externs(method: &Method) -> Vec<&str> {
    method
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Extern(sig) => Some(sig.as_str()),
            _ => None,
        })
        .collect()
}

pub fn heap_names(compiled: &CompiledProgram) -> Vec<&str> {
    compiled.heap_defaults.iter().map(|h| h.name.as_str()).collect()
}

pub fn messages(compiled: &CompiledProgram) -> Vec<String> {
    use sigil_core::SigilErrorExt;
    compiled.errors.iter().map(|d| d.message()).collect()
}

pub fn warnings(compiled: &CompiledProgram) -> Vec<String> {
    use sigil_core::SigilErrorExt;
    compiled.warnings.iter().map(|d| d.message()).collect()
}
