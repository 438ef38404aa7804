//! file: core/src/compile/finish.rs
//! description: passes run over a fully emitted program before assembly.
//!
//! Order matters: serialization requests and lazy initialization add code,
//! the return sequence is wrapped around the final bodies, pruning counts
//! references in that final code, and addresses are resolved last.

use crate::actions::{NETWORK_EXTERNS, externs};
use crate::error::CompileResult;
use crate::ir::{Instruction, Program, SystemVariable};
use crate::trigger::{SyncMethod, Value};

use super::settings::CompileSettings;

const START: &str = "_start";

/// What the finishing passes learned about the program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishReport {
    pub requires_network: bool,
    pub serialization_requests: usize,
    pub pruned: Vec<String>,
}

pub fn finish_program(program: &mut Program, sync: SyncMethod, settings: &CompileSettings) -> CompileResult<FinishReport> {
    let mut report = FinishReport::default();
    export_named_targets(program);
    report.requires_network = requires_network(program);
    if sync == SyncMethod::Manual && settings.auto_request_serialization {
        report.serialization_requests = inject_serialization_requests(program);
    }
    init_local_player(program);
    add_return_sequences(program);
    report.pruned = prune_system_variables(program);
    program.resolve_addresses()?;
    log::debug!(
        "finished program: network={}, {} serialization request(s), pruned [{}]",
        report.requires_network,
        report.serialization_requests,
        report.pruned.join(", ")
    );
    Ok(report)
}

/// Methods dispatched by name must be visible to the VM.
fn export_named_targets(program: &mut Program) {
    let targets: Vec<String> = program
        .symbols
        .iter()
        .filter_map(|(_, v)| match &v.default {
            Value::Method(m) => Some(m.clone()),
            _ => None,
        })
        .collect();
    for target in targets {
        if let Some(method) = program.methods.get_mut(&target) {
            method.exported = true;
        }
    }
}

/// True when the program has a synced variable or a networking call whose
/// object operand is this object.
pub fn requires_network(program: &Program) -> bool {
    if program.symbols.iter().any(|(_, v)| v.sync.is_synced()) {
        return true;
    }
    let this = SystemVariable::This.name();
    program.methods.iter().any(|method| {
        method.instructions.iter().enumerate().any(|(at, instruction)| {
            let Instruction::Extern(signature) = instruction else { return false };
            let Some((_, count, target)) = NETWORK_EXTERNS.iter().find(|(s, _, _)| *s == signature.as_str()) else {
                return false;
            };
            operand(&method.instructions[..at], *count, *target) == Some(this)
        })
    })
}

/// The `index`-th of the last `count` pushes before an extern call.
fn operand(before: &[Instruction], count: usize, index: usize) -> Option<&str> {
    let pushes: Vec<&str> = before
        .iter()
        .rev()
        .take_while(|i| matches!(i, Instruction::Push(_)))
        .take(count)
        .filter_map(Instruction::symbol)
        .collect();
    if pushes.len() < count {
        return None;
    }
    pushes.get(count - 1 - index).copied()
}

/// Appends a serialization request to every method that writes a synced
/// variable. Returns the number of methods changed.
fn inject_serialization_requests(program: &mut Program) -> usize {
    let this = SystemVariable::This.name();
    let mut touched = 0;
    let needs: Vec<String> = program
        .methods
        .iter()
        .filter(|m| m.contains_sentinel())
        .map(|m| m.name.clone())
        .collect();
    if !needs.is_empty() {
        program.symbols.this();
    }
    for name in needs {
        if let Some(method) = program.methods.get_mut(&name) {
            method.extend([
                Instruction::push(this),
                Instruction::Extern(externs::REQUEST_SERIALIZATION.to_string()),
            ]);
            touched += 1;
        }
    }
    touched
}

/// The local player is fetched once at start, and only when something reads it.
fn init_local_player(program: &mut Program) {
    let name = SystemVariable::LocalPlayer.name();
    if program.symbols.resolve_name(name).is_none() || program.reference_count(name) == 0 {
        return;
    }
    let start = program.methods.get_or_create(START);
    start.exported = true;
    start.prepend(vec![
        Instruction::push(name),
        Instruction::Extern(externs::GET_LOCAL_PLAYER.to_string()),
    ]);
}

/// Wraps every method in its entry prologue and return epilogue.
///
/// Methods the VM enters directly push the halt address first so their
/// return jump ends execution. Internal methods find their return address
/// already pushed by the caller.
fn add_return_sequences(program: &mut Program) {
    if program.methods.is_empty() {
        return;
    }
    let halt = program.symbols.system(SystemVariable::HaltAddress);
    let halt = program.symbols.name(halt).to_string();
    let ret = program.symbols.system(SystemVariable::ReturnJump);
    let ret = program.symbols.name(ret).to_string();
    for method in program.methods.iter_mut() {
        let mut prologue = Vec::new();
        if method.exported {
            prologue.push(Instruction::push(halt.as_str()));
        }
        prologue.push(Instruction::Label(method.entry_label()));
        method.prepend(prologue);
        let end = method.end_label();
        method.extend([
            Instruction::Label(end),
            Instruction::push(ret.as_str()),
            Instruction::Copy,
            Instruction::JumpIndirect(ret.clone()),
        ]);
    }
}

/// Removes system variables no instruction reads. Returns their names.
fn prune_system_variables(program: &mut Program) -> Vec<String> {
    let mut pruned = Vec::new();
    for system in SystemVariable::ALL {
        let Some(id) = program.symbols.resolve_name(system.name()) else { continue };
        if program.reference_count(system.name()) == 0 {
            program.symbols.remove_variable(id);
            pruned.push(system.name().to_string());
        }
    }
    if !pruned.is_empty() {
        log::debug!("pruned unused system variable(s): {}", pruned.join(", "));
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_counts_back_from_the_call() {
        let code = vec![
            Instruction::push("__localPlayer"),
            Instruction::push("__this"),
            Instruction::push("__tmp_0"),
        ];
        assert_eq!(operand(&code, 3, 1), Some("__this"));
        assert_eq!(operand(&code, 3, 0), Some("__localPlayer"));
        assert_eq!(operand(&code[1..], 3, 0), None);
    }

    #[test]
    fn empty_program_keeps_no_system_variables() {
        let mut program = Program::new();
        program.symbols.this();
        let report = finish_program(&mut program, SyncMethod::Manual, &CompileSettings::default()).unwrap();
        assert!(!report.requires_network);
        assert_eq!(report.pruned, vec!["__this".to_string()]);
        assert!(program.symbols.is_empty());
    }
}
