mod common;

use common::{compile, messages, method, program, warnings};
use sigil_core::Level;
use sigil_core::SigilErrorExt;
use sigil_core::ir::{Instruction, Target};
use sigil_core::trigger::{
    ActionInstance, EventDecl, InputSlot, ProgramSource, TriggerData, Value, VarType, VariableDecl,
};
use uuid::Uuid;

fn act(id: &str, inputs: Vec<InputSlot>) -> ActionInstance {
    ActionInstance::primitive(id, inputs)
}

fn interact(actions: Vec<ActionInstance>, variables: Vec<VariableDecl>) -> ProgramSource {
    let mut event = EventDecl::builtin("Interact");
    event.actions = actions;
    ProgramSource::new("scopes", TriggerData { variables, events: vec![event], ..TriggerData::default() })
}

#[test]
fn conditional_chain_compiles_and_resolves() {
    let flag = VariableDecl::new("flag", VarType::Bool);
    let count = VariableDecl::new("count", VarType::Int);
    let (f, c) = (flag.guid, count.guid);
    let source = interact(
        vec![
            act("if", vec![InputSlot::var(f)]),
            act("assign", vec![InputSlot::constant(Value::Int(1)), InputSlot::var(c)]),
            act("end", vec![]),
            act("else_if", vec![InputSlot::var(f)]),
            act("assign", vec![InputSlot::constant(Value::Int(2)), InputSlot::var(c)]),
            act("end", vec![]),
            act("else", vec![]),
            act("assign", vec![InputSlot::constant(Value::Int(3)), InputSlot::var(c)]),
            act("end", vec![]),
        ],
        vec![flag, count],
    );
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(compiled.executable.is_some());
    let body = method(&compiled, "_interact");
    let unresolved = body.instructions.iter().any(|i| {
        matches!(i, Instruction::Jump(Target::Label(_)) | Instruction::JumpIfFalse(Target::Label(_)))
    });
    assert!(!unresolved);
    let branches = body.instructions.iter().filter(|i| matches!(i, Instruction::JumpIfFalse(_))).count();
    assert_eq!(branches, 2);
}

#[test]
fn extra_end_is_fatal() {
    let source = interact(vec![act("block", vec![]), act("end", vec![]), act("end", vec![])], vec![]);
    let compiled = compile(&source);
    assert!(!compiled.is_success());
    assert_eq!(compiled.errors.len(), 1);
    assert_eq!(compiled.errors[0].level(), Level::Critical);
    assert!(compiled.errors[0].message().contains("scope end"));
    assert!(compiled.assembly.is_empty());
    assert!(compiled.executable.is_none());
}

#[test]
fn unclosed_block_is_fatal() {
    let flag = VariableDecl::new("flag", VarType::Bool);
    let f = flag.guid;
    let source = interact(vec![act("while", vec![InputSlot::var(f)])], vec![flag]);
    let compiled = compile(&source);
    assert!(!compiled.is_success());
    assert!(messages(&compiled)[0].contains("unclosed"));
}

#[test]
fn else_without_if_is_reported_and_stack_stays_balanced() {
    let source = interact(
        vec![act("else", vec![]), act("debug_log", vec![InputSlot::constant(Value::Str("x".into()))]), act("end", vec![])],
        vec![],
    );
    let compiled = compile(&source);
    assert!(!compiled.is_success());
    let errors = messages(&compiled);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("must follow"));
    assert_eq!(compiled.errors[0].level(), Level::Error);
    assert_eq!(compiled.errors[0].location().and_then(|l| l.action), Some(0));
}

#[test]
fn loop_locals_do_not_outlive_their_block() {
    let index = Uuid::new_v4();
    let total = VariableDecl::new("total", VarType::Int);
    let t = total.guid;
    let source = interact(
        vec![
            act(
                "for",
                vec![
                    InputSlot::constant(Value::Int(0)),
                    InputSlot::constant(Value::Int(4)),
                    InputSlot::Default,
                    InputSlot::declare(index, "i"),
                ],
            ),
            act("add_int", vec![InputSlot::var(t), InputSlot::var(index), InputSlot::var(t)]),
            act("end", vec![]),
            act("add_int", vec![InputSlot::var(t), InputSlot::var(index), InputSlot::var(t)]),
        ],
        vec![total],
    );
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    let warned = warnings(&compiled);
    assert_eq!(warned.len(), 1);
    assert!(warned[0].contains("unknown variable"));
    let locals = program(&compiled)
        .symbols
        .iter()
        .filter(|(_, v)| v.name.starts_with("__lcl_i_"))
        .count();
    assert_eq!(locals, 1);
}

#[test]
fn break_outside_loop_is_an_error() {
    let source = interact(vec![act("block", vec![]), act("break", vec![]), act("end", vec![])], vec![]);
    let compiled = compile(&source);
    assert!(!compiled.is_success());
    assert!(messages(&compiled)[0].contains("outside of a loop"));
}

#[test]
fn while_with_break_and_continue() {
    let flag = VariableDecl::new("flag", VarType::Bool);
    let f = flag.guid;
    let source = interact(
        vec![
            act("while", vec![InputSlot::var(f)]),
            act("if", vec![InputSlot::var(f)]),
            act("break", vec![]),
            act("end", vec![]),
            act("continue", vec![]),
            act("end", vec![]),
        ],
        vec![flag],
    );
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(compiled.executable.is_some());
}
