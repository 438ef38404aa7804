mod common;

use common::{compile, messages};
use sigil_core::trigger::{
    ActionInstance, EventDecl, EventOptions, Gate, InputSlot, ProgramSource, SyncMethod, SyncMode, TriggerData,
    Value, VarType, VariableDecl,
};

fn program(variables: Vec<VariableDecl>, actions: Vec<ActionInstance>) -> ProgramSource {
    let mut event = EventDecl::builtin("Interact");
    event.actions = actions;
    ProgramSource::new("net", TriggerData { variables, events: vec![event], ..TriggerData::default() })
}

#[test]
fn local_only_program_needs_no_network() {
    let score = VariableDecl::new("score", VarType::Int);
    let s = score.guid;
    let compiled = compile(&program(
        vec![score],
        vec![ActionInstance::primitive("assign", vec![InputSlot::constant(Value::Int(3)), InputSlot::var(s)])],
    ));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(!compiled.requires_network);
    assert!(compiled.synced.is_empty());
}

#[test]
fn one_synced_variable_flips_it() {
    let score = VariableDecl::new("score", VarType::Int).synced(SyncMode::Synced);
    let compiled = compile(&program(vec![score], Vec::new()));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(compiled.requires_network);
    assert_eq!(compiled.synced, vec!["score".to_string()]);
    assert!(compiled.assembly.contains(".sync score, none"));
}

#[test]
fn ownership_query_on_this_object_needs_network() {
    let who = VariableDecl::new("who", VarType::Player);
    let mine = VariableDecl::new("mine", VarType::Bool);
    let (w, m) = (who.guid, mine.guid);
    let compiled = compile(&program(
        vec![who, mine],
        vec![ActionInstance::primitive("is_owner", vec![InputSlot::var(w), InputSlot::this(), InputSlot::var(m)])],
    ));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(compiled.requires_network);
}

#[test]
fn ownership_query_on_another_object_does_not() {
    let who = VariableDecl::new("who", VarType::Player);
    let other = VariableDecl::new("other", VarType::GameObject);
    let mine = VariableDecl::new("mine", VarType::Bool);
    let (w, o, m) = (who.guid, other.guid, mine.guid);
    let compiled = compile(&program(
        vec![who, other, mine],
        vec![ActionInstance::primitive("is_owner", vec![InputSlot::var(w), InputSlot::var(o), InputSlot::var(m)])],
    ));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(!compiled.requires_network);
}

#[test]
fn owner_gate_needs_network() {
    let mut event = EventDecl::builtin("Interact")
        .with_options(EventOptions { gate: Gate::Owner, ..EventOptions::default() });
    event.actions.push(ActionInstance::primitive(
        "debug_log",
        vec![InputSlot::constant(Value::Str("owner touched".into()))],
    ));
    let compiled = compile(&ProgramSource::new("gated", TriggerData { events: vec![event], ..TriggerData::default() }));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(compiled.requires_network);
}

#[test]
fn unsyncable_type_cannot_be_synced() {
    let target = VariableDecl::new("target", VarType::GameObject).synced(SyncMode::Synced);
    let compiled = compile(&program(vec![target], Vec::new()));
    assert!(!compiled.is_success());
    assert!(messages(&compiled)[0].contains("cannot be synced"));
}

#[test]
fn synced_variable_in_unsynced_program_warns() {
    let score = VariableDecl::new("score", VarType::Int).synced(SyncMode::Synced);
    let mut source = program(vec![score], Vec::new());
    source.data.sync = SyncMethod::None;
    let compiled = compile(&source);
    assert!(compiled.is_success());
    assert_eq!(compiled.warnings.len(), 1);
}
