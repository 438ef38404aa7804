mod common;

use common::{compile, externs, heap_names, messages, method};
use sigil_core::actions::externs as signature;
use sigil_core::trigger::{ActionInstance, EventDecl, InputSlot, ProgramSource, TriggerData, Value, VarType, VariableDecl};
use uuid::Uuid;

fn assign(value: i32, to: Uuid) -> ActionInstance {
    ActionInstance::primitive("assign", vec![InputSlot::constant(Value::Int(value)), InputSlot::var(to)])
}

#[test]
fn watched_write_checks_and_calls_back() {
    let x = VariableDecl::new("x", VarType::Int).watched();
    let id = x.guid;
    let data = TriggerData {
        variables: vec![x],
        events: vec![
            EventDecl::builtin("Interact").with_action(assign(5, id)),
            EventDecl::changed(id).with_action(ActionInstance::primitive(
                "debug_log",
                vec![InputSlot::constant(Value::Str("x changed".into()))],
            )),
        ],
        ..TriggerData::default()
    };
    let compiled = compile(&ProgramSource::new("watch", data));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));

    assert!(heap_names(&compiled).contains(&"__prev_x"));
    assert!(externs(method(&compiled, "_interact")).contains(&signature::OBJECT_EQUALS));
    let callback = method(&compiled, "__onchange_x");
    assert!(!callback.exported);
    assert!(externs(callback).contains(&"Debug.__Log__SystemObject__SystemVoid"));
}

#[test]
fn unwatched_write_has_no_check() {
    let x = VariableDecl::new("x", VarType::Int);
    let id = x.guid;
    let data = TriggerData {
        variables: vec![x],
        events: vec![EventDecl::builtin("Interact").with_action(assign(5, id))],
        ..TriggerData::default()
    };
    let compiled = compile(&ProgramSource::new("plain", data));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert!(!heap_names(&compiled).contains(&"__prev_x"));
    assert!(!externs(method(&compiled, "_interact")).contains(&signature::OBJECT_EQUALS));
}

#[test]
fn change_event_needs_a_watched_variable() {
    let x = VariableDecl::new("x", VarType::Int);
    let id = x.guid;
    let data = TriggerData {
        variables: vec![x],
        events: vec![EventDecl::changed(id)],
        ..TriggerData::default()
    };
    let compiled = compile(&ProgramSource::new("unwatched", data));
    assert!(!compiled.is_success());
    assert!(messages(&compiled)[0].contains("not watched"));
}
