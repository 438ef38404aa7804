mod common;

use common::{compile, messages};
use sigil_core::compile::ReferenceIndex;
use sigil_core::trigger::{
    ActionInstance, EventDecl, InputSlot, ProgramSource, TriggerData, Value, VarType, VariableDecl,
};

fn log(text: &str) -> ActionInstance {
    ActionInstance::primitive("debug_log", vec![InputSlot::constant(Value::Str(text.to_string()))])
}

#[test]
fn literal_position_round_trips_to_its_value() {
    let total = VariableDecl::new("total", VarType::Int);
    let t = total.guid;
    let mut third = EventDecl::custom("tally", Vec::new());
    for n in 0..5 {
        third = third.with_action(log(&format!("step {}", n)));
    }
    third = third.with_action(ActionInstance::primitive(
        "add_int",
        vec![InputSlot::var(t), InputSlot::constant(Value::Int(7)), InputSlot::var(t)],
    ));
    let data = TriggerData {
        variables: vec![total],
        events: vec![
            EventDecl::builtin("Start").with_action(log("boot")),
            EventDecl::builtin("Interact").with_action(log("touch")),
            third,
        ],
        ..TriggerData::default()
    };
    let source = ProgramSource::new("tally", data);
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));

    let reference = compiled
        .references
        .iter()
        .find(|r| r.event_index == 2 && r.action_index == 5)
        .expect("literal at event 2 action 5");
    assert_eq!(reference.variable_index, 1);
    assert_eq!(reference.multi_index, None);
    assert_eq!(reference.symbol, ReferenceIndex::symbol_name(2, 5, None, 1));
    assert_eq!(reference.ty, VarType::Int);
    assert_eq!(reference.resolve(&source.data), Some(&Value::Int(7)));

    let slot = compiled.heap_defaults.iter().find(|h| h.name == reference.symbol).unwrap();
    assert_eq!(slot.default, Value::Int(7));
    // one record per literal
    assert_eq!(compiled.references.len(), 8);
}

#[test]
fn equal_literals_keep_separate_slots() {
    let data = TriggerData {
        events: vec![EventDecl::builtin("Interact").with_action(log("same")).with_action(log("same"))],
        ..TriggerData::default()
    };
    let compiled = compile(&ProgramSource::new("twice", data));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    let symbols: Vec<&str> = compiled.references.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["__refconst_e0_a0_v0", "__refconst_e0_a1_v0"]);
}

#[test]
fn repeated_first_slot_records_multi_index() {
    let data = TriggerData {
        events: vec![EventDecl::builtin("Interact").with_action(
            ActionInstance::primitive("set_active", vec![InputSlot::Default, InputSlot::constant(Value::Bool(true))])
                .with_multi(vec![InputSlot::this(), InputSlot::constant(Value::Null)]),
        )],
        ..TriggerData::default()
    };
    let source = ProgramSource::new("lights", data);
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));

    let multi = compiled.references.iter().find(|r| r.multi_index == Some(1)).expect("multi literal");
    assert_eq!(multi.variable_index, 0);
    assert_eq!(multi.symbol, "__refconst_e0_a0_m1_v0");
    assert_eq!(multi.resolve(&source.data), Some(&Value::Null));
    // the shared second operand is one literal for both calls
    let plain: Vec<_> = compiled.references.iter().filter(|r| r.multi_index.is_none()).collect();
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].resolve(&source.data), Some(&Value::Bool(true)));
}
