mod common;

use common::{compile, messages};
use sigil_core::SigilErrorExt;
use sigil_core::trigger::{
    ActionInstance, Delay, EventDecl, EventOptions, InputSlot, ProgramSource, TriggerData, Value, VarType,
    VariableDecl,
};

fn log(text: &str) -> ActionInstance {
    ActionInstance::primitive("debug_log", vec![InputSlot::constant(Value::Str(text.into()))])
}

fn source(variables: Vec<VariableDecl>, events: Vec<EventDecl>) -> ProgramSource {
    ProgramSource::new("diagnostics", TriggerData { variables, events, ..TriggerData::default() })
}

#[test]
fn every_semantic_error_is_reported() {
    let mut interact = EventDecl::builtin("Interact");
    interact.actions = vec![ActionInstance::primitive("no_such_action", vec![]), ActionInstance::primitive("break", vec![])];
    let badly_named = EventDecl::custom("not legal!", Vec::new()).with_action(log("never runs"));
    let compiled = compile(&source(Vec::new(), vec![interact, badly_named]));

    assert!(!compiled.is_success());
    let errors = messages(&compiled);
    assert_eq!(errors.len(), 3, "{:?}", errors);
    assert!(errors.iter().any(|e| e.contains("no_such_action")));
    assert!(errors.iter().any(|e| e.contains("outside of a loop")));
    assert!(errors.iter().any(|e| e.contains("not a legal identifier")));

    let located: Vec<_> = compiled.errors.iter().filter_map(|d| d.location()).collect();
    assert!(located.iter().any(|l| l.event == 0 && l.action == Some(0)));
    assert!(located.iter().any(|l| l.event == 0 && l.action == Some(1)));
    assert!(located.iter().any(|l| l.event == 1 && l.action.is_none()));
}

#[test]
fn actions_of_an_unknown_event_are_still_checked() {
    let mut event = EventDecl::builtin("NoSuchEvent");
    event.actions = vec![log("fine"), ActionInstance::primitive("break", vec![])];
    let compiled = compile(&source(Vec::new(), vec![event]));

    let errors = messages(&compiled);
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors[0].contains("unknown event 'NoSuchEvent'"));
    assert!(errors[1].contains("outside of a loop"));
    assert_eq!(compiled.errors[1].location().and_then(|l| l.action), Some(1));
}

#[test]
fn frame_delay_beyond_int_range_is_rejected() {
    let options = EventOptions { delay: Delay::Frames(u32::MAX), ..EventOptions::default() };
    let event = EventDecl::builtin("Interact").with_options(options).with_action(log("late"));
    let compiled = compile(&source(Vec::new(), vec![event]));

    assert!(!compiled.is_success());
    let errors = messages(&compiled);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("out of range"));

    let options = EventOptions { delay: Delay::Frames(i32::MAX as u32), ..EventOptions::default() };
    let event = EventDecl::builtin("Interact").with_options(options).with_action(log("late"));
    let compiled = compile(&source(Vec::new(), vec![event]));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
}

#[test]
fn double_underscore_is_reserved_in_variable_names() {
    let greeting = VariableDecl::new("greet__who", VarType::String);
    let mut interact = EventDecl::builtin("Interact");
    interact.actions = vec![log("hi")];
    let compiled = compile(&source(vec![greeting], vec![interact]));

    assert!(!compiled.is_success());
    let errors = messages(&compiled);
    assert!(errors.iter().any(|e| e.contains("'greet__who' is not a legal identifier")), "{:?}", errors);

    let plain = VariableDecl::new("greet_who", VarType::String);
    let mut interact = EventDecl::builtin("Interact");
    interact.actions = vec![log("hi")];
    assert!(compile(&source(vec![plain], vec![interact])).is_success());
}
