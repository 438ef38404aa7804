mod common;

use common::{compile, externs, messages, method};
use sigil_core::actions::externs as signature;
use sigil_core::compile::LinkKind;
use sigil_core::trigger::{
    ActionInstance, Broadcast, Delay, EventDecl, EventOptions, InputSlot, ProgramSource, ReplayMode, SyncMode,
    TriggerData, Value, VarType, VariableDecl,
};

fn counted(options: EventOptions) -> ProgramSource {
    let count = VariableDecl::new("count", VarType::Int).synced(SyncMode::Synced);
    let c = count.guid;
    let event = EventDecl::builtin("Interact").with_options(options).with_action(ActionInstance::primitive(
        "add_int",
        vec![InputSlot::var(c), InputSlot::constant(Value::Int(1)), InputSlot::var(c)],
    ));
    ProgramSource::new("counter", TriggerData { variables: vec![count], events: vec![event], ..TriggerData::default() })
}

#[test]
fn broadcast_replay_chain() {
    let source = counted(EventOptions { broadcast: Broadcast::All, replay: ReplayMode::All, ..EventOptions::default() });
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));

    let chain = &compiled.chains[0];
    assert_eq!(chain.methods, vec!["_interact", "ev0__broadcast", "ev0__replay", "ev0__body"]);
    assert_eq!(chain.count(LinkKind::Broadcast), 1);
    assert_eq!(chain.count(LinkKind::Replay), 1);
    assert_eq!(chain.count(LinkKind::Call), 1);
    assert!(chain.reaches("_interact", "ev0__body"));

    let body = method(&compiled, "ev0__body");
    assert!(externs(body).contains(&signature::REQUEST_SERIALIZATION));
    assert!(body.contains_sentinel());

    // dispatched by name, so visible to the VM
    assert!(method(&compiled, "ev0__replay").exported);
    assert!(compiled.exported_methods.contains(&"ev0__replay".to_string()));
    assert!(!method(&compiled, "ev0__body").exported);

    let catch_up = method(&compiled, "_onDeserialization");
    assert!(catch_up.exported);
    assert!(compiled.heap_defaults.iter().any(|h| h.name == "__replay_0" && h.sync.is_synced()));
    assert!(compiled.requires_network);
}

#[test]
fn delay_wraps_outermost() {
    let source = counted(EventOptions {
        broadcast: Broadcast::Owner,
        delay: Delay::Seconds(0.5),
        ..EventOptions::default()
    });
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    let chain = &compiled.chains[0];
    assert_eq!(chain.methods, vec!["_interact", "ev0__delay", "ev0__broadcast", "ev0__body"]);
    assert_eq!(chain.count(LinkKind::Delay), 1);
    assert!(chain.reaches("_interact", "ev0__body"));
    assert!(externs(method(&compiled, "ev0__delay")).contains(&signature::SEND_DELAYED_SECONDS));
}

#[test]
fn replay_without_broadcast_warns_and_is_ignored() {
    let source = counted(EventOptions { replay: ReplayMode::Parity, ..EventOptions::default() });
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    assert_eq!(compiled.warnings.len(), 1);
    assert_eq!(compiled.chains[0].methods, vec!["_interact"]);
    assert!(compiled.program.as_ref().unwrap().methods.get("_onDeserialization").is_none());
}

#[test]
fn parity_replay_copies_the_counter() {
    let source = counted(EventOptions { broadcast: Broadcast::All, replay: ReplayMode::Parity, ..EventOptions::default() });
    let compiled = compile(&source);
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    let catch_up = externs(method(&compiled, "_onDeserialization"));
    assert!(catch_up.contains(&signature::INT_REMAINDER));
}
