mod common;

use sigil_core::compile::CompileSettings;
use sigil_core::ir::BytecodeAssembler;
use sigil_core::trigger::{
    ActionInstance, EventDecl, InputSlot, ModuleEntry, ModuleInterface, ParamDecl, ProgramSource, TriggerData, Value,
    VarType, VariableDecl,
};
use sigil_core::{ActionRegistry, SigilErrorExt, compile_batch};

fn log(text: &str) -> ActionInstance {
    ActionInstance::primitive("debug_log", vec![InputSlot::constant(Value::Str(text.to_string()))])
}

fn counter() -> ProgramSource {
    let count = VariableDecl::new("count", VarType::Int);
    let c = count.guid;
    let amount = ParamDecl::new("amount", VarType::Int);
    let a = amount.guid;
    let bump = EventDecl::custom("bump", vec![amount.clone()]).with_action(ActionInstance::primitive(
        "add_int",
        vec![InputSlot::var(c), InputSlot::var(a), InputSlot::var(c)],
    ));
    let data = TriggerData { variables: vec![count], events: vec![bump], ..TriggerData::default() };
    ProgramSource::new("counter", data).as_module(ModuleInterface {
        entries: vec![ModuleEntry::from_custom_event("bump", "bump", &[amount])],
        ..ModuleInterface::default()
    })
}

fn panel() -> ProgramSource {
    let interact = EventDecl::builtin("Interact").with_action(ActionInstance::module(
        "counter",
        "bump",
        vec![InputSlot::constant(Value::Int(1))],
    ));
    ProgramSource::new("panel", TriggerData { events: vec![interact], ..TriggerData::default() })
}

fn looped(key: &str, depends_on: &str) -> ProgramSource {
    let data = TriggerData { events: vec![EventDecl::builtin("Start").with_action(log(key))], ..TriggerData::default() };
    ProgramSource::new(key, data).as_module(ModuleInterface {
        dependencies: vec![depends_on.to_string()],
        ..ModuleInterface::default()
    })
}

#[test]
fn batch_compiles_modules_before_their_callers() {
    let lamp = ProgramSource::new(
        "lamp",
        TriggerData { events: vec![EventDecl::builtin("Interact").with_action(log("on"))], ..TriggerData::default() },
    );
    // caller listed before the module it uses
    let sources = vec![panel(), lamp, counter(), looped("ping", "pong"), looped("pong", "ping")];
    let settings = CompileSettings { threads: Some(2), ..CompileSettings::default() };
    let report = compile_batch(&sources, &settings, &ActionRegistry::builtin(), &BytecodeAssembler);

    let successes = report.successes();
    assert_eq!(successes.len(), 5);
    assert!(successes["panel"]);
    assert!(successes["lamp"]);
    assert!(successes["counter"]);
    assert!(!successes["ping"]);
    assert!(!successes["pong"]);

    let panel = report.get("panel").unwrap();
    assert!(panel.executable.is_some());
    assert!(panel.heap_defaults.iter().any(|h| h.name == "__m0_count"));

    let ping = report.get("ping").unwrap();
    assert_eq!(ping.errors.len(), 1);
    assert!(ping.errors[0].message().contains("dependency cycle"));
    assert!(ping.executable.is_none());
    assert_eq!(report.failed().count(), 2);
}

#[test]
fn missing_module_fails_only_its_caller() {
    let lamp = ProgramSource::new(
        "lamp",
        TriggerData { events: vec![EventDecl::builtin("Interact").with_action(log("on"))], ..TriggerData::default() },
    );
    let report =
        compile_batch(&[panel(), lamp], &CompileSettings::default(), &ActionRegistry::builtin(), &BytecodeAssembler);
    assert!(!report.successes()["panel"]);
    assert!(report.successes()["lamp"]);
}

#[test]
fn empty_batch_is_empty() {
    let report = compile_batch(&[], &CompileSettings::default(), &ActionRegistry::builtin(), &BytecodeAssembler);
    assert!(report.programs.is_empty());
}
