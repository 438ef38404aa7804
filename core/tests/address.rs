mod common;

use common::{compile, messages, program};
use sigil_core::CompileError;
use sigil_core::ir::{Instruction, Program, Target};
use sigil_core::trigger::{ActionInstance, EventDecl, InputSlot, ProgramSource, TriggerData, Value, VarType, VariableDecl};

#[test]
fn unresolved_label_is_an_error() {
    let mut program = Program::new();
    program.methods.get_or_create("_interact").emit(Instruction::jump("nowhere"));
    match program.resolve_addresses() {
        Err(CompileError::UnresolvedLabel(label)) => assert_eq!(label, "nowhere"),
        other => panic!("expected unresolved label, got {:?}", other),
    }
}

#[test]
fn duplicate_label_is_an_error() {
    let mut program = Program::new();
    program.methods.get_or_create("a").emit(Instruction::Label("twice".into()));
    program.methods.get_or_create("b").emit(Instruction::Label("twice".into()));
    assert!(matches!(program.resolve_addresses(), Err(CompileError::DuplicateLabel(l)) if l == "twice"));
}

#[test]
fn labels_resolve_to_byte_offsets() {
    let mut program = Program::new();
    let first = program.methods.get_or_create("first");
    first.extend([Instruction::Nop, Instruction::push("x"), Instruction::jump("there")]);
    let second = program.methods.get_or_create("second");
    second.extend([Instruction::Comment("no size".into()), Instruction::Pop, Instruction::Label("there".into())]);
    let ret = program.symbols.label_constant("there");

    program.resolve_addresses().unwrap();
    let first = program.methods.get("first").unwrap();
    // 4 + 8 + 8 for `first`, then the Pop
    assert_eq!(first.instructions[2], Instruction::Jump(Target::Address(24)));
    assert_eq!(program.symbols.get(ret).unwrap().default, Value::UInt(24));
}

#[test]
fn compiled_programs_have_no_symbolic_jumps() {
    let flag = VariableDecl::new("flag", VarType::Bool);
    let f = flag.guid;
    let event = EventDecl::builtin("Interact")
        .with_action(ActionInstance::primitive("if", vec![InputSlot::var(f)]))
        .with_action(ActionInstance::primitive(
            "debug_log",
            vec![InputSlot::constant(Value::Str("on".into()))],
        ))
        .with_action(ActionInstance::primitive("end", Vec::new()));
    let compiled = compile(&ProgramSource::new("flag", TriggerData {
        variables: vec![flag],
        events: vec![event],
        ..TriggerData::default()
    }));
    assert!(compiled.is_success(), "{:?}", messages(&compiled));
    let jumps: Vec<&Instruction> = program(&compiled)
        .methods
        .iter()
        .flat_map(|m| m.instructions.iter())
        .filter(|i| matches!(i, Instruction::Jump(_) | Instruction::JumpIfFalse(_)))
        .collect();
    assert!(!jumps.is_empty());
    assert!(jumps.iter().all(|i| i.target_label().is_none()));
    assert!(program(&compiled).symbols.iter().all(|(_, v)| !matches!(v.default, Value::Label(_))));
}
