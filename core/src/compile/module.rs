//! file: core/src/compile/module.rs
//! description: namespacing and merging of compiled module programs.
//!
//! A module is merged at most once into each caller. The translation map is
//! built and validated against the module's interface before the caller is
//! touched, so a failed merge leaves neither a partial copy nor a memo entry.
//!
//! Modules a module itself merged are merged into the caller first and the
//! module's copies of them are aliased onto those merges, so a dependency
//! shared along several paths still has a single copy of its state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::batch::LinkableProgram;
use crate::error::{CompileError, CompileResult};
use crate::ir::{Instruction, Method, Program, Target, VariableKind};
use crate::trigger::{SyncMode, Value};

/// Copy methods bracketing entry calls for one module instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCopies {
    pub guid: Uuid,
    pub copy_in: String,
    pub copy_out: String,
}

/// Base name -> caller name for one merged module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    pub module: String,
    pub prefix: String,
    pub methods: HashMap<String, String>,
    pub variables: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub instances: Vec<InstanceCopies>,
    reverse: HashMap<String, String>,
    /// Module-side names that resolve into another merge of the caller.
    shared: HashSet<String>,
}

impl Translation {
    pub fn method(&self, base: &str) -> Option<&str> {
        self.methods.get(base).map(String::as_str)
    }

    pub fn variable(&self, base: &str) -> Option<&str> {
        self.variables.get(base).map(String::as_str)
    }

    /// Module-side name of a translated method, variable or label.
    pub fn original(&self, translated: &str) -> Option<&str> {
        self.reverse.get(translated).map(String::as_str)
    }

    pub fn instance(&self, guid: &Uuid) -> Option<&InstanceCopies> {
        self.instances.iter().find(|i| &i.guid == guid)
    }

    /// Whether `base` belongs to a nested module merged separately.
    pub fn is_shared(&self, base: &str) -> bool {
        self.shared.contains(base)
    }
}

/// A nested module's prefix inside the module being merged, and the
/// caller's own merge of that module.
type Alias<'a> = (&'a str, Arc<Translation>);

#[derive(Debug, Clone, Default)]
pub struct ModuleLinker {
    merged: IndexMap<String, Arc<Translation>>,
    next_ordinal: usize,
    /// Module key -> instance GUIDs used by the caller.
    instances: IndexMap<String, Vec<Uuid>>,
}

impl ModuleLinker {
    pub fn new(instances: IndexMap<String, Vec<Uuid>>) -> Self {
        ModuleLinker { merged: IndexMap::new(), next_ordinal: 0, instances }
    }

    pub fn merged(&self) -> impl Iterator<Item = &Arc<Translation>> {
        self.merged.values()
    }

    pub fn translation(&self, module: &str) -> Option<&Arc<Translation>> {
        self.merged.get(module)
    }

    /// Merges `module` into `caller` unless already merged, returning the
    /// translation either way.
    pub fn process_module(
        &mut self,
        caller: &mut Program,
        module: &LinkableProgram,
        include_event_hooks: bool,
    ) -> CompileResult<Arc<Translation>> {
        if let Some(existing) = self.merged.get(&module.key) {
            return Ok(existing.clone());
        }
        let mut aliases: Vec<Alias<'_>> = Vec::new();
        for nested in &module.nested {
            let translation = self.process_module(caller, &nested.module, include_event_hooks)?;
            aliases.push((nested.prefix.as_str(), translation));
        }
        let prefix = format!("__m{}_", self.next_ordinal);
        let mut translation = build_translation(module, &prefix, include_event_hooks, &aliases);
        validate(module, &translation)?;

        let source = &module.program;
        let instances = self.instances.get(&module.key).cloned().unwrap_or_default();
        let entry_slots: HashSet<&str> = module
            .interface
            .entries
            .iter()
            .flat_map(|e| e.params.iter().map(|p| p.variable.as_str()))
            .collect();
        let duplicated: Vec<String> = if module.interface.multi_instance {
            source
                .symbols
                .iter()
                .filter(|(_, v)| matches!(v.kind, VariableKind::User | VariableKind::Module))
                .filter(|(_, v)| !entry_slots.contains(v.name.as_str()) && !translation.is_shared(&v.name))
                .map(|(_, v)| v.name.clone())
                .collect()
        } else {
            Vec::new()
        };
        let nested_keys: HashSet<&str> = module.nested.iter().map(|n| n.module.key.as_str()).collect();

        // heap
        for (_, var) in source.symbols.iter() {
            match var.kind {
                VariableKind::System => {
                    if let Some(system) = var.system() {
                        caller.symbols.system(system);
                    }
                }
                VariableKind::Constant => {
                    let value = translate_value(&var.default, &translation);
                    let id = caller.symbols.constant(var.ty.clone(), value);
                    let name = caller.symbols.name(id).to_string();
                    translation.variables.insert(var.name.clone(), name);
                }
                VariableKind::EventParam if translation.variable(&var.name) == Some(var.name.as_str()) => {
                    caller.symbols.declare_event_param(&var.name, var.ty.clone());
                }
                _ if translation.is_shared(&var.name) => {}
                _ => {
                    let Some(translated) = translation.variables.get(&var.name).cloned() else { continue };
                    let id = caller.symbols.declare_module_variable(&translated, var);
                    if let Some(copy) = caller.symbols.get_mut(id) {
                        copy.on_change = var
                            .on_change
                            .as_ref()
                            .and_then(|m| translation.methods.get(m).cloned());
                        if duplicated.contains(&var.name) {
                            copy.sync = SyncMode::NotSynced;
                        }
                    }
                }
            }
        }
        for (_, var) in source.symbols.iter().filter(|(_, v)| !translation.is_shared(&v.name)) {
            let Some(prev) = var.previous.and_then(|p| source.symbols.get(p)) else { continue };
            let (Some(owner), Some(shadow)) = (
                translation.variables.get(&var.name).and_then(|n| caller.symbols.resolve_name(n)),
                translation.variables.get(&prev.name).and_then(|n| caller.symbols.resolve_name(n)),
            ) else {
                continue;
            };
            if let Some(copy) = caller.symbols.get_mut(owner) {
                copy.previous = Some(shadow);
            }
        }

        // code
        let called_by_name: HashSet<String> = caller
            .symbols
            .iter()
            .filter_map(|(_, v)| match &v.default {
                Value::Method(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        for method in source.methods.iter().filter(|m| !translation.is_shared(&m.name)) {
            let Some(name) = translation.methods.get(&method.name).cloned() else { continue };
            let hook = name == method.name;
            let mut instructions: Vec<Instruction> = if hook {
                // nested hook bodies already joined the caller with their own merge
                let own = strip_hook_segments(&method.instructions, &nested_keys);
                own.iter().map(|i| translate_instruction(i, &translation)).collect()
            } else {
                method.instructions.iter().map(|i| translate_instruction(i, &translation)).collect()
            };
            if hook {
                instructions.insert(0, Instruction::Comment(hook_marker(HOOK_BEGIN, &module.key)));
                instructions.push(Instruction::Comment(hook_marker(HOOK_END, &module.key)));
            }
            caller.methods.merge(Method {
                exported: hook || called_by_name.contains(&name),
                name,
                instructions,
            });
        }

        // instances
        for (k, guid) in instances.iter().enumerate() {
            let copy_in = format!("{}i{}__copy_in", prefix, k);
            let copy_out = format!("{}i{}__copy_out", prefix, k);
            let mut load = Vec::new();
            let mut store = Vec::new();
            for base in &duplicated {
                let (Some(shared), Some(var)) = (translation.variables.get(base).cloned(), source.symbols.by_name(base))
                else {
                    continue;
                };
                let own = format!("{}i{}_{}", prefix, k, base);
                let synced = var.sync.is_synced();
                caller.symbols.declare_module_variable(&own, var);
                load.extend([Instruction::push(own.as_str()), Instruction::push(shared.as_str()), Instruction::Copy]);
                store.extend([Instruction::push(shared.as_str()), Instruction::push(own.as_str()), Instruction::Copy]);
                if synced {
                    store.push(Instruction::Sentinel);
                }
            }
            caller.methods.merge(Method { name: copy_in.clone(), exported: false, instructions: load });
            caller.methods.merge(Method { name: copy_out.clone(), exported: false, instructions: store });
            translation.instances.push(InstanceCopies { guid: *guid, copy_in, copy_out });
        }

        translation.reverse = translation
            .methods
            .iter()
            .chain(translation.variables.iter())
            .chain(translation.labels.iter())
            .map(|(base, translated)| (translated.clone(), base.clone()))
            .collect();

        log::debug!(
            "merged module '{}' as {} ({} method(s), {} variable(s), {} instance(s))",
            module.key,
            prefix,
            translation.methods.len(),
            translation.variables.len(),
            translation.instances.len()
        );
        self.next_ordinal += 1;
        let translation = Arc::new(translation);
        self.merged.insert(module.key.clone(), translation.clone());
        Ok(translation)
    }
}

/// Names for every method, non-constant variable and label of the module.
fn build_translation(
    module: &LinkableProgram,
    prefix: &str,
    include_event_hooks: bool,
    aliases: &[Alias<'_>],
) -> Translation {
    let source = &module.program;
    let mut translation = Translation {
        module: module.key.clone(),
        prefix: prefix.to_string(),
        ..Translation::default()
    };
    let own = |name: &str| format!("{}{}", prefix, name);
    for method in source.methods.iter() {
        let name = if include_event_hooks && is_event_hook(&method.name) {
            method.name.clone()
        } else if let Some(aliased) = alias(&method.name, aliases, |t| &t.methods) {
            translation.shared.insert(method.name.clone());
            aliased
        } else {
            own(&method.name)
        };
        translation.methods.insert(method.name.clone(), name);
        for instruction in &method.instructions {
            if let Instruction::Label(label) = instruction {
                let name = alias(label, aliases, |t| &t.labels).unwrap_or_else(|| own(label));
                translation.labels.insert(label.clone(), name);
            }
        }
    }
    for (_, var) in source.symbols.iter() {
        let name = match var.kind {
            VariableKind::Constant => continue,
            VariableKind::System => var.name.clone(),
            VariableKind::EventParam if include_event_hooks => var.name.clone(),
            _ => match alias(&var.name, aliases, |t| &t.variables) {
                Some(aliased) => {
                    translation.shared.insert(var.name.clone());
                    aliased
                }
                None => own(&var.name),
            },
        };
        translation.variables.insert(var.name.clone(), name);
    }
    translation
}

/// Caller name of a nested module's symbol, looked up in the caller's merge
/// of that module.
fn alias(
    name: &str,
    aliases: &[Alias<'_>],
    table: impl Fn(&Translation) -> &HashMap<String, String>,
) -> Option<String> {
    aliases.iter().find_map(|(nested, translation)| {
        let base = name.strip_prefix(nested)?;
        table(translation).get(base).cloned()
    })
}

const HOOK_BEGIN: &str = "hook begin";
const HOOK_END: &str = "hook end";

fn hook_marker(edge: &str, module: &str) -> String {
    format!("{} {}", edge, module)
}

/// Drops the hook bodies merged from `modules`, including anything they
/// carried from their own dependencies.
fn strip_hook_segments(instructions: &[Instruction], modules: &HashSet<&str>) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(instructions.len());
    let mut until: Option<String> = None;
    for instruction in instructions {
        if let Some(end) = &until {
            if matches!(instruction, Instruction::Comment(c) if c == end) {
                until = None;
            }
            continue;
        }
        let begins = match instruction {
            Instruction::Comment(c) => c
                .strip_prefix(HOOK_BEGIN)
                .map(str::trim_start)
                .filter(|key| modules.contains(key)),
            _ => None,
        };
        match begins {
            Some(key) => until = Some(hook_marker(HOOK_END, key)),
            None => out.push(instruction.clone()),
        }
    }
    out
}

/// Built-in event methods use a single leading underscore.
fn is_event_hook(name: &str) -> bool {
    name.starts_with('_') && !name.starts_with("__")
}

fn validate(module: &LinkableProgram, translation: &Translation) -> CompileResult<()> {
    let missing = |slot: &str| CompileError::MissingModuleSlot { module: module.key.clone(), slot: slot.to_string() };
    for entry in &module.interface.entries {
        if !translation.methods.contains_key(&entry.method) {
            return Err(missing(&entry.method));
        }
        for param in &entry.params {
            if !translation.variables.contains_key(&param.variable) {
                return Err(missing(&param.variable));
            }
        }
    }
    let constants: HashSet<&str> = module
        .program
        .symbols
        .iter()
        .filter(|(_, v)| v.kind == VariableKind::Constant)
        .map(|(_, v)| v.name.as_str())
        .collect();
    for method in module.program.methods.iter() {
        for instruction in &method.instructions {
            if let Some(symbol) = instruction.symbol() {
                if !translation.variables.contains_key(symbol) && !constants.contains(symbol) {
                    return Err(CompileError::ModuleMerge {
                        module: module.key.clone(),
                        reason: format!("method '{}' uses undeclared symbol '{}'", method.name, symbol),
                    });
                }
            }
            if let Some(label) = instruction.target_label() {
                let known = translation.labels.contains_key(label)
                    || label
                        .strip_suffix("__entry")
                        .is_some_and(|m| translation.methods.contains_key(m));
                if !known {
                    return Err(CompileError::ModuleMerge {
                        module: module.key.clone(),
                        reason: format!("method '{}' jumps to unknown label '{}'", method.name, label),
                    });
                }
            }
        }
    }
    Ok(())
}

fn translate_label(label: &str, translation: &Translation) -> String {
    if let Some(translated) = translation.labels.get(label) {
        return translated.clone();
    }
    if let Some(method) = label.strip_suffix("__entry") {
        if let Some(translated) = translation.methods.get(method) {
            return crate::ir::method::entry_label(translated);
        }
    }
    label.to_string()
}

fn translate_value(value: &Value, translation: &Translation) -> Value {
    match value {
        Value::Label(label) => Value::Label(translate_label(label, translation)),
        Value::Method(method) => {
            Value::Method(translation.methods.get(method).cloned().unwrap_or_else(|| method.clone()))
        }
        other => other.clone(),
    }
}

fn translate_instruction(instruction: &Instruction, translation: &Translation) -> Instruction {
    let symbol = |s: &String| translation.variables.get(s).cloned().unwrap_or_else(|| s.clone());
    match instruction {
        Instruction::Push(s) => Instruction::Push(symbol(s)),
        Instruction::JumpIndirect(s) => Instruction::JumpIndirect(symbol(s)),
        Instruction::Jump(Target::Label(l)) => Instruction::Jump(Target::Label(translate_label(l, translation))),
        Instruction::JumpIfFalse(Target::Label(l)) => {
            Instruction::JumpIfFalse(Target::Label(translate_label(l, translation)))
        }
        Instruction::Label(l) => Instruction::Label(translate_label(l, translation)),
        other => other.clone(),
    }
}
