//! file: core/src/compile/context.rs
//! description: state shared by every emission step of one program compile.
//!
//! `CompileContext` owns the program under construction, the diagnostics
//! sink, the scope stack and the module linker. Emitters borrow it mutably
//! for the whole compile; nothing in it outlives the program.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use uuid::Uuid;

use super::module::ModuleLinker;
use super::refs::{EventChain, ReferenceIndex};
use super::scope::ScopeStack;
use super::settings::CompileSettings;
use crate::actions::{ActionRegistry, externs};
use crate::batch::ModuleCache;
use crate::error::Diagnostics;
use crate::ir::method::entry_label;
use crate::ir::{Instruction, Program, VarId};
use crate::location::ActionLocation;
use crate::trigger::{
    ActionRef, EventTrigger, ProgramSource, SyncMethod, Value, VarType, is_legal_identifier,
};

pub(crate) const ISSUER: &str = "sigil.compile";

/// Key of a per-position literal.
type LiteralPosition = (usize, usize, Option<usize>, usize);

pub struct CompileContext<'a> {
    pub source: &'a ProgramSource,
    pub registry: &'a ActionRegistry,
    pub modules: &'a ModuleCache,
    pub settings: &'a CompileSettings,
    pub program: Program,
    pub diagnostics: Diagnostics,
    pub scopes: ScopeStack,
    pub linker: ModuleLinker,
    pub references: Vec<ReferenceIndex>,
    pub chains: Vec<EventChain>,
    literals: HashMap<LiteralPosition, VarId>,
    /// Custom event name -> number of parameterized events using it.
    pub(crate) parameterized_events: HashMap<String, usize>,
    pub(crate) seen_parameterized: HashSet<String>,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        source: &'a ProgramSource,
        registry: &'a ActionRegistry,
        modules: &'a ModuleCache,
        settings: &'a CompileSettings,
    ) -> Self {
        CompileContext {
            source,
            registry,
            modules,
            settings,
            program: Program::new(),
            diagnostics: Diagnostics::new(),
            scopes: ScopeStack::new(),
            linker: ModuleLinker::new(collect_instances(source)),
            references: Vec::new(),
            chains: Vec::new(),
            literals: HashMap::new(),
            parameterized_events: count_parameterized_events(source),
            seen_parameterized: HashSet::new(),
        }
    }

    pub fn warn(&mut self, at: Option<ActionLocation>, message: impl Into<String>) {
        self.diagnostics.warn(ISSUER, at, message);
    }

    pub fn error(&mut self, at: Option<ActionLocation>, message: impl Into<String>) {
        self.diagnostics.error(ISSUER, at, message);
    }

    /// Validates and declares the program's user variables.
    pub fn declare_variables(&mut self) {
        let source = self.source;
        for decl in &source.data.variables {
            if !is_legal_identifier(&decl.name) || decl.name.contains("__") {
                self.error(None, format!("variable name '{}' is not a legal identifier", decl.name));
                continue;
            }
            if decl.sync.is_synced() && !decl.ty.is_syncable() {
                self.error(None, format!("variable '{}' of type {} cannot be synced", decl.name, decl.ty));
                continue;
            }
            if decl.sync.is_synced() && source.data.sync == SyncMethod::None {
                self.warn(None, format!("variable '{}' is synced but the program does not sync", decl.name));
            }
            match self.program.symbols.declare_user_variable(decl) {
                Ok(id) => {
                    if decl.on_change {
                        if let Some(var) = self.program.symbols.get_mut(id) {
                            var.on_change = Some(change_method(&decl.name));
                        }
                    }
                }
                Err(message) => self.error(None, message),
            }
        }
    }

    pub fn emit(&mut self, method: &str, instruction: Instruction) {
        self.program.methods.get_or_create(method).emit(instruction);
    }

    pub fn emit_all(&mut self, method: &str, instructions: impl IntoIterator<Item = Instruction>) {
        self.program.methods.get_or_create(method).extend(instructions);
    }

    pub fn push_var(&mut self, method: &str, id: VarId) {
        let name = self.program.symbols.name(id).to_string();
        self.emit(method, Instruction::Push(name));
    }

    pub fn new_label(&mut self, hint: &str) -> String {
        self.program.methods.new_label(hint)
    }

    /// Emits a call from `from` to `to`: push the return address, jump to the
    /// callee's entry, land on the return label.
    pub fn call(&mut self, from: &str, to: &str) {
        let ret = self.new_label("ret");
        let address = self.program.symbols.label_constant(&ret);
        let address = self.program.symbols.name(address).to_string();
        self.program.methods.get_or_create(to);
        self.emit_all(
            from,
            [Instruction::Push(address), Instruction::jump(entry_label(to)), Instruction::Label(ret)],
        );
    }

    /// Instructions that must follow any write to `id`: the change check for
    /// watched variables and the sync sentinel for synced ones.
    pub fn after_write(&mut self, method: &str, id: VarId) {
        let Some(var) = self.program.symbols.get(id) else { return };
        let callback = var.on_change.clone();
        let synced = var.sync.is_synced();
        let name = var.name.clone();

        if let Some(callback) = callback {
            if let Some(prev) = self.program.symbols.ensure_previous(id) {
                let prev = self.program.symbols.name(prev).to_string();
                let equal = self.program.symbols.acquire_temp(VarType::Bool);
                let equal_name = self.program.symbols.name(equal).to_string();
                let changed = self.new_label("changed");
                let same = self.new_label("same");
                self.emit_all(
                    method,
                    [
                        Instruction::push(name.as_str()),
                        Instruction::push(prev.as_str()),
                        Instruction::push(equal_name.as_str()),
                        Instruction::Extern(externs::OBJECT_EQUALS.to_string()),
                        Instruction::push(equal_name.as_str()),
                        Instruction::jump_if_false(changed.as_str()),
                        Instruction::jump(same.as_str()),
                        Instruction::Label(changed),
                        Instruction::push(name.as_str()),
                        Instruction::push(prev.as_str()),
                        Instruction::Copy,
                    ],
                );
                self.call(method, &callback);
                self.emit(method, Instruction::Label(same));
                self.program.symbols.release_temp(equal);
            }
        }
        if synced {
            self.emit(method, Instruction::Sentinel);
        }
    }

    /// Per-position literal. Repeated requests for one position return the
    /// same symbol and record the reference index once.
    pub fn literal(
        &mut self,
        at: ActionLocation,
        multi: Option<usize>,
        variable: usize,
        ty: VarType,
        value: Value,
    ) -> VarId {
        let action = at.action.unwrap_or_default();
        let key = (at.event, action, multi, variable);
        if let Some(id) = self.literals.get(&key) {
            return *id;
        }
        let symbol = ReferenceIndex::symbol_name(at.event, action, multi, variable);
        let id = self.program.symbols.literal(&symbol, ty.clone(), value);
        self.references.push(ReferenceIndex {
            event_index: at.event,
            action_index: action,
            multi_index: multi,
            variable_index: variable,
            symbol,
            ty,
        });
        self.literals.insert(key, id);
        id
    }
}

/// Method run after a watched variable changes.
pub fn change_method(variable: &str) -> String {
    format!("__onchange_{}", variable)
}

/// Module key -> instance GUIDs the program uses, in first-use order.
fn collect_instances(source: &ProgramSource) -> IndexMap<String, Vec<Uuid>> {
    let mut out: IndexMap<String, Vec<Uuid>> = IndexMap::new();
    for event in &source.data.events {
        for action in &event.actions {
            if let ActionRef::Module { module, instance: Some(guid), .. } = &action.action {
                let list = out.entry(module.clone()).or_default();
                if !list.contains(guid) {
                    list.push(*guid);
                }
            }
        }
    }
    out
}

fn count_parameterized_events(source: &ProgramSource) -> HashMap<String, usize> {
    let mut out = HashMap::new();
    for event in &source.data.events {
        if let EventTrigger::Custom { name, params } = &event.trigger {
            if !params.is_empty() {
                *out.entry(name.clone()).or_insert(0) += 1;
            }
        }
    }
    out
}
