//! file: core/src/ir/symbols.rs
//! description: the heap symbol table of one program.
//!
//! Every heap slot the program uses lives here: user variables (resolved by
//! GUID), module variables created during merges, scope locals, pooled
//! temporaries, value-identified constants, per-position literals and the
//! reserved system variables.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trigger::{SyncMode, Value, VarType, VariableDecl};

/// Stable handle to a variable for the lifetime of one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    User,
    Module,
    ScopeLocal,
    Temp,
    Constant,
    Literal,
    System,
    Internal,
    /// Fixed slot the VM writes before invoking a built-in event.
    EventParam,
}

/// Variables the compiler reserves for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemVariable {
    This,
    LocalPlayer,
    ReturnJump,
    HaltAddress,
}

pub const HALT_ADDRESS: u32 = 0xFFFF_FFFC;

impl SystemVariable {
    pub const ALL: [SystemVariable; 4] = [
        SystemVariable::This,
        SystemVariable::LocalPlayer,
        SystemVariable::ReturnJump,
        SystemVariable::HaltAddress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemVariable::This => "__this",
            SystemVariable::LocalPlayer => "__localPlayer",
            SystemVariable::ReturnJump => "__returnJump",
            SystemVariable::HaltAddress => "__haltAddress",
        }
    }

    pub fn ty(self) -> VarType {
        match self {
            SystemVariable::This => VarType::GameObject,
            SystemVariable::LocalPlayer => VarType::Player,
            SystemVariable::ReturnJump | SystemVariable::HaltAddress => VarType::UInt,
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            SystemVariable::This => Value::This,
            SystemVariable::LocalPlayer => Value::Null,
            SystemVariable::ReturnJump => Value::UInt(0),
            SystemVariable::HaltAddress => Value::UInt(HALT_ADDRESS),
        }
    }

    pub fn from_name(name: &str) -> Option<SystemVariable> {
        SystemVariable::ALL.into_iter().find(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: VarType,
    pub default: Value,
    pub sync: SyncMode,
    pub exported: bool,
    pub global: bool,
    /// Method invoked after a write changes the value.
    pub on_change: Option<String>,
    /// Shadow holding the value seen by the last change check.
    pub previous: Option<VarId>,
    pub kind: VariableKind,
    pub guid: Option<Uuid>,
}

impl Variable {
    fn plain(name: String, ty: VarType, default: Value, kind: VariableKind) -> Self {
        Variable {
            name,
            ty,
            default,
            sync: SyncMode::NotSynced,
            exported: false,
            global: false,
            on_change: None,
            previous: None,
            kind,
            guid: None,
        }
    }

    pub fn system(&self) -> Option<SystemVariable> {
        match self.kind {
            VariableKind::System => SystemVariable::from_name(&self.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    vars: IndexMap<VarId, Variable>,
    next_id: u32,
    by_name: HashMap<String, VarId>,
    by_guid: HashMap<Uuid, VarId>,
    constants: HashMap<String, VarId>,
    free_temps: HashMap<VarType, Vec<VarId>>,
    leased_temps: HashSet<VarId>,
    counter: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    fn insert(&mut self, var: Variable) -> VarId {
        let id = VarId(self.next_id);
        self.next_id += 1;
        self.by_name.insert(var.name.clone(), id);
        if let Some(guid) = var.guid {
            self.by_guid.insert(guid, id);
        }
        self.vars.insert(id, var);
        id
    }

    fn fresh_suffix(&mut self) -> usize {
        let n = self.counter;
        self.counter += 1;
        n
    }

    /// Declares a user global. Fails when the name or GUID is already taken.
    pub fn declare_user_variable(&mut self, decl: &VariableDecl) -> Result<VarId, String> {
        if self.by_name.contains_key(&decl.name) {
            return Err(format!("variable name '{}' is already declared", decl.name));
        }
        if self.by_guid.contains_key(&decl.guid) {
            return Err(format!("variable id {} is declared twice", decl.guid));
        }
        let mut var = Variable::plain(
            decl.name.clone(),
            decl.ty.clone(),
            decl.default.clone().unwrap_or_else(|| decl.ty.default_value()),
            VariableKind::User,
        );
        var.sync = decl.sync;
        var.exported = decl.exported;
        var.global = true;
        var.guid = Some(decl.guid);
        Ok(self.insert(var))
    }

    /// Declares a namespaced copy of a module's variable. A second request for
    /// the same translated name returns the first copy.
    pub fn declare_module_variable(&mut self, translated: &str, source: &Variable) -> VarId {
        if let Some(id) = self.by_name.get(translated) {
            return *id;
        }
        let mut var = source.clone();
        var.name = translated.to_string();
        var.kind = VariableKind::Module;
        var.global = true;
        var.guid = None;
        var.previous = None;
        self.insert(var)
    }

    /// Fresh storage for a block-local. Never reuses an earlier local.
    pub fn declare_scope_variable(&mut self, name: &str, ty: VarType) -> VarId {
        let n = self.fresh_suffix();
        let default = ty.default_value();
        self.insert(Variable::plain(format!("__lcl_{}_{}", name, n), ty, default, VariableKind::ScopeLocal))
    }

    /// Compiler-owned variable with a fixed name, created on first request.
    pub fn declare_internal(&mut self, name: &str, ty: VarType, default: Value) -> VarId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        self.insert(Variable::plain(name.to_string(), ty, default, VariableKind::Internal))
    }

    /// Storage of a built-in event parameter, shared by every handler of
    /// that event in the program.
    pub fn declare_event_param(&mut self, name: &str, ty: VarType) -> VarId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let default = ty.default_value();
        self.insert(Variable::plain(name.to_string(), ty, default, VariableKind::EventParam))
    }

    pub fn this(&mut self) -> VarId {
        self.system(SystemVariable::This)
    }

    pub fn system(&mut self, which: SystemVariable) -> VarId {
        if let Some(id) = self.by_name.get(which.name()) {
            return *id;
        }
        self.insert(Variable::plain(
            which.name().to_string(),
            which.ty(),
            which.default_value(),
            VariableKind::System,
        ))
    }

    /// Value-identified constant; equal values of equal type share one slot.
    pub fn constant(&mut self, ty: VarType, value: Value) -> VarId {
        let key = value.pool_key(&ty);
        if let Some(id) = self.constants.get(&key) {
            return *id;
        }
        let n = self.fresh_suffix();
        let name = format!("__const_{}_{}", ty.vm_name(), n);
        let id = self.insert(Variable::plain(name, ty, value, VariableKind::Constant));
        self.constants.insert(key, id);
        id
    }

    /// Constant holding the address of a code label.
    pub fn label_constant(&mut self, label: &str) -> VarId {
        self.constant(VarType::UInt, Value::Label(label.to_string()))
    }

    /// Literal pinned to one action position; never shared by value.
    pub fn literal(&mut self, name: &str, ty: VarType, value: Value) -> VarId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        self.insert(Variable::plain(name.to_string(), ty, value, VariableKind::Literal))
    }

    pub fn acquire_temp(&mut self, ty: VarType) -> VarId {
        let reused = self.free_temps.get_mut(&ty).and_then(Vec::pop);
        let id = match reused {
            Some(id) => id,
            None => {
                let n = self.fresh_suffix();
                let default = ty.default_value();
                self.insert(Variable::plain(format!("__tmp_{}", n), ty, default, VariableKind::Temp))
            }
        };
        self.leased_temps.insert(id);
        id
    }

    pub fn release_temp(&mut self, id: VarId) {
        if !self.leased_temps.remove(&id) {
            return;
        }
        if let Some(var) = self.vars.get(&id) {
            self.free_temps.entry(var.ty.clone()).or_default().push(id);
        }
    }

    pub fn resolve_guid(&self, guid: &Uuid) -> Option<VarId> {
        self.by_guid.get(guid).copied()
    }

    pub fn resolve_name(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    /// Makes `guid` resolve to `id` until unbound.
    pub fn bind_guid(&mut self, guid: Uuid, id: VarId) {
        self.by_guid.insert(guid, id);
    }

    /// Drops GUID resolution for `id` while keeping its storage.
    pub fn unbind(&mut self, id: VarId) {
        self.by_guid.retain(|_, v| *v != id);
    }

    /// Removes a variable together with its previous-value shadow.
    pub fn remove_variable(&mut self, id: VarId) -> Option<Variable> {
        let var = self.vars.shift_remove(&id)?;
        if self.by_name.get(&var.name) == Some(&id) {
            self.by_name.remove(&var.name);
        }
        self.by_guid.retain(|_, v| *v != id);
        self.constants.retain(|_, v| *v != id);
        self.leased_temps.remove(&id);
        for pool in self.free_temps.values_mut() {
            pool.retain(|v| *v != id);
        }
        if let Some(prev) = var.previous {
            self.remove_variable(prev);
        }
        Some(var)
    }

    /// Shadow variable for change checks, created on first request.
    pub fn ensure_previous(&mut self, id: VarId) -> Option<VarId> {
        let var = self.vars.get(&id)?;
        if let Some(prev) = var.previous {
            return Some(prev);
        }
        let name = format!("__prev_{}", var.name);
        let shadow = Variable::plain(name, var.ty.clone(), var.default.clone(), VariableKind::Internal);
        let prev = self.insert(shadow);
        if let Some(var) = self.vars.get_mut(&id) {
            var.previous = Some(prev);
        }
        Some(prev)
    }

    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.vars.get(&id)
    }

    pub fn get_mut(&mut self, id: VarId) -> Option<&mut Variable> {
        self.vars.get_mut(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.by_name.get(name).and_then(|id| self.vars.get(id))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let id = *self.by_name.get(name)?;
        self.vars.get_mut(&id)
    }

    /// Heap symbol of a handle. Handles are never dangling inside a compile.
    pub fn name(&self, id: VarId) -> &str {
        self.vars.get(&id).map(|v| v.name.as_str()).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.vars.iter().map(|(id, v)| (*id, v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn this_is_a_single_handle() {
        let mut table = SymbolTable::new();
        let a = table.this();
        let b = table.system(SystemVariable::This);
        assert_eq!(a, b);
        assert_eq!(table.name(a), "__this");
    }

    #[test]
    fn constants_pool_by_value_and_type() {
        let mut table = SymbolTable::new();
        let a = table.constant(VarType::Int, Value::Int(3));
        let b = table.constant(VarType::Int, Value::Int(3));
        let c = table.constant(VarType::Float, Value::Int(3));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn temps_are_reused_per_type() {
        let mut table = SymbolTable::new();
        let t = table.acquire_temp(VarType::Bool);
        table.release_temp(t);
        let u = table.acquire_temp(VarType::Int);
        let v = table.acquire_temp(VarType::Bool);
        assert_ne!(t, u);
        assert_eq!(t, v);
    }

    #[test]
    fn removing_a_variable_removes_its_shadow() {
        let mut table = SymbolTable::new();
        let decl = VariableDecl::new("score", VarType::Int);
        let id = table.declare_user_variable(&decl).unwrap();
        let prev = table.ensure_previous(id).unwrap();
        assert_eq!(table.name(prev), "__prev_score");
        table.remove_variable(id);
        assert!(table.get(prev).is_none());
        assert!(table.resolve_guid(&decl.guid).is_none());
    }

    #[test]
    fn scope_locals_never_share_storage() {
        let mut table = SymbolTable::new();
        let guid = Uuid::new_v4();
        let a = table.declare_scope_variable("i", VarType::Int);
        table.bind_guid(guid, a);
        table.unbind(a);
        let b = table.declare_scope_variable("i", VarType::Int);
        assert_ne!(table.name(a), table.name(b));
        assert!(table.resolve_guid(&guid).is_none());
    }
}
