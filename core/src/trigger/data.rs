//! file: core/src/trigger/data.rs
//! description: read-only trigger data consumed by the compiler.
//!
//! Everything here deserializes from the JSON the authoring side exports.
//! The compiler never mutates these values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::{Value, VarType};

/// One program to compile: a trigger, optionally published as a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSource {
    pub key: String,
    pub data: TriggerData,
    #[serde(default)]
    pub module: Option<ModuleInterface>,
}

impl ProgramSource {
    pub fn new(key: impl Into<String>, data: TriggerData) -> Self {
        ProgramSource { key: key.into(), data, module: None }
    }

    pub fn as_module(mut self, interface: ModuleInterface) -> Self {
        self.module = Some(interface);
        self
    }

    /// Keys of every module this program needs compiled before it.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps: BTreeSet<String> = self
            .module
            .as_ref()
            .map(|m| m.dependencies.iter().cloned().collect())
            .unwrap_or_default();
        for event in &self.data.events {
            for action in &event.actions {
                if let ActionRef::Module { module, .. } = &action.action {
                    deps.insert(module.clone());
                }
            }
        }
        deps.remove(&self.key);
        deps
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerData {
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub events: Vec<EventDecl>,
    #[serde(default)]
    pub sync: SyncMethod,
}

/// How the program replicates its synced variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    None,
    Continuous,
    #[default]
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    NotSynced,
    Synced,
    SyncedLinear,
    SyncedSmooth,
}

impl SyncMode {
    pub fn is_synced(self) -> bool {
        self != SyncMode::NotSynced
    }

    /// Interpolation keyword used by the `.sync` assembly directive.
    pub fn directive(self) -> &'static str {
        match self {
            SyncMode::NotSynced | SyncMode::Synced => "none",
            SyncMode::SyncedLinear => "linear",
            SyncMode::SyncedSmooth => "smooth",
        }
    }
}

/// A user-declared program variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDecl {
    pub guid: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub sync: SyncMode,
    #[serde(default)]
    pub exported: bool,
    /// Run `Changed` events for this variable whenever a write changes it.
    #[serde(default)]
    pub on_change: bool,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, ty: VarType) -> Self {
        VariableDecl {
            guid: Uuid::new_v4(),
            name: name.into(),
            ty,
            default: None,
            sync: SyncMode::NotSynced,
            exported: false,
            on_change: false,
        }
    }

    pub fn synced(mut self, sync: SyncMode) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn watched(mut self) -> Self {
        self.on_change = true;
        self
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDecl {
    pub trigger: EventTrigger,
    #[serde(default)]
    pub options: EventOptions,
    #[serde(default)]
    pub actions: Vec<ActionInstance>,
}

impl EventDecl {
    pub fn builtin(name: impl Into<String>) -> Self {
        EventDecl {
            trigger: EventTrigger::Builtin { name: name.into(), params: Vec::new() },
            options: EventOptions::default(),
            actions: Vec::new(),
        }
    }

    pub fn custom(name: impl Into<String>, params: Vec<ParamDecl>) -> Self {
        EventDecl {
            trigger: EventTrigger::Custom { name: name.into(), params },
            options: EventOptions::default(),
            actions: Vec::new(),
        }
    }

    pub fn changed(variable: Uuid) -> Self {
        EventDecl {
            trigger: EventTrigger::Changed { variable },
            options: EventOptions::default(),
            actions: Vec::new(),
        }
    }

    pub fn with_params(mut self, new_params: Vec<ParamDecl>) -> Self {
        match &mut self.trigger {
            EventTrigger::Builtin { params, .. } | EventTrigger::Custom { params, .. } => {
                *params = new_params;
            }
            EventTrigger::Changed { .. } => {}
        }
        self
    }

    pub fn with_options(mut self, options: EventOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_action(mut self, action: ActionInstance) -> Self {
        self.actions.push(action);
        self
    }

    pub fn params(&self) -> &[ParamDecl] {
        match &self.trigger {
            EventTrigger::Builtin { params, .. } | EventTrigger::Custom { params, .. } => params,
            EventTrigger::Changed { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTrigger {
    /// A VM-raised event such as `Interact` or `PlayerJoined`.
    Builtin {
        name: String,
        #[serde(default)]
        params: Vec<ParamDecl>,
    },
    /// A user-named event, callable by name and by modules' callers.
    Custom {
        name: String,
        #[serde(default)]
        params: Vec<ParamDecl>,
    },
    /// Runs after a write changes the given `on_change` variable.
    Changed { variable: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub guid: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    #[serde(default)]
    pub output: bool,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, ty: VarType) -> Self {
        ParamDecl { guid: Uuid::new_v4(), name: name.into(), ty, output: false }
    }

    pub fn output(mut self) -> Self {
        self.output = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventOptions {
    #[serde(default)]
    pub broadcast: Broadcast,
    #[serde(default)]
    pub replay: ReplayMode,
    #[serde(default)]
    pub delay: Delay,
    #[serde(default)]
    pub gate: Gate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Broadcast {
    #[default]
    Local,
    All,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    #[default]
    None,
    /// Late joiners run every missed occurrence.
    All,
    /// Late joiners run once if an odd number of occurrences were missed.
    Parity,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Delay {
    #[default]
    None,
    Seconds(f32),
    Frames(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    #[default]
    Anyone,
    Owner,
    Master,
}

/// A call site inside an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInstance {
    pub action: ActionRef,
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    /// Values for a repeatable first parameter; one call per entry.
    #[serde(default)]
    pub multi_inputs: Vec<InputSlot>,
}

impl ActionInstance {
    pub fn primitive(id: impl Into<String>, inputs: Vec<InputSlot>) -> Self {
        ActionInstance {
            action: ActionRef::Primitive { id: id.into() },
            inputs,
            multi_inputs: Vec::new(),
        }
    }

    pub fn module(module: impl Into<String>, entry: impl Into<String>, inputs: Vec<InputSlot>) -> Self {
        ActionInstance {
            action: ActionRef::Module { module: module.into(), entry: entry.into(), instance: None },
            inputs,
            multi_inputs: Vec::new(),
        }
    }

    pub fn with_instance(mut self, guid: Uuid) -> Self {
        if let ActionRef::Module { instance, .. } = &mut self.action {
            *instance = Some(guid);
        }
        self
    }

    pub fn with_multi(mut self, multi: Vec<InputSlot>) -> Self {
        self.multi_inputs = multi;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRef {
    Primitive {
        id: String,
    },
    Module {
        module: String,
        entry: String,
        #[serde(default)]
        instance: Option<Uuid>,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSlot {
    /// Use the parameter's definition default.
    #[default]
    Default,
    Constant {
        value: Value,
    },
    Variable {
        reference: VarRef,
    },
    /// Declares a new scope-local variable receiving this output.
    Declare {
        guid: Uuid,
        name: String,
    },
}

impl InputSlot {
    pub fn constant(value: Value) -> Self {
        InputSlot::Constant { value }
    }

    pub fn var(guid: Uuid) -> Self {
        InputSlot::Variable { reference: VarRef::Guid(guid) }
    }

    pub fn this() -> Self {
        InputSlot::Variable { reference: VarRef::This }
    }

    pub fn declare(guid: Uuid, name: impl Into<String>) -> Self {
        InputSlot::Declare { guid, name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarRef {
    Guid(Uuid),
    This,
}

/// What a module program exposes to its callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleInterface {
    #[serde(default)]
    pub entries: Vec<ModuleEntry>,
    #[serde(default)]
    pub multi_instance: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub id: String,
    /// Method in the module's own program implementing the entry.
    pub method: String,
    #[serde(default)]
    pub params: Vec<EntryParam>,
    /// First parameter takes a variable-length list; one call per entry.
    #[serde(default)]
    pub repeatable_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    #[serde(default)]
    pub output: bool,
    /// Module variable carrying this parameter.
    pub variable: String,
}

impl ModuleEntry {
    /// Builds an entry backed by a parameterized custom event of the module.
    pub fn from_custom_event(id: impl Into<String>, event_name: &str, params: &[ParamDecl]) -> Self {
        ModuleEntry {
            id: id.into(),
            method: event_name.to_string(),
            params: params
                .iter()
                .map(|p| EntryParam {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    output: p.output,
                    variable: custom_param_variable(event_name, &p.name),
                })
                .collect(),
            repeatable_first: false,
        }
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable_first = true;
        self
    }
}

/// Storage name of a custom event parameter.
pub fn custom_param_variable(event_name: &str, param: &str) -> String {
    format!("{}__{}", event_name, param)
}
