//! file: core/src/compile/refs.rs
//! description: per-position literal records and event method chains
//! exported with a compiled program.

use serde::{Deserialize, Serialize};

use crate::trigger::{InputSlot, TriggerData, Value, VarType};

/// Locates one user literal so it can be patched per object instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceIndex {
    pub event_index: usize,
    pub action_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_index: Option<usize>,
    pub variable_index: usize,
    pub symbol: String,
    #[serde(rename = "type")]
    pub ty: VarType,
}

impl ReferenceIndex {
    /// Heap symbol reserved for the literal at this position.
    pub fn symbol_name(event: usize, action: usize, multi: Option<usize>, variable: usize) -> String {
        match multi {
            Some(m) => format!("__refconst_e{}_a{}_m{}_v{}", event, action, m, variable),
            None => format!("__refconst_e{}_a{}_v{}", event, action, variable),
        }
    }

    /// Looks the literal up in the trigger data it was compiled from.
    pub fn resolve<'d>(&self, data: &'d TriggerData) -> Option<&'d Value> {
        let action = data.events.get(self.event_index)?.actions.get(self.action_index)?;
        let slot = match self.multi_index {
            Some(m) => action.multi_inputs.get(m)?,
            None => action.inputs.get(self.variable_index)?,
        };
        match slot {
            InputSlot::Constant { value } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Direct call through the return-address convention.
    Call,
    /// Network dispatch by method name.
    Broadcast,
    /// Replay bookkeeping calling the body.
    Replay,
    /// Delayed dispatch by method name.
    Delay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub from: String,
    pub to: String,
    pub kind: LinkKind,
}

/// Methods an event compiled to, outermost first, and how they connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChain {
    pub event_index: usize,
    pub methods: Vec<String>,
    pub links: Vec<ChainLink>,
}

impl EventChain {
    pub fn base(&self) -> Option<&str> {
        self.methods.first().map(String::as_str)
    }

    pub fn body(&self) -> Option<&str> {
        self.methods.last().map(String::as_str)
    }

    pub fn count(&self, kind: LinkKind) -> usize {
        self.links.iter().filter(|l| l.kind == kind).count()
    }

    /// Whether `to` is reachable from `from` following chain links.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut current = from;
        if current == to {
            return true;
        }
        while let Some(link) = self.links.iter().find(|l| l.from == current) {
            if link.to == to {
                return true;
            }
            current = &link.to;
        }
        false
    }
}
