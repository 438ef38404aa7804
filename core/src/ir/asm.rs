//! file: core/src/ir/asm.rs
//! description: the assembler-facing image of a finished program and its
//! textual assembly form.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::method::Method;
use super::program::Program;
use crate::trigger::{SyncMode, Value, VarType};

/// One heap slot with its initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    pub default: Value,
    #[serde(default)]
    pub exported: bool,
    #[serde(default)]
    pub sync: SyncMode,
}

/// Everything the assembler consumes: heap layout and ordered methods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramImage {
    pub heap: Vec<HeapEntry>,
    pub methods: Vec<Method>,
}

impl ProgramImage {
    pub fn from_program(program: &Program) -> Self {
        let heap = program
            .symbols
            .iter()
            .map(|(_, var)| HeapEntry {
                name: var.name.clone(),
                ty: var.ty.clone(),
                default: var.default.clone(),
                exported: var.exported,
                sync: var.sync,
            })
            .collect();
        ProgramImage { heap, methods: program.methods.iter().cloned().collect() }
    }

    /// Smallest heap able to hold every slot.
    pub fn heap_size(&self) -> u32 {
        self.heap.len() as u32
    }

    pub fn heap_index(&self, name: &str) -> Option<u32> {
        self.heap.iter().position(|h| h.name == name).map(|i| i as u32)
    }

    /// Renders the textual assembly handed to the VM tooling.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, ".data_start");
        for entry in &self.heap {
            if entry.exported {
                let _ = writeln!(out, "    .export {}", entry.name);
            }
            if entry.sync.is_synced() {
                let _ = writeln!(out, "    .sync {}, {}", entry.name, entry.sync.directive());
            }
        }
        for entry in &self.heap {
            let _ = writeln!(out, "    {}: %{}, {}", entry.name, entry.ty.vm_name(), entry.default);
        }
        let _ = writeln!(out, ".data_end");
        let _ = writeln!(out);
        let _ = writeln!(out, ".code_start");
        for method in &self.methods {
            if method.exported {
                let _ = writeln!(out, "    .export {}", method.name);
            }
            let _ = writeln!(out, "    {}:", method.name);
            for instruction in &method.instructions {
                let _ = writeln!(out, "        {}", instruction);
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out, ".code_end");
        out
    }
}
