use indexmap::IndexMap;

use super::method::Method;
use super::op::{Instruction, Target};
use super::symbols::SymbolTable;
use crate::error::{CompileError, CompileResult};
use crate::trigger::Value;

/// Ordered collection of a program's methods.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: IndexMap<String, Method>,
    label_counter: usize,
}

impl MethodTable {
    pub fn new() -> Self {
        MethodTable::default()
    }

    /// Returns the method with this name, creating it on first request.
    pub fn get_or_create(&mut self, name: &str) -> &mut Method {
        self.methods.entry(name.to_string()).or_insert_with(|| Method::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Method> {
        self.methods.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Adds a method, appending its body to an existing method of the same name.
    pub fn merge(&mut self, method: Method) {
        match self.methods.get_mut(&method.name) {
            Some(existing) => {
                existing.exported |= method.exported;
                existing.instructions.extend(method.instructions);
            }
            None => {
                self.methods.insert(method.name.clone(), method);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Method> {
        self.methods.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Method> {
        self.methods.values_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Program-unique jump label.
    pub fn new_label(&mut self, hint: &str) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("__lbl_{}_{}", hint, n)
    }

    /// Assigns byte addresses to every label and rewrites jumps to them.
    ///
    /// Methods are laid out in table order. Method names count as labels at
    /// the first byte of their method.
    pub fn resolve_addresses(&mut self) -> CompileResult<IndexMap<String, u32>> {
        let mut labels: IndexMap<String, u32> = IndexMap::new();
        let mut addr = 0u32;
        for method in self.methods.values() {
            if labels.insert(method.name.clone(), addr).is_some() {
                return Err(CompileError::DuplicateLabel(method.name.clone()));
            }
            for instruction in &method.instructions {
                if let Instruction::Label(name) = instruction {
                    if labels.insert(name.clone(), addr).is_some() {
                        return Err(CompileError::DuplicateLabel(name.clone()));
                    }
                }
                addr += instruction.size();
            }
        }

        for method in self.methods.values_mut() {
            for instruction in method.instructions.iter_mut() {
                let target = match instruction {
                    Instruction::Jump(t) | Instruction::JumpIfFalse(t) => t,
                    _ => continue,
                };
                if let Target::Label(name) = target {
                    let resolved = labels
                        .get(name.as_str())
                        .copied()
                        .ok_or_else(|| CompileError::UnresolvedLabel(name.clone()))?;
                    *target = Target::Address(resolved);
                }
            }
        }
        log::debug!("resolved {} label(s), code size {} bytes", labels.len(), addr);
        Ok(labels)
    }
}

/// Symbols and code of one program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub symbols: SymbolTable,
    pub methods: MethodTable,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Resolves jump targets, then replaces label-valued constants with the
    /// addresses they name.
    pub fn resolve_addresses(&mut self) -> CompileResult<()> {
        let labels = self.methods.resolve_addresses()?;
        let ids: Vec<_> = self.symbols.iter().map(|(id, _)| id).collect();
        for id in ids {
            let Some(var) = self.symbols.get_mut(id) else { continue };
            if let Value::Label(label) = &var.default {
                let addr = labels
                    .get(label.as_str())
                    .copied()
                    .ok_or_else(|| CompileError::UnresolvedLabel(label.clone()))?;
                var.default = Value::UInt(addr);
            }
        }
        Ok(())
    }

    /// Number of instructions referencing the named heap symbol.
    pub fn reference_count(&self, symbol: &str) -> usize {
        self.methods
            .iter()
            .flat_map(|m| m.instructions.iter())
            .filter(|i| i.symbol() == Some(symbol))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_resolves_to_same_method() {
        let mut table = MethodTable::new();
        table.get_or_create("_interact").emit(Instruction::Nop);
        table.get_or_create("_interact").emit(Instruction::Pop);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("_interact").map(|m| m.instructions.len()), Some(2));
    }

    #[test]
    fn labels_resolve_to_byte_offsets() {
        let mut table = MethodTable::new();
        let m = table.get_or_create("a");
        m.emit(Instruction::push("x"));
        m.emit(Instruction::Pop);
        m.emit(Instruction::Label("here".to_string()));
        m.emit(Instruction::jump("here"));
        let labels = table.resolve_addresses().unwrap();
        assert_eq!(labels.get("here"), Some(&12));
        assert_eq!(
            table.get("a").map(|m| m.instructions[3].clone()),
            Some(Instruction::Jump(Target::Address(12)))
        );
    }
}
