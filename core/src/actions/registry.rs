//! file: core/src/actions/registry.rs
//! description: lookup of primitive actions, built-in events and module
//! entries for action instances.

use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;

use super::builtins::builtin_manifest;
use super::manifest::{ActionManifest, BuiltinEventDef, PrimitiveDef, PrimitiveOp, ScopeKind};
use crate::batch::{LinkableProgram, ModuleCache};
use crate::trigger::{ActionRef, ModuleEntry};

lazy_static! {
    pub static ref BUILTIN_REGISTRY: ActionRegistry = {
        let mut registry = ActionRegistry::empty();
        if let Err(e) = registry.register_manifest(builtin_manifest()) {
            log::error!("built-in action manifest rejected: {}", e);
        }
        registry
    };
}

/// Catalogue of primitive actions and built-in events.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    primitives: IndexMap<String, PrimitiveDef>,
    events: IndexMap<String, BuiltinEventDef>,
}

impl ActionRegistry {
    pub fn empty() -> Self {
        ActionRegistry::default()
    }

    /// A registry holding the compiled-in actions and events.
    pub fn builtin() -> Self {
        BUILTIN_REGISTRY.clone()
    }

    /// Adds every action and event of the manifest. Ids already registered
    /// are rejected so a manifest cannot silently replace a primitive.
    pub fn register_manifest(&mut self, manifest: ActionManifest) -> Result<(), String> {
        manifest.validate()?;
        for action in &manifest.actions {
            if self.primitives.contains_key(&action.id) {
                return Err(format!("manifest '{}': action '{}' already registered", manifest.name, action.id));
            }
        }
        for event in &manifest.events {
            if self.events.contains_key(&event.name) {
                return Err(format!("manifest '{}': event '{}' already registered", manifest.name, event.name));
            }
        }
        log::debug!(
            "registering manifest '{}' ({} actions, {} events)",
            manifest.name,
            manifest.actions.len(),
            manifest.events.len()
        );
        for action in manifest.actions {
            self.primitives.insert(action.id.clone(), action);
        }
        for event in manifest.events {
            self.events.insert(event.name.clone(), event);
        }
        Ok(())
    }

    pub fn load_manifest_file<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<(), String> {
        let manifest = ActionManifest::load_from_file(path)?;
        self.register_manifest(manifest)
    }

    pub fn primitive(&self, id: &str) -> Option<&PrimitiveDef> {
        self.primitives.get(id)
    }

    pub fn event(&self, name: &str) -> Option<&BuiltinEventDef> {
        self.events.get(name)
    }

    pub fn primitives(&self) -> impl Iterator<Item = &PrimitiveDef> {
        self.primitives.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &BuiltinEventDef> {
        self.events.values()
    }

    /// Resolves what an action instance calls. Module entries are looked up
    /// in the module cache, which must already hold the module's program.
    pub fn resolve<'a>(&'a self, action: &ActionRef, modules: &ModuleCache) -> ResolvedAction<'a> {
        match action {
            ActionRef::Primitive { id } => match self.primitives.get(id) {
                Some(def) => ResolvedAction::Primitive(def),
                None => ResolvedAction::Invalid(format!("unknown action '{}'", id)),
            },
            ActionRef::Module { module, entry, .. } => {
                let Some(program) = modules.get(module) else {
                    return ResolvedAction::Invalid(format!("module '{}' is not compiled", module));
                };
                let found = program
                    .interface
                    .entries
                    .iter()
                    .find(|e| &e.id == entry)
                    .cloned();
                match found {
                    Some(entry) => ResolvedAction::Module { program, entry },
                    None => ResolvedAction::Invalid(format!("module '{}' has no entry '{}'", module, entry)),
                }
            }
        }
    }
}

/// What an action instance targets once its definition is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget {
    Primitive(String),
    ModuleEntry { module: String, entry: String },
    ScopeOpen(ScopeKind),
    ScopeClose,
}

/// Result of looking up an action instance's definition.
#[derive(Debug, Clone)]
pub enum ResolvedAction<'a> {
    Primitive(&'a PrimitiveDef),
    Module { program: Arc<LinkableProgram>, entry: ModuleEntry },
    Invalid(String),
}

impl ResolvedAction<'_> {
    pub fn target(&self) -> Option<ActionTarget> {
        match self {
            ResolvedAction::Primitive(def) => Some(match &def.op {
                PrimitiveOp::Scope { scope } => ActionTarget::ScopeOpen(*scope),
                PrimitiveOp::End => ActionTarget::ScopeClose,
                _ => ActionTarget::Primitive(def.id.clone()),
            }),
            ResolvedAction::Module { program, entry } => Some(ActionTarget::ModuleEntry {
                module: program.key.clone(),
                entry: entry.id.clone(),
            }),
            ResolvedAction::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_manifest_is_valid() {
        assert!(builtin_manifest().validate().is_ok());
        assert!(BUILTIN_REGISTRY.primitive("assign").is_some());
        assert_eq!(BUILTIN_REGISTRY.event("Interact").map(|e| e.method.as_str()), Some("_interact"));
    }

    #[test]
    fn shared_registry_holds_the_whole_builtin_manifest() {
        let manifest = builtin_manifest();
        assert_eq!(BUILTIN_REGISTRY.primitives().count(), manifest.actions.len());
        assert_eq!(BUILTIN_REGISTRY.events().count(), manifest.events.len());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ActionRegistry::builtin();
        let mut manifest = ActionManifest { name: "extra".to_string(), ..Default::default() };
        manifest.actions.push(registry.primitive("debug_log").cloned().unwrap());
        assert!(registry.register_manifest(manifest).is_err());
    }

    #[test]
    fn scope_actions_classify() {
        let registry = ActionRegistry::builtin();
        let modules = ModuleCache::new();
        let target = registry
            .resolve(&ActionRef::Primitive { id: "while".to_string() }, &modules)
            .target();
        assert_eq!(target, Some(ActionTarget::ScopeOpen(ScopeKind::While)));
        let missing = registry.resolve(&ActionRef::Primitive { id: "nope".to_string() }, &modules);
        assert!(matches!(missing, ResolvedAction::Invalid(_)));
    }
}
