//! file: core/src/actions/manifest.rs
//! description: action manifest types and discovery helpers.
//!
//! Defines `ActionManifest`, the JSON document that describes a set of
//! primitive actions and built-in events. The compiler ships one manifest
//! compiled in (see `builtins.rs`); hosts may register more at startup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::trigger::{Value, VarType};

/// Block construct opened by a scope action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    If,
    ElseIf,
    Else,
    While,
    For,
    Block,
}

impl ScopeKind {
    pub fn is_loop(self) -> bool {
        matches!(self, ScopeKind::While | ScopeKind::For)
    }

    /// Kinds that continue a preceding conditional chain.
    pub fn follows_conditional(self) -> bool {
        matches!(self, ScopeKind::ElseIf | ScopeKind::Else)
    }
}

/// What the compiler emits for a primitive action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimitiveOp {
    /// Push every operand, then call the VM extern.
    Extern { signature: String },
    /// `PUSH src; PUSH dst; COPY`.
    Assign,
    Scope { scope: ScopeKind },
    End,
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn input(name: &str, ty: VarType) -> Self {
        ParamSpec { name: name.to_string(), ty, output: false, default: None }
    }

    pub fn output(name: &str, ty: VarType) -> Self {
        ParamSpec { name: name.to_string(), ty, output: true, default: None }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Value used when the slot is left at `Default`.
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or_else(|| self.ty.default_value())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveDef {
    pub id: String,
    pub op: PrimitiveOp,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// First parameter takes a variable-length list; one call per entry.
    #[serde(default)]
    pub repeatable_first: bool,
    /// Replacement hint shown when the action is used.
    #[serde(default)]
    pub deprecated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    /// Fixed heap variable the VM writes before invoking the event.
    pub variable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinEventDef {
    pub name: String,
    /// Reserved method name the VM calls.
    pub method: String,
    #[serde(default)]
    pub params: Vec<EventParamSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actions: Vec<PrimitiveDef>,
    #[serde(default)]
    pub events: Vec<BuiltinEventDef>,
}

impl ActionManifest {
    /// Load a manifest from a JSON file path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ActionManifest, String> {
        let raw = std::fs::read_to_string(&path).map_err(|e| format!("read manifest: {}", e))?;
        serde_json::from_str(&raw).map_err(|e| format!("parse manifest: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("manifest name is empty".to_string());
        }
        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.id.as_str()) {
                return Err(format!("duplicate action id '{}'", action.id));
            }
            if action.repeatable_first && action.params.is_empty() {
                return Err(format!("action '{}' is repeatable but has no parameters", action.id));
            }
        }
        let mut seen = HashSet::new();
        for event in &self.events {
            if !seen.insert(event.name.as_str()) {
                return Err(format!("duplicate event name '{}'", event.name));
            }
            if !event.method.starts_with('_') {
                return Err(format!("event '{}' method must start with '_'", event.name));
            }
        }
        Ok(())
    }
}

/// Discover manifests in a directory: every `*.json` file directly inside it.
/// Returns (manifest, manifest_path) tuples sorted by path.
pub fn discover_manifests_in_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<(ActionManifest, PathBuf)>, String> {
    let mut out = Vec::new();
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(out);
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| format!("read dir: {}", e))? {
        let entry = entry.map_err(|e| format!("read dir entry: {}", e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in paths {
        let manifest = ActionManifest::load_from_file(&path)?;
        manifest.validate()?;
        out.push((manifest, path));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHTS: &str = r#"{
        "name": "lights",
        "actions": [
            { "id": "dim", "op": { "kind": "extern", "signature": "Light.__set_intensity__SystemSingle__SystemVoid" },
              "params": [ { "name": "level", "type": "float" } ] }
        ]
    }"#;

    #[test]
    fn discovers_json_manifests_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lights.json"), LIGHTS).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

        let found = discover_manifests_in_dir(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        let (manifest, path) = &found[0];
        assert_eq!(manifest.name, "lights");
        assert_eq!(manifest.actions[0].params[0].ty, VarType::Float);
        assert!(path.ends_with("lights.json"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_manifests_in_dir(dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let doubled = LIGHTS.replacen(
            "\"actions\": [",
            "\"actions\": [ { \"id\": \"dim\", \"op\": { \"kind\": \"assign\" } },",
            1,
        );
        std::fs::write(dir.path().join("lights.json"), doubled).unwrap();
        let err = discover_manifests_in_dir(dir.path()).unwrap_err();
        assert!(err.contains("duplicate action id 'dim'"));
    }
}
