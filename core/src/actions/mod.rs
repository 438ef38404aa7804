pub mod builtins;
pub mod manifest;
pub mod registry;

pub use builtins::{NETWORK_EXTERNS, builtin_manifest, externs};
pub use manifest::{
    ActionManifest, BuiltinEventDef, EventParamSpec, ParamSpec, PrimitiveDef, PrimitiveOp, ScopeKind,
    discover_manifests_in_dir,
};
pub use registry::{ActionRegistry, ActionTarget, BUILTIN_REGISTRY, ResolvedAction};
