//! file: core/src/actions/builtins.rs
//! description: the compiled-in action manifest.
//!
//! Declares the primitive actions and built-in events every program may use
//! without registering an extra manifest, plus the extern signatures the
//! compiler itself emits.

use super::manifest::{
    ActionManifest, BuiltinEventDef, EventParamSpec, ParamSpec, PrimitiveDef, PrimitiveOp, ScopeKind,
};
use crate::trigger::{Value, VarType};

/// Extern signatures emitted by the compiler outside of user actions.
pub mod externs {
    pub const IS_OWNER: &str = "Networking.__IsOwner__PlayerApi_GameObject__SystemBoolean";
    pub const SET_OWNER: &str = "Networking.__SetOwner__PlayerApi_GameObject__SystemVoid";
    pub const GET_OWNER: &str = "Networking.__GetOwner__GameObject__PlayerApi";
    pub const GET_LOCAL_PLAYER: &str = "Networking.__get_LocalPlayer__PlayerApi";
    pub const IS_MASTER: &str = "PlayerApi.__get_isMaster__SystemBoolean";
    pub const SEND_NETWORK_EVENT: &str =
        "Behaviour.__SendCustomNetworkEvent__NetworkTarget_SystemString__SystemVoid";
    pub const SEND_DELAYED_SECONDS: &str =
        "Behaviour.__SendCustomEventDelayedSeconds__SystemString_SystemSingle__SystemVoid";
    pub const SEND_DELAYED_FRAMES: &str =
        "Behaviour.__SendCustomEventDelayedFrames__SystemString_SystemInt32__SystemVoid";
    pub const REQUEST_SERIALIZATION: &str = "Behaviour.__RequestSerialization__SystemVoid";
    pub const OBJECT_EQUALS: &str = "SystemObject.__Equals__SystemObject__SystemBoolean";
    pub const BOOL_NOT: &str = "SystemBoolean.__op_UnaryNegation__SystemBoolean__SystemBoolean";
    pub const BOOL_INEQUALITY: &str =
        "SystemBoolean.__op_Inequality__SystemBoolean_SystemBoolean__SystemBoolean";
    pub const INT_ADD: &str = "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32";
    pub const INT_LESS: &str = "SystemInt32.__op_LessThan__SystemInt32_SystemInt32__SystemBoolean";
    pub const INT_GREATER: &str =
        "SystemInt32.__op_GreaterThan__SystemInt32_SystemInt32__SystemBoolean";
    pub const INT_REMAINDER: &str =
        "SystemInt32.__op_Remainder__SystemInt32_SystemInt32__SystemInt32";
    pub const INT_EQUALS: &str = "SystemInt32.__op_Equality__SystemInt32_SystemInt32__SystemBoolean";
}

/// Networking externs whose target object decides whether the program must
/// be networked: `(signature, pushed operand count, index of the target)`.
pub const NETWORK_EXTERNS: &[(&str, usize, usize)] = &[
    (externs::IS_OWNER, 3, 1),
    (externs::SET_OWNER, 2, 1),
    (externs::GET_OWNER, 2, 0),
    (externs::SEND_NETWORK_EVENT, 3, 0),
];

fn ext(id: &str, signature: &str, params: Vec<ParamSpec>) -> PrimitiveDef {
    PrimitiveDef {
        id: id.to_string(),
        op: PrimitiveOp::Extern { signature: signature.to_string() },
        params,
        repeatable_first: false,
        deprecated: None,
    }
}

fn special(id: &str, op: PrimitiveOp, params: Vec<ParamSpec>) -> PrimitiveDef {
    PrimitiveDef { id: id.to_string(), op, params, repeatable_first: false, deprecated: None }
}

fn scope(id: &str, kind: ScopeKind, params: Vec<ParamSpec>) -> PrimitiveDef {
    special(id, PrimitiveOp::Scope { scope: kind }, params)
}

fn event(name: &str, method: &str, params: &[(&str, VarType, &str)]) -> BuiltinEventDef {
    BuiltinEventDef {
        name: name.to_string(),
        method: method.to_string(),
        params: params
            .iter()
            .map(|(n, ty, var)| EventParamSpec {
                name: n.to_string(),
                ty: ty.clone(),
                variable: var.to_string(),
            })
            .collect(),
    }
}

pub fn builtin_manifest() -> ActionManifest {
    use VarType::*;

    let mut set_active = ext(
        "set_active",
        "GameObject.__SetActive__SystemBoolean__SystemVoid",
        vec![ParamSpec::input("target", GameObject), ParamSpec::input("active", Bool)],
    );
    set_active.repeatable_first = true;

    let mut log_message = ext(
        "log_message",
        "Debug.__Log__SystemObject__SystemVoid",
        vec![ParamSpec::input("message", Object)],
    );
    log_message.deprecated = Some("use 'debug_log'".to_string());

    let actions = vec![
        special(
            "assign",
            PrimitiveOp::Assign,
            vec![ParamSpec::input("source", Object), ParamSpec::output("target", Object)],
        ),
        scope("if", ScopeKind::If, vec![ParamSpec::input("condition", Bool)]),
        scope("else_if", ScopeKind::ElseIf, vec![ParamSpec::input("condition", Bool)]),
        scope("else", ScopeKind::Else, vec![]),
        scope("while", ScopeKind::While, vec![ParamSpec::input("condition", Bool)]),
        scope(
            "for",
            ScopeKind::For,
            vec![
                ParamSpec::input("start", Int),
                ParamSpec::input("end", Int),
                ParamSpec::input("step", Int).with_default(Value::Int(1)),
                ParamSpec::output("index", Int),
            ],
        ),
        scope("block", ScopeKind::Block, vec![]),
        special("end", PrimitiveOp::End, vec![]),
        special("break", PrimitiveOp::Break, vec![]),
        special("continue", PrimitiveOp::Continue, vec![]),
        ext("debug_log", "Debug.__Log__SystemObject__SystemVoid", vec![ParamSpec::input("message", Object)]),
        log_message,
        set_active,
        ext(
            "set_owner",
            externs::SET_OWNER,
            vec![ParamSpec::input("player", Player), ParamSpec::input("target", GameObject)],
        ),
        ext(
            "is_owner",
            externs::IS_OWNER,
            vec![
                ParamSpec::input("player", Player),
                ParamSpec::input("target", GameObject),
                ParamSpec::output("result", Bool),
            ],
        ),
        ext(
            "get_owner",
            externs::GET_OWNER,
            vec![ParamSpec::input("target", GameObject), ParamSpec::output("owner", Player)],
        ),
        ext(
            "add_int",
            externs::INT_ADD,
            vec![
                ParamSpec::input("a", Int),
                ParamSpec::input("b", Int),
                ParamSpec::output("result", Int),
            ],
        ),
        ext(
            "equals_int",
            externs::INT_EQUALS,
            vec![
                ParamSpec::input("a", Int),
                ParamSpec::input("b", Int),
                ParamSpec::output("result", Bool),
            ],
        ),
        ext(
            "not",
            externs::BOOL_NOT,
            vec![ParamSpec::input("value", Bool), ParamSpec::output("result", Bool)],
        ),
        ext(
            "send_custom_event",
            "UdonBehaviour.__SendCustomEvent__SystemString__SystemVoid",
            vec![ParamSpec::input("target", Object), ParamSpec::input("event", String)],
        ),
        ext(
            "teleport_player",
            "PlayerApi.__TeleportTo__Vector3__SystemVoid",
            vec![ParamSpec::input("player", Player), ParamSpec::input("position", Vector3)],
        ),
    ];

    let events = vec![
        event("Start", "_start", &[]),
        event("Update", "_update", &[]),
        event("Interact", "_interact", &[]),
        event("PlayerJoined", "_onPlayerJoined", &[("player", Player, "onPlayerJoinedPlayer")]),
        event("PlayerLeft", "_onPlayerLeft", &[("player", Player, "onPlayerLeftPlayer")]),
        event(
            "OwnershipTransferred",
            "_onOwnershipTransferred",
            &[("player", Player, "onOwnershipTransferredPlayer")],
        ),
        event("Deserialization", "_onDeserialization", &[]),
        event("PreSerialization", "_onPreSerialization", &[]),
        event(
            "PlayerTriggerEnter",
            "_onPlayerTriggerEnter",
            &[("player", Player, "onPlayerTriggerEnterPlayer")],
        ),
    ];

    ActionManifest {
        name: "builtin".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "primitive actions and events available to every program".to_string(),
        actions,
        events,
    }
}
