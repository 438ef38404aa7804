//! file: core/src/compile/event.rs
//! description: per-event emission and the gate/delay/broadcast/replay
//! method chain wrapped around each event body.

use super::action::{emit_action, flush_previous};
use super::context::{CompileContext, change_method};
use super::refs::{ChainLink, EventChain, LinkKind};
use crate::actions::externs;
use crate::error::CompileResult;
use crate::ir::{Instruction, SystemVariable, VarId};
use crate::location::ActionLocation;
use crate::trigger::{
    Broadcast, Delay, EventDecl, EventTrigger, Gate, ReplayMode, SyncMode, Value, VarType,
    custom_param_variable, is_legal_identifier,
};

const DESERIALIZATION: &str = "_onDeserialization";

/// Emits one event. Semantic problems are reported and skip the event;
/// structural ones are returned.
pub(crate) fn emit_event(ctx: &mut CompileContext<'_>, index: usize, event: &EventDecl) -> CompileResult<()> {
    let at = ActionLocation::event(index);
    let options = &event.options;
    let resolved = resolve_base(ctx, index, event);
    let delay_ok = match options.delay {
        Delay::Frames(n) if i32::try_from(n).is_err() => {
            ctx.error(Some(at), format!("delay of {} frames is out of range", n));
            false
        }
        _ => true,
    };
    let Some((base, exported, params)) = resolved.filter(|_| delay_ok) else {
        return check_actions(ctx, index, event);
    };

    ctx.scopes.reset(params);
    let replay = if options.replay != ReplayMode::None && options.broadcast == Broadcast::Local {
        ctx.warn(Some(at), "replay has no effect on an event that is not broadcast");
        ReplayMode::None
    } else {
        options.replay
    };
    let chained = options.gate != Gate::Anyone || options.broadcast != Broadcast::Local || options.delay != Delay::None;

    ctx.program.methods.get_or_create(&base).exported |= exported;
    let body = if chained { format!("ev{}__body", index) } else { base.clone() };

    for (a, action) in event.actions.iter().enumerate() {
        emit_action(ctx, &body, ActionLocation::action(index, a), action)?;
    }
    flush_previous(ctx, &body);
    let symbols = &mut ctx.program.symbols;
    ctx.scopes.finish_event(index, symbols)?;

    let mut chain = EventChain { event_index: index, methods: vec![base.clone()], links: Vec::new() };
    if chained {
        // (wrap, what it dispatches to, link kind), innermost first
        let mut inner = body.clone();
        let mut wraps: Vec<(String, String, LinkKind)> = Vec::new();
        if replay != ReplayMode::None {
            let method = emit_replay(ctx, index, &inner, replay);
            wraps.push((method.clone(), inner, LinkKind::Replay));
            inner = method;
        }
        if options.broadcast != Broadcast::Local {
            let method = emit_broadcast(ctx, index, &inner, options.broadcast);
            wraps.push((method.clone(), inner, LinkKind::Broadcast));
            inner = method;
        }
        if options.delay != Delay::None {
            let method = emit_delay(ctx, index, &inner, options.delay);
            wraps.push((method.clone(), inner, LinkKind::Delay));
            inner = method;
        }
        emit_gate(ctx, &base, &inner, options.gate);

        chain.links.push(ChainLink { from: base.clone(), to: inner, kind: LinkKind::Call });
        for (method, target, kind) in wraps.into_iter().rev() {
            chain.methods.push(method.clone());
            chain.links.push(ChainLink { from: method, to: target, kind });
        }
        chain.methods.push(body);
    }
    ctx.chains.push(chain);
    Ok(())
}

/// Emits the actions of an event that cannot be built into a scratch method
/// and drops it, so their own problems are still reported.
fn check_actions(ctx: &mut CompileContext<'_>, index: usize, event: &EventDecl) -> CompileResult<()> {
    let scratch = format!("ev{}__unreachable", index);
    ctx.scopes.reset(Vec::new());
    for (a, action) in event.actions.iter().enumerate() {
        emit_action(ctx, &scratch, ActionLocation::action(index, a), action)?;
    }
    flush_previous(ctx, &scratch);
    let symbols = &mut ctx.program.symbols;
    ctx.scopes.finish_event(index, symbols)?;
    ctx.program.methods.remove(&scratch);
    Ok(())
}

/// Base method, whether the VM may call it by name, and parameter storage.
fn resolve_base(
    ctx: &mut CompileContext<'_>,
    index: usize,
    event: &EventDecl,
) -> Option<(String, bool, Vec<VarId>)> {
    let at = Some(ActionLocation::event(index));
    match &event.trigger {
        EventTrigger::Builtin { name, params } => {
            let Some(def) = ctx.registry.event(name).cloned() else {
                ctx.error(at, format!("unknown event '{}'", name));
                return None;
            };
            if params.len() > def.params.len() {
                ctx.error(at, format!("event '{}' takes {} parameter(s), got {}", name, def.params.len(), params.len()));
                return None;
            }
            let mut storage = Vec::new();
            for (decl, spec) in params.iter().zip(def.params.iter()) {
                let id = ctx.program.symbols.declare_event_param(&spec.variable, spec.ty.clone());
                ctx.program.symbols.bind_guid(decl.guid, id);
                storage.push(id);
            }
            Some((def.method, true, storage))
        }
        EventTrigger::Custom { name, params } => {
            if !is_legal_identifier(name) || name.starts_with('_') || name.contains("__") {
                ctx.error(at, format!("custom event name '{}' is not a legal identifier", name));
                return None;
            }
            if params.is_empty() {
                if ctx.parameterized_events.contains_key(name) {
                    ctx.warn(at, format!("event '{}' is ambiguous with a parameterized event of the same name", name));
                }
            } else if !ctx.seen_parameterized.insert(name.clone()) {
                ctx.error(at, format!("parameterized event '{}' is declared more than once", name));
                return None;
            }
            let mut storage = Vec::new();
            for param in params {
                let variable = custom_param_variable(name, &param.name);
                let id = ctx
                    .program
                    .symbols
                    .declare_internal(&variable, param.ty.clone(), param.ty.default_value());
                ctx.program.symbols.bind_guid(param.guid, id);
                storage.push(id);
            }
            Some((name.clone(), true, storage))
        }
        EventTrigger::Changed { variable } => {
            let watched = ctx
                .program
                .symbols
                .resolve_guid(variable)
                .and_then(|id| ctx.program.symbols.get(id))
                .filter(|v| v.on_change.is_some())
                .map(|v| change_method(&v.name));
            match watched {
                Some(method) => Some((method, false, Vec::new())),
                None => {
                    ctx.error(at, format!("change event refers to variable {} which is not watched", variable));
                    None
                }
            }
        }
    }
}

fn emit_gate(ctx: &mut CompileContext<'_>, base: &str, target: &str, gate: Gate) {
    let skip = ctx.new_label("gate");
    let allowed = match gate {
        Gate::Anyone => None,
        Gate::Owner | Gate::Master => {
            let player = ctx.program.symbols.system(SystemVariable::LocalPlayer);
            let player = ctx.program.symbols.name(player).to_string();
            let flag = ctx.program.symbols.acquire_temp(VarType::Bool);
            let flag_name = ctx.program.symbols.name(flag).to_string();
            if gate == Gate::Owner {
                let this = ctx.program.symbols.this();
                let this = ctx.program.symbols.name(this).to_string();
                ctx.emit_all(
                    base,
                    [
                        Instruction::Push(player),
                        Instruction::Push(this),
                        Instruction::push(flag_name.as_str()),
                        Instruction::Extern(externs::IS_OWNER.to_string()),
                    ],
                );
            } else {
                ctx.emit_all(
                    base,
                    [
                        Instruction::Push(player),
                        Instruction::push(flag_name.as_str()),
                        Instruction::Extern(externs::IS_MASTER.to_string()),
                    ],
                );
            }
            Some((flag, flag_name))
        }
    };
    if let Some((_, flag_name)) = &allowed {
        ctx.emit_all(base, [Instruction::push(flag_name.as_str()), Instruction::jump_if_false(skip.as_str())]);
    }
    ctx.call(base, target);
    ctx.emit(base, Instruction::Label(skip));
    if let Some((flag, _)) = allowed {
        ctx.program.symbols.release_temp(flag);
    }
}

/// Constant naming a method the VM may invoke by name. The target becomes
/// exported so the VM can find it.
fn method_name_constant(ctx: &mut CompileContext<'_>, target: &str) -> String {
    ctx.program.methods.get_or_create(target).exported = true;
    let id = ctx.program.symbols.constant(VarType::String, Value::Method(target.to_string()));
    ctx.program.symbols.name(id).to_string()
}

fn emit_broadcast(ctx: &mut CompileContext<'_>, index: usize, target: &str, broadcast: Broadcast) -> String {
    let method = format!("ev{}__broadcast", index);
    let network_target = match broadcast {
        Broadcast::Owner => 1,
        _ => 0,
    };
    let this = ctx.program.symbols.this();
    let this = ctx.program.symbols.name(this).to_string();
    let mode = ctx
        .program
        .symbols
        .constant(VarType::Other("NetworkEventTarget".to_string()), Value::Int(network_target));
    let mode = ctx.program.symbols.name(mode).to_string();
    let name = method_name_constant(ctx, target);
    ctx.emit_all(
        &method,
        [
            Instruction::Push(this),
            Instruction::Push(mode),
            Instruction::Push(name),
            Instruction::Extern(externs::SEND_NETWORK_EVENT.to_string()),
        ],
    );
    method
}

fn emit_delay(ctx: &mut CompileContext<'_>, index: usize, target: &str, delay: Delay) -> String {
    let method = format!("ev{}__delay", index);
    let (amount, signature) = match delay {
        // range checked before the chain is built
        Delay::Frames(n) => (
            ctx.program.symbols.constant(VarType::Int, Value::Int(i32::try_from(n).unwrap_or(i32::MAX))),
            externs::SEND_DELAYED_FRAMES,
        ),
        Delay::Seconds(s) => (
            ctx.program.symbols.constant(VarType::Float, Value::Float(s)),
            externs::SEND_DELAYED_SECONDS,
        ),
        Delay::None => (
            ctx.program.symbols.constant(VarType::Int, Value::Int(0)),
            externs::SEND_DELAYED_FRAMES,
        ),
    };
    let amount = ctx.program.symbols.name(amount).to_string();
    let this = ctx.program.symbols.this();
    let this = ctx.program.symbols.name(this).to_string();
    let name = method_name_constant(ctx, target);
    ctx.emit_all(
        &method,
        [
            Instruction::Push(this),
            Instruction::Push(name),
            Instruction::Push(amount),
            Instruction::Extern(signature.to_string()),
        ],
    );
    method
}

/// Replay bookkeeping: the owner counts occurrences in a synced counter,
/// everyone counts what they executed, and non-owners catch up on missed
/// occurrences when the counter arrives.
fn emit_replay(ctx: &mut CompileContext<'_>, index: usize, body: &str, mode: ReplayMode) -> String {
    let method = format!("ev{}__replay", index);
    let counter = ctx
        .program
        .symbols
        .declare_internal(&format!("__replay_{}", index), VarType::Int, Value::Int(0));
    if let Some(var) = ctx.program.symbols.get_mut(counter) {
        var.sync = SyncMode::Synced;
    }
    let executed = ctx
        .program
        .symbols
        .declare_internal(&format!("__replayed_{}", index), VarType::Int, Value::Int(0));
    let counter = ctx.program.symbols.name(counter).to_string();
    let executed = ctx.program.symbols.name(executed).to_string();
    let one = ctx.program.symbols.constant(VarType::Int, Value::Int(1));
    let one = ctx.program.symbols.name(one).to_string();

    let not_owner = ctx.new_label("replay_remote");
    let owner = emit_owner_check(ctx, &method);
    ctx.emit_all(
        &method,
        [Instruction::push(owner.as_str()), Instruction::jump_if_false(not_owner.as_str())],
    );
    ctx.emit_all(&method, increment(&counter, &one));
    ctx.emit(&method, Instruction::Sentinel);
    ctx.emit(&method, Instruction::Label(not_owner));
    ctx.emit_all(&method, increment(&executed, &one));
    ctx.call(&method, body);

    emit_catch_up(ctx, body, &counter, &executed, &one, mode);
    method
}

fn emit_catch_up(ctx: &mut CompileContext<'_>, body: &str, counter: &str, executed: &str, one: &str, mode: ReplayMode) {
    let hook = DESERIALIZATION;
    ctx.program.methods.get_or_create(hook).exported = true;
    let remote = ctx.new_label("catchup");
    let done = ctx.new_label("catchup_done");
    let owner = emit_owner_check(ctx, hook);
    ctx.emit_all(
        hook,
        [
            Instruction::push(owner.as_str()),
            Instruction::jump_if_false(remote.as_str()),
            Instruction::jump(done.as_str()),
            Instruction::Label(remote),
        ],
    );
    let flag_id = ctx.program.symbols.acquire_temp(VarType::Bool);
    let flag = ctx.program.symbols.name(flag_id).to_string();
    match mode {
        ReplayMode::Parity => {
            let two = ctx.program.symbols.constant(VarType::Int, Value::Int(2));
            let two = ctx.program.symbols.name(two).to_string();
            let a = ctx.program.symbols.acquire_temp(VarType::Int);
            let b = ctx.program.symbols.acquire_temp(VarType::Int);
            let (a_name, b_name) = (
                ctx.program.symbols.name(a).to_string(),
                ctx.program.symbols.name(b).to_string(),
            );
            let run = ctx.new_label("catchup_run");
            let sync = ctx.new_label("catchup_sync");
            ctx.emit_all(
                hook,
                [
                    Instruction::push(executed),
                    Instruction::push(two.as_str()),
                    Instruction::push(a_name.as_str()),
                    Instruction::Extern(externs::INT_REMAINDER.to_string()),
                    Instruction::push(counter),
                    Instruction::push(two.as_str()),
                    Instruction::push(b_name.as_str()),
                    Instruction::Extern(externs::INT_REMAINDER.to_string()),
                    Instruction::push(a_name.as_str()),
                    Instruction::push(b_name.as_str()),
                    Instruction::push(flag.as_str()),
                    Instruction::Extern(externs::INT_EQUALS.to_string()),
                    Instruction::push(flag.as_str()),
                    Instruction::jump_if_false(run.as_str()),
                    Instruction::jump(sync.as_str()),
                    Instruction::Label(run),
                ],
            );
            ctx.call(hook, body);
            ctx.emit_all(
                hook,
                [
                    Instruction::Label(sync),
                    Instruction::push(counter),
                    Instruction::push(executed),
                    Instruction::Copy,
                ],
            );
            ctx.program.symbols.release_temp(a);
            ctx.program.symbols.release_temp(b);
        }
        _ => {
            let head = ctx.new_label("catchup_loop");
            ctx.emit_all(
                hook,
                [
                    Instruction::Label(head.clone()),
                    Instruction::push(executed),
                    Instruction::push(counter),
                    Instruction::push(flag.as_str()),
                    Instruction::Extern(externs::INT_LESS.to_string()),
                    Instruction::push(flag.as_str()),
                    Instruction::jump_if_false(done.as_str()),
                ],
            );
            ctx.emit_all(hook, increment(executed, one));
            ctx.call(hook, body);
            ctx.emit(hook, Instruction::jump(head));
        }
    }
    ctx.program.symbols.release_temp(flag_id);
    ctx.emit(hook, Instruction::Label(done));
}

/// Emits `IsOwner(localPlayer, this)` into a temp and returns its symbol.
fn emit_owner_check(ctx: &mut CompileContext<'_>, method: &str) -> String {
    let player = ctx.program.symbols.system(SystemVariable::LocalPlayer);
    let player = ctx.program.symbols.name(player).to_string();
    let this = ctx.program.symbols.this();
    let this = ctx.program.symbols.name(this).to_string();
    let flag = ctx.program.symbols.acquire_temp(VarType::Bool);
    let flag_name = ctx.program.symbols.name(flag).to_string();
    ctx.emit_all(
        method,
        [
            Instruction::Push(player),
            Instruction::Push(this),
            Instruction::push(flag_name.as_str()),
            Instruction::Extern(externs::IS_OWNER.to_string()),
        ],
    );
    ctx.program.symbols.release_temp(flag);
    flag_name
}

fn increment(var: &str, one: &str) -> [Instruction; 4] {
    [
        Instruction::push(var),
        Instruction::push(one),
        Instruction::push(var),
        Instruction::Extern(externs::INT_ADD.to_string()),
    ]
}
