//! file: core/src/compile/action.rs
//! description: emission of single action instances.
//!
//! Each action resolves to a primitive definition, a module entry or
//! nothing. Semantic problems are reported against the action's location
//! and the action is skipped; structural problems are returned.

use std::sync::Arc;

use super::context::CompileContext;
use super::scope::{ForLoop, FrameKind, PreviousScope, ScopeFrame};
use crate::actions::{ActionTarget, ParamSpec, PrimitiveDef, PrimitiveOp, ResolvedAction, ScopeKind, externs};
use crate::batch::LinkableProgram;
use crate::error::CompileResult;
use crate::ir::{Instruction, VarId};
use crate::location::ActionLocation;
use crate::trigger::{ActionInstance, ActionRef, InputSlot, ModuleEntry, VarRef, VarType};

/// Operands of one call, plus the temps to release once it is emitted.
#[derive(Default)]
struct Operands {
    values: Vec<VarId>,
    outputs: Vec<VarId>,
    temps: Vec<VarId>,
}

pub(crate) fn emit_action(
    ctx: &mut CompileContext<'_>,
    method: &str,
    at: ActionLocation,
    action: &ActionInstance,
) -> CompileResult<()> {
    let registry = ctx.registry;
    let resolved = registry.resolve(&action.action, ctx.modules);
    let target = resolved.target();

    if !matches!(target, Some(ActionTarget::ScopeOpen(kind)) if kind.follows_conditional()) {
        flush_previous(ctx, method);
    }

    match resolved {
        ResolvedAction::Invalid(reason) => {
            ctx.error(Some(at), reason);
            Ok(())
        }
        ResolvedAction::Primitive(def) => {
            if let Some(hint) = &def.deprecated {
                ctx.warn(Some(at), format!("action '{}' is deprecated: {}", def.id, hint));
            }
            match &def.op {
                PrimitiveOp::Scope { scope } => {
                    open_scope(ctx, method, at, def, *scope, action);
                    Ok(())
                }
                PrimitiveOp::End => close_scope(ctx, method, at),
                PrimitiveOp::Break | PrimitiveOp::Continue => {
                    loop_control(ctx, method, at, &def.op);
                    Ok(())
                }
                PrimitiveOp::Assign => {
                    emit_assign(ctx, method, at, def, action);
                    Ok(())
                }
                PrimitiveOp::Extern { signature } => {
                    emit_extern(ctx, method, at, def, signature, action);
                    Ok(())
                }
            }
        }
        ResolvedAction::Module { program, entry } => emit_module_call(ctx, method, at, program, &entry, action),
    }
}

/// Places the exit label of a conditional chain that no `else` continues.
pub(crate) fn flush_previous(ctx: &mut CompileContext<'_>, method: &str) {
    if let Some(PreviousScope { pending_exit: Some(exit), .. }) = ctx.scopes.take_previous() {
        ctx.emit(method, Instruction::Label(exit));
    }
}

/// Resolves one input slot against its parameter.
fn resolve_slot(
    ctx: &mut CompileContext<'_>,
    at: ActionLocation,
    multi: Option<usize>,
    position: usize,
    spec: &ParamSpec,
    slot: &InputSlot,
    operands: &mut Operands,
) -> Option<VarId> {
    let id = match slot {
        InputSlot::Default if spec.output => {
            let temp = ctx.program.symbols.acquire_temp(spec.ty.clone());
            operands.temps.push(temp);
            temp
        }
        InputSlot::Default => ctx.program.symbols.constant(spec.ty.clone(), spec.default_value()),
        InputSlot::Constant { value } => {
            if spec.output {
                ctx.error(Some(at), format!("output '{}' cannot be a constant", spec.name));
                return None;
            }
            ctx.literal(at, multi, position, spec.ty.clone(), value.clone())
        }
        InputSlot::Variable { reference: VarRef::This } => {
            if spec.output {
                ctx.error(Some(at), format!("output '{}' cannot target this object", spec.name));
                return None;
            }
            ctx.program.symbols.this()
        }
        InputSlot::Variable { reference: VarRef::Guid(guid) } => match ctx.program.symbols.resolve_guid(guid) {
            Some(id) => id,
            None => {
                ctx.warn(Some(at), format!("'{}' refers to unknown variable {}", spec.name, guid));
                let temp = ctx.program.symbols.acquire_temp(spec.ty.clone());
                operands.temps.push(temp);
                return Some(temp);
            }
        },
        InputSlot::Declare { guid, name } => {
            if !spec.output {
                ctx.error(Some(at), format!("input '{}' cannot declare a variable", spec.name));
                return None;
            }
            let id = ctx.program.symbols.declare_scope_variable(name, spec.ty.clone());
            ctx.program.symbols.bind_guid(*guid, id);
            ctx.scopes.register_local(id);
            id
        }
    };
    if spec.output {
        operands.outputs.push(id);
    }
    Some(id)
}

/// Resolves every parameter of a definition. `first` replaces slot 0 for
/// repeatable actions.
fn resolve_operands(
    ctx: &mut CompileContext<'_>,
    at: ActionLocation,
    params: &[ParamSpec],
    action: &ActionInstance,
    first: Option<(usize, &InputSlot)>,
) -> Option<Operands> {
    if action.inputs.len() > params.len() {
        ctx.warn(Some(at), format!("{} extra input(s) ignored", action.inputs.len() - params.len()));
    }
    let mut operands = Operands::default();
    let mut ok = true;
    for (i, spec) in params.iter().enumerate() {
        let (multi, slot) = match first {
            Some((m, slot)) if i == 0 => (Some(m), slot),
            _ => (None, action.inputs.get(i).unwrap_or(&InputSlot::Default)),
        };
        match resolve_slot(ctx, at, multi, i, spec, slot, &mut operands) {
            Some(id) => operands.values.push(id),
            None => ok = false,
        }
    }
    if ok {
        Some(operands)
    } else {
        release(ctx, operands);
        None
    }
}

fn release(ctx: &mut CompileContext<'_>, operands: Operands) {
    for temp in operands.temps {
        ctx.program.symbols.release_temp(temp);
    }
}

fn emit_extern(
    ctx: &mut CompileContext<'_>,
    method: &str,
    at: ActionLocation,
    def: &PrimitiveDef,
    signature: &str,
    action: &ActionInstance,
) {
    let repetitions: Vec<Option<(usize, &InputSlot)>> = if def.repeatable_first && !action.multi_inputs.is_empty() {
        action.multi_inputs.iter().enumerate().map(Some).collect()
    } else {
        if !action.multi_inputs.is_empty() {
            ctx.warn(Some(at), format!("action '{}' does not repeat; extra inputs ignored", def.id));
        }
        vec![None]
    };
    for first in repetitions {
        let Some(operands) = resolve_operands(ctx, at, &def.params, action, first) else {
            continue;
        };
        for id in &operands.values {
            ctx.push_var(method, *id);
        }
        ctx.emit(method, Instruction::Extern(signature.to_string()));
        for id in operands.outputs.clone() {
            ctx.after_write(method, id);
        }
        release(ctx, operands);
    }
}

fn emit_assign(ctx: &mut CompileContext<'_>, method: &str, at: ActionLocation, def: &PrimitiveDef, action: &ActionInstance) {
    let Some(operands) = resolve_operands(ctx, at, &def.params, action, None) else {
        return;
    };
    if let [source, target] = &operands.values[..] {
        ctx.push_var(method, *source);
        ctx.push_var(method, *target);
        ctx.emit(method, Instruction::Copy);
        ctx.after_write(method, *target);
    }
    release(ctx, operands);
}

fn loop_control(ctx: &mut CompileContext<'_>, method: &str, at: ActionLocation, op: &PrimitiveOp) {
    let (label, what) = match op {
        PrimitiveOp::Break => (ctx.scopes.innermost_loop().and_then(|f| f.exit_label.clone()), "break"),
        _ => (ctx.scopes.innermost_loop().and_then(|f| f.continue_label.clone()), "continue"),
    };
    match label {
        Some(label) => ctx.emit(method, Instruction::jump(label)),
        None => ctx.error(Some(at), format!("'{}' outside of a loop", what)),
    }
}

fn open_scope(
    ctx: &mut CompileContext<'_>,
    method: &str,
    at: ActionLocation,
    def: &PrimitiveDef,
    kind: ScopeKind,
    action: &ActionInstance,
) {
    let mut frame = ScopeFrame::block(kind, at);
    let pending = if kind.follows_conditional() {
        match ctx.scopes.take_previous() {
            Some(PreviousScope { kind: ScopeKind::If | ScopeKind::ElseIf, pending_exit: Some(exit), .. }) => Some(exit),
            other => {
                if let Some(PreviousScope { pending_exit: Some(exit), .. }) = other {
                    ctx.emit(method, Instruction::Label(exit));
                }
                ctx.error(Some(at), format!("'{}' must follow an 'if' or 'else_if' block", def.id));
                // keep the stack balanced for the matching end marker
                frame.kind = FrameKind::Block(ScopeKind::Block);
                ctx.scopes.push(frame);
                return;
            }
        }
    } else {
        None
    };

    match kind {
        ScopeKind::If | ScopeKind::ElseIf => {
            frame.next_label = Some(ctx.new_label("next"));
            frame.exit_label = Some(pending.unwrap_or_else(|| ctx.new_label("endif")));
        }
        ScopeKind::Else => frame.exit_label = pending,
        ScopeKind::While => {
            let start = ctx.new_label("while");
            frame.start_label = Some(start.clone());
            frame.continue_label = Some(start);
            frame.exit_label = Some(ctx.new_label("wend"));
        }
        ScopeKind::For => {
            frame.start_label = Some(ctx.new_label("for"));
            frame.continue_label = Some(ctx.new_label("fnext"));
            frame.exit_label = Some(ctx.new_label("fend"));
        }
        ScopeKind::Block => {}
    }
    ctx.scopes.push(frame);

    let Some(mut operands) = resolve_operands(ctx, at, &def.params, action, None) else {
        return;
    };
    if kind == ScopeKind::For && matches!(action.inputs.get(3), None | Some(InputSlot::Default)) {
        // the loop index outlives this action, so it cannot stay a temp
        let id = ctx.program.symbols.declare_scope_variable("index", VarType::Int);
        ctx.scopes.register_local(id);
        if let Some(slot) = operands.values.get_mut(3) {
            *slot = id;
        }
    }
    let Some(frame) = ctx.scopes.top().cloned() else { return };

    match kind {
        ScopeKind::If | ScopeKind::ElseIf => {
            if let (Some(cond), Some(next)) = (operands.values.first(), frame.next_label) {
                ctx.push_var(method, *cond);
                ctx.emit(method, Instruction::jump_if_false(next));
            }
        }
        ScopeKind::While => {
            if let (Some(cond), Some(start), Some(exit)) = (operands.values.first(), frame.start_label, frame.exit_label) {
                ctx.emit(method, Instruction::Label(start));
                ctx.push_var(method, *cond);
                ctx.emit(method, Instruction::jump_if_false(exit));
            }
        }
        ScopeKind::For => {
            if let ([start, end, step, index], Some(head), Some(exit)) =
                (&operands.values[..], frame.start_label, frame.exit_label)
            {
                let (start, end, step, index) = (*start, *end, *step, *index);
                let flag = ctx.program.symbols.acquire_temp(VarType::Bool);
                ctx.push_var(method, start);
                ctx.push_var(method, index);
                ctx.emit(method, Instruction::Copy);
                ctx.emit(method, Instruction::Label(head));
                ctx.push_var(method, index);
                ctx.push_var(method, end);
                ctx.push_var(method, flag);
                ctx.emit(method, Instruction::Extern(externs::INT_LESS.to_string()));
                ctx.push_var(method, flag);
                ctx.emit(method, Instruction::jump_if_false(exit));
                ctx.program.symbols.release_temp(flag);
                let index = ctx.program.symbols.name(index).to_string();
                let step = ctx.program.symbols.name(step).to_string();
                if let Some(top) = ctx.scopes.top_mut() {
                    top.for_loop = Some(ForLoop { index, step });
                }
            }
        }
        ScopeKind::Else | ScopeKind::Block => {}
    }
    release(ctx, operands);
}

fn close_scope(ctx: &mut CompileContext<'_>, method: &str, at: ActionLocation) -> CompileResult<()> {
    let symbols = &mut ctx.program.symbols;
    let frame = ctx.scopes.pop(at, symbols)?;
    let FrameKind::Block(kind) = frame.kind else {
        return Ok(());
    };
    let mut pending_exit = None;
    match kind {
        ScopeKind::If | ScopeKind::ElseIf => {
            if let (Some(next), Some(exit)) = (frame.next_label, frame.exit_label) {
                ctx.emit_all(method, [Instruction::jump(exit.as_str()), Instruction::Label(next)]);
                pending_exit = Some(exit);
            }
        }
        ScopeKind::Else => {
            if let Some(exit) = frame.exit_label {
                ctx.emit(method, Instruction::Label(exit));
            }
        }
        ScopeKind::While => {
            if let (Some(start), Some(exit)) = (frame.start_label, frame.exit_label) {
                ctx.emit_all(method, [Instruction::jump(start), Instruction::Label(exit)]);
            }
        }
        ScopeKind::For => {
            if let (Some(head), Some(next), Some(exit), Some(state)) =
                (frame.start_label, frame.continue_label, frame.exit_label, frame.for_loop)
            {
                ctx.emit_all(
                    method,
                    [
                        Instruction::Label(next),
                        Instruction::push(state.index.as_str()),
                        Instruction::push(state.step.as_str()),
                        Instruction::push(state.index.as_str()),
                        Instruction::Extern(externs::INT_ADD.to_string()),
                        Instruction::jump(head),
                        Instruction::Label(exit),
                    ],
                );
            }
        }
        ScopeKind::Block => {}
    }
    ctx.scopes.set_previous(PreviousScope { kind, closed_at: at, pending_exit });
    Ok(())
}

fn emit_module_call(
    ctx: &mut CompileContext<'_>,
    method: &str,
    at: ActionLocation,
    module: Arc<LinkableProgram>,
    entry: &ModuleEntry,
    action: &ActionInstance,
) -> CompileResult<()> {
    let include_hooks = ctx.settings.include_event_hooks;
    let translation = ctx.linker.process_module(&mut ctx.program, &module, include_hooks)?;

    let instance = match &action.action {
        ActionRef::Module { instance, .. } => *instance,
        ActionRef::Primitive { .. } => None,
    };
    let copies = match (module.interface.multi_instance, instance) {
        (true, Some(guid)) => translation.instance(&guid).cloned(),
        (true, None) => {
            ctx.error(Some(at), format!("module '{}' needs an instance for each call", module.key));
            return Ok(());
        }
        (false, _) => None,
    };
    let repetitions: Vec<Option<(usize, &InputSlot)>> = if entry.repeatable_first && !action.multi_inputs.is_empty() {
        action.multi_inputs.iter().enumerate().map(Some).collect()
    } else {
        if !action.multi_inputs.is_empty() {
            ctx.warn(
                Some(at),
                format!("entry '{}' of module '{}' does not repeat; extra inputs ignored", entry.id, module.key),
            );
        }
        vec![None]
    };

    let Some(entry_method) = translation.method(&entry.method).map(str::to_string) else {
        return Ok(());
    };
    let params: Vec<ParamSpec> = entry
        .params
        .iter()
        .map(|p| ParamSpec { name: p.name.clone(), ty: p.ty.clone(), output: p.output, default: None })
        .collect();
    for first in repetitions {
        let Some(operands) = resolve_operands(ctx, at, &params, action, first) else {
            continue;
        };
        for (param, id) in entry.params.iter().zip(operands.values.iter()) {
            if param.output {
                continue;
            }
            if let Some(slot) = translation.variable(&param.variable).map(str::to_string) {
                ctx.push_var(method, *id);
                ctx.emit_all(method, [Instruction::Push(slot), Instruction::Copy]);
            }
        }
        if let Some(copies) = &copies {
            ctx.call(method, &copies.copy_in);
        }
        ctx.call(method, &entry_method);
        if let Some(copies) = &copies {
            ctx.call(method, &copies.copy_out);
        }
        for (param, id) in entry.params.iter().zip(operands.values.iter()) {
            if !param.output {
                continue;
            }
            if let Some(slot) = translation.variable(&param.variable).map(str::to_string) {
                ctx.emit(method, Instruction::Push(slot));
                ctx.push_var(method, *id);
                ctx.emit(method, Instruction::Copy);
                ctx.after_write(method, *id);
            }
        }
        release(ctx, operands);
    }
    Ok(())
}
