//! file: core/src/compile/scope.rs
//! description: block frames opened and closed while emitting one event.

use crate::actions::ScopeKind;
use crate::error::{CompileError, CompileResult};
use crate::ir::{SymbolTable, VarId};
use crate::location::ActionLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Bottom frame holding the event's own parameters.
    EventParameters,
    Block(ScopeKind),
}

/// State a `for` block needs at its end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub index: String,
    pub step: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFrame {
    pub kind: FrameKind,
    pub opened_at: Option<ActionLocation>,
    pub is_loop: bool,
    pub owned: Vec<VarId>,
    /// Start of the next branch of a conditional chain.
    pub next_label: Option<String>,
    /// End of the whole construct.
    pub exit_label: Option<String>,
    /// Loop head, re-evaluated on every iteration.
    pub start_label: Option<String>,
    pub continue_label: Option<String>,
    pub for_loop: Option<ForLoop>,
}

impl ScopeFrame {
    pub fn block(kind: ScopeKind, at: ActionLocation) -> Self {
        ScopeFrame {
            kind: FrameKind::Block(kind),
            opened_at: Some(at),
            is_loop: kind.is_loop(),
            owned: Vec::new(),
            next_label: None,
            exit_label: None,
            start_label: None,
            continue_label: None,
            for_loop: None,
        }
    }

    fn parameters(owned: Vec<VarId>) -> Self {
        ScopeFrame {
            kind: FrameKind::EventParameters,
            opened_at: None,
            is_loop: false,
            owned,
            next_label: None,
            exit_label: None,
            start_label: None,
            continue_label: None,
            for_loop: None,
        }
    }
}

/// The most recently closed block, consulted by the following action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousScope {
    pub kind: ScopeKind,
    pub closed_at: ActionLocation,
    /// Exit label of a conditional chain not yet placed.
    pub pending_exit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    previous: Option<PreviousScope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    /// Clears the stack and seeds it with an event's parameter frame.
    pub fn reset(&mut self, params: Vec<VarId>) {
        self.frames.clear();
        self.frames.push(ScopeFrame::parameters(params));
        self.previous = None;
    }

    pub fn push(&mut self, frame: ScopeFrame) {
        self.previous = None;
        self.frames.push(frame);
    }

    /// Pops the innermost block and unbinds the variables it owns.
    pub fn pop(&mut self, at: ActionLocation, symbols: &mut SymbolTable) -> CompileResult<ScopeFrame> {
        if self.frames.len() <= 1 {
            return Err(CompileError::UnbalancedScope { location: at });
        }
        let frame = self
            .frames
            .pop()
            .ok_or(CompileError::UnbalancedScope { location: at })?;
        for id in &frame.owned {
            symbols.unbind(*id);
        }
        Ok(frame)
    }

    /// Registers a scope-local with the innermost frame.
    pub fn register_local(&mut self, id: VarId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.owned.push(id);
        }
    }

    pub fn top(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ScopeFrame> {
        self.frames.last_mut()
    }

    pub fn innermost_loop(&self) -> Option<&ScopeFrame> {
        self.frames.iter().rev().find(|f| f.is_loop)
    }

    /// Number of open blocks above the parameter frame.
    pub fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn previous(&self) -> Option<&PreviousScope> {
        self.previous.as_ref()
    }

    pub fn set_previous(&mut self, previous: PreviousScope) {
        self.previous = Some(previous);
    }

    pub fn take_previous(&mut self) -> Option<PreviousScope> {
        self.previous.take()
    }

    /// Closes the event: every block must be closed. Leaves the stack empty.
    pub fn finish_event(&mut self, event: usize, symbols: &mut SymbolTable) -> CompileResult<()> {
        let open = self.depth();
        for frame in self.frames.drain(..).rev() {
            for id in &frame.owned {
                symbols.unbind(*id);
            }
        }
        self.previous = None;
        if open > 0 {
            return Err(CompileError::UnclosedScope { event, open });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::VarType;

    #[test]
    fn extra_close_is_fatal() {
        let mut symbols = SymbolTable::new();
        let mut stack = ScopeStack::new();
        stack.reset(Vec::new());
        let at = ActionLocation::action(0, 0);
        assert_eq!(
            stack.pop(at, &mut symbols),
            Err(CompileError::UnbalancedScope { location: at })
        );
    }

    #[test]
    fn pop_unbinds_owned_locals() {
        let mut symbols = SymbolTable::new();
        let mut stack = ScopeStack::new();
        stack.reset(Vec::new());
        stack.push(ScopeFrame::block(ScopeKind::Block, ActionLocation::action(0, 0)));
        let guid = uuid::Uuid::new_v4();
        let local = symbols.declare_scope_variable("x", VarType::Int);
        symbols.bind_guid(guid, local);
        stack.register_local(local);
        stack.pop(ActionLocation::action(0, 1), &mut symbols).unwrap();
        assert!(symbols.resolve_guid(&guid).is_none());
        assert!(symbols.get(local).is_some());
        assert!(stack.finish_event(0, &mut symbols).is_ok());
        assert!(stack.is_empty());
    }

    #[test]
    fn unclosed_block_is_fatal() {
        let mut symbols = SymbolTable::new();
        let mut stack = ScopeStack::new();
        stack.reset(Vec::new());
        stack.push(ScopeFrame::block(ScopeKind::While, ActionLocation::action(1, 0)));
        assert_eq!(
            stack.finish_event(1, &mut symbols),
            Err(CompileError::UnclosedScope { event: 1, open: 1 })
        );
    }
}
