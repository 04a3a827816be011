//! Scope & Variable Store (C1).
//!
//! Grounded on the teacher's `namespace.rs` (`Namespaces` owning a `Vec<Namespace>`
//! addressed by index rather than raw pointers, "Instead of using raw pointers to
//! share namespace access between frames, we use indices into this central
//! namespaces") and on the arena-handle realization the Design Notes (spec §9)
//! call for: `Variable` cells live in a per-scope arena; a pointer is an opaque
//! `VarHandle { scope, slot }`, never a raw address.
//!
//! See DESIGN.md for the Open Question decision to collapse the original C++
//! source's dual flat-name/nested-struct-member representation into a single
//! nested representation (struct members live only inside `Value::Struct`); the
//! scope store below only ever holds top-level names, never synthetic `"a.b"`
//! flat entries.

use ahash::AHashMap;

use crate::ast::Expr;
use crate::diagnostics::{EngineError, ErrorKind};
use crate::value::{FunctionBinding, Variable};

/// Monotonically increasing id identifying one pushed scope frame. Never
/// reused, so a `VarHandle` referencing a popped scope can be detected as
/// dangling even if a new scope is later pushed at the same stack depth
/// (spec §5 "Pointer lifetime").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u32);

impl SlotId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An opaque handle to one `Variable` cell: which scope generation it lives in,
/// and which slot within that scope's storage. This is the "pointer" payload
/// the Design Notes ask for in place of a raw address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarHandle {
    pub scope: ScopeId,
    pub slot: SlotId,
}

/// One lexical scope: a name -> slot table, the slot storage itself, a
/// function-pointer binding table (spec §3 "Scope"), and a LIFO list of
/// deferred cleanup expressions (spec §4.4 "Scope cleanup", supplemented from
/// `defer` in SPEC_FULL.md §10.3).
#[derive(Debug, Default)]
pub struct Scope {
    id: ScopeId,
    names: AHashMap<String, SlotId>,
    storage: Vec<Variable>,
    func_pointers: AHashMap<String, FunctionBinding>,
    defers: Vec<Expr>,
}

impl Scope {
    fn new(id: ScopeId) -> Self {
        Self {
            id,
            names: AHashMap::new(),
            storage: Vec::new(),
            func_pointers: AHashMap::new(),
            defers: Vec::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Inserts or shadows `name` with `var`, returning its handle.
    pub fn insert(&mut self, name: impl Into<String>, var: Variable) -> VarHandle {
        let slot = SlotId(self.storage.len().try_into().expect("scope overflow"));
        self.storage.push(var);
        self.names.insert(name.into(), slot);
        VarHandle { scope: self.id, slot }
    }

    pub fn get_slot(&self, name: &str) -> Option<SlotId> {
        self.names.get(name).copied()
    }

    pub fn var(&self, slot: SlotId) -> &Variable {
        &self.storage[slot.index()]
    }

    pub fn var_mut(&mut self, slot: SlotId) -> &mut Variable {
        &mut self.storage[slot.index()]
    }

    /// Reverse lookup used to keep the nested/flat representations in step
    /// (spec §3 invariant 3); with the single-representation design (DESIGN.md)
    /// this is only needed to report a variable's declared name in diagnostics.
    pub fn name_of(&self, slot: SlotId) -> Option<&str> {
        self.names.iter().find(|(_, s)| **s == slot).map(|(n, _)| n.as_str())
    }

    pub fn bind_function_pointer(&mut self, name: impl Into<String>, binding: FunctionBinding) {
        self.func_pointers.insert(name.into(), binding);
    }

    pub fn function_pointer(&self, name: &str) -> Option<&FunctionBinding> {
        self.func_pointers.get(name)
    }

    pub fn defer(&mut self, expr: Expr) {
        self.defers.push(expr);
    }

    /// Drains deferred cleanup expressions in LIFO order (spec §4.4).
    pub fn take_defers_lifo(&mut self) -> Vec<Expr> {
        let mut defers = std::mem::take(&mut self.defers);
        defers.reverse();
        defers
    }
}

/// The scope stack: exactly one global scope (index 0), never popped (spec §3
/// invariant 1); every function call pushes one frame, every successful return
/// or propagated exception pops exactly those frames it pushed (invariant 2).
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Scope>,
    next_id: u64,
    /// Frame-stack depths at which a function call was entered. Lookups never
    /// cross the most recent boundary except to fall through to the global
    /// scope - a called function sees its own locals and globals, not the
    /// caller's locals (spec §3 "Scope"; Cb's closures are plain function-
    /// pointer values with no captured environment, see DESIGN.md).
    call_boundaries: Vec<usize>,
}

impl ScopeStack {
    pub fn new() -> Self {
        let mut stack = Self {
            frames: Vec::new(),
            next_id: 0,
            call_boundaries: Vec::new(),
        };
        stack.push_scope();
        stack
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.next_id);
        self.next_id += 1;
        self.frames.push(Scope::new(id));
        id
    }

    /// Pops the innermost scope. Never pops the last (global) scope.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.frames.len() <= 1 {
            return None;
        }
        self.frames.pop()
    }

    /// Pushes a new frame and marks it as a function-call boundary.
    pub fn push_call_frame(&mut self) -> ScopeId {
        self.call_boundaries.push(self.frames.len());
        self.push_scope()
    }

    /// Pops back to (and including) the most recent call boundary.
    pub fn pop_call_frame(&mut self) -> Option<Scope> {
        let popped = self.pop_scope();
        self.call_boundaries.pop();
        popped
    }

    pub fn global(&self) -> &Scope {
        &self.frames[0]
    }

    pub fn global_mut(&mut self) -> &mut Scope {
        &mut self.frames[0]
    }

    pub fn current(&self) -> &Scope {
        self.frames.last().expect("scope stack never empty")
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        self.frames.last_mut().expect("scope stack never empty")
    }

    /// `find_variable(name)`: walks innermost -> the current call boundary,
    /// then falls through to the global scope (spec §4.1).
    pub fn find_variable(&self, name: &str) -> Option<VarHandle> {
        let floor = self.call_boundaries.last().copied().unwrap_or(0);
        for scope in self.frames[floor..].iter().rev() {
            if let Some(slot) = scope.get_slot(name) {
                return Some(VarHandle { scope: scope.id(), slot });
            }
        }
        if floor > 0 {
            if let Some(slot) = self.global().get_slot(name) {
                return Some(VarHandle {
                    scope: self.global().id(),
                    slot,
                });
            }
        }
        None
    }

    pub fn find_function_pointer(&self, name: &str) -> Option<&FunctionBinding> {
        let floor = self.call_boundaries.last().copied().unwrap_or(0);
        for scope in self.frames[floor..].iter().rev() {
            if let Some(binding) = scope.function_pointer(name) {
                return Some(binding);
            }
        }
        if floor > 0 {
            if let Some(binding) = self.global().function_pointer(name) {
                return Some(binding);
            }
        }
        None
    }

    /// True when `handle.scope` is still on the live stack - a scope popped
    /// since the handle was taken is dangling (spec §5 "Pointer lifetime").
    pub fn is_alive(&self, scope: ScopeId) -> bool {
        self.frames.iter().any(|s| s.id() == scope)
    }

    fn scope_by_id(&self, id: ScopeId) -> Option<&Scope> {
        self.frames.iter().find(|s| s.id() == id)
    }

    fn scope_by_id_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.frames.iter_mut().find(|s| s.id() == id)
    }

    pub fn resolve(&self, handle: VarHandle) -> Result<&Variable, EngineError> {
        self.scope_by_id(handle.scope)
            .map(|s| s.var(handle.slot))
            .ok_or_else(|| EngineError::runtime(ErrorKind::DanglingPointer, "dereference of a pointer into a popped scope"))
    }

    pub fn resolve_mut(&mut self, handle: VarHandle) -> Result<&mut Variable, EngineError> {
        self.scope_by_id_mut(handle.scope)
            .map(|s| s.var_mut(handle.slot))
            .ok_or_else(|| EngineError::runtime(ErrorKind::DanglingPointer, "dereference of a pointer into a popped scope"))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;
    use crate::value::Value;

    fn int_var(v: i64) -> Variable {
        Variable::new(TypeTag::Int, None, Value::Int(v))
    }

    #[test]
    fn lookup_walks_innermost_to_global() {
        let mut stack = ScopeStack::new();
        stack.global_mut().insert("x", int_var(1));
        stack.push_scope();
        stack.current_mut().insert("y", int_var(2));
        assert!(stack.find_variable("x").is_some());
        assert!(stack.find_variable("y").is_some());
        assert!(stack.find_variable("z").is_none());
    }

    #[test]
    fn shadowing_resolves_to_innermost() {
        let mut stack = ScopeStack::new();
        stack.global_mut().insert("x", int_var(1));
        stack.push_scope();
        stack.current_mut().insert("x", int_var(2));
        let handle = stack.find_variable("x").unwrap();
        assert_eq!(stack.resolve(handle).unwrap().value, Value::Int(2));
    }

    #[test]
    fn popped_scope_handle_is_dangling() {
        let mut stack = ScopeStack::new();
        stack.push_scope();
        let handle = stack.current_mut().insert("x", int_var(1));
        stack.pop_scope();
        assert!(stack.resolve(handle).is_err());
    }

    #[test]
    fn global_scope_is_never_popped() {
        let mut stack = ScopeStack::new();
        assert!(stack.pop_scope().is_none());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn call_frame_does_not_see_caller_locals() {
        let mut stack = ScopeStack::new();
        stack.global_mut().insert("g", int_var(9));
        stack.push_scope();
        stack.current_mut().insert("caller_local", int_var(1));
        stack.push_call_frame();
        stack.current_mut().insert("callee_local", int_var(2));
        assert!(stack.find_variable("caller_local").is_none());
        assert!(stack.find_variable("callee_local").is_some());
        assert!(stack.find_variable("g").is_some());
        stack.pop_call_frame();
        assert!(stack.find_variable("caller_local").is_some());
    }
}
