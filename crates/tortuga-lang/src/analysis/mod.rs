//! Slot resolution: a second pass over the compiled tree that mirrors the
//! runtime's scope rule (a conceptual call frame makes declarations local)
//! and rewrites by-name variable lookups into distance-from-top slot lookups.
//! The pass is a pure tree transform; unresolved names are left alone and
//! fall back to by-name lookup at run time.

use crate::natives;
use crate::runtime::invokeable::InvokeableRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Local,
    Global,
}

pub struct Optimizer<'a> {
    globals: Vec<String>,
    locals: Vec<String>,
    /// True when optimizing a subroutine/function body: declarations are
    /// local, exactly as they will be at run time.
    in_frame: bool,
    saved: Vec<(usize, usize)>,
    registry: &'a InvokeableRegistry,
}

impl<'a> Optimizer<'a> {
    /// Optimizer for the top-level block (global scope).
    pub fn new(registry: &'a InvokeableRegistry) -> Self {
        Self { globals: Vec::new(), locals: Vec::new(), in_frame: false, saved: Vec::new(), registry }
    }

    /// Optimizer seeded with a synthetic call frame, for subroutine and
    /// function bodies. Parameter names are not pre-registered; references to
    /// them resolve by name at run time.
    pub fn for_invokeable(registry: &'a InvokeableRegistry) -> Self {
        Self { globals: Vec::new(), locals: Vec::new(), in_frame: true, saved: Vec::new(), registry }
    }

    /// Registers a declaration at its point of execution.
    pub fn push_name(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        if self.in_frame {
            self.locals.push(name);
        } else {
            self.globals.push(name);
        }
    }

    /// Scope and distance-from-top for a name, innermost match first.
    pub fn resolve(&self, name: &str) -> Option<(ScopeKind, usize)> {
        let name = name.to_ascii_lowercase();
        if let Some(d) = distance_from_top(&self.locals, &name) {
            return Some((ScopeKind::Local, d));
        }
        if let Some(d) = distance_from_top(&self.globals, &name) {
            return Some((ScopeKind::Global, d));
        }
        None
    }

    pub fn is_constant(&self, name: &str) -> bool {
        natives::is_constant_name(name)
    }

    /// Saves both stack depths at block entry …
    pub fn push_state(&mut self) {
        self.saved.push((self.globals.len(), self.locals.len()));
    }

    /// … and restores them at block exit, forgetting the block's locals.
    pub fn pop_state(&mut self) {
        if let Some((g, l)) = self.saved.pop() {
            self.globals.truncate(g);
            self.locals.truncate(l);
        }
    }

    pub fn find_invokeable(&self, name: &str, arity: usize) -> Option<usize> {
        self.registry.find(name, arity)
    }

    pub fn registry(&self) -> &InvokeableRegistry {
        self.registry
    }
}

fn distance_from_top(stack: &[String], name: &str) -> Option<usize> {
    stack.iter().rposition(|n| n == name).map(|i| stack.len() - i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_count_from_the_top() {
        let registry = InvokeableRegistry::with_natives();
        let mut oo = Optimizer::new(&registry);
        oo.push_name("a");
        oo.push_name("b");
        assert_eq!(oo.resolve("b"), Some((ScopeKind::Global, 1)));
        assert_eq!(oo.resolve("a"), Some((ScopeKind::Global, 2)));
        assert_eq!(oo.resolve("missing"), None);
    }

    #[test]
    fn shadowing_resolves_to_latest() {
        let registry = InvokeableRegistry::with_natives();
        let mut oo = Optimizer::new(&registry);
        oo.push_name("x");
        oo.push_name("x");
        assert_eq!(oo.resolve("x"), Some((ScopeKind::Global, 1)));
    }

    #[test]
    fn block_state_restores_depth() {
        let registry = InvokeableRegistry::with_natives();
        let mut oo = Optimizer::new(&registry);
        oo.push_name("outer");
        oo.push_state();
        oo.push_name("inner");
        assert!(oo.resolve("inner").is_some());
        oo.pop_state();
        assert_eq!(oo.resolve("inner"), None);
        assert_eq!(oo.resolve("outer"), Some((ScopeKind::Global, 1)));
    }

    #[test]
    fn frame_declarations_are_local() {
        let registry = InvokeableRegistry::with_natives();
        let mut oo = Optimizer::for_invokeable(&registry);
        oo.push_name("n");
        assert_eq!(oo.resolve("n"), Some((ScopeKind::Local, 1)));
    }

    #[test]
    fn constants_recognized() {
        let registry = InvokeableRegistry::with_natives();
        let oo = Optimizer::new(&registry);
        assert!(oo.is_constant("pi"));
        assert!(oo.is_constant("TRUE"));
        assert!(!oo.is_constant("x"));
    }
}
