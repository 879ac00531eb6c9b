//! Callable units — user subroutines, user functions, native functions —
//! keyed by lowercase name plus argument count.

use std::collections::HashMap;

use crate::analysis::Optimizer;
use crate::compile::block::Block;
use crate::natives::{self, NativeFn};

/// Reserved callback names and their arities; a program that declares any of
/// these stays resident after the top-level block finishes.
pub const CALLBACKS: [(&str, usize); 6] = [
    ("draw", 0),
    ("mouseclicked", 2),
    ("mousepressed", 2),
    ("mousereleased", 2),
    ("mousedragged", 2),
    ("mousemoved", 2),
];

pub struct UserRoutine {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

pub enum Invokeable {
    /// No return value.
    Subroutine(UserRoutine),
    /// Implicitly declares a same-named return slot read back after the body.
    Function(UserRoutine),
    Native(NativeFn),
}

impl Invokeable {
    pub fn name(&self) -> &str {
        match self {
            Invokeable::Subroutine(r) | Invokeable::Function(r) => &r.name,
            Invokeable::Native(n) => n.name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Invokeable::Subroutine(r) | Invokeable::Function(r) => r.params.len(),
            Invokeable::Native(n) => n.arity,
        }
    }

    /// Whether a call can appear in expression position.
    pub fn returns_value(&self) -> bool {
        !matches!(self, Invokeable::Subroutine(_))
    }
}

/// Name+arity keyed lookup table shared by the interpreter and the optimizer.
/// Natives are registered at construction; user declarations are added during
/// compilation of the top-level block. A redeclaration with the same name and
/// arity shadows the earlier entry.
pub struct InvokeableRegistry {
    items: Vec<Invokeable>,
    index: HashMap<(String, usize), usize>,
}

impl InvokeableRegistry {
    pub fn with_natives() -> Self {
        let mut registry = Self { items: Vec::new(), index: HashMap::new() };
        for native in natives::standard_natives() {
            registry.add(Invokeable::Native(native));
        }
        registry
    }

    pub fn add(&mut self, inv: Invokeable) {
        let key = (inv.name().to_ascii_lowercase(), inv.arity());
        self.items.push(inv);
        self.index.insert(key, self.items.len() - 1);
    }

    pub fn find(&self, name: &str, arity: usize) -> Option<usize> {
        self.index.get(&(name.to_ascii_lowercase(), arity)).copied()
    }

    pub fn get(&self, idx: usize) -> &Invokeable {
        &self.items[idx]
    }

    pub fn has_callbacks(&self) -> bool {
        CALLBACKS.iter().any(|(name, arity)| self.find(name, *arity).is_some())
    }

    /// Optimizes every user body with a fresh frame-seeded optimizer, after
    /// the whole program has been compiled (so forward references resolve).
    pub fn optimize_user_bodies(&mut self) {
        for i in 0..self.items.len() {
            let mut body = match &mut self.items[i] {
                Invokeable::Subroutine(r) | Invokeable::Function(r) => {
                    std::mem::replace(&mut r.body, Block::empty())
                }
                Invokeable::Native(_) => continue,
            };
            {
                let mut oo = Optimizer::for_invokeable(self);
                body.optimize(&mut oo);
            }
            match &mut self.items[i] {
                Invokeable::Subroutine(r) | Invokeable::Function(r) => r.body = body,
                Invokeable::Native(_) => unreachable!("filtered above"),
            }
        }
    }
}
