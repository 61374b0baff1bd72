use rustc_hash::FxHashMap;
use crate::{
    gc::Tracer,
    util::Symbol,
};
use super::{EnvRef, Object, ValueRef};

/// One level of lexical scope.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    bindings: FxHashMap<Symbol, ValueRef>,
    parent: Option<EnvRef>,
}

impl Scope {
    pub fn new(parent: Option<EnvRef>) -> Self {
        Self {
            bindings: FxHashMap::default(),
            parent,
        }
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent
    }

    // Redefinition replaces the binding in place.
    pub fn define(&mut self, name: Symbol, value: ValueRef) {
        self.bindings.insert(name, value);
    }

    pub fn get(&self, name: Symbol) -> Option<ValueRef> {
        self.bindings.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item=Symbol> + '_ {
        self.bindings.keys().copied()
    }

    pub(super) fn trace(&self, tracer: &mut Tracer<Object>) {
        self.bindings
            .values()
            .for_each(|value| tracer.mark(value.0));
        if let Some(parent) = self.parent {
            tracer.mark(parent.0);
        }
    }
}
