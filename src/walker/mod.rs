mod eval;
mod print;

use tracing::{debug, trace};
use crate::{
    builtins,
    config::Config,
    gc::{self, Handle, Heap},
    object::{Builtin, Closure, Cons, ConsRef, EnvRef, Function, Object, Scope, Value, ValueRef},
    util::Symbol,
    Error,
};

/// A position on the machine's shadow stack, returned by [`Machine::protect`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RootMark(usize);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub values: usize,
    pub conses: usize,
    pub scopes: usize,
    pub store: gc::Stats,
}

/// The runtime: object store, shadow stack and collector policy.
///
/// Objects are only ever reclaimed at two points: when the host calls [`Machine::collect`], and
/// at the evaluator's safe points once the live count reaches the configured threshold. In both
/// cases everything reachable from the shadow stack survives. Handles the host keeps outside of
/// any environment should be pinned with [`Machine::protect`] while evaluation may collect.
pub struct Machine {
    heap: Heap<Object>,
    roots: Vec<Handle<Object>>,
    config: Config,
    next_gc: Option<usize>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Machine {
    pub fn new(config: Config) -> Self {
        Self {
            heap: Heap::with_capacity(config.initial_capacity, config.max_objects),
            roots: Vec::new(),
            next_gc: config.gc_threshold,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh root scope with the prelude installed.
    pub fn make_environment(&mut self) -> Result<EnvRef, Error> {
        let env = self.make_scope(None)?;
        builtins::install(self, env)?;
        debug!(bindings = self.scope(env)?.len(), "created root environment");
        Ok(env)
    }

    fn alloc(&mut self, object: Object) -> Result<Handle<Object>, Error> {
        Ok(self.heap.insert(object)?)
    }

    fn alloc_value(&mut self, value: Value) -> Result<ValueRef, Error> {
        self.alloc(Object::Value(value)).map(ValueRef)
    }

    pub fn make_number(&mut self, x: f64) -> Result<ValueRef, Error> {
        self.alloc_value(Value::Number(x))
    }

    pub fn make_symbol(&mut self, name: impl Into<Symbol>) -> Result<ValueRef, Error> {
        self.alloc_value(Value::Symbol(name.into()))
    }

    pub fn make_list(&mut self, head: Option<ConsRef>) -> Result<ValueRef, Error> {
        self.alloc_value(Value::List(head))
    }

    pub fn nil(&mut self) -> Result<ValueRef, Error> {
        self.make_list(None)
    }

    pub fn make_function(&mut self, function: Function) -> Result<ValueRef, Error> {
        self.alloc_value(Value::Function(function))
    }

    pub fn cons(&mut self, car: ValueRef, cdr: Option<ConsRef>) -> Result<ConsRef, Error> {
        self.alloc(Object::Cons(Cons { car, cdr })).map(ConsRef)
    }

    pub fn list_from(&mut self, items: &[ValueRef]) -> Result<ValueRef, Error> {
        let mut head = None;
        for item in items.iter().rev() {
            head = Some(self.cons(*item, head)?);
        }
        self.make_list(head)
    }

    pub fn make_scope(&mut self, parent: Option<EnvRef>) -> Result<EnvRef, Error> {
        self.alloc(Object::Scope(Scope::new(parent))).map(EnvRef)
    }

    pub fn get(&self, value: ValueRef) -> Result<&Value, Error> {
        match self.heap.get(value.0) {
            Some(Object::Value(value)) => Ok(value),
            _ => Err(Error::dangling()),
        }
    }

    pub fn cell(&self, cons: ConsRef) -> Result<Cons, Error> {
        match self.heap.get(cons.0) {
            Some(Object::Cons(cons)) => Ok(*cons),
            _ => Err(Error::dangling()),
        }
    }

    pub fn scope(&self, env: EnvRef) -> Result<&Scope, Error> {
        match self.heap.get(env.0) {
            Some(Object::Scope(scope)) => Ok(scope),
            _ => Err(Error::dangling()),
        }
    }

    fn scope_mut(&mut self, env: EnvRef) -> Result<&mut Scope, Error> {
        match self.heap.get_mut(env.0) {
            Some(Object::Scope(scope)) => Ok(scope),
            _ => Err(Error::dangling()),
        }
    }

    pub fn is_live(&self, value: ValueRef) -> bool {
        self.get(value).is_ok()
    }

    pub fn number(&self, value: ValueRef) -> Result<f64, Error> {
        match self.get(value)? {
            Value::Number(x) => Ok(*x),
            other => Err(Error::type_mismatch("number", other.kind())),
        }
    }

    pub fn symbol(&self, value: ValueRef) -> Result<Symbol, Error> {
        match self.get(value)? {
            Value::Symbol(name) => Ok(*name),
            other => Err(Error::type_mismatch("symbol", other.kind())),
        }
    }

    pub fn function(&self, value: ValueRef) -> Result<&Function, Error> {
        match self.get(value)? {
            Value::Function(function) => Ok(function),
            other => Err(Error::type_mismatch("function", other.kind())),
        }
    }

    /// The elements of a list, in order.
    pub fn list_items(&self, value: ValueRef) -> Result<Vec<ValueRef>, Error> {
        match self.get(value)? {
            Value::List(head) => self.cells(*head),
            other => Err(Error::type_mismatch("list", other.kind())),
        }
    }

    fn cells(&self, mut cursor: Option<ConsRef>) -> Result<Vec<ValueRef>, Error> {
        let mut items = Vec::new();
        while let Some(cell) = cursor {
            let Cons { car, cdr } = self.cell(cell)?;
            items.push(car);
            cursor = cdr;
        }
        Ok(items)
    }

    /// The number `0` is false; every other value is true.
    pub fn is_true(&self, value: ValueRef) -> Result<bool, Error> {
        Ok(!matches!(self.get(value)?, Value::Number(x) if *x == 0.0))
    }

    pub fn define(&mut self, env: EnvRef, name: impl Into<Symbol>, value: ValueRef) -> Result<(), Error> {
        let name = name.into();
        self.scope_mut(env)?.define(name, value);
        trace!(%name, "defined");
        Ok(())
    }

    pub fn lookup(&self, env: EnvRef, name: impl Into<Symbol>) -> Result<ValueRef, Error> {
        let name = name.into();
        let mut cursor = env;
        loop {
            let scope = self.scope(cursor)?;
            if let Some(value) = scope.get(name) {
                return Ok(value);
            }
            match scope.parent() {
                Some(parent) => cursor = parent,
                None => return Err(Error::unbound_symbol(name)),
            }
        }
    }

    /// Bind a native procedure under `name` in `env`.
    ///
    /// The dispatcher receives its arguments already evaluated, together with the calling
    /// environment, and is responsible for checking their number and types.
    pub fn register(
        &mut self,
        env: EnvRef,
        name: &str,
        dispatch: impl Fn(&mut Machine, &[ValueRef], EnvRef) -> Result<ValueRef, Error> + 'static,
    ) -> Result<ValueRef, Error> {
        let function = self.make_function(Function::Builtin(Builtin::new(name, dispatch)))?;
        self.define(env, name, function)?;
        Ok(function)
    }

    pub(crate) fn closure_params(&self, closure: &Closure) -> Result<Vec<Symbol>, Error> {
        self.cells(closure.params)?
            .into_iter()
            .map(|param| self.symbol(param))
            .collect()
    }

    /// Pin `value` until the matching [`Machine::release`].
    pub fn protect(&mut self, value: ValueRef) -> RootMark {
        let mark = RootMark(self.roots.len());
        self.roots.push(value.0);
        mark
    }

    pub fn release(&mut self, mark: RootMark) {
        self.roots.truncate(mark.0);
    }

    /// Run one mark-and-sweep cycle rooted at `root` and the shadow stack. Returns the number of
    /// objects reclaimed.
    pub fn collect(&mut self, root: EnvRef) -> usize {
        let freed = self.heap.clean(std::iter::once(root.0).chain(self.roots.iter().copied()));
        self.reschedule();
        freed
    }

    // Called by the evaluator when every in-flight handle is on the shadow stack.
    fn safepoint(&mut self) {
        let due = match self.next_gc {
            Some(threshold) => self.heap.len() >= threshold,
            None => false,
        };
        if due {
            let freed = self.heap.clean(self.roots.iter().copied());
            trace!(freed, roots = self.roots.len(), "automatic collection");
            self.reschedule();
        }
    }

    fn reschedule(&mut self) {
        if let Some(threshold) = self.config.gc_threshold {
            let grown = self.heap.len().saturating_mul(self.config.growth_factor);
            self.next_gc = Some(threshold.max(grown));
        }
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            store: self.heap.stats(),
            ..Stats::default()
        };
        for (_, object) in self.heap.iter() {
            match object {
                Object::Value(_) => stats.values += 1,
                Object::Cons(_) => stats.conses += 1,
                Object::Scope(_) => stats.scopes += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::ErrorKind;

    #[test]
    fn lookup_walks_parents() {
        let mut m = Machine::default();
        let outer = m.make_scope(None).unwrap();
        let inner = m.make_scope(Some(outer)).unwrap();
        let x = m.make_number(1.0).unwrap();
        let y = m.make_number(2.0).unwrap();
        m.define(outer, "x", x).unwrap();
        m.define(inner, "y", y).unwrap();

        assert_eq!(m.lookup(inner, "x").unwrap(), x);
        assert_eq!(m.lookup(inner, "y").unwrap(), y);
        assert_eq!(
            m.lookup(outer, "y").unwrap_err().kind(),
            &ErrorKind::UnboundSymbol(Symbol::new("y")),
        );
    }

    #[test]
    fn inner_definitions_shadow_outer_ones() {
        let mut m = Machine::default();
        let outer = m.make_scope(None).unwrap();
        let inner = m.make_scope(Some(outer)).unwrap();
        let a = m.make_number(1.0).unwrap();
        let b = m.make_number(2.0).unwrap();
        m.define(outer, "x", a).unwrap();
        m.define(inner, "x", b).unwrap();

        assert_eq!(m.lookup(inner, "x").unwrap(), b);
        assert_eq!(m.lookup(outer, "x").unwrap(), a);
    }

    #[test]
    fn list_from_preserves_order() {
        let mut m = Machine::default();
        let items = [1.0, 2.0, 3.0]
            .iter()
            .map(|x| m.make_number(*x).unwrap())
            .collect::<Vec<_>>();
        let list = m.list_from(&items).unwrap();
        assert_eq!(m.list_items(list).unwrap(), items);
        assert_eq!(m.stats().conses, 3);
    }

    #[test]
    fn protected_values_survive_collection() {
        let mut m = Machine::default();
        let env = m.make_scope(None).unwrap();
        let kept = m.make_number(1.0).unwrap();
        let lost = m.make_number(2.0).unwrap();

        let mark = m.protect(kept);
        m.collect(env);
        assert!(m.is_live(kept));
        assert!(!m.is_live(lost));

        m.release(mark);
        m.collect(env);
        assert!(!m.is_live(kept));
        assert_eq!(m.number(kept).unwrap_err().kind(), &ErrorKind::DanglingHandle);
    }

    #[test]
    fn store_ceiling_reports_allocation_failure() {
        let mut m = Machine::new(Config::default().max_objects(2));
        m.make_number(1.0).unwrap();
        m.make_number(2.0).unwrap();
        assert!(matches!(
            m.make_number(3.0).unwrap_err().kind(),
            ErrorKind::AllocationFailure(_),
        ));
    }
}
