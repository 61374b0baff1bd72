//! A small Lisp runtime: values in a garbage-collected store, lexical scopes, a tail-calling
//! evaluator and a mark-and-sweep collector.
//!
//! There is no reader. Hosts build expressions directly, either cell by cell through the
//! `make_*` constructors or from a [`Datum`] tree, and hand them to [`Machine::evaluate`].
//!
//! ```
//! use schem::{Datum, Engine};
//!
//! let mut engine = Engine::new(Default::default()).unwrap();
//! let double = Datum::list(vec![
//!     "define".into(),
//!     "double".into(),
//!     Datum::list(vec![
//!         "lambda".into(),
//!         Datum::list(vec!["x".into()]),
//!         Datum::list(vec!["*".into(), "x".into(), 2.0.into()]),
//!     ]),
//! ]);
//! engine.run(&double).unwrap();
//!
//! let result = engine.run(&Datum::list(vec!["double".into(), 5.0.into()])).unwrap();
//! assert_eq!(engine.machine().number(result).unwrap(), 10.0);
//! ```

mod builtins;
mod config;
mod error;
mod gc;
mod object;
mod util;
mod walker;

pub use self::{
    config::Config,
    error::{Arity, Error, ErrorKind, Thing},
    gc::{AllocError, Stats as StoreStats},
    object::{Builtin, Closure, Cons, ConsRef, Datum, EnvRef, Function, Scope, Value, ValueRef},
    util::Symbol,
    walker::{Machine, RootMark, Stats},
};

/// A machine bundled with its global environment.
pub struct Engine {
    machine: Machine,
    global: EnvRef,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self, Error> {
        let mut machine = Machine::new(config);
        let global = machine.make_environment()?;
        Ok(Self { machine, global })
    }

    pub fn global(&self) -> EnvRef {
        self.global
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn eval(&mut self, expr: ValueRef) -> Result<ValueRef, Error> {
        self.machine.evaluate(expr, self.global)
    }

    /// Build `datum` and evaluate it in the global environment.
    pub fn run(&mut self, datum: &Datum) -> Result<ValueRef, Error> {
        let expr = self.machine.alloc_datum(datum)?;
        self.eval(expr)
    }

    pub fn define(&mut self, name: &str, value: ValueRef) -> Result<(), Error> {
        self.machine.define(self.global, name, value)
    }

    pub fn register(
        &mut self,
        name: &str,
        dispatch: impl Fn(&mut Machine, &[ValueRef], EnvRef) -> Result<ValueRef, Error> + 'static,
    ) -> Result<ValueRef, Error> {
        self.machine.register(self.global, name, dispatch)
    }

    /// Collect everything not reachable from the global environment.
    pub fn collect(&mut self) -> usize {
        self.machine.collect(self.global)
    }
}
