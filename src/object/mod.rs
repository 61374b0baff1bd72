mod datum;
mod scope;

use std::{fmt, rc::Rc};
use crate::{
    gc::{Handle, Trace, Tracer},
    util::Symbol,
    walker::Machine,
    Error,
};

pub use self::{
    datum::{format_number, Datum},
    scope::Scope,
};

/// Everything the store holds. Values, cons cells and scopes share one store so that a single
/// trace covers the whole object graph.
pub enum Object {
    Value(Value),
    Cons(Cons),
    Scope(Scope),
}

impl Trace for Object {
    fn trace(&self, tracer: &mut Tracer<Self>) {
        match self {
            Object::Value(Value::List(Some(head))) => tracer.mark(head.0),
            Object::Value(Value::Function(Function::Closure(closure))) => {
                if let Some(params) = closure.params {
                    tracer.mark(params.0);
                }
                tracer.mark(closure.body.0);
                tracer.mark(closure.env.0);
            },
            Object::Value(_) => {},
            // Only the car is a value. The cdr is followed as a cell.
            Object::Cons(cons) => {
                tracer.mark(cons.car.0);
                if let Some(cdr) = cons.cdr {
                    tracer.mark(cdr.0);
                }
            },
            Object::Scope(scope) => scope.trace(tracer),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueRef(pub(crate) Handle<Object>);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConsRef(pub(crate) Handle<Object>);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnvRef(pub(crate) Handle<Object>);

#[derive(Clone, Debug)]
pub enum Value {
    Number(f64),
    Symbol(Symbol),
    List(Option<ConsRef>),
    Function(Function),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Function(_) => "function",
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Cons {
    pub car: ValueRef,
    pub cdr: Option<ConsRef>,
}

#[derive(Clone, Debug)]
pub enum Function {
    Builtin(Builtin),
    Closure(Closure),
}

pub type Dispatch = dyn Fn(&mut Machine, &[ValueRef], EnvRef) -> Result<ValueRef, Error>;

#[derive(Clone)]
pub struct Builtin {
    pub name: Symbol,
    pub dispatch: Rc<Dispatch>,
}

impl Builtin {
    pub fn new(
        name: impl Into<Symbol>,
        dispatch: impl Fn(&mut Machine, &[ValueRef], EnvRef) -> Result<ValueRef, Error> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            dispatch: Rc::new(dispatch),
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<builtin {}>", self.name)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Closure {
    pub params: Option<ConsRef>,
    pub arity: usize,
    pub body: ValueRef,
    pub env: EnvRef,
}
