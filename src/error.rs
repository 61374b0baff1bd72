use std::fmt;
use crate::{gc::AllocError, util::Symbol};

/// What the evaluator was doing when an error passed through it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Thing {
    Form(&'static str),
    Operator,
    Argument(usize),
    Builtin(Symbol),
    Closure,
}

impl fmt::Display for Thing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Thing::Form(form) => write!(f, "`{}` form", form),
            Thing::Operator => write!(f, "operator"),
            Thing::Argument(i) => write!(f, "argument #{}", i + 1),
            Thing::Builtin(name) => write!(f, "builtin `{}`", name),
            Thing::Closure => write!(f, "closure call"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn check(self, found: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exactly(n) => found == n,
            Arity::AtLeast(n) => found >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_mismatch(self, found))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("unbound symbol `{0}`")]
    UnboundSymbol(Symbol),
    #[error("`{0}` is not a function")]
    NotAFunction(String),
    #[error("allocation failure: {0}")]
    AllocationFailure(#[from] AllocError),
    #[error("malformed `{form}`: {reason}")]
    MalformedSpecialForm {
        form: &'static str,
        reason: &'static str,
    },
    #[error("expected {expected} arguments, found {found}")]
    ArityMismatch {
        expected: Arity,
        found: usize,
    },
    #[error("expected a {expected}, found a {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("handle refers to an object that has been collected")]
    DanglingHandle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    while_evaluating: Vec<Thing>,
    hint: Option<&'static str>,
}

impl Error {
    pub fn unbound_symbol(name: Symbol) -> Self {
        Self::from(ErrorKind::UnboundSymbol(name))
    }

    pub fn not_a_function(printed: impl Into<String>) -> Self {
        Self::from(ErrorKind::NotAFunction(printed.into()))
    }

    pub fn malformed(form: &'static str, reason: &'static str) -> Self {
        Self::from(ErrorKind::MalformedSpecialForm { form, reason })
    }

    pub fn arity_mismatch(expected: Arity, found: usize) -> Self {
        Self::from(ErrorKind::ArityMismatch { expected, found })
    }

    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::from(ErrorKind::TypeMismatch { expected, found })
    }

    pub fn dangling() -> Self {
        Self::from(ErrorKind::DanglingHandle)
    }

    pub fn while_evaluating(mut self, thing: impl Into<Thing>) -> Self {
        self.while_evaluating.push(thing.into());
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Innermost first.
    pub fn context(&self) -> &[Thing] {
        &self.while_evaluating
    }

    pub fn get_hint(&self) -> Option<&'static str> {
        self.hint
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            while_evaluating: Vec::new(),
            hint: None,
        }
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for thing in &self.while_evaluating {
            write!(f, "\n  while evaluating {}", thing)?;
        }
        if let Some(hint) = self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
