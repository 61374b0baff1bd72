use tracing::trace;
use crate::{
    error::{Arity, Thing},
    object::{Closure, Cons, ConsRef, EnvRef, Function, Value, ValueRef},
    util::{ensure_sufficient_stack, Symbol},
    Error,
};
use super::Machine;

/// What an evaluation step hands back to the loop.
enum Step {
    Done(ValueRef),
    /// Continue the loop with a new expression and environment. This is how tail positions are
    /// evaluated without growing the native stack.
    Eval {
        expr: ValueRef,
        env: EnvRef,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Form {
    Quote,
    Define,
    Lambda,
    If,
    Delay,
}

impl Form {
    fn recognise(name: Symbol) -> Option<Self> {
        match name.as_str() {
            "quote" => Some(Form::Quote),
            "define" => Some(Form::Define),
            "lambda" => Some(Form::Lambda),
            "if" => Some(Form::If),
            "delay" => Some(Form::Delay),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Form::Quote => "quote",
            Form::Define => "define",
            Form::Lambda => "lambda",
            Form::If => "if",
            Form::Delay => "delay",
        }
    }
}

impl Machine {
    /// Evaluate `expr` in `env`.
    ///
    /// Both stay reachable for the whole call, so collections triggered along the way never
    /// reclaim the environment or the expression graph. On error the evaluation stops where it
    /// is; definitions it already made stay in place.
    pub fn evaluate(&mut self, expr: ValueRef, env: EnvRef) -> Result<ValueRef, Error> {
        self.scope(env)?;
        // Pinned below the loop's own roots, which tail calls discard.
        let base = self.roots.len();
        self.roots.push(expr.0);
        self.roots.push(env.0);
        let result = self.eval(expr, env);
        self.roots.truncate(base);
        result
    }

    /// Apply a function value to arguments that have already been evaluated.
    pub fn apply(&mut self, function: ValueRef, args: &[ValueRef], env: EnvRef) -> Result<ValueRef, Error> {
        let base = self.roots.len();
        self.roots.push(function.0);
        self.roots.push(env.0);
        self.roots.extend(args.iter().map(|arg| arg.0));

        let result = match self.call(function, args, env) {
            Ok(Step::Done(value)) => Ok(value),
            Ok(Step::Eval { expr, env }) => ensure_sufficient_stack(|| self.eval(expr, env)),
            Err(err) => Err(err),
        };

        self.roots.truncate(base);
        result
    }

    fn eval(&mut self, expr: ValueRef, env: EnvRef) -> Result<ValueRef, Error> {
        let base = self.roots.len();
        let result = self.eval_loop(expr, env, base);
        self.roots.truncate(base);
        result
    }

    fn eval_loop(&mut self, mut expr: ValueRef, mut env: EnvRef, base: usize) -> Result<ValueRef, Error> {
        loop {
            // Everything the previous iteration left on the shadow stack is dead by now.
            self.roots.truncate(base);
            self.roots.push(expr.0);
            self.roots.push(env.0);
            self.safepoint();

            let head = match self.get(expr)? {
                Value::Number(_) | Value::Function(_) | Value::List(None) => return Ok(expr),
                Value::Symbol(name) => return self.lookup(env, *name),
                Value::List(Some(head)) => *head,
            };
            let Cons { car: operator, cdr: operands } = self.cell(head)?;

            let step = match self.special_form(operator)? {
                Some(form) => self
                    .eval_form(form, operands, env)
                    .map_err(|err| err.while_evaluating(Thing::Form(form.name())))?,
                None => {
                    let callee = ensure_sufficient_stack(|| self.eval(operator, env))
                        .map_err(|err| err.while_evaluating(Thing::Operator))?;
                    self.roots.push(callee.0);
                    let args = self.eval_operands(operands, env)?;
                    self.call(callee, &args, env)?
                },
            };

            match step {
                Step::Done(value) => return Ok(value),
                Step::Eval { expr: next_expr, env: next_env } => {
                    expr = next_expr;
                    env = next_env;
                },
            }
        }
    }

    fn special_form(&self, operator: ValueRef) -> Result<Option<Form>, Error> {
        Ok(match self.get(operator)? {
            Value::Symbol(name) => Form::recognise(*name),
            _ => None,
        })
    }

    // Operands are evaluated left to right and pinned as they arrive.
    fn eval_operands(&mut self, mut cursor: Option<ConsRef>, env: EnvRef) -> Result<Vec<ValueRef>, Error> {
        let mut args = Vec::new();
        while let Some(cell) = cursor {
            let Cons { car, cdr } = self.cell(cell)?;
            let index = args.len();
            let value = ensure_sufficient_stack(|| self.eval(car, env))
                .map_err(|err| err.while_evaluating(Thing::Argument(index)))?;
            self.roots.push(value.0);
            args.push(value);
            cursor = cdr;
        }
        Ok(args)
    }

    fn call(&mut self, callee: ValueRef, args: &[ValueRef], env: EnvRef) -> Result<Step, Error> {
        let function = match self.get(callee)? {
            Value::Function(function) => function.clone(),
            _ => return Err(Error::not_a_function(self.display(callee)?)),
        };

        match function {
            Function::Builtin(builtin) => {
                trace!(name = %builtin.name, args = args.len(), "calling builtin");
                let value = (*builtin.dispatch)(self, args, env)
                    .map_err(|err| err.while_evaluating(Thing::Builtin(builtin.name)))?;
                Ok(Step::Done(value))
            },
            Function::Closure(closure) => {
                let scope = self
                    .bind(&closure, args)
                    .map_err(|err| err.while_evaluating(Thing::Closure))?;
                Ok(Step::Eval { expr: closure.body, env: scope })
            },
        }
    }

    fn bind(&mut self, closure: &Closure, args: &[ValueRef]) -> Result<EnvRef, Error> {
        Arity::Exactly(closure.arity).check(args.len())?;
        let params = self.closure_params(closure)?;
        let scope = self.make_scope(Some(closure.env))?;
        for (param, arg) in params.into_iter().zip(args) {
            self.define(scope, param, *arg)?;
        }
        Ok(scope)
    }

    fn eval_form(&mut self, form: Form, operands: Option<ConsRef>, env: EnvRef) -> Result<Step, Error> {
        let ops = self.cells(operands)?;
        match form {
            Form::Quote => match ops[..] {
                [datum] => Ok(Step::Done(datum)),
                _ => Err(Error::malformed("quote", "expected exactly one operand")),
            },
            Form::Define => match ops[..] {
                [name, value] => {
                    let name = match self.get(name)? {
                        Value::Symbol(name) => *name,
                        _ => return Err(Error::malformed("define", "the name must be a symbol")),
                    };
                    let value = ensure_sufficient_stack(|| self.eval(value, env))?;
                    self.define(env, name, value)?;
                    Ok(Step::Done(value))
                },
                _ => Err(Error::malformed("define", "expected a name and a value")
                    .hint("write `(define name expression)`")),
            },
            Form::Lambda => match ops[..] {
                [params, body] => {
                    let params = match self.get(params)? {
                        Value::List(head) => *head,
                        _ => return Err(Error::malformed("lambda", "the parameters must be a list")
                            .hint("write `(lambda (x y) body)`")),
                    };
                    let arity = self.cells(params)?
                        .into_iter()
                        .map(|param| match self.get(param)? {
                            Value::Symbol(_) => Ok(()),
                            _ => Err(Error::malformed("lambda", "every parameter must be a symbol")),
                        })
                        .collect::<Result<Vec<_>, _>>()?
                        .len();
                    let closure = Closure { params, arity, body, env };
                    Ok(Step::Done(self.make_function(Function::Closure(closure))?))
                },
                _ => Err(Error::malformed("lambda", "expected a parameter list and a body")),
            },
            Form::If => {
                let (test, then, otherwise) = match ops[..] {
                    [test, then] => (test, then, None),
                    [test, then, otherwise] => (test, then, Some(otherwise)),
                    _ => return Err(Error::malformed("if", "expected a test, a consequent and an optional alternative")),
                };
                let test = ensure_sufficient_stack(|| self.eval(test, env))?;
                if self.is_true(test)? {
                    Ok(Step::Eval { expr: then, env })
                } else if let Some(otherwise) = otherwise {
                    Ok(Step::Eval { expr: otherwise, env })
                } else {
                    Ok(Step::Done(self.nil()?))
                }
            },
            Form::Delay => match ops[..] {
                [body] => {
                    let thunk = Closure { params: None, arity: 0, body, env };
                    Ok(Step::Done(self.make_function(Function::Closure(thunk))?))
                },
                _ => Err(Error::malformed("delay", "expected exactly one operand")),
            },
        }
    }
}
