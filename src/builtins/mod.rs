//! The prelude: native procedures installed by [`Machine::make_environment`].
//!
//! Everything here goes through [`Machine::register`], the same seam hosts use for their own
//! procedures.

use crate::{
    error::Arity,
    object::{EnvRef, Value, ValueRef},
    walker::Machine,
    Error,
};

pub fn install(m: &mut Machine, env: EnvRef) -> Result<(), Error> {
    m.register(env, "+", add)?;
    m.register(env, "-", sub)?;
    m.register(env, "*", mul)?;
    m.register(env, "eq?", eq)?;
    m.register(env, "list", list)?;
    m.register(env, "map", map)?;
    m.register(env, "filter", filter)?;
    m.register(env, "force", force)?;
    Ok(())
}

fn numbers(m: &Machine, args: &[ValueRef]) -> Result<Vec<f64>, Error> {
    args.iter().map(|arg| m.number(*arg)).collect()
}

fn add(m: &mut Machine, args: &[ValueRef], _: EnvRef) -> Result<ValueRef, Error> {
    let sum = numbers(m, args)?.into_iter().sum();
    m.make_number(sum)
}

/// `(- x)` negates, as in Scheme, rather than returning `x` unchanged.
fn sub(m: &mut Machine, args: &[ValueRef], _: EnvRef) -> Result<ValueRef, Error> {
    Arity::AtLeast(1).check(args.len())?;
    let xs = numbers(m, args)?;
    let result = match xs[..] {
        [x] => -x,
        _ => xs[1..].iter().fold(xs[0], |acc, x| acc - x),
    };
    m.make_number(result)
}

fn mul(m: &mut Machine, args: &[ValueRef], _: EnvRef) -> Result<ValueRef, Error> {
    let product = numbers(m, args)?.into_iter().product();
    m.make_number(product)
}

fn eq(m: &mut Machine, args: &[ValueRef], _: EnvRef) -> Result<ValueRef, Error> {
    Arity::Exactly(2).check(args.len())?;
    let same = match (m.get(args[0])?, m.get(args[1])?) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::List(None), Value::List(None)) => true,
        _ => false,
    };
    m.make_number(if same { 1.0 } else { 0.0 })
}

fn list(m: &mut Machine, args: &[ValueRef], _: EnvRef) -> Result<ValueRef, Error> {
    m.list_from(args)
}

// Shared body of `map` and `filter`: call `f` on every element, pinning each result until the
// output list is built.
fn each(
    m: &mut Machine,
    args: &[ValueRef],
    env: EnvRef,
    mut keep: impl FnMut(&Machine, ValueRef, ValueRef) -> Result<Option<ValueRef>, Error>,
) -> Result<ValueRef, Error> {
    Arity::Exactly(2).check(args.len())?;
    let (f, items) = (args[0], args[1]);
    m.function(f)?;
    let items = m.list_items(items)?;

    let mut out = Vec::with_capacity(items.len());
    let mark = m.protect(f);
    let mapped = items.into_iter().try_for_each(|item| {
        let result = m.apply(f, &[item], env)?;
        m.protect(result);
        if let Some(kept) = keep(&*m, item, result)? {
            out.push(kept);
        }
        Ok(())
    });
    let result = mapped.and_then(|()| m.list_from(&out));
    m.release(mark);
    result
}

fn map(m: &mut Machine, args: &[ValueRef], env: EnvRef) -> Result<ValueRef, Error> {
    each(m, args, env, |_, _, result| Ok(Some(result)))
}

fn filter(m: &mut Machine, args: &[ValueRef], env: EnvRef) -> Result<ValueRef, Error> {
    each(m, args, env, |m, item, result| Ok(if m.is_true(result)? { Some(item) } else { None }))
}

fn force(m: &mut Machine, args: &[ValueRef], env: EnvRef) -> Result<ValueRef, Error> {
    Arity::Exactly(1).check(args.len())?;
    m.function(args[0])?;
    m.apply(args[0], &[], env)
}
