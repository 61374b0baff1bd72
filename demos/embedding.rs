//! Drive the runtime from a host program: register a native procedure, build a program as a
//! `Datum` tree and evaluate it. Run with `RUST_LOG=schem=debug` to watch the collector.

use std::{cell::RefCell, rc::Rc};
use schem::{Arity, Config, Datum, Engine, Error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn n(x: f64) -> Datum {
    Datum::Number(x)
}

fn s(name: &str) -> Datum {
    Datum::sym(name)
}

fn l(items: Vec<Datum>) -> Datum {
    Datum::List(items)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::new(Config::default().gc_threshold(512))?;

    // Every number passed to `log` is recorded on the host side.
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    engine.register("log", move |m, args, _| {
        Arity::Exactly(1).check(args.len())?;
        sink.borrow_mut().push(m.number(args[0])?);
        Ok(args[0])
    })?;

    let fib = l(vec![
        s("lambda"),
        l(vec![s("k"), s("a"), s("b")]),
        l(vec![
            s("if"),
            l(vec![s("eq?"), s("k"), n(0.0)]),
            s("a"),
            l(vec![
                s("fib"),
                l(vec![s("-"), s("k"), n(1.0)]),
                s("b"),
                l(vec![s("log"), l(vec![s("+"), s("a"), s("b")])]),
            ]),
        ]),
    ]);
    engine.run(&l(vec![s("define"), s("fib"), fib]))?;

    let call = l(vec![s("fib"), n(30.0), n(0.0), n(1.0)]);
    let result = engine.run(&call)?;
    println!("{} => {}", call, engine.machine().display(result)?);
    println!("log saw {} values, the last being {:?}", seen.borrow().len(), seen.borrow().last());

    let freed = engine.collect();
    let stats = engine.machine().stats();
    println!(
        "collected {} objects, {} values {} conses {} scopes remain after {} cycles",
        freed, stats.values, stats.conses, stats.scopes, stats.store.cycles,
    );
    Ok(())
}
