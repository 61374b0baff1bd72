use pretty_assertions::assert_eq;
use schem::{Config, Datum, Engine, ErrorKind, Machine};

fn n(x: f64) -> Datum {
    Datum::Number(x)
}

fn s(name: &str) -> Datum {
    Datum::sym(name)
}

fn l(items: Vec<Datum>) -> Datum {
    Datum::List(items)
}

fn countdown() -> Datum {
    let body = l(vec![
        s("if"),
        l(vec![s("eq?"), s("n"), n(0.0)]),
        n(0.0),
        l(vec![s("countdown"), l(vec![s("-"), s("n"), n(1.0)])]),
    ]);
    l(vec![s("define"), s("countdown"), l(vec![s("lambda"), l(vec![s("n")]), body])])
}

#[test]
fn bound_values_survive_collection() {
    let mut m = Machine::new(Config::default().gc_threshold(None));
    let env = m.make_environment().unwrap();
    let datum = l(vec![n(1.0), l(vec![n(2.0), n(3.0)]), n(4.0)]);
    let list = m.alloc_datum(&datum).unwrap();
    m.define(env, "xs", list).unwrap();

    let before = m.display(list).unwrap();
    m.collect(env);

    let found = m.lookup(env, "xs").unwrap();
    assert_eq!(found, list);
    assert_eq!(m.display(found).unwrap(), before);
    assert_eq!(m.to_datum(found).unwrap(), datum);
}

#[test]
fn unbound_values_are_reclaimed() {
    let mut m = Machine::new(Config::default().gc_threshold(None));
    let env = m.make_environment().unwrap();
    let baseline = m.stats();

    let garbage = m.alloc_datum(&l(vec![n(1.0), n(2.0), n(3.0)])).unwrap();
    assert!(m.is_live(garbage));
    assert_eq!(m.stats().conses, baseline.conses + 3);

    assert_eq!(m.collect(env), 7);
    assert!(!m.is_live(garbage));
    assert_eq!(m.stats().values, baseline.values);
    assert_eq!(m.stats().conses, baseline.conses);
    assert_eq!(m.evaluate(garbage, env).unwrap_err().kind(), &ErrorKind::DanglingHandle);
}

#[test]
fn closure_environments_survive_collection() {
    let mut e = Engine::new(Config::default().gc_threshold(None)).unwrap();
    let adder = l(vec![
        s("lambda"),
        l(vec![s("k")]),
        l(vec![s("lambda"), l(vec![s("x")]), l(vec![s("+"), s("x"), s("k")])]),
    ]);
    e.run(&l(vec![s("define"), s("make-adder"), adder])).unwrap();
    e.run(&l(vec![s("define"), s("add3"), l(vec![s("make-adder"), n(3.0)])])).unwrap();

    e.collect();
    // The scope binding `k` is only reachable through the closure.
    assert_eq!(e.machine().stats().scopes, 2);

    let result = e.run(&l(vec![s("add3"), n(4.0)])).unwrap();
    assert_eq!(e.machine().number(result).unwrap(), 7.0);
}

#[test]
fn call_scopes_are_reclaimed() {
    let mut e = Engine::new(Config::default().gc_threshold(None)).unwrap();
    e.run(&countdown()).unwrap();
    e.run(&l(vec![s("countdown"), n(1_000.0)])).unwrap();

    let stats = e.machine().stats();
    assert_eq!(stats.store.cycles, 0);
    assert!(stats.scopes > 1_000);

    e.collect();
    assert_eq!(e.machine().stats().scopes, 1);
}

#[test]
fn automatic_collection_bounds_the_store() {
    let mut e = Engine::new(Config::default().gc_threshold(256)).unwrap();
    e.run(&countdown()).unwrap();
    let result = e.run(&l(vec![s("countdown"), n(20_000.0)])).unwrap();
    assert_eq!(e.machine().number(result).unwrap(), 0.0);

    let stats = e.machine().stats();
    assert!(stats.store.cycles > 0);
    assert!(stats.store.live < 1_024, "store grew to {} objects", stats.store.live);
}

#[test]
fn intermediate_values_survive_automatic_collection() {
    // A tiny threshold forces collections in the middle of argument evaluation and inside
    // `map`, where half-built results are only held by the shadow stack.
    let mut e = Engine::new(Config::default().gc_threshold(8).growth_factor(1)).unwrap();
    let square = l(vec![s("lambda"), l(vec![s("x")]), l(vec![s("*"), s("x"), s("x")])]);
    let mut nums = vec![s("list")];
    nums.extend((1..=50).map(|i| l(vec![s("+"), n(i as f64), n(0.0)])));

    let result = e.run(&l(vec![s("map"), square, l(nums)])).unwrap();
    let expected = l((1..=50).map(|i| n((i * i) as f64)).collect());
    assert_eq!(e.machine().to_datum(result).unwrap(), expected);
    assert!(e.machine().stats().store.cycles > 0);
}

#[test]
fn protected_host_values_survive_automatic_collection() {
    let mut e = Engine::new(Config::default().gc_threshold(16).growth_factor(1)).unwrap();
    e.run(&countdown()).unwrap();

    let m = e.machine_mut();
    let kept = m.alloc_datum(&l(vec![n(1.0), n(2.0)])).unwrap();
    let mark = m.protect(kept);

    e.run(&l(vec![s("countdown"), n(500.0)])).unwrap();
    assert!(e.machine().is_live(kept));

    e.machine_mut().release(mark);
    e.collect();
    assert!(!e.machine().is_live(kept));
}

#[test]
fn store_ceiling_fails_evaluation_cleanly() {
    let mut e = Engine::new(Config::default().gc_threshold(None).max_objects(300)).unwrap();
    e.run(&countdown()).unwrap();

    let err = e.run(&l(vec![s("countdown"), n(10_000.0)])).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::AllocationFailure(_)));

    // Nothing is left pinned, so a collection makes room again.
    e.collect();
    let result = e.run(&l(vec![s("countdown"), n(10.0)])).unwrap();
    assert_eq!(e.machine().number(result).unwrap(), 0.0);
}

#[test]
fn automatic_collection_can_be_disabled() {
    let mut e = Engine::new(Config::default().gc_threshold(None)).unwrap();
    e.run(&countdown()).unwrap();
    e.run(&l(vec![s("countdown"), n(2_000.0)])).unwrap();
    assert_eq!(e.machine().stats().store.cycles, 0);
    assert!(e.collect() > 2_000);
}

#[test]
fn evaluation_keeps_a_child_environment_alive() {
    let mut m = Machine::new(Config::default().gc_threshold(64).growth_factor(1));
    let global = m.make_environment().unwrap();
    let define = m.alloc_datum(&countdown()).unwrap();
    m.evaluate(define, global).unwrap();

    // Nothing the countdown closure captures reaches `local`.
    let local = m.make_scope(Some(global)).unwrap();
    let datum = l(vec![n(1.0), n(2.0), n(3.0)]);
    let data = m.alloc_datum(&datum).unwrap();
    m.define(local, "data", data).unwrap();

    let call = m.alloc_datum(&l(vec![s("countdown"), n(500.0)])).unwrap();
    let result = m.evaluate(call, local).unwrap();
    assert_eq!(m.number(result).unwrap(), 0.0);
    assert!(m.stats().store.cycles > 0);

    let found = m.lookup(local, "data").unwrap();
    assert_eq!(m.to_datum(found).unwrap(), datum);
}

#[test]
fn an_expression_can_be_evaluated_twice() {
    let mut e = Engine::new(Config::default().gc_threshold(64).growth_factor(1)).unwrap();
    e.run(&countdown()).unwrap();
    let call = e.machine_mut().alloc_datum(&l(vec![s("countdown"), n(200.0)])).unwrap();

    for _ in 0..2 {
        let result = e.eval(call).unwrap();
        assert_eq!(e.machine().number(result).unwrap(), 0.0);
    }
    assert!(e.machine().stats().store.cycles > 0);
    assert!(e.machine().is_live(call));
}
