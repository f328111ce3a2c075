//! Variable scoping, namespaces and the embedder-facing call surface.

use quill::{Engine, InvokeError, Value};

#[test]
fn function_bodies_do_not_see_caller_locals() {
    let engine = Engine::new();
    // an unbound read inside the frame vivifies a fresh zero
    let out = engine.run("a = 1; f() -> a; f()").unwrap();
    assert_eq!(out.display(), "0");
}

#[test]
fn globals_are_visible_inside_functions() {
    let engine = Engine::new();
    let out = engine.run("global_a = 7; f() -> global_a; f()").unwrap();
    assert_eq!(out.display(), "7");
}

#[test]
fn functions_can_write_globals() {
    let engine = Engine::new();
    let out = engine
        .run("bump() -> (global_n += 1); bump(); bump(); global_n")
        .unwrap();
    assert_eq!(out.display(), "2");
}

#[test]
fn namespaces_do_not_share_state() {
    let engine = Engine::new();
    let one = engine.host("one");
    let two = engine.host("two");
    let program = engine.compile(None, "global_x = 1").unwrap();
    engine.eval(&program, &mut engine.new_context(&one)).unwrap();
    assert!(one.get_global("global_x").is_some());
    assert!(two.get_global("global_x").is_none());
}

#[test]
fn invoke_reports_unknown_and_arity() {
    let engine = Engine::new();
    let host = engine.default_host();
    engine.run("pair(a, b) -> l(a, b)").unwrap();

    match engine.invoke(&host, "missing", vec![]) {
        Err(InvokeError::UnknownFunction(name)) => assert_eq!(name, "missing"),
        other => panic!("unexpected result: {other:?}"),
    }
    match engine.invoke(&host, "pair", vec![Value::number(1.0)]) {
        Err(InvokeError::ArityMismatch { expected: 2, got: 1 }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
    let out = engine
        .invoke(&host, "pair", vec![Value::number(1.0), Value::str("x")])
        .unwrap();
    assert_eq!(out.display(), "[1, x]");
}

#[test]
fn call_depth_is_per_host() {
    let engine = Engine::new();
    let host = engine.host("small");
    host.set_max_call_depth(4);
    let program = engine
        .compile(None, "f(x) -> if(x > 0, f(x - 1), 'done'); f(10)")
        .unwrap();
    let err = engine
        .eval(&program, &mut engine.new_context(&host))
        .unwrap_err();
    assert_eq!(err.message, "Your thoughts are too deep");

    let shallow = engine.compile(None, "f(x) -> if(x > 0, f(x - 1), 'done'); f(2)").unwrap();
    let out = engine.eval(&shallow, &mut engine.new_context(&host)).unwrap();
    assert_eq!(out.display(), "done");
}

#[test]
fn iteration_variables_are_seeded() {
    let engine = Engine::new();
    assert_eq!(engine.run("_").unwrap().display(), "0");
    assert_eq!(engine.run("_i + _a").unwrap().display(), "0");
}

#[test]
fn constants_can_be_shadowed_locally() {
    let engine = Engine::new();
    assert_eq!(engine.run("pi = 3; pi").unwrap().display(), "3");
    // the host seed is untouched
    let pi = engine.run("pi").unwrap().as_number().unwrap();
    assert!((pi - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn public_and_available_function_listings() {
    let engine = Engine::new();
    let host = engine.default_host();
    engine.run("visible() -> 1; _hidden() -> 2; __internal() -> 3").unwrap();
    assert_eq!(host.public_functions(), ["visible"]);
    assert_eq!(host.available_functions(), ["_hidden", "visible"]);
}
