//! Error reporting through the public API: headlines, snippets, positions.

use std::rc::Rc;

use quill::{Engine, Position};

fn compile_err(src: &str) -> quill::Diagnostic {
    Engine::new().compile(None, src).unwrap_err()
}

#[test]
fn unknown_operator_is_positioned() {
    let d = compile_err("1 ? 2");
    assert_eq!(d.message, "Unknown operator '?' at pos 3");
    assert_eq!(d.position, Some(Position::new(2, 0, 2)));
}

#[test]
fn unknown_unary_operator() {
    let d = compile_err("1 + * 2");
    assert_eq!(d.message, "Unknown unary operator '*' at pos 5");
}

#[test]
fn dangling_operator() {
    let d = compile_err("1 +");
    assert!(d.message.starts_with("Missing parameter(s) for operator +"));
}

#[test]
fn operator_before_closing_paren() {
    let d = compile_err("f(1 +)");
    assert!(d.message.starts_with("Can't have operator + at the end of a subexpression"));
}

#[test]
fn mismatched_parens_are_plain_when_unlocatable() {
    let d = compile_err("1 + 2)");
    assert_eq!(d.message, "Mismatched parentheses");
    assert_eq!(d.position, None);
}

#[test]
fn single_line_snippet_window() {
    let d = compile_err("1 ? 2");
    assert_eq!(d.lines()[0], "1  HERE>> ? 2");
    assert_eq!(d.lines().last().map(String::as_str), Some(d.message.as_str()));
}

#[test]
fn multi_line_snippet_shows_context() {
    let d = compile_err("a = 1;\nb = 1 ? 2;\nc = 3");
    assert_eq!(d.message, "Unknown operator '?' at line 2, pos 7");
    assert_eq!(d.lines()[0], "a = 1;");
    assert_eq!(d.lines()[1], "b = 1  HERE>> ? 2;");
    assert_eq!(d.lines()[2], "c = 3");
}

#[test]
fn named_programs_tag_their_errors() {
    let engine = Engine::new();
    let d = engine.compile(Some("boot"), "1 ? 2").unwrap_err();
    assert!(d.message.ends_with("(boot)"));
}

#[test]
fn runtime_errors_point_at_the_failing_operator() {
    let engine = Engine::new();
    let d = engine.run("f(x) -> x - 1; f('a')").unwrap_err();
    assert_eq!(d.message, "Operand has to be of a numeric type at pos 11");
}

#[test]
fn newline_markers_fold_into_reported_source() {
    let d = compile_err("a = 1; $ b = 1 ? 2");
    // the marker became a real line break before rendering
    assert!(d.message.contains("at line 2"));
    assert_eq!(d.lines()[0], "a = 1; ");
}

#[test]
fn interceptor_overrides_rendering() {
    let engine = Engine::new();
    engine.set_error_interceptor(Rc::new(|_, token, msg| {
        vec![format!("{} at offset {}", msg, token.position.offset)]
    }));
    let d = engine.compile(None, "1 ? 2").unwrap_err();
    assert_eq!(d.lines(), ["Unknown operator '?' at offset 2"]);
    engine.clear_error_interceptor();
    let d = engine.compile(None, "3 ? 4").unwrap_err();
    assert!(d.lines().len() > 1 || d.lines()[0].contains("HERE>>"));
}

#[test]
fn diagnostics_serialize() {
    let d = compile_err("1 ? 2");
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["message"], "Unknown operator '?' at pos 3");
    assert_eq!(json["position"]["offset"], 2);
}

#[test]
fn truncated_string_literal() {
    let d = compile_err("'never closed");
    assert!(d.message.starts_with("Program truncated"));
}
