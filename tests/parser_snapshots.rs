//! Compiled RPN order pinned as snapshots.

use insta::assert_snapshot;
use quill::Engine;

fn rpn(src: &str) -> String {
    Engine::new().rpn(src).unwrap().join(" ")
}

#[test]
fn arithmetic_precedence() {
    assert_snapshot!(rpn("2 + 3 * 4 - 1"), @"2 3 4 * + 1 -");
}

#[test]
fn right_associative_towers() {
    assert_snapshot!(rpn("2 ^ 3 ^ 2"), @"2 3 2 ^ ^");
    assert_snapshot!(rpn("a = b = 1"), @"a b 1 = =");
}

#[test]
fn function_definition_sequence() {
    assert_snapshot!(
        rpn("f(x, y) -> x + y; f(1, 2)"),
        @"( x y f x y + -> ( 1 2 f ;"
    );
}

#[test]
fn bracket_sugar_compiles_to_constructor_calls() {
    assert_snapshot!(rpn("a = [1, 2]"), @"a ( 1 2 l =");
    assert_snapshot!(rpn("{l('k', 1)}"), @"( ( k 1 l m");
}

#[test]
fn implicit_multiplication_token() {
    assert_snapshot!(rpn("2(3 + 4)"), @"2 3 4 + *");
}
