//! Scope isolation (spec §8 "any symbol defined inside a block is invisible
//! after the block exits, except built-in properties") and unknown-symbol
//! suggestions (spec §4.J, §8 edit-distance examples).

mod support;

use support::{run, try_run};

#[test]
fn define_inside_a_block_does_not_leak_to_the_enclosing_scope() {
    let err = try_run("if true { define x 1 }\nprint x").unwrap_err();
    assert!(format!("{err}").contains("Unknown symbol 'x'"));
}

#[test]
fn define_inside_a_for_loop_body_does_not_leak() {
    let err = try_run("for i in 1 to 2 { define x i }\nprint x").unwrap_err();
    assert!(format!("{err}").contains("Unknown symbol 'x'"));
}

#[test]
fn property_writes_inside_if_bypass_to_the_enclosing_invocation() {
    // `color` is a built-in property, not a scoped definition: writing it
    // inside an `if` body must still be visible to `print color` after the
    // `if` exits, unlike a `define`.
    assert_eq!(run("if true { color red }\nprint color"), vec!["[red]"]);
}

#[test]
fn property_writes_inside_a_for_loop_bypass_to_the_enclosing_invocation() {
    assert_eq!(run("for i in 1 to 1 { color blue }\nprint color"), vec!["[blue]"]);
}

#[test]
fn unknown_symbol_suggests_the_closest_candidate() {
    let err = try_run("print colr").unwrap_err();
    let rendered = format!("{err}");
    assert!(rendered.contains("Unknown symbol 'colr'"));
}

#[test]
fn a_block_definitions_option_parameter_shadows_an_outer_name_without_leaking_back() {
    assert_eq!(run("define x 1\ndefine foo { option x 0\nprint x }\nfoo 2\nprint x"), vec!["[2]", "[1]"]);
}
