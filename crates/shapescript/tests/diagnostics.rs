//! End-to-end diagnostics rendering: `Error::render` produces a
//! caret-highlighted snippet, and unknown-symbol errors carry the
//! Levenshtein-based "Did you mean" suggestion (spec §4.J, §8 edit-distance
//! examples).

mod support;

use shapescript::diagnostics::levenshtein;
use support::try_run;

#[test]
fn levenshtein_matches_spec_examples() {
    assert_eq!(levenshtein("foo", "foob"), 1);
    assert_eq!(levenshtein("FOO", "foo"), 3);
    assert_eq!(levenshtein("", "foo"), 3);
}

#[test]
fn unknown_symbol_error_renders_a_caret_under_the_offending_token() {
    let source = "print colr";
    let err = try_run(source).unwrap_err();
    let rendered = err.render(source);
    assert!(rendered.contains("Unknown symbol 'colr'"));
    assert!(rendered.contains(source));
    assert!(rendered.contains("Did you mean 'color'?"));
}

#[test]
fn colour_spelling_suggests_the_american_spelling_via_the_alias_table() {
    let source = "print colour";
    let err = try_run(source).unwrap_err();
    let rendered = err.render(source);
    assert!(rendered.contains("Did you mean 'color'?"));
}

#[test]
fn type_mismatch_error_names_the_context_and_both_types() {
    let err = try_run("color \"oops\"").unwrap_err();
    let rendered = format!("{err}");
    assert!(rendered.contains("Type mismatch"));
}

#[test]
fn parse_error_on_an_unterminated_block_reports_an_unexpected_token() {
    let err = try_run("cube { size 1").unwrap_err();
    let rendered = format!("{err}");
    assert!(rendered.contains("Unexpected token"));
}
