//! End-to-end coverage of spec §8's six literal scenarios, run through the
//! public `Program::parse`/`shapescript::evaluate` API rather than the
//! evaluator's own `#[cfg(test)]` shortcuts, so a regression in the crate's
//! public surface (not just its internals) would fail these.

mod support;

use support::{run, try_run};

#[test]
fn scenario_1_print_cos_pi() {
    let log = run("print cos pi");
    assert_eq!(log.len(), 1);
    let value: f64 = log[0].trim_start_matches('[').trim_end_matches(']').parse().expect("numeric log entry");
    assert!((value - (-1.0)).abs() < 1e-9, "expected cos(pi) ~= -1.0, got {value}");
}

#[test]
fn scenario_2_color_round_trips_through_named_hex_and_tuple_forms() {
    assert_eq!(run("color 1 0 0\nprint color"), vec!["[red]"]);
    assert_eq!(run("color #fff\nprint color"), vec!["[white]"]);
    assert_eq!(run("color (1 0 0) 0.5\nprint color"), vec!["[(1,0,0,0.5)]"]);
}

#[test]
fn scenario_3_for_loop_over_range_reversed_range_and_tuple() {
    assert_eq!(run("for i in 1 to 3 { print i }"), vec!["[1]", "[2]", "[3]"]);
    assert_eq!(run("for 3 to 1 { print 0 }"), Vec::<String>::new());
    assert_eq!(run("for i in (3 1 4 1 5) { print i }"), vec!["[3]", "[1]", "[4]", "[1]", "[5]"]);
}

#[test]
fn scenario_4_bare_step_rebinds_an_existing_range() {
    assert_eq!(run("define range 1 to 5\nprint range step 2"), vec!["[range(1,5,2)]"]);
    assert_eq!(run("define range 1 to 5 step 3\nprint range step 2"), vec!["[range(1,5,2)]"]);
}

#[test]
fn scenario_5_implicit_tuple_equality_interleaves_the_remainder() {
    assert_eq!(run("print 1 2 3 = 1 2 3"), vec!["[1,2,false,2,3]"]);
    assert_eq!(run("print (1 2 3) = (1 2 3)"), vec!["[true]"]);
}

#[test]
fn scenario_6_self_recursive_define_trips_the_recursion_guard() {
    let err = try_run("define foo { foo }\nfoo").unwrap_err();
    let rendered = err.render("define foo { foo }\nfoo");
    assert!(rendered.contains("Too much recursion"), "rendered error: {rendered}");
}
