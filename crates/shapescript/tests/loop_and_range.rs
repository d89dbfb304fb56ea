//! Quantified loop/range invariants from spec §8: iteration count as a
//! function of `from`/`to`/`step`, and the zero-step assertion failure.

mod support;

use support::{run, try_run};

#[test]
fn iteration_count_matches_floor_formula() {
    // floor((5-1)/1) + 1 == 5
    assert_eq!(run("for i in 1 to 5 { print i }").len(), 5);
    // floor((10-0)/3) + 1 == 4
    assert_eq!(run("for i in 0 to 10 step 3 { print i }").len(), 4);
    // (b-a)*s < 0, so the loop body never runs
    assert_eq!(run("for i in 1 to 5 step -1 { print i }"), Vec::<String>::new());
    assert_eq!(run("for i in 5 to 1 { print i }"), Vec::<String>::new());
}

#[test]
fn negative_step_counts_down() {
    assert_eq!(run("for i in 5 to 1 step -2 { print i }"), vec!["[5]", "[3]", "[1]"]);
}

#[test]
fn zero_step_in_a_for_loop_is_an_assertion_failure() {
    let err = try_run("for i in 1 to 5 step 0 { print i }").unwrap_err();
    assert!(format!("{err}").contains("Step value must be nonzero"));
}

#[test]
fn zero_step_in_a_bare_step_override_is_also_an_assertion_failure() {
    let err = try_run("define r 1 to 5\nprint r step 0").unwrap_err();
    assert!(format!("{err}").contains("Step value must be nonzero"));
}

#[test]
fn step_override_promotes_a_bare_number_to_a_single_point_range() {
    assert_eq!(run("print 4 step 2"), vec!["[range(4,4,2)]"]);
}

#[test]
fn for_loop_binds_the_index_inside_the_body_only() {
    let err = try_run("for i in 1 to 2 { print i }\nprint i").unwrap_err();
    assert!(format!("{err}").contains("Unknown symbol 'i'"));
}
