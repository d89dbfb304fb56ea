//! Deterministic RNG and write-back (spec §5, §8 "RNG write-back"):
//! drawing from `random` is reproducible given a fixed seed, and a
//! `group`'s RNG advances its parent's state exactly `k` draws, while a
//! `define` block's draws are discarded on exit.

mod support;

use shapescript::EvalOptions;
use support::run_with_options;

fn options_with_seed(seed: u64) -> EvalOptions<'static> {
    EvalOptions { rng_seed: seed, ..EvalOptions::default() }
}

#[test]
fn same_seed_draws_the_same_sequence() {
    let a = run_with_options("print random\nprint random\nprint random", options_with_seed(42)).unwrap();
    let b = run_with_options("print random\nprint random\nprint random", options_with_seed(42)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn different_seeds_draw_different_sequences() {
    let a = run_with_options("print random", options_with_seed(1)).unwrap();
    let b = run_with_options("print random", options_with_seed(2)).unwrap();
    assert_ne!(a, b);
}

#[test]
fn random_draws_stay_within_the_requested_bounds() {
    let log = run_with_options("print random(10, 20)", options_with_seed(7)).unwrap();
    let value: f64 = log[0].trim_start_matches('[').trim_end_matches(']').parse().unwrap();
    assert!((10.0..20.0).contains(&value), "random(10, 20) produced {value}");
}

#[test]
fn group_rng_draws_advance_the_parent_rng_state() {
    // Drawing 3 times inside a `group` body, then drawing once more in the
    // parent scope, must match drawing 4 times in a row: the group's frame
    // clones its RNG from the parent and writes it back on exit, it does
    // not fork an independent stream.
    let grouped = run_with_options("group { print random\nprint random\nprint random }\nprint random", options_with_seed(9)).unwrap();
    let flat = run_with_options("print random\nprint random\nprint random\nprint random", options_with_seed(9)).unwrap();
    assert_eq!(grouped, flat);
}

#[test]
fn definition_rng_draws_do_not_leak_back_to_the_parent() {
    // `foo`'s body draws once from a forked state but that state is
    // discarded on exit (spec §5/§8 "after ctx.push_definition() ..., the
    // parent's RNG is unchanged"), so the next top-level draw must equal
    // what a program with no intervening `foo` call would draw.
    let with_definition = run_with_options("define foo { print random }\nfoo\nprint random", options_with_seed(3)).unwrap();
    let without_definition = run_with_options("print random\nprint random", options_with_seed(3)).unwrap();
    assert_eq!(with_definition[1], without_definition[0]);
}
