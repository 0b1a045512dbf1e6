//! Integration tests for the unification engine, driven through the
//! surface syntax.
//!
//! These cover the end-to-end pairs the engine must and must not unify,
//! plus the laws connecting unifiers to substitution application and the
//! specificity order.

use tysearch_index::{unifiable, unifiers, unify, Env, Subst, TyId};
use tysearch_syntax::parse_type;

// ── Helpers ────────────────────────────────────────────────────────────

fn import(env: &mut Env, src: &str) -> TyId {
    env.import(&parse_type(src).unwrap_or_else(|e| panic!("parse `{src}`: {e}")))
}

/// Assert the two type expressions unify and return the smallest unifier.
fn assert_unifies(env: &mut Env, a: &str, b: &str) -> Subst {
    let t1 = import(env, a);
    let t2 = import(env, b);
    unify(env, t1, t2)
        .unwrap_or_else(|| panic!("expected `{a}` to unify with `{b}`"))
}

/// Assert the two type expressions do not unify.
fn assert_no_unifier(env: &mut Env, a: &str, b: &str) {
    let t1 = import(env, a);
    let t2 = import(env, b);
    assert!(
        !unifiable(env, t1, t2),
        "expected `{a}` NOT to unify with `{b}`"
    );
}

// ── The scenario table ─────────────────────────────────────────────────

#[test]
fn scenario_identical_ground_types() {
    let mut env = Env::new();
    let subst = assert_unifies(&mut env, "int", "int");
    assert!(subst.is_empty());
}

#[test]
fn scenario_query_instantiates_entry_var() {
    let mut env = Env::new();
    let subst = assert_unifies(&mut env, "int -> int", "'a -> 'a");
    assert_eq!(subst.len(), 1);
    let int = import(&mut env, "int");
    assert!(subst.iter().all(|(_, t)| t == int));
}

#[test]
fn scenario_tupled_query_against_curried_entry() {
    let mut env = Env::new();
    let subst = assert_unifies(&mut env, "'a * 'b -> 'c", "int -> int -> int");
    let int = import(&mut env, "int");
    assert_eq!(subst.len(), 3);
    assert!(subst.iter().all(|(_, t)| t == int));
}

#[test]
fn scenario_grouping_against_tuple_return() {
    let mut env = Env::new();
    let q = import(&mut env, "'a -> 'b -> 'c");
    let e = import(&mut env, "'x -> 'y * 'z");
    let substs: Vec<Subst> = unifiers(&mut env, q, e).collect();
    assert!(!substs.is_empty(), "expected at least one unifier");
    for subst in &substs {
        assert_eq!(subst.apply(&mut env, q), subst.apply(&mut env, e));
    }
}

#[test]
fn scenario_ground_type_vs_arrow() {
    let mut env = Env::new();
    assert_no_unifier(&mut env, "int", "int -> int");
}

#[test]
fn scenario_list_vs_array() {
    let mut env = Env::new();
    assert_no_unifier(&mut env, "'a list * int", "'x array * int");
}

// ── Laws ───────────────────────────────────────────────────────────────

#[test]
fn unify_with_self_is_identity() {
    let mut env = Env::new();
    for src in [
        "int",
        "'a",
        "'a -> 'b -> 'a",
        "('a -> 'b) -> 'a list -> 'b list",
        "int * string",
        "unit",
    ] {
        let t = import(&mut env, src);
        let subst = unify(&mut env, t, t)
            .unwrap_or_else(|| panic!("`{src}` must unify with itself"));
        assert!(subst.is_empty(), "unify(t, t) must be empty for `{src}`");
    }
}

#[test]
fn every_unifier_equalizes_both_sides() {
    let mut env = Env::new();
    let pairs = [
        ("'a -> 'b", "int -> string"),
        ("'a * 'b -> 'c", "int -> int -> int"),
        ("'a -> 'b -> 'c", "'x -> 'y * 'z"),
        ("'f -> 'x", "('p -> 'q) -> 'p list"),
    ];
    for (a, b) in pairs {
        let t1 = import(&mut env, a);
        let t2 = import(&mut env, b);
        let substs: Vec<Subst> = unifiers(&mut env, t1, t2).collect();
        assert!(!substs.is_empty(), "`{a}` should unify with `{b}`");
        for subst in &substs {
            assert_eq!(
                subst.apply(&mut env, t1),
                subst.apply(&mut env, t2),
                "unifier {} of `{a}` ~ `{b}` does not equalize",
                subst.display(&env)
            );
        }
    }
}

#[test]
fn minimum_is_below_every_emitted_unifier() {
    let mut env = Env::new();
    let t1 = import(&mut env, "'a -> 'b -> 'c");
    let t2 = import(&mut env, "int -> string -> bool");
    let min = unify(&mut env, t1, t2).expect("should unify");
    let substs: Vec<Subst> = unifiers(&mut env, t1, t2).collect();
    for subst in &substs {
        assert_ne!(
            Subst::compare(&env, subst, &min),
            std::cmp::Ordering::Less,
            "found a unifier ranked below the reported minimum"
        );
    }
}

#[test]
fn unifiability_is_invariant_under_argument_permutation() {
    let mut env = Env::new();
    let q = import(&mut env, "'f -> 'acc -> 'xs");
    let variants = [
        "('acc -> 'x -> 'acc) -> 'acc -> 'x list -> 'acc",
        "'acc -> ('acc -> 'x -> 'acc) -> 'x list -> 'acc",
        "'x list -> 'acc -> ('acc -> 'x -> 'acc) -> 'acc",
    ];
    let first = import(&mut env, variants[0]);
    for v in variants {
        let e = import(&mut env, v);
        assert_eq!(e, first, "canonicalisation must erase argument order");
        assert!(unifiable(&mut env, q, e));
    }
}

#[test]
fn deeper_structure_still_unifies() {
    let mut env = Env::new();
    let subst = assert_unifies(
        &mut env,
        "('k, 'v) map -> 'k -> 'v option",
        "(string, int) map -> string -> int option",
    );
    assert_eq!(subst.len(), 2);
}

#[test]
fn constructor_arity_must_match() {
    let mut env = Env::new();
    assert_no_unifier(&mut env, "'a list", "('a, 'b) map");
    assert_no_unifier(&mut env, "int list", "list");
}

#[test]
fn opaque_terms_unify_only_on_equal_hash() {
    let mut env = Env::new();
    assert!(assert_unifies(&mut env, "<obj end>", "<obj end>").is_empty());
    assert_no_unifier(&mut env, "<obj end>", "<other end>");
    assert_no_unifier(&mut env, "<obj end>", "int");
    // A variable still absorbs an opaque term.
    let subst = assert_unifies(&mut env, "'a", "<obj end>");
    assert_eq!(subst.len(), 1);
}

#[test]
fn streams_are_lazy_and_droppable() {
    let mut env = Env::new();
    // A wide mismatch spawns many branches; taking one result and dropping
    // the stream must work fine.
    let t1 = import(&mut env, "'a -> 'b -> 'r");
    let t2 = import(&mut env, "int -> string -> bool -> char -> unit -> 'r");
    let first = unifiers(&mut env, t1, t2).next();
    assert!(first.is_some());
}
