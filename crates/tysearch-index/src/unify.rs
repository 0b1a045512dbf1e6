//! The unification engine.
//!
//! `unifiers(env, t1, t2)` is a lazy stream of *every* substitution that
//! unifies the two terms under multiset semantics: arrow arguments and
//! tuple components are unordered, so matching them is non-deterministic
//! and one equation can fan out into many branches.
//!
//! The engine is an explicit depth-first automaton. A frame on the stack is
//! either a state ready for deterministic reduction (a worklist of
//! equations plus the substitution accumulated so far) or a suspended
//! multiset choice point that deals out one branch each time it surfaces.
//! Producing the next unifier resumes the stack; dropping the iterator
//! cancels the search.
//!
//! Branch failure is silent pruning, never an error. Mixing terms from two
//! environments is a programming error and panics in the environment's
//! accessors.

use crate::env::Env;
use crate::feature::compatible_pair;
use crate::subst::Subst;
use crate::ty::{Ty, TyId};

/// Start the stream of all unifiers of `t1` and `t2`.
pub fn unifiers<'e>(env: &'e mut Env, t1: TyId, t2: TyId) -> Unifiers<'e> {
    Unifiers {
        env,
        stack: vec![Frame::Reduce(State {
            equations: vec![(t1, t2)],
            subst: Subst::new(),
        })],
        fanout_limit: None,
    }
}

/// The smallest unifier of `t1` and `t2` under the specificity order, if
/// the terms unify at all.
pub fn unify(env: &mut Env, t1: TyId, t2: TyId) -> Option<Subst> {
    unifiers(env, t1, t2).into_min()
}

/// Whether the two terms unify. Stops at the first unifier.
pub fn unifiable(env: &mut Env, t1: TyId, t2: TyId) -> bool {
    unifiers(env, t1, t2).next().is_some()
}

/// Lazy iterator over every unifying substitution.
pub struct Unifiers<'e> {
    env: &'e mut Env,
    stack: Vec<Frame>,
    fanout_limit: Option<usize>,
}

enum Frame {
    /// A state ready for deterministic reduction.
    Reduce(State),
    /// A suspended multiset choice point, resumed once per branch.
    Choice(ChoicePoint),
}

#[derive(Clone)]
struct State {
    /// Pending equations between terms of the two sides.
    equations: Vec<(TyId, TyId)>,
    subst: Subst,
}

/// What one round of reduction concluded.
enum Step {
    /// The worklist drained; the accumulated substitution is a unifier.
    Solved(Subst),
    /// This branch cannot unify.
    Dead,
    /// A multiset equation suspended into a choice point on the stack.
    Suspended,
}

impl<'e> Unifiers<'e> {
    /// Cap how many assignments a single multiset equation may enumerate.
    ///
    /// Partition enumeration is exponential in the arity mismatch; the cap
    /// truncates the tail of the stream without affecting the unifiers
    /// already emitted. Unbounded by default.
    pub fn with_fanout_limit(mut self, limit: usize) -> Self {
        self.fanout_limit = Some(limit);
        self
    }

    /// Drain the stream and keep the smallest substitution under the
    /// specificity order.
    pub fn into_min(mut self) -> Option<Subst> {
        let mut best: Option<Subst> = None;
        while let Some(subst) = self.next() {
            best = match best {
                None => Some(subst),
                Some(current) => {
                    if Subst::compare(self.env, &subst, &current) == std::cmp::Ordering::Less {
                        Some(subst)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best
    }

    /// Run deterministic reduction on a state until it solves, dies, or
    /// suspends on a multiset equation.
    fn reduce(&mut self, mut state: State) -> Step {
        loop {
            let Some(idx) = pick_equation(self.env, &state) else {
                return Step::Solved(state.subst);
            };
            let (l, r) = state.equations.remove(idx);
            if l == r {
                continue;
            }
            if !compatible_pair(self.env, l, r) {
                return Step::Dead;
            }
            let (tl, tr) = (self.env.ty(l).clone(), self.env.ty(r).clone());
            match (tl, tr) {
                (Ty::Var(v), _) => {
                    if !bind(self.env, &mut state, v, r) {
                        return Step::Dead;
                    }
                }
                (_, Ty::Var(v)) => {
                    if !bind(self.env, &mut state, v, l) {
                        return Step::Dead;
                    }
                }
                (Ty::Other(h1), Ty::Other(h2)) => {
                    if h1 != h2 {
                        return Step::Dead;
                    }
                }
                (Ty::Constr(p1, a1), Ty::Constr(p2, a2)) => {
                    if p1 != p2 || a1.len() != a2.len() {
                        return Step::Dead;
                    }
                    state
                        .equations
                        .extend(a1.iter().copied().zip(a2.iter().copied()));
                }
                (Ty::Arrow(x1, r1), Ty::Arrow(x2, r2)) => {
                    state.equations.push((r1, r2));
                    self.suspend(state, x1.to_vec(), x2.to_vec());
                    return Step::Suspended;
                }
                (Ty::Tuple(e1), Ty::Tuple(e2)) => {
                    if e1.is_empty() && e2.is_empty() {
                        continue;
                    }
                    if e1.is_empty() || e2.is_empty() {
                        return Step::Dead;
                    }
                    self.suspend(state, e1.to_vec(), e2.to_vec());
                    return Step::Suspended;
                }
                _ => return Step::Dead,
            }
        }
    }

    /// Park a multiset equation as a choice point. The smaller side keeps
    /// its elements; the larger side's elements are dealt into groups, one
    /// group per small element.
    fn suspend(&mut self, base: State, x1: Vec<TyId>, x2: Vec<TyId>) {
        let (small, large) = if x1.len() <= x2.len() {
            (x1, x2)
        } else {
            (x2, x1)
        };
        let assign = Assignments::new(large.len(), small.len());
        self.stack.push(Frame::Choice(ChoicePoint {
            base,
            small,
            large,
            assign,
            produced: 0,
        }));
    }
}

impl Iterator for Unifiers<'_> {
    type Item = Subst;

    fn next(&mut self) -> Option<Subst> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Choice(mut cp) => {
                    if let Some(branch) = cp.next_branch(self.env, self.fanout_limit) {
                        // Re-park the choice point below the branch so the
                        // branch is fully explored first (depth-first).
                        self.stack.push(Frame::Choice(cp));
                        self.stack.push(Frame::Reduce(branch));
                    }
                }
                Frame::Reduce(state) => match self.reduce(state) {
                    Step::Solved(subst) => {
                        tracing::trace!(unifier = %subst.display(self.env), "emit");
                        return Some(subst);
                    }
                    Step::Dead => {}
                    Step::Suspended => {}
                },
            }
        }
        None
    }
}

/// Choose the next equation to reduce: one that is already decided or
/// involves a variable if there is one (binding early both prunes the
/// search and finds a first unifier fast), the front of the list otherwise.
fn pick_equation(env: &Env, state: &State) -> Option<usize> {
    if state.equations.is_empty() {
        return None;
    }
    let preferred = state.equations.iter().position(|&(l, r)| {
        l == r || matches!(env.ty(l), Ty::Var(_)) || matches!(env.ty(r), Ty::Var(_))
    });
    Some(preferred.unwrap_or(0))
}

/// Bind `v := t`: occurs-check, then fold the binding into the pending
/// equations and the accumulated substitution. Returns false when the
/// occurs check fails the branch.
fn bind(env: &mut Env, state: &mut State, v: crate::ty::VarId, t: TyId) -> bool {
    if env.occurs(v, t) {
        return false;
    }
    let single = Subst::singleton(v, t);
    for pair in state.equations.iter_mut() {
        pair.0 = single.apply(env, pair.0);
        pair.1 = single.apply(env, pair.1);
    }
    state.subst = state.subst.compose(env, &single);
    true
}

struct ChoicePoint {
    /// Equations and substitution as of the suspension, shared by every
    /// branch this point deals out.
    base: State,
    small: Vec<TyId>,
    large: Vec<TyId>,
    assign: Assignments,
    produced: usize,
}

impl ChoicePoint {
    /// Deal the next branch: pick the next surjective assignment of large
    /// elements onto small elements, build the implicit tuples, and pair
    /// them up. Assignments whose pairs are quick-rejected are skipped
    /// without ever reaching the stack.
    fn next_branch(&mut self, env: &mut Env, limit: Option<usize>) -> Option<State> {
        'assignments: loop {
            if let Some(limit) = limit {
                if self.produced >= limit {
                    tracing::debug!(
                        limit,
                        small = self.small.len(),
                        large = self.large.len(),
                        "multiset fanout limit reached, truncating branch enumeration"
                    );
                    return None;
                }
            }
            let assignment = self.assign.next()?.to_vec();
            self.produced += 1;

            let mut state = self.base.clone();
            for (i, &lhs) in self.small.iter().enumerate() {
                let group: Vec<TyId> = self
                    .large
                    .iter()
                    .copied()
                    .zip(assignment.iter().copied())
                    .filter(|&(_, g)| g == i)
                    .map(|(t, _)| t)
                    .collect();
                let rhs = if group.len() == 1 {
                    group[0]
                } else {
                    env.tuple(&group)
                };
                if !compatible_pair(env, lhs, rhs) {
                    continue 'assignments;
                }
                state.equations.push((lhs, rhs));
            }
            return Some(state);
        }
    }
}

/// Lexicographic enumerator of the surjective assignments of `slots`
/// elements onto `groups` groups. Each surjection is one way to partition
/// the larger multiset into exactly `groups` non-empty parts and hand the
/// parts to the smaller side, so partition choice and permutation choice
/// collapse into a single counter.
///
/// When the sides have equal arity every surjection is a bijection, so
/// that case walks permutations directly instead of filtering the full
/// `groups^slots` counter.
struct Assignments {
    digits: Vec<usize>,
    groups: usize,
    permutations_only: bool,
    started: bool,
    done: bool,
}

impl Assignments {
    fn new(slots: usize, groups: usize) -> Self {
        // No groups cannot cover any slot; more groups than slots can
        // never be surjective.
        let impossible = (groups == 0 && slots > 0) || groups > slots;
        let permutations_only = groups == slots;
        let digits = if permutations_only {
            (0..slots).collect()
        } else {
            vec![0; slots]
        };
        Assignments {
            digits,
            groups,
            permutations_only,
            started: false,
            done: impossible,
        }
    }

    fn next(&mut self) -> Option<&[usize]> {
        loop {
            if self.done {
                return None;
            }
            if self.started {
                if !self.increment() {
                    return None;
                }
            } else {
                self.started = true;
            }
            if self.permutations_only || self.surjective() {
                return Some(&self.digits);
            }
        }
    }

    fn increment(&mut self) -> bool {
        let stepped = if self.permutations_only {
            next_permutation(&mut self.digits)
        } else {
            self.odometer_step()
        };
        if !stepped {
            self.done = true;
        }
        stepped
    }

    /// Odometer step in base `groups`. False when the counter wraps.
    fn odometer_step(&mut self) -> bool {
        for digit in self.digits.iter_mut().rev() {
            *digit += 1;
            if *digit < self.groups {
                return true;
            }
            *digit = 0;
        }
        false
    }

    fn surjective(&self) -> bool {
        let mut seen = vec![false; self.groups];
        for &d in &self.digits {
            seen[d] = true;
        }
        seen.iter().all(|&s| s)
    }
}

/// Step to the lexicographically next permutation. False at the last one.
fn next_permutation(digits: &mut [usize]) -> bool {
    if digits.len() < 2 {
        return false;
    }
    let mut i = digits.len() - 1;
    while i > 0 && digits[i - 1] >= digits[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = digits.len() - 1;
    while digits[j] <= digits[i - 1] {
        j -= 1;
    }
    digits.swap(i - 1, j);
    digits[i..].reverse();
    true
}
