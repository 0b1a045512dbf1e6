//! Substitutions: finite maps from variables to terms.
//!
//! A [`Subst`] is the output of unification. Application is capture-free
//! (variables are globally unique identities) and rebuilds through the
//! smart constructors, so applying a substitution to a canonical term
//! yields a canonical term. The specificity order defined here is what
//! "smallest unifier" means everywhere else: fewer bindings rank first,
//! then structurally simpler bound terms, then the bindings themselves.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::env::Env;
use crate::ty::{Ty, TyId, VarId};

/// A finite map from variables to terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subst {
    map: BTreeMap<VarId, TyId>,
}

impl Subst {
    /// The identity substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// A substitution binding a single variable.
    pub fn singleton(v: VarId, t: TyId) -> Self {
        let mut map = BTreeMap::new();
        map.insert(v, t);
        Subst { map }
    }

    /// Whether this is the identity substitution.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// The binding for a variable, if any.
    pub fn get(&self, v: VarId) -> Option<TyId> {
        self.map.get(&v).copied()
    }

    /// Iterate the bindings in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, TyId)> + '_ {
        self.map.iter().map(|(&v, &t)| (v, t))
    }

    /// Apply the substitution to a term, rebuilding canonically.
    pub fn apply(&self, env: &mut Env, t: TyId) -> TyId {
        if self.map.is_empty() {
            return t;
        }
        match env.ty(t).clone() {
            Ty::Var(v) => match self.get(v) {
                Some(u) if u != t => self.apply(env, u),
                _ => t,
            },
            Ty::Constr(path, args) => {
                let mapped: Vec<TyId> = args.iter().map(|&a| self.apply(env, a)).collect();
                env.constr(path, &mapped)
            }
            Ty::Arrow(args, ret) => {
                let mapped: Vec<TyId> = args.iter().map(|&a| self.apply(env, a)).collect();
                let ret = self.apply(env, ret);
                env.arrow_multi(&mapped, ret)
            }
            Ty::Tuple(elts) => {
                let mapped: Vec<TyId> = elts.iter().map(|&e| self.apply(env, e)).collect();
                env.tuple(&mapped)
            }
            Ty::Other(_) => t,
        }
    }

    /// Compose with a newer substitution: `other` is applied to every
    /// binding of `self`, then `other`'s bindings for still-free variables
    /// are added. Applying the result equals applying `self` then `other`.
    pub fn compose(&self, env: &mut Env, other: &Subst) -> Subst {
        let mut map = BTreeMap::new();
        for (&v, &t) in &self.map {
            map.insert(v, other.apply(env, t));
        }
        for (&v, &t) in &other.map {
            map.entry(v).or_insert(t);
        }
        Subst { map }
    }

    /// Total specificity order. Smaller is better:
    ///
    /// 1. fewer bindings,
    /// 2. smaller total node count of the bound terms,
    /// 3. lexicographic on the sorted `(var, term)` pairs.
    pub fn compare(env: &Env, a: &Subst, b: &Subst) -> Ordering {
        a.len()
            .cmp(&b.len())
            .then_with(|| a.total_nodes(env).cmp(&b.total_nodes(env)))
            .then_with(|| {
                for ((v1, t1), (v2, t2)) in a.iter().zip(b.iter()) {
                    let ord = v1.cmp(&v2).then_with(|| env.cmp_ty(t1, t2));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
    }

    fn total_nodes(&self, env: &Env) -> usize {
        self.map.values().map(|&t| env.node_count(t)).sum()
    }

    /// Render the bindings against an environment.
    pub fn display<'e>(&'e self, env: &'e Env) -> SubstDisplay<'e> {
        SubstDisplay { env, subst: self }
    }
}

/// Displays a substitution as `{'a := int, 'b := string}`.
pub struct SubstDisplay<'e> {
    env: &'e Env,
    subst: &'e Subst,
}

impl fmt::Display for SubstDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (v, t)) in self.subst.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.env.var_name(v) {
                Some(name) => write!(f, "'{name}")?,
                None => write!(f, "'_{}", v.0)?,
            }
            write!(f, " := {}", self.env.display(t))?;
        }
        write!(f, "}}")
    }
}
