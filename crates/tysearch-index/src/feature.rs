//! Cheap features of a type, used to prune candidates before unification.
//!
//! A feature maps a canonical term to a small totally-ordered value, and
//! pairs the extractor with a compatibility predicate: `compatible(q, e)`
//! must hold whenever the query term and the entry term can unify, so the
//! trie may skip any edge the predicate rejects without losing matches.

use serde::{Deserialize, Serialize};

use crate::env::Env;
use crate::ty::{Kind, Ty, TyId};

/// The implemented feature set, in trie-level order.
pub const FEATURES: [Feature; 2] = [Feature::ByHead, Feature::TailLength];

/// A feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// The kind of the head (an arrow's return, the term itself otherwise).
    /// A variable head can stand for anything, so `Var` is compatible with
    /// every kind on either side.
    ByHead,
    /// The arity of the outer arrow, with a wildcard for bare variables
    /// (a lone variable unifies with an arrow of any arity). Two non-zero
    /// arities are always compatible because multiset partitioning bridges
    /// them; zero against non-zero is not, since a non-variable non-arrow
    /// never unifies with an arrow.
    TailLength,
}

/// A computed feature value. Values only meet values of the same feature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FeatureValue {
    /// `ByHead`: the head kind.
    Head(Kind),
    /// `TailLength`: matches any arity.
    AnyLen,
    /// `TailLength`: a concrete arity.
    Len(u32),
}

impl Feature {
    /// Compute this feature of a canonical term.
    pub fn compute(self, env: &Env, t: TyId) -> FeatureValue {
        match self {
            Feature::ByHead => FeatureValue::Head(env.head_kind(t)),
            Feature::TailLength => match env.ty(t) {
                Ty::Var(_) => FeatureValue::AnyLen,
                _ => FeatureValue::Len(env.tail_length(t) as u32),
            },
        }
    }

    /// Whether an entry with feature value `entry` must be considered for a
    /// query with feature value `query`.
    pub fn compatible(self, query: FeatureValue, entry: FeatureValue) -> bool {
        match (query, entry) {
            (FeatureValue::Head(q), FeatureValue::Head(e)) => {
                q == e || q == Kind::Var || e == Kind::Var
            }
            (FeatureValue::AnyLen, _) | (_, FeatureValue::AnyLen) => true,
            (FeatureValue::Len(q), FeatureValue::Len(e)) => q == e || (q > 0 && e > 0),
            // A Head value never meets a Len value at one trie level.
            _ => false,
        }
    }
}

/// Compute the full feature vector of a term, in trie-level order.
pub fn feature_vector(env: &Env, t: TyId) -> Vec<FeatureValue> {
    FEATURES.iter().map(|f| f.compute(env, t)).collect()
}

/// Quick rejection for a pair of terms: false only when no unifier can
/// exist. The unification engine uses this to prune multiset branches
/// before exploring them.
pub fn compatible_pair(env: &Env, a: TyId, b: TyId) -> bool {
    FEATURES
        .iter()
        .all(|f| f.compatible(f.compute(env, a), f.compute(env, b)))
}
