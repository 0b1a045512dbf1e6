//! The feature trie: a multi-level discrimination tree over feature values.
//!
//! Inner levels key children by the value of one feature (levels follow
//! [`FEATURES`] order); the leaf level buckets entries into [`Cell`]s keyed
//! by exact canonical type. Children are kept in sorted vectors, so both
//! insertion and the candidate walk are deterministic.
//!
//! A filtered query descends only edges whose key is `compatible` with the
//! query's feature value at that level; an exhaustive query visits every
//! leaf.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Info};
use crate::feature::{FeatureValue, FEATURES};
use crate::ty::TyId;

/// One level of the discrimination tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trie {
    /// An inner level: children keyed by feature value, sorted by key.
    Node { children: Vec<(FeatureValue, Trie)> },
    /// The leaf level: cells keyed by canonical type, sorted by handle.
    Leaf { cells: Vec<(TyId, Cell)> },
}

impl Trie {
    /// An empty trie with one level per feature in [`FEATURES`].
    pub fn new() -> Self {
        Self::empty(FEATURES.len())
    }

    fn empty(levels: usize) -> Self {
        if levels == 0 {
            Trie::Leaf { cells: Vec::new() }
        } else {
            Trie::Node {
                children: Vec::new(),
            }
        }
    }

    /// Insert an entry under its feature vector.
    pub fn insert(&mut self, features: &[FeatureValue], info: Info) {
        match self {
            Trie::Node { children } => {
                let key = features[0];
                let child = match children.binary_search_by(|(k, _)| k.cmp(&key)) {
                    Ok(i) => &mut children[i].1,
                    Err(i) => {
                        children.insert(i, (key, Trie::empty(features.len() - 1)));
                        &mut children[i].1
                    }
                };
                child.insert(&features[1..], info);
            }
            Trie::Leaf { cells } => {
                debug_assert!(features.is_empty(), "feature vector longer than the trie");
                let ty = info.ty;
                match cells.binary_search_by(|(k, _)| k.cmp(&ty)) {
                    Ok(i) => cells[i].1.add(info),
                    Err(i) => {
                        let mut cell = Cell::new(ty);
                        cell.add(info);
                        cells.insert(i, (ty, cell));
                    }
                }
            }
        }
    }

    /// Lazily walk candidate cells for a query feature vector. With
    /// `exhaustive` set, the compatibility filter is bypassed and every
    /// leaf cell is yielded.
    pub fn candidates<'t>(
        &'t self,
        query: &[FeatureValue],
        exhaustive: bool,
    ) -> Candidates<'t> {
        let empty: &'t [(TyId, Cell)] = &[];
        Candidates {
            stack: vec![(self, 0)],
            current: empty.iter(),
            query: query.to_vec(),
            exhaustive,
        }
    }

    /// Visit every cell in the trie, in deterministic order.
    pub fn for_each_cell(&self, f: &mut impl FnMut(&Cell)) {
        match self {
            Trie::Node { children } => {
                for (_, child) in children {
                    child.for_each_cell(f);
                }
            }
            Trie::Leaf { cells } => {
                for (_, cell) in cells {
                    f(cell);
                }
            }
        }
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        let mut n = 0;
        self.for_each_cell(&mut |_| n += 1);
        n
    }

    /// Total number of entries across all cells.
    pub fn entry_count(&self) -> usize {
        let mut n = 0;
        self.for_each_cell(&mut |cell| n += cell.len());
        n
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first candidate walk. Children are pushed in reverse so cells come
/// back in sorted feature-value order.
pub struct Candidates<'t> {
    stack: Vec<(&'t Trie, usize)>,
    current: std::slice::Iter<'t, (TyId, Cell)>,
    query: Vec<FeatureValue>,
    exhaustive: bool,
}

impl<'t> Iterator for Candidates<'t> {
    type Item = (TyId, &'t Cell);

    fn next(&mut self) -> Option<(TyId, &'t Cell)> {
        loop {
            if let Some((ty, cell)) = self.current.next() {
                return Some((*ty, cell));
            }
            let (node, depth) = self.stack.pop()?;
            match node {
                Trie::Leaf { cells } => {
                    self.current = cells.iter();
                }
                Trie::Node { children } => {
                    let feature = FEATURES[depth];
                    for (key, child) in children.iter().rev() {
                        if self.exhaustive || feature.compatible(self.query[depth], *key) {
                            self.stack.push((child, depth + 1));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::feature::feature_vector;
    use crate::path::Path;
    use tysearch_syntax::parse_type;

    fn add(env: &mut Env, trie: &mut Trie, path: &str, src: &str) -> TyId {
        let ty = env.import(&parse_type(src).unwrap());
        let features = feature_vector(env, ty);
        trie.insert(
            &features,
            Info {
                path: Path::parse(path).unwrap(),
                ty,
            },
        );
        ty
    }

    fn candidate_tys(env: &Env, trie: &Trie, query: TyId, exhaustive: bool) -> Vec<TyId> {
        let features = feature_vector(env, query);
        trie.candidates(&features, exhaustive)
            .map(|(ty, _)| ty)
            .collect()
    }

    #[test]
    fn same_type_lands_in_one_cell() {
        let mut env = Env::new();
        let mut trie = Trie::new();
        let a = add(&mut env, &mut trie, "A.f", "int -> int");
        let b = add(&mut env, &mut trie, "B.g", "int -> int");
        assert_eq!(a, b);
        assert_eq!(trie.cell_count(), 1);
        assert_eq!(trie.entry_count(), 2);
    }

    #[test]
    fn filtered_walk_prunes_incompatible_heads() {
        let mut env = Env::new();
        let mut trie = Trie::new();
        add(&mut env, &mut trie, "A.zero", "int");
        let arrow = add(&mut env, &mut trie, "A.succ", "int -> int");

        let query = env.import(&parse_type("'q -> 'q").unwrap());
        let tys = candidate_tys(&env, &trie, query, false);
        assert_eq!(tys, vec![arrow], "the plain `int` entry must be pruned");
    }

    #[test]
    fn var_entries_survive_every_filter() {
        let mut env = Env::new();
        let mut trie = Trie::new();
        let var_entry = add(&mut env, &mut trie, "A.any", "'a");

        for q in ["int", "int -> int", "int * string", "'x -> 'y"] {
            let query = env.import(&parse_type(q).unwrap());
            let tys = candidate_tys(&env, &trie, query, false);
            assert!(
                tys.contains(&var_entry),
                "query `{q}` must still see the bare-variable entry"
            );
        }
    }

    #[test]
    fn exhaustive_walk_sees_everything() {
        let mut env = Env::new();
        let mut trie = Trie::new();
        add(&mut env, &mut trie, "A.zero", "int");
        add(&mut env, &mut trie, "A.succ", "int -> int");
        add(&mut env, &mut trie, "A.pair", "int * int");

        let query = env.import(&parse_type("string").unwrap());
        let filtered = candidate_tys(&env, &trie, query, false);
        let exhaustive = candidate_tys(&env, &trie, query, true);
        assert_eq!(exhaustive.len(), 3);
        assert!(filtered.len() < exhaustive.len());
    }

    #[test]
    fn walk_order_is_deterministic() {
        let mut env = Env::new();
        let mut trie = Trie::new();
        add(&mut env, &mut trie, "A.a", "int");
        add(&mut env, &mut trie, "A.b", "int -> int");
        add(&mut env, &mut trie, "A.c", "'v");

        let query = env.import(&parse_type("int").unwrap());
        let first = candidate_tys(&env, &trie, query, true);
        let second = candidate_tys(&env, &trie, query, true);
        assert_eq!(first, second);
    }

    #[test]
    fn round_trips_through_serde() {
        let mut env = Env::new();
        let mut trie = Trie::new();
        add(&mut env, &mut trie, "A.f", "int -> int");
        add(&mut env, &mut trie, "B.g", "'a list -> int");

        let json = serde_json::to_string(&trie).unwrap();
        let loaded: Trie = serde_json::from_str(&json).unwrap();
        assert_eq!(trie, loaded);
    }
}
