//! The index facade: build, query, rank, save, load.
//!
//! An [`Index`] is a snapshot: the environment that owns every indexed
//! term, the feature trie over the entries, and the set of packages seen
//! during the build. Queries import their type into the same environment,
//! walk the trie for candidate cells, unify against each cell's type, and
//! rank the survivors by unifier specificity, then by type order.
//!
//! The persisted form is one file: a `tysearch-index <version>` magic line
//! followed by a JSON body. `load(save(idx))` answers every query the way
//! `idx` does.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write as _;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use tysearch_syntax::TypeExpr;

use crate::cell::{Cell, Info};
use crate::env::Env;
use crate::error::IndexError;
use crate::feature::feature_vector;
use crate::path::Path;
use crate::subst::Subst;
use crate::trie::{Candidates, Trie};
use crate::ty::TyId;
use crate::unify::unify;

/// First token of the persisted file's magic line.
pub const MAGIC: &str = "tysearch-index";
/// Persisted format version. Bumped on any incompatible change.
pub const VERSION: u32 = 1;

/// A built, queryable index of `(path, type)` entries.
#[derive(Debug, Serialize, Deserialize)]
pub struct Index {
    env: Env,
    trie: Trie,
    /// First segments of every indexed path, for package-filter validation.
    packages: BTreeSet<String>,
}

/// Knobs for [`Index::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Bypass feature filtering and unify against every cell.
    pub exhaustive: bool,
    /// Keep at most this many results. `Some(0)` yields nothing.
    pub limit: Option<usize>,
    /// Restrict results to entries whose package is in this list. Empty
    /// means no restriction; naming a package the index has never seen is
    /// an error.
    pub packages: Vec<String>,
}

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: Path,
    /// The entry's canonical type.
    pub ty: TyId,
    /// The unifier that matched it against the query.
    pub subst: Subst,
}

impl Index {
    /// Build an index from a finite stream of entries.
    ///
    /// Each surface type is imported through the smart constructors into a
    /// fresh environment; entries sharing a canonical type share a cell.
    pub fn build(entries: impl IntoIterator<Item = (Path, TypeExpr)>) -> Index {
        let mut env = Env::new();
        let mut trie = Trie::new();
        let mut packages = BTreeSet::new();
        let mut count = 0usize;
        for (path, expr) in entries {
            let ty = env.import(&expr);
            let features = feature_vector(&env, ty);
            packages.insert(path.package().to_string());
            trie.insert(&features, Info { path, ty });
            count += 1;
        }
        tracing::debug!(
            entries = count,
            terms = env.term_count(),
            cells = trie.cell_count(),
            "index built"
        );
        Index {
            env,
            trie,
            packages,
        }
    }

    /// The environment owning every indexed term. Query types must be
    /// imported through it.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Import a query expression into this index's environment.
    pub fn import_query(&mut self, expr: &TypeExpr) -> TyId {
        self.env.import(expr)
    }

    /// Lazy stream of `(type, cell, unifier)` triples, visiting every cell.
    pub fn find(&mut self, query: TyId) -> Matches<'_> {
        self.matches(query, true)
    }

    /// Lazy stream of `(type, cell, unifier)` triples, visiting only cells
    /// the feature filter cannot rule out.
    pub fn find_with(&mut self, query: TyId) -> Matches<'_> {
        self.matches(query, false)
    }

    fn matches(&mut self, query: TyId, exhaustive: bool) -> Matches<'_> {
        let features = feature_vector(&self.env, query);
        let candidates = self.trie.candidates(&features, exhaustive);
        Matches {
            env: &mut self.env,
            candidates,
            query,
        }
    }

    /// Ranked search: candidates, unification, specificity sort, cell
    /// expansion, package filter, limit.
    pub fn search(
        &mut self,
        query: TyId,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if !opts.packages.is_empty() {
            let unknown: Vec<String> = opts
                .packages
                .iter()
                .filter(|p| !self.packages.contains(p.as_str()))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(IndexError::UnknownPackage { packages: unknown });
            }
        }

        let features = feature_vector(&self.env, query);
        let candidates = self.trie.candidates(&features, opts.exhaustive);
        let env = &mut self.env;
        let mut hits: Vec<(TyId, &Cell, Subst)> = Vec::new();
        for (ty, cell) in candidates {
            if let Some(subst) = unify(env, ty, query) {
                hits.push((ty, cell, subst));
            }
        }
        tracing::debug!(hits = hits.len(), exhaustive = opts.exhaustive, "query matched");

        let env = &self.env;
        hits.sort_by(|a, b| {
            Subst::compare(env, &a.2, &b.2).then_with(|| env.cmp_ty(a.0, b.0))
        });

        let mut results = Vec::new();
        'hits: for (ty, cell, subst) in hits {
            for info in cell.representatives() {
                if !opts.packages.is_empty()
                    && !opts.packages.iter().any(|p| p == info.path.package())
                {
                    continue;
                }
                if opts.limit.is_some_and(|n| results.len() >= n) {
                    break 'hits;
                }
                results.push(SearchResult {
                    path: info.path.clone(),
                    ty,
                    subst: subst.clone(),
                });
            }
        }
        Ok(results)
    }

    /// Visit every indexed entry.
    pub fn iter(&self, mut f: impl FnMut(&Info)) {
        self.trie.for_each_cell(&mut |cell| {
            for info in cell.entries() {
                f(info);
            }
        });
    }

    /// Number of indexed entries.
    pub fn entry_count(&self) -> usize {
        self.trie.entry_count()
    }

    /// Number of distinct canonical types.
    pub fn cell_count(&self) -> usize {
        self.trie.cell_count()
    }

    /// Number of interned terms in the environment.
    pub fn term_count(&self) -> usize {
        self.env.term_count()
    }

    /// Packages seen during the build, sorted.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(String::as_str)
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Write the index to a file: magic line, then the JSON body.
    pub fn save(&self, path: &FsPath) -> Result<(), IndexError> {
        let io_err = |source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        let body = serde_json::to_string(self).map_err(|e| IndexError::Codec {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut file = fs::File::create(path).map_err(io_err)?;
        writeln!(file, "{MAGIC} {VERSION}").map_err(io_err)?;
        file.write_all(body.as_bytes()).map_err(io_err)?;
        Ok(())
    }

    /// Read an index back from a file written by [`Index::save`].
    pub fn load(path: &FsPath) -> Result<Index, IndexError> {
        let text = fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let codec = |message: String| IndexError::Codec {
            path: path.to_path_buf(),
            message,
        };
        let (header, body) = text
            .split_once('\n')
            .ok_or_else(|| codec("missing header line".to_string()))?;
        let expected = format!("{MAGIC} {VERSION}");
        if header.trim_end() != expected {
            return Err(codec(format!(
                "unsupported header `{header}` (expected `{expected}`)"
            )));
        }
        let mut index: Index = serde_json::from_str(body).map_err(|e| codec(e.to_string()))?;
        index.env.restore();
        tracing::debug!(
            entries = index.entry_count(),
            terms = index.term_count(),
            "index loaded"
        );
        Ok(index)
    }
}

/// Lazy stream of matches for one query.
pub struct Matches<'a> {
    env: &'a mut Env,
    candidates: Candidates<'a>,
    query: TyId,
}

/// One match: the cell's type, the cell, and the smallest unifier.
pub struct Match<'a> {
    pub ty: TyId,
    pub cell: &'a Cell,
    pub subst: Subst,
}

impl<'a> Iterator for Matches<'a> {
    type Item = Match<'a>;

    fn next(&mut self) -> Option<Match<'a>> {
        for (ty, cell) in self.candidates.by_ref() {
            if let Some(subst) = unify(self.env, ty, self.query) {
                return Some(Match { ty, cell, subst });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tysearch_syntax::parse_type;

    fn entry(path: &str, ty: &str) -> (Path, TypeExpr) {
        (Path::parse(path).unwrap(), parse_type(ty).unwrap())
    }

    fn small_index() -> Index {
        Index::build(vec![
            entry("Std.id", "'a -> 'a"),
            entry("Std.succ", "int -> int"),
            entry("Std.plus", "int -> int -> int"),
            entry("List.map", "('a -> 'b) -> 'a list -> 'b list"),
            entry("List.length", "'a list -> int"),
        ])
    }

    fn query(index: &mut Index, src: &str) -> TyId {
        index.import_query(&parse_type(src).unwrap())
    }

    #[test]
    fn exact_match_ranks_before_instantiated_match() {
        let mut index = small_index();
        let q = query(&mut index, "int -> int");
        let results = index.search(q, &SearchOptions::default()).unwrap();
        let paths: Vec<String> = results.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["Std.succ", "Std.id"]);
        assert!(results[0].subst.is_empty());
        assert_eq!(results[1].subst.len(), 1);
    }

    #[test]
    fn filtered_and_exhaustive_agree_on_matches() {
        let mut index = small_index();
        for q_src in ["int -> int", "'x list -> int", "'a -> 'b -> 'c"] {
            let q = query(&mut index, q_src);
            let filtered = index
                .search(q, &SearchOptions::default())
                .unwrap()
                .iter()
                .map(|r| r.path.to_string())
                .collect::<Vec<_>>();
            let exhaustive = index
                .search(
                    q,
                    &SearchOptions {
                        exhaustive: true,
                        ..Default::default()
                    },
                )
                .unwrap()
                .iter()
                .map(|r| r.path.to_string())
                .collect::<Vec<_>>();
            assert_eq!(filtered, exhaustive, "query `{q_src}`");
        }
    }

    #[test]
    fn package_filter_restricts_results() {
        let mut index = small_index();
        let q = query(&mut index, "'q -> 'r");
        let opts = SearchOptions {
            packages: vec!["List".to_string()],
            ..Default::default()
        };
        let results = index.search(q, &opts).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.path.package() == "List"));
    }

    #[test]
    fn unknown_package_is_an_error() {
        let mut index = small_index();
        let q = query(&mut index, "int");
        let opts = SearchOptions {
            packages: vec!["Nonexistent".to_string()],
            ..Default::default()
        };
        match index.search(q, &opts) {
            Err(IndexError::UnknownPackage { packages }) => {
                assert_eq!(packages, vec!["Nonexistent".to_string()]);
            }
            other => panic!("expected UnknownPackage, got {other:?}"),
        }
    }

    #[test]
    fn limit_truncates_and_zero_means_nothing() {
        let mut index = small_index();
        let q = query(&mut index, "'q -> 'r");
        let all = index.search(q, &SearchOptions::default()).unwrap();
        assert!(all.len() > 2);

        let two = index
            .search(
                q,
                &SearchOptions {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(two.len(), 2);

        let none = index
            .search(
                q,
                &SearchOptions {
                    limit: Some(0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn empty_index_yields_empty_results() {
        let mut index = Index::build(Vec::new());
        let q = query(&mut index, "int -> int");
        let results = index.search(q, &SearchOptions::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn find_yields_triples_that_unify() {
        let mut index = small_index();
        let q = query(&mut index, "int -> int");
        let count = index.find(q).count();
        assert!(count >= 2, "id and succ should both match, got {count}");
    }

    #[test]
    fn iter_visits_every_entry() {
        let index = small_index();
        let mut n = 0;
        index.iter(|_| n += 1);
        assert_eq!(n, 5);
        assert_eq!(index.entry_count(), 5);
    }
}
