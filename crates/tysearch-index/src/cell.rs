//! Info entries and the cells that group them.
//!
//! A [`Cell`] is a leaf bucket of the feature trie: every entry in it has
//! the same canonical type. Presentation collapses re-exports — the same
//! function reachable under several paths — down to one representative per
//! humanised name, pruning library-internal aliases when a public path
//! exists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::path::Path;
use crate::ty::TyId;

/// One indexed library entry: a qualified name and its canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub path: Path,
    pub ty: TyId,
}

/// The entries sharing one canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    ty: TyId,
    /// Entries sorted by path; exact duplicates are kept out.
    entries: Vec<Info>,
}

impl Cell {
    pub(crate) fn new(ty: TyId) -> Self {
        Cell {
            ty,
            entries: Vec::new(),
        }
    }

    /// The canonical type every entry in this cell shares.
    pub fn ty(&self) -> TyId {
        self.ty
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> &[Info] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn add(&mut self, info: Info) {
        debug_assert_eq!(info.ty, self.ty, "cell entries must share the cell type");
        match self.entries.binary_search_by(|e| e.path.cmp(&info.path)) {
            Ok(_) => {}
            Err(idx) => self.entries.insert(idx, info),
        }
    }

    /// One representative entry per humanised name.
    ///
    /// Entries whose last segment humanises identically are treated as
    /// re-exports of one value. Internal paths (a segment containing `__`)
    /// are pruned from a group whenever a non-internal path exists; the
    /// representative is the smallest remaining path under the segment-wise
    /// path order. Groups come back sorted by humanised name.
    pub fn representatives(&self) -> Vec<&Info> {
        let mut groups: BTreeMap<String, Vec<&Info>> = BTreeMap::new();
        for info in &self.entries {
            groups
                .entry(info.path.humanised_name())
                .or_default()
                .push(info);
        }
        groups
            .into_values()
            .map(|group| {
                let any_public = group.iter().any(|i| !i.path.is_internal());
                group
                    .into_iter()
                    .filter(|i| !any_public || !i.path.is_internal())
                    .min_by_key(|i| &i.path)
                    .expect("every group is non-empty")
            })
            .collect()
    }
}
