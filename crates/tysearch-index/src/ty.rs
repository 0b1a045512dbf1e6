//! The canonical type term representation.
//!
//! Defines the hash-consed term sum [`Ty`], the handle types [`TyId`] and
//! [`VarId`], and the [`Kind`] discriminant whose derived ordering
//! (`Var < Constr < Arrow < Tuple < Other`) is the cross-variant tie-break
//! for the structural total order on terms.
//!
//! Terms are built exclusively through the smart constructors on
//! [`Env`](crate::env::Env), which enforce the canonical form: arrows are
//! uncurried with a sorted argument multiset and a non-arrow return, tuples
//! are flat sorted multisets with no singleton form, and `unit` applied to
//! nothing is the empty tuple.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::path::Path;

/// A type variable identity. Names are metadata kept in the environment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VarId(pub u32);

/// A handle to an interned canonical term.
///
/// Handles are stable indices into the owning environment's arena. Two
/// canonical terms from the same environment are equal iff their handles
/// are; handle order is insertion order, a stable tag independent of the
/// structural comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TyId(pub(crate) u32);

impl TyId {
    /// The handle's raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Argument storage for constructors, arrows and tuples. Most types in
/// practice have very few children.
pub type TyArgs = SmallVec<[TyId; 4]>;

/// The five term shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    /// A type variable.
    Var(VarId),
    /// A named constructor applied to an ordered argument list.
    Constr(Path, TyArgs),
    /// An arrow. The argument multiset is sorted by the structural order and
    /// never empty; the return is never itself an arrow.
    Arrow(TyArgs, TyId),
    /// A tuple. The component multiset is sorted, flat, and never a
    /// singleton; the empty tuple is `unit`.
    Tuple(TyArgs),
    /// An opaque token for shapes the index does not interpret. Two `Other`
    /// terms are equal iff their hashes are.
    Other(u64),
}

/// The kind of a term's root node. The derived order is the cross-variant
/// tie-break of the structural total order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Kind {
    Var,
    Constr,
    Arrow,
    Tuple,
    Other,
}

impl Ty {
    /// The kind of this term's root node.
    pub fn kind(&self) -> Kind {
        match self {
            Ty::Var(_) => Kind::Var,
            Ty::Constr(..) => Kind::Constr,
            Ty::Arrow(..) => Kind::Arrow,
            Ty::Tuple(_) => Kind::Tuple,
            Ty::Other(_) => Kind::Other,
        }
    }
}
