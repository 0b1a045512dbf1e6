//! Dotted qualified names identifying library entries.
//!
//! A [`Path`] is a non-empty sequence of segments: `Dequeue.push`,
//! `Stdlib.List.map`. The first segment names the package the entry belongs
//! to; the last segment is the value's own name. Paths compare and hash
//! segment-wise, and support the humanised comparison used to collapse
//! re-exports of one function under several names.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A dotted qualified name. Always has at least one segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path {
    segments: SmallVec<[String; 4]>,
}

impl Path {
    /// Build a path from its segments.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    pub fn new(segments: impl IntoIterator<Item = String>) -> Self {
        let segments: SmallVec<[String; 4]> = segments.into_iter().collect();
        assert!(!segments.is_empty(), "a path must have at least one segment");
        Self { segments }
    }

    /// Parse a dotted name like `Stdlib.List.map`.
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.is_empty() {
            return Err("empty path".to_string());
        }
        let mut segments = SmallVec::new();
        for seg in text.split('.') {
            if seg.is_empty() {
                return Err(format!("empty segment in path `{text}`"));
            }
            segments.push(seg.to_string());
        }
        Ok(Self { segments })
    }

    /// The path's segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The package this path belongs to: its first segment.
    pub fn package(&self) -> &str {
        &self.segments[0]
    }

    /// The value's own name: the last segment.
    pub fn name(&self) -> &str {
        self.segments.last().expect("paths are non-empty")
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Paths are never empty; this exists for the usual pairing with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether this path is library-internal: any segment contains `__`.
    pub fn is_internal(&self) -> bool {
        self.segments.iter().any(|s| s.contains("__"))
    }

    /// The humanised form of the value's name: lowercase, underscores
    /// stripped. `Fold_Left`, `fold_left` and `foldleft` all humanise to
    /// `foldleft`, which is what lets re-exports of one function collapse.
    pub fn humanised_name(&self) -> String {
        self.name()
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
