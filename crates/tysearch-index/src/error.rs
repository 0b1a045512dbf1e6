use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failures that cross the index boundary.
///
/// Internal conditions — a failed unification branch, a trie miss, an empty
/// result stream — are not errors; they are ordinary empty outcomes. Only
/// file I/O, a malformed index file, and an unknown package filter surface
/// here.
#[derive(Debug)]
pub enum IndexError {
    /// The index file could not be read or written.
    Io { path: PathBuf, source: io::Error },
    /// The index file exists but its contents could not be understood
    /// (bad magic, wrong version, or a serialization failure).
    Codec { path: PathBuf, message: String },
    /// A package filter named packages the index has never seen.
    UnknownPackage { packages: Vec<String> },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "index file `{}`: {}", path.display(), source)
            }
            Self::Codec { path, message } => {
                write!(f, "malformed index file `{}`: {}", path.display(), message)
            }
            Self::UnknownPackage { packages } => {
                write!(f, "unknown package: {}", packages.join(", "))
            }
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
