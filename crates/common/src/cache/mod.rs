//! Durable, scoped, TTL-aware key/value cache
//!
//! A single SQLite file holds every entry. Keys are ordered segment tuples;
//! a [`CacheScope`] is a cheap view rooted at a path prefix, and child
//! scopes compose by path concatenation without ever seeing entries outside
//! their prefix. Entries may carry a per-entry expiry; reading past it
//! behaves as if the entry were absent.
//!
//! The store's connection handle is reference-counted: concurrent logical
//! operations share one open connection and the last release closes it.
//! This is an optimization over SQLite's non-trivial open cost, not a
//! correctness requirement.
//!
//! Values are JSON documents (de)serialized through explicit serde schemas,
//! validated on every read.

mod scope;
mod store;

pub use scope::{CacheEntry, CacheScope};
pub use store::KvStore;

use crate::error::{AgentboxError, Result};

/// Separator byte used to encode key paths into a single sortable string.
/// Segments must not contain it; prefix range scans rely on that.
pub(crate) const PATH_SEPARATOR: char = '\u{1f}';

/// An ordered sequence of namespace segments addressing a cache entry
/// or scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPath(pub Vec<String>);

impl KeyPath {
    /// Segments of this path, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Concatenate `other` onto this path.
    #[must_use]
    pub fn join(&self, other: &KeyPath) -> KeyPath {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        KeyPath(segments)
    }

    /// Encode into the sortable string form used as the SQLite primary key.
    ///
    /// # Errors
    /// `InvalidInput` if any segment contains the reserved separator.
    pub(crate) fn encode(&self) -> Result<String> {
        for segment in &self.0 {
            if segment.contains(PATH_SEPARATOR) {
                return Err(AgentboxError::InvalidInput(format!(
                    "cache key segment {segment:?} contains the reserved separator"
                )));
            }
        }
        Ok(self.0.join(&PATH_SEPARATOR.to_string()))
    }

    pub(crate) fn decode(encoded: &str) -> KeyPath {
        if encoded.is_empty() {
            return KeyPath(Vec::new());
        }
        KeyPath(encoded.split(PATH_SEPARATOR).map(str::to_string).collect())
    }
}

impl From<&str> for KeyPath {
    fn from(segment: &str) -> Self {
        KeyPath(vec![segment.to_string()])
    }
}

impl From<String> for KeyPath {
    fn from(segment: String) -> Self {
        KeyPath(vec![segment])
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(segments: Vec<String>) -> Self {
        KeyPath(segments)
    }
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        KeyPath(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(segments: [&str; N]) -> Self {
        KeyPath(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_round_trips() {
        let path: KeyPath = ["users", "jane", "auth"].into();
        let encoded = path.encode().unwrap();
        assert_eq!(KeyPath::decode(&encoded), path);
    }

    #[test]
    fn empty_path_encodes_empty() {
        let path = KeyPath::default();
        assert_eq!(path.encode().unwrap(), "");
        assert_eq!(KeyPath::decode(""), path);
    }

    #[test]
    fn separator_in_segment_is_rejected() {
        let path = KeyPath(vec![format!("bad{}segment", PATH_SEPARATOR)]);
        assert!(matches!(path.encode(), Err(AgentboxError::InvalidInput(_))));
    }

    #[test]
    fn join_concatenates_in_order() {
        let base: KeyPath = "session".into();
        let child = base.join(&"auth".into());
        assert_eq!(child.segments(), ["session".to_string(), "auth".to_string()]);
    }
}
