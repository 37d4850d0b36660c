//! Dotted namespace paths.
//!
//! Paths identify functors, variables, actions, and belief-view walks.
//! A path is an ordered list of non-empty segments rendered with a `.`
//! separator (`org.example.temperature`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Segment separator used in the textual form.
pub const SEPARATOR: char = '.';

/// A dotted namespace path.
///
/// # Examples
///
/// ```
/// use noema::Path;
///
/// let path = Path::from("beliefs.env.temperature");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.suffix(), Some("temperature"));
/// assert!(path.starts_with(&Path::from("beliefs.env")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Creates an empty path. Only the root belief view uses this.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Creates a path from an iterator of segments, skipping empty ones.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The final segment, the local name of the element.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The leading segment.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// All segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    /// Returns a new path with the segment appended.
    #[must_use]
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Returns a new path with all of `other` appended.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Returns the path without its final segment.
    #[must_use]
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Returns true if `prefix` is a leading sub-path of this path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Returns the path with the leading `prefix` removed, or `None` if the
    /// prefix does not match.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self::from_segments(value.split(SEPARATOR))
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_from_str() {
        let path = Path::from("a.b.c");
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), Some("a"));
        assert_eq!(path.suffix(), Some("c"));
    }

    #[test]
    fn test_path_empty_segments_skipped() {
        let path = Path::from("a..b");
        assert_eq!(path.len(), 2);
        assert_eq!(format!("{path}"), "a.b");
    }

    #[test]
    fn test_path_empty() {
        let path = Path::empty();
        assert!(path.is_empty());
        assert_eq!(path.suffix(), None);
    }

    #[test]
    fn test_path_append_does_not_mutate() {
        let base = Path::from("a");
        let extended = base.append("b");
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(format!("{extended}"), "a.b");
    }

    #[test]
    fn test_path_starts_with() {
        let path = Path::from("a.b.c");
        assert!(path.starts_with(&Path::from("a")));
        assert!(path.starts_with(&Path::from("a.b")));
        assert!(path.starts_with(&path));
        assert!(!path.starts_with(&Path::from("b")));
        assert!(path.starts_with(&Path::empty()));
    }

    #[test]
    fn test_path_strip_prefix() {
        let path = Path::from("a.b.c");
        assert_eq!(path.strip_prefix(&Path::from("a.b")), Some(Path::from("c")));
        assert_eq!(path.strip_prefix(&Path::from("x")), None);
    }

    #[test]
    fn test_path_parent() {
        assert_eq!(Path::from("a.b.c").parent(), Path::from("a.b"));
        assert_eq!(Path::from("a").parent(), Path::empty());
    }

    #[test]
    fn test_path_ordering() {
        assert!(Path::from("a.a") < Path::from("a.b"));
        assert!(Path::from("a") < Path::from("a.a"));
    }

    #[test]
    fn test_path_serialization() {
        let path = Path::from("a.b");
        let json = serde_json::to_string(&path).unwrap();
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(path, back);
    }
}
