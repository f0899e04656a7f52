use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::database::error::{invalid_argument, DatabaseResult};

use super::child_key::ChildKey;

/// Immutable location inside the data tree.
///
/// Segments are shared between a path and every path derived from it with
/// [`Path::pop_front`], so walking down a path never copies it.
#[derive(Clone)]
pub struct Path {
    segments: Arc<[ChildKey]>,
    start: usize,
}

impl Path {
    pub fn root() -> Self {
        Self {
            segments: Arc::from(Vec::new()),
            start: 0,
        }
    }

    /// Parses a slash separated path such as `"users/alice/name"`.
    ///
    /// Leading and trailing slashes are ignored. Empty segments and keys that
    /// contain `.`, `#`, `$`, `[` or `]` (other than `.priority`) are rejected.
    pub fn parse(path: &str) -> DatabaseResult<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(invalid_argument(
                    "Database path cannot contain empty segments",
                ));
            }
            if segment != ".priority" && segment.contains(['.', '#', '$', '[', ']']) {
                return Err(invalid_argument(format!(
                    "Path segment \"{segment}\" contains one of the illegal characters '.', '#', '$', '[' or ']'"
                )));
            }
            segments.push(ChildKey::new(segment));
        }
        Ok(Self::from_keys(segments))
    }

    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = ChildKey>,
    {
        let segments: Vec<ChildKey> = keys.into_iter().collect();
        Self {
            segments: Arc::from(segments),
            start: 0,
        }
    }

    fn keys(&self) -> &[ChildKey] {
        &self.segments[self.start..]
    }

    pub fn len(&self) -> usize {
        self.segments.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn front(&self) -> Option<&ChildKey> {
        self.keys().first()
    }

    pub fn back(&self) -> Option<&ChildKey> {
        self.keys().last()
    }

    pub fn pop_front(&self) -> Self {
        Self {
            segments: Arc::clone(&self.segments),
            start: (self.start + 1).min(self.segments.len()),
        }
    }

    /// Parent location; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let keys = self.keys();
        if keys.is_empty() {
            return None;
        }
        Some(Self::from_keys(keys[..keys.len() - 1].iter().cloned()))
    }

    pub fn child(&self, key: &ChildKey) -> Self {
        Self::from_keys(self.keys().iter().cloned().chain(Some(key.clone())))
    }

    pub fn child_path(&self, other: &Path) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        Self::from_keys(self.keys().iter().chain(other.keys()).cloned())
    }

    /// `true` when `other` equals this path or lies below it.
    pub fn contains(&self, other: &Path) -> bool {
        let ours = self.keys();
        let theirs = other.keys();
        ours.len() <= theirs.len() && ours.iter().zip(theirs).all(|(a, b)| a == b)
    }

    /// Path of `inner` relative to `outer`; `None` unless `outer` contains `inner`.
    pub fn relative(outer: &Path, inner: &Path) -> Option<Path> {
        if !outer.contains(inner) {
            return None;
        }
        Some(Self {
            segments: Arc::clone(&inner.segments),
            start: inner.start + outer.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildKey> {
        self.keys().iter()
    }

    /// Slash separated form without a leading slash, as used in query definitions.
    pub fn wire_format(&self) -> String {
        self.keys()
            .iter()
            .map(ChildKey::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.keys() == other.keys()
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.keys().hash(state);
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.keys().cmp(other.keys())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("/");
        }
        for key in self.keys() {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl From<ChildKey> for Path {
    fn from(key: ChildKey) -> Self {
        Self::from_keys(Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(value: &str) -> Path {
        Path::parse(value).unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(path("/a/b/c/").to_string(), "/a/b/c");
        assert_eq!(path("").to_string(), "/");
        assert_eq!(path("a/b").wire_format(), "a/b");
        assert!(Path::parse("a//b").is_err());
        assert!(Path::parse("a/b.c").is_err());
        assert!(Path::parse("a/.priority").is_ok());
    }

    #[test]
    fn navigation() {
        let p = path("a/b/c");
        assert_eq!(p.front(), Some(&ChildKey::new("a")));
        assert_eq!(p.back(), Some(&ChildKey::new("c")));
        assert_eq!(p.pop_front(), path("b/c"));
        assert_eq!(p.pop_front().pop_front().pop_front(), Path::root());
        assert_eq!(p.parent(), Some(path("a/b")));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(path("a").child(&ChildKey::new("b")), path("a/b"));
        assert_eq!(path("a").child_path(&path("b/c")), p);
    }

    #[test]
    fn containment_and_relative_paths() {
        let outer = path("a/b");
        let inner = path("a/b/c/d");
        assert!(outer.contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!inner.contains(&outer));
        assert!(Path::root().contains(&inner));
        assert_eq!(Path::relative(&outer, &inner), Some(path("c/d")));
        assert_eq!(Path::relative(&inner, &outer), None);
        assert_eq!(Path::relative(&outer, &outer), Some(Path::root()));
    }

    #[test]
    fn equality_ignores_shared_prefix() {
        let shared = path("x/a/b").pop_front();
        assert_eq!(shared, path("a/b"));
        let mut set = std::collections::HashSet::new();
        set.insert(shared);
        assert!(set.contains(&path("a/b")));
    }
}
