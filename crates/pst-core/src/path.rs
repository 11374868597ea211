//! Structural paths into the document tree.
//!
//! A path is a sequence of container descents: an `Index` steps into a list,
//! a `Key` steps into a map. The type of the final segment decides whether an
//! operation targets a list slot or a map entry.

use serde::{Deserialize, Serialize};

/// One step of a path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// List index (also used for character offsets into text).
    Index(usize),
    /// Map key (attribute names, document sections).
    Key(String),
}

impl PathSegment {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(_) => None,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            PathSegment::Index(_) => None,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, PathSegment::Key(_))
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

impl From<&str> for PathSegment {
    fn from(k: &str) -> Self {
        PathSegment::Key(k.to_string())
    }
}

/// A path into the document, serialized as a plain array of indices and keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath(Vec<PathSegment>);

impl TreePath {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Build an all-index path, the common case for DOM addresses.
    pub fn from_indices(indices: &[usize]) -> Self {
        Self(indices.iter().map(|&i| PathSegment::Index(i)).collect())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&PathSegment> {
        self.0.get(i)
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// The trailing segment as a list index, if it is one.
    pub fn last_index(&self) -> Option<usize> {
        self.0.last().and_then(PathSegment::as_index)
    }

    /// Mutable access to the trailing index. `None` when the path is empty or
    /// ends in a key.
    pub fn last_index_mut(&mut self) -> Option<&mut usize> {
        match self.0.last_mut() {
            Some(PathSegment::Index(i)) => Some(i),
            _ => None,
        }
    }

    /// Mutable access to the index at position `i`.
    pub fn index_mut(&mut self, i: usize) -> Option<&mut usize> {
        match self.0.get_mut(i) {
            Some(PathSegment::Index(idx)) => Some(idx),
            _ => None,
        }
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut p = self.clone();
        p.push(segment);
        p
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Drop the leading segment, returning it. Used when routing a patch by
    /// its document section.
    pub fn split_first(&self) -> Option<(&PathSegment, TreePath)> {
        self.0
            .split_first()
            .map(|(head, rest)| (head, TreePath(rest.to_vec())))
    }

    /// True when `other` agrees with this path on every segment but the last
    /// one of `other`. This is the "shares the same ancestor prefix" test the
    /// consolidation pass uses to decide whether a forward delete or insert
    /// can shift a search path.
    pub fn shares_prefix_of(&self, other: &TreePath) -> bool {
        if other.len() == 0 || other.len() > self.len() + 1 {
            return false;
        }
        other.0[..other.len() - 1]
            .iter()
            .zip(self.0.iter())
            .all(|(a, b)| a == b)
    }
}

impl std::fmt::Display for TreePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: Vec<String> = self.0.iter().map(|seg| seg.to_string()).collect();
        write!(f, "[{}]", s.join(","))
    }
}

impl From<Vec<PathSegment>> for TreePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let path = TreePath::new(vec![5.into(), 2.into(), "class".into()]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"[5,2,"class"]"#);
        let back: TreePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_last_index() {
        let mut path = TreePath::from_indices(&[4, 5, 4]);
        assert_eq!(path.last_index(), Some(4));
        *path.last_index_mut().unwrap() += 2;
        assert_eq!(path, TreePath::from_indices(&[4, 5, 6]));

        let keyed = TreePath::new(vec![2.into(), "foo".into()]);
        assert_eq!(keyed.last_index(), None);
        assert!(keyed.last().unwrap().is_key());
    }

    #[test]
    fn test_shares_prefix_of() {
        let search = TreePath::from_indices(&[4, 5, 4]);
        // del at [4,3] agrees on the prefix [4]
        assert!(search.shares_prefix_of(&TreePath::from_indices(&[4, 3])));
        // del at [7,3] does not
        assert!(!search.shares_prefix_of(&TreePath::from_indices(&[7, 3])));
        // a longer sibling path still counts when the prefix matches
        assert!(search.shares_prefix_of(&TreePath::from_indices(&[4, 5, 4, 0])));
        // too deep to be relevant
        assert!(!search.shares_prefix_of(&TreePath::from_indices(&[4, 5, 4, 0, 0])));
    }

    #[test]
    fn test_split_first() {
        let path = TreePath::new(vec!["dom".into(), 5.into(), 2.into()]);
        let (head, rest) = path.split_first().unwrap();
        assert_eq!(head.as_key(), Some("dom"));
        assert_eq!(rest, TreePath::from_indices(&[5, 2]));
    }
}
