//! Path patterns and the lazy node enumerator.
//!
//! A pattern is a slash-delimited sequence whose leading, wildcard-free
//! prefix anchors it to the filesystem (a directory, region file, or NBT
//! file); the remaining segments match node path segments, with `*`
//! matching any one segment. Enumeration walks depth-first in
//! child-insertion order and expands nodes strictly on demand, so no
//! subtree outside the pattern's reach is ever parsed.

use std::path::{Path, PathBuf};

use crate::{Error, NodeId, NodeTree, PathError};

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Matcher {
    Literal(String),
    Any,
}

impl Matcher {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Matcher::Literal(literal) => literal == segment,
            Matcher::Any => true,
        }
    }
}

/// A parsed path pattern: filesystem root plus segment matchers.
#[derive(Clone, Debug)]
pub struct PathQuery {
    root: PathBuf,
    matchers: Vec<Matcher>,
}

impl PathQuery {
    /// Split `pattern` into its longest existing filesystem prefix and the
    /// remaining segment matchers.
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        if pattern.is_empty() {
            return Err(PathError::EmptyPattern);
        }
        let segments: Vec<&str> = pattern.split('/').collect();

        let mut root: Option<(usize, PathBuf)> = None;
        for end in 1..=segments.len() {
            if segments[end - 1] == "*" {
                break;
            }
            let candidate = segments[..end].join("/");
            let candidate = if candidate.is_empty() {
                // A leading slash: the pattern is absolute.
                PathBuf::from("/")
            } else {
                PathBuf::from(candidate)
            };
            if candidate.is_dir() {
                root = Some((end, candidate));
            } else if candidate.is_file() {
                root = Some((end, candidate));
                break;
            }
        }
        let Some((consumed, root)) = root else {
            return Err(PathError::UnresolvedRoot(pattern.to_string()));
        };

        let matchers = segments[consumed..]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| {
                if *s == "*" {
                    Matcher::Any
                } else {
                    Matcher::Literal(s.to_string())
                }
            })
            .collect();
        Ok(Self { root, matchers })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Open the root and enumerate matching nodes out of `tree`.
    pub fn enumerate<'a>(&self, tree: &'a mut NodeTree) -> Result<PathEnumerator<'a>, Error> {
        let root = tree.open_root(&self.root)?;
        Ok(PathEnumerator {
            tree,
            matchers: self.matchers.clone(),
            stack: vec![(root, 0)],
        })
    }
}

/// One enumeration step: a node whose path matched the pattern, or a node
/// that matched so far but could not be expanded to continue the walk.
pub enum Visited {
    Matched(NodeId),
    Unreadable(NodeId, Error),
}

/// Lazy, finite, non-restartable depth-first walk of pattern matches.
pub struct PathEnumerator<'a> {
    tree: &'a mut NodeTree,
    matchers: Vec<Matcher>,
    stack: Vec<(NodeId, usize)>,
}

impl Iterator for PathEnumerator<'_> {
    type Item = Visited;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            let Some(matcher) = self.matchers.get(depth) else {
                return Some(Visited::Matched(id));
            };
            if let Err(e) = self.tree.expand(id) {
                return Some(Visited::Unreadable(id, e));
            }
            // Reverse push keeps the pop order at insertion order.
            let children: Vec<NodeId> = self.tree.children(id).to_vec();
            for child in children.into_iter().rev() {
                if matcher.matches(&self.tree.segment(child)) {
                    self.stack.push((child, depth + 1));
                }
            }
        }
        None
    }
}
