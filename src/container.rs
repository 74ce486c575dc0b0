//! Container view over a compound or list value.
//!
//! A node with addressable children exposes exactly one of the two shapes:
//! named (compound members, unique names) or ordered (list elements,
//! homogeneous kind). The view is a pure in-memory edit surface; it never
//! performs I/O, and marking the owning node modified is the node layer's
//! job.

use std::collections::BTreeSet;

use crate::{Compound, ContainerError, List, Value};

pub enum TagContainer<'a> {
    Named(&'a mut Compound),
    Ordered(&'a mut List),
}

impl<'a> TagContainer<'a> {
    /// The container view of a value, if it has one.
    pub fn of(value: &'a mut Value) -> Option<Self> {
        match value {
            Value::Compound(c) => Some(TagContainer::Named(c)),
            Value::List(l) => Some(TagContainer::Ordered(l)),
            _ => None,
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, TagContainer::Named(_))
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, TagContainer::Ordered(_))
    }

    /// Number of immediate children.
    pub fn count(&self) -> usize {
        match self {
            TagContainer::Named(c) => c.len(),
            TagContainer::Ordered(l) => l.len(),
        }
    }

    /// Sibling names currently in use. Meaningful for named containers only;
    /// an ordered container has no names and reports an empty set.
    pub fn names_in_use(&self) -> BTreeSet<String> {
        match self {
            TagContainer::Named(c) => c.names(),
            TagContainer::Ordered(_) => BTreeSet::new(),
        }
    }

    /// Add a tag. Named containers reject duplicate names; ordered
    /// containers ignore `name` and append, rejecting a kind mismatch.
    pub fn add(&mut self, name: &str, value: Value) -> Result<(), ContainerError> {
        match self {
            TagContainer::Named(c) => c.insert(name.to_string(), value),
            TagContainer::Ordered(l) => l.push(value),
        }
    }

    /// Remove a member by name. `false` when absent (not an error).
    pub fn delete_named(&mut self, name: &str) -> bool {
        match self {
            TagContainer::Named(c) => c.remove(name).is_some(),
            TagContainer::Ordered(_) => false,
        }
    }

    /// Remove an element by index. `false` when out of range.
    pub fn delete_at(&mut self, index: usize) -> bool {
        match self {
            TagContainer::Named(_) => false,
            TagContainer::Ordered(l) => l.remove(index).is_some(),
        }
    }

    /// A sibling name derived from `base` that is not currently in use.
    pub fn unique_name(&self, base: &str) -> String {
        make_unique_name(base, &self.names_in_use())
    }
}

/// Smallest-suffix unique-name rule: `base` verbatim when free, otherwise
/// `"{base} (Copy {n})"` for the smallest n >= 1 that is free. Deterministic
/// and terminating.
pub fn make_unique_name(base: &str, in_use: &BTreeSet<String>) -> String {
    if !in_use.contains(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base} (Copy {n})");
        if !in_use.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
