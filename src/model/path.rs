/*!
# Structural Paths

Identity of a forest node is positional: a node is identified by the route
from its root down to it, one link per level. Two structurally identical
root instances therefore address corresponding nodes by the same
[`StructuralPath`], which is what [`Forest::locate_in`](super::Forest::locate_in)
replays.
*/
use std::fmt::{self, Display};

/// One level of a structural path: which list of the parent node the child
/// hangs from, and at which index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    /// The i-th child axis step
    Child(usize),
    /// The i-th constraint
    Constraint(usize),
    /// The i-th attached predicate
    Predicate(usize),
}

impl Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child(i) => write!(f, "child[{i}]"),
            Self::Constraint(i) => write!(f, "constraint[{i}]"),
            Self::Predicate(i) => write!(f, "predicate[{i}]"),
        }
    }
}

/// Route from a root down to a node, outermost link first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructuralPath(Vec<Link>);

impl StructuralPath {
    /// Build a path from links ordered root-first.
    #[must_use]
    pub const fn new(links: Vec<Link>) -> Self {
        Self(links)
    }

    /// The links of the path, root-first.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.0
    }

    /// Number of levels below the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path addresses the root itself.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for link in &self.0 {
            write!(f, "/{link}")?;
        }
        Ok(())
    }
}
