use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LabelId, PropId};

/// Identity of a property index: the `(label, property key)` pair it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexDescriptor {
    label: LabelId,
    prop: PropId,
}

impl IndexDescriptor {
    pub fn new(label: LabelId, prop: PropId) -> Self {
        Self { label, prop }
    }

    pub fn label(&self) -> LabelId {
        self.label
    }

    pub fn prop(&self) -> PropId {
        self.prop
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index on :{}({})", self.label, self.prop)
    }
}

/// Uniqueness constraint over `(label, property key)`.
///
/// Each constraint owns exactly one backing unique index with the same pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniquenessConstraint {
    label: LabelId,
    prop: PropId,
}

impl UniquenessConstraint {
    pub fn new(label: LabelId, prop: PropId) -> Self {
        Self { label, prop }
    }

    pub fn label(&self) -> LabelId {
        self.label
    }

    pub fn prop(&self) -> PropId {
        self.prop
    }

    /// Descriptor of the index enforcing this constraint.
    pub fn index(&self) -> IndexDescriptor {
        IndexDescriptor::new(self.label, self.prop)
    }

    /// Returns `true` when the constraint covers `label` and `prop`.
    pub fn matches(&self, label: LabelId, prop: PropId) -> bool {
        self.label == label && self.prop == prop
    }
}

impl fmt::Display for UniquenessConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uniqueness constraint on :{}({})", self.label, self.prop)
    }
}

/// Population state of an index.
///
/// Population runs synchronously while the index is created, so a new index is
/// immediately `Online`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalIndexState {
    /// Index is complete and maintained on every write.
    Online,
    /// Population failed; see the index failure message.
    Failed,
}
