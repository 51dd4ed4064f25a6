use std::fmt;

use crate::storage::props::Value;
use crate::types::{LabelId, PropId};

/// Lock target for a single entry of a uniqueness index.
///
/// Two transactions inserting the same `(label, property key, value)` combination
/// contend on equal keys even when they touch different nodes. The value is held in
/// its [canonical rendering](Value::canonical_text), so values that compare equal
/// map to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexEntryLock {
    label: LabelId,
    prop: PropId,
    value: String,
}

impl IndexEntryLock {
    /// Creates a lock key from an already rendered property value.
    pub fn new(label: LabelId, prop: PropId, value: impl Into<String>) -> Self {
        Self {
            label,
            prop,
            value: value.into(),
        }
    }

    /// Creates a lock key for `value`.
    pub fn for_value(label: LabelId, prop: PropId, value: &Value) -> Self {
        Self::new(label, prop, value.canonical_text())
    }

    pub fn label(&self) -> LabelId {
        self.label
    }

    pub fn prop(&self) -> PropId {
        self.prop
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for IndexEntryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndexEntryLock{{label={}, prop={}, value={}}}",
            self.label, self.prop, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn independently_built_keys_are_interchangeable() {
        let a = IndexEntryLock::new(LabelId(1), PropId(2), "alice");
        let b = IndexEntryLock::for_value(LabelId(1), PropId(2), &Value::from("alice"));
        assert_eq!(a, b);
        let mut set = FxHashSet::default();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn every_field_participates_in_identity() {
        let base = IndexEntryLock::new(LabelId(1), PropId(2), "x");
        assert_ne!(base, IndexEntryLock::new(LabelId(9), PropId(2), "x"));
        assert_ne!(base, IndexEntryLock::new(LabelId(1), PropId(9), "x"));
        assert_ne!(base, IndexEntryLock::new(LabelId(1), PropId(2), "y"));
    }

    #[test]
    fn equal_numbers_of_different_width_share_a_key() {
        let short = IndexEntryLock::for_value(LabelId(1), PropId(2), &Value::Short(7));
        let long = IndexEntryLock::for_value(LabelId(1), PropId(2), &Value::Long(7));
        assert_eq!(short, long);
    }

    #[test]
    fn signed_zero_shares_a_key_with_integer_zero() {
        let negative = IndexEntryLock::for_value(LabelId(1), PropId(1), &Value::Double(-0.0));
        let zero = IndexEntryLock::for_value(LabelId(1), PropId(1), &Value::Long(0));
        let float = IndexEntryLock::for_value(LabelId(1), PropId(1), &Value::Float(0.0));
        assert_eq!(negative, zero);
        assert_eq!(float, zero);
        assert_eq!(zero.value(), "0");
    }

    #[test]
    fn equal_arrays_share_a_key() {
        let doubles = Value::DoubleArray(vec![-0.0, 2.0].into_boxed_slice());
        let shorts = Value::ShortArray(vec![0, 2].into_boxed_slice());
        assert_eq!(doubles, shorts);
        assert_eq!(
            IndexEntryLock::for_value(LabelId(1), PropId(1), &doubles),
            IndexEntryLock::for_value(LabelId(1), PropId(1), &shorts)
        );
    }

    #[test]
    fn display_is_diagnostic() {
        let key = IndexEntryLock::new(LabelId(3), PropId(4), "v");
        assert_eq!(key.to_string(), "IndexEntryLock{label=3, prop=4, value=v}");
    }
}
