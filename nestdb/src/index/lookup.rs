use crate::common::Value;
use std::ops::Bound;

/// A question answered directly from one index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLookup {
    /// Documents whose value at the path equals the given value. On a
    /// full-text index a string is tokenized and matched like [`IndexLookup::Text`].
    Eq(Value),
    /// Documents whose value lies between the bounds in [`Value`] order.
    /// Documents missing the field never match. When one end is unbounded the
    /// range stays within the type of the other end, so `less_than(10)` skips
    /// nulls and booleans and `greater_than("m")` skips dates.
    Range { lower: Bound<Value>, upper: Bound<Value> },
    /// Documents that do not have the field at all.
    Absent,
    /// Full-text search: documents containing any of the words.
    Text(String),
}

impl IndexLookup {
    pub fn eq<V: Into<Value>>(value: V) -> Self {
        IndexLookup::Eq(value.into())
    }

    pub fn text(words: &str) -> Self {
        IndexLookup::Text(words.to_string())
    }

    pub fn between<V: Into<Value>>(lower: V, upper: V) -> Self {
        IndexLookup::Range {
            lower: Bound::Included(lower.into()),
            upper: Bound::Included(upper.into()),
        }
    }

    pub fn greater_than<V: Into<Value>>(value: V) -> Self {
        IndexLookup::Range {
            lower: Bound::Excluded(value.into()),
            upper: Bound::Unbounded,
        }
    }

    pub fn greater_or_equal<V: Into<Value>>(value: V) -> Self {
        IndexLookup::Range {
            lower: Bound::Included(value.into()),
            upper: Bound::Unbounded,
        }
    }

    pub fn less_than<V: Into<Value>>(value: V) -> Self {
        IndexLookup::Range {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(value.into()),
        }
    }

    pub fn less_or_equal<V: Into<Value>>(value: V) -> Self {
        IndexLookup::Range {
            lower: Bound::Unbounded,
            upper: Bound::Included(value.into()),
        }
    }
}
