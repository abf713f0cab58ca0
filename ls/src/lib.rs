//! LessonStore - generic persistent document storage
//!
//! Records are plain serde types implementing the [`Record`] trait. Each
//! record kind lives in its own collection, held in memory and mirrored to a
//! JSONL file per collection. There are no transactions; `update` is
//! last-writer-wins keyed by id.

mod store;

pub use store::Store;

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A value that can be used for filtering on indexed fields
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

/// Comparison operator for filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// A filter on an indexed field
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Equality filter on a string field
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: IndexValue::String(value.into()),
        }
    }

    /// Check whether a record's indexed fields satisfy this filter
    pub fn matches(&self, fields: &HashMap<String, IndexValue>) -> bool {
        match (fields.get(&self.field), self.op) {
            (Some(value), FilterOp::Eq) => *value == self.value,
            (Some(value), FilterOp::Ne) => *value != self.value,
            // A missing field never satisfies Eq, always satisfies Ne
            (None, FilterOp::Eq) => false,
            (None, FilterOp::Ne) => true,
        }
    }
}

/// A storable record
///
/// Implementors provide their identity, freshness timestamp, the collection
/// they live in, and the fields that can be filtered on via [`Filter`].
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Unique identifier
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Name of the collection this record kind is stored in
    fn collection_name() -> &'static str;

    /// Fields available to [`Store::list`] filters
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_eq_matches() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String("pending".to_string()));

        let filter = Filter::eq("status", "pending");
        assert!(filter.matches(&fields));

        let filter = Filter::eq("status", "completed");
        assert!(!filter.matches(&fields));
    }

    #[test]
    fn test_filter_ne_matches() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String("pending".to_string()));

        let filter = Filter {
            field: "status".to_string(),
            op: FilterOp::Ne,
            value: IndexValue::String("completed".to_string()),
        };
        assert!(filter.matches(&fields));
    }

    #[test]
    fn test_filter_missing_field() {
        let fields = HashMap::new();

        let eq = Filter::eq("status", "pending");
        assert!(!eq.matches(&fields));

        let ne = Filter {
            field: "status".to_string(),
            op: FilterOp::Ne,
            value: IndexValue::String("pending".to_string()),
        };
        assert!(ne.matches(&fields));
    }

    #[test]
    fn test_now_ms_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
