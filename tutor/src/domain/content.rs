//! ContentItem record
//!
//! A resource the user saved out of a lesson plan for later reading.

use std::collections::HashMap;

use lessonstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};

use super::id::generate_id;

/// A saved resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier
    pub id: String,

    /// The plan this was saved from, if any
    pub lesson_plan_id: Option<String>,

    /// Resource title
    pub title: String,

    /// Resource url
    pub url: String,

    /// User or curation notes
    pub notes: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl ContentItem {
    /// Create a new content item
    pub fn new(title: impl Into<String>, url: impl Into<String>, notes: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("content", &title),
            lesson_plan_id: None,
            title,
            url: url.into(),
            notes: notes.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record which plan this item was saved from
    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.lesson_plan_id = Some(plan_id.into());
        self.updated_at = now_ms();
        self
    }
}

impl Record for ContentItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "content_items"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        if let Some(plan_id) = &self.lesson_plan_id {
            fields.insert("lesson_plan_id".to_string(), IndexValue::String(plan_id.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_new() {
        let item = ContentItem::new("Kubernetes Docs", "https://kubernetes.io/docs", "official docs");
        assert!(item.id.contains("-content-kubernetes-docs"));
        assert!(item.lesson_plan_id.is_none());
    }

    #[test]
    fn test_content_item_with_plan() {
        let item = ContentItem::new("Guide", "https://example.com", "").with_plan("plan-1");
        assert_eq!(item.lesson_plan_id.as_deref(), Some("plan-1"));

        let fields = item.indexed_fields();
        assert_eq!(
            fields.get("lesson_plan_id"),
            Some(&IndexValue::String("plan-1".to_string()))
        );
    }
}
