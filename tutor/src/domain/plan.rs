//! LessonPlan and CuratedResource records

use std::collections::HashMap;

use lessonstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};

use super::id::generate_id;

/// A single recommended link with a one-sentence rationale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedResource {
    pub title: String,
    pub url: String,
    pub summary: String,
}

impl CuratedResource {
    /// Check the output contract: non-empty title and summary, absolute url
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.summary.trim().is_empty()
            && (self.url.starts_with("http://") || self.url.starts_with("https://"))
    }
}

/// The curated, persisted set of resources generated for a learning request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPlan {
    /// Unique identifier
    pub id: String,

    /// Owning learning request (one plan per completed request by convention;
    /// the store does not enforce uniqueness)
    pub learning_request_id: String,

    /// Ordered reading list
    pub resources: Vec<CuratedResource>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl LessonPlan {
    /// Create a new plan for a request
    pub fn new(learning_request_id: impl Into<String>, resources: Vec<CuratedResource>) -> Self {
        let learning_request_id = learning_request_id.into();
        let now = now_ms();
        Self {
            id: generate_id("plan", &learning_request_id),
            learning_request_id,
            resources,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a plan with a specific id (for testing or recovery)
    pub fn with_id(
        id: impl Into<String>,
        learning_request_id: impl Into<String>,
        resources: Vec<CuratedResource>,
    ) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            learning_request_id: learning_request_id.into(),
            resources,
            created_at: now,
            updated_at: now,
        }
    }

    /// Remove a resource by position, returning it if present
    pub fn remove_resource(&mut self, index: usize) -> Option<CuratedResource> {
        if index < self.resources.len() {
            self.updated_at = now_ms();
            Some(self.resources.remove(index))
        } else {
            None
        }
    }

    /// Restore a previously removed resource at a position (clamped to the end)
    pub fn restore_resource(&mut self, index: usize, resource: CuratedResource) {
        let index = index.min(self.resources.len());
        self.resources.insert(index, resource);
        self.updated_at = now_ms();
    }
}

impl Record for LessonPlan {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "lesson_plans"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert(
            "learning_request_id".to_string(),
            IndexValue::String(self.learning_request_id.clone()),
        );
        fields
    }
}
