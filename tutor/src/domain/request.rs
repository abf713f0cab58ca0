//! LearningRequest record
//!
//! A user's captured intent to learn a subject, produced by the dialogue
//! engine and consumed by the lesson-plan pipeline.

use std::collections::HashMap;

use lessonstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};

use super::id::generate_id;

/// How deep the user wants to go into the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LearningPreference {
    /// Just the basics
    #[default]
    Basics,
    /// A practical getting-started path
    GettingStarted,
    /// The core concepts in depth
    CoreConcepts,
}

impl LearningPreference {
    /// Stable string form used in prompts and queries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basics => "basics",
            Self::GettingStarted => "getting_started",
            Self::CoreConcepts => "core_concepts",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basics" => Some(Self::Basics),
            "getting_started" => Some(Self::GettingStarted),
            "core_concepts" => Some(Self::CoreConcepts),
            _ => None,
        }
    }
}

impl std::fmt::Display for LearningPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a learning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Captured, no lesson plan yet
    #[default]
    Pending,
    /// A pipeline run is in flight for this request
    Processing,
    /// A lesson plan exists for this request
    Completed,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A captured learning request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRequest {
    /// Unique identifier
    pub id: String,

    /// Subject the user wants to learn
    pub subject: String,

    /// Category the subject belongs to (e.g. "DevOps", "General")
    pub category: String,

    /// Depth preference captured by the dialogue
    pub learning_preference: LearningPreference,

    /// Current status
    pub status: RequestStatus,

    /// Id of the generated lesson plan, set when the pipeline completes
    pub lesson_plan_id: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl LearningRequest {
    /// Create a new request with generated id
    pub fn new(subject: impl Into<String>, category: impl Into<String>, preference: LearningPreference) -> Self {
        let subject = subject.into();
        let now = now_ms();
        Self {
            id: generate_id("request", &subject),
            subject,
            category: category.into(),
            learning_preference: preference,
            status: RequestStatus::Pending,
            lesson_plan_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a request with a specific id (for testing or recovery)
    pub fn with_id(
        id: impl Into<String>,
        subject: impl Into<String>,
        category: impl Into<String>,
        preference: LearningPreference,
    ) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            subject: subject.into(),
            category: category.into(),
            learning_preference: preference,
            status: RequestStatus::Pending,
            lesson_plan_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the status
    pub fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    /// Mark the request completed by a lesson plan
    pub fn complete_with_plan(&mut self, plan_id: impl Into<String>) {
        self.status = RequestStatus::Completed;
        self.lesson_plan_id = Some(plan_id.into());
        self.updated_at = now_ms();
    }

    /// Check if a lesson plan has been generated
    pub fn is_completed(&self) -> bool {
        self.status == RequestStatus::Completed
    }
}

impl Record for LearningRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "learning_requests"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("category".to_string(), IndexValue::String(self.category.clone()));
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
    fn test_request_new() {
        let request = LearningRequest::new("Kubernetes", "DevOps", LearningPreference::CoreConcepts);
        assert!(request.id.contains("-request-kubernetes"));
        assert_eq!(request.subject, "Kubernetes");
        assert_eq!(request.category, "DevOps");
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.lesson_plan_id.is_none());
    }

    #[test]
    fn test_complete_with_plan() {
        let mut request = LearningRequest::new("Rust", "Programming", LearningPreference::Basics);
        request.complete_with_plan("plan-1");

        assert!(request.is_completed());
        assert_eq!(request.lesson_plan_id.as_deref(), Some("plan-1"));
    }

    #[test]
    fn test_preference_parse_roundtrip() {
        for pref in [
            LearningPreference::Basics,
            LearningPreference::GettingStarted,
            LearningPreference::CoreConcepts,
        ] {
            assert_eq!(LearningPreference::parse(pref.as_str()), Some(pref));
        }
        assert_eq!(LearningPreference::parse("everything"), None);
    }

    #[test]
    fn test_request_indexed_fields() {
        let mut request = LearningRequest::new("Rust", "Programming", LearningPreference::Basics);
        request.complete_with_plan("plan-1");

        let fields = request.indexed_fields();
        assert_eq!(fields.get("status"), Some(&IndexValue::String("completed".to_string())));
        assert_eq!(
            fields.get("lesson_plan_id"),
            Some(&IndexValue::String("plan-1".to_string()))
        );
    }

    #[test]
    fn test_request_serde() {
        let request = LearningRequest::new("Python", "Programming", LearningPreference::GettingStarted);

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"getting_started\""));
        assert!(json.contains("\"pending\""));

        let back: LearningRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, request.id);
        assert_eq!(back.learning_preference, request.learning_preference);
    }
}
