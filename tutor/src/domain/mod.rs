//! Domain records and id handling
//!
//! The three persisted record kinds (learning requests, lesson plans, content
//! items) plus id generation shared between them.

mod content;
mod id;
mod plan;
mod request;

pub use content::ContentItem;
pub use id::{generate_id, resolve_reference};
pub use plan::{CuratedResource, LessonPlan};
pub use request::{LearningPreference, LearningRequest, RequestStatus};
