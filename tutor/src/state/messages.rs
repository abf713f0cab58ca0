//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{ContentItem, LearningRequest, LessonPlan};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // LearningRequest operations
    CreateRequest {
        request: LearningRequest,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetRequest {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<LearningRequest>>>,
    },
    UpdateRequest {
        request: LearningRequest,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListRequests {
        status_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<LearningRequest>>>,
    },
    /// Deletes the request and every lesson plan referencing it
    DeleteRequest {
        id: String,
        reply: oneshot::Sender<StateResponse<usize>>,
    },

    // LessonPlan operations
    CreatePlan {
        plan: LessonPlan,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetPlan {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<LessonPlan>>>,
    },
    UpdatePlan {
        plan: LessonPlan,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListPlans {
        request_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<LessonPlan>>>,
    },

    // ContentItem operations
    CreateContent {
        item: ContentItem,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    ListContent {
        plan_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<ContentItem>>>,
    },
    DeleteContent {
        id: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Sync operations
    Sync {
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Shutdown
    Shutdown,
}
