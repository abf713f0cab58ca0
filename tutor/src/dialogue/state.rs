//! Conversation session state
//!
//! One in-memory [`ConversationState`] per session id, created lazily and
//! evicted after a configurable idle TTL. Nothing here is persisted.

use std::collections::HashMap;

use lessonstore::now_ms;
use tracing::debug;

use crate::domain::LearningPreference;

/// Where a session currently is in the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueStep {
    /// No message processed yet
    #[default]
    Initial,
    /// Waiting for a subject to classify
    Identifying,
    /// Waiting for the user to resolve an ambiguous subject
    Clarifying,
    /// Waiting for a learning-preference choice
    LearningPreference,
    /// Request fully captured (or the turn failed terminally); the next
    /// message starts a fresh cycle
    Confirmed,
}

impl std::fmt::Display for DialogueStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Identifying => write!(f, "identifying"),
            Self::Clarifying => write!(f, "clarifying"),
            Self::LearningPreference => write!(f, "learning_preference"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Context carried from an ambiguous identification into clarification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClarificationContext {
    /// The ambiguous term the user gave
    pub term: String,
    /// Candidate categories the term could belong to
    pub categories: Vec<String>,
}

/// Per-session dialogue state
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub step: DialogueStep,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub learning_preference: Option<LearningPreference>,
    pub clarification: Option<ClarificationContext>,
    /// Last activity timestamp (Unix milliseconds), drives TTL eviction
    pub last_activity: i64,
}

impl ConversationState {
    fn new() -> Self {
        Self {
            last_activity: now_ms(),
            ..Self::default()
        }
    }

    /// Refresh the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = now_ms();
    }

    /// Clear captured fields and begin a fresh identification cycle
    pub fn begin_cycle(&mut self) {
        self.step = DialogueStep::Identifying;
        self.subject = None;
        self.category = None;
        self.learning_preference = None;
        self.clarification = None;
    }
}

/// In-memory session map with idle-TTL eviction
pub struct SessionStore {
    sessions: HashMap<String, ConversationState>,
    ttl_ms: i64,
}

impl SessionStore {
    /// Create a store evicting sessions idle longer than `ttl_ms`
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl_ms,
        }
    }

    /// Drop sessions whose last activity is older than the TTL
    ///
    /// Called lazily on every engine invocation, so the map never grows past
    /// the set of sessions active within one TTL window.
    pub fn purge_idle(&mut self) -> usize {
        let cutoff = now_ms() - self.ttl_ms;
        let before = self.sessions.len();
        self.sessions.retain(|_, state| state.last_activity >= cutoff);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Get the state for a session, creating it lazily
    pub fn get_or_create(&mut self, session_id: &str) -> &mut ConversationState {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(ConversationState::new)
    }

    /// Look up a session without creating it
    pub fn get(&self, session_id: &str) -> Option<&ConversationState> {
        self.sessions.get(session_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
