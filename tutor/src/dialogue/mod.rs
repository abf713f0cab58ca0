//! Dialogue engine
//!
//! Per-session finite-state machine that turns free-text utterances into a
//! fully specified learning request: subject identification, clarification
//! of ambiguous terms, and learning-preference capture.

mod engine;
mod prompts;
mod protocol;
mod state;

pub use engine::{CapturedRequest, DialogueEngine, Turn};
pub use protocol::{ResolvedSubject, SubjectOutcome, strip_code_fences};
pub use state::{ClarificationContext, ConversationState, DialogueStep, SessionStore};
