//! DialogueEngine - per-session subject capture state machine
//!
//! Turns a stream of free-text utterances into a fully specified learning
//! request. Makes exactly one LLM call per turn while classifying; a
//! transport-level LLM failure fails the whole turn and propagates.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info, warn};

use crate::config::DialogueConfig;
use crate::domain::LearningPreference;
use crate::llm::{CompletionRequest, LlmClient};

use super::protocol::{self, SubjectOutcome};
use super::prompts;
use super::state::{ClarificationContext, DialogueStep, SessionStore};

/// Category assigned when clarification fails and the ambiguous term is
/// accepted verbatim
const FALLBACK_CATEGORY: &str = "General";

/// A fully captured request, ready for the caller to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub subject: String,
    pub category: String,
    pub learning_preference: LearningPreference,
}

/// The engine's answer to one user message
#[derive(Debug, Clone)]
pub struct Turn {
    /// Text to show the user
    pub reply: String,
    /// Step the session ended the turn in
    pub step: DialogueStep,
    /// Set when the turn completed a request the caller should persist
    pub captured: Option<CapturedRequest>,
}

/// Per-session dialogue state machine
///
/// Owns the session map; `&mut self` makes single-session processing strictly
/// sequential by construction. Callers wanting concurrent sessions provide
/// their own serialization around the engine.
pub struct DialogueEngine {
    llm: Arc<dyn LlmClient>,
    sessions: SessionStore,
    classify_max_tokens: u32,
}

impl DialogueEngine {
    /// Create an engine over the given LLM client
    pub fn new(llm: Arc<dyn LlmClient>, config: &DialogueConfig) -> Self {
        Self {
            llm,
            sessions: SessionStore::new(config.session_ttl_ms),
            classify_max_tokens: config.classify_max_tokens,
        }
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Process one user message for a session
    ///
    /// Returns the reply text and, when the dialogue just completed, the
    /// captured request for the caller to persist.
    pub async fn handle_message(&mut self, session_id: &str, text: &str) -> Result<Turn> {
        debug!(%session_id, "handle_message: called");
        self.sessions.purge_idle();

        let step = {
            let state = self.sessions.get_or_create(session_id);
            state.touch();
            // initial and confirmed both (re)start a cycle; the message itself
            // is then the subject utterance
            if matches!(state.step, DialogueStep::Initial | DialogueStep::Confirmed) {
                state.begin_cycle();
            }
            state.step
        };

        match step {
            DialogueStep::Identifying => self.identify(session_id, text).await,
            DialogueStep::Clarifying => self.clarify(session_id, text).await,
            DialogueStep::LearningPreference => self.capture_preference(session_id, text).await,
            DialogueStep::Initial | DialogueStep::Confirmed => unreachable!("cycle begun above"),
        }
    }

    /// Classify the utterance as an unambiguous or ambiguous subject
    async fn identify(&mut self, session_id: &str, text: &str) -> Result<Turn> {
        let request = CompletionRequest::single_turn(
            prompts::IDENTIFY_SYSTEM,
            prompts::identify_user(text)?,
            self.classify_max_tokens,
        );
        let response = self.llm.complete(request).await?;
        let outcome = protocol::parse_subject_outcome(response.text()?);

        let state = self.sessions.get_or_create(session_id);
        match outcome {
            Some(SubjectOutcome::Identified { subject, category }) => {
                info!(%session_id, %subject, %category, "Subject identified");
                state.subject = Some(subject.clone());
                state.category = Some(category.clone());
                state.step = DialogueStep::LearningPreference;
                Ok(Turn {
                    reply: preference_options_reply(&subject, &category),
                    step: state.step,
                    captured: None,
                })
            }
            Some(SubjectOutcome::Clarify { term, categories }) => {
                info!(%session_id, %term, "Subject ambiguous, clarifying");
                let reply = clarification_reply(&term, &categories);
                state.clarification = Some(ClarificationContext { term, categories });
                state.step = DialogueStep::Clarifying;
                Ok(Turn {
                    reply,
                    step: state.step,
                    captured: None,
                })
            }
            None => {
                // Terminal for the turn, not a crash; the next message starts
                // a fresh cycle
                warn!(%session_id, "Could not identify a subject");
                state.step = DialogueStep::Confirmed;
                Ok(Turn {
                    reply: "I couldn't work out a subject from that. \
                            Tell me again - what would you like to learn?"
                        .to_string(),
                    step: state.step,
                    captured: None,
                })
            }
        }
    }

    /// Resolve a stored ambiguous term against the user's answer
    async fn clarify(&mut self, session_id: &str, text: &str) -> Result<Turn> {
        let clarification = self
            .sessions
            .get(session_id)
            .and_then(|s| s.clarification.clone())
            .unwrap_or_else(|| ClarificationContext {
                term: text.to_string(),
                categories: Vec::new(),
            });

        let request = CompletionRequest::single_turn(
            prompts::clarify_system(&clarification)?,
            prompts::clarify_user(text)?,
            self.classify_max_tokens,
        );
        let response = self.llm.complete(request).await?;
        let resolved = protocol::parse_resolved_subject(response.text()?);

        let (subject, category) = match resolved {
            Some(r) => {
                info!(%session_id, subject = %r.subject, "Clarification resolved");
                (r.subject, r.category)
            }
            None => {
                // Bounded fallback: accept the ambiguous term verbatim rather
                // than looping on clarification
                warn!(%session_id, term = %clarification.term, "Clarification failed, accepting term verbatim");
                (clarification.term.clone(), FALLBACK_CATEGORY.to_string())
            }
        };

        let state = self.sessions.get_or_create(session_id);
        state.subject = Some(subject.clone());
        state.category = Some(category.clone());
        state.clarification = None;
        state.step = DialogueStep::LearningPreference;

        Ok(Turn {
            reply: preference_options_reply(&subject, &category),
            step: state.step,
            captured: None,
        })
    }

    /// Map the utterance onto a learning preference
    async fn capture_preference(&mut self, session_id: &str, text: &str) -> Result<Turn> {
        let request = CompletionRequest::single_turn(
            prompts::PREFERENCE_SYSTEM,
            prompts::preference_user(text)?,
            self.classify_max_tokens,
        );
        let response = self.llm.complete(request).await?;
        let preference = protocol::parse_preference(response.text()?);

        let state = self.sessions.get_or_create(session_id);
        match preference {
            Some(preference) => {
                let subject = state.subject.clone().unwrap_or_default();
                let category = state.category.clone().unwrap_or_default();
                info!(%session_id, %subject, %preference, "Learning request captured");

                state.learning_preference = Some(preference);
                state.step = DialogueStep::Confirmed;

                Ok(Turn {
                    reply: format!(
                        "All set: {} ({}), {}. Say \"plan\" whenever you want me to put a reading list together.",
                        subject,
                        category,
                        preference_label(preference)
                    ),
                    step: state.step,
                    captured: Some(CapturedRequest {
                        subject,
                        category,
                        learning_preference: preference,
                    }),
                })
            }
            None => {
                // The one state that retries by staying put
                warn!(%session_id, "Could not map a learning preference, re-prompting");
                Ok(Turn {
                    reply: "Sorry, I didn't catch that. Reply 1 for the basics, 2 for getting started, \
                            or 3 for core concepts - or say it in your own words."
                        .to_string(),
                    step: state.step,
                    captured: None,
                })
            }
        }
    }
}

fn preference_options_reply(subject: &str, category: &str) -> String {
    format!(
        "{} ({}) - got it. How deep do you want to go?\n\
         \x20 1. The basics\n\
         \x20 2. Getting started\n\
         \x20 3. Core concepts\n\
         Reply with a number or in your own words.",
        subject, category
    )
}

fn clarification_reply(term: &str, categories: &[String]) -> String {
    format!(
        "\"{}\" could mean a few things - {}. Which did you mean?",
        term,
        categories.join(", ")
    )
}

fn preference_label(preference: LearningPreference) -> &'static str {
    match preference {
        LearningPreference::Basics => "the basics",
        LearningPreference::GettingStarted => "getting started",
        LearningPreference::CoreConcepts => "core concepts",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, LlmError, StopReason, TokenUsage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted LLM double: pops one canned reply per call
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err("boom".to_string())])),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("ScriptedLlm ran out of replies");
            match next {
                Ok(text) => Ok(CompletionResponse {
                    content: Some(text),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                }),
                Err(message) => Err(LlmError::InvalidResponse(message)),
            }
        }
    }

    fn engine_with(llm: Arc<ScriptedLlm>) -> DialogueEngine {
        DialogueEngine::new(llm, &DialogueConfig::default())
    }

    const IDENTIFIED_K8S: &str = r#"{"outcome": "identified", "subject": "Kubernetes", "category": "DevOps"}"#;
    const CLARIFY_PYTHON: &str = r#"{"outcome": "clarify", "term": "Python", "categories": ["Programming", "Zoology"]}"#;
    const PREF_BASICS: &str = r#"{"preference": "basics"}"#;

    #[tokio::test]
    async fn test_unambiguous_subject_skips_clarifying() {
        let llm = Arc::new(ScriptedLlm::new(vec![IDENTIFIED_K8S]));
        let mut engine = engine_with(llm.clone());

        let turn = engine.handle_message("s-1", "I want to learn Kubernetes").await.unwrap();

        assert_eq!(turn.step, DialogueStep::LearningPreference);
        assert!(turn.reply.contains("Kubernetes"));
        assert!(turn.captured.is_none());
        // Exactly one classification call for the turn
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_subject_stores_clarification() {
        let llm = Arc::new(ScriptedLlm::new(vec![CLARIFY_PYTHON]));
        let mut engine = engine_with(llm);

        let turn = engine.handle_message("s-1", "Python").await.unwrap();

        assert_eq!(turn.step, DialogueStep::Clarifying);
        assert!(turn.reply.contains("Python"));

        let state = engine.sessions.get("s-1").unwrap();
        let clarification = state.clarification.as_ref().unwrap();
        assert_eq!(clarification.term, "Python");
        assert!(!clarification.categories.is_empty());
    }

    #[tokio::test]
    async fn test_clarification_resolves() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            CLARIFY_PYTHON,
            r#"{"subject": "Python", "category": "Programming"}"#,
        ]));
        let mut engine = engine_with(llm);

        engine.handle_message("s-1", "Python").await.unwrap();
        let turn = engine.handle_message("s-1", "the programming language").await.unwrap();

        assert_eq!(turn.step, DialogueStep::LearningPreference);
        let state = engine.sessions.get("s-1").unwrap();
        assert_eq!(state.subject.as_deref(), Some("Python"));
        assert_eq!(state.category.as_deref(), Some("Programming"));
        assert!(state.clarification.is_none());
    }

    #[tokio::test]
    async fn test_clarification_failure_accepts_term_verbatim() {
        let llm = Arc::new(ScriptedLlm::new(vec![CLARIFY_PYTHON, "no idea, sorry"]));
        let mut engine = engine_with(llm);

        engine.handle_message("s-1", "Python").await.unwrap();
        let turn = engine.handle_message("s-1", "hmm").await.unwrap();

        // Bounded fallback, not a clarification loop
        assert_eq!(turn.step, DialogueStep::LearningPreference);
        let state = engine.sessions.get("s-1").unwrap();
        assert_eq!(state.subject.as_deref(), Some("Python"));
        assert_eq!(state.category.as_deref(), Some(FALLBACK_CATEGORY));
    }

    #[tokio::test]
    async fn test_preference_variants_all_map() {
        for utterance in ["1", "basics", "the basics"] {
            let llm = Arc::new(ScriptedLlm::new(vec![IDENTIFIED_K8S, PREF_BASICS]));
            let mut engine = engine_with(llm);

            engine.handle_message("s-1", "Kubernetes").await.unwrap();
            let turn = engine.handle_message("s-1", utterance).await.unwrap();

            assert_eq!(turn.step, DialogueStep::Confirmed, "utterance: {}", utterance);
            let captured = turn.captured.expect("should capture a request");
            assert_eq!(captured.subject, "Kubernetes");
            assert_eq!(captured.learning_preference, LearningPreference::Basics);
        }
    }

    #[tokio::test]
    async fn test_preference_failure_stays_put() {
        let llm = Arc::new(ScriptedLlm::new(vec![IDENTIFIED_K8S, "shrug", PREF_BASICS]));
        let mut engine = engine_with(llm);

        engine.handle_message("s-1", "Kubernetes").await.unwrap();

        let turn = engine.handle_message("s-1", "all of it").await.unwrap();
        assert_eq!(turn.step, DialogueStep::LearningPreference);
        assert!(turn.captured.is_none());

        // Re-prompt succeeds on the next turn
        let turn = engine.handle_message("s-1", "1").await.unwrap();
        assert_eq!(turn.step, DialogueStep::Confirmed);
        assert!(turn.captured.is_some());
    }

    #[tokio::test]
    async fn test_identification_failure_is_terminal_then_retries() {
        let llm = Arc::new(ScriptedLlm::new(vec!["total nonsense", IDENTIFIED_K8S]));
        let mut engine = engine_with(llm.clone());

        let turn = engine.handle_message("s-1", "??").await.unwrap();
        assert_eq!(turn.step, DialogueStep::Confirmed);
        assert!(turn.captured.is_none());
        assert!(turn.reply.contains("couldn't"));

        // The next message starts a fresh identification cycle
        let turn = engine.handle_message("s-1", "Kubernetes").await.unwrap();
        assert_eq!(turn.step, DialogueStep::LearningPreference);
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_confirmed_resets_for_new_request() {
        let llm = Arc::new(ScriptedLlm::new(vec![IDENTIFIED_K8S, PREF_BASICS, IDENTIFIED_K8S]));
        let mut engine = engine_with(llm);

        engine.handle_message("s-1", "Kubernetes").await.unwrap();
        engine.handle_message("s-1", "1").await.unwrap();

        // Session confirmed; a new message starts over cleanly
        let turn = engine.handle_message("s-1", "Kubernetes again").await.unwrap();
        assert_eq!(turn.step, DialogueStep::LearningPreference);

        let state = engine.sessions.get("s-1").unwrap();
        assert!(state.learning_preference.is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let llm = Arc::new(ScriptedLlm::new(vec![IDENTIFIED_K8S, CLARIFY_PYTHON]));
        let mut engine = engine_with(llm);

        engine.handle_message("alice", "Kubernetes").await.unwrap();
        engine.handle_message("bob", "Python").await.unwrap();

        assert_eq!(engine.session_count(), 2);
        assert_eq!(engine.sessions.get("alice").unwrap().step, DialogueStep::LearningPreference);
        assert_eq!(engine.sessions.get("bob").unwrap().step, DialogueStep::Clarifying);
    }

    #[tokio::test]
    async fn test_transport_error_fails_the_turn() {
        let llm = Arc::new(ScriptedLlm::failing());
        let mut engine = engine_with(llm);

        let result = engine.handle_message("s-1", "Kubernetes").await;
        assert!(result.is_err());
    }
}
