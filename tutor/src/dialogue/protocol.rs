//! Structured-output protocol between the LLM and the dialogue control flow
//!
//! Every classification prompt asks the model for a single JSON object. The
//! raw reply is stripped of Markdown code fences and run through one serde
//! validator; anything that fails to parse or carries empty fields is a
//! classification failure, handled by the calling state's fallback.

use serde::Deserialize;
use tracing::debug;

use crate::domain::LearningPreference;

/// Strip a Markdown code fence (```json ... ``` or ``` ... ```) from a reply
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model reply into a protocol type, tolerating code fences
///
/// Returns None on any schema violation; callers treat that uniformly as a
/// classification failure.
fn parse_reply<T: for<'de> Deserialize<'de>>(raw: &str) -> Option<T> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str(cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "parse_reply: schema violation");
            None
        }
    }
}

/// Outcome of the subject-identification classification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubjectOutcome {
    /// Unambiguous subject with its category
    Identified { subject: String, category: String },
    /// Ambiguous term with candidate categories to clarify against
    Clarify { term: String, categories: Vec<String> },
}

/// A resolved subject from the clarification step
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResolvedSubject {
    pub subject: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceChoice {
    preference: LearningPreference,
}

/// Parse the identification reply
pub fn parse_subject_outcome(raw: &str) -> Option<SubjectOutcome> {
    let outcome: SubjectOutcome = parse_reply(raw)?;
    match &outcome {
        SubjectOutcome::Identified { subject, category } => {
            if subject.trim().is_empty() || category.trim().is_empty() {
                debug!("parse_subject_outcome: empty subject or category");
                return None;
            }
        }
        SubjectOutcome::Clarify { term, categories } => {
            if term.trim().is_empty() || categories.iter().all(|c| c.trim().is_empty()) {
                debug!("parse_subject_outcome: empty term or candidate list");
                return None;
            }
        }
    }
    Some(outcome)
}

/// Parse the clarification reply
pub fn parse_resolved_subject(raw: &str) -> Option<ResolvedSubject> {
    let resolved: ResolvedSubject = parse_reply(raw)?;
    if resolved.subject.trim().is_empty() || resolved.category.trim().is_empty() {
        debug!("parse_resolved_subject: empty subject or category");
        return None;
    }
    Some(resolved)
}

/// Parse the learning-preference reply
pub fn parse_preference(raw: &str) -> Option<LearningPreference> {
    let choice: PreferenceChoice = parse_reply(raw)?;
    Some(choice.preference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  ```json {\"a\": 1} ```  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_identified() {
        let raw = r#"{"outcome": "identified", "subject": "Kubernetes", "category": "DevOps"}"#;
        assert_eq!(
            parse_subject_outcome(raw),
            Some(SubjectOutcome::Identified {
                subject: "Kubernetes".to_string(),
                category: "DevOps".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_clarify() {
        let raw = r#"{"outcome": "clarify", "term": "Python", "categories": ["Programming", "Zoology"]}"#;
        let outcome = parse_subject_outcome(raw).unwrap();
        assert!(matches!(outcome, SubjectOutcome::Clarify { ref term, .. } if term == "Python"));
    }

    #[test]
    fn test_parse_identified_fenced() {
        let raw = "```json\n{\"outcome\": \"identified\", \"subject\": \"Rust\", \"category\": \"Programming\"}\n```";
        assert!(parse_subject_outcome(raw).is_some());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_subject_outcome("I think they mean the programming language.").is_none());
    }

    #[test]
    fn test_parse_rejects_empty_fields() {
        let raw = r#"{"outcome": "identified", "subject": "", "category": "DevOps"}"#;
        assert!(parse_subject_outcome(raw).is_none());

        let raw = r#"{"outcome": "clarify", "term": "Python", "categories": [""]}"#;
        assert!(parse_subject_outcome(raw).is_none());
    }

    #[test]
    fn test_parse_resolved_subject() {
        let raw = r#"{"subject": "Python", "category": "Programming"}"#;
        let resolved = parse_resolved_subject(raw).unwrap();
        assert_eq!(resolved.subject, "Python");

        assert!(parse_resolved_subject(r#"{"subject": " ", "category": "Programming"}"#).is_none());
        assert!(parse_resolved_subject("not json").is_none());
    }

    #[test]
    fn test_parse_preference() {
        assert_eq!(
            parse_preference(r#"{"preference": "basics"}"#),
            Some(LearningPreference::Basics)
        );
        assert_eq!(
            parse_preference(r#"{"preference": "core_concepts"}"#),
            Some(LearningPreference::CoreConcepts)
        );
        // Unknown variants are schema violations, not panics
        assert_eq!(parse_preference(r#"{"preference": "everything"}"#), None);
        assert_eq!(parse_preference("basics"), None);
    }
}
