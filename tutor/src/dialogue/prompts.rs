//! Embedded dialogue prompts
//!
//! Compiled-in Handlebars templates for the three classification calls.

use eyre::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

use super::state::ClarificationContext;

/// System prompt for subject identification
pub const IDENTIFY_SYSTEM: &str = r#"You classify what subject a user wants to learn.

Reply with ONLY a single JSON object, no prose, no Markdown fence.

If the subject is unambiguous:
{"outcome": "identified", "subject": "<canonical subject name>", "category": "<one-or-two-word category>"}

If the term could belong to clearly different fields (e.g. "Python" the language vs the snake):
{"outcome": "clarify", "term": "<the ambiguous term>", "categories": ["<candidate category>", ...]}

Prefer "identified" unless the ambiguity is genuine. Categories are short, like "Programming", "DevOps", "Mathematics"."#;

/// User template for subject identification
const IDENTIFY_USER: &str = r#"The user said: {{utterance}}"#;

/// System template for clarification resolution
const CLARIFY_SYSTEM: &str = r#"A user wants to learn "{{term}}", which could belong to one of these fields: {{#each categories}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}.

Their answer to "which did you mean?" follows. Resolve it.

Reply with ONLY a single JSON object, no prose, no Markdown fence:
{"subject": "<resolved subject name>", "category": "<resolved category>"}"#;

/// User template for clarification resolution
const CLARIFY_USER: &str = r#"The user answered: {{utterance}}"#;

/// System prompt for learning-preference capture
pub const PREFERENCE_SYSTEM: &str = r#"You map a user's answer onto one of three learning preferences:

1 = basics (just the essentials)
2 = getting_started (a practical getting-started path)
3 = core_concepts (the core concepts in depth)

The answer may be a bare digit ("1", "2", "3") or free text ("the basics", "I want to go deep").

Reply with ONLY a single JSON object, no prose, no Markdown fence:
{"preference": "basics"} or {"preference": "getting_started"} or {"preference": "core_concepts"}"#;

/// User template for learning-preference capture
const PREFERENCE_USER: &str = r#"The user answered: {{utterance}}"#;

#[derive(Serialize)]
struct UtteranceContext<'a> {
    utterance: &'a str,
}

#[derive(Serialize)]
struct ClarifyContext<'a> {
    term: &'a str,
    categories: &'a [String],
}

/// Render the identification user prompt
pub fn identify_user(utterance: &str) -> Result<String> {
    render(IDENTIFY_USER, &UtteranceContext { utterance })
}

/// Render the clarification system prompt for a stored context
pub fn clarify_system(clarification: &ClarificationContext) -> Result<String> {
    render(
        CLARIFY_SYSTEM,
        &ClarifyContext {
            term: &clarification.term,
            categories: &clarification.categories,
        },
    )
}

/// Render the clarification user prompt
pub fn clarify_user(utterance: &str) -> Result<String> {
    render(CLARIFY_USER, &UtteranceContext { utterance })
}

/// Render the learning-preference user prompt
pub fn preference_user(utterance: &str) -> Result<String> {
    render(PREFERENCE_USER, &UtteranceContext { utterance })
}

fn render<T: Serialize>(template: &str, context: &T) -> Result<String> {
    Handlebars::new()
        .render_template(template, context)
        .context("Failed to render prompt template")
}
