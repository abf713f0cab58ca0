//! Curation prompt and response validation
//!
//! The model is asked for a bare JSON array of resources; anything else -
//! prose, wrong shape, missing or empty keys, relative urls - invalidates the
//! whole list. The pipeline never keeps a partial reading list.

use eyre::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

use crate::dialogue::strip_code_fences;
use crate::domain::{CuratedResource, LearningRequest};
use crate::search::SearchResult;

/// System prompt for the curation call
pub const CURATE_SYSTEM: &str = r#"You curate web search results into a short reading list for a learner.

Pick the 3-5 results that best fit the subject and the learner's level, in reading order.

Reply with ONLY a JSON array, no prose, no Markdown fence. Each element has exactly these keys:
  "title": the resource title
  "url": the resource url, copied verbatim from the search results
  "summary": one sentence on why this resource, at this level

Never invent urls. If a result is off-topic, leave it out."#;

/// User template for the curation call
const CURATE_USER: &str = r#"The user wants to learn {{subject}} ({{category}}) at the "{{preference}}" level.

Search results:
{{#each results}}
- {{this.title}}
  {{this.url}}
  {{this.snippet}}
{{/each}}"#;

#[derive(Serialize)]
struct CurationContext<'a> {
    subject: &'a str,
    category: &'a str,
    preference: &'a str,
    results: &'a [SearchResult],
}

/// Render the curation user prompt for a request and its search results
pub fn curation_user(request: &LearningRequest, results: &[SearchResult]) -> Result<String> {
    Handlebars::new()
        .render_template(
            CURATE_USER,
            &CurationContext {
                subject: &request.subject,
                category: &request.category,
                preference: request.learning_preference.as_str(),
                results,
            },
        )
        .context("Failed to render curation prompt")
}

/// Parse and validate the curated reply
///
/// Returns the error message to record in the pipeline state on any
/// violation; never panics, never returns a partial list.
pub fn parse_curated(raw: &str) -> Result<Vec<CuratedResource>, String> {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| format!("Curated reply is not valid JSON: {}", e))?;

    if !value.is_array() {
        return Err("Curated reply is not a JSON array".to_string());
    }

    let resources: Vec<CuratedResource> =
        serde_json::from_value(value).map_err(|e| format!("Curated entry is missing required keys: {}", e))?;

    if resources.is_empty() {
        return Err("Curated reply contained no resources".to_string());
    }

    if let Some(bad) = resources.iter().find(|r| !r.is_valid()) {
        return Err(format!(
            "Curated entry '{}' has an empty field or a non-absolute url",
            bad.title
        ));
    }

    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LearningPreference;

    fn results() -> Vec<SearchResult> {
        vec![SearchResult {
            title: "Kubernetes Basics".to_string(),
            url: "https://kubernetes.io/docs/tutorials/".to_string(),
            snippet: "Official tutorials".to_string(),
            score: Some(0.9),
        }]
    }

    #[test]
    fn test_curation_user_embeds_everything() {
        let request = LearningRequest::new("Kubernetes", "DevOps", LearningPreference::CoreConcepts);
        let prompt = curation_user(&request, &results()).unwrap();

        assert!(prompt.contains("Kubernetes"));
        assert!(prompt.contains("DevOps"));
        assert!(prompt.contains("core_concepts"));
        assert!(prompt.contains("https://kubernetes.io/docs/tutorials/"));
    }

    #[test]
    fn test_parse_curated_valid() {
        let raw = r#"[
            {"title": "A", "url": "https://a.example", "summary": "First."},
            {"title": "B", "url": "https://b.example", "summary": "Second."},
            {"title": "C", "url": "https://c.example", "summary": "Third."}
        ]"#;

        let resources = parse_curated(raw).unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[0].title, "A");
    }

    #[test]
    fn test_parse_curated_strips_fences() {
        let raw = "```json\n[{\"title\": \"A\", \"url\": \"https://a.example\", \"summary\": \"First.\"}]\n```";
        assert_eq!(parse_curated(raw).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_curated_rejects_non_array() {
        assert!(parse_curated(r#"{"title": "A"}"#).is_err());
        assert!(parse_curated("here you go!").is_err());
    }

    #[test]
    fn test_parse_curated_rejects_missing_summary() {
        let raw = r#"[
            {"title": "A", "url": "https://a.example", "summary": "First."},
            {"title": "B", "url": "https://b.example"}
        ]"#;

        // The whole list is rejected, not trimmed to the valid entries
        let err = parse_curated(raw).unwrap_err();
        assert!(err.contains("missing required keys"));
    }

    #[test]
    fn test_parse_curated_rejects_relative_url() {
        let raw = r#"[{"title": "A", "url": "/docs/a", "summary": "First."}]"#;
        assert!(parse_curated(raw).is_err());
    }

    #[test]
    fn test_parse_curated_rejects_empty_array() {
        assert!(parse_curated("[]").is_err());
    }
}
