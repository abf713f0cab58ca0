//! Lesson-plan pipeline
//!
//! Four strictly sequential stages over a shared state record: query
//! formulation, web search, LLM curation, persistence. Remote failures
//! degrade into the state's `error` field instead of aborting; once a stage
//! halts, downstream stages skip their remote work but still contribute
//! their empty results, so the final state always has the same shape.
//! Persistence failures are the one exception: they propagate to the caller.

mod curation;

pub use curation::{CURATE_SYSTEM, parse_curated};

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info, warn};

use crate::domain::{CuratedResource, LearningRequest, LessonPlan};
use crate::llm::{CompletionRequest, LlmClient};
use crate::search::{SearchClient, SearchResult};
use crate::state::StateManager;

/// Max tokens for the curation reply
const CURATE_MAX_TOKENS: u32 = 1024;

/// Shared state threaded through the four stages
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// The request being planned for; refreshed after a successful save
    pub request: LearningRequest,
    /// Stage 1 output
    pub search_query: String,
    /// Stage 2 output
    pub search_results: Vec<SearchResult>,
    /// Stage 3 output
    pub curated_plan: Vec<CuratedResource>,
    /// First failure recorded by any stage, if any
    pub error: Option<String>,
}

impl PipelineState {
    fn new(request: LearningRequest) -> Self {
        Self {
            request,
            search_query: String::new(),
            search_results: Vec::new(),
            curated_plan: Vec::new(),
            error: None,
        }
    }

    /// Whether any stage recorded a failure
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Whether the chain continues with remote work or skips to the no-op paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageOutcome {
    Continue,
    Halt,
}

/// Stage 1: deterministic search query from the request
///
/// Pure function: identical input yields an identical query.
pub fn formulate_query(request: &LearningRequest) -> String {
    format!(
        "tutorial for {} of {} in {}",
        request.learning_preference, request.subject, request.category
    )
}

/// The lesson-plan pipeline
///
/// One instance can serve many runs; it holds no cross-invocation state.
/// Concurrent runs for *different* requests are safe; the caller prevents
/// concurrent runs for the same request.
pub struct LessonPlanPipeline {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    state: StateManager,
    max_results: usize,
}

impl LessonPlanPipeline {
    /// Create a pipeline over the given clients and store handle
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchClient>, state: StateManager, max_results: usize) -> Self {
        Self {
            llm,
            search,
            state,
            max_results,
        }
    }

    /// Run the pipeline once for an already-persisted request
    ///
    /// Returns the final state; the caller surfaces `curated_plan`/`error`.
    /// Only persistence failures surface as `Err`.
    pub async fn run(&self, request: LearningRequest) -> Result<PipelineState> {
        info!(request_id = %request.id, subject = %request.subject, "Pipeline run starting");
        let mut state = PipelineState::new(request);

        state.search_query = formulate_query(&state.request);
        debug!(query = %state.search_query, "Formulated search query");

        let outcome = self.call_search(&mut state).await;

        let outcome = match outcome {
            StageOutcome::Continue => self.curate_with_llm(&mut state).await,
            StageOutcome::Halt => self.skip_curation(&mut state),
        };

        match outcome {
            StageOutcome::Continue => self.save_plan(&mut state).await?,
            StageOutcome::Halt => self.skip_save(&mut state),
        }

        info!(
            request_id = %state.request.id,
            resources = state.curated_plan.len(),
            error = ?state.error,
            "Pipeline run finished"
        );
        Ok(state)
    }

    /// Stage 2: web search
    ///
    /// Any failure is absorbed into the state: empty results plus an error.
    async fn call_search(&self, state: &mut PipelineState) -> StageOutcome {
        match self.search.search(&state.search_query, self.max_results).await {
            Ok(results) => {
                info!(count = results.len(), "Search returned results");
                state.search_results = results;
                StageOutcome::Continue
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                state.error = Some(format!("Search failed: {}", e));
                state.search_results = Vec::new();
                StageOutcome::Halt
            }
        }
    }

    /// Stage 3: LLM curation
    ///
    /// Short-circuits to an empty plan without calling the model when there
    /// is nothing to curate; validation failures degrade the same way.
    async fn curate_with_llm(&self, state: &mut PipelineState) -> StageOutcome {
        if state.search_results.is_empty() {
            debug!("No search results, skipping curation call");
            if state.error.is_none() {
                state.error = Some("No search results to curate".to_string());
            }
            state.curated_plan = Vec::new();
            return StageOutcome::Halt;
        }

        let user_prompt = match curation::curation_user(&state.request, &state.search_results) {
            Ok(prompt) => prompt,
            Err(e) => {
                state.error = Some(format!("Curation failed: {}", e));
                state.curated_plan = Vec::new();
                return StageOutcome::Halt;
            }
        };

        let request = CompletionRequest::single_turn(CURATE_SYSTEM, user_prompt, CURATE_MAX_TOKENS);
        let raw = match self.llm.complete(request).await {
            Ok(response) => match response.content {
                Some(text) => text,
                None => {
                    state.error = Some("Curation failed: empty completion".to_string());
                    state.curated_plan = Vec::new();
                    return StageOutcome::Halt;
                }
            },
            Err(e) => {
                warn!(error = %e, "Curation call failed");
                state.error = Some(format!("Curation failed: {}", e));
                state.curated_plan = Vec::new();
                return StageOutcome::Halt;
            }
        };

        match curation::parse_curated(&raw) {
            Ok(resources) => {
                info!(count = resources.len(), "Curated reading list");
                state.curated_plan = resources;
                StageOutcome::Continue
            }
            Err(message) => {
                warn!(%message, "Curated reply rejected");
                state.error = Some(message);
                state.curated_plan = Vec::new();
                StageOutcome::Halt
            }
        }
    }

    /// Stage 3 skip path after an earlier halt
    fn skip_curation(&self, state: &mut PipelineState) -> StageOutcome {
        debug!("Curation skipped by earlier stage failure");
        state.curated_plan = Vec::new();
        if state.error.is_none() {
            state.error = Some("No search results to curate".to_string());
        }
        StageOutcome::Halt
    }

    /// Stage 4: persist the plan and complete the request
    ///
    /// The plan create and the request update are awaited in sequence. If the
    /// create succeeds and the update fails, an orphaned but valid plan
    /// remains; `state::reconcile` repairs that later. Both failures
    /// propagate so the caller can retry explicitly.
    async fn save_plan(&self, state: &mut PipelineState) -> Result<()> {
        let plan = LessonPlan::new(state.request.id.clone(), state.curated_plan.clone());
        let plan_id = self
            .state
            .create_plan(plan)
            .await
            .map_err(|e| eyre::eyre!("Failed to persist lesson plan: {}", e))?;

        let mut request = state.request.clone();
        request.complete_with_plan(plan_id.clone());
        self.state
            .update_request(request.clone())
            .await
            .map_err(|e| eyre::eyre!("Lesson plan {} saved but request update failed: {}", plan_id, e))?;

        info!(request_id = %request.id, %plan_id, "Lesson plan persisted, request completed");
        state.request = request;
        Ok(())
    }

    /// Stage 4 no-op branch: nothing valid to save
    fn skip_save(&self, state: &mut PipelineState) {
        warn!(request_id = %state.request.id, "Skipping persistence, no curated resources");
        if state.error.is_none() {
            state.error = Some("Nothing to save: curation produced no resources".to_string());
        }
    }
}
