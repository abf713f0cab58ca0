//! Interactive chat session
//!
//! Drives the dialogue engine turn by turn and exposes the lesson-plan
//! pipeline and store operations as slash commands.

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::dialogue::{CapturedRequest, DialogueEngine};
use crate::domain::{ContentItem, CuratedResource, LearningRequest, LessonPlan, RequestStatus, resolve_reference};
use crate::pipeline::LessonPlanPipeline;
use crate::state::{StateManager, reconcile};

/// Interactive chat session
pub struct ChatSession {
    engine: DialogueEngine,
    state: StateManager,
    pipeline: LessonPlanPipeline,
    /// Session id for the dialogue engine; one per chat run
    session_id: String,
    /// Last resource removed via /drop, for /undo
    last_removed: Option<(String, usize, CuratedResource)>,
}

enum SlashResult {
    Continue,
    Quit,
}

impl ChatSession {
    /// Create a new chat session
    pub fn new(engine: DialogueEngine, state: StateManager, pipeline: LessonPlanPipeline) -> Self {
        Self {
            engine,
            state,
            pipeline,
            session_id: uuid::Uuid::now_v7().to_string(),
            last_removed: None,
        }
    }

    /// Run the chat main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await? {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_message(input).await?;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Tutor".bright_cyan().bold());
        println!("Tell me what you'd like to learn and I'll put a reading list together.");
        println!("Type {} for commands, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// One dialogue turn; persists the request when the dialogue completes
    async fn process_message(&mut self, input: &str) -> Result<()> {
        let turn = match self.engine.handle_message(&self.session_id, input).await {
            Ok(turn) => turn,
            Err(e) => {
                // A transport failure fails the turn, not the session
                println!("{} {}", "error:".red(), e);
                return Ok(());
            }
        };

        println!("{}", turn.reply);

        if let Some(captured) = turn.captured {
            let id = self.persist_captured(captured).await?;
            println!(
                "{} Saved as {}. Run {} to generate its reading list.",
                "*".bright_green(),
                id.bold(),
                format!("/plan {}", short_ref(&id)).yellow()
            );
        }

        Ok(())
    }

    async fn persist_captured(&self, captured: CapturedRequest) -> Result<String> {
        let request = LearningRequest::new(captured.subject, captured.category, captured.learning_preference);
        let id = self
            .state
            .create_request(request)
            .await
            .map_err(|e| eyre::eyre!("Failed to persist learning request: {}", e))?;
        Ok(id)
    }

    /// Handle slash commands
    async fn handle_slash_command(&mut self, input: &str) -> Result<SlashResult> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                Ok(SlashResult::Continue)
            }
            "/quit" | "/q" | "/exit" => Ok(SlashResult::Quit),
            "/list" | "/l" => {
                self.cmd_list().await?;
                Ok(SlashResult::Continue)
            }
            "/plan" | "/p" => {
                match parts.get(1) {
                    Some(reference) => self.cmd_plan(reference).await?,
                    None => println!("Usage: /plan <request>"),
                }
                Ok(SlashResult::Continue)
            }
            "/save" => {
                match (parts.get(1), parts.get(2).and_then(|n| n.parse::<usize>().ok())) {
                    (Some(reference), Some(n)) => self.cmd_save(reference, n).await?,
                    _ => println!("Usage: /save <request> <resource-number>"),
                }
                Ok(SlashResult::Continue)
            }
            "/drop" => {
                match (parts.get(1), parts.get(2).and_then(|n| n.parse::<usize>().ok())) {
                    (Some(reference), Some(n)) => self.cmd_drop(reference, n).await?,
                    _ => println!("Usage: /drop <request> <resource-number>"),
                }
                Ok(SlashResult::Continue)
            }
            "/undo" => {
                self.cmd_undo().await?;
                Ok(SlashResult::Continue)
            }
            "/delete" => {
                match parts.get(1) {
                    Some(reference) => self.cmd_delete(reference).await?,
                    None => println!("Usage: /delete <request>"),
                }
                Ok(SlashResult::Continue)
            }
            "/repair" => {
                let stats = reconcile(&self.state).await?;
                println!("Repair finished: {}", stats);
                Ok(SlashResult::Continue)
            }
            _ => {
                println!("Unknown command: {}. Type {} for help.", cmd, "/help".yellow());
                Ok(SlashResult::Continue)
            }
        }
    }

    fn print_help(&self) {
        println!("Commands:");
        println!("  {}              List learning requests", "/list".yellow());
        println!("  {}    Generate a reading list", "/plan <request>".yellow());
        println!("  {}  Save a resource for later", "/save <request> <n>".yellow());
        println!("  {}  Remove a resource from a plan", "/drop <request> <n>".yellow());
        println!("  {}              Restore the last dropped resource", "/undo".yellow());
        println!("  {}  Delete a request and its plan", "/delete <request>".yellow());
        println!("  {}            Reconcile interrupted plan runs", "/repair".yellow());
        println!("  {}              Quit", "/quit".yellow());
        println!("Anything else is part of the conversation.");
    }

    async fn cmd_list(&self) -> Result<()> {
        let requests = self
            .state
            .list_requests(None)
            .await
            .map_err(|e| eyre::eyre!("Failed to list requests: {}", e))?;

        if requests.is_empty() {
            println!("No learning requests yet.");
            return Ok(());
        }

        for request in requests {
            println!(
                "  {}  {} ({}) - {} [{}]",
                short_ref(&request.id).bold(),
                request.subject,
                request.category,
                request.learning_preference,
                status_label(request.status),
            );
        }
        Ok(())
    }

    async fn cmd_plan(&mut self, reference: &str) -> Result<()> {
        let Some(mut request) = self.resolve_request(reference).await? else {
            return Ok(());
        };

        if request.status == RequestStatus::Processing {
            println!("A plan run is already in flight for {}.", request.id);
            return Ok(());
        }

        // Mark the run in flight; restored below if nothing gets persisted
        request.set_status(RequestStatus::Processing);
        self.state
            .update_request(request.clone())
            .await
            .map_err(|e| eyre::eyre!("Failed to update request: {}", e))?;

        println!("Generating a reading list for {}...", request.subject.bold());
        let state = match self.pipeline.run(request.clone()).await {
            Ok(state) => state,
            Err(e) => {
                // Persistence failed partway; /repair reconciles, /plan retries
                println!("{} {}", "error:".red(), e);
                return Ok(());
            }
        };

        if state.request.is_completed() {
            println!();
            print_resources(&state.curated_plan);
            println!();
            println!(
                "Saved as {}. {} to keep one for later.",
                state.request.lesson_plan_id.as_deref().unwrap_or("?").bold(),
                format!("/save {} <n>", short_ref(&state.request.id)).yellow()
            );
        } else {
            // Nothing persisted; put the request back the way it was
            let mut restored = state.request.clone();
            restored.set_status(RequestStatus::Pending);
            self.state
                .update_request(restored)
                .await
                .map_err(|e| eyre::eyre!("Failed to restore request status: {}", e))?;

            println!(
                "{} {}",
                "Couldn't build a plan:".red(),
                state.error.as_deref().unwrap_or("unknown failure")
            );
        }

        Ok(())
    }

    async fn cmd_save(&self, reference: &str, n: usize) -> Result<()> {
        let Some((plan, _request)) = self.resolve_plan(reference).await? else {
            return Ok(());
        };

        let Some(resource) = plan.resources.get(n.saturating_sub(1)) else {
            println!("Plan has {} resources; pick 1-{}.", plan.resources.len(), plan.resources.len());
            return Ok(());
        };

        let item = ContentItem::new(&resource.title, &resource.url, &resource.summary).with_plan(plan.id.clone());
        let id = self
            .state
            .create_content(item)
            .await
            .map_err(|e| eyre::eyre!("Failed to save content item: {}", e))?;

        println!("Saved \"{}\" as {}.", resource.title, id.bold());
        Ok(())
    }

    async fn cmd_drop(&mut self, reference: &str, n: usize) -> Result<()> {
        let Some((mut plan, _request)) = self.resolve_plan(reference).await? else {
            return Ok(());
        };

        let index = n.saturating_sub(1);
        let Some(removed) = plan.remove_resource(index) else {
            println!("Plan has {} resources; pick 1-{}.", plan.resources.len(), plan.resources.len());
            return Ok(());
        };

        self.state
            .update_plan(plan.clone())
            .await
            .map_err(|e| eyre::eyre!("Failed to update plan: {}", e))?;

        println!("Dropped \"{}\". {} to restore it.", removed.title, "/undo".yellow());
        self.last_removed = Some((plan.id, index, removed));
        Ok(())
    }

    async fn cmd_undo(&mut self) -> Result<()> {
        let Some((plan_id, index, resource)) = self.last_removed.take() else {
            println!("Nothing to undo.");
            return Ok(());
        };

        let Some(mut plan) = self
            .state
            .get_plan(&plan_id)
            .await
            .map_err(|e| eyre::eyre!("Failed to load plan: {}", e))?
        else {
            println!("That plan no longer exists.");
            return Ok(());
        };

        plan.restore_resource(index, resource.clone());
        self.state
            .update_plan(plan)
            .await
            .map_err(|e| eyre::eyre!("Failed to update plan: {}", e))?;

        println!("Restored \"{}\".", resource.title);
        Ok(())
    }

    async fn cmd_delete(&self, reference: &str) -> Result<()> {
        let Some(request) = self.resolve_request(reference).await? else {
            return Ok(());
        };

        let removed = self
            .state
            .delete_request(&request.id)
            .await
            .map_err(|e| eyre::eyre!("Failed to delete request: {}", e))?;

        println!("Deleted {} and {} dependent plan(s).", request.id, removed);
        Ok(())
    }

    /// Resolve a partial reference to a stored request, reporting problems to
    /// the user rather than failing
    async fn resolve_request(&self, reference: &str) -> Result<Option<LearningRequest>> {
        let requests = self
            .state
            .list_requests(None)
            .await
            .map_err(|e| eyre::eyre!("Failed to list requests: {}", e))?;

        let ids: Vec<&str> = requests.iter().map(|r| r.id.as_str()).collect();
        match resolve_reference(ids, reference) {
            Ok(Some(id)) => Ok(requests.into_iter().find(|r| r.id == id)),
            Ok(None) => {
                println!("No request matches \"{}\". Try {}.", reference, "/list".yellow());
                Ok(None)
            }
            Err(candidates) => {
                println!("\"{}\" is ambiguous:", reference);
                for candidate in candidates {
                    println!("  {}", candidate);
                }
                Ok(None)
            }
        }
    }

    /// Resolve a request reference to its lesson plan
    async fn resolve_plan(&self, reference: &str) -> Result<Option<(LessonPlan, LearningRequest)>> {
        let Some(request) = self.resolve_request(reference).await? else {
            return Ok(None);
        };

        let Some(plan_id) = request.lesson_plan_id.clone() else {
            println!(
                "{} has no lesson plan yet. Run {} first.",
                request.subject,
                format!("/plan {}", short_ref(&request.id)).yellow()
            );
            return Ok(None);
        };

        let plan = self
            .state
            .get_plan(&plan_id)
            .await
            .map_err(|e| eyre::eyre!("Failed to load plan: {}", e))?;

        match plan {
            Some(plan) => Ok(Some((plan, request))),
            None => {
                println!("Plan {} is missing from the store.", plan_id);
                Ok(None)
            }
        }
    }
}

/// Print a numbered reading list
pub fn print_resources(resources: &[CuratedResource]) {
    for (i, resource) in resources.iter().enumerate() {
        println!("  {}. {}", i + 1, resource.title.bold());
        println!("     {}", resource.url.underline());
        println!("     {}", resource.summary.dimmed());
    }
}

/// The 6-char hex prefix of an id, for compact display
fn short_ref(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

fn status_label(status: RequestStatus) -> colored::ColoredString {
    match status {
        RequestStatus::Pending => "pending".yellow(),
        RequestStatus::Processing => "processing".cyan(),
        RequestStatus::Completed => "completed".green(),
    }
}
