//! Tutor - learning-assistant core
//!
//! CLI entry point for the chat session and lesson-plan commands.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use tutor::cli::{Cli, Command, get_log_path};
use tutor::config::Config;
use tutor::domain::{RequestStatus, resolve_reference};
use tutor::pipeline::LessonPlanPipeline;
use tutor::repl::{self, print_resources};
use tutor::state::{StateManager, reconcile};
use tutor::{llm, search};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to the log file, not stdout/stderr - chat output stays clean
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Tutor loaded config: llm={}/{}, search={}",
        config.llm.provider, config.llm.model, config.search.provider
    );

    match cli.command {
        None | Some(Command::Chat) => repl::run_interactive(&config).await,
        Some(Command::Plan { request }) => cmd_plan(&config, &request).await,
        Some(Command::List { status }) => cmd_list(&config, status).await,
        Some(Command::Show { request }) => cmd_show(&config, &request).await,
        Some(Command::Delete { request }) => cmd_delete(&config, &request).await,
        Some(Command::Repair) => cmd_repair(&config).await,
    }
}

/// Spawn the StateManager over the configured store directory
fn open_state(config: &Config) -> Result<StateManager> {
    let store_path = PathBuf::from(&config.storage.store_dir);
    if !store_path.exists() {
        fs::create_dir_all(&store_path).context("Failed to create store directory")?;
    }
    StateManager::spawn(&store_path).context("Failed to spawn StateManager")
}

/// Resolve a partial request reference or exit with the candidates
async fn resolve_request_id(state: &StateManager, reference: &str) -> Result<String> {
    let requests = state
        .list_requests(None)
        .await
        .map_err(|e| eyre::eyre!("Failed to list requests: {}", e))?;

    let ids: Vec<&str> = requests.iter().map(|r| r.id.as_str()).collect();
    match resolve_reference(ids, reference) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(eyre::eyre!("No request matches '{}'", reference)),
        Err(candidates) => Err(eyre::eyre!(
            "'{}' is ambiguous, candidates: {}",
            reference,
            candidates.join(", ")
        )),
    }
}

/// Generate a lesson plan for a captured request (batch mode)
async fn cmd_plan(config: &Config, reference: &str) -> Result<()> {
    config.validate()?;

    let state = open_state(config)?;
    let id = resolve_request_id(&state, reference).await?;
    let mut request = state
        .get_request_required(&id)
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;

    if request.status == RequestStatus::Processing {
        return Err(eyre::eyre!("A plan run is already in flight for {}", request.id));
    }

    let llm_client = llm::create_client(&config.llm).context("Failed to create LLM client")?;
    let search_client = search::create_client(&config.search).context("Failed to create search client")?;
    let pipeline = LessonPlanPipeline::new(llm_client, search_client, state.clone(), config.search.max_results);

    request.set_status(RequestStatus::Processing);
    state
        .update_request(request.clone())
        .await
        .map_err(|e| eyre::eyre!("Failed to update request: {}", e))?;

    println!("Generating a reading list for {}...", request.subject.bold());
    let result = pipeline.run(request).await?;

    if result.request.is_completed() {
        println!();
        print_resources(&result.curated_plan);
        println!();
        println!(
            "✓ Lesson plan {} saved",
            result.request.lesson_plan_id.as_deref().unwrap_or("?")
        );
        Ok(())
    } else {
        let mut restored = result.request.clone();
        restored.set_status(RequestStatus::Pending);
        state
            .update_request(restored)
            .await
            .map_err(|e| eyre::eyre!("Failed to restore request status: {}", e))?;

        println!(
            "✗ Couldn't build a plan: {}",
            result.error.as_deref().unwrap_or("unknown failure")
        );
        std::process::exit(1);
    }
}

/// List learning requests
async fn cmd_list(config: &Config, status: Option<String>) -> Result<()> {
    let state = open_state(config)?;
    let requests = state
        .list_requests(status)
        .await
        .map_err(|e| eyre::eyre!("Failed to list requests: {}", e))?;

    if requests.is_empty() {
        println!("No learning requests.");
        return Ok(());
    }

    for request in requests {
        println!(
            "{}  {} ({}) - {} [{}]",
            request.id,
            request.subject,
            request.category,
            request.learning_preference,
            request.status
        );
    }
    Ok(())
}

/// Show a request and its lesson plan
async fn cmd_show(config: &Config, reference: &str) -> Result<()> {
    let state = open_state(config)?;
    let id = resolve_request_id(&state, reference).await?;
    let request = state
        .get_request_required(&id)
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;

    println!("{}", request.subject.bold());
    println!("  id:         {}", request.id);
    println!("  category:   {}", request.category);
    println!("  preference: {}", request.learning_preference);
    println!("  status:     {}", request.status);

    if let Some(plan_id) = &request.lesson_plan_id {
        match state
            .get_plan(plan_id)
            .await
            .map_err(|e| eyre::eyre!("Failed to load plan: {}", e))?
        {
            Some(plan) => {
                println!("  plan:       {} ({} resources)", plan.id, plan.resources.len());
                println!();
                print_resources(&plan.resources);
            }
            None => println!("  plan:       {} (missing from store)", plan_id),
        }
    }
    Ok(())
}

/// Delete a request and its lesson plan
async fn cmd_delete(config: &Config, reference: &str) -> Result<()> {
    let state = open_state(config)?;
    let id = resolve_request_id(&state, reference).await?;

    let removed = state
        .delete_request(&id)
        .await
        .map_err(|e| eyre::eyre!("Failed to delete request: {}", e))?;

    println!("Deleted {} and {} dependent plan(s)", id, removed);
    Ok(())
}

/// Reconcile requests whose plan exists but whose completion was lost
async fn cmd_repair(config: &Config) -> Result<()> {
    let state = open_state(config)?;
    let stats = reconcile(&state).await?;
    println!("Repair finished: {}", stats);
    Ok(())
}
