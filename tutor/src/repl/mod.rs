//! Interactive chat front-end

mod session;

pub use session::{ChatSession, print_resources};

use std::fs;
use std::path::PathBuf;

use eyre::{Context, Result};

use crate::config::Config;
use crate::dialogue::DialogueEngine;
use crate::pipeline::LessonPlanPipeline;
use crate::state::StateManager;
use crate::{llm, search};

/// Wire up the clients and run an interactive chat session
pub async fn run_interactive(config: &Config) -> Result<()> {
    config.validate()?;

    let store_path = PathBuf::from(&config.storage.store_dir);
    if !store_path.exists() {
        fs::create_dir_all(&store_path).context("Failed to create store directory")?;
    }

    let state = StateManager::spawn(&store_path).context("Failed to spawn StateManager")?;
    let llm_client = llm::create_client(&config.llm).context("Failed to create LLM client")?;
    let search_client = search::create_client(&config.search).context("Failed to create search client")?;

    let engine = DialogueEngine::new(llm_client.clone(), &config.dialogue);
    let pipeline = LessonPlanPipeline::new(llm_client, search_client, state.clone(), config.search.max_results);

    let mut session = ChatSession::new(engine, state, pipeline);
    session.run().await
}
