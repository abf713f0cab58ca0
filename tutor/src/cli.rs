//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tutor - learning-assistant core
#[derive(Parser)]
#[command(
    name = "tutor",
    about = "Conversational learning assistant: capture a subject, generate a reading list",
    version,
    after_help = "Logs are written to: ~/.local/share/tutor/logs/tutor.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive chat session (default)
    Chat,

    /// Generate a lesson plan for a captured request
    Plan {
        /// Request id (full id, hex prefix, or slug fragment)
        request: String,
    },

    /// List learning requests
    List {
        /// Filter by status (pending, processing, completed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a request and its lesson plan
    Show {
        /// Request id (full id, hex prefix, or slug fragment)
        request: String,
    },

    /// Delete a request and its lesson plan
    Delete {
        /// Request id (full id, hex prefix, or slug fragment)
        request: String,
    },

    /// Reconcile requests whose lesson plan exists but whose completion was lost
    Repair,
}

/// Path to the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutor")
        .join("logs")
        .join("tutor.log")
}
