//! CLI command definitions using clap.
//!
//! - run: run one activity against the configured reasoning backend
//! - tools: list the tool catalog
//! - show: read recorded activities back

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agentloop::tools::StrategyMode;

/// agentloop - a controllable decision loop for tool-using LLM agents
#[derive(Parser, Debug)]
#[command(name = "agentloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one activity for a user query
    Run {
        /// The user request
        query: String,

        /// Optional goal to steer the reasoner
        #[arg(short, long)]
        goal: Option<String>,

        /// Override controller.max_iterations
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,

        /// Override controller.strategy (auto, sequential, parallel, selective)
        #[arg(short, long)]
        strategy: Option<StrategyMode>,

        /// Append the finished activity to this JSONL file
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Print the full ActivityResult as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tools available to the reasoner
    Tools,

    /// Show recorded activities
    Show {
        /// JSONL activity log
        file: PathBuf,

        /// Only this activity
        #[arg(short, long)]
        id: Option<String>,
    },
}
