use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use agentloop::backend::LlmBackend;
use agentloop::controller::{ActivityEvent, ActivityManager};
use agentloop::domain::{ActivityResult, ActivityStatus};
use agentloop::llm::AnthropicClient;
use agentloop::storage::ActivityLog;
use agentloop::tools::{CurrentTimeTool, EchoTool, StrategyMode, ToolRegistry};
use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("agentloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn demo_registry() -> Result<ToolRegistry> {
    let registry = ToolRegistry::new()
        .with_tool(EchoTool)?
        .with_tool(CurrentTimeTool)?;
    Ok(registry)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            query,
            goal,
            max_iterations,
            strategy,
            record,
            json,
        } => {
            handle_run_command(
                query,
                goal.as_deref(),
                *max_iterations,
                *strategy,
                record.as_deref(),
                *json,
                cli.is_verbose(),
                config,
            )
            .await
        }
        Commands::Tools => handle_tools_command(),
        Commands::Show { file, id } => handle_show_command(file, id.as_deref()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_run_command(
    query: &str,
    goal: Option<&str>,
    max_iterations: Option<u32>,
    strategy: Option<StrategyMode>,
    record: Option<&Path>,
    json: bool,
    verbose: bool,
    config: &Config,
) -> Result<()> {
    info!("Running activity for query: {}", query);

    let client = AnthropicClient::new(config.anthropic_config()).context("Failed to create LLM client")?;
    let backend = Arc::new(LlmBackend::new(client).with_max_tokens(config.llm.max_tokens));
    let registry = Arc::new(demo_registry()?);

    let mut controller = config.controller_config();
    if let Some(n) = max_iterations {
        controller.max_iterations = n;
    }
    if let Some(s) = strategy {
        controller.strategy = s;
    }

    let mut builder = ActivityManager::builder(backend, registry)
        .config(controller)
        .execution(config.execution_config())
        .selective(config.selective_policy())
        .history(config.history_config())
        .termination(config.termination());

    let watcher = if verbose {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        builder = builder.events(tx);
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        }))
    } else {
        None
    };

    let manager = builder.build().context("Invalid controller configuration")?;
    println!("{} {}", "Running:".cyan(), query);
    let result = manager.run(query, goal).await;

    // Closing the sender ends the watcher once it drains
    drop(manager);
    if let Some(handle) = watcher {
        let _ = handle.await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if let Some(path) = record {
        let log = ActivityLog::new(path)?;
        log.append(&result)
            .context(format!("Failed to record activity to {}", path.display()))?;
        println!("{} {}", "Recorded to:".green(), path.display());
    }
    Ok(())
}

fn handle_tools_command() -> Result<()> {
    let registry = demo_registry()?;
    for spec in registry.describe_all() {
        println!("{} - {}", spec.name.green(), spec.description);
        println!("  {}", serde_json::to_string(&spec.parameters)?.dimmed());
    }
    Ok(())
}

fn handle_show_command(file: &Path, id: Option<&str>) -> Result<()> {
    info!("Showing activities from {} (id: {:?})", file.display(), id);
    let log = ActivityLog::new(file)?;

    match id {
        Some(id) => match log.get(id)? {
            Some(result) => print_result(&result),
            None => println!("{} {}", "No activity with id".red(), id),
        },
        None => {
            let results = log.load_all()?;
            if results.is_empty() {
                println!("{}", "No recorded activities".yellow());
            }
            for result in results {
                println!(
                    "{}  {}  {} iteration(s)  {}",
                    result.activity_id,
                    colored_status(result.status),
                    result.iterations,
                    result.user_query
                );
            }
        }
    }
    Ok(())
}

fn colored_status(status: ActivityStatus) -> ColoredString {
    match status {
        ActivityStatus::Success => status.as_str().green(),
        ActivityStatus::Timeout | ActivityStatus::Terminated => status.as_str().yellow(),
        ActivityStatus::ErrorRecoveryExhausted | ActivityStatus::Error => status.as_str().red(),
    }
}

fn print_result(result: &ActivityResult) {
    println!(
        "{} {} after {} iteration(s), {} tool call(s), {}ms",
        "Status:".bold(),
        colored_status(result.status),
        result.iterations,
        result.total_tool_calls,
        result.duration_ms
    );
    if let Some(reason) = &result.termination_reason {
        println!("{} {}", "Reason:".bold(), reason);
    }
    if !result.tools_used.is_empty() {
        println!("{} {}", "Tools:".bold(), result.tools_used.join(", "));
    }
    println!();
    println!("{}", result.final_response);
}

fn print_event(event: &ActivityEvent) {
    match event {
        ActivityEvent::IterationStarted { iteration, state, .. } => {
            println!("{} iteration {} (from {})", "->".cyan(), iteration, state);
        }
        ActivityEvent::Decision { decision, issues, .. } => {
            println!(
                "   decision: {} (confidence {:.2})",
                decision.action_type(),
                decision.confidence()
            );
            for issue in issues {
                println!("   {} {}", "corrected:".yellow(), issue);
            }
        }
        ActivityEvent::ToolsDispatched { strategy, results, .. } => {
            println!("   {:?} dispatch:", strategy);
            for result in results {
                println!("     {}", result.brief());
            }
        }
        ActivityEvent::Recovery { plan, .. } => println!("   {} {}", "recovery:".yellow(), plan),
        ActivityEvent::Finished { status, .. } => println!("{} {}", "done:".cyan(), colored_status(*status)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);
    if let Some(level) = &config.log_level {
        info!("Configured log level: {}", level);
    }

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
