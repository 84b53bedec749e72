//! Guild CLI - governed multi-agent project workflow
//!
//! Usage:
//!   guild init [path]                 Initialize Guild in a directory
//!   guild run <idea...>               Drive a project from idea to delivery
//!   guild status                      Show the last recorded run status
//!   guild decisions list              List decision records
//!   guild decisions propose ...       Propose a decision record
//!   guild decisions accept <id>       Accept a proposed decision record
//!   guild artifacts list              List stored deliverables

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use guild_agent::spawn_template_team;
use guild_bus::MessageBus;
use guild_core::config::GUILD_DIR;
use guild_core::fail_open::fail_open;
use guild_core::{GuildConfig, ReviewDecision};
use guild_memory::{
    ArtifactStore, DecisionLog, DecisionStatus, DeliverableRegistry, GovernanceLedger,
    NewDecision,
};
use guild_orchestrator::{Blocker, Orchestrator, OrchestratorConfig, StatusSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STATUS_FILE: &str = "status.json";

#[derive(Parser)]
#[command(name = "guild")]
#[command(author, version, about = "Governed multi-agent project workflow")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Guild in a directory
    Init {
        /// Directory to initialize (defaults to the workspace root)
        path: Option<PathBuf>,
    },

    /// Drive a project from idea to delivery with the template team
    Run {
        /// Project idea
        #[arg(required = true)]
        idea: Vec<String>,

        /// Abort after this many seconds (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Scripted review outcomes in order (GO, CONDITIONAL GO, NO-GO)
        #[arg(long = "review", value_name = "DECISION")]
        reviews: Vec<String>,

        /// Print the final status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the status recorded by the last run
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decision record management
    Decisions {
        #[command(subcommand)]
        action: DecisionCommands,
    },

    /// Deliverable management
    Artifacts {
        #[command(subcommand)]
        action: ArtifactCommands,
    },
}

#[derive(Subcommand)]
enum DecisionCommands {
    /// List decision records
    List {
        /// Only records with this status (proposed, accepted, deprecated, rejected)
        #[arg(long)]
        status: Option<String>,
    },

    /// Propose a new decision record
    Propose {
        #[arg(long)]
        title: String,

        #[arg(long)]
        decision: String,

        /// Why the decision is needed
        #[arg(long)]
        context: Option<String>,

        /// Constraint imposed by the decision (repeatable)
        #[arg(long = "constraint", value_name = "TEXT")]
        constraints: Vec<String>,

        #[arg(long, default_value = "human")]
        author: String,

        /// Id of the record this one replaces
        #[arg(long, value_name = "ID")]
        supersedes: Option<String>,
    },

    /// Accept a proposed decision record
    Accept {
        /// Record id (e.g. ADR-001)
        id: String,
    },
}

#[derive(Subcommand)]
enum ArtifactCommands {
    /// List stored deliverables
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = GuildConfig::load_or_default(&cli.root).context("Failed to load config")?;

    // RUST_LOG wins over --verbose and the configured level
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { path } => cmd_init(path.unwrap_or(cli.root)).await,
        Commands::Run {
            idea,
            timeout_secs,
            reviews,
            json,
        } => cmd_run(&cli.root, &config, idea.join(" "), timeout_secs, reviews, json).await,
        Commands::Status { json } => cmd_status(&cli.root, json).await,
        Commands::Decisions { action } => cmd_decisions(&cli.root, &config, action).await,
        Commands::Artifacts { action } => cmd_artifacts(&cli.root, &config, action).await,
    }
}

async fn cmd_init(path: PathBuf) -> Result<()> {
    info!("Initializing Guild in {:?}", path);

    let config_path = GuildConfig::write_default(&path).context("Failed to write config")?;
    let config = GuildConfig::default();
    ArtifactStore::open(config.artifacts_dir(&path))
        .await
        .context("Failed to create artifacts directory")?;
    DecisionLog::open(config.decisions_dir(&path))
        .await
        .context("Failed to create decisions directory")?;

    println!("Initialized Guild in {:?}", path);
    println!("Created:");
    println!("  {}", config_path.display());
    println!("  {}/", config.storage.artifacts_dir.display());
    println!("  {}/", config.storage.decisions_dir.display());

    Ok(())
}

async fn cmd_run(
    root: &Path,
    config: &GuildConfig,
    idea: String,
    timeout_secs: Option<u64>,
    reviews: Vec<String>,
    json: bool,
) -> Result<()> {
    let reviews = reviews
        .iter()
        .map(|r| r.parse::<ReviewDecision>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;

    let bus = Arc::new(MessageBus::from_config(&config.bus));
    let store = Arc::new(
        ArtifactStore::open(config.artifacts_dir(root))
            .await
            .context("Failed to open artifact store")?,
    );
    let log = Arc::new(
        DecisionLog::open(config.decisions_dir(root))
            .await
            .context("Failed to open decision log")?,
    );

    let team_cancel = CancellationToken::new();
    let team = spawn_template_team(
        Arc::clone(&bus),
        Arc::clone(&store),
        Arc::clone(&log),
        reviews,
        team_cancel.clone(),
    );

    let mut orchestrator = Orchestrator::with_config(
        OrchestratorConfig::from_run(&config.run),
        Arc::clone(&bus),
        Arc::clone(&log) as Arc<dyn GovernanceLedger>,
        Arc::clone(&store) as Arc<dyn DeliverableRegistry>,
    );

    orchestrator
        .start_project(idea)
        .await
        .context("Failed to start project")?;

    let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.run.timeout_secs));
    let run_cancel = CancellationToken::new();
    let stopper = {
        let cancel = run_cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => warn!("Run timed out after {:?}", timeout),
                _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
            }
            cancel.cancel();
        })
    };

    let snapshot = orchestrator.run(run_cancel).await;
    stopper.abort();

    team_cancel.cancel();
    for handle in team {
        if let Err(e) = handle.await {
            warn!("Worker task ended abnormally: {}", e);
        }
    }

    fail_open("save_status", || save_status(root, &snapshot)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }

    if !snapshot.complete {
        warn!("Workflow stopped before completion in {}", snapshot.phase);
    }

    Ok(())
}

async fn save_status(root: &Path, snapshot: &StatusSnapshot) -> guild_core::Result<()> {
    let dir = root.join(GUILD_DIR);
    tokio::fs::create_dir_all(&dir).await?;
    let content = serde_json::to_string_pretty(snapshot)?;
    tokio::fs::write(dir.join(STATUS_FILE), content).await?;
    Ok(())
}

async fn cmd_status(root: &Path, json: bool) -> Result<()> {
    let path = root.join(GUILD_DIR).join(STATUS_FILE);
    if !path.exists() {
        println!("No run recorded yet. Start one with `guild run <idea>`.");
        return Ok(());
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;

    if json {
        println!("{}", content);
        return Ok(());
    }

    let snapshot: StatusSnapshot =
        serde_json::from_str(&content).context("Failed to parse status file")?;
    print_snapshot(&snapshot);
    Ok(())
}

fn print_snapshot(snapshot: &StatusSnapshot) {
    let history: Vec<&str> = snapshot.history.iter().map(|p| p.as_str()).collect();

    println!("Guild Status");
    println!("============");
    println!("Phase:        {} ({}%)", snapshot.phase, snapshot.progress);
    println!("Responsible:  {}", snapshot.responsible);
    println!("Deliverables: {}", snapshot.deliverables_received);
    println!("Elapsed:      {}s", snapshot.elapsed_secs);
    println!("History:      {}", history.join(" -> "));
    println!(
        "Outcome:      {}",
        if snapshot.complete { "complete" } else { "incomplete" }
    );

    if !snapshot.blockers.is_empty() {
        println!("\nBlockers: {}", snapshot.blocker_count);
        for blocker in &snapshot.blockers {
            match blocker {
                Blocker::Clarification {
                    from,
                    question,
                    blocking,
                    phase,
                    ..
                } => println!(
                    "  [{}] {} asks{}: {}",
                    phase,
                    from,
                    if *blocking { " (blocking)" } else { "" },
                    question
                ),
                Blocker::Error {
                    from,
                    error_type,
                    message,
                    phase,
                    raised_at,
                } => println!(
                    "  [{}] {} error {} at {}: {}",
                    phase,
                    from,
                    error_type,
                    raised_at.format("%H:%M:%S"),
                    message
                ),
            }
        }
    }
}

async fn cmd_decisions(root: &Path, config: &GuildConfig, action: DecisionCommands) -> Result<()> {
    let log = DecisionLog::open(config.decisions_dir(root))
        .await
        .context("Failed to open decision log")?;

    match action {
        DecisionCommands::List { status } => {
            let records = match status {
                Some(status) => {
                    let status: DecisionStatus = status.parse()?;
                    log.list_by_status(status).await?
                }
                None => log.list_all().await,
            };

            if records.is_empty() {
                println!("No decision records");
                return Ok(());
            }

            for record in records {
                println!("{} [{}] {}", record.id, record.status, record.title);
                println!("  {}", record.decision);
                for constraint in &record.constraints {
                    println!("  - {}", constraint);
                }
            }
        }

        DecisionCommands::Propose {
            title,
            decision,
            context,
            constraints,
            author,
            supersedes,
        } => {
            let mut new = NewDecision::new(title, decision).with_author(author);
            if let Some(context) = context {
                new = new.with_context(context);
            }
            if let Some(previous) = supersedes {
                if log.get(&previous).await.is_none() {
                    bail!("Unknown decision record {}", previous);
                }
                new = new.superseding(previous);
            }
            for constraint in constraints {
                new = new.with_constraint(constraint);
            }

            let record = log.propose(new).await?;
            println!("Proposed {}: {}", record.id, record.title);
        }

        DecisionCommands::Accept { id } => {
            if !log.accept(&id).await? {
                bail!("{} is not a proposed decision record", id);
            }
            println!("Accepted {}", id);
        }
    }

    Ok(())
}

async fn cmd_artifacts(root: &Path, config: &GuildConfig, action: ArtifactCommands) -> Result<()> {
    let store = ArtifactStore::open(config.artifacts_dir(root))
        .await
        .context("Failed to open artifact store")?;

    match action {
        ArtifactCommands::List => {
            let artifacts = store.list_all().await;
            if artifacts.is_empty() {
                println!("No artifacts");
                return Ok(());
            }

            for artifact in artifacts {
                println!(
                    "{:<24} {:<14} {:<12} {} bytes",
                    artifact.name,
                    artifact.kind.dir_name(),
                    artifact.created_by,
                    artifact.size
                );
            }
        }
    }

    Ok(())
}
