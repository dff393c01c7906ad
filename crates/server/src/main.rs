//! Cold-calling assistant command line
//!
//! Configuration priority: env vars > config/{env}.yaml > config/default.yaml > defaults

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cold_call_agent::{
    AdaptivePatternStore, CallManager, ConversationMemory, MemoryConfig, PatternStoreConfig,
    ResponseCache, ResponseCacheConfig,
};
use cold_call_config::{load_settings, Settings};
use cold_call_core::{Clock, LanguageModel, SystemClock};
use cold_call_llm::{OpenAIBackend, OpenAIConfig};
use cold_call_persistence::DocumentStore;
use cold_call_server::{init_tracing, parse_events, replay, ScriptedModel};

/// Cold-calling assistant: replay transcripts and inspect learned state
#[derive(Parser)]
#[command(name = "cold-call", version, about)]
struct Cli {
    /// Configuration environment (loads config/{env})
    #[arg(short, long, env = "COLD_CALL_ENV")]
    env: Option<String>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines transcript of fragment, tick and end events
    Replay {
        /// Transcript file
        file: PathBuf,
        /// Answer from this file (one reply per line) instead of the model
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Re-rank frequent queries and print cache, pattern and memory statistics
    Stats,
    /// Drop expired cache entries
    Purge,
    /// Print best practices and improvement hints
    Insights,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match load_settings(cli.env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };
    if let Some(dir) = &cli.data_dir {
        settings.persistence.data_dir = dir.clone();
    }

    init_tracing(&settings.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = cli.env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    match run(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, settings: Settings) -> anyhow::Result<()> {
    let store = cold_call_persistence::init(&settings.persistence);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        Command::Replay { file, script } => cmd_replay(&settings, store, clock, &file, script).await,
        Command::Stats => cmd_stats(&settings, store, clock).await,
        Command::Purge => cmd_purge(&settings, store, clock).await,
        Command::Insights => cmd_insights(&settings, store, clock).await,
    }
}

async fn cmd_replay(
    settings: &Settings,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    file: &Path,
    script: Option<PathBuf>,
) -> anyhow::Result<()> {
    let input = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let events = parse_events(&input)?;

    let llm: Arc<dyn LanguageModel> = match script {
        Some(path) => Arc::new(
            ScriptedModel::from_file(&path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => Arc::new(OpenAIBackend::new(OpenAIConfig::from(&settings.llm))?),
    };
    tracing::info!(model = llm.model_name(), events = events.len(), "Replaying transcript");

    let manager = CallManager::from_settings(settings, store, llm, clock).await?;
    let summary = replay(&manager, &events).await?;
    manager.flush().await?;

    for line in &summary.transcript {
        println!("{}", line);
    }
    println!(
        "\n{} utterances, {} replies, {} failed, {} calls ended",
        summary.utterances, summary.replies, summary.failed_replies, summary.calls_ended
    );
    Ok(())
}

async fn cmd_stats(
    settings: &Settings,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    let cache =
        ResponseCache::open(store.clone(), ResponseCacheConfig::from(&settings.cache), clock.clone())
            .await;
    let frequent = cache.analyze_frequent_queries().await?;
    let patterns = AdaptivePatternStore::open(
        store.clone(),
        PatternStoreConfig::from(&settings.learning),
        clock.clone(),
    )
    .await;
    let memory =
        ConversationMemory::open(store, MemoryConfig::from(&settings.learning), clock).await;

    let report = serde_json::json!({
        "cache": cache.stats(),
        "frequent_queries": frequent,
        "patterns": patterns.stats(),
        "memory": memory.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_purge(
    settings: &Settings,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    let cache = ResponseCache::open(store, ResponseCacheConfig::from(&settings.cache), clock).await;
    let removed = cache.purge_expired().await?;
    // Entries already expired at load are dropped in memory; persist that too
    cache.flush().await?;
    println!("Removed {} expired entries, {} remain", removed, cache.len());
    Ok(())
}

async fn cmd_insights(
    settings: &Settings,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    let memory =
        ConversationMemory::open(store, MemoryConfig::from(&settings.learning), clock).await;

    println!("{}", serde_json::to_string_pretty(&memory.best_practices())?);
    for hint in memory.improvement_hints() {
        println!("{}", hint);
    }
    Ok(())
}
