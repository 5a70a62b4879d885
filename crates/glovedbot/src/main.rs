//! Console front end for GlovedBot.

use anyhow::Context;
use clap::{Parser, Subcommand};
use glovedbot::ConsoleSink;
use glovedbot_config::{GlovedConfig, LayeredConfigOptions};
use glovedbot_core::{ChatSession, MemoryEngine, MemoryStats, build_providers};
use glovedbot_memory::{FileMemoryStore, MemoryStore};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Memory directory used when the config leaves `memory.path` unset.
const DEFAULT_MEMORY_PATH: &str = ".glovedbot/chat_logs";

/// Command-line options for the GlovedBot console.
#[derive(Parser)]
#[command(name = "glovedbot", version)]
struct Cli {
    /// Optional path to a glovedbot.json5 config file, applied over the layered config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat on the console; every line is one inbound message
    Chat {
        /// Name recorded as the author of console messages
        #[arg(long, default_value = "user")]
        speaker: String,
    },
    /// Print the stored messages most similar to a query
    Recall {
        query: String,
        /// Number of records to print
        #[arg(short, default_value_t = 5)]
        k: usize,
    },
    /// Count stored records and their vector dimensions
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glovedbot::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let memory_root = config
        .memory
        .path
        .clone()
        .unwrap_or_else(|| DEFAULT_MEMORY_PATH.to_string());
    info!("using memory store (path={})", memory_root);
    let store = Arc::new(FileMemoryStore::new(PathBuf::from(memory_root)));

    match cli.command {
        Command::Stats => print_stats(&store).await,
        Command::Recall { query, k } => {
            let providers =
                build_providers(&config.llm).context("failed to build llm providers")?;
            let engine = MemoryEngine::from_config(&config, &providers, store);
            let scored = engine
                .recall_scored(&query, k)
                .await
                .context("failed to recall memories")?;
            if scored.is_empty() {
                println!("no memories stored");
            }
            for (record, score) in scored {
                println!("{score:.4}  {}", record.message);
            }
            Ok(())
        }
        Command::Chat { speaker } => {
            let providers =
                build_providers(&config.llm).context("failed to build llm providers")?;
            let engine = Arc::new(MemoryEngine::from_config(&config, &providers, store));
            let session = ChatSession::from_config(&config, &providers, engine);
            run_chat(session, &config.bot.name, &speaker).await
        }
    }
}

/// Stats only read the store, so no provider or API key is needed.
async fn print_stats(store: &FileMemoryStore) -> anyhow::Result<()> {
    let records = store
        .load_all()
        .await
        .context("failed to read memory store")?;
    let stats = MemoryStats::from_records(&records);
    println!("records: {}", stats.records);
    for (dimension, count) in &stats.dimensions {
        println!("dimension {dimension}: {count}");
    }
    if stats.is_mixed() {
        println!("warning: stored vectors have mixed dimensions");
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GlovedConfig> {
    let cwd = std::env::current_dir().context("cwd")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = path {
        info!("loading config override from path: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered = GlovedConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

async fn run_chat(mut session: ChatSession, bot: &str, speaker: &str) -> anyhow::Result<()> {
    info!("starting console chat (bot={}, speaker={})", bot, speaker);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sink = ConsoleSink::new(std::io::stdout(), bot);
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let content = line.trim();
        if content.is_empty() {
            continue;
        }
        if content == "/quit" {
            break;
        }
        // The notice already reached the console; keep the loop alive.
        if let Err(err) = session.handle_message(speaker, content, &mut sink).await {
            warn!("message not answered (error={})", err);
        }
        sink.finish().context("failed to write reply")?;
    }
    Ok(())
}
