#![forbid(unsafe_code)]

mod color;
mod config;
mod constants;
mod coordinator;
mod daemon;
mod event_handler;
mod events;
mod hotkeys;
mod manager;
mod menu_bar;
mod overlay;
mod platform;
mod replay;
mod scheduler;
mod section;
mod types;
mod visibility;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::{load_sections, FileStore, MemoryStore, Preferences, Store};
use constants::config::SECTIONS_KEY;
use replay::{ReplayScript, ReplaySummary};

#[derive(Parser)]
#[command(version, about = "Menu bar section manager")]
struct Cli {
    /// Overrides the LOG_LEVEL environment variable
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the daemon from a recorded script against a scripted menu bar
    ///
    /// Preferences come from the script, else from the user's config file.
    Replay {
        script: PathBuf,
        /// Write the final overlay frame to this PNG file
        #[arg(short, long)]
        render: Option<PathBuf>,
        /// Keep section state in memory and ignore the user's preferences file
        #[arg(long)]
        no_persist: bool,
    },
    /// Print the persisted section state
    Status,
    /// Forget the persisted section state
    Reset,
}

fn parse_level(level: &str) -> TraceLevel {
    match level.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&log_level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Replay { script, render, no_persist } => {
            let mut script = ReplayScript::load(&script)?;
            let user_file = (!no_persist).then(Preferences::config_path);
            let preferences = script.take_preferences(user_file.as_deref());
            let store: Box<dyn Store> = if no_persist {
                Box::new(MemoryStore::new())
            } else {
                Box::new(FileStore::default_location())
            };

            let (manager, events) = replay::run(script, preferences, store).await?;
            if let Some(path) = render {
                let frame = manager.overlay().render()?;
                overlay::render::write_png(&frame, &path)?;
                info!(path = %path.display(), "Wrote overlay frame");
            }

            let summary = ReplaySummary::new(&manager, events);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Status => {
            let store = FileStore::default_location();
            let sections = load_sections(&store);
            let status = serde_json::json!({
                "preferences_path": Preferences::config_path(),
                "preferences": Preferences::load(),
                "sections": sections.to_vec(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Reset => {
            let store = FileStore::default_location();
            store
                .remove(SECTIONS_KEY)
                .context("Failed to remove persisted sections")?;
            warn!("Persisted section state removed");
        }
    }

    Ok(())
}
