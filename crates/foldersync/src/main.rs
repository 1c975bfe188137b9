//! `foldersync` - drive the folder sync engine from the command line.
//!
//! Serves a mailbox fixture (or a synthetic inbox) through the in-memory
//! transport, opens a view, optionally grows it into older history and
//! commits the result to a SQLite state file. Running it again reloads that
//! state, so the second run reports refreshed rather than new messages.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod mailbox;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Duration, Utc};
use clap::Parser;
use foldersync_core::{
    AccountId, Direction, FolderId, FolderView, SqliteBlobStore, SyncConfig, SyncEngine,
    SystemClock, ViewCapabilities, ViewUpdate,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailbox::Mailbox;

/// Drive the folder sync engine against a mailbox fixture.
#[derive(Debug, Parser)]
#[command(name = "foldersync", version)]
#[command(about = "Open, grow and persist a synced folder view")]
struct Options {
    /// JSON mailbox fixture to serve; a synthetic inbox when omitted.
    #[arg(long)]
    mailbox: Option<PathBuf>,

    /// Folder to open.
    #[arg(long, default_value = "INBOX")]
    folder: String,

    /// Number of newest messages the view should show.
    #[arg(long, default_value_t = 16)]
    target: usize,

    /// Older messages to add with an explicit grow after opening.
    #[arg(long, default_value_t = 0)]
    grow: usize,

    /// Show stored state only; never fetch on open.
    #[arg(long)]
    offline: bool,

    /// SQLite state file.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Sync policy JSON file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Default location of the engine state database.
fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("foldersync")
        .join("state.db")
}

/// Default location of the sync policy file.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("foldersync")
        .join("config.json")
}

fn load_config(options: &Options) -> anyhow::Result<SyncConfig> {
    let path = options.config.clone().unwrap_or_else(default_config_path);
    if !path.exists() {
        if options.config.is_some() {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(SyncConfig::default());
    }
    info!("Loading config from {:?}", path);
    SyncConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn report(label: &str, view: &FolderView, update: &ViewUpdate) {
    let result = update.result;
    println!(
        "{label}: {} visible ({} new, {} refreshed, {} removed, {} conflicts) via {:?}",
        result.total_visible,
        result.fully_new,
        result.flags_updated,
        result.deleted_removed,
        result.conflicts,
        update.outcome,
    );
    println!(
        "  newest edge: {}, oldest edge: {}, can grow: {}",
        update.flags.touches_newest, update.flags.touches_oldest, update.flags.can_grow
    );
    for header in view.headers() {
        let marker = if header.flags.is_seen() { ' ' } else { '*' };
        println!(
            "  {marker} {}  {:<24} {}",
            header.date.format("%Y-%m-%d %H:%M"),
            header.from,
            header.subject
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foldersync=debug,foldersync_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = Options::parse();
    let config = load_config(&options)?;

    let mailbox = match &options.mailbox {
        Some(path) => Mailbox::load(path).await?,
        None => Mailbox::synthetic(Utc::now(), 46, Duration::minutes(684)),
    };
    info!(messages = mailbox.message_count(), "Serving mailbox");
    let transport = Arc::new(mailbox.into_transport());

    let state_path = options.state.clone().unwrap_or_else(default_state_path);
    if let Some(parent) = state_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = SqliteBlobStore::new(state_path.to_str().unwrap_or("state.db"))
        .await
        .context("opening state database")?;

    let engine = SyncEngine::load(
        AccountId(1),
        config,
        transport,
        Arc::new(store),
        Arc::new(SystemClock),
    )
    .await?;

    let capabilities = ViewCapabilities {
        offline: options.offline,
        ..ViewCapabilities::default()
    };
    let folder = FolderId::new(options.folder.as_str());
    let (mut view, update) = engine
        .open_view(&folder, options.target, capabilities)
        .await?;
    report("open", &view, &update);

    if options.grow > 0 {
        let update = view.grow(Direction::Older, options.grow, true).await?;
        report("grow", &view, &update);
    }

    let saved = engine.save_state().await?;
    println!("saved {saved} folder(s) to {}", state_path.display());

    view.close();
    engine.shutdown();
    Ok(())
}
