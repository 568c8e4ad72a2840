//! TabScout - song recognition companion
//!
//! Identifies songs from ambient audio, keeps a per-profile history of
//! matches, derives guitar/piano tablature search links, and queries a
//! remote tab catalog for candidate tabs.

mod app;
mod config;
mod recognition;
mod shared;
mod storage;
mod tabs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::{App, SaveOutcome};
use crate::config::AppConfig;
use crate::recognition::demo::demo_engine;
use crate::recognition::{OpenMicAccess, SessionEvent};
use crate::storage::database::Database;
use crate::storage::records::TabType;
use crate::tabs::TabLookupClient;

/// TabScout - identify songs and track their tablature
#[derive(Parser, Debug)]
#[command(name = "tabscout")]
#[command(about = "Identify songs from ambient audio and track guitar/piano tabs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage local user profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Listen for a song and record the match
    Listen {
        /// Bookmark the guitar tab link on a successful match
        #[arg(long)]
        save_guitar: bool,
        /// Bookmark the piano tab link on a successful match
        #[arg(long)]
        save_piano: bool,
    },
    /// Show or clear the recognition history of the active profile
    History {
        /// Delete a single history entry by id
        #[arg(long)]
        delete: Option<i64>,
        /// Delete all history entries for the active profile
        #[arg(long)]
        clear: bool,
    },
    /// Manage saved tab bookmarks of the active profile
    Tabs {
        /// Delete a single bookmark by id
        #[arg(long)]
        delete: Option<i64>,
        /// Delete all bookmarks for the active profile
        #[arg(long)]
        clear: bool,
    },
    /// Query the remote tab catalog for a song
    Lookup {
        /// Song title
        song: String,
        /// Artist name
        artist: String,
    },
    /// Show or change preferences of the active profile
    Prefs {
        /// Set the default tab type (guitar, piano, chords)
        #[arg(long)]
        default_tab_type: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// Create a profile and make it active
    Create { name: String },
    /// List all profiles
    List,
    /// Make an existing profile active
    Use { id: String },
    /// Delete a profile and all of its history and bookmarks
    Delete { id: String },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = load_or_create_config();
    let data_dir = storage::get_data_dir().context("Could not resolve data directory")?;
    let db_path = data_dir.join(storage::DATABASE_FILE);

    // An unusable store at startup is the one unrecoverable fault
    let db = Arc::new(
        Database::open(&db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?,
    );

    let mut app = App::new(config, db.clone(), Box::new(OpenMicAccess));

    match args.command {
        Command::Profile { action } => run_profile(&app, &db, action)?,
        Command::Listen {
            save_guitar,
            save_piano,
        } => run_listen(&mut app, save_guitar, save_piano)?,
        Command::History { delete, clear } => run_history(&app, &db, delete, clear)?,
        Command::Tabs { delete, clear } => run_tabs(&app, &db, delete, clear)?,
        Command::Lookup { song, artist } => run_lookup(&app, &song, &artist)?,
        Command::Prefs { default_tab_type } => run_prefs(&app, &db, default_tab_type)?,
    }

    persist_config(&app);
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config() -> AppConfig {
    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Write the config back so the active profile survives the process
fn persist_config(app: &App) {
    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        let config = app.shared_state.read().config.clone();
        if let Err(e) = config::save_config(&config, &config_path) {
            tracing::warn!("Could not save configuration: {}", e);
        }
    }
}

fn run_profile(app: &App, db: &Database, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Create { name } => {
            let profile = app.create_profile(&name)?;
            println!("Created profile '{}' ({})", profile.name, profile.id);
        }
        ProfileAction::List => {
            let profiles = db.list_profiles()?;
            if profiles.is_empty() {
                println!("No profiles yet. Create one with `tabscout profile create <name>`.");
            }
            let active = app.shared_state.read().active_profile_id().map(String::from);
            for profile in profiles {
                let marker = if active.as_deref() == Some(profile.id.as_str()) {
                    " (active)"
                } else {
                    ""
                };
                println!("{}  {}{}", profile.id, profile.name, marker);
            }
        }
        ProfileAction::Use { id } => {
            let profile = app.activate_profile(&id)?;
            println!("Active profile is now '{}'", profile.name);
        }
        ProfileAction::Delete { id } => {
            app.delete_profile(&id)?;
            println!("Deleted profile {} and all of its records", id);
        }
    }
    Ok(())
}

fn run_listen(app: &mut App, save_guitar: bool, save_piano: bool) -> Result<()> {
    println!("Listening...");
    app.start_listening(Box::new(demo_engine()));

    let event = app
        .wait_for_result(Duration::from_secs(30))
        .unwrap_or(SessionEvent::NoMatch);
    app.stop_listening();

    match event {
        SessionEvent::Matched(m) => {
            println!(
                "Matched: {} - {}",
                m.title.as_deref().unwrap_or("Unknown Title"),
                m.artist.as_deref().unwrap_or("Unknown Artist"),
            );
            let state = app.shared_state.read();
            if let Some(links) = &state.runtime.tab_links {
                println!("Guitar tabs: {}", links.guitar);
                println!("Piano tabs:  {}", links.piano);
            }
            if let Some(message) = &state.runtime.history_error {
                println!("{}", message);
            }
            drop(state);

            if save_guitar {
                report_save("guitar", app.save_guitar_tab());
            }
            if save_piano {
                report_save("piano", app.save_piano_tab());
            }
        }
        SessionEvent::NoMatch => {
            println!("Sorry, I couldn't identify that song. Try again!");
        }
        SessionEvent::Failed(e) => {
            println!("Recognition failed: {}", e);
        }
        SessionEvent::Started => unreachable!("Started is not a terminal event"),
    }
    Ok(())
}

fn report_save(kind: &str, result: Result<SaveOutcome, app::AppError>) {
    match result {
        Ok(SaveOutcome::Saved) => println!("Saved {} tab.", kind),
        Ok(SaveOutcome::AlreadySaved) => println!("{} tab was already saved.", kind),
        Err(e) => println!("Could not save {} tab: {}", kind, e),
    }
}

fn run_history(app: &App, db: &Database, delete: Option<i64>, clear: bool) -> Result<()> {
    let profile_id = require_active_profile(app)?;

    if let Some(id) = delete {
        db.delete_history(id)?;
        println!("Deleted history entry {}.", id);
        return Ok(());
    }
    if clear {
        let removed = db.clear_history(&profile_id)?;
        println!("Removed {} history entries.", removed);
        return Ok(());
    }

    let history = db.list_history(&profile_id)?;
    if history.is_empty() {
        println!("No recognition history yet.");
    }
    for record in history {
        println!(
            "[{}] {}  {} - {}",
            record.id.unwrap_or(-1),
            record.recognized_at.format("%Y-%m-%d %H:%M"),
            record.song_title,
            record.artist.as_deref().unwrap_or("Unknown Artist"),
        );
    }
    Ok(())
}

fn run_tabs(app: &App, db: &Database, delete: Option<i64>, clear: bool) -> Result<()> {
    let profile_id = require_active_profile(app)?;

    if let Some(id) = delete {
        db.delete_tab(id)?;
        println!("Deleted bookmark {}.", id);
        return Ok(());
    }
    if clear {
        let removed = db.clear_tabs(&profile_id)?;
        println!("Removed {} bookmarks.", removed);
        return Ok(());
    }

    let tabs = db.list_tabs(&profile_id)?;
    if tabs.is_empty() {
        println!("No saved tabs yet.");
    }
    for tab in tabs {
        println!(
            "[{}] {} ({})  {} - {}",
            tab.id.unwrap_or(-1),
            tab.tab_type,
            tab.saved_at.format("%Y-%m-%d"),
            tab.song_title,
            tab.tab_url,
        );
    }
    Ok(())
}

fn run_lookup(app: &App, song: &str, artist: &str) -> Result<()> {
    let catalog_url = app.shared_state.read().config.lookup.catalog_url.clone();
    let client = TabLookupClient::with_catalog_url(catalog_url);

    let tabs = client.lookup(song, artist)?;
    if tabs.is_empty() {
        println!("No tabs found for '{}' by {}.", song, artist);
    }
    for tab in tabs {
        println!(
            "{}  {} - {}  [{}]",
            tab.id,
            tab.artist.name,
            tab.title,
            tab.tab_types.join(", "),
        );
    }
    Ok(())
}

fn run_prefs(app: &App, db: &Database, default_tab_type: Option<String>) -> Result<()> {
    let profile_id = require_active_profile(app)?;

    if let Some(value) = default_tab_type {
        let tab_type = TabType::parse(&value)
            .ok_or_else(|| anyhow::anyhow!("Unknown tab type '{}'", value))?;
        let mut prefs = db.preferences(&profile_id)?;
        prefs.default_tab_type = tab_type;
        db.set_preferences(&profile_id, &prefs)?;
        println!("Default tab type set to {}.", tab_type);
        return Ok(());
    }

    let prefs = db.preferences(&profile_id)?;
    println!("default_tab_type  = {}", prefs.default_tab_type);
    println!("auto_save_history = {}", prefs.auto_save_history);
    Ok(())
}

fn require_active_profile(app: &App) -> Result<String> {
    app.shared_state
        .read()
        .active_profile_id()
        .map(String::from)
        .ok_or_else(|| {
            anyhow::anyhow!("No active profile. Create or select one with `tabscout profile`.")
        })
}
