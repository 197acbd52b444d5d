use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use infodb::clock::SystemClock;
use infodb::config::{self, Config};
use infodb::lookup::http::HttpInfoLookup;
use infodb::state_store::{ReconciliationState, StateStore, TomlStateStore};
use infodb::{AddOutcome, CacheEntry, InfoDb, InfoDbOptions, InfoMessage, InfoStore};
use log::{debug, info, warn};

const USAGE: &str = "usage: infodb <get PATH | add PATH [NAME] | move OLD NEW | redo | stats>";

enum Command {
    Get(PathBuf),
    Add(PathBuf, Option<String>),
    Move(PathBuf, PathBuf),
    Redo,
    Stats,
}

fn parse_command(args: &[String]) -> Option<Command> {
    match args {
        [cmd, path] if cmd == "get" => Some(Command::Get(PathBuf::from(path))),
        [cmd, path] if cmd == "add" => Some(Command::Add(PathBuf::from(path), None)),
        [cmd, path, name] if cmd == "add" => {
            Some(Command::Add(PathBuf::from(path), Some(name.clone())))
        }
        [cmd, old, new] if cmd == "move" => {
            Some(Command::Move(PathBuf::from(old), PathBuf::from(new)))
        }
        [cmd] if cmd == "redo" => Some(Command::Redo),
        [cmd] if cmd == "stats" => Some(Command::Stats),
        _ => None,
    }
}

fn resolve_path(configured: Option<&String>, fallback: Option<PathBuf>, name: &str) -> PathBuf {
    configured
        .map(PathBuf::from)
        .or(fallback)
        .unwrap_or_else(|| PathBuf::from(name))
}

fn print_entry(path: &str, entry: &CacheEntry) {
    match entry {
        CacheEntry::Absent => println!("{path}: absent"),
        CacheEntry::Negative => println!("{path}: no info (negative)"),
        CacheEntry::Positive(record) => println!(
            "{path}: {} | {} | {} | S{} E{} | {}",
            record.catalog_id,
            record.title,
            record.episode_name,
            record.season,
            record.episode,
            record.year
        ),
    }
}

fn open_info_db(config: &Config) -> Result<InfoDb, Box<dyn std::error::Error>> {
    let db_path = resolve_path(
        config.info_db.db_path.as_ref(),
        InfoStore::default_path(),
        infodb::info_store::STORE_FILE_NAME,
    );
    let state_path = resolve_path(
        config.info_db.state_path.as_ref(),
        TomlStateStore::default_path(),
        "state.toml",
    );
    debug!(
        "Opening info db. db={} state={}",
        db_path.display(),
        state_path.display()
    );

    let store = InfoStore::open(&db_path)?;
    let state_store: Arc<dyn StateStore> = Arc::new(TomlStateStore::open(&state_path)?);
    config
        .info_db
        .apply_retry_override(&ReconciliationState::new(Arc::clone(&state_store)))?;

    Ok(InfoDb::open(
        store,
        Arc::new(HttpInfoLookup::new(&config.lookup)),
        state_store,
        Arc::new(SystemClock),
        InfoDbOptions::from(&config.info_db),
    )?)
}

fn wait_for_redo(info_db: &InfoDb) {
    while info_db.stats().redo_running {
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = parse_command(&args) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config_path = config::default_config_path().unwrap_or_else(|| PathBuf::from("infodb.toml"));
    let config = config::load_or_create(&config_path)?;
    let info_db = open_info_db(&config)?;

    match command {
        Command::Get(path) => {
            print_entry(&path.display().to_string(), &info_db.get(&path));
        }
        Command::Add(path, name) => {
            let display_name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let mut observer = info_db.subscribe();
            match info_db.background_add(&path, &display_name) {
                AddOutcome::Queued => loop {
                    match observer.blocking_recv() {
                        Ok(InfoMessage::EntryStored { path, entry }) => {
                            print_entry(&path, &entry);
                            break;
                        }
                        Ok(InfoMessage::LookupFailed { path, reason }) => {
                            warn!("Lookup for {} failed: {}", path, reason);
                            break;
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                },
                AddOutcome::AlreadyCached => {
                    print_entry(&path.display().to_string(), &info_db.get(&path));
                    wait_for_redo(&info_db);
                }
                AddOutcome::QueueFull => warn!("Lookup queue is full, try again later"),
            }
        }
        Command::Move(old, new) => {
            if info_db.move_info(&old, &new)? {
                info!("Moved info {} -> {}", old.display(), new.display());
            } else {
                println!("{}: absent", old.display());
            }
        }
        Command::Redo => {
            if !info_db.trigger_redo() && !info_db.stats().redo_running {
                info!("Redo not due");
            }
            wait_for_redo(&info_db);
            let stats = info_db.stats();
            println!("negative entries remaining: {}", stats.negative_entries);
        }
        Command::Stats => {
            let stats = info_db.stats();
            println!(
                "entries={} negative={} redo_running={}",
                stats.entries, stats.negative_entries, stats.redo_running
            );
        }
    }

    info_db.flush()?;
    Ok(())
}
