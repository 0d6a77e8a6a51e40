//! Watches one or more directories and prints view changes as JSON lines.
//!
//! Usage:
//!   filer-watch [--config FILE] [--full] [DIR...]
//!
//! Each directory gets its own engine on its own task, like the two panes of a file manager.
//! Defaults to the home directory.
//!
//! Environment variables:
//!   FILER_SYNC_CONFIG - Settings file, used when --config is not given
//!   RUST_LOG - Log filter (default: info)

use filer_sync::config::CONFIG_PATH_ENV;
use filer_sync::{EngineStep, LoadingState, RefreshMode, SyncConfig, SyncEngine, ViewChange, load_config};
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

struct Args {
    config: Option<PathBuf>,
    full: bool,
    directories: Vec<PathBuf>,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        full: false,
        directories: Vec::new(),
    };
    let mut raw = env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => args.config = raw.next().map(PathBuf::from),
            "--full" => args.full = true,
            _ => args.directories.push(PathBuf::from(arg)),
        }
    }

    // Fall back to environment variable
    if args.config.is_none() {
        args.config = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    }
    if args.directories.is_empty()
        && let Some(home) = dirs::home_dir()
    {
        args.directories.push(home);
    }
    args
}

fn emit(directory: &Path, change: &ViewChange) {
    let line = serde_json::json!({
        "directory": directory,
        "change": change,
    });
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", line);
    let _ = stdout.flush();
}

fn emit_pending(directory: &Path, changes: &mut broadcast::Receiver<ViewChange>) {
    loop {
        match changes.try_recv() {
            Ok(change) => emit(directory, &change),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                log::warn!("{}: dropped {} notifications", directory.display(), skipped);
            }
            Err(_) => return,
        }
    }
}

async fn run_pane(directory: PathBuf, config: SyncConfig, mode: RefreshMode) {
    let mut engine = match SyncEngine::new(&directory, &config) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };
    let directory = engine.directory().to_path_buf();
    let mut changes = engine.subscribe();
    let mut loading = engine.loading_state();

    if let Err(e) = engine.refresh(mode).await {
        log::error!("Refresh failed: {}", e);
        return;
    }
    log::info!("{}: live updates {}", directory.display(), if engine.is_watching() { "on" } else { "off" });

    loop {
        emit_pending(&directory, &mut changes);
        if loading.has_changed().unwrap_or(false) {
            let state = *loading.borrow_and_update();
            log::info!("{}: {:?}", directory.display(), state);
            if state == LoadingState::Idle {
                log::info!("{}: {}", directory.display(), engine.view().counts());
            }
        }

        match engine.next_step().await {
            Some(EngineStep::WatchLost) => log::warn!("{}: watcher stopped", directory.display()),
            Some(EngineStep::Reconciled(report)) if report.changed() => {
                log::info!("{}: {}", directory.display(), engine.view().counts());
            }
            Some(_) => {}
            None => break,
        }
    }
    emit_pending(&directory, &mut changes);
    log::info!("{}: nothing left to watch", directory.display());
}

#[tokio::main]
async fn main() {
    // Initialize logging - respects RUST_LOG env var (default: info)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args();
    let config = load_config(args.config.as_deref());
    let mode = if args.full || !config.streaming {
        RefreshMode::Full
    } else {
        RefreshMode::Streaming
    };

    let panes: Vec<_> = args
        .directories
        .into_iter()
        .map(|directory| tokio::spawn(run_pane(directory, config.clone(), mode)))
        .collect();
    for pane in panes {
        if let Err(e) = pane.await {
            log::error!("Pane task failed: {}", e);
        }
    }
}
