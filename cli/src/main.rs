//! pmv - Path Mover
//!
//! Moves directory trees out of a local store into a local or remote
//! destination store, powered by pathmover: supervised rsync copies,
//! stall detection, bounded retries, and marker-file crash recovery.

use clap::{Parser, ValueEnum};
use pathmover::{
    Error as PathmoverError, FileStore, LocalStore, PathCopier, RemotePathMover, RemoteStore,
    RsyncCopier, StoreItem, Terminable, TimingParameters,
};
use serde_json::json;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// pmv - Supervised directory mover
///
/// Move items (files or directory trees) from a source directory into a
/// destination store. Each item is copied with rsync under stall
/// supervision, the source is removed only after a confirmed-complete
/// copy, and completion is recorded with a marker file so an
/// interrupted run can resume without re-copying.
///
/// Usage:
///   pmv SOURCE_DIR DESTINATION_DIR
///   pmv SOURCE_DIR DESTINATION_DIR --destination-host HOST
#[derive(Parser, Debug)]
#[command(name = "pmv", version, about, long_about = None)]
struct Args {
    /// Source directory holding the items to move
    source: PathBuf,

    /// Destination directory (on the destination host, if one is given)
    destination: PathBuf,

    /// Move to this remote host instead of a local destination
    #[arg(long, value_name = "HOST")]
    destination_host: Option<String>,

    /// Address the destination through an rsync daemon module
    #[arg(long, value_name = "MODULE", requires = "destination_host")]
    rsync_module: Option<String>,

    /// Password file for the rsync daemon module
    #[arg(long, value_name = "FILE", requires = "rsync_module")]
    password_file: Option<PathBuf>,

    /// The rsync executable to use
    #[arg(long, default_value = "rsync", value_name = "PATH")]
    rsync: PathBuf,

    /// The ssh executable for tunnelling host-addressed copies
    #[arg(long, default_value = "ssh", value_name = "PATH")]
    ssh: PathBuf,

    /// Copy whole files instead of resuming partial transfers
    #[arg(long)]
    overwrite: bool,

    /// Move only the named item(s) instead of everything in SOURCE_DIR
    #[arg(short = 'i', long = "item", value_name = "NAME")]
    items: Vec<String>,

    /// Seconds between activity checks on the destination
    #[arg(long, default_value = "60", value_name = "SECONDS")]
    check_interval: u64,

    /// Seconds without progress before a transfer counts as stalled
    #[arg(long, default_value = "600", value_name = "SECONDS")]
    inactivity_period: u64,

    /// Number of retries of a failed copy before giving up
    #[arg(long, default_value = "10")]
    max_retries: u32,

    /// Seconds to wait after a failure before retrying
    #[arg(long, default_value = "1800", value_name = "SECONDS")]
    failure_interval: u64,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    output: OutputMode,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
enum CliError {
    #[error("Source is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    #[error("Failed to read source directory: {path}: {source}")]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("No such item in source directory: {name}")]
    ItemNotFound { name: String },

    #[error("Configuration error: {source}")]
    Configuration {
        #[from]
        source: PathmoverError,
    },

    #[error("Cannot connect to rsync module '{module}' on host '{host}'")]
    ModuleUnreachable { host: String, module: String },

    #[error("{failed} of {total} items failed to move")]
    PartialFailure { failed: usize, total: usize },
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::SourceNotDirectory { .. }
            | Self::SourceUnreadable { .. }
            | Self::ItemNotFound { .. } => 2,
            Self::Configuration { .. } | Self::ModuleUnreachable { .. } => 3,
            Self::PartialFailure { .. } => 1,
        }
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

fn run() -> CliResult<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.source.is_dir() {
        return Err(CliError::SourceNotDirectory {
            path: args.source.clone(),
        });
    }

    let timing = TimingParameters::default()
        .with_check_interval(Duration::from_secs(args.check_interval))
        .with_inactivity_period(Duration::from_secs(args.inactivity_period))
        .with_max_retries(args.max_retries)
        .with_interval_to_wait_after_failure(Duration::from_secs(args.failure_interval));

    let mut copier = RsyncCopier::new(&args.rsync).with_ssh_executable(&args.ssh);
    if args.overwrite {
        copier = copier.with_overwrite();
    }
    let copier = Arc::new(copier);
    copier.check().map_err(CliError::from)?;
    if let Some(module) = &args.rsync_module {
        // clap guarantees a host whenever a module is given.
        let host = args.destination_host.as_deref().unwrap_or_default();
        if !copier.check_rsync_connection(host, module, args.password_file.as_deref()) {
            return Err(CliError::ModuleUnreachable {
                host: host.to_string(),
                module: module.clone(),
            });
        }
    }

    let cancel = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&cancel), Arc::clone(&copier));

    let source_store = Arc::new(LocalStore::new(&args.source));
    let destination_store: Arc<dyn FileStore> = match &args.destination_host {
        Some(host) => {
            let mut store = RemoteStore::new(host.clone(), &args.destination);
            if let Some(module) = &args.rsync_module {
                store = store.with_rsync_module(module.clone());
            }
            if let Some(password_file) = &args.password_file {
                store = store.with_password_file(password_file.clone());
            }
            Arc::new(store)
        }
        None => Arc::new(LocalStore::new(&args.destination)),
    };

    let mover = RemotePathMover::new(
        source_store,
        destination_store,
        copier as Arc<dyn PathCopier>,
        timing,
    )?
    .with_cancel(cancel);

    let items = resolve_items(&args)?;
    let total = items.len();
    let mut failed: Vec<String> = Vec::new();
    for item in &items {
        if !mover.handle(item) {
            failed.push(item.name().to_string());
        }
    }

    report(&args, total, &failed);
    if failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::PartialFailure {
            failed: failed.len(),
            total,
        })
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn install_ctrlc_handler(cancel: Arc<AtomicBool>, copier: Arc<RsyncCopier>) {
    let result = ctrlc::set_handler(move || {
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        copier.terminate();
    });
    if let Err(error) = result {
        tracing::warn!(%error, "cannot install ctrl-c handler");
    }
}

/// The work list: explicitly named items, or every non-marker entry of
/// the source directory.
fn resolve_items(args: &Args) -> CliResult<Vec<StoreItem>> {
    if !args.items.is_empty() {
        let mut items = Vec::with_capacity(args.items.len());
        for name in &args.items {
            if !args.source.join(name).exists() {
                return Err(CliError::ItemNotFound { name: name.clone() });
            }
            items.push(StoreItem::new(name.clone()));
        }
        return Ok(items);
    }

    let entries = std::fs::read_dir(&args.source).map_err(|source| CliError::SourceUnreadable {
        path: args.source.clone(),
        source,
    })?;
    let mut items: Vec<StoreItem> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| StoreItem::new(entry.file_name().to_string_lossy().into_owned()))
        .filter(|item| !item.is_marker())
        .collect();
    items.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(items)
}

fn report(args: &Args, total: usize, failed: &[String]) {
    match args.output {
        OutputMode::Human => {
            if failed.is_empty() {
                println!("Moved {total} item(s).");
            } else {
                println!(
                    "Moved {} of {total} item(s); failed: {}",
                    total - failed.len(),
                    failed.join(", ")
                );
            }
        }
        OutputMode::Json => {
            let value = json!({
                "total": total,
                "moved": total - failed.len(),
                "failed": failed,
            });
            println!("{value}");
        }
    }
}
