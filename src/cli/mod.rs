pub mod report;

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

use crate::{
    store::activity_store::JsonlActivityStore,
    tracker::{detect_shutdown, Sampler, DEFAULT_SAMPLING_INTERVAL},
    utils::{clock::DefaultClock, logging::enable_logging},
    window_api,
};

use report::RangeArgs;

#[derive(Parser, Debug)]
#[command(name = "Focustrack", version, long_about = None)]
#[command(about = "Tracks foreground window activity into productivity categories", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable verbose logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run the tracker in the current console until ctrl-c")]
    Run {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[arg(
            long = "interval-secs",
            default_value_t = DEFAULT_SAMPLING_INTERVAL.as_secs(),
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Seconds between samples"
        )]
        interval_secs: u64,
    },
    #[command(about = "Display the most recent activity records, newest first")]
    Recent {
        #[arg(long, short, default_value_t = 50, help = "Maximum number of records")]
        limit: usize,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    #[command(about = "Display activity records in a time range, newest first")]
    Timeline {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    #[command(about = "Display per-application activity totals for a time range")]
    Summary {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::DEBUG)
    } else {
        None
    };

    match args.commands {
        Commands::Run { dir, interval_secs } => {
            let dir = dir.map_or_else(create_application_default_path, Ok)?;
            enable_logging(&dir, logging_level, args.log)?;
            run_tracker(&dir, Duration::from_secs(interval_secs)).await
        }
        Commands::Recent { limit, dir } => {
            let store = open_store(dir, logging_level, args.log)?;
            report::process_recent_command(&store, limit).await
        }
        Commands::Timeline { range, dir } => {
            let store = open_store(dir, logging_level, args.log)?;
            report::process_timeline_command(&store, range).await
        }
        Commands::Summary { range, dir } => {
            let store = open_store(dir, logging_level, args.log)?;
            report::process_summary_command(&store, range).await
        }
    }
}

async fn run_tracker(dir: &Path, interval: Duration) -> Result<()> {
    // A store that cannot be opened stops the process here; the sampler is
    // never started on top of a broken log.
    let store = JsonlActivityStore::new(dir.join("records"))?;
    let observer = window_api::create_observer()?;

    let shutdown = CancellationToken::new();
    let sampler = Sampler::new(
        store,
        observer,
        Box::new(DefaultClock),
        interval,
        shutdown.clone(),
    );

    let (_, run_result) = tokio::join!(detect_shutdown(shutdown), sampler.run());
    run_result
}

fn open_store(
    dir: Option<PathBuf>,
    logging_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<JsonlActivityStore> {
    let dir = dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(&dir, logging_level, show_std)?;
    Ok(JsonlActivityStore::new(dir.join("records"))?)
}

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            PathBuf::from(env::var("APPDATA").context("APPDATA should be present on Windows")?)
                .join("focustrack")
        }
        #[cfg(not(windows))]
        {
            env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| PathBuf::from(home).join(".local/state"))
                })
                .context("Couldn't find neither XDG_STATE_HOME nor HOME")?
                .join("focustrack")
        }
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
