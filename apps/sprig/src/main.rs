//! sprig - conda package cache with provenance-aware metadata records
//!
//! The CLI loads configuration, turns its inputs into package models and
//! drives the fetch-extract pipeline, rendering library events as they
//! arrive.

mod cli;
mod display;
mod error;
mod events;
mod inputs;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{
    verdict_label, CommandResult, EntryLine, FetchSummary, InspectSummary, OutputRenderer,
    VerifySummary,
};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use sprig_config::Config;
use sprig_events::{AppEvent, CacheEvent, EventEmitter, EventReceiver, EventSender};
use sprig_guard::{inspect_record, RecordVerdict};
use sprig_install::{executor_from_config, FetchContext, PackageScope};
use sprig_repodata::{from_cache_record, read_index_json, ManifestRead};
use sprig_store::PackageCache;
use std::path::Path;
use std::process;
use tokio::select;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic; `Ok(false)` means the command ran but did not
/// fully succeed
async fn run(cli: Cli) -> Result<bool, CliError> {
    info!("Starting sprig v{}", env!("CARGO_PKG_VERSION"));

    // Precedence: file < environment < command line
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command)?;

    let (event_sender, event_receiver) = sprig_events::channel();
    let renderer = OutputRenderer::new(cli.global.json);
    let mut event_handler = EventHandler::new(!cli.global.json, cli.global.debug);

    let result = execute_command_with_events(
        cli.command,
        config,
        event_sender,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&result)?;
    Ok(result.is_success())
}

/// Apply command line overrides on top of file and environment values
fn apply_cli_config(
    config: &mut Config,
    global: &GlobalArgs,
    command: &Commands,
) -> Result<(), CliError> {
    if let Some(pkgs_dir) = &global.pkgs_dir {
        config.cache.pkgs_dir = Some(pkgs_dir.clone());
    }
    if let Commands::Fetch {
        jobs: Some(jobs), ..
    } = command
    {
        if *jobs == 0 {
            return Err(CliError::InvalidArguments(
                "--jobs must be at least 1".to_string(),
            ));
        }
        config.general.parallel_downloads = *jobs;
    }
    Ok(())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    config: Config,
    event_sender: EventSender,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, config, event_sender));

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: Config,
    events: EventSender,
) -> Result<CommandResult, CliError> {
    match command {
        Commands::Fetch { inputs, force, .. } => {
            let models = crate::inputs::load_models(&inputs).await?;
            let models = crate::inputs::round_trip(&models)?;

            let executor = executor_from_config(&config, Some(events.clone()))?;
            let token = executor.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing running packages");
                    token.cancel();
                }
            });

            let context = FetchContext::new()
                .with_packages(models)
                .with_force(force)
                .with_event_sender(events);
            let report = executor.execute(&context).await?;
            Ok(CommandResult::Fetch(FetchSummary::from(&report)))
        }

        Commands::Verify { repair } => verify(&config, events, repair).await,

        Commands::Inspect { dir } => Ok(CommandResult::Inspect(inspect(&dir).await)),
    }
}

async fn verify(
    config: &Config,
    events: EventSender,
    repair: bool,
) -> Result<CommandResult, CliError> {
    let cache = PackageCache::new(config.pkgs_dir(), config.lock_timeout());
    let report = cache.verify_all().await?;

    events.emit(AppEvent::Cache(CacheEvent::VerificationCompleted {
        healthy: report.stats.healthy,
        corrupted: report.stats.corrupted,
        missing: report.stats.missing,
        unreadable: report.stats.unreadable,
    }));

    let mut repaired = Vec::new();
    if repair && report.stats.corrupted > 0 {
        let executor = executor_from_config(config, Some(events.clone()))?;
        for (basename, verdict) in &report.entries {
            if !matches!(verdict, RecordVerdict::Corrupted(_)) {
                continue;
            }
            let scope = PackageScope::new(Some(events.clone()), basename.clone());
            match executor.fetcher().repair(basename, &scope).await {
                Ok(_) => repaired.push(basename.clone()),
                Err(e) => {
                    events.emit_warning_with_context(format!("could not repair: {e}"), basename);
                }
            }
        }
    }

    Ok(CommandResult::Verify(VerifySummary {
        entries: report
            .entries
            .iter()
            .map(|(basename, verdict)| EntryLine::new(basename.clone(), verdict))
            .collect(),
        healthy: report.stats.healthy,
        corrupted: report.stats.corrupted,
        missing: report.stats.missing,
        unreadable: report.stats.unreadable,
        repaired,
    }))
}

async fn inspect(dir: &Path) -> InspectSummary {
    let verdict = inspect_record(dir).await;
    let (label, detail) = verdict_label(&verdict);

    let record = match verdict {
        RecordVerdict::Healthy(record) | RecordVerdict::Corrupted(record) => Some(record),
        RecordVerdict::Missing | RecordVerdict::Unreadable(_) => None,
    };
    let provenance = record
        .as_ref()
        .and_then(|record| from_cache_record(record).ok())
        .and_then(|model| model.provenance())
        .map(|provenance| provenance.to_string());

    let manifest = match read_index_json(dir).await {
        ManifestRead::Parsed(_) => "parsed",
        ManifestRead::Missing => "missing",
        ManifestRead::Malformed(_) => "malformed",
    };

    InspectSummary {
        dir: dir.display().to_string(),
        verdict: label,
        detail,
        provenance,
        manifest,
        record,
    }
}

/// Initialize tracing; logs go to stderr so stdout stays clean for results
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if !debug_enabled {
        // Status lines come from the event handler
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,sprig=debug,sprig_install=debug,sprig_store=debug,sprig_net=debug",
        )
    });

    if json_mode {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_env_filter(filter)
            .init();
    }
}
