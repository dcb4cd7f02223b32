// ABOUTME: Entry point for the tagwatch CLI application.
// ABOUTME: Parses arguments, sets up logging and dispatches to command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use std::path::{Path, PathBuf};
use tagwatch::components::Components;
use tagwatch::config::{self, Config};
use tagwatch::error::{Error, Result};
use tagwatch::event::Event;
use tagwatch::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter.
const LOG_ENV: &str = "TAGWATCH_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;
    match cli.command {
        Commands::Init { force } => {
            init_tracing(cli.verbose, "warn");
            let path = config::init_config(&cwd, force)?;
            println!("Created {}", path.display());
            Ok(())
        }
        Commands::Run => {
            let (config, path) = load_config(cli.config.as_deref(), &cwd)?;
            init_tracing(cli.verbose, &config.log.level);
            log_config_source(path.as_deref());
            serve(&config).await
        }
        Commands::Check { quiet, json } => {
            let (config, path) = load_config(cli.config.as_deref(), &cwd)?;
            // Logs would interleave with the report on the terminal.
            init_tracing(cli.verbose, "warn");
            log_config_source(path.as_deref());
            let mode = if json {
                OutputMode::Json
            } else if quiet {
                OutputMode::Quiet
            } else {
                OutputMode::Normal
            };
            check(&config, Output::new(mode)).await
        }
    }
}

/// `--verbose` wins, then `TAGWATCH_LOG` / `RUST_LOG`, then the configured level.
fn init_tracing(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// The explicit file, else the discovered one, else built-in defaults.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        return Ok((Config::load(path)?, Some(path.to_path_buf())));
    }
    match Config::find(cwd) {
        Some(path) => Ok((Config::load(&path)?, Some(path))),
        None => Ok((Config::default(), None)),
    }
}

fn log_config_source(path: Option<&Path>) {
    match path {
        Some(path) => tracing::info!(path = %path.display(), "configuration loaded"),
        None => tracing::info!("no configuration file found; using defaults"),
    }
}

/// Register everything, keep watching until Ctrl-C or SIGTERM, then tear down.
async fn serve(config: &Config) -> Result<()> {
    let components = Components::in_memory()?;
    components.register(config);
    if components.watchers().is_empty() {
        return Err(Error::InvalidConfig("no watcher could be registered".to_string()));
    }

    let mut events = components.events().subscribe();
    let log = config.log.clone();
    let announcer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Event::ContainerReport(report) = event
                && report.changed
                && report.container.update_available()
            {
                if let Some(message) = log.render_update(&report.container) {
                    tracing::info!(container = %report.container.full_name(), "{message}");
                    continue;
                }
                let kind = report.container.update_kind();
                tracing::info!(
                    container = %report.container.full_name(),
                    kind = %kind.kind,
                    local = kind.local_value.as_deref().unwrap_or_default(),
                    remote = kind.remote_value.as_deref().unwrap_or_default(),
                    "update available"
                );
            }
        }
    });

    components.start();
    tracing::info!(watchers = ?components.watcher_ids(), registries = ?components.registries().ids(), "tagwatch started");

    shutdown_signal().await;
    tracing::info!("shutting down");
    components.deregister_all();
    announcer.abort();
    Ok(())
}

/// One scan of every watcher, printed through `output`.
async fn check(config: &Config, mut output: Output) -> Result<()> {
    output.start_timer();
    let components = Components::in_memory()?;
    let diagnostics = components.register(config);
    for warning in diagnostics.warnings() {
        output.warning(&warning.to_string());
    }

    let all_reports = components.watch_all().await;
    for (watcher, reports) in &all_reports {
        output.reports(watcher, reports);
    }
    components.deregister_all();

    let total: usize = all_reports.values().map(Vec::len).sum();
    output.success(&format!("{total} containers checked"));
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
