// bndl/src/main.rs
use std::process;
use std::sync::Arc;

use bndl_common::cache::Cache;
use bndl_common::config::Config;
use bndl_common::error::{BndlError, Result as BndlResult};
use clap::Parser;
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing::debug;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::CliArgs;

const LOG_FILE_NAME: &str = "bndl.log";

fn init_logging(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("BNDL_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if verbose == 0 {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {}",
            "Warning:".yellow(),
            log_dir.display(),
            e
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    // Unbuffered: `exec` replaces the process image.
    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let stderr_writer = std::io::stderr.with_max_level(max_log_level);
    let file_writer = file_appender.with_max_level(max_log_level);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr_writer.and(file_writer))
        .with_ansi(true)
        .without_time()
        .try_init();

    debug!(
        "Verbose logging enabled. Writing logs to: {}/{}",
        log_dir.display(),
        LOG_FILE_NAME
    );
}

#[tokio::main]
async fn main() -> BndlResult<()> {
    let cli_args = CliArgs::parse();

    let config = Config::load()
        .map_err(|e| BndlError::Config(format!("Could not load config: {e}")))?;
    init_logging(&config, cli_args.verbose);

    let cache = Arc::new(
        Cache::new(&config)
            .map_err(|e| BndlError::Cache(format!("Could not initialize cache: {e}")))?,
    );

    if let Err(e) = cli_args.command.run(&config, cache).await {
        debug!("Command failed: {:?}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
