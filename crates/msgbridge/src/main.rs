//! `msgbridge` - Outlook MSG to EML converter
//!
//! Processes items from the input container concurrently, one pipeline
//! invocation per item.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use msgbridge_core::{Config, ConversionLog, FsStorage, InboundItem, PipelineController, TracingLog};

use cli::Cli;
use report::JsonReportLog;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    config
        .apply_process_env()
        .context("Invalid environment configuration")?;
    cli.apply(&mut config);

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        storage_root = %config.storage_root.display(),
        input = %config.containers.input,
        timeout_secs = config.timeout_secs,
        max_file_size_mb = config.max_file_size_mb,
        "Starting msgbridge"
    );

    let storage = Arc::new(FsStorage::new(&config.storage_root));
    let log: Arc<dyn ConversionLog> = if cli.json {
        Arc::new(JsonReportLog::new(TracingLog))
    } else {
        Arc::new(TracingLog)
    };
    let controller = Arc::new(PipelineController::new(&config, Arc::clone(&storage) as _, log));

    let items = if cli.items.is_empty() {
        storage
            .list(&config.containers.input)
            .await
            .context("Failed to list input container")?
    } else {
        cli.items
    };
    if items.is_empty() {
        info!("No items to process");
        return Ok(ExitCode::SUCCESS);
    }

    let mut tasks = JoinSet::new();
    for name in items {
        let storage = Arc::clone(&storage);
        let controller = Arc::clone(&controller);
        let input = config.containers.input.clone();
        tasks.spawn(async move {
            let (file, len) = storage
                .open(&input, &name)
                .await
                .with_context(|| format!("Failed to open {name}"))?;
            controller
                .process(InboundItem::new(name, len, file))
                .await
                .map(|_| ())
                .map_err(anyhow::Error::from)
        });
    }

    let mut failed = 0usize;
    let mut total = 0usize;
    while let Some(joined) = tasks.join_next().await {
        total += 1;
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failed += 1;
                error!("{:#}", e);
            }
            Err(e) => {
                failed += 1;
                error!("Conversion task failed: {}", e);
            }
        }
    }

    info!(total, failed, "Finished");
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
