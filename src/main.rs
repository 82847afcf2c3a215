mod cli;
mod commands;
mod error;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use fray_config::Config;
use fray_library::{ChannelNotifier, ChapterPipeline, Context};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {}", *err);
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins when set; otherwise `-v` raises the level from `info`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    config.validate().or_raise(|| ErrorKind::Config)?;

    // Every notification is printed from this one task.
    let (notifier, printer) = ChannelNotifier::spawn(|notification| eprintln!("{notification}"));
    let ctx = Context::from_config(&config, Arc::new(notifier.clone()), Arc::new(notifier))
        .await
        .or_raise(|| ErrorKind::Setup)?;
    let pipeline = ChapterPipeline::new(ctx);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping");
                cancel.cancel();
            }
        }
    });

    let result = commands::execute(&pipeline, cli.command, &cancel).await;
    // The printer stops once the last notifier, held by the pipeline, is gone.
    drop(pipeline);
    if let Err(err) = printer.await {
        tracing::debug!(error = ?err, "notification printer ended abnormally");
    }
    result
}
