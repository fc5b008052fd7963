//! sinecast - stream a noisy three-axis sine signal over WebSocket

mod cli;
mod tail;

use anyhow::{Context, Result};
use clap::Parser;
use sinecast_core::{SampleServer, ShutdownHandle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ServeArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        None => serve(ServeArgs::default()).await,
        Some(Command::Serve(args)) => serve(args).await,
        Some(Command::Tail(args)) => tail::run(args).await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.load_config().context("failed to load config")?;

    let server = SampleServer::bind(&config)
        .await
        .context("failed to start server")?;

    let shutdown = ShutdownHandle::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received");
                on_signal.trigger();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
    });

    server.run(shutdown.token()).await?;
    Ok(())
}
