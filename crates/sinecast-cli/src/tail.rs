//! `sinecast tail` - print samples from a running server

use std::io::Write;

use anyhow::{Context, Result};
use futures::StreamExt;
use sinecast_core::Coordinate;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::cli::TailArgs;

pub async fn run(args: TailArgs) -> Result<()> {
    let received = print_samples(&args, &mut std::io::stdout()).await?;
    tracing::info!(received, "Stream finished");
    Ok(())
}

/// Write one tab-separated line per sample to `out`; returns how many were written
async fn print_samples<W: Write>(args: &TailArgs, out: &mut W) -> Result<usize> {
    let (mut ws, _response) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;
    tracing::info!(url = %args.url, "Connected");

    let mut received = 0usize;

    loop {
        if args.count.is_some_and(|limit| received >= limit) {
            break;
        }
        let Some(msg) = ws.next().await else {
            break;
        };
        match msg.context("connection error")? {
            Message::Text(text) => {
                let sample: Coordinate = text
                    .parse()
                    .with_context(|| format!("malformed sample {:?}", text.as_str()))?;
                writeln!(out, "{:.4}\t{:.4}\t{:.4}", sample.x, sample.y, sample.z)?;
                received += 1;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(received)
}
