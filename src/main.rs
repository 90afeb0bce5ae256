//! DNS Query Log Server - Binary Entry Point
//!
//! Reads raw query events as JSON lines on stdin, feeds them to the pipeline
//! and serves statistics over HTTP. Ctrl+C or the end of stdin flushes and
//! exits.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use dns_query_log::api::{self, AppState};
use dns_query_log::{logging, PipelineConfig, PipelineResult, QueryLogPipeline, RawQueryEvent};

#[tokio::main]
async fn main() -> PipelineResult<()> {
    let config = PipelineConfig::load()?;
    config.validate()?;
    logging::init(&config.log_level)?;

    let pipeline = Arc::new(QueryLogPipeline::open(config.clone())?);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    {
        let tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            let _ = tx.send(true);
        })
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    }

    let state = Arc::new(AppState::new(pipeline.clone()));
    let mut server_rx = shutdown_rx.clone();
    let server = tokio::spawn(api::serve(config.http_addr, state, async move {
        let _ = server_rx.wait_for(|stop| *stop).await;
    }));

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut accepted: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    if ingest_line(&pipeline, &line) {
                        accepted += 1;
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "failed to read event feed");
                    break;
                }
                None => {
                    info!("event feed closed");
                    break;
                }
            },
            _ = shutdown_rx.wait_for(|stop| *stop) => {
                info!("shutdown requested");
                break;
            }
        }
    }

    let report = pipeline.shutdown().await?;
    info!(
        accepted,
        flushed = report.flushed,
        dropped = report.dropped,
        "query log pipeline stopped"
    );

    let _ = shutdown_tx.send(true);
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    Ok(())
}

fn ingest_line(pipeline: &QueryLogPipeline, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }

    match serde_json::from_str::<RawQueryEvent>(line) {
        Ok(event) => pipeline.handle_event(&event),
        Err(e) => {
            warn!(error = %e, "skipping malformed event line");
            false
        }
    }
}
