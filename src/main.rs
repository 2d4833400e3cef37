//! Replays recorded push messages through the reassembly engine.
//!
//! Every completed notification is printed to stdout as one JSON object.

mod cli;

use std::{
    error::Error,
    fs::File,
    io::{self, BufRead, BufReader, Write},
    sync::Arc,
};

use clap::Parser;
use courier::{
    AssemblyManager,
    EventBus,
    PushMessage,
    dispatch::{Dispatched, PushDispatcher},
};
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = cli::Cli::parse();
    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr)?;
    }

    let input: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let dispatcher = PushDispatcher::new(
        Arc::new(AssemblyManager::new()),
        Arc::new(EventBus::default()),
    );
    let mut stdout = io::stdout().lock();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let message = match PushMessage::from_json(&line) {
            Ok(message) => message,
            Err(err) => {
                warn!(line = line_no, error = %err, "skipping line that is not a JSON object");
                continue;
            }
        };
        match dispatcher.dispatch(&message) {
            Ok(Dispatched::Completed(notification)) => {
                serde_json::to_writer(&mut stdout, &notification)?;
                writeln!(stdout)?;
            }
            Ok(Dispatched::Buffered) => {}
            Ok(other) => info!(line = line_no, outcome = ?other, "control message"),
            Err(err) => warn!(line = line_no, error = %err, "rejected push message"),
        }
    }

    if cli.pending {
        for id in dispatcher.assembler().pending_ids() {
            let missing = dispatcher.assembler().missing_parts(id.as_str());
            eprintln!("pending {id} (missing parts: {})", missing.unwrap_or_default());
        }
    }
    Ok(())
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "serving Prometheus metrics");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn Error>> {
    warn!(%addr, "built without the `metrics` feature; not serving metrics");
    Ok(())
}
