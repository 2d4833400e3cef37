//! Command line interface for the `courier` binary.
//!
//! The binary replays push messages recorded as JSON lines through the
//! reassembly engine, which is handy when diagnosing fragment delivery.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `courier` binary.
#[derive(Debug, Parser)]
#[command(
    name = "courier",
    version,
    about = "Reassemble push notifications from JSON lines"
)]
pub struct Cli {
    /// File of push messages, one JSON object per line. Reads stdin when
    /// omitted.
    pub input: Option<PathBuf>,
    /// List notifications still incomplete at the end of the input.
    #[arg(short, long)]
    pub pending: bool,
    /// Serve Prometheus metrics on this address while running.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn reads_stdin_by_default() {
        let cli = Cli::parse_from(["courier"]);
        assert!(cli.input.is_none());
        assert!(!cli.pending);
        assert!(cli.metrics_addr.is_none());
    }

    #[test]
    fn parses_input_and_flags() {
        let cli = Cli::parse_from([
            "courier",
            "messages.jsonl",
            "--pending",
            "--metrics-addr",
            "127.0.0.1:9000",
        ]);
        assert_eq!(
            cli.input.as_deref(),
            Some(std::path::Path::new("messages.jsonl"))
        );
        assert!(cli.pending);
        assert_eq!(
            cli.metrics_addr.map(|addr| addr.port()),
            Some(9000)
        );
    }

    #[test]
    fn rejects_malformed_metrics_address() {
        assert!(Cli::try_parse_from(["courier", "--metrics-addr", "nowhere"]).is_err());
    }
}
