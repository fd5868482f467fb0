//! # CLI
//!
//! `meridian-node` takes a single mandatory decision: what to listen on.
//! The reserved address `:3000` makes a process the bootstrap validator —
//! it loads `private_key.txt` and runs block production and consensus; any
//! other `--port` makes it a peer that dials `:3000` on startup and only
//! ever receives blocks over RPC.

use std::path::PathBuf;

use clap::Parser;

use meridian_protocol::config::DEFAULT_LISTEN_ADDR;

#[derive(Parser, Debug)]
#[command(name = "meridian-node", version, about = "Meridian PBFT-PoA validator node")]
pub struct Cli {
    /// Listen address, e.g. `:3000`. `:3000` is the bootstrap validator;
    /// any other value makes this node a peer dialing `:3000`.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub port: String,

    /// Data directory: holds the embedded block store and, for the
    /// bootstrap validator, `private_key.txt`.
    #[arg(long, short = 'd', default_value = "data")]
    pub data_dir: PathBuf,

    /// Path to `config.yaml`. Defaults to the current working directory,
    /// falling back to the data directory.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Port the Prometheus `/metrics` endpoint listens on.
    #[arg(long, default_value_t = 9100)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

/// Parses the numeric port out of a `:<port>` listen address for binding
/// an actual TCP socket (`0.0.0.0:<port>`). Addresses that already carry a
/// host pass through unchanged.
pub fn bind_addr(listen_addr: &str) -> String {
    match listen_addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => listen_addr.to_string(),
    }
}
