//! Entry point for `gbn-transfer`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use gbn_transfer::catalog::Catalog;
use gbn_transfer::client::{Client, ClientOptions};
use gbn_transfer::config::{
    TransferConfig, DEFAULT_PAYLOAD_SIZE, DEFAULT_SEQ_SPACE, DEFAULT_WINDOW_SIZE,
};
use gbn_transfer::server::Server;
use gbn_transfer::socket::Socket;

/// Reliable file delivery over UDP using Go-Back-N.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log every packet (same as RUST_LOG=debug).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Serve the files of a directory.
    Server {
        /// Local address to bind.
        #[arg(long, default_value = "0.0.0.0")]
        address: String,
        #[arg(short, long, default_value_t = 3034)]
        port: u16,
        /// Directory whose regular files are served.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Download one file from a server.
    Client {
        /// Remote server address (e.g. 127.0.0.1:3034).
        #[arg(short, long)]
        server: SocketAddr,
        /// Name of the file on the server.
        #[arg(short, long)]
        file: String,
        /// Where to write it; defaults to the file name.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        transfer: TransferArgs,
    },
}

#[derive(Args)]
struct TransferArgs {
    /// Payload bytes per data packet.
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    payload_size: usize,
    /// Go-Back-N window (must be below --seq-space).
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,
    /// Sequence numbers are chunk indices modulo this value.
    #[arg(long, default_value_t = DEFAULT_SEQ_SPACE)]
    seq_space: u32,
    /// Retransmit timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,
    /// Consecutive timeouts before a transfer is abandoned (default: never).
    #[arg(long)]
    max_retries: Option<u32>,
}

impl TransferArgs {
    fn to_config(&self) -> TransferConfig {
        TransferConfig {
            payload_size: self.payload_size,
            window_size: self.window_size,
            seq_space: self.seq_space,
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins when set.
    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.mode {
        Mode::Server {
            address,
            port,
            dir,
            transfer,
        } => {
            let addr: SocketAddr = format!("{address}:{port}")
                .parse()
                .with_context(|| format!("invalid bind address {address}:{port}"))?;
            let catalog = Catalog::scan(&dir)?;
            let server = Server::bind(addr, catalog, transfer.to_config()).await?;
            tokio::select! {
                _ = server.run() => {}
                _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
            }
        }
        Mode::Client {
            server,
            file,
            output,
            transfer,
        } => {
            let config = transfer.to_config();
            config.validate()?;
            let socket = Socket::bind("0.0.0.0:0".parse()?).await?;
            let options = ClientOptions {
                seq_space: config.seq_space,
                ..ClientOptions::default()
            };
            let data = Client::new(socket, server, options).download(&file).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(&file));
            tokio::fs::write(&output, &data)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            log::info!("Wrote {} byte(s) to {}", data.len(), output.display());
        }
    }
    Ok(())
}
