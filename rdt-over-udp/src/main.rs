//! Entry point for `rdt-over-udp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode. The client transfers a file to the server over the lossy channel:
//! first the file size as a decimal text message, then the contents in
//! messages of up to `window × PAYLOAD_MAX` bytes. All protocol work is
//! delegated to the library; `main.rs` owns only process setup (logging,
//! argument parsing, file I/O).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rdt_over_udp::config::MAX_SEGMENTS;
use rdt_over_udp::{Connection, NetworkConfig, PAYLOAD_MAX};
use tokio::io::AsyncWriteExt;

/// Reliable data transfer over a lossy UDP channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

/// Properties of the simulated network.
#[derive(Args)]
struct NetworkArgs {
    /// Probability that an outbound packet is dropped.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Probability that an outbound packet is corrupted.
    #[arg(long, default_value_t = 0.0)]
    error: f64,
    /// Window size W; the client sends up to W × 1000 bytes per message.
    #[arg(short, long, default_value_t = 1)]
    window: usize,
    /// Seed for the fault model.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive a file from a client.
    Server {
        /// Local port to bind.
        #[arg(short, long, default_value_t = 9000)]
        port: u16,
        /// Client address (e.g. 127.0.0.1:9001).
        #[arg(long)]
        peer: SocketAddr,
        /// Where to write the received file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        net: NetworkArgs,
    },
    /// Send a file to a server.
    Client {
        /// Local port to bind.
        #[arg(short, long, default_value_t = 9001)]
        port: u16,
        /// Server address (e.g. 127.0.0.1:9000).
        #[arg(long)]
        peer: SocketAddr,
        /// File to send.
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        net: NetworkArgs,
    },
}

impl NetworkArgs {
    fn into_config(self) -> Result<NetworkConfig> {
        let config = NetworkConfig::new(self.loss, self.error, self.window)?;
        Ok(match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            port,
            peer,
            output,
            net,
        } => {
            let conn = open(net.into_config()?, port, peer)?;
            log::info!("Server listening on port {port}");
            run_server(conn, output).await
        }
        Mode::Client {
            port,
            peer,
            input,
            net,
        } => {
            let conn = open(net.into_config()?, port, peer)?;
            log::info!("Client sending {} to {peer}", input.display());
            run_client(conn, input).await
        }
    }
}

fn open(config: NetworkConfig, port: u16, peer: SocketAddr) -> Result<Connection> {
    let mut conn = Connection::create(config).context("create socket")?;
    conn.bind(port).with_context(|| format!("bind port {port}"))?;
    conn.set_peer(peer);
    Ok(conn)
}

async fn run_server(mut conn: Connection, output: Option<PathBuf>) -> Result<()> {
    let header = conn.recv(PAYLOAD_MAX).await.context("receive file size")?;
    let size: usize = std::str::from_utf8(&header)
        .context("file size is not text")?
        .trim()
        .parse()
        .context("file size is not a number")?;
    log::info!("Expecting {size} bytes");

    let mut contents = Vec::with_capacity(size);
    while contents.len() < size {
        let chunk = conn.recv(PAYLOAD_MAX).await.context("receive file data")?;
        contents.extend_from_slice(&chunk);
    }
    if contents.len() != size {
        bail!("received {} bytes, expected {size}", contents.len());
    }

    match output {
        Some(path) => tokio::fs::write(&path, &contents)
            .await
            .with_context(|| format!("write {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&contents).await?;
            stdout.flush().await?;
        }
    }
    log::info!("Received {size} bytes");

    conn.close().await.context("close")?;
    Ok(())
}

async fn run_client(mut conn: Connection, input: PathBuf) -> Result<()> {
    let contents = tokio::fs::read(&input)
        .await
        .with_context(|| format!("read {}", input.display()))?;

    conn.send(contents.len().to_string().as_bytes())
        .await
        .context("send file size")?;

    let message_len = conn.config().message_limit().min(MAX_SEGMENTS * PAYLOAD_MAX);
    let mut sent = 0;
    for message in contents.chunks(message_len) {
        sent += conn.send(message).await.context("send file data")?;
        log::info!("Sent {sent} of {} bytes", contents.len());
    }

    conn.close().await.context("close")?;
    Ok(())
}
