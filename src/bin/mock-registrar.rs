//! Development stand-in for the backend process behind the registrar socket.
//!
//! Answers every query with `{"status":"ok","topic":...,"payload":...}`.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing_subscriber::EnvFilter;

use edge_gateway::registrar::envelope;

#[derive(Parser)]
#[command(name = "mock-registrar")]
#[command(about = "Echoing backend for local gateway development", long_about = None)]
struct Cli {
    /// Socket path to listen on.
    #[arg(short, long, default_value = "./server/sockets/registrar.sock")]
    socket: PathBuf,

    /// Delay before each reply, in milliseconds.
    #[arg(short, long, default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    if let Some(parent) = cli.socket.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // A stale socket file from a previous run blocks bind.
    let _ = tokio::fs::remove_file(&cli.socket).await;

    let listener = UnixListener::bind(&cli.socket)?;
    tracing::info!(socket = %cli.socket.display(), "Mock registrar listening");

    let delay = Duration::from_millis(cli.delay_ms);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, delay).await {
                        tracing::warn!(error = %e, "Client connection ended with error");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = tokio::fs::remove_file(&cli.socket).await;
    Ok(())
}

async fn serve(stream: UnixStream, delay: Duration) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let query = match envelope::decode_query(&line) {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed query");
                continue;
            }
        };
        tracing::debug!(id = query.id, topic = %query.topic, "Query received");

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let body = serde_json::json!({
            "status": "ok",
            "topic": query.topic,
            "payload": query.payload,
        });
        let reply = envelope::encode_reply(query.id, &body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write.write_all(&reply).await?;
    }

    Ok(())
}
