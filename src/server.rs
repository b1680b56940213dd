use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{FrameCodec, DEFAULT_MAX_FRAME_SIZE};
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::snapshot::DEFAULT_SNAPSHOT_PATH;
use crate::store::Store;
use crate::Error;

pub const DEFAULT_PORT: u16 = 6379;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub snapshot_path: PathBuf,
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = match TcpListener::bind((config.host.as_str(), config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to listen on {}:{}: {}", config.host, config.port, e);
            return Err(e.into());
        }
    };

    serve(listener, config).await
}

/// Accepts connections on `listener` forever, handling each one on its own task against a single
/// shared store.
pub async fn serve(listener: TcpListener, config: Config) -> Result<(), Error> {
    let store = Store::with_snapshot_path(config.snapshot_path);
    let codec = FrameCodec::new(config.max_frame_size);

    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                return Err(e.into());
            }
        };
        let store = store.clone();
        let codec = codec.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, store, codec).await {
                error!("Connection from {} failed: {}", client_address, e);
            }
        });
    }
}

/// Serves exactly one request: read a frame, run it, write the reply and close.
#[instrument(
    name = "connection",
    skip(stream, store, codec),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    codec: FrameCodec,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream, client_address, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", conn.client_address.to_string());

    let frame = match conn.read_frame().await? {
        Some(frame) => frame,
        None => {
            info!("Connection closed before a request was received");
            return Ok(());
        }
    };
    info!("Received frame from client: {:?}", frame);

    let res = match Command::try_from(frame) {
        // Snapshot file I/O, fsync included, runs on the blocking pool.
        Ok(cmd) if cmd.touches_disk() => {
            tokio::task::spawn_blocking(move || cmd.exec(store)).await??
        }
        Ok(cmd) => cmd.exec(store)?,
        Err(e) => {
            warn!("Rejected request: {}", e);
            Frame::Error(e.to_string())
        }
    };

    debug!("Sending response to client: {:?}", res);
    conn.write_frame(res).await?;

    info!("Connection closed");
    Ok(())
}
