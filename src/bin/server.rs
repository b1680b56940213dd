use clap::Parser;
use std::path::PathBuf;

use respkv::codec::DEFAULT_MAX_FRAME_SIZE;
use respkv::server::{self, Config, DEFAULT_PORT};
use respkv::snapshot::DEFAULT_SNAPSHOT_PATH;
use respkv::Error;

#[derive(Parser, Debug)]
struct Args {
    /// The address to listen on
    #[arg(long, env = "RESPKV_HOST", default_value = "127.0.0.1")]
    host: String,

    /// The port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// The file written by SAVE and read by LOAD
    #[arg(long, env = "RESPKV_SNAPSHOT_PATH", default_value = DEFAULT_SNAPSHOT_PATH)]
    snapshot_path: PathBuf,

    /// The largest request, in bytes, a connection may buffer
    #[arg(long, env = "RESPKV_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(Config {
        host: args.host,
        port: args.port,
        snapshot_path: args.snapshot_path,
        max_frame_size: args.max_frame_size,
    })
    .await
}
