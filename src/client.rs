use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::codec;
use crate::frame::Frame;
use crate::Error;

/// Sends one whitespace separated command to the server at `addr` and returns its reply.
///
/// The server answers a single request per connection and then closes it, so the reply is
/// everything read until end of stream.
pub async fn send(addr: impl ToSocketAddrs, command: &str) -> Result<Frame, Error> {
    let mut stream = TcpStream::connect(addr).await?;

    stream.write_all(&codec::encode(command)).await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;
    debug!(bytes = reply.len(), "received reply");

    Ok(codec::decode(&reply)?)
}
