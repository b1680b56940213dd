use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// Size of the first read from the socket. The buffer grows as needed until a whole frame has
/// arrived.
const READ_BUFFER_SIZE: usize = 1024;

pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    reader: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr, codec: FrameCodec) -> Connection {
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            client_address,
            reader: FramedRead::with_capacity(reader, codec.clone(), READ_BUFFER_SIZE),
            writer: FramedWrite::new(writer, codec),
        }
    }

    /// Reads a single frame, waiting for as many reads as it takes to receive it whole.
    ///
    /// Returns `None` when the peer closes the connection cleanly before sending anything. A peer
    /// that hangs up halfway through a frame is an error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.reader.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.writer.send(frame).await
    }
}
