use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame, CRLF, MAX_BULK_LENGTH};
use crate::Error;

/// Largest buffer the stream decoder accepts: a maximal bulk string plus room for its framing.
pub const DEFAULT_MAX_FRAME_SIZE: usize = MAX_BULK_LENGTH as usize + 1024;

/// Encodes a whitespace separated command line as an array of bulk strings, the form clients use
/// to send commands. Tokens are taken as-is, there is no quoting.
pub fn encode(command: &str) -> Vec<u8> {
    let tokens = command
        .split_whitespace()
        .map(|token| Frame::Bulk(Bytes::copy_from_slice(token.as_bytes())))
        .collect();

    Frame::Array(tokens).serialize()
}

/// Decodes a buffer holding exactly one complete frame.
///
/// Unlike [`FrameCodec`], a truncated buffer is an error here rather than a request for more
/// data, and so are any bytes following the frame.
pub fn decode(src: &[u8]) -> Result<Frame, frame::Error> {
    if src.len() < 2 {
        return Err(frame::Error::UnexpectedToken);
    }
    if !src.ends_with(CRLF) {
        return Err(frame::Error::UnexpectedTermination);
    }

    let mut cursor = Cursor::new(src);
    let frame = match Frame::parse(&mut cursor) {
        Ok(frame) => frame,
        Err(frame::Error::Incomplete) => return Err(frame::Error::UnexpectedTermination),
        Err(err) => return Err(err),
    };

    match cursor.remaining() {
        0 => Ok(frame),
        trailing => Err(frame::Error::TrailingBytes(trailing)),
    }
}

/// Frames a byte stream into [`Frame`]s and back.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Check if the frame size exceeds a certain limit to prevent DoS attacks
        if src.len() > self.max_frame_size {
            return Err(format!(
                "frame size {} exceeds limit of {} bytes",
                src.len(),
                self.max_frame_size
            )
            .into());
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => return Ok(None), // Not enough data to parse a frame.
            Err(err) => return Err(err.into()),
        };

        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&frame.serialize());
        Ok(())
    }
}
