// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use thiserror::Error as ThisError;

pub(crate) static CRLF: &[u8; 2] = b"\r\n";

/// A bulk string may not announce a payload of this many bytes or more.
pub const MAX_BULK_LENGTH: u64 = 512 * 1024 * 1024;

/// Arrays nested deeper than this are rejected instead of recursing further.
pub const MAX_NESTING_DEPTH: usize = 128;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unexpected termination")]
    UnexpectedTermination,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("string cannot contain a LF or CR")]
    InvalidSimpleString,
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid length: {0}")]
    InvalidLength(String),
    #[error("the string size cannot be larger than 512MB, got {0} bytes")]
    LengthExceeded(u64),
    #[error("arrays cannot be nested more than 128 levels deep")]
    NestingTooDeep,
    #[error("{0} trailing bytes after a complete frame")]
    TrailingBytes(usize),
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUtf8,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// The null bulk string, `$-1\r\n`. Distinct from an empty bulk string.
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Parses exactly one frame starting at the cursor position, leaving the cursor right after it.
    ///
    /// Returns [`Error::Incomplete`] when the buffer ends before the frame does, so callers
    /// reading from a stream can wait for more data and retry from the same starting point.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        parse_frame(src, 0)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                dst.push(u8::from(DataType::SimpleString));
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.push(u8::from(DataType::SimpleError));
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.push(u8::from(DataType::Integer));
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.push(u8::from(DataType::BulkString));
                dst.extend_from_slice(bytes.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(bytes);
                dst.extend_from_slice(CRLF);
            }
            Frame::Null => dst.extend_from_slice(b"$-1\r\n"),
            Frame::Array(arr) => {
                dst.push(u8::from(DataType::Array));
                dst.extend_from_slice(arr.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
        }
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "{}", s),
            Frame::Error(s) => write!(f, "(error) {}", s),
            Frame::Integer(i) => write!(f, "(integer) {}", i),
            Frame::Bulk(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "(nil)"),
            Frame::Array(arr) if arr.is_empty() => write!(f, "(empty array)"),
            Frame::Array(arr) => {
                for (i, frame) in arr.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, frame)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_frame(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, Error> {
    // The first byte in an RESP-serialized payload always identifies its type.
    // Subsequent bytes constitute the type's contents.
    let first_byte = get_byte(src)?;
    let data_type = DataType::try_from(first_byte)?;

    match data_type {
        DataType::SimpleString => {
            let line = get_line(src)?;
            if line.iter().any(|&b| b == b'\r' || b == b'\n') {
                return Err(Error::InvalidSimpleString);
            }
            Ok(Frame::Simple(utf8(line)?))
        }
        DataType::SimpleError => {
            let line = get_line(src)?;
            Ok(Frame::Error(utf8(line)?))
        }
        DataType::Integer => {
            let line = utf8(get_line(src)?)?;
            let integer = line
                .parse::<i64>()
                .map_err(|_| Error::InvalidInteger(line))?;
            Ok(Frame::Integer(integer))
        }
        // $<length>\r\n<data>\r\n
        DataType::BulkString => {
            let length = match get_length(src)? {
                Some(length) => length,
                None => return Ok(Frame::Null),
            };

            // Checked before touching the payload, an oversized announcement never allocates.
            if length >= MAX_BULK_LENGTH {
                return Err(Error::LengthExceeded(length));
            }
            let length = length as usize;

            if src.remaining() < length + CRLF.len() {
                return Err(Error::Incomplete);
            }

            let start = src.position() as usize;
            let data = &src.get_ref()[start..start + length];
            if &src.get_ref()[start + length..start + length + CRLF.len()] != CRLF {
                return Err(Error::UnexpectedTermination);
            }
            let data = Bytes::copy_from_slice(data);
            src.advance(length + CRLF.len());

            Ok(Frame::Bulk(data))
        }
        // *<number-of-elements>\r\n<element-1>...<element-n>
        DataType::Array => {
            let length = match get_length(src)? {
                Some(length) => length as usize,
                None => return Ok(Frame::Null),
            };

            if depth >= MAX_NESTING_DEPTH {
                return Err(Error::NestingTooDeep);
            }

            // Every element takes at least three bytes, so the remaining input bounds the
            // allocation no matter what count was announced.
            let mut frames = Vec::with_capacity(length.min(src.remaining() / 3));
            for _ in 0..length {
                frames.push(parse_frame(src, depth + 1)?);
            }

            Ok(Frame::Array(frames))
        }
    }
}

/// Reads a length line, mapping `-1` to `None`.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<u64>, Error> {
    let line = utf8(get_line(src)?)?;
    let length = line
        .parse::<i64>()
        .map_err(|_| Error::InvalidLength(line.clone()))?;

    match length {
        -1 => Ok(None),
        length if length < 0 => Err(Error::InvalidLength(line)),
        length => Ok(Some(length as u64)),
    }
}

/// Returns the bytes up to the next CRLF and moves the cursor past the terminator.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn utf8(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
