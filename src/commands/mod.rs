pub mod decr;
pub mod del;
pub mod executable;
pub mod exists;
pub mod get;
pub mod incr;
pub mod load;
pub mod lpush;
pub mod rpush;
pub mod save;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

use decr::Decr;
use del::Del;
use exists::Exists;
use get::Get;
use incr::Incr;
use load::Load;
use lpush::LPush;
use rpush::RPush;
use save::Save;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Decr(Decr),
    Del(Del),
    Exists(Exists),
    Get(Get),
    Incr(Incr),
    Load(Load),
    LPush(LPush),
    RPush(RPush),
    Save(Save),
    Set(Set),
}

impl Executable for Command {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        match self {
            Command::Decr(cmd) => cmd.exec(store),
            Command::Del(cmd) => cmd.exec(store),
            Command::Exists(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Incr(cmd) => cmd.exec(store),
            Command::Load(cmd) => cmd.exec(store),
            Command::LPush(cmd) => cmd.exec(store),
            Command::RPush(cmd) => cmd.exec(store),
            Command::Save(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
        }
    }
}

impl Command {
    /// Whether running the command reads or writes the snapshot file.
    pub fn touches_disk(&self) -> bool {
        matches!(self, Command::Save(_) | Command::Load(_))
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                })
            }
        };

        let mut parser = CommandParser {
            parts: frames.into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        // Command names are matched case-sensitively.
        let command = match &command_name[..] {
            "DECR" => Decr::try_from(&mut parser).map(Command::Decr),
            "DEL" => Del::try_from(&mut parser).map(Command::Del),
            "EXISTS" => Exists::try_from(&mut parser).map(Command::Exists),
            "GET" => Get::try_from(&mut parser).map(Command::Get),
            "INCR" => Incr::try_from(&mut parser).map(Command::Incr),
            "LOAD" => Load::try_from(&mut parser).map(Command::Load),
            "LPUSH" => LPush::try_from(&mut parser).map(Command::LPush),
            "RPUSH" => RPush::try_from(&mut parser).map(Command::RPush),
            "SAVE" => Save::try_from(&mut parser).map(Command::Save),
            "SET" => Set::try_from(&mut parser).map(Command::Set),
            _ => {
                return Err(CommandParserError::UnknownCommand {
                    command: command_name,
                })
            }
        };

        let wrong_arity = || CommandParserError::WrongNumberOfArguments {
            command: command_name.to_lowercase(),
        };

        match command {
            Ok(_) if parser.has_remaining() => Err(wrong_arity()),
            Err(CommandParserError::EndOfStream) => Err(wrong_arity()),
            command => command,
        }
    }
}

pub struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        let command_name = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        match command_name {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn has_remaining(&self) -> bool {
        !self.parts.as_slice().is_empty()
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        match frame {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        match frame {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(string) => {
                string
                    .parse::<i64>()
                    .map_err(|_| CommandParserError::InvalidFrame {
                        expected: "parseable i64 frame".to_string(),
                        actual: Frame::Simple(string),
                    })
            }
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(CommandParserError::InvalidUTF8String)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::InvalidFrame {
                    expected: "parseable i64 frame".to_string(),
                    actual: Frame::Bulk(bytes),
                }),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        match frame {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Collects one or more strings up to the end of the command.
    fn remaining_strings(&mut self) -> Result<Vec<String>, CommandParserError> {
        let mut strings = vec![self.next_string()?];
        while self.has_remaining() {
            strings.push(self.next_string()?);
        }
        Ok(strings)
    }

    /// Collects one or more values up to the end of the command.
    fn remaining_bytes(&mut self) -> Result<Vec<Bytes>, CommandParserError> {
        let mut values = vec![self.next_bytes()?];
        while self.has_remaining() {
            values.push(self.next_bytes()?);
        }
        Ok(values)
    }
}

/// Errors returned while turning a request frame into a [`Command`]. They are sent back to the
/// client as error replies, so their messages follow the usual `ERR ...` convention.
#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR protocol error; invalid frame, expected {expected}, got {actual:?}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    #[error("ERR invalid expire option or operand")]
    InvalidExpiration,
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("ERR protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
