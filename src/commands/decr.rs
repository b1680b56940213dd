use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Decrements the number stored at key by one. A missing key is set to `0` before the operation.
///
/// Ref: <https://redis.io/docs/latest/commands/decr/>
#[derive(Debug, PartialEq)]
pub struct Decr {
    pub key: String,
}

impl Executable for Decr {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let res = store.lock().incr_by(&self.key, -1);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(err) => Ok(Frame::Error(err.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for Decr {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        Ok(Self { key })
    }
}
