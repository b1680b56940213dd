use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Insert all the specified values at the tail of the list stored at key, in argument order.
///
/// Ref: <https://redis.io/docs/latest/commands/rpush/>
#[derive(Debug, PartialEq)]
pub struct RPush {
    pub key: String,
    pub values: Vec<Bytes>,
}

impl Executable for RPush {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let res = store.lock().push_back(&self.key, self.values);

        match res {
            Ok(len) => Ok(Frame::Integer(len as i64)),
            Err(err) => Ok(Frame::Error(err.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for RPush {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let values = parser.remaining_bytes()?;

        Ok(Self { key, values })
    }
}
