use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::{ExpireOption, Store, Value};
use crate::Error;

/// Set `key` to hold the string `value`, optionally expiring it. Any previous value and
/// expiration are discarded.
///
/// Replies with the previous value when the key already existed, `OK` otherwise.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    pub expire: Option<(ExpireOption, i64)>,
}

impl Executable for Set {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let previous = store.lock().set(self.key, self.value, self.expire);

        let res = match previous {
            Some(Value::String(data)) => Frame::Bulk(data),
            Some(Value::List(list)) => Frame::Array(list.into_iter().map(Frame::Bulk).collect()),
            None => Frame::Simple("OK".to_string()),
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        let expire = match parser.next_string() {
            Ok(option) => {
                let option = option
                    .parse::<ExpireOption>()
                    .map_err(|_| CommandParserError::InvalidExpiration)?;
                let operand = parser
                    .next_integer()
                    .map_err(|_| CommandParserError::InvalidExpiration)?;
                Some((option, operand))
            }
            Err(CommandParserError::EndOfStream) => None,
            Err(err) => return Err(err),
        };

        if parser.has_remaining() {
            return Err(CommandParserError::Syntax);
        }

        Ok(Self { key, value, expire })
    }
}
