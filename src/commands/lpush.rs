use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Insert all the specified values at the head of the list stored at key, one after the other,
/// so `LPUSH key a b c` leaves `c` first. A missing key starts out as an empty list.
///
/// Ref: <https://redis.io/docs/latest/commands/lpush/>
#[derive(Debug, PartialEq)]
pub struct LPush {
    pub key: String,
    pub values: Vec<Bytes>,
}

impl Executable for LPush {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let res = store.lock().push_front(&self.key, self.values);

        match res {
            Ok(len) => Ok(Frame::Integer(len as i64)),
            Err(err) => Ok(Frame::Error(err.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for LPush {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let values = parser.remaining_bytes()?;

        Ok(Self { key, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;

    #[test]
    fn parse_values() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("LPUSH")),
            Frame::Bulk(Bytes::from("k")),
            Frame::Bulk(Bytes::from("a")),
            Frame::Simple("b".to_string()),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::LPush(LPush {
                key: "k".to_string(),
                values: vec![Bytes::from("a"), Bytes::from("b")],
            })
        );
    }

    #[test]
    fn missing_values() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("LPUSH")),
            Frame::Bulk(Bytes::from("k")),
        ]);
        let err = Command::try_from(frame).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::WrongNumberOfArguments {
                command: "lpush".to_string()
            }
        );
    }

    #[test]
    fn pushes_to_the_head() {
        let store = Store::new();

        let cmd = LPush {
            key: "k".to_string(),
            values: vec![Bytes::from("a")],
        };
        assert_eq!(cmd.exec(store.clone()).unwrap(), Frame::Integer(1));

        let cmd = LPush {
            key: "k".to_string(),
            values: vec![Bytes::from("b")],
        };
        assert_eq!(cmd.exec(store.clone()).unwrap(), Frame::Integer(2));

        assert_eq!(
            store.lock().list("k"),
            Ok(Some(vec![Bytes::from("b"), Bytes::from("a")]))
        );
    }

    #[test]
    fn string_key() {
        let store = Store::new();
        store.lock().set("k".to_string(), Bytes::from("v"), None);

        let cmd = LPush {
            key: "k".to_string(),
            values: vec![Bytes::from("a")],
        };

        assert_eq!(
            cmd.exec(store.clone()).unwrap(),
            Frame::Error(
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string()
            )
        );
        assert_eq!(store.lock().get("k"), Ok(Some(Bytes::from("v"))));
    }
}
