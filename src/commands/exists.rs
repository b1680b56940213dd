use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Replies with the number of given keys that exist. A key named more than once is counted
/// every time.
///
/// Ref: <https://redis.io/docs/latest/commands/exists/>
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub keys: Vec<String>,
}

impl Executable for Exists {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let mut store = store.lock();
        let count = self.keys.iter().filter(|key| store.exists(key)).count();

        Ok(Frame::Integer(count as i64))
    }
}

impl TryFrom<&mut CommandParser> for Exists {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.remaining_strings()?;

        Ok(Self { keys })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::commands::Command;
    use crate::store::ExpireOption;

    #[test]
    fn counts_repeated_keys() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("EXISTS")),
            Frame::Bulk(Bytes::from("a")),
            Frame::Bulk(Bytes::from("a")),
            Frame::Bulk(Bytes::from("missing")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        let store = Store::new();
        store.lock().set("a".to_string(), Bytes::from("1"), None);

        assert_eq!(cmd.exec(store).unwrap(), Frame::Integer(2));
    }

    #[test]
    fn expired_keys_do_not_count() {
        let store = Store::new();
        store.lock().set(
            "a".to_string(),
            Bytes::from("1"),
            Some((ExpireOption::ExAt, 0)),
        );

        let cmd = Exists {
            keys: vec!["a".to_string()],
        };

        assert_eq!(cmd.exec(store).unwrap(), Frame::Integer(0));
    }

    #[test]
    fn zero_keys() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from("EXISTS"))]);
        let err = Command::try_from(frame).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::WrongNumberOfArguments {
                command: "exists".to_string()
            }
        );
    }
}
