use tracing::{error, info};

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::snapshot;
use crate::store::Store;
use crate::Error;

/// Writes every key to the snapshot file as `key:value` lines. Lists are flattened and
/// expirations are dropped, see [`crate::snapshot`].
#[derive(Debug, PartialEq)]
pub struct Save;

impl Executable for Save {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        // The contents are captured under the lock, the file is written after releasing it.
        let (content, keys) = {
            let store = store.lock();
            (snapshot::dump(store.iter()), store.iter().count())
        };

        let path = store.snapshot_path();
        match snapshot::write(path, &content) {
            Ok(()) => {
                info!(path = %path.display(), keys, "saved snapshot");
                Ok(Frame::Simple("OK".to_string()))
            }
            Err(err) => {
                error!(path = %path.display(), "failed to save snapshot: {}", err);
                Ok(Frame::Error(format!("ERR snapshot failed: {}", err)))
            }
        }
    }
}

impl TryFrom<&mut CommandParser> for Save {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
