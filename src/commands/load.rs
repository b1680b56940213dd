use tracing::{error, info};

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::snapshot;
use crate::store::Store;
use crate::Error;

/// Replaces the whole store with the contents of the snapshot file. Every loaded key holds a
/// string and has no expiration.
#[derive(Debug, PartialEq)]
pub struct Load;

impl Executable for Load {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        let path = store.snapshot_path();

        let content = match snapshot::read(path) {
            Ok(content) => content,
            Err(err) => {
                error!(path = %path.display(), "failed to load snapshot: {}", err);
                return Ok(Frame::Error(format!("ERR snapshot failed: {}", err)));
            }
        };

        let keys = {
            let mut store = store.lock();
            store.replace(snapshot::parse(&content));
            store.size()
        };

        info!(path = %path.display(), keys, "loaded snapshot");
        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Load {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    use super::*;
    use crate::commands::save::Save;
    use crate::store::ExpireOption;

    fn snapshot_path() -> PathBuf {
        std::env::temp_dir().join(format!("respkv-load-{}.kv", Uuid::new_v4()))
    }

    #[test]
    fn replaces_store_contents() {
        let path = snapshot_path();
        fs::write(&path, b"a:1\nb:two:parts\n").unwrap();

        let store = Store::with_snapshot_path(&path);
        store.lock().set("stale".to_string(), Bytes::from("x"), None);

        let result = Load.exec(store.clone()).unwrap();

        assert_eq!(result, Frame::Simple("OK".to_string()));

        let mut locked = store.lock();
        assert_eq!(locked.size(), 2);
        assert!(!locked.exists("stale"));
        assert_eq!(locked.get("a"), Ok(Some(Bytes::from("1"))));
        assert_eq!(locked.get("b"), Ok(Some(Bytes::from("two:parts"))));
        drop(locked);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn round_trip_is_lossy() {
        let path = snapshot_path();
        let store = Store::with_snapshot_path(&path);
        {
            let mut store = store.lock();
            store.set(
                "session".to_string(),
                Bytes::from("abc"),
                Some((ExpireOption::Ex, 3600)),
            );
            store
                .push_front("list", vec![Bytes::from("a"), Bytes::from("b")])
                .unwrap();
        }

        assert_eq!(Save.exec(store.clone()).unwrap(), Frame::Simple("OK".to_string()));
        assert_eq!(Load.exec(store.clone()).unwrap(), Frame::Simple("OK".to_string()));

        let mut locked = store.lock();
        assert_eq!(locked.get("session"), Ok(Some(Bytes::from("abc"))));
        assert_eq!(locked.expiration("session"), None);
        assert_eq!(locked.get("list"), Ok(Some(Bytes::from("b,a"))));
        drop(locked);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file() {
        let store = Store::with_snapshot_path(snapshot_path());
        store.lock().set("kept".to_string(), Bytes::from("1"), None);

        let result = Load.exec(store.clone()).unwrap();

        assert!(matches!(result, Frame::Error(ref msg) if msg.starts_with("ERR snapshot failed")));
        assert!(store.lock().exists("kept"));
    }
}
