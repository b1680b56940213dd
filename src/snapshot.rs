//! Flat-file snapshots of the store used by `SAVE` and `LOAD`.
//!
//! Each entry is written as one `key:value` line. The format is deliberately lossy:
//!
//! * list values are flattened into their elements joined by `,` and come back as strings,
//! * expirations are not written, so reloaded keys never expire,
//! * nothing is escaped, so a key containing `:` or a value containing a newline does not
//!   survive a round trip.
//!
//! Loading splits each line on its first `:` and skips lines without one.

use bytes::Bytes;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::Value;

pub const DEFAULT_SNAPSHOT_PATH: &str = "dump.kv";

const LIST_SEPARATOR: u8 = b',';

/// Renders entries in the snapshot format, sorted by key so equal stores produce equal files.
pub fn dump<'a, I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut entries: Vec<_> = entries.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut content = Vec::new();
    for (key, value) in entries {
        content.extend_from_slice(key.as_bytes());
        content.push(b':');
        match value {
            Value::String(data) => content.extend_from_slice(data),
            Value::List(list) => {
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        content.push(LIST_SEPARATOR);
                    }
                    content.extend_from_slice(item);
                }
            }
        }
        content.push(b'\n');
    }

    content
}

/// Parses snapshot content back into string entries.
pub fn parse(content: &[u8]) -> Vec<(String, Bytes)> {
    let mut entries = Vec::new();

    for (number, line) in content.split(|&b| b == b'\n').enumerate() {
        if line.is_empty() {
            continue;
        }

        let Some(separator) = line.iter().position(|&b| b == b':') else {
            warn!(line = number + 1, "skipping snapshot line without a separator");
            continue;
        };

        let key = match std::str::from_utf8(&line[..separator]) {
            Ok(key) => key.to_string(),
            Err(_) => {
                warn!(line = number + 1, "skipping snapshot line with a non UTF-8 key");
                continue;
            }
        };

        entries.push((key, Bytes::copy_from_slice(&line[separator + 1..])));
    }

    entries
}

/// Writes `content` to `path` through a temporary file in the same directory, so readers never
/// see a partially written snapshot.
pub fn write(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    let mut file = File::create(&tmp)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    debug!(path = %path.display(), bytes = content.len(), "snapshot written");
    Ok(())
}

pub fn read(path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
}
