use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error as ThisError;
use tracing::debug;

use crate::snapshot::DEFAULT_SNAPSHOT_PATH;

/// The Store is responsible for managing key-value pairs, with optional expiration settings for
/// each key. Expired keys are removed lazily, by the first operation that looks them up after
/// their deadline has passed; there is no background sweep.
///
/// Entries are only reachable through [`InnerStore::lock`], so every read and write, eviction
/// included, happens under the same exclusive lock. The store is cheap to clone and share
/// between connections.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        Store::with_snapshot_path(DEFAULT_SNAPSHOT_PATH)
    }

    /// Creates an empty store whose `SAVE` and `LOAD` commands use the file at `path`.
    pub fn with_snapshot_path(path: impl Into<PathBuf>) -> Store {
        let inner = Arc::new(InnerStore {
            state: Mutex::new(State {
                entries: HashMap::new(),
            }),
            snapshot_path: path.into(),
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    snapshot_path: PathBuf,
}

impl InnerStore {
    /// Takes the store lock. The current time is read once here, so every expiration check made
    /// through the returned guard agrees on what "now" is.
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // Every mutation is a single insert, remove or in-place push, so a poisoned map is
        // still consistent.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        InnerStoreLocked {
            state,
            now: SystemTime::now(),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
    now: SystemTime,
}

impl<'a> InnerStoreLocked<'a> {
    /// Installs a string value, replacing whatever the key held before, expiration included.
    /// Returns the previous value if the key was present.
    pub fn set(
        &mut self,
        key: String,
        data: Bytes,
        expire: Option<(ExpireOption, i64)>,
    ) -> Option<Value> {
        self.evict_expired(&key);

        let expiration = expire.map(|(option, operand)| Expiration {
            option,
            operand,
            set_at: self.now,
        });
        let entry = Entry {
            value: Value::String(data),
            expiration,
        };

        self.state.entries.insert(key, entry).map(|entry| entry.value)
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Bytes>, Error> {
        match self.live(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::String(data)) => Ok(Some(data.clone())),
            Some(Value::List(_)) => Err(Error::WrongType),
        }
    }

    /// Returns the elements of the list stored at `key`, front to back.
    #[cfg(test)]
    pub(crate) fn list(&mut self, key: &str) -> Result<Option<Vec<Bytes>>, Error> {
        match self.live(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list.iter().cloned().collect())),
            Some(Value::String(_)) => Err(Error::WrongType),
        }
    }

    #[cfg(test)]
    pub(crate) fn expiration(&mut self, key: &str) -> Option<Expiration> {
        self.live(key).and_then(|entry| entry.expiration)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.evict_expired(key);
        self.state.entries.remove(key).map(|entry| entry.value)
    }

    pub fn exists(&mut self, key: &str) -> bool {
        self.live(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.state.entries.len()
    }

    /// Adds `increment` to the integer stored as a string at `key`, starting from zero when the
    /// key is absent. The stored value and its expiration are left untouched on failure.
    pub fn incr_by(&mut self, key: &str, increment: i64) -> Result<i64, Error> {
        let current = match self.live(key).map(|entry| &entry.value) {
            None => 0,
            Some(Value::String(data)) => parse_integer(data)?,
            Some(Value::List(_)) => return Err(Error::WrongType),
        };

        let value = current
            .checked_add(increment)
            .ok_or(Error::NotAnInteger)?;
        let data = Bytes::from(value.to_string());

        match self.state.entries.get_mut(key) {
            Some(entry) => entry.value = Value::String(data),
            None => {
                let entry = Entry {
                    value: Value::String(data),
                    expiration: None,
                };
                self.state.entries.insert(key.to_string(), entry);
            }
        }

        Ok(value)
    }

    /// Inserts each value at the head of the list in turn, so the last one ends up first.
    pub fn push_front(&mut self, key: &str, values: Vec<Bytes>) -> Result<usize, Error> {
        let list = self.list_mut(key)?;
        for value in values {
            list.push_front(value);
        }
        Ok(list.len())
    }

    pub fn push_back(&mut self, key: &str, values: Vec<Bytes>) -> Result<usize, Error> {
        let list = self.list_mut(key)?;
        list.extend(values);
        Ok(list.len())
    }

    /// Iterates over the live entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        let now = self.now;
        self.state
            .entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key, &entry.value))
    }

    /// Drops every entry and installs the given string values, none of them expiring.
    pub fn replace(&mut self, entries: Vec<(String, Bytes)>) {
        self.state.entries.clear();
        for (key, data) in entries {
            let entry = Entry {
                value: Value::String(data),
                expiration: None,
            };
            self.state.entries.insert(key, entry);
        }
    }

    fn list_mut(&mut self, key: &str) -> Result<&mut VecDeque<Bytes>, Error> {
        self.evict_expired(key);

        let entry = self
            .state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: Value::List(VecDeque::new()),
                expiration: None,
            });

        match &mut entry.value {
            Value::List(list) => Ok(list),
            Value::String(_) => Err(Error::WrongType),
        }
    }

    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        self.evict_expired(key);
        self.state.entries.get_mut(key)
    }

    fn evict_expired(&mut self, key: &str) {
        let now = self.now;
        let expired = self
            .state
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));

        if expired {
            self.state.entries.remove(key);
            debug!(key, "evicted expired key");
        }
    }
}

fn parse_integer(data: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(Error::NotAnInteger)
}

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
}

/// How the operand of an expiration is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireOption {
    /// Seconds after the write.
    Ex,
    /// Milliseconds after the write.
    Px,
    /// Unix time in seconds.
    ExAt,
    /// Unix time in milliseconds.
    PxAt,
}

impl FromStr for ExpireOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EX" => Ok(ExpireOption::Ex),
            "PX" => Ok(ExpireOption::Px),
            "EXAT" => Ok(ExpireOption::ExAt),
            "PXAT" => Ok(ExpireOption::PxAt),
            _ => Err(format!("invalid expire option {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expiration {
    pub option: ExpireOption,
    pub operand: i64,
    /// When the write that installed this expiration happened.
    pub set_at: SystemTime,
}

impl Expiration {
    /// The last millisecond, counted from the unix epoch, during which the entry is still alive.
    pub fn deadline_millis(&self) -> i128 {
        let operand = i128::from(self.operand);

        match self.option {
            ExpireOption::Ex => unix_millis(self.set_at) + operand * 1000,
            ExpireOption::Px => unix_millis(self.set_at) + operand,
            ExpireOption::ExAt => operand * 1000,
            ExpireOption::PxAt => operand,
        }
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        unix_millis(now) > self.deadline_millis()
    }
}

fn unix_millis(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i128,
        Err(err) => -(err.duration().as_millis() as i128),
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expiration: Option<Expiration>,
}

impl Entry {
    fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expiration
            .is_some_and(|expiration| expiration.is_expired_at(now))
    }
}

struct State {
    entries: HashMap<String, Entry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unix_seconds_from_now(offset: i64) -> i64 {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        now.as_secs() as i64 + offset
    }

    #[test]
    fn set_returns_previous_value() {
        let store = Store::new();
        let mut store = store.lock();

        assert_eq!(store.set("name".to_string(), Bytes::from("JOHN"), None), None);
        assert_eq!(
            store.set("name".to_string(), Bytes::from("JANE"), None),
            Some(Value::String(Bytes::from("JOHN")))
        );
        assert_eq!(store.get("name"), Ok(Some(Bytes::from("JANE"))));
    }

    #[test]
    fn set_clears_previous_expiration() {
        let store = Store::new();
        let mut store = store.lock();

        store.set("k".to_string(), Bytes::from("v"), Some((ExpireOption::Ex, 100)));
        assert!(store.expiration("k").is_some());

        store.set("k".to_string(), Bytes::from("v"), None);
        assert_eq!(store.expiration("k"), None);
    }

    #[test]
    fn expired_key_is_evicted_on_lookup() {
        let store = Store::new();

        {
            let mut store = store.lock();
            store.set(
                "gone".to_string(),
                Bytes::from("v"),
                Some((ExpireOption::ExAt, unix_seconds_from_now(-10))),
            );
            store.set(
                "kept".to_string(),
                Bytes::from("v"),
                Some((ExpireOption::ExAt, unix_seconds_from_now(3600))),
            );
            assert_eq!(store.size(), 2);
        }

        let mut store = store.lock();
        assert_eq!(store.iter().count(), 1);
        assert_eq!(store.get("gone"), Ok(None));
        assert_eq!(store.size(), 1);
        assert!(store.exists("kept"));
    }

    #[test]
    fn expired_key_counts_as_absent_for_writes() {
        let store = Store::new();
        let mut store = store.lock();

        store.set(
            "counter".to_string(),
            Bytes::from("41"),
            Some((ExpireOption::PxAt, 1)),
        );
        assert_eq!(store.incr_by("counter", 1), Ok(1));
        assert_eq!(store.expiration("counter"), None);

        store.set(
            "old".to_string(),
            Bytes::from("v"),
            Some((ExpireOption::Ex, -1)),
        );
        assert_eq!(store.set("old".to_string(), Bytes::from("new"), None), None);
        assert_eq!(store.remove("missing"), None);
    }

    #[test]
    fn relative_deadlines_count_from_the_write() {
        let set_at = UNIX_EPOCH + Duration::from_millis(5_000);
        let ex = Expiration {
            option: ExpireOption::Ex,
            operand: 2,
            set_at,
        };
        let px = Expiration {
            option: ExpireOption::Px,
            operand: 10,
            set_at,
        };

        assert_eq!(ex.deadline_millis(), 7_000);
        assert_eq!(px.deadline_millis(), 5_010);

        assert!(!px.is_expired_at(set_at + Duration::from_millis(10)));
        assert!(px.is_expired_at(set_at + Duration::from_millis(11)));
        assert!(!ex.is_expired_at(set_at + Duration::from_millis(2_000)));
        assert!(ex.is_expired_at(set_at + Duration::from_millis(2_001)));
    }

    #[test]
    fn absolute_deadlines_ignore_the_write_time() {
        let set_at = UNIX_EPOCH + Duration::from_secs(1_000_000);
        let exat = Expiration {
            option: ExpireOption::ExAt,
            operand: 20,
            set_at,
        };
        let pxat = Expiration {
            option: ExpireOption::PxAt,
            operand: 20,
            set_at,
        };

        assert_eq!(exat.deadline_millis(), 20_000);
        assert_eq!(pxat.deadline_millis(), 20);
        assert!(exat.is_expired_at(set_at));
        assert!(!pxat.is_expired_at(UNIX_EPOCH + Duration::from_millis(20)));
    }

    #[test]
    fn huge_operands_do_not_overflow() {
        let expiration = Expiration {
            option: ExpireOption::Ex,
            operand: i64::MAX,
            set_at: SystemTime::now(),
        };

        assert!(!expiration.is_expired_at(SystemTime::now()));
    }

    #[test]
    fn incr_by() {
        let store = Store::new();
        let mut store = store.lock();

        assert_eq!(store.incr_by("k", 1), Ok(1));
        assert_eq!(store.incr_by("k", 1), Ok(2));
        assert_eq!(store.incr_by("k", -5), Ok(-3));
        assert_eq!(store.get("k"), Ok(Some(Bytes::from("-3"))));
    }

    #[test]
    fn incr_by_keeps_expiration() {
        let store = Store::new();
        let mut store = store.lock();

        store.set("k".to_string(), Bytes::from("1"), Some((ExpireOption::Ex, 60)));
        let before = store.expiration("k");

        assert_eq!(store.incr_by("k", 1), Ok(2));
        assert_eq!(store.expiration("k"), before);
    }

    #[test]
    fn incr_by_invalid_values() {
        let store = Store::new();
        let mut store = store.lock();

        store.set("text".to_string(), Bytes::from("value"), None);
        assert_eq!(store.incr_by("text", 1), Err(Error::NotAnInteger));
        assert_eq!(store.get("text"), Ok(Some(Bytes::from("value"))));

        store.set("max".to_string(), Bytes::from(i64::MAX.to_string()), None);
        assert_eq!(store.incr_by("max", 1), Err(Error::NotAnInteger));
        assert_eq!(store.get("max"), Ok(Some(Bytes::from(i64::MAX.to_string()))));

        store.push_back("list", vec![Bytes::from("a")]).unwrap();
        assert_eq!(store.incr_by("list", 1), Err(Error::WrongType));
    }

    #[test]
    fn push_front_and_back() {
        let store = Store::new();
        let mut store = store.lock();

        assert_eq!(store.push_front("l", vec![Bytes::from("a")]), Ok(1));
        assert_eq!(store.push_front("l", vec![Bytes::from("b")]), Ok(2));
        assert_eq!(
            store.list("l"),
            Ok(Some(vec![Bytes::from("b"), Bytes::from("a")]))
        );

        assert_eq!(store.push_back("r", vec![Bytes::from("a")]), Ok(1));
        assert_eq!(store.push_back("r", vec![Bytes::from("b")]), Ok(2));
        assert_eq!(
            store.list("r"),
            Ok(Some(vec![Bytes::from("a"), Bytes::from("b")]))
        );
    }

    #[test]
    fn push_front_multiple_values() {
        let store = Store::new();
        let mut store = store.lock();

        let values = vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")];
        assert_eq!(store.push_front("l", values), Ok(3));
        assert_eq!(
            store.list("l"),
            Ok(Some(vec![
                Bytes::from("c"),
                Bytes::from("b"),
                Bytes::from("a")
            ]))
        );
    }

    #[test]
    fn type_mismatches_leave_values_untouched() {
        let store = Store::new();
        let mut store = store.lock();

        store.set("s".to_string(), Bytes::from("v"), None);
        assert_eq!(
            store.push_front("s", vec![Bytes::from("x")]),
            Err(Error::WrongType)
        );
        assert_eq!(store.get("s"), Ok(Some(Bytes::from("v"))));

        store.push_back("l", vec![Bytes::from("x")]).unwrap();
        assert_eq!(store.get("l"), Err(Error::WrongType));
        assert_eq!(store.list("l"), Ok(Some(vec![Bytes::from("x")])));
    }

    #[test]
    fn replace_drops_previous_entries() {
        let store = Store::new();
        let mut store = store.lock();

        store.set("a".to_string(), Bytes::from("1"), Some((ExpireOption::Ex, 10)));
        store.push_back("l", vec![Bytes::from("x")]).unwrap();

        store.replace(vec![("b".to_string(), Bytes::from("2"))]);

        assert_eq!(store.size(), 1);
        assert!(!store.exists("a"));
        assert_eq!(store.get("b"), Ok(Some(Bytes::from("2"))));
        assert_eq!(store.expiration("b"), None);
    }

    #[test]
    fn expire_option_from_str() {
        assert_eq!("EX".parse::<ExpireOption>(), Ok(ExpireOption::Ex));
        assert_eq!("PXAT".parse::<ExpireOption>(), Ok(ExpireOption::PxAt));
        assert!("ex".parse::<ExpireOption>().is_err());
        assert!("KEEPTTL".parse::<ExpireOption>().is_err());
    }
}
