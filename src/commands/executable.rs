use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Runs a parsed command against the store and builds its reply. Failures the client should see,
/// such as `WRONGTYPE`, are returned as `Frame::Error` replies rather than `Err`.
pub trait Executable {
    fn exec(self, store: Store) -> Result<Frame, Error>;
}
