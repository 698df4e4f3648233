use kvt_types::StoreFeatures;

use crate::error::StoreResult;
use crate::key::Key;
use crate::record::{Record, WriteMeta};

/// The datastore as seen from the record codec.
///
/// The wire protocol and request execution live behind this trait; the codec
/// only hands over fully converted records and receives stored ones back.
///
/// Implementations must:
/// - report the same [`StoreFeatures`] for the duration of any one call,
/// - merge written bins into an existing record, removing bins written as
///   `Nil`,
/// - on a select-bins read, return only the named bins that exist.
pub trait RecordStore: Send + Sync {
    /// Capabilities of the connected store.
    fn features(&self) -> StoreFeatures;

    /// Write `record`'s bins under `key`.
    fn put(&self, key: &Key, record: &Record, meta: &WriteMeta) -> StoreResult<()>;

    /// Read the record under `key`, limited to `bins` when given.
    fn get(&self, key: &Key, bins: Option<&[String]>) -> StoreResult<Record>;
}
