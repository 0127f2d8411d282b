//! The ordered byte-key-value store contract consumed by persisted
//! adjacency, plus an in-memory backend.
//!
//! The engine only ever needs four operations from its store: point get,
//! point put, point delete, and an ascending prefix scan. Real deployments
//! inject a durable implementation; tests and benches use [`MemoryStorage`].

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::bytes::ByteArray;
use crate::error::Result;

/// A sorted key-value entry yielded by a prefix scan.
pub type Entry = (ByteArray, ByteArray);

/// An ordered byte-key-value store with prefix iteration.
///
/// `iterate_prefix` yields entries in byte-lexicographic ascending key order.
/// All operations may block on I/O; failures propagate fatally, with no retry
/// at this layer. Backends report failed validation of stored bytes as
/// [`GraphError::Corruption`](crate::error::GraphError::Corruption). Dropping
/// a scan iterator must release any underlying cursor.
pub trait Storage: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> Result<Option<ByteArray>>;

    /// Point write. A zero-length value is meaningful ("no overridden
    /// vertex") and must be stored as such.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Point delete. Deleting an absent key is a no-op.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// All stored entries whose key starts with `prefix`, ascending.
    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry>> + 'a>>;
}

/// In-memory [`Storage`] over a read-write-locked ordered map.
#[derive(Default)]
pub struct MemoryStorage {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<ByteArray>> {
        Ok(self.map.read().get(key).map(|v| ByteArray::of(v)))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry>> + 'a>> {
        // Snapshot the matching range; the guard must not outlive this call.
        let entries: Vec<Entry> = self
            .map
            .read()
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (ByteArray::of(k), ByteArray::of(v)))
            .collect();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}
