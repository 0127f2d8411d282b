//! Sequential key allocation, scoped per type.

use dashmap::DashMap;

use crate::bytes::ByteArray;
use crate::encoding::iid::VertexIid;
use crate::encoding::VertexKind;
use crate::error::{GraphError, Result};

/// Allocates the unique key suffixes embedded in vertex IIDs.
///
/// Schema vertices draw from a 2-byte counter per kind prefix; thing vertices
/// draw from an 8-byte counter per type IID. Counters start at zero and must
/// be `sync`ed past every key already persisted before the first allocation;
/// the graph does this with a vertex-record scan when it opens.
#[derive(Default)]
pub struct KeyGenerator {
    type_keys: DashMap<u8, u16>,
    thing_keys: DashMap<VertexIid, u64>,
}

impl KeyGenerator {
    /// Creates a generator with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next 2-byte key for a schema kind.
    pub fn next_type_key(&self, kind: VertexKind) -> Result<ByteArray> {
        assert!(kind.is_type(), "type keys are only generated for schema kinds");
        let mut next = self.type_keys.entry(kind.prefix()).or_insert(0);
        if *next == u16::MAX {
            return Err(GraphError::KeySpaceExhausted("schema type keys"));
        }
        let key = *next;
        *next += 1;
        Ok(ByteArray::encode_u16_be(key))
    }

    /// Allocates the next 8-byte key for instances of the given type.
    pub fn next_thing_key(&self, type_iid: &VertexIid) -> ByteArray {
        let mut next = self.thing_keys.entry(type_iid.clone()).or_insert(0);
        let key = *next;
        *next += 1;
        ByteArray::encode_u64_be(key)
    }

    /// Raises the schema counter past an observed persisted key.
    pub fn sync_type_key(&self, kind: VertexKind, key: &ByteArray) {
        let observed = key.decode_u16_be();
        let mut next = self.type_keys.entry(kind.prefix()).or_insert(0);
        if *next <= observed {
            *next = observed.saturating_add(1);
        }
    }

    /// Raises a thing counter past an observed persisted key.
    pub fn sync_thing_key(&self, type_iid: &VertexIid, key: &ByteArray) {
        let observed = key.decode_u64_be();
        let mut next = self.thing_keys.entry(type_iid.clone()).or_insert(0);
        if *next <= observed {
            *next = observed.saturating_add(1);
        }
    }
}
