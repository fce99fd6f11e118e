//! # Index Stores
//!
//! Typed views over the [`KeyValueStore`] port, one per index family.
//! Reads go straight to the store; writes are staged in an
//! [`IndexWriteBatch`] and committed (or handed to the host) as a unit.

mod address_index;
mod address_unspent;
mod spent_index;
mod timestamp_index;

pub use address_index::AddressIndexStore;
pub use address_unspent::AddressUnspentStore;
pub use spent_index::SpentIndexStore;
pub use timestamp_index::TimestampIndexStore;

use std::collections::BTreeMap;

use crate::domain::{BlockHeight, BlockRef, IndexBaseKey, IndexError, IndexTipKey};
use crate::ports::outbound::{BatchOperation, KeyValueStore};

/// Staged writes for one block.
///
/// The last write to a key wins, so a put followed by a delete of the same
/// key (an output created and spent in one block) leaves only the delete.
/// Operations are emitted in key order.
#[derive(Debug, Default)]
pub struct IndexWriteBatch {
    ops: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl IndexWriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.insert(key, None);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_operations(self) -> Vec<BatchOperation> {
        self.ops
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOperation::Put { key, value },
                None => BatchOperation::Delete { key },
            })
            .collect()
    }
}

/// The last block applied by the maintenance protocol.
pub struct IndexTipStore<'a, S: KeyValueStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> IndexTipStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    pub fn read(&self) -> Result<Option<BlockRef>, IndexError> {
        self.kv
            .get(&IndexTipKey::encode())?
            .map(|bytes| IndexTipKey::decode_value(&bytes))
            .transpose()
    }

    /// Stage a tip update. `None` clears the marker (genesis disconnected).
    pub fn stage(&self, batch: &mut IndexWriteBatch, tip: Option<&BlockRef>) {
        match tip {
            Some(tip) => batch.put(IndexTipKey::encode(), IndexTipKey::encode_value(tip)),
            None => batch.delete(IndexTipKey::encode()),
        }
    }

    /// Height of the first block indexed on an empty store.
    pub fn read_base(&self) -> Result<Option<BlockHeight>, IndexError> {
        self.kv
            .get(&IndexBaseKey::encode())?
            .map(|bytes| IndexBaseKey::decode_value(&bytes))
            .transpose()
    }

    pub fn stage_base(&self, batch: &mut IndexWriteBatch, base: Option<BlockHeight>) {
        match base {
            Some(height) => batch.put(IndexBaseKey::encode(), IndexBaseKey::encode_value(height)),
            None => batch.delete(IndexBaseKey::encode()),
        }
    }
}
