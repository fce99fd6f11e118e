//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the Address Indexing service. The host
//! implements these; the reference adapters live in `crate::adapters`.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use thiserror::Error;

use crate::domain::entities::{BlockHeight, BlockRef, Hash, IndexedAddress, OutPoint};
use crate::domain::keys::prefix_upper_bound;
use crate::domain::queries::{MempoolAddressDelta, MempoolSpend};

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },
    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

/// Address codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The string is not a valid address for this codec.
    #[error("invalid address encoding: {0}")]
    InvalidEncoding(String),
    /// The codec cannot render this address type.
    #[error("address type {0:?} not supported by this codec")]
    Unsupported(crate::domain::entities::AddressType),
}

/// An ordered byte-key store with atomic batches.
///
/// Production: `RocksDbStore` (`adapters::rocksdb`, feature `rocksdb`)
/// Testing: `InMemoryKVStore` (below)
///
/// Scans return entries in ascending key order and observe a consistent
/// snapshot.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Entries with `start <= key < end`. `end = None` scans to the end.
    fn range_scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Entries whose key starts with `prefix`.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let end = prefix_upper_bound(prefix);
        self.range_scan(prefix, end.as_deref())
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}

/// Read access to the node's active chain.
///
/// Implementations hold the chain-state read lock for the duration of `f`,
/// so every read inside one call sees the same chain.
pub trait ChainView: Send + Sync {
    fn with_active_chain<R>(&self, f: impl FnOnce(&dyn ActiveChain) -> R) -> R;
}

/// A locked snapshot of the active chain.
pub trait ActiveChain {
    /// Current tip, `None` before genesis is connected.
    fn tip(&self) -> Option<BlockRef>;

    /// Hash of the active block at `height`.
    fn hash_at(&self, height: BlockHeight) -> Option<Hash>;

    /// Whether `hash` is on the active chain.
    fn contains(&self, hash: &Hash) -> bool;

    fn height(&self) -> Option<BlockHeight> {
        self.tip().map(|t| t.height)
    }
}

/// Unconfirmed address activity, owned by the mempool.
///
/// Implementations take their own lock; each call returns a snapshot.
pub trait MempoolIndexProvider: Send + Sync {
    /// Deltas touching any of `addresses`, in no particular order.
    fn address_deltas(&self, addresses: &[IndexedAddress]) -> Vec<MempoolAddressDelta>;

    /// The mempool transaction spending `outpoint`, if any.
    fn spent(&self, outpoint: &OutPoint) -> Option<MempoolSpend>;
}

/// Pure address string codec.
pub trait AddressCodec: Send + Sync {
    fn encode(&self, address: &IndexedAddress) -> Result<String, CodecError>;

    fn decode(&self, encoded: &str) -> Result<IndexedAddress, CodecError>;
}

// =============================================================================
// IN-MEMORY ADAPTER (testing / embedding)
// =============================================================================

/// In-memory ordered key-value store.
///
/// A single write lock around each batch gives atomicity; scans clone under
/// a read lock and so see a snapshot.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Full copy of the contents.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data.read().clone()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn range_scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let upper = match end {
            Some(end) if end <= start => return Ok(Vec::new()),
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((Bound::Included(start), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
