//! Timestamp index and the block → logical timestamp family.

use crate::domain::{
    prefix_upper_bound, BlockHeight, BlockTimestampKey, Hash, IndexError, TimestampIndexIteratorKey,
    TimestampIndexKey, DB_TIMESTAMP_INDEX,
};
use crate::ports::outbound::KeyValueStore;

use super::IndexWriteBatch;

pub struct TimestampIndexStore<'a, S: KeyValueStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> TimestampIndexStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    /// Stage both the timestamp entry and the block's logical timestamp.
    pub fn put(
        &self,
        batch: &mut IndexWriteBatch,
        timestamp: u32,
        block_hash: Hash,
        height: BlockHeight,
    ) {
        let key = TimestampIndexKey { timestamp, block_hash };
        batch.put(key.encode(), TimestampIndexKey::encode_height(height));
        batch.put(
            BlockTimestampKey::new(block_hash).encode(),
            BlockTimestampKey::encode_timestamp(timestamp),
        );
    }

    pub fn delete(&self, batch: &mut IndexWriteBatch, timestamp: u32, block_hash: Hash) {
        batch.delete(TimestampIndexKey { timestamp, block_hash }.encode());
        batch.delete(BlockTimestampKey::new(block_hash).encode());
    }

    /// Logical timestamp recorded for `block_hash`.
    pub fn block_timestamp(&self, block_hash: &Hash) -> Result<Option<u32>, IndexError> {
        self.kv
            .get(&BlockTimestampKey::new(*block_hash).encode())?
            .map(|bytes| BlockTimestampKey::decode_timestamp(&bytes))
            .transpose()
    }

    /// Entries with `low <= timestamp <= high`, ascending by (timestamp, hash).
    pub fn scan(
        &self,
        high: u32,
        low: u32,
    ) -> Result<Vec<(TimestampIndexKey, BlockHeight)>, IndexError> {
        let start = TimestampIndexIteratorKey::new(low).encode();
        let end = match high.checked_add(1) {
            Some(next) => Some(TimestampIndexIteratorKey::new(next).encode()),
            None => prefix_upper_bound(&[DB_TIMESTAMP_INDEX]),
        };

        self.kv
            .range_scan(&start, end.as_deref())?
            .into_iter()
            .map(|(k, v)| {
                Ok((
                    TimestampIndexKey::decode(&k)?,
                    TimestampIndexKey::decode_height(&v)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::InMemoryKVStore;

    #[test]
    fn test_scan_window_is_inclusive() {
        let kv = InMemoryKVStore::new();
        let store = TimestampIndexStore::new(&kv);
        let mut batch = IndexWriteBatch::new();
        for (i, ts) in [100u32, 200, 200, 300, u32::MAX].into_iter().enumerate() {
            store.put(&mut batch, ts, [i as u8; 32], i as u32);
        }
        kv.atomic_batch_write(batch.into_operations()).unwrap();

        let hits = store.scan(300, 200).unwrap();
        assert_eq!(
            hits.iter().map(|(k, _)| k.timestamp).collect::<Vec<_>>(),
            vec![200, 200, 300]
        );
        assert_eq!(store.scan(u32::MAX, u32::MAX).unwrap().len(), 1);
        assert!(store.scan(99, 0).unwrap().is_empty());
        assert_eq!(store.block_timestamp(&[3; 32]).unwrap(), Some(300));
    }

    #[test]
    fn test_delete_removes_both_entries() {
        let kv = InMemoryKVStore::new();
        let store = TimestampIndexStore::new(&kv);
        let mut batch = IndexWriteBatch::new();
        store.put(&mut batch, 42, [1; 32], 7);
        kv.atomic_batch_write(batch.into_operations()).unwrap();

        let mut batch = IndexWriteBatch::new();
        store.delete(&mut batch, 42, [1; 32]);
        kv.atomic_batch_write(batch.into_operations()).unwrap();
        assert!(kv.is_empty());
    }
}
