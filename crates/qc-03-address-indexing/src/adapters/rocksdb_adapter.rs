//! # RocksDB Storage Adapter
//!
//! Production implementation of the `KeyValueStore` port.
//!
//! ## Features
//!
//! - Atomic batch writes (WriteBatch)
//! - Dedicated column family for the index families
//! - Snappy compression
//! - Bloom filters for point lookups (spent index, block timestamps)
//!
//! Iterators observe an implicit snapshot taken when they are created, so
//! every scan is a consistent read.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};

use crate::ports::outbound::{BatchOperation, KVStoreError, KeyValueStore};

/// Column family holding every index family.
pub const CF_ADDRESS_INDEX: &str = "address_index";

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Block cache size in bytes (default: 128MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Target file size for level-1 (default: 64MB)
    pub target_file_size_base: u64,
    /// Enable fsync after each batch (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/address-index".to_string(),
            block_cache_size: 128 * 1024 * 1024, // 128MB
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
            target_file_size_base: 64 * 1024 * 1024, // 64MB
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,  // 8MB
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            max_write_buffer_number: 2,
            target_file_size_base: 4 * 1024 * 1024, // 4MB
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: Arc<RwLock<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_target_file_size_base(config.target_file_size_base);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));

        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        cf_opts.set_block_based_table_factory(&block_opts);
        let cf = ColumnFamilyDescriptor::new(CF_ADDRESS_INDEX, cf_opts);

        let db = DB::open_cf_descriptors(&opts, &config.path, vec![cf]).map_err(|e| {
            KVStoreError::IOError {
                message: format!("Failed to open RocksDB: {}", e),
            }
        })?;

        tracing::info!("[qc-03] 💾 Opened address index database at {}", config.path);

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    /// Open with default tuning at `path`.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, KVStoreError> {
        let config = RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::open(config)
    }
}

fn index_cf(db: &DB) -> Result<&ColumnFamily, KVStoreError> {
    db.cf_handle(CF_ADDRESS_INDEX)
        .ok_or_else(|| KVStoreError::CorruptionError {
            message: format!("missing column family {}", CF_ADDRESS_INDEX),
        })
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let db = self.db.read();
        db.get_cf(index_cf(&db)?, key)
            .map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB get failed: {}", e),
            })
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        let db = self.db.read();
        db.get_pinned_cf(index_cf(&db)?, key)
            .map(|v| v.is_some())
            .map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB exists check failed: {}", e),
            })
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let db = self.db.write();
        let cf = index_cf(&db)?;
        let mut batch = WriteBatch::default();

        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    batch.put_cf(cf, &key, &value);
                }
                BatchOperation::Delete { key } => {
                    batch.delete_cf(cf, &key);
                }
            }
        }

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);

        db.write_opt(batch, &write_opts)
            .map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB batch write failed: {}", e),
            })
    }

    fn range_scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let db = self.db.read();
        let mut results = Vec::new();

        let iter = db.iterator_cf(index_cf(&db)?, IteratorMode::From(start, Direction::Forward));

        for item in iter {
            match item {
                Ok((key, value)) => {
                    if end.is_some_and(|end| &*key >= end) {
                        break;
                    }
                    results.push((key.to_vec(), value.to_vec()));
                }
                Err(e) => {
                    return Err(KVStoreError::IOError {
                        message: format!("RocksDB scan failed: {}", e),
                    });
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RocksDbStore) {
        let dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(dir.path().to_string_lossy().to_string());
        let store = RocksDbStore::open(config).unwrap();
        (dir, store)
    }

    #[test]
    fn test_batch_and_get() {
        let (_dir, store) = open_temp();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a1".to_vec(), b"v1".to_vec()),
                BatchOperation::put(b"a2".to_vec(), b"v2".to_vec()),
                BatchOperation::delete(b"a1".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.get(b"a1").unwrap(), None);
        assert_eq!(store.get(b"a2").unwrap(), Some(b"v2".to_vec()));
        assert!(store.exists(b"a2").unwrap());
    }

    #[test]
    fn test_prefix_and_range_scan() {
        let (_dir, store) = open_temp();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(vec![b'a', 1], vec![1]),
                BatchOperation::put(vec![b'a', 2], vec![2]),
                BatchOperation::put(vec![b'b', 0], vec![3]),
            ])
            .unwrap();

        let prefix = store.prefix_scan(b"a").unwrap();
        assert_eq!(prefix.len(), 2);
        assert_eq!(prefix[0].0, vec![b'a', 1]);

        let bounded = store.range_scan(&[b'a', 2], Some(&[b'b', 0])).unwrap();
        assert_eq!(bounded, vec![(vec![b'a', 2], vec![2])]);
    }

    #[test]
    fn test_reopen_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        {
            let store = RocksDbStore::open(RocksDbConfig::for_testing(path)).unwrap();
            store
                .atomic_batch_write(vec![BatchOperation::put(b"T".to_vec(), vec![7; 36])])
                .unwrap();
        }
        // Default tuning opens the same files.
        let store = RocksDbStore::open_default(dir.path()).unwrap();
        assert_eq!(store.get(b"T").unwrap(), Some(vec![7; 36]));
    }
}
