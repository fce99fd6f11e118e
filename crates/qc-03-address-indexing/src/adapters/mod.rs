//! # Adapters
//!
//! Concrete implementations of the outbound ports.
//!
//! Production: `RocksDbStore` (feature `rocksdb`)
//! Testing / embedding: `InMemoryChain`, `InMemoryMempoolIndex`, and
//! `InMemoryKVStore` from `ports::outbound`.

pub mod codec;
pub mod memory_chain;
pub mod mempool;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

pub use codec::Base58CheckCodec;
pub use memory_chain::InMemoryChain;
pub use mempool::InMemoryMempoolIndex;
#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};
