//! # Address Indexing Subsystem (qc-03)
//!
//! Secondary indexes over the active chain, keyed by address, by spent
//! output and by block timestamp, plus the query layer that merges them
//! with the node's chain view and mempool.
//!
//! ## Index Families
//!
//! | Family          | Key                                                   | Value                         |
//! |-----------------|-------------------------------------------------------|-------------------------------|
//! | Address index   | address, height, tx position, txid, index, spending   | signed amount delta           |
//! | Address unspent | address, txid, index                                  | amount, height, script        |
//! | Spent index     | spent txid, spent index                               | spender txid/input, height... |
//! | Timestamp index | logical timestamp, block hash                         | block height                  |
//!
//! Each family is enabled independently through [`IndexConfig`]. A disabled
//! family is neither written nor queryable.
//!
//! ## Block Processing
//!
//! ```text
//! Validation engine ──connect(block)──→ IndexMaintainer ──one atomic batch──→ KeyValueStore
//!                   ←─disconnect(block)─┘         (or returned to the host to merge)
//!
//! Transport ──query──→ AddressIndexQuery ──→ KeyValueStore + ChainView + MempoolIndexProvider
//! ```
//!
//! Connects must extend the indexed tip and disconnects must remove it, so a
//! run of connects followed by the reverse disconnects restores every family
//! byte for byte.
//!
//! ## Hexagonal Architecture
//!
//! - **Domain Layer** (`domain/`): entities, key codec, script classification, config, errors
//! - **Ports Layer** (`ports/`): inbound API traits, outbound SPI traits, in-memory KV store
//! - **Store Layer** (`store/`): typed per-family views over the KV port
//! - **Service Layer** (`service/`): maintenance and query services
//! - **Adapters Layer** (`adapters/`): RocksDB, in-memory chain and mempool, base58check codec

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod store;

// Re-export main types for convenience
pub use domain::{
    AddressBalance, AddressDelta, AddressDeltas, AddressInput, AddressType, AddressUtxo,
    AddressUtxos, Amount, BlockHashesOptions, BlockHeight, BlockRef, ErrorKind, Hash,
    HeightRange, IndexConfig, IndexError, IndexFamily, IndexedAddress, IndexedBlock,
    IndexedTransaction, MempoolAddressDelta, MempoolDeltaEntry, MempoolSpend, OutPoint,
    PrevOutput, SpentInfo, TimestampedBlockHash, TxInput, TxOutput,
};
pub use ports::inbound::{AddressIndexQueryApi, IndexMaintenanceApi};
pub use ports::outbound::{
    ActiveChain, AddressCodec, BatchOperation, ChainView, CodecError, InMemoryKVStore,
    KVStoreError, KeyValueStore, MempoolIndexProvider,
};
pub use service::{AddressIndexQuery, IndexMaintainer};
