//! # Inbound Ports (Driving Ports)
//!
//! Public APIs exposed by the Address Indexing subsystem: block-level
//! maintenance driven by the validation engine, and the read-only query
//! surface driven by the transport.

use crate::domain::{
    AddressBalance, AddressDeltas, AddressInput, AddressUtxos, BlockHashesOptions, BlockHeight,
    BlockRef, Hash, IndexError, IndexedBlock, MempoolDeltaEntry, SpentInfo, TimestampedBlockHash,
};
use crate::ports::outbound::BatchOperation;

/// Index maintenance, called by the validation engine.
///
/// Blocks must be connected in chain order and disconnected in strict
/// reverse order. Any error leaves the indexes untouched.
pub trait IndexMaintenanceApi {
    /// Compute the writes for connecting `block` without applying them.
    ///
    /// The host merges the operations into its own atomic commit. The next
    /// call must not be made until that commit has landed.
    fn connect_batch(&self, block: &IndexedBlock) -> Result<Vec<BatchOperation>, IndexError>;

    /// Compute the writes for disconnecting `block` without applying them.
    fn disconnect_batch(&self, block: &IndexedBlock) -> Result<Vec<BatchOperation>, IndexError>;

    /// Connect `block` and commit in one atomic batch.
    fn connect_block(&self, block: &IndexedBlock) -> Result<(), IndexError>;

    /// Disconnect `block` and commit in one atomic batch.
    fn disconnect_block(&self, block: &IndexedBlock) -> Result<(), IndexError>;

    /// The last block applied to the indexes.
    fn indexed_tip(&self) -> Result<Option<BlockRef>, IndexError>;
}

/// Read-only queries over the indexes and the mempool.
pub trait AddressIndexQueryApi {
    /// Combined balance of every address in `addresses`.
    fn address_balance(&self, addresses: &AddressInput) -> Result<AddressBalance, IndexError>;

    /// Unspent outputs, ascending by height.
    fn address_utxos(
        &self,
        addresses: &AddressInput,
        include_chain_info: bool,
    ) -> Result<AddressUtxos, IndexError>;

    /// Delta history, optionally bounded to `[start, end]`.
    fn address_deltas(
        &self,
        addresses: &AddressInput,
        start: Option<BlockHeight>,
        end: Option<BlockHeight>,
        include_chain_info: bool,
    ) -> Result<AddressDeltas, IndexError>;

    /// De-duplicated txids touching `addresses`, ascending by height.
    ///
    /// Bounds are lenient: a missing or zero bound means unbounded and an
    /// inverted window is empty.
    fn address_txids(
        &self,
        addresses: &AddressInput,
        start: Option<BlockHeight>,
        end: Option<BlockHeight>,
    ) -> Result<Vec<Hash>, IndexError>;

    /// Blocks whose logical timestamp lies in `[low, high]`.
    fn block_hashes(
        &self,
        high: u32,
        low: u32,
        options: BlockHashesOptions,
    ) -> Result<Vec<TimestampedBlockHash>, IndexError>;

    /// Unconfirmed deltas, ascending by mempool entry time.
    fn address_mempool(&self, addresses: &AddressInput)
        -> Result<Vec<MempoolDeltaEntry>, IndexError>;

    /// The spender of output `index` of `txid`.
    fn spent_info(&self, txid: Hash, index: u32) -> Result<SpentInfo, IndexError>;
}
