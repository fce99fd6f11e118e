//! # Query Types
//!
//! Typed results handed to the transport, plus the mempool records the query
//! layer reads from the mempool provider.
//!
//! Hashes and scripts serialize as lowercase hex; addresses are already
//! rendered by the address codec.

use serde::Serialize;

use super::entities::{Amount, BlockHeight, BlockRef, Hash, IndexedAddress, OutPoint};
use super::{serialize_bytes, serialize_hash};

/// Either one address or a list, as accepted by every address query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    Single(String),
    Multiple(Vec<String>),
}

impl AddressInput {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(address) => std::slice::from_ref(address),
            Self::Multiple(addresses) => addresses,
        }
    }
}

impl From<&str> for AddressInput {
    fn from(address: &str) -> Self {
        Self::Single(address.to_string())
    }
}

impl From<Vec<String>> for AddressInput {
    fn from(addresses: Vec<String>) -> Self {
        Self::Multiple(addresses)
    }
}

/// Combined confirmed balance of a set of addresses.
///
/// `balance == spendable + immature`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddressBalance {
    pub balance: Amount,
    pub received: Amount,
    pub spendable: Amount,
    pub immature: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressUtxo {
    pub address: String,
    #[serde(serialize_with = "serialize_hash")]
    pub txid: Hash,
    pub output_index: u32,
    #[serde(serialize_with = "serialize_bytes")]
    pub script: Vec<u8>,
    pub satoshis: Amount,
    pub height: BlockHeight,
}

/// UTXO listing, optionally pinned to the tip it was read against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressUtxos {
    pub utxos: Vec<AddressUtxo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<BlockRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressDelta {
    pub satoshis: Amount,
    #[serde(serialize_with = "serialize_hash")]
    pub txid: Hash,
    /// Output index, or the spending input's index for negative deltas.
    pub index: u32,
    pub block_index: u32,
    pub height: BlockHeight,
    pub address: String,
}

/// Delta history. `start`/`end` are filled when chain info was requested
/// for a bounded range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressDeltas {
    pub deltas: Vec<AddressDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<BlockRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<BlockRef>,
}

/// A block found by timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampedBlockHash {
    #[serde(serialize_with = "serialize_hash")]
    pub hash: Hash,
    pub height: BlockHeight,
    /// Present only when logical timestamps were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_timestamp: Option<u32>,
}

/// Lookup options for timestamp queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHashesOptions {
    /// Drop blocks that are no longer on the active chain.
    pub active_only: bool,
    /// Report each block's logical timestamp.
    pub logical_times: bool,
}

/// The spender of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpentInfo {
    #[serde(serialize_with = "serialize_hash")]
    pub txid: Hash,
    pub index: u32,
    /// `None` while the spend is only in the mempool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<BlockHeight>,
}

// =============================================================================
// MEMPOOL
// =============================================================================

/// One address delta of an unconfirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolAddressDelta {
    pub address: IndexedAddress,
    pub txid: Hash,
    /// Output index, or input index for spends.
    pub index: u32,
    pub amount: Amount,
    /// Time the transaction entered the mempool (seconds).
    pub time: u64,
    /// Output consumed, for spends.
    pub prevout: Option<OutPoint>,
}

/// A mempool transaction spending an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolSpend {
    pub txid: Hash,
    pub input_index: u32,
    pub amount: Amount,
    pub address: Option<IndexedAddress>,
}

/// Rendered mempool delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MempoolDeltaEntry {
    pub address: String,
    #[serde(serialize_with = "serialize_hash")]
    pub txid: Hash,
    pub index: u32,
    pub satoshis: Amount,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_hash")]
    pub prev_txid: Option<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_output: Option<u32>,
}

fn serialize_opt_hash<S: serde::Serializer>(
    hash: &Option<Hash>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match hash {
        Some(h) => serialize_hash(h, serializer),
        None => serializer.serialize_none(),
    }
}
