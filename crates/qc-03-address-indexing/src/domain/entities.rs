//! # Domain Entities
//!
//! Chain-side inputs consumed by the indexer and the address model shared by
//! every index family.
//!
//! Blocks arrive from the validation engine as [`IndexedBlock`]s: the full
//! ordered transaction list, with each input carrying the previous output it
//! consumes (resolved by the engine from its coins view or undo data).

use serde::{Deserialize, Serialize};

/// A 32-byte hash (block hash, txid, padded address hash).
pub type Hash = [u8; 32];

/// Signed amount in base units. Negative values are spends.
pub type Amount = i64;

/// Block height on the active chain.
pub type BlockHeight = u32;

/// The all-zero hash.
pub const NULL_HASH: Hash = [0u8; 32];

/// Address kinds recognised by the index.
///
/// The discriminant is the on-disk code; changing it breaks existing indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AddressType {
    Unknown = 0,
    PubkeyHash = 1,
    ScriptHash = 2,
    WitnessV0KeyHash = 3,
    WitnessV0ScriptHash = 4,
    WitnessV1Taproot = 5,
}

impl AddressType {
    /// On-disk code for this type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode an on-disk code. Out-of-range codes map to `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::PubkeyHash,
            2 => Self::ScriptHash,
            3 => Self::WitnessV0KeyHash,
            4 => Self::WitnessV0ScriptHash,
            5 => Self::WitnessV1Taproot,
            _ => Self::Unknown,
        }
    }

    /// Number of significant bytes in the 32-byte hash field.
    pub fn hash_len(self) -> usize {
        match self {
            Self::PubkeyHash | Self::ScriptHash | Self::WitnessV0KeyHash => 20,
            Self::WitnessV0ScriptHash | Self::WitnessV1Taproot => 32,
            Self::Unknown => 0,
        }
    }
}

/// An address as the index stores it: a type tag plus a padded hash.
///
/// 20-byte hashes occupy the first 20 bytes; the remainder is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexedAddress {
    pub address_type: AddressType,
    pub hash: Hash,
}

impl IndexedAddress {
    /// Build from a type and its significant hash bytes.
    ///
    /// Returns `None` if the byte count does not match the type's width.
    pub fn from_slice(address_type: AddressType, bytes: &[u8]) -> Option<Self> {
        if address_type == AddressType::Unknown || bytes.len() != address_type.hash_len() {
            return None;
        }
        let mut hash = NULL_HASH;
        hash[..bytes.len()].copy_from_slice(bytes);
        Some(Self { address_type, hash })
    }

    /// The significant bytes of the hash for this address type.
    pub fn hash_bytes(&self) -> &[u8] {
        &self.hash[..self.address_type.hash_len()]
    }
}

/// Reference to a transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// The outpoint a coinbase input refers to.
    pub fn null() -> Self {
        Self {
            txid: NULL_HASH,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == NULL_HASH && self.index == u32::MAX
    }
}

/// A previous output as resolved by the validation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevOutput {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
    /// Height of the block that created the output.
    pub height: BlockHeight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prevout: OutPoint,
    /// Resolved previous output. `None` when the engine could not supply it,
    /// in which case it must have been created earlier in the same block.
    pub spent_output: Option<PrevOutput>,
}

impl TxInput {
    pub fn new(prevout: OutPoint, spent_output: Option<PrevOutput>) -> Self {
        Self {
            prevout,
            spent_output,
        }
    }

    pub fn coinbase() -> Self {
        Self {
            prevout: OutPoint::null(),
            spent_output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTransaction {
    pub txid: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl IndexedTransaction {
    /// A coinbase has exactly one input, referring to the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }
}

/// A block as delivered on connect or disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedBlock {
    pub hash: Hash,
    pub parent_hash: Hash,
    pub height: BlockHeight,
    /// Header timestamp (seconds).
    pub time: u32,
    pub transactions: Vec<IndexedTransaction>,
}

/// A block identified by hash and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRef {
    #[serde(serialize_with = "crate::domain::serialize_hash")]
    pub hash: Hash,
    pub height: BlockHeight,
}
