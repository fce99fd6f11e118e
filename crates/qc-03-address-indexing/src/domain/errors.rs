//! # Domain Errors
//!
//! Error types for the Address Indexing subsystem.
//!
//! Every error belongs to exactly one [`ErrorKind`]. Only the `Internal`
//! class is fatal: it means the indexes disagree with the chain and the
//! connect/disconnect that hit it was aborted.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::entities::Hash;
use crate::ports::outbound::{CodecError, KVStoreError};

/// The index families, each independently enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFamily {
    Address,
    Spent,
    Timestamp,
}

impl fmt::Display for IndexFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "Address"),
            Self::Spent => write!(f, "Spent"),
            Self::Timestamp => write!(f, "Timestamp"),
        }
    }
}

/// Errors raised by maintenance and queries.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{0} index not enabled")]
    NotEnabled(IndexFamily),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Unknown address type: {0}")]
    UnknownAddressType(u8),

    #[error("Unable to get spent info for {}:{index}", hex::encode(.txid))]
    SpentInfoNotFound { txid: Hash, index: u32 },

    #[error("No information available: {0}")]
    NoInformation(String),

    #[error(
        "Previous output {}:{prev_index} for input {input_index} of tx {} could not be resolved",
        hex::encode(.prev_txid),
        hex::encode(.txid)
    )]
    MissingPrevOutput {
        txid: Hash,
        input_index: u32,
        prev_txid: Hash,
        prev_index: u32,
    },

    #[error("{family} index entry missing during disconnect: {detail}")]
    MissingEntry { family: IndexFamily, detail: String },

    #[error("Out-of-order {operation}: indexed tip is {}, block is {}", hex_or_none(.tip), hex::encode(.block))]
    OutOfOrder {
        operation: &'static str,
        tip: Option<Hash>,
        block: Hash,
    },

    #[error("Corrupt {family} entry: {reason}")]
    Corruption { family: &'static str, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    #[error("Address codec error: {0}")]
    Codec(#[from] CodecError),
}

fn hex_or_none(hash: &Option<Hash>) -> String {
    hash.map(hex::encode).unwrap_or_else(|| "<none>".to_string())
}

/// Error classification used by the transport to pick a response category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Index family disabled.
    Configuration,
    /// Malformed address, malformed range, unknown outpoint.
    InvalidInput,
    /// No data for the request.
    LookupMiss,
    /// Index inconsistency. Fatal.
    Internal,
    /// Propagated storage failure.
    Storage,
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotEnabled(_) => ErrorKind::Configuration,
            Self::InvalidAddress(_)
            | Self::InvalidRange(_)
            | Self::UnknownAddressType(_)
            | Self::SpentInfoNotFound { .. }
            | Self::Codec(_) => ErrorKind::InvalidInput,
            Self::NoInformation(_) => ErrorKind::LookupMiss,
            Self::MissingPrevOutput { .. }
            | Self::MissingEntry { .. }
            | Self::OutOfOrder { .. }
            | Self::Corruption { .. } => ErrorKind::Internal,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    pub(crate) fn corruption(family: &'static str, reason: impl Into<String>) -> Self {
        Self::Corruption {
            family,
            reason: reason.into(),
        }
    }
}
