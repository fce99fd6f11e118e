//! # Value Objects
//!
//! Index configuration and validated query parameters.

use serde::{Deserialize, Serialize};
use std::env;

use super::entities::BlockHeight;
use super::errors::{IndexError, IndexFamily};

/// Default coinbase maturity (confirmations before a coinbase is spendable).
pub const DEFAULT_COINBASE_MATURITY: u32 = 100;

/// Which index families are maintained, plus query parameters.
///
/// Each component receives its own copy at construction and never changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maintain the address and address-unspent families (default: false).
    pub address_index: bool,
    /// Maintain the spent-output family (default: false).
    pub spent_index: bool,
    /// Maintain the timestamp families (default: false).
    pub timestamp_index: bool,
    /// Depth below which coinbase outputs count as immature (default: 100).
    pub coinbase_maturity: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            address_index: false,
            spent_index: false,
            timestamp_index: false,
            coinbase_maturity: DEFAULT_COINBASE_MATURITY,
        }
    }
}

impl IndexConfig {
    /// Every family enabled, default maturity.
    pub fn all_enabled() -> Self {
        Self {
            address_index: true,
            spent_index: true,
            timestamp_index: true,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_ADDRESS_INDEX`: Maintain the address index (default: false)
    /// - `QC_SPENT_INDEX`: Maintain the spent index (default: false)
    /// - `QC_TIMESTAMP_INDEX`: Maintain the timestamp index (default: false)
    /// - `QC_COINBASE_MATURITY`: Coinbase maturity depth (default: 100)
    pub fn from_env() -> Self {
        Self {
            address_index: env_flag("QC_ADDRESS_INDEX"),
            spent_index: env_flag("QC_SPENT_INDEX"),
            timestamp_index: env_flag("QC_TIMESTAMP_INDEX"),
            coinbase_maturity: env::var("QC_COINBASE_MATURITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_COINBASE_MATURITY),
        }
    }

    pub fn is_enabled(&self, family: IndexFamily) -> bool {
        match family {
            IndexFamily::Address => self.address_index,
            IndexFamily::Spent => self.spent_index,
            IndexFamily::Timestamp => self.timestamp_index,
        }
    }

    /// Fail with `NotEnabled` unless `family` is maintained.
    pub fn require(&self, family: IndexFamily) -> Result<(), IndexError> {
        if self.is_enabled(family) {
            Ok(())
        } else {
            Err(IndexError::NotEnabled(family))
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

/// An inclusive, validated block-height window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    start: BlockHeight,
    end: BlockHeight,
}

impl HeightRange {
    /// Both bounds must be positive and `end >= start`.
    pub fn new(start: BlockHeight, end: BlockHeight) -> Result<Self, IndexError> {
        if start == 0 || end == 0 {
            return Err(IndexError::InvalidRange(
                "Start and end are expected to be greater than zero".to_string(),
            ));
        }
        if end < start {
            return Err(IndexError::InvalidRange(
                "End value is expected to be greater than start".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse optional bounds. Absent together means unbounded; one without
    /// the other is rejected.
    pub fn from_bounds(
        start: Option<BlockHeight>,
        end: Option<BlockHeight>,
    ) -> Result<Option<Self>, IndexError> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Self::new(start, end).map(Some),
            _ => Err(IndexError::InvalidRange(
                "Start and end must be given together".to_string(),
            )),
        }
    }

    pub fn start(&self) -> BlockHeight {
        self.start
    }

    pub fn end(&self) -> BlockHeight {
        self.end
    }

    pub fn contains(&self, height: BlockHeight) -> bool {
        (self.start..=self.end).contains(&height)
    }
}
