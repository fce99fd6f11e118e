//! # Key/Value Codec Layer
//!
//! Fixed-width binary keys for every index family, laid out so that byte
//! order equals logical order:
//!
//! | Family          | Byte | Key                                                       |
//! |-----------------|------|-----------------------------------------------------------|
//! | address index   | `a`  | type, hash[32], height, txpos, txid[32], index, spending |
//! | address unspent | `u`  | type, hash[32], txid[32], index                           |
//! | spent index     | `p`  | txid[32], index                                           |
//! | timestamp index | `s`  | logical_ts, block_hash[32]                                |
//! | block timestamp | `z`  | block_hash[32]                                            |
//! | index tip       | `T`  | -                                                         |
//! | index base      | `B`  | -                                                         |
//!
//! Integers inside keys are big-endian. Fixed-width values are little-endian;
//! variable values go through bincode.

use serde::{Deserialize, Serialize};

use super::entities::{
    AddressType, Amount, BlockHeight, BlockRef, Hash, IndexedAddress, OutPoint, NULL_HASH,
};
use super::errors::IndexError;

pub const DB_ADDRESS_INDEX: u8 = b'a';
pub const DB_ADDRESS_UNSPENT: u8 = b'u';
pub const DB_SPENT_INDEX: u8 = b'p';
pub const DB_TIMESTAMP_INDEX: u8 = b's';
pub const DB_BLOCK_TIMESTAMP: u8 = b'z';
pub const DB_INDEX_TIP: u8 = b'T';
pub const DB_INDEX_BASE: u8 = b'B';

const ADDRESS_PREFIX_LEN: usize = 1 + 1 + 32;
const ADDRESS_INDEX_KEY_LEN: usize = ADDRESS_PREFIX_LEN + 4 + 4 + 32 + 4 + 1;
const ADDRESS_UNSPENT_KEY_LEN: usize = ADDRESS_PREFIX_LEN + 32 + 4;
const SPENT_INDEX_KEY_LEN: usize = 1 + 32 + 4;
const TIMESTAMP_INDEX_KEY_LEN: usize = 1 + 4 + 32;
const BLOCK_TIMESTAMP_KEY_LEN: usize = 1 + 32;

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// `None` when the prefix is all `0xFF` (no upper bound exists).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last != u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}

/// Cursor over a fixed-width key.
struct KeyReader<'a> {
    bytes: &'a [u8],
    family: &'static str,
}

impl<'a> KeyReader<'a> {
    fn new(
        bytes: &'a [u8],
        family: &'static str,
        tag: u8,
        len: usize,
    ) -> Result<Self, IndexError> {
        if bytes.len() != len {
            return Err(IndexError::corruption(
                family,
                format!("key length {} (expected {})", bytes.len(), len),
            ));
        }
        if bytes[0] != tag {
            return Err(IndexError::corruption(family, format!("key tag {:#04x}", bytes[0])));
        }
        Ok(Self {
            bytes: &bytes[1..],
            family,
        })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], IndexError> {
        if self.bytes.len() < N {
            return Err(IndexError::corruption(self.family, "truncated key"));
        }
        let (head, rest) = self.bytes.split_at(N);
        self.bytes = rest;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, IndexError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32_be(&mut self) -> Result<u32, IndexError> {
        Ok(u32::from_be_bytes(self.take::<4>()?))
    }

    fn hash(&mut self) -> Result<Hash, IndexError> {
        self.take::<32>()
    }

    fn address(&mut self) -> Result<IndexedAddress, IndexError> {
        let address_type = AddressType::from_code(self.u8()?);
        let hash = self.hash()?;
        Ok(IndexedAddress { address_type, hash })
    }
}

fn push_address(key: &mut Vec<u8>, address: &IndexedAddress) {
    key.push(address.address_type.code());
    key.extend_from_slice(&address.hash);
}

fn decode_u32_le(bytes: &[u8], family: &'static str) -> Result<u32, IndexError> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| IndexError::corruption(family, format!("value length {}", bytes.len())))?;
    Ok(u32::from_le_bytes(arr))
}

// =============================================================================
// ADDRESS INDEX
// =============================================================================

/// One signed delta for an address at a block position.
///
/// For spending entries `index` is the spending input's index; otherwise it
/// is the output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressIndexKey {
    pub address: IndexedAddress,
    pub block_height: BlockHeight,
    pub tx_index: u32,
    pub txid: Hash,
    pub index: u32,
    pub spending: bool,
}

impl AddressIndexKey {
    const FAMILY: &'static str = "address index";

    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(ADDRESS_INDEX_KEY_LEN);
        key.push(DB_ADDRESS_INDEX);
        push_address(&mut key, &self.address);
        key.extend_from_slice(&self.block_height.to_be_bytes());
        key.extend_from_slice(&self.tx_index.to_be_bytes());
        key.extend_from_slice(&self.txid);
        key.extend_from_slice(&self.index.to_be_bytes());
        key.push(u8::from(self.spending));
        key
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r = KeyReader::new(bytes, Self::FAMILY, DB_ADDRESS_INDEX, ADDRESS_INDEX_KEY_LEN)?;
        Ok(Self {
            address: r.address()?,
            block_height: r.u32_be()?,
            tx_index: r.u32_be()?,
            txid: r.hash()?,
            index: r.u32_be()?,
            spending: r.u8()? != 0,
        })
    }

    /// Prefix covering every delta of `address`.
    pub fn address_prefix(address: &IndexedAddress) -> Vec<u8> {
        let mut key = Vec::with_capacity(ADDRESS_PREFIX_LEN);
        key.push(DB_ADDRESS_INDEX);
        push_address(&mut key, address);
        key
    }

    /// Lower bound for the deltas of `address` at or above `height`.
    pub fn height_prefix(address: &IndexedAddress, height: BlockHeight) -> Vec<u8> {
        let mut key = Self::address_prefix(address);
        key.extend_from_slice(&height.to_be_bytes());
        key
    }

    pub fn encode_amount(amount: Amount) -> Vec<u8> {
        amount.to_le_bytes().to_vec()
    }

    pub fn decode_amount(bytes: &[u8]) -> Result<Amount, IndexError> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| {
            IndexError::corruption(Self::FAMILY, format!("value length {}", bytes.len()))
        })?;
        Ok(Amount::from_le_bytes(arr))
    }
}

// =============================================================================
// ADDRESS UNSPENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressUnspentKey {
    pub address: IndexedAddress,
    pub txid: Hash,
    pub index: u32,
}

impl AddressUnspentKey {
    const FAMILY: &'static str = "address unspent";

    pub fn new(address: IndexedAddress, outpoint: OutPoint) -> Self {
        Self {
            address,
            txid: outpoint.txid,
            index: outpoint.index,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.index)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(ADDRESS_UNSPENT_KEY_LEN);
        key.push(DB_ADDRESS_UNSPENT);
        push_address(&mut key, &self.address);
        key.extend_from_slice(&self.txid);
        key.extend_from_slice(&self.index.to_be_bytes());
        key
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r =
            KeyReader::new(bytes, Self::FAMILY, DB_ADDRESS_UNSPENT, ADDRESS_UNSPENT_KEY_LEN)?;
        Ok(Self {
            address: r.address()?,
            txid: r.hash()?,
            index: r.u32_be()?,
        })
    }

    pub fn address_prefix(address: &IndexedAddress) -> Vec<u8> {
        let mut key = Vec::with_capacity(ADDRESS_PREFIX_LEN);
        key.push(DB_ADDRESS_UNSPENT);
        push_address(&mut key, address);
        key
    }
}

/// An unspent output owned by an address.
///
/// `amount == -1` is the null value: the entry does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUnspentValue {
    pub amount: Amount,
    pub block_height: BlockHeight,
    pub script: Vec<u8>,
}

impl AddressUnspentValue {
    pub fn null() -> Self {
        Self {
            amount: -1,
            block_height: 0,
            script: Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.amount == -1
    }

    pub fn encode(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|e| IndexError::corruption("address unspent", e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        bincode::deserialize(bytes)
            .map_err(|e| IndexError::corruption("address unspent", e.to_string()))
    }
}

// =============================================================================
// SPENT INDEX
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpentIndexKey {
    pub outpoint: OutPoint,
}

impl SpentIndexKey {
    const FAMILY: &'static str = "spent index";

    pub fn new(outpoint: OutPoint) -> Self {
        Self { outpoint }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(SPENT_INDEX_KEY_LEN);
        key.push(DB_SPENT_INDEX);
        key.extend_from_slice(&self.outpoint.txid);
        key.extend_from_slice(&self.outpoint.index.to_be_bytes());
        key
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r = KeyReader::new(bytes, Self::FAMILY, DB_SPENT_INDEX, SPENT_INDEX_KEY_LEN)?;
        let txid = r.hash()?;
        let index = r.u32_be()?;
        Ok(Self::new(OutPoint::new(txid, index)))
    }
}

/// The unique spender of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentIndexValue {
    pub txid: Hash,
    pub input_index: u32,
    pub block_height: BlockHeight,
    pub amount: Amount,
    pub address_type: AddressType,
    pub address_hash: Hash,
}

impl SpentIndexValue {
    /// The spent output's address, if it was a recognised one.
    pub fn address(&self) -> Option<IndexedAddress> {
        if self.address_type == AddressType::Unknown {
            return None;
        }
        Some(IndexedAddress {
            address_type: self.address_type,
            hash: self.address_hash,
        })
    }

    pub fn set_address(&mut self, address: Option<IndexedAddress>) {
        match address {
            Some(a) => {
                self.address_type = a.address_type;
                self.address_hash = a.hash;
            }
            None => {
                self.address_type = AddressType::Unknown;
                self.address_hash = NULL_HASH;
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|e| IndexError::corruption(SpentIndexKey::FAMILY, e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        bincode::deserialize(bytes)
            .map_err(|e| IndexError::corruption(SpentIndexKey::FAMILY, e.to_string()))
    }
}

// =============================================================================
// TIMESTAMP INDEX
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampIndexKey {
    pub timestamp: u32,
    pub block_hash: Hash,
}

impl TimestampIndexKey {
    const FAMILY: &'static str = "timestamp index";

    pub fn encode(&self) -> Vec<u8> {
        let mut key = TimestampIndexIteratorKey::new(self.timestamp).encode();
        key.extend_from_slice(&self.block_hash);
        key
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut r =
            KeyReader::new(bytes, Self::FAMILY, DB_TIMESTAMP_INDEX, TIMESTAMP_INDEX_KEY_LEN)?;
        Ok(Self {
            timestamp: r.u32_be()?,
            block_hash: r.hash()?,
        })
    }

    pub fn encode_height(height: BlockHeight) -> Vec<u8> {
        height.to_le_bytes().to_vec()
    }

    pub fn decode_height(bytes: &[u8]) -> Result<BlockHeight, IndexError> {
        decode_u32_le(bytes, Self::FAMILY)
    }
}

/// Range bound over the timestamp family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampIndexIteratorKey {
    pub timestamp: u32,
}

impl TimestampIndexIteratorKey {
    pub fn new(timestamp: u32) -> Self {
        Self { timestamp }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(TIMESTAMP_INDEX_KEY_LEN);
        key.push(DB_TIMESTAMP_INDEX);
        key.extend_from_slice(&self.timestamp.to_be_bytes());
        key
    }
}

/// Block hash to logical timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTimestampKey {
    pub block_hash: Hash,
}

impl BlockTimestampKey {
    const FAMILY: &'static str = "block timestamp";

    pub fn new(block_hash: Hash) -> Self {
        Self { block_hash }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(BLOCK_TIMESTAMP_KEY_LEN);
        key.push(DB_BLOCK_TIMESTAMP);
        key.extend_from_slice(&self.block_hash);
        key
    }

    pub fn encode_timestamp(timestamp: u32) -> Vec<u8> {
        timestamp.to_le_bytes().to_vec()
    }

    pub fn decode_timestamp(bytes: &[u8]) -> Result<u32, IndexError> {
        decode_u32_le(bytes, Self::FAMILY)
    }
}

// =============================================================================
// INDEX TIP
// =============================================================================

/// Metadata key holding the last block applied to the indexes.
pub struct IndexTipKey;

impl IndexTipKey {
    pub fn encode() -> Vec<u8> {
        vec![DB_INDEX_TIP]
    }

    pub fn encode_value(tip: &BlockRef) -> Vec<u8> {
        let mut value = Vec::with_capacity(36);
        value.extend_from_slice(&tip.hash);
        value.extend_from_slice(&tip.height.to_le_bytes());
        value
    }

    pub fn decode_value(bytes: &[u8]) -> Result<BlockRef, IndexError> {
        if bytes.len() != 36 {
            return Err(IndexError::corruption(
                "index tip",
                format!("value length {}", bytes.len()),
            ));
        }
        let mut hash = NULL_HASH;
        hash.copy_from_slice(&bytes[..32]);
        let height = decode_u32_le(&bytes[32..], "index tip")?;
        Ok(BlockRef { hash, height })
    }
}

/// Metadata key holding the height of the first block applied to the
/// indexes. Disconnecting that block empties the tip again.
pub struct IndexBaseKey;

impl IndexBaseKey {
    pub fn encode() -> Vec<u8> {
        vec![DB_INDEX_BASE]
    }

    pub fn encode_value(height: BlockHeight) -> Vec<u8> {
        height.to_le_bytes().to_vec()
    }

    pub fn decode_value(bytes: &[u8]) -> Result<BlockHeight, IndexError> {
        decode_u32_le(bytes, "index base")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> IndexedAddress {
        IndexedAddress::from_slice(AddressType::PubkeyHash, &[byte; 20]).unwrap()
    }

    fn delta_key(height: BlockHeight, tx_index: u32, index: u32, spending: bool) -> AddressIndexKey {
        AddressIndexKey {
            address: addr(7),
            block_height: height,
            tx_index,
            txid: [0xEE; 32],
            index,
            spending,
        }
    }

    #[test]
    fn test_address_index_key_layout() {
        let key = delta_key(0x0102_0304, 5, 6, true);
        let bytes = key.encode();
        assert_eq!(bytes.len(), ADDRESS_INDEX_KEY_LEN);
        assert_eq!(bytes[0], DB_ADDRESS_INDEX);
        assert_eq!(bytes[1], AddressType::PubkeyHash.code());
        assert_eq!(&bytes[34..38], &[1, 2, 3, 4]);
        assert_eq!(*bytes.last().unwrap(), 1);
        assert!(bytes.starts_with(&AddressIndexKey::address_prefix(&addr(7))));
        assert_eq!(AddressIndexKey::decode(&bytes).unwrap(), key);
    }

    #[test]
    fn test_address_index_keys_sort_by_height_then_position() {
        let mut keys = vec![
            delta_key(300, 0, 0, false),
            delta_key(2, 9, 1, true),
            delta_key(2, 1, 0, false),
            delta_key(256, 0, 0, false),
        ];
        let mut encoded: Vec<Vec<u8>> = keys.iter().map(AddressIndexKey::encode).collect();
        encoded.sort();
        keys.sort_by_key(|k| (k.block_height, k.tx_index, k.index));
        let decoded: Vec<_> = encoded
            .iter()
            .map(|b| AddressIndexKey::decode(b).unwrap())
            .collect();
        assert_eq!(decoded, keys);
    }

    #[test]
    fn test_timestamp_keys_sort_numerically() {
        let a = TimestampIndexKey { timestamp: 255, block_hash: [9; 32] }.encode();
        let b = TimestampIndexKey { timestamp: 256, block_hash: [0; 32] }.encode();
        assert!(a < b);
        assert!(b.starts_with(&TimestampIndexIteratorKey::new(256).encode()));
    }

    #[test]
    fn test_decode_rejects_wrong_family_and_length() {
        let spent = SpentIndexKey::new(OutPoint::new([1; 32], 2)).encode();
        assert!(matches!(
            AddressIndexKey::decode(&spent),
            Err(IndexError::Corruption { .. })
        ));
        let mut bad = spent.clone();
        bad[0] = DB_ADDRESS_UNSPENT;
        assert!(SpentIndexKey::decode(&bad).is_err());
        assert_eq!(SpentIndexKey::decode(&spent).unwrap().outpoint, OutPoint::new([1; 32], 2));
    }

    #[test]
    fn test_unspent_value_null_convention() {
        assert!(AddressUnspentValue::null().is_null());
        let value = AddressUnspentValue {
            amount: 10,
            block_height: 50,
            script: vec![0x51],
        };
        assert!(!value.is_null());
        let decoded = AddressUnspentValue::decode(&value.encode().unwrap()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_spent_value_unknown_address() {
        let mut value = SpentIndexValue {
            txid: [3; 32],
            input_index: 1,
            block_height: 60,
            amount: 10,
            address_type: AddressType::PubkeyHash,
            address_hash: [4; 32],
        };
        value.set_address(None);
        assert_eq!(value.address(), None);
        assert_eq!(value.address_hash, NULL_HASH);
    }

    #[test]
    fn test_prefix_upper_bound() {
        assert_eq!(prefix_upper_bound(&[1, 2, 3]), Some(vec![1, 2, 4]));
        assert_eq!(prefix_upper_bound(&[1, 0xFF]), Some(vec![2]));
        assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn test_index_tip_value() {
        let tip = BlockRef { hash: [5; 32], height: 77 };
        let decoded = IndexTipKey::decode_value(&IndexTipKey::encode_value(&tip)).unwrap();
        assert_eq!(decoded, tip);
        assert!(IndexTipKey::decode_value(&[0; 10]).is_err());
    }
}
