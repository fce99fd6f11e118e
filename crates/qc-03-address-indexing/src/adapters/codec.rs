//! Base58check address codec for pubkey-hash and script-hash addresses.
//!
//! Witness and taproot types need a bech32 codec and are reported as
//! unsupported here.

use crate::domain::{AddressType, IndexedAddress};
use crate::ports::outbound::{AddressCodec, CodecError};

/// Version-byte base58check codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base58CheckCodec {
    pub pubkey_version: u8,
    pub script_version: u8,
}

impl Default for Base58CheckCodec {
    fn default() -> Self {
        Self::new(0x00, 0x05)
    }
}

impl Base58CheckCodec {
    pub fn new(pubkey_version: u8, script_version: u8) -> Self {
        Self {
            pubkey_version,
            script_version,
        }
    }
}

impl AddressCodec for Base58CheckCodec {
    fn encode(&self, address: &IndexedAddress) -> Result<String, CodecError> {
        let version = match address.address_type {
            AddressType::PubkeyHash => self.pubkey_version,
            AddressType::ScriptHash => self.script_version,
            other => return Err(CodecError::Unsupported(other)),
        };
        let mut payload = Vec::with_capacity(21);
        payload.push(version);
        payload.extend_from_slice(address.hash_bytes());
        Ok(bs58::encode(payload).with_check().into_string())
    }

    fn decode(&self, encoded: &str) -> Result<IndexedAddress, CodecError> {
        let payload = bs58::decode(encoded)
            .with_check(None)
            .into_vec()
            .map_err(|e| CodecError::InvalidEncoding(e.to_string()))?;

        let (version, hash) = payload
            .split_first()
            .ok_or_else(|| CodecError::InvalidEncoding("empty payload".to_string()))?;
        let address_type = if *version == self.pubkey_version {
            AddressType::PubkeyHash
        } else if *version == self.script_version {
            AddressType::ScriptHash
        } else {
            return Err(CodecError::InvalidEncoding(format!(
                "unknown version byte {:#04x}",
                version
            )));
        };

        IndexedAddress::from_slice(address_type, hash).ok_or_else(|| {
            CodecError::InvalidEncoding(format!("payload length {}", hash.len()))
        })
    }
}
