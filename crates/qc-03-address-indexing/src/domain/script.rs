//! # Script Classification
//!
//! Maps a locking script to the address it pays, for the standard templates
//! the index tracks. Anything else is not indexed.

use super::entities::{AddressType, IndexedAddress};

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;

const PUSH_20: u8 = 0x14;
const PUSH_32: u8 = 0x20;

/// Extract the indexed address a script pays to, if it is a standard template.
pub fn extract_address(script: &[u8]) -> Option<IndexedAddress> {
    match script {
        [OP_DUP, OP_HASH160, PUSH_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            IndexedAddress::from_slice(AddressType::PubkeyHash, hash)
        }
        [OP_HASH160, PUSH_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            IndexedAddress::from_slice(AddressType::ScriptHash, hash)
        }
        [OP_0, PUSH_20, hash @ ..] if hash.len() == 20 => {
            IndexedAddress::from_slice(AddressType::WitnessV0KeyHash, hash)
        }
        [OP_0, PUSH_32, hash @ ..] if hash.len() == 32 => {
            IndexedAddress::from_slice(AddressType::WitnessV0ScriptHash, hash)
        }
        [OP_1, PUSH_32, key @ ..] if key.len() == 32 => {
            IndexedAddress::from_slice(AddressType::WitnessV1Taproot, key)
        }
        _ => None,
    }
}

/// Build the standard locking script for an address.
///
/// Returns `None` for `Unknown`.
pub fn script_for_address(address: &IndexedAddress) -> Option<Vec<u8>> {
    let hash = address.hash_bytes();
    let script = match address.address_type {
        AddressType::PubkeyHash => {
            let mut s = vec![OP_DUP, OP_HASH160, PUSH_20];
            s.extend_from_slice(hash);
            s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            s
        }
        AddressType::ScriptHash => {
            let mut s = vec![OP_HASH160, PUSH_20];
            s.extend_from_slice(hash);
            s.push(OP_EQUAL);
            s
        }
        AddressType::WitnessV0KeyHash => [&[OP_0, PUSH_20][..], hash].concat(),
        AddressType::WitnessV0ScriptHash => [&[OP_0, PUSH_32][..], hash].concat(),
        AddressType::WitnessV1Taproot => [&[OP_1, PUSH_32][..], hash].concat(),
        AddressType::Unknown => return None,
    };
    Some(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_templates_round_trip() {
        let cases = [
            IndexedAddress::from_slice(AddressType::PubkeyHash, &[0x11; 20]).unwrap(),
            IndexedAddress::from_slice(AddressType::ScriptHash, &[0x22; 20]).unwrap(),
            IndexedAddress::from_slice(AddressType::WitnessV0KeyHash, &[0x33; 20]).unwrap(),
            IndexedAddress::from_slice(AddressType::WitnessV0ScriptHash, &[0x44; 32]).unwrap(),
            IndexedAddress::from_slice(AddressType::WitnessV1Taproot, &[0x55; 32]).unwrap(),
        ];
        for address in cases {
            let script = script_for_address(&address).unwrap();
            assert_eq!(extract_address(&script), Some(address));
        }
    }

    #[test]
    fn test_p2pkh_layout() {
        let address = IndexedAddress::from_slice(AddressType::PubkeyHash, &[0xAA; 20]).unwrap();
        let script = script_for_address(&address).unwrap();
        assert_eq!(script.len(), 25);
        assert_eq!(script[0], OP_DUP);
        assert_eq!(script[24], OP_CHECKSIG);
    }

    #[test]
    fn test_non_standard_scripts_are_ignored() {
        assert_eq!(extract_address(&[]), None);
        // OP_RETURN data carrier
        assert_eq!(extract_address(&[0x6a, 0x04, 1, 2, 3, 4]), None);
        // Truncated P2PKH
        assert_eq!(extract_address(&[OP_DUP, OP_HASH160, PUSH_20, 1, 2, 3]), None);
        // Witness v0 with an unsupported program length
        let mut odd = vec![OP_0, 0x10];
        odd.extend_from_slice(&[0u8; 16]);
        assert_eq!(extract_address(&odd), None);
    }
}
