//! Address index: per-address signed deltas in block order.

use crate::domain::{
    prefix_upper_bound, AddressIndexKey, Amount, HeightRange, IndexError, IndexedAddress,
};
use crate::ports::outbound::KeyValueStore;

use super::IndexWriteBatch;

pub struct AddressIndexStore<'a, S: KeyValueStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> AddressIndexStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    pub fn put(&self, batch: &mut IndexWriteBatch, key: &AddressIndexKey, amount: Amount) {
        batch.put(key.encode(), AddressIndexKey::encode_amount(amount));
    }

    pub fn delete(&self, batch: &mut IndexWriteBatch, key: &AddressIndexKey) {
        batch.delete(key.encode());
    }

    pub fn exists(&self, key: &AddressIndexKey) -> Result<bool, IndexError> {
        Ok(self.kv.exists(&key.encode())?)
    }

    /// All deltas of `address`, optionally limited to a height window, in
    /// (height, tx position, txid, index, spending) order.
    pub fn scan(
        &self,
        address: &IndexedAddress,
        range: Option<HeightRange>,
    ) -> Result<Vec<(AddressIndexKey, Amount)>, IndexError> {
        let prefix = AddressIndexKey::address_prefix(address);
        let (start, end) = match range {
            None => (prefix.clone(), prefix_upper_bound(&prefix)),
            Some(range) => {
                let start = AddressIndexKey::height_prefix(address, range.start());
                let end = match range.end().checked_add(1) {
                    Some(next) => Some(AddressIndexKey::height_prefix(address, next)),
                    None => prefix_upper_bound(&prefix),
                };
                (start, end)
            }
        };

        self.kv
            .range_scan(&start, end.as_deref())?
            .into_iter()
            .map(|(k, v)| {
                Ok((
                    AddressIndexKey::decode(&k)?,
                    AddressIndexKey::decode_amount(&v)?,
                ))
            })
            .collect()
    }
}
