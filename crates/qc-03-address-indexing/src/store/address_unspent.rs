//! Address unspent index: outputs currently unspent on the active chain.

use crate::domain::{AddressUnspentKey, AddressUnspentValue, IndexError, IndexedAddress};
use crate::ports::outbound::KeyValueStore;

use super::IndexWriteBatch;

pub struct AddressUnspentStore<'a, S: KeyValueStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> AddressUnspentStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    /// Stage `value` for `key`. A null value stages a delete.
    pub fn update(
        &self,
        batch: &mut IndexWriteBatch,
        key: &AddressUnspentKey,
        value: &AddressUnspentValue,
    ) -> Result<(), IndexError> {
        if value.is_null() {
            batch.delete(key.encode());
        } else {
            batch.put(key.encode(), value.encode()?);
        }
        Ok(())
    }

    pub fn get(&self, key: &AddressUnspentKey) -> Result<Option<AddressUnspentValue>, IndexError> {
        match self.kv.get(&key.encode())? {
            Some(bytes) => {
                let value = AddressUnspentValue::decode(&bytes)?;
                Ok((!value.is_null()).then_some(value))
            }
            None => Ok(None),
        }
    }

    /// Unspent outputs of `address` in (txid, index) order.
    pub fn scan(
        &self,
        address: &IndexedAddress,
    ) -> Result<Vec<(AddressUnspentKey, AddressUnspentValue)>, IndexError> {
        let mut out = Vec::new();
        for (k, v) in self
            .kv
            .prefix_scan(&AddressUnspentKey::address_prefix(address))?
        {
            let value = AddressUnspentValue::decode(&v)?;
            if !value.is_null() {
                out.push((AddressUnspentKey::decode(&k)?, value));
            }
        }
        Ok(out)
    }
}
