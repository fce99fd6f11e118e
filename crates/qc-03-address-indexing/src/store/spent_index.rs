//! Spent index: confirmed spender of each consumed output.

use crate::domain::{IndexError, OutPoint, SpentIndexKey, SpentIndexValue};
use crate::ports::outbound::KeyValueStore;

use super::IndexWriteBatch;

pub struct SpentIndexStore<'a, S: KeyValueStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> SpentIndexStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    pub fn put(
        &self,
        batch: &mut IndexWriteBatch,
        outpoint: OutPoint,
        value: &SpentIndexValue,
    ) -> Result<(), IndexError> {
        batch.put(SpentIndexKey::new(outpoint).encode(), value.encode()?);
        Ok(())
    }

    pub fn delete(&self, batch: &mut IndexWriteBatch, outpoint: OutPoint) {
        batch.delete(SpentIndexKey::new(outpoint).encode());
    }

    pub fn get(&self, outpoint: OutPoint) -> Result<Option<SpentIndexValue>, IndexError> {
        self.kv
            .get(&SpentIndexKey::new(outpoint).encode())?
            .map(|bytes| SpentIndexValue::decode(&bytes))
            .transpose()
    }

    pub fn exists(&self, outpoint: OutPoint) -> Result<bool, IndexError> {
        Ok(self.kv.exists(&SpentIndexKey::new(outpoint).encode())?)
    }
}
