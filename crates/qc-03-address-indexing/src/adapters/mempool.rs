//! # In-Memory Mempool Address Index
//!
//! Address deltas and spends of unconfirmed transactions. Each transaction's
//! inserted keys are recorded so removal deletes exactly what it added.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::domain::{
    extract_address, Hash, IndexError, IndexedAddress, IndexedTransaction, MempoolAddressDelta,
    MempoolSpend, OutPoint, NULL_HASH,
};
use crate::ports::outbound::MempoolIndexProvider;

/// (address, txid, index, spending)
type DeltaKey = (IndexedAddress, Hash, u32, bool);

#[derive(Default)]
struct MempoolState {
    deltas: BTreeMap<DeltaKey, MempoolAddressDelta>,
    spent: HashMap<OutPoint, MempoolSpend>,
    inserted_deltas: HashMap<Hash, Vec<DeltaKey>>,
    inserted_spends: HashMap<Hash, Vec<OutPoint>>,
}

#[derive(Default)]
pub struct InMemoryMempoolIndex {
    state: RwLock<MempoolState>,
}

impl InMemoryMempoolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a transaction entering the mempool at `time`.
    ///
    /// Every input must carry its resolved previous output.
    pub fn add_transaction(&self, tx: &IndexedTransaction, time: u64) -> Result<(), IndexError> {
        let mut deltas = Vec::new();
        let mut spends = Vec::new();

        for (input_index, input) in tx.inputs.iter().enumerate() {
            let input_index = input_index as u32;
            let prev = input
                .spent_output
                .as_ref()
                .ok_or(IndexError::MissingPrevOutput {
                    txid: tx.txid,
                    input_index,
                    prev_txid: input.prevout.txid,
                    prev_index: input.prevout.index,
                })?;
            let address = extract_address(&prev.script_pubkey);
            if let Some(address) = address {
                deltas.push(MempoolAddressDelta {
                    address,
                    txid: tx.txid,
                    index: input_index,
                    amount: -prev.value,
                    time,
                    prevout: Some(input.prevout),
                });
            }
            spends.push((
                input.prevout,
                MempoolSpend {
                    txid: tx.txid,
                    input_index,
                    amount: prev.value,
                    address,
                },
            ));
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            if let Some(address) = extract_address(&output.script_pubkey) {
                deltas.push(MempoolAddressDelta {
                    address,
                    txid: tx.txid,
                    index: index as u32,
                    amount: output.value,
                    time,
                    prevout: None,
                });
            }
        }

        let mut state = self.state.write();
        let mut delta_keys = Vec::with_capacity(deltas.len());
        for delta in deltas {
            let key = (delta.address, delta.txid, delta.index, delta.prevout.is_some());
            state.deltas.insert(key, delta);
            delta_keys.push(key);
        }
        let mut spent_keys = Vec::with_capacity(spends.len());
        for (outpoint, spend) in spends {
            state.spent.insert(outpoint, spend);
            spent_keys.push(outpoint);
        }
        state.inserted_deltas.insert(tx.txid, delta_keys);
        state.inserted_spends.insert(tx.txid, spent_keys);

        tracing::debug!("[qc-03] Mempool index added tx 0x{}", hex::encode(&tx.txid[..8]));
        Ok(())
    }

    /// Drop everything indexed for `txid`. Returns whether it was present.
    pub fn remove_transaction(&self, txid: &Hash) -> bool {
        let mut state = self.state.write();
        let deltas = state.inserted_deltas.remove(txid);
        let spends = state.inserted_spends.remove(txid);
        let present = deltas.is_some() || spends.is_some();

        for key in deltas.unwrap_or_default() {
            state.deltas.remove(&key);
        }
        for outpoint in spends.unwrap_or_default() {
            // A conflicting tx may have replaced the entry since.
            if state.spent.get(&outpoint).is_some_and(|s| s.txid == *txid) {
                state.spent.remove(&outpoint);
            }
        }
        present
    }

    pub fn len(&self) -> usize {
        self.state.read().inserted_deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MempoolIndexProvider for InMemoryMempoolIndex {
    fn address_deltas(&self, addresses: &[IndexedAddress]) -> Vec<MempoolAddressDelta> {
        let state = self.state.read();
        addresses
            .iter()
            .flat_map(|address| {
                let low = (*address, NULL_HASH, 0, false);
                let high = (*address, [u8::MAX; 32], u32::MAX, true);
                state
                    .deltas
                    .range(low..=high)
                    .map(|(_, delta)| delta.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn spent(&self, outpoint: &OutPoint) -> Option<MempoolSpend> {
        self.state.read().spent.get(outpoint).cloned()
    }
}
