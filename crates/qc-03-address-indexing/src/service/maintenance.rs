//! # Index Maintenance
//!
//! Derives every index write for a block connect or disconnect and stages
//! them in one [`IndexWriteBatch`].
//!
//! Connect walks transactions in block order, inputs before outputs.
//! Disconnect walks them in reverse, outputs before inputs, so the staged
//! batch is the exact inverse of the connect batch.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{
    extract_address, AddressIndexKey, AddressType, AddressUnspentKey, AddressUnspentValue,
    BlockRef, IndexConfig, IndexError, IndexFamily, IndexedBlock, IndexedTransaction, OutPoint,
    PrevOutput, SpentIndexValue, TxInput, NULL_HASH,
};
use crate::ports::inbound::IndexMaintenanceApi;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use crate::store::{
    AddressIndexStore, AddressUnspentStore, IndexTipStore, IndexWriteBatch, SpentIndexStore,
    TimestampIndexStore,
};

/// Keeps the address, spent and timestamp indexes in step with the chain.
pub struct IndexMaintainer<S: KeyValueStore> {
    store: Arc<S>,
    config: IndexConfig,
    /// Serialises writers: two blocks are never staged concurrently.
    writer: Mutex<()>,
}

impl<S: KeyValueStore> IndexMaintainer<S> {
    pub fn new(store: Arc<S>, config: IndexConfig) -> Self {
        Self {
            store,
            config,
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn any_enabled(&self) -> bool {
        self.config.address_index || self.config.spent_index || self.config.timestamp_index
    }

    fn resolves_inputs(&self) -> bool {
        self.config.address_index || self.config.spent_index
    }

    // =========================================================================
    // CONNECT
    // =========================================================================

    fn stage_connect(&self, block: &IndexedBlock) -> Result<IndexWriteBatch, IndexError> {
        let mut batch = IndexWriteBatch::new();
        if !self.any_enabled() {
            return Ok(batch);
        }

        let kv = self.store.as_ref();
        let tips = IndexTipStore::new(kv);
        let tip = tips.read()?;
        if let Some(tip) = tip {
            if tip.hash != block.parent_hash {
                tracing::warn!(
                    "[qc-03] Rejecting connect of block #{} 0x{}: parent is not the indexed tip #{}",
                    block.height,
                    hex::encode(&block.hash[..8]),
                    tip.height
                );
                return Err(IndexError::OutOfOrder {
                    operation: "connect",
                    tip: Some(tip.hash),
                    block: block.hash,
                });
            }
        }

        let address_index = AddressIndexStore::new(kv);
        let unspent = AddressUnspentStore::new(kv);
        let spent = SpentIndexStore::new(kv);

        // Outputs created so far in this block, for inputs the engine left
        // unresolved.
        let mut created: HashMap<OutPoint, PrevOutput> = HashMap::new();

        for (tx_pos, tx) in block.transactions.iter().enumerate() {
            let tx_pos = tx_pos as u32;

            if !tx.is_coinbase() && self.resolves_inputs() {
                for (input_index, input) in tx.inputs.iter().enumerate() {
                    let input_index = input_index as u32;
                    let prev = resolve_prevout(tx, input_index, input, &created)?;
                    let address = extract_address(&prev.script_pubkey);

                    if self.config.address_index {
                        if let Some(address) = address {
                            let key = AddressIndexKey {
                                address,
                                block_height: block.height,
                                tx_index: tx_pos,
                                txid: tx.txid,
                                index: input_index,
                                spending: true,
                            };
                            address_index.put(&mut batch, &key, -prev.value);
                            unspent.update(
                                &mut batch,
                                &AddressUnspentKey::new(address, input.prevout),
                                &AddressUnspentValue::null(),
                            )?;
                        }
                    }

                    if self.config.spent_index {
                        let mut value = SpentIndexValue {
                            txid: tx.txid,
                            input_index,
                            block_height: block.height,
                            amount: prev.value,
                            address_type: AddressType::Unknown,
                            address_hash: NULL_HASH,
                        };
                        value.set_address(address);
                        spent.put(&mut batch, input.prevout, &value)?;
                    }
                }
            }

            for (index, output) in tx.outputs.iter().enumerate() {
                let index = index as u32;
                let outpoint = OutPoint::new(tx.txid, index);

                if self.config.address_index {
                    if let Some(address) = extract_address(&output.script_pubkey) {
                        let key = AddressIndexKey {
                            address,
                            block_height: block.height,
                            tx_index: tx_pos,
                            txid: tx.txid,
                            index,
                            spending: false,
                        };
                        address_index.put(&mut batch, &key, output.value);
                        unspent.update(
                            &mut batch,
                            &AddressUnspentKey::new(address, outpoint),
                            &AddressUnspentValue {
                                amount: output.value,
                                block_height: block.height,
                                script: output.script_pubkey.clone(),
                            },
                        )?;
                    }
                }

                created.insert(
                    outpoint,
                    PrevOutput {
                        value: output.value,
                        script_pubkey: output.script_pubkey.clone(),
                        height: block.height,
                    },
                );
            }
        }

        if self.config.timestamp_index {
            let timestamps = TimestampIndexStore::new(kv);
            let logical = match timestamps.block_timestamp(&block.parent_hash)? {
                Some(parent) if block.time <= parent => parent.saturating_add(1),
                _ => block.time,
            };
            timestamps.put(&mut batch, logical, block.hash, block.height);
        }

        if tip.is_none() {
            tips.stage_base(&mut batch, Some(block.height));
        }
        tips.stage(
            &mut batch,
            Some(&BlockRef {
                hash: block.hash,
                height: block.height,
            }),
        );

        tracing::debug!(
            "[qc-03] Staged {} index writes for block #{}",
            batch.len(),
            block.height
        );
        Ok(batch)
    }

    // =========================================================================
    // DISCONNECT
    // =========================================================================

    fn stage_disconnect(&self, block: &IndexedBlock) -> Result<IndexWriteBatch, IndexError> {
        let mut batch = IndexWriteBatch::new();
        if !self.any_enabled() {
            return Ok(batch);
        }

        let kv = self.store.as_ref();
        let tips = IndexTipStore::new(kv);
        let tip = tips.read()?;
        if tip.map(|t| t.hash) != Some(block.hash) {
            tracing::warn!(
                "[qc-03] Rejecting disconnect of block #{} 0x{}: not the indexed tip",
                block.height,
                hex::encode(&block.hash[..8])
            );
            return Err(IndexError::OutOfOrder {
                operation: "disconnect",
                tip: tip.map(|t| t.hash),
                block: block.hash,
            });
        }

        let address_index = AddressIndexStore::new(kv);
        let unspent = AddressUnspentStore::new(kv);
        let spent = SpentIndexStore::new(kv);

        let created: HashMap<OutPoint, PrevOutput> = block
            .transactions
            .iter()
            .flat_map(|tx| {
                tx.outputs.iter().enumerate().map(move |(index, output)| {
                    (
                        OutPoint::new(tx.txid, index as u32),
                        PrevOutput {
                            value: output.value,
                            script_pubkey: output.script_pubkey.clone(),
                            height: block.height,
                        },
                    )
                })
            })
            .collect();

        for (tx_pos, tx) in block.transactions.iter().enumerate().rev() {
            let tx_pos = tx_pos as u32;

            if self.config.address_index {
                for (index, output) in tx.outputs.iter().enumerate().rev() {
                    let index = index as u32;
                    let Some(address) = extract_address(&output.script_pubkey) else {
                        continue;
                    };
                    let key = AddressIndexKey {
                        address,
                        block_height: block.height,
                        tx_index: tx_pos,
                        txid: tx.txid,
                        index,
                        spending: false,
                    };
                    require_entry(address_index.exists(&key)?, IndexFamily::Address, || {
                        format!("output {}:{}", hex::encode(tx.txid), index)
                    })?;
                    address_index.delete(&mut batch, &key);
                    unspent.update(
                        &mut batch,
                        &AddressUnspentKey::new(address, OutPoint::new(tx.txid, index)),
                        &AddressUnspentValue::null(),
                    )?;
                }
            }

            if tx.is_coinbase() || !self.resolves_inputs() {
                continue;
            }

            for (input_index, input) in tx.inputs.iter().enumerate().rev() {
                let input_index = input_index as u32;
                let prev = resolve_prevout(tx, input_index, input, &created)?;

                if self.config.address_index {
                    if let Some(address) = extract_address(&prev.script_pubkey) {
                        let key = AddressIndexKey {
                            address,
                            block_height: block.height,
                            tx_index: tx_pos,
                            txid: tx.txid,
                            index: input_index,
                            spending: true,
                        };
                        require_entry(address_index.exists(&key)?, IndexFamily::Address, || {
                            format!("input {}:{}", hex::encode(tx.txid), input_index)
                        })?;
                        address_index.delete(&mut batch, &key);
                        // Restore the consumed output to its prior owner.
                        unspent.update(
                            &mut batch,
                            &AddressUnspentKey::new(address, input.prevout),
                            &AddressUnspentValue {
                                amount: prev.value,
                                block_height: prev.height,
                                script: prev.script_pubkey.clone(),
                            },
                        )?;
                    }
                }

                if self.config.spent_index {
                    require_entry(spent.exists(input.prevout)?, IndexFamily::Spent, || {
                        format!(
                            "spend of {}:{}",
                            hex::encode(input.prevout.txid),
                            input.prevout.index
                        )
                    })?;
                    spent.delete(&mut batch, input.prevout);
                }
            }
        }

        if self.config.timestamp_index {
            let timestamps = TimestampIndexStore::new(kv);
            let logical = timestamps.block_timestamp(&block.hash)?.ok_or_else(|| {
                IndexError::MissingEntry {
                    family: IndexFamily::Timestamp,
                    detail: format!("block 0x{}", hex::encode(block.hash)),
                }
            })?;
            timestamps.delete(&mut batch, logical, block.hash);
        }

        // Unwinding the first indexed block leaves no tip, as before it.
        let first = tips
            .read_base()?
            .map_or(block.height == 0, |base| base == block.height);
        let parent = if first {
            tips.stage_base(&mut batch, None);
            None
        } else {
            block.height.checked_sub(1).map(|height| BlockRef {
                hash: block.parent_hash,
                height,
            })
        };
        tips.stage(&mut batch, parent.as_ref());

        tracing::debug!(
            "[qc-03] Staged {} index removals for block #{}",
            batch.len(),
            block.height
        );
        Ok(batch)
    }

    fn commit(&self, batch: IndexWriteBatch) -> Result<usize, IndexError> {
        let count = batch.len();
        if count > 0 {
            self.store.atomic_batch_write(batch.into_operations())?;
        }
        Ok(count)
    }
}

/// The previous output an input consumes: as supplied by the engine, or
/// created earlier in the same block.
fn resolve_prevout<'a>(
    tx: &IndexedTransaction,
    input_index: u32,
    input: &'a TxInput,
    created: &'a HashMap<OutPoint, PrevOutput>,
) -> Result<&'a PrevOutput, IndexError> {
    if let Some(prev) = &input.spent_output {
        return Ok(prev);
    }
    created.get(&input.prevout).ok_or_else(|| {
        tracing::error!(
            "[qc-03] Unable to resolve previous output {}:{} for tx 0x{}",
            hex::encode(input.prevout.txid),
            input.prevout.index,
            hex::encode(&tx.txid[..8])
        );
        IndexError::MissingPrevOutput {
            txid: tx.txid,
            input_index,
            prev_txid: input.prevout.txid,
            prev_index: input.prevout.index,
        }
    })
}

fn require_entry(
    present: bool,
    family: IndexFamily,
    detail: impl FnOnce() -> String,
) -> Result<(), IndexError> {
    if present {
        return Ok(());
    }
    let detail = detail();
    tracing::error!("[qc-03] {} index entry missing on disconnect: {}", family, detail);
    Err(IndexError::MissingEntry { family, detail })
}

impl<S: KeyValueStore> IndexMaintenanceApi for IndexMaintainer<S> {
    fn connect_batch(&self, block: &IndexedBlock) -> Result<Vec<BatchOperation>, IndexError> {
        let _guard = self.writer.lock();
        Ok(self.stage_connect(block)?.into_operations())
    }

    fn disconnect_batch(&self, block: &IndexedBlock) -> Result<Vec<BatchOperation>, IndexError> {
        let _guard = self.writer.lock();
        Ok(self.stage_disconnect(block)?.into_operations())
    }

    fn connect_block(&self, block: &IndexedBlock) -> Result<(), IndexError> {
        let _guard = self.writer.lock();
        let batch = self.stage_connect(block)?;
        let count = self.commit(batch)?;
        tracing::info!(
            "[qc-03] ✓ Indexed block #{} 0x{} ({} txs, {} writes)",
            block.height,
            hex::encode(&block.hash[..8]),
            block.transactions.len(),
            count
        );
        Ok(())
    }

    fn disconnect_block(&self, block: &IndexedBlock) -> Result<(), IndexError> {
        let _guard = self.writer.lock();
        let batch = self.stage_disconnect(block)?;
        let count = self.commit(batch)?;
        tracing::info!(
            "[qc-03] ↩ Unindexed block #{} 0x{} ({} writes)",
            block.height,
            hex::encode(&block.hash[..8]),
            count
        );
        Ok(())
    }

    fn indexed_tip(&self) -> Result<Option<BlockRef>, IndexError> {
        IndexTipStore::new(self.store.as_ref()).read()
    }
}
