//! # Query Layer
//!
//! Read-only queries merging the persistent indexes with the chain view and
//! the mempool. Every query either returns a complete result or one error;
//! an address the codec cannot render fails the whole query.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::{
    AddressBalance, AddressDelta, AddressDeltas, AddressInput, AddressUtxo, AddressUtxos,
    BlockHashesOptions, BlockHeight, BlockRef, Hash, HeightRange, IndexConfig, IndexError,
    IndexFamily, IndexedAddress, MempoolDeltaEntry, OutPoint, SpentInfo, TimestampedBlockHash,
};
use crate::ports::inbound::AddressIndexQueryApi;
use crate::ports::outbound::{AddressCodec, ChainView, KeyValueStore, MempoolIndexProvider};
use crate::store::{AddressIndexStore, AddressUnspentStore, SpentIndexStore, TimestampIndexStore};

/// Query service over the indexes.
pub struct AddressIndexQuery<S, C, M, A>
where
    S: KeyValueStore,
    C: ChainView,
    M: MempoolIndexProvider,
    A: AddressCodec,
{
    store: Arc<S>,
    chain: Arc<C>,
    mempool: Arc<M>,
    codec: Arc<A>,
    config: IndexConfig,
}

impl<S, C, M, A> AddressIndexQuery<S, C, M, A>
where
    S: KeyValueStore,
    C: ChainView,
    M: MempoolIndexProvider,
    A: AddressCodec,
{
    pub fn new(
        store: Arc<S>,
        chain: Arc<C>,
        mempool: Arc<M>,
        codec: Arc<A>,
        config: IndexConfig,
    ) -> Self {
        Self {
            store,
            chain,
            mempool,
            codec,
            config,
        }
    }

    /// Decode every requested address.
    pub fn resolve_addresses(
        &self,
        addresses: &AddressInput,
    ) -> Result<Vec<IndexedAddress>, IndexError> {
        addresses
            .as_slice()
            .iter()
            .map(|encoded| {
                self.codec
                    .decode(encoded)
                    .map_err(|_| IndexError::InvalidAddress(encoded.clone()))
            })
            .collect()
    }

    fn render(&self, address: &IndexedAddress) -> Result<String, IndexError> {
        self.codec
            .encode(address)
            .map_err(|_| IndexError::UnknownAddressType(address.address_type.code()))
    }

    fn chain_tip(&self) -> Result<BlockRef, IndexError> {
        self.chain
            .with_active_chain(|chain| chain.tip())
            .ok_or_else(|| IndexError::NoInformation("active chain has no tip".to_string()))
    }
}

impl<S, C, M, A> AddressIndexQueryApi for AddressIndexQuery<S, C, M, A>
where
    S: KeyValueStore,
    C: ChainView,
    M: MempoolIndexProvider,
    A: AddressCodec,
{
    fn address_balance(&self, addresses: &AddressInput) -> Result<AddressBalance, IndexError> {
        self.config.require(IndexFamily::Address)?;
        let addresses = self.resolve_addresses(addresses)?;
        let index = AddressIndexStore::new(self.store.as_ref());

        let current_height = self
            .chain
            .with_active_chain(|chain| chain.height())
            .unwrap_or(0);
        let maturity = self.config.coinbase_maturity;

        let mut totals = AddressBalance::default();
        for address in &addresses {
            for (key, amount) in index.scan(address, None)? {
                if amount > 0 {
                    totals.received += amount;
                }
                totals.balance += amount;
                if key.tx_index == 0 && current_height.saturating_sub(key.block_height) < maturity
                {
                    totals.immature += amount;
                }
            }
        }
        totals.spendable = totals.balance - totals.immature;
        Ok(totals)
    }

    fn address_utxos(
        &self,
        addresses: &AddressInput,
        include_chain_info: bool,
    ) -> Result<AddressUtxos, IndexError> {
        self.config.require(IndexFamily::Address)?;
        let addresses = self.resolve_addresses(addresses)?;
        let unspent = AddressUnspentStore::new(self.store.as_ref());

        let mut utxos = Vec::new();
        for address in &addresses {
            for (key, value) in unspent.scan(address)? {
                utxos.push(AddressUtxo {
                    address: self.render(&key.address)?,
                    txid: key.txid,
                    output_index: key.index,
                    script: value.script,
                    satoshis: value.amount,
                    height: value.block_height,
                });
            }
        }
        // Stable: equal heights keep scan order.
        utxos.sort_by_key(|utxo| utxo.height);

        let tip = if include_chain_info {
            Some(self.chain_tip()?)
        } else {
            None
        };
        Ok(AddressUtxos { utxos, tip })
    }

    fn address_deltas(
        &self,
        addresses: &AddressInput,
        start: Option<BlockHeight>,
        end: Option<BlockHeight>,
        include_chain_info: bool,
    ) -> Result<AddressDeltas, IndexError> {
        self.config.require(IndexFamily::Address)?;
        let range = HeightRange::from_bounds(start, end)?;
        let addresses = self.resolve_addresses(addresses)?;
        let index = AddressIndexStore::new(self.store.as_ref());

        let mut deltas = Vec::new();
        for address in &addresses {
            for (key, amount) in index.scan(address, range)? {
                deltas.push(AddressDelta {
                    satoshis: amount,
                    txid: key.txid,
                    index: key.index,
                    block_index: key.tx_index,
                    height: key.block_height,
                    address: self.render(&key.address)?,
                });
            }
        }

        let (start, end) = match (include_chain_info, range) {
            (true, Some(range)) => {
                let (start, end) = self.chain.with_active_chain(|chain| {
                    let height = chain.height().unwrap_or(0);
                    if chain.tip().is_none() || range.start() > height || range.end() > height {
                        return Err(IndexError::InvalidRange(
                            "Start or end is outside chain range".to_string(),
                        ));
                    }
                    let at = |height: BlockHeight| {
                        chain
                            .hash_at(height)
                            .map(|hash| BlockRef { hash, height })
                            .ok_or_else(|| {
                                IndexError::NoInformation(format!("no active block at {}", height))
                            })
                    };
                    Ok((at(range.start())?, at(range.end())?))
                })?;
                (Some(start), Some(end))
            }
            _ => (None, None),
        };

        Ok(AddressDeltas { deltas, start, end })
    }

    fn address_txids(
        &self,
        addresses: &AddressInput,
        start: Option<BlockHeight>,
        end: Option<BlockHeight>,
    ) -> Result<Vec<Hash>, IndexError> {
        self.config.require(IndexFamily::Address)?;
        // Lenient bounds: a missing or zero bound means the whole history,
        // an inverted window matches nothing.
        let range = match (start, end) {
            (Some(start), Some(end)) if start > 0 && end > 0 => {
                if end < start {
                    return Ok(Vec::new());
                }
                Some(HeightRange::new(start, end)?)
            }
            _ => None,
        };
        let addresses = self.resolve_addresses(addresses)?;
        let index = AddressIndexStore::new(self.store.as_ref());

        let mut seen: BTreeSet<(BlockHeight, Hash)> = BTreeSet::new();
        let mut txids = Vec::new();
        let single = addresses.len() == 1;

        for address in &addresses {
            for (key, _) in index.scan(address, range)? {
                // One address: scan order, first sighting wins.
                if seen.insert((key.block_height, key.txid)) && single {
                    txids.push(key.txid);
                }
            }
        }

        if !single {
            txids = seen.into_iter().map(|(_, txid)| txid).collect();
        }
        Ok(txids)
    }

    fn block_hashes(
        &self,
        high: u32,
        low: u32,
        options: BlockHashesOptions,
    ) -> Result<Vec<TimestampedBlockHash>, IndexError> {
        self.config.require(IndexFamily::Timestamp)?;
        if low > high {
            return Ok(Vec::new());
        }
        let timestamps = TimestampIndexStore::new(self.store.as_ref());

        // Scan and filter against one chain snapshot.
        self.chain.with_active_chain(|chain| {
            let entries = timestamps.scan(high, low)?;
            Ok(entries
                .into_iter()
                .filter(|(key, _)| !options.active_only || chain.contains(&key.block_hash))
                .map(|(key, height)| TimestampedBlockHash {
                    hash: key.block_hash,
                    height,
                    logical_timestamp: options.logical_times.then_some(key.timestamp),
                })
                .collect())
        })
    }

    fn address_mempool(
        &self,
        addresses: &AddressInput,
    ) -> Result<Vec<MempoolDeltaEntry>, IndexError> {
        self.config.require(IndexFamily::Address)?;
        let addresses = self.resolve_addresses(addresses)?;

        let mut deltas = self.mempool.address_deltas(&addresses);
        deltas.sort_by_key(|delta| delta.time);

        deltas
            .into_iter()
            .map(|delta| {
                let prevout = delta.prevout.filter(|_| delta.amount < 0);
                Ok(MempoolDeltaEntry {
                    address: self.render(&delta.address)?,
                    txid: delta.txid,
                    index: delta.index,
                    satoshis: delta.amount,
                    timestamp: delta.time,
                    prev_txid: prevout.map(|p| p.txid),
                    prev_output: prevout.map(|p| p.index),
                })
            })
            .collect()
    }

    fn spent_info(&self, txid: Hash, index: u32) -> Result<SpentInfo, IndexError> {
        self.config.require(IndexFamily::Spent)?;
        let outpoint = OutPoint::new(txid, index);

        if let Some(spend) = self.mempool.spent(&outpoint) {
            return Ok(SpentInfo {
                txid: spend.txid,
                index: spend.input_index,
                height: None,
            });
        }

        match SpentIndexStore::new(self.store.as_ref()).get(outpoint)? {
            Some(value) => Ok(SpentInfo {
                txid: value.txid,
                index: value.input_index,
                height: Some(value.block_height),
            }),
            None => Err(IndexError::SpentInfoNotFound { txid, index }),
        }
    }
}
