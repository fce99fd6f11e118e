//! # Randomised Reorg Round-Trip (qc-03)
//!
//! Random chains of spends, connected and then disconnected in reverse,
//! must leave every index family exactly as it was. Between the two the
//! families must agree with each other.

mod common;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use common::*;
use qc_03_address_indexing::domain::{script_for_address, SpentIndexKey, SpentIndexValue};
use qc_03_address_indexing::store::{AddressIndexStore, AddressUnspentStore};
use qc_03_address_indexing::{
    Amount, IndexMaintenanceApi, IndexedAddress, IndexedTransaction, KeyValueStore, OutPoint,
    PrevOutput, TxInput, TxOutput,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// CHAIN GENERATOR
// =============================================================================

struct Generator {
    rng: StdRng,
    owners: Vec<Vec<u8>>,
    unspent: Vec<(OutPoint, PrevOutput)>,
    next_txid: u32,
}

impl Generator {
    fn new(seed: u64) -> Self {
        let addresses = [p2pkh(1), p2pkh(2), p2pkh(3), p2sh(4), p2wpkh(5)];
        let mut owners: Vec<Vec<u8>> = addresses
            .iter()
            .map(|a| script_for_address(a).unwrap())
            .collect();
        // Non-standard: never address-indexed, still spent-indexed.
        owners.push(vec![0x6a, 0x02, 0xBE, 0xEF]);
        Self {
            rng: StdRng::seed_from_u64(seed),
            owners,
            unspent: Vec::new(),
            next_txid: 0,
        }
    }

    fn txid(&mut self) -> [u8; 32] {
        self.next_txid += 1;
        tagged_hash(0x5A, self.next_txid)
    }

    fn output(&mut self, value: Amount) -> TxOutput {
        let owner = self.owners[self.rng.gen_range(0..self.owners.len())].clone();
        TxOutput::new(value, owner)
    }

    fn block_transactions(&mut self, height: u32) -> Vec<IndexedTransaction> {
        let mut txs = Vec::new();
        let mut created: Vec<(OutPoint, PrevOutput)> = Vec::new();

        let cb_txid = self.txid();
        let cb_outputs: Vec<TxOutput> = (0..self.rng.gen_range(1..=2))
            .map(|_| {
                let value = self.rng.gen_range(1..=50);
                self.output(value)
            })
            .collect();
        txs.push(IndexedTransaction {
            txid: cb_txid,
            inputs: vec![TxInput::coinbase()],
            outputs: cb_outputs.clone(),
        });
        record(&mut created, cb_txid, &cb_outputs, height);

        for _ in 0..self.rng.gen_range(0..=3) {
            let mut inputs = Vec::new();
            let mut total = 0;
            for _ in 0..self.rng.gen_range(1..=2) {
                // Prefer an in-block output now and then; the engine leaves
                // those unresolved.
                let in_block = !created.is_empty() && self.rng.gen_bool(0.3);
                let (prevout, prev, supplied) = if in_block {
                    let i = self.rng.gen_range(0..created.len());
                    let (op, prev) = created.swap_remove(i);
                    (op, prev, false)
                } else if !self.unspent.is_empty() {
                    let i = self.rng.gen_range(0..self.unspent.len());
                    let (op, prev) = self.unspent.swap_remove(i);
                    (op, prev, true)
                } else {
                    continue;
                };
                total += prev.value;
                inputs.push(TxInput::new(prevout, supplied.then_some(prev)));
            }
            if inputs.is_empty() {
                continue;
            }

            let txid = self.txid();
            let pieces = self.rng.gen_range(1..=3).min(total as usize);
            let mut outputs = Vec::new();
            let mut left = total;
            for i in 0..pieces {
                let value = if i + 1 == pieces {
                    left
                } else {
                    self.rng.gen_range(1..=left - (pieces - i - 1) as Amount)
                };
                left -= value;
                outputs.push(self.output(value));
            }
            record(&mut created, txid, &outputs, height);
            txs.push(IndexedTransaction {
                txid,
                inputs,
                outputs,
            });
        }

        self.unspent.extend(created);
        txs
    }
}

fn record(created: &mut Vec<(OutPoint, PrevOutput)>, txid: [u8; 32], outputs: &[TxOutput], height: u32) {
    for (index, output) in outputs.iter().enumerate() {
        created.push((
            OutPoint::new(txid, index as u32),
            PrevOutput {
                value: output.value,
                script_pubkey: output.script_pubkey.clone(),
                height,
            },
        ));
    }
}

// =============================================================================
// CONSISTENCY CHECKS
// =============================================================================

fn family(h: &Harness, tag: u8) -> BTreeMap<Vec<u8>, Vec<u8>> {
    h.store.prefix_scan(&[tag]).unwrap().into_iter().collect()
}

/// Sum of an address's deltas equals the value of its unspent outputs, and
/// its unspent set is exactly its received outputs not yet spent.
fn assert_families_agree(h: &Harness, addresses: &[IndexedAddress]) {
    let index = AddressIndexStore::new(h.store.as_ref());
    let unspent = AddressUnspentStore::new(h.store.as_ref());
    let spent_outpoints: BTreeSet<OutPoint> = family(h, b'p')
        .keys()
        .map(|k| SpentIndexKey::decode(k).unwrap().outpoint)
        .collect();
    for address in addresses {
        let deltas = index.scan(address, None).unwrap();
        let balance: Amount = deltas.iter().map(|(_, a)| a).sum();
        let received: Amount = deltas.iter().map(|(_, a)| *a).filter(|a| *a > 0).sum();
        let spent: Amount = deltas.iter().map(|(_, a)| *a).filter(|a| *a < 0).sum();
        let utxo_total: Amount = unspent
            .scan(address)
            .unwrap()
            .iter()
            .map(|(_, v)| v.amount)
            .sum();
        assert_eq!(balance, utxo_total, "address {:?}", address.address_type);
        assert_eq!(balance, received + spent);

        let unspent_set: BTreeSet<OutPoint> = unspent
            .scan(address)
            .unwrap()
            .iter()
            .map(|(k, _)| k.outpoint())
            .collect();
        let unspent_received: BTreeSet<OutPoint> = deltas
            .iter()
            .filter(|(k, _)| !k.spending)
            .map(|(k, _)| OutPoint::new(k.txid, k.index))
            .filter(|outpoint| !spent_outpoints.contains(outpoint))
            .collect();
        assert_eq!(unspent_set, unspent_received, "address {:?}", address.address_type);

        let positives = deltas.iter().filter(|(k, _)| !k.spending).count();
        let negatives = deltas.iter().filter(|(k, _)| k.spending).count();
        assert!(negatives <= positives);
    }

    // Each consumed output has one spender.
    let spenders: Vec<SpentIndexValue> = family(h, b'p')
        .values()
        .map(|v| SpentIndexValue::decode(v).unwrap())
        .collect();
    let unique: HashSet<_> = spenders.iter().map(|s| (s.txid, s.input_index)).collect();
    assert_eq!(unique.len(), spenders.len());
}

// =============================================================================
// ROUND TRIPS
// =============================================================================

fn tracked() -> Vec<IndexedAddress> {
    vec![p2pkh(1), p2pkh(2), p2pkh(3), p2sh(4), p2wpkh(5)]
}

#[test]
fn random_chain_connect_then_disconnect_restores_every_family() {
    for seed in [7u64, 42, 2024] {
        let mut h = Harness::all_enabled();
        let mut generator = Generator::new(seed);
        let empty = h.store.snapshot();

        for height in 0..40 {
            let txs = generator.block_transactions(height);
            h.connect(txs, 1_000 + generator.rng.gen_range(0..1_200)).unwrap();
        }
        assert_families_agree(&h, &tracked());
        assert!(!family(&h, b'a').is_empty());
        assert_eq!(family(&h, b's').len(), 40);

        while !h.blocks.is_empty() {
            h.disconnect_tip().unwrap();
        }
        assert_eq!(h.store.snapshot(), empty, "seed {seed}");
    }
}

#[test]
fn partial_reorg_restores_fork_point_state() {
    let mut h = Harness::all_enabled();
    let mut generator = Generator::new(99);

    for height in 0..20 {
        let txs = generator.block_transactions(height);
        h.connect(txs, 5_000 + height * 10).unwrap();
    }
    let fork_point = h.store.snapshot();
    let families: Vec<_> = [b'a', b'u', b'p', b's', b'z']
        .iter()
        .map(|t| family(&h, *t))
        .collect();

    for height in 20..30 {
        let txs = generator.block_transactions(height);
        h.connect(txs, 5_000 + height * 10).unwrap();
    }
    assert_families_agree(&h, &tracked());

    while h.blocks.len() > 20 {
        h.disconnect_tip().unwrap();
    }
    assert_eq!(h.store.snapshot(), fork_point);
    for (tag, before) in [b'a', b'u', b'p', b's', b'z'].iter().zip(families) {
        assert_eq!(family(&h, *tag), before);
    }

    // A competing branch connects cleanly on the fork point.
    h.fork = 1;
    let miner = h.miner;
    for _ in 0..5 {
        let height = h.next_height();
        h.connect(
            vec![coinbase(tagged_hash(0xF0, height), vec![pay(1, &miner)])],
            9_000 + height,
        )
        .unwrap();
    }
    assert_families_agree(&h, &tracked());
    assert_eq!(
        h.maintainer.indexed_tip().unwrap().map(|t| t.height),
        Some(24)
    );
}
