//! Shared harness for the address indexing integration tests.
//!
//! Drives an `IndexMaintainer` and an `AddressIndexQuery` over in-memory
//! adapters, keeping the in-memory chain view in step with the index.

#![allow(dead_code)]

use std::sync::Arc;

use qc_03_address_indexing::adapters::{Base58CheckCodec, InMemoryChain, InMemoryMempoolIndex};
use qc_03_address_indexing::domain::script_for_address;
use qc_03_address_indexing::{
    AddressCodec, AddressIndexQuery, AddressType, Amount, BlockHeight, Hash, IndexConfig,
    IndexError, IndexMaintainer, IndexMaintenanceApi, IndexedAddress, IndexedBlock,
    IndexedTransaction, InMemoryKVStore, OutPoint, PrevOutput, TxInput, TxOutput,
};
use tracing_subscriber::EnvFilter;

pub type Query =
    AddressIndexQuery<InMemoryKVStore, InMemoryChain, InMemoryMempoolIndex, Base58CheckCodec>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// FIXTURES
// =============================================================================

/// A hash with a one-byte tag and a big-endian counter.
pub fn tagged_hash(tag: u8, n: u32) -> Hash {
    let mut hash = [tag; 32];
    hash[..4].copy_from_slice(&n.to_be_bytes());
    hash
}

pub fn p2pkh(byte: u8) -> IndexedAddress {
    IndexedAddress::from_slice(AddressType::PubkeyHash, &[byte; 20]).unwrap()
}

pub fn p2sh(byte: u8) -> IndexedAddress {
    IndexedAddress::from_slice(AddressType::ScriptHash, &[byte; 20]).unwrap()
}

pub fn p2wpkh(byte: u8) -> IndexedAddress {
    IndexedAddress::from_slice(AddressType::WitnessV0KeyHash, &[byte; 20]).unwrap()
}

pub fn encode(address: &IndexedAddress) -> String {
    Base58CheckCodec::default().encode(address).unwrap()
}

pub fn pay(value: Amount, to: &IndexedAddress) -> TxOutput {
    TxOutput::new(value, script_for_address(to).unwrap())
}

pub fn coinbase(txid: Hash, outputs: Vec<TxOutput>) -> IndexedTransaction {
    IndexedTransaction {
        txid,
        inputs: vec![TxInput::coinbase()],
        outputs,
    }
}

/// Input spending `prevout`, resolved as the engine would.
pub fn resolved(prevout: OutPoint, value: Amount, owner: &IndexedAddress, height: BlockHeight) -> TxInput {
    TxInput::new(
        prevout,
        Some(PrevOutput {
            value,
            script_pubkey: script_for_address(owner).unwrap(),
            height,
        }),
    )
}

pub fn spend(txid: Hash, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> IndexedTransaction {
    IndexedTransaction {
        txid,
        inputs,
        outputs,
    }
}

// =============================================================================
// HARNESS
// =============================================================================

pub struct Harness {
    pub store: Arc<InMemoryKVStore>,
    pub chain: Arc<InMemoryChain>,
    pub mempool: Arc<InMemoryMempoolIndex>,
    pub maintainer: IndexMaintainer<InMemoryKVStore>,
    pub query: Query,
    /// Blocks connected to the index, genesis first.
    pub blocks: Vec<IndexedBlock>,
    /// Varies block hashes between forks.
    pub fork: u8,
    /// Pays the filler coinbases.
    pub miner: IndexedAddress,
}

impl Harness {
    pub fn new(config: IndexConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryKVStore::new());
        let chain = Arc::new(InMemoryChain::new());
        let mempool = Arc::new(InMemoryMempoolIndex::new());
        let maintainer = IndexMaintainer::new(Arc::clone(&store), config.clone());
        let query = AddressIndexQuery::new(
            Arc::clone(&store),
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::new(Base58CheckCodec::default()),
            config,
        );
        Self {
            store,
            chain,
            mempool,
            maintainer,
            query,
            blocks: Vec::new(),
            fork: 0,
            miner: p2pkh(0xEE),
        }
    }

    pub fn all_enabled() -> Self {
        Self::new(IndexConfig::all_enabled())
    }

    pub fn next_height(&self) -> BlockHeight {
        self.blocks.len() as BlockHeight
    }

    pub fn tip_hash(&self) -> Hash {
        self.blocks.last().map(|b| b.hash).unwrap_or([0; 32])
    }

    /// Build the next block on the current tip without connecting it.
    pub fn build_block(&self, transactions: Vec<IndexedTransaction>, time: u32) -> IndexedBlock {
        let height = self.next_height();
        IndexedBlock {
            hash: tagged_hash(0xB0 ^ self.fork, height),
            parent_hash: self.tip_hash(),
            height,
            time,
            transactions,
        }
    }

    /// Connect to the index and extend the chain view.
    pub fn connect_block(&mut self, block: IndexedBlock) -> Result<(), IndexError> {
        self.maintainer.connect_block(&block)?;
        self.chain.push(block.hash);
        self.blocks.push(block);
        Ok(())
    }

    pub fn connect(
        &mut self,
        transactions: Vec<IndexedTransaction>,
        time: u32,
    ) -> Result<IndexedBlock, IndexError> {
        let block = self.build_block(transactions, time);
        self.connect_block(block.clone())?;
        Ok(block)
    }

    /// Connect a block holding only a coinbase to the miner.
    pub fn mine(&mut self) -> IndexedBlock {
        let height = self.next_height();
        let cb = coinbase(tagged_hash(0xC0 ^ self.fork, height), vec![pay(1, &self.miner)]);
        self.connect(vec![cb], 1_000_000 + height * 600).unwrap()
    }

    pub fn mine_to(&mut self, height: BlockHeight) {
        while self.next_height() <= height {
            self.mine();
        }
    }

    pub fn disconnect_tip(&mut self) -> Result<IndexedBlock, IndexError> {
        let block = self.blocks.last().cloned().expect("no block to disconnect");
        self.maintainer.disconnect_block(&block)?;
        self.chain.pop();
        self.blocks.pop();
        Ok(block)
    }
}
