//! In-memory active chain for tests and embedding.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::{BlockHeight, BlockRef, Hash};
use crate::ports::outbound::{ActiveChain, ChainView};

#[derive(Default)]
struct ChainState {
    by_height: Vec<Hash>,
    heights: HashMap<Hash, BlockHeight>,
}

impl ActiveChain for ChainState {
    fn tip(&self) -> Option<BlockRef> {
        self.by_height.last().map(|hash| BlockRef {
            hash: *hash,
            height: (self.by_height.len() - 1) as BlockHeight,
        })
    }

    fn hash_at(&self, height: BlockHeight) -> Option<Hash> {
        self.by_height.get(height as usize).copied()
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.heights.contains_key(hash)
    }
}

/// Active chain as a height-ordered hash list behind one RwLock.
#[derive(Default)]
pub struct InMemoryChain {
    state: RwLock<ChainState>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the chain by one block. Returns the new tip.
    pub fn push(&self, hash: Hash) -> BlockRef {
        let mut state = self.state.write();
        let height = state.by_height.len() as BlockHeight;
        state.by_height.push(hash);
        state.heights.insert(hash, height);
        BlockRef { hash, height }
    }

    /// Remove the tip. Returns it.
    pub fn pop(&self) -> Option<BlockRef> {
        let mut state = self.state.write();
        let hash = state.by_height.pop()?;
        let height = state.heights.remove(&hash)?;
        Some(BlockRef { hash, height })
    }

    pub fn tip(&self) -> Option<BlockRef> {
        self.state.read().tip()
    }
}

impl ChainView for InMemoryChain {
    fn with_active_chain<R>(&self, f: impl FnOnce(&dyn ActiveChain) -> R) -> R {
        let state = self.state.read();
        f(&*state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let chain = InMemoryChain::new();
        assert_eq!(chain.tip(), None);
        chain.push([1; 32]);
        let tip = chain.push([2; 32]);
        assert_eq!(tip.height, 1);

        chain.with_active_chain(|c| {
            assert_eq!(c.hash_at(0), Some([1; 32]));
            assert!(c.contains(&[2; 32]));
            assert_eq!(c.height(), Some(1));
        });

        assert_eq!(chain.pop(), Some(tip));
        chain.with_active_chain(|c| assert!(!c.contains(&[2; 32])));
    }
}
