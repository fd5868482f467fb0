//! # Merkle Tree
//!
//! A standard binary Merkle tree over transaction hashes, with duplicate
//! promotion of the last leaf when a level has an odd number of nodes
//! (the classic Bitcoin-style fixup — simpler than padding with zero
//! leaves and just as sound for our purposes since we never prove
//! inclusion against a third party, only recompute the whole tree).

use crate::hash::{hash_transaction, Hash};
use crate::types::Transaction;
use sha3::{Digest, Sha3_512};

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha3_512::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// A Merkle tree built over a fixed set of leaves, levels retained so the
/// root and intermediate nodes can be recomputed and checked.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` is the leaves; `levels.last()` is `[root]`.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Builds a tree from an ordered list of leaf hashes.
    ///
    /// An empty leaf set produces a tree whose root is the all-zero hash.
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![[0u8; 64]]],
            };
        }

        let mut levels = vec![leaves];
        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = if i + 1 < current.len() {
                    &current[i + 1]
                } else {
                    left
                };
                next.push(hash_pair(left, right));
                i += 2;
            }
            levels.push(next);
        }

        Self { levels }
    }

    /// Builds a tree over a transaction list's per-transaction hashes, in
    /// declared order.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let leaves = transactions.iter().map(hash_transaction).collect();
        Self::from_leaves(leaves)
    }

    /// The 64-byte Merkle root.
    pub fn root(&self) -> Hash {
        self.levels.last().unwrap()[0]
    }

    /// Recomputes every internal node from the stored leaves and confirms
    /// the result matches the stored root. Always true for a tree built by
    /// [`Self::from_leaves`] — exposed for tests and for validating a tree
    /// reconstructed from untrusted input.
    pub fn verify(&self) -> bool {
        let recomputed = Self::from_leaves(self.levels[0].clone());
        recomputed.root() == self.root()
    }
}

/// Convenience wrapper: the Merkle root over a transaction list's hashes.
pub fn merkle_root(transactions: &[Transaction]) -> Hash {
    MerkleTree::from_transactions(transactions).root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxInput, TxOutput};

    fn tx(n: u8) -> Transaction {
        Transaction {
            version: 1,
            timestamp: n as i64,
            inputs: vec![TxInput::default()],
            outputs: vec![TxOutput {
                amount: n as i64,
                address: [n; 20],
                payload: vec![],
            }],
        }
    }

    #[test]
    fn empty_root_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; 64]);
    }

    #[test]
    fn single_leaf_root_equals_leaf_hash() {
        let txs = vec![tx(1)];
        let root = merkle_root(&txs);
        assert_eq!(root, hash_transaction(&txs[0]));
    }

    #[test]
    fn odd_count_promotes_last_leaf() {
        let txs = vec![tx(1), tx(2), tx(3)];
        let tree = MerkleTree::from_transactions(&txs);
        // 3 leaves -> level 1 has 2 nodes: hash(0,1), hash(2,2).
        assert_eq!(tree.levels[1].len(), 2);
        assert!(tree.verify());
    }

    #[test]
    fn deterministic_for_same_order() {
        let txs = vec![tx(1), tx(2), tx(3), tx(4)];
        assert_eq!(merkle_root(&txs), merkle_root(&txs));
    }

    #[test]
    fn order_sensitive() {
        let a = vec![tx(1), tx(2)];
        let b = vec![tx(2), tx(1)];
        assert_ne!(merkle_root(&a), merkle_root(&b));
    }

    #[test]
    fn tampered_root_fails_verification_against_recomputed() {
        let txs = vec![tx(1), tx(2), tx(3), tx(4)];
        let tree = MerkleTree::from_transactions(&txs);
        let mut tampered = tree.clone();
        tampered.levels.last_mut().unwrap()[0][0] ^= 0xFF;
        assert!(!tampered.verify());
    }

    #[test]
    fn eight_leaves_builds_balanced_tree() {
        let txs: Vec<_> = (1..=8u8).map(tx).collect();
        let tree = MerkleTree::from_transactions(&txs);
        assert_eq!(tree.levels[0].len(), 8);
        assert_eq!(tree.levels[1].len(), 4);
        assert_eq!(tree.levels[2].len(), 2);
        assert_eq!(tree.levels[3].len(), 1);
    }
}
