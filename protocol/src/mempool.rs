//! # Mempool
//!
//! A thread-safe, duplicate-free buffer of signature-verified transactions
//! awaiting inclusion in a block. Transactions are keyed by the hex
//! encoding of [`crate::hash::hash_transaction`].
//!
//! Reads (`has`/`len`) vastly outnumber writes in steady state — every RPC
//! handshake and broadcast fan-out touches this structure — so it's guarded
//! by a single reader/writer lock rather than a per-entry lock: `add` and
//! `drain` are writers, `has`/`len` are readers.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::hash::hash_transaction;
use crate::types::Transaction;

/// A thread-safe, duplicate-free transaction pool.
#[derive(Debug, Default)]
pub struct Mempool {
    txs: RwLock<HashMap<String, Transaction>>,
}

impl Mempool {
    /// Creates an empty mempool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tx` if its hash is not already present. Returns `true` if
    /// this call added it, `false` if it was already there.
    pub fn add(&self, tx: Transaction) -> bool {
        let key = hex::encode(hash_transaction(&tx));
        let mut txs = self.txs.write();
        if txs.contains_key(&key) {
            return false;
        }
        txs.insert(key, tx);
        true
    }

    /// Returns `true` if a transaction with this hash is present.
    pub fn has(&self, tx: &Transaction) -> bool {
        let key = hex::encode(hash_transaction(tx));
        self.txs.read().contains_key(&key)
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.txs.read().len()
    }

    /// `true` if the mempool holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.txs.read().is_empty()
    }

    /// Atomically snapshots and empties the mempool, returning every
    /// transaction it held. Iteration order is unspecified but each call
    /// sees every entry exactly once.
    pub fn drain(&self) -> Vec<Transaction> {
        let mut txs = self.txs.write();
        std::mem::take(&mut *txs).into_values().collect()
    }
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
    fn add_returns_true_once_then_false() {
        let mp = Mempool::new();
        assert!(mp.add(tx(1)));
        assert!(!mp.add(tx(1)));
        assert_eq!(mp.len(), 1);
    }

    #[test]
    fn duplicate_set_yields_distinct_count() {
        let mp = Mempool::new();
        let set = vec![tx(1), tx(2), tx(1), tx(3), tx(2), tx(2)];
        for t in set {
            mp.add(t);
        }
        assert_eq!(mp.len(), 3);
    }

    #[test]
    fn has_reflects_membership() {
        let mp = Mempool::new();
        assert!(!mp.has(&tx(1)));
        mp.add(tx(1));
        assert!(mp.has(&tx(1)));
    }

    #[test]
    fn drain_empties_and_returns_all_once() {
        let mp = Mempool::new();
        mp.add(tx(1));
        mp.add(tx(2));
        mp.add(tx(3));

        let drained = mp.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(mp.len(), 0);

        let second = mp.drain();
        assert!(second.is_empty());
    }

    #[test]
    fn empty_mempool_is_empty() {
        let mp = Mempool::new();
        assert!(mp.is_empty());
        mp.add(tx(1));
        assert!(!mp.is_empty());
    }
}
