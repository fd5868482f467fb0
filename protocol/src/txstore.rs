//! # Transaction Staging Store
//!
//! A scratch space for transactions between the moment they leave the
//! [`crate::mempool::Mempool`] (drained for a block in progress) and the
//! moment the block they end up in is persisted. It exists purely so a
//! block producer can look a transaction back up by hash mid-assembly —
//! it is not a transaction history or an index over committed blocks.
//!
//! Entries are keyed by the hex encoding of
//! [`crate::hash::hash_transaction`], same convention as the mempool.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::hash::hash_transaction;
use crate::types::Transaction;

/// A thread-safe staging area for in-flight transactions.
#[derive(Debug, Default)]
pub struct TxStore {
    txs: RwLock<HashMap<String, Transaction>>,
}

impl TxStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `tx`, overwriting any prior entry with the same hash.
    pub fn put(&self, tx: Transaction) {
        let key = hex::encode(hash_transaction(&tx));
        self.txs.write().insert(key, tx);
    }

    /// Looks up a staged transaction by its hex-encoded hash.
    pub fn get(&self, key: &str) -> Option<Transaction> {
        self.txs.read().get(key).cloned()
    }

    /// Every staged transaction, in unspecified order.
    pub fn get_all(&self) -> Vec<Transaction> {
        self.txs.read().values().cloned().collect()
    }

    /// Number of staged transactions.
    pub fn size(&self) -> usize {
        self.txs.read().len()
    }

    /// Drops every staged transaction. Called once the block that staged
    /// them has been durably persisted.
    pub fn clear(&self) {
        self.txs.write().clear();
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
    fn put_then_get_round_trips() {
        let store = TxStore::new();
        let t = tx(1);
        let key = hex::encode(hash_transaction(&t));
        store.put(t.clone());
        assert_eq!(store.get(&key), Some(t));
    }

    #[test]
    fn get_missing_key_is_none() {
        let store = TxStore::new();
        assert_eq!(store.get("deadbeef"), None);
    }

    #[test]
    fn put_overwrites_same_hash() {
        let store = TxStore::new();
        let t = tx(1);
        store.put(t.clone());
        store.put(t.clone());
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn get_all_returns_every_entry() {
        let store = TxStore::new();
        store.put(tx(1));
        store.put(tx(2));
        store.put(tx(3));
        assert_eq!(store.get_all().len(), 3);
    }

    #[test]
    fn clear_empties_store() {
        let store = TxStore::new();
        store.put(tx(1));
        store.clear();
        assert_eq!(store.size(), 0);
        assert!(store.get_all().is_empty());
    }
}
