//! # Core Data Model
//!
//! The five records that flow through every component of the node:
//! `TxInput`, `TxOutput`, `Transaction`, `Header`, and `Block`. Their field
//! layout is the schema the canonical codec ([`crate::codec`]) serializes
//! and the canonical hasher ([`crate::hash`]) hashes — it is not incidental
//! that every field here has a fixed, documented width.
//!
//! These types carry no serde impls of their own. Anything that needs to
//! cross the wire or hit disk goes through [`crate::codec`] first and is
//! hex-encoded at the transport boundary — see `meridian-node`'s RPC
//! envelopes. That keeps "the bytes that get hashed" and "the bytes that
//! get transmitted" provably identical.

/// One spend reference inside a [`Transaction`].
///
/// `prev_tx_hash` may be empty (genesis-like inputs carry no real
/// predecessor). `public_key`/`signature` are populated by the signing
/// contract in [`crate::hash::sign_transaction`] and cleared again by
/// [`crate::hash::hash_transaction_clean`] before hashing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxInput {
    pub prev_tx_hash: Vec<u8>,
    pub prev_out_index: u32,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

/// One payment destination inside a [`Transaction`].
///
/// `payload` is opaque application-level metadata (e.g. a JSON blob); the
/// node never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxOutput {
    pub amount: i64,
    pub address: [u8; 20],
    pub payload: Vec<u8>,
}

/// A transaction: an ordered list of inputs and outputs plus a timestamp.
///
/// UTXO spend enforcement is out of scope for this node (see spec
/// Non-goals) — `inputs`/`outputs` are carried and hashed but never
/// checked against a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub version: u32,
    pub timestamp: i64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// A block header.
///
/// `prev_hash` and `root_hash` are both 64 bytes (SHA3-512 digests, see
/// [`crate::hash`]) — not 32, despite what some payment-chain tooling
/// elsewhere in this codebase assumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub height: i32,
    pub prev_hash: [u8; 64],
    pub root_hash: [u8; 64],
    pub timestamp: i64,
}

/// A block: a signed header plus the ordered transactions it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
    pub transactions: Vec<Transaction>,
}
