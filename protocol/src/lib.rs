// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian Protocol — Core Library
//!
//! The core of Meridian: a permissioned PBFT-PoA blockchain node for a
//! static, known validator set. There's no mining, no token economics,
//! no public validator-set churn — just a small number of mutually
//! trusted parties producing blocks on a cadence and agreeing on them by
//! classical three-phase Byzantine agreement.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 keys, signing, and the addresses derived from
//!   them. Every other module that needs identity goes through here.
//! - **codec** — the canonical, length-delimited binary encoding that
//!   everything hashed or persisted is serialized through.
//! - **hash** — SHA3-512 over the canonical encoding, plus the
//!   transaction signing contract (sign-the-clean-hash, verify the same
//!   way).
//! - **merkle** — the Merkle tree over a block's transactions.
//! - **types** — the five core records: `TxInput`, `TxOutput`,
//!   `Transaction`, `Header`, `Block`.
//! - **mempool** — the thread-safe pool of client-submitted, not-yet-staged
//!   transactions.
//! - **txstore** — the staging store a validator re-materialises
//!   transactions into while building a block.
//! - **storage** — the persistent, `sled`-backed block store.
//! - **chain** — owns the in-memory header list and is the only place
//!   block validity is decided and blocks are persisted.
//! - **config** — `config.yaml` loading and validation.
//! - **rpc** — the JSON wire schema for the four-method RPC surface.
//! - **peer** — the peer registry, handshake, and gossip broadcast.
//! - **producer** — the validator loop that builds, signs, and proposes
//!   blocks.
//! - **consensus** — the PBFT-PoA agreement engine.

pub mod chain;
pub mod codec;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod hash;
pub mod mempool;
pub mod merkle;
pub mod peer;
pub mod producer;
pub mod rpc;
pub mod storage;
pub mod txstore;
pub mod types;
