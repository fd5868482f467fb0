//! # Cryptographic Primitives
//!
//! Every signature and every address in the node flows through here.
//!
//! - **Ed25519** for signing — validator identity, transaction input
//!   signatures, block proposer signatures.
//! - **SHA3-512** for hashing — see [`crate::hash`] for the canonical
//!   hash functions built on top of these keys.

pub mod keys;
pub mod signatures;

pub use keys::{Address, KeyError, Keypair, PublicKey, Signature};
pub use signatures::{batch_verify, sign, sign_to_bytes, verify, verify_raw, SignatureError};
