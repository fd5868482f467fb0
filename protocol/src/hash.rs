//! # Canonical Hashing & the Transaction Signing Contract
//!
//! Every hash in this system is a 64-byte SHA3-512 digest taken over the
//! canonical encoding from [`crate::codec`] — never over an ad hoc
//! concatenation of fields, and never truncated to 32 bytes (some tests
//! elsewhere in this codebase's history assumed 32; production is the
//! canonical 64-byte digest and that is what this module produces).
//!
//! ## Signing contract
//!
//! To sign a transaction: compute [`hash_transaction_clean`], sign that
//! digest, store the signature in `inputs[0].signature` and the signer's
//! public key in `inputs[0].public_key` ([`sign_transaction`]).
//!
//! To verify: recompute [`hash_transaction_clean`] (which re-zeroes those
//! same fields regardless of what's currently in them) and check it against
//! `inputs[0].signature`/`inputs[0].public_key`. This is a pure
//! clean-clone-then-hash operation — not the mutate-then-restore dance an
//! earlier, single-threaded implementation of this idea used, which is
//! unsound the moment two callers touch the same transaction concurrently.

use sha3::{Digest, Sha3_512};

use crate::codec::{encode_header, encode_transaction};
use crate::crypto::Keypair;
use crate::types::{Header, Transaction};

/// A SHA3-512 digest.
pub type Hash = [u8; 64];

/// The all-zero hash, used as `prev_hash` for the genesis header.
pub const ZERO_HASH: Hash = [0u8; 64];

fn sha3_512(bytes: &[u8]) -> Hash {
    let mut hasher = Sha3_512::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// Hashes a header via its canonical encoding.
pub fn hash_header(header: &Header) -> Hash {
    sha3_512(&encode_header(header))
}

/// A block's hash is defined as the hash of its header — the transactions
/// are committed to via `header.root_hash`, not hashed again directly.
pub fn hash_block(block: &crate::types::Block) -> Hash {
    hash_header(&block.header)
}

/// Hashes a transaction exactly as given (signature and public key
/// included). Used as the Merkle leaf value.
pub fn hash_transaction(tx: &Transaction) -> Hash {
    sha3_512(&encode_transaction(tx))
}

/// Hashes a transaction with every input's `signature` and `public_key`
/// cleared to zero. This is the digest that gets signed and the digest
/// verification recomputes — it is deliberately a pure function over a
/// cloned value, never a mutate-in-place on the caller's transaction.
pub fn hash_transaction_clean(tx: &Transaction) -> Hash {
    let mut clean = tx.clone();
    for input in &mut clean.inputs {
        input.signature = [0u8; 64];
        input.public_key = [0u8; 32];
    }
    hash_transaction(&clean)
}

/// Signs `tx` in place per the signing contract: computes
/// [`hash_transaction_clean`], signs it with `keypair`, and writes the
/// result into `inputs[0]`.
///
/// Panics if `tx.inputs` is empty — every transaction this node produces
/// (client-submitted or block-proposer re-signed) carries at least one
/// input slot to hold the signature.
pub fn sign_transaction(tx: &mut Transaction, keypair: &Keypair) {
    let digest = hash_transaction_clean(tx);
    let signature = keypair.sign(&digest);
    let input = tx
        .inputs
        .first_mut()
        .expect("transaction must have at least one input to carry a signature");
    input.public_key = keypair.public_key_bytes();
    let sig_bytes = signature.as_bytes();
    input.signature.copy_from_slice(sig_bytes);
}

/// Verifies a transaction's signature per the signing contract:
/// recomputes [`hash_transaction_clean`] and checks it against
/// `inputs[0].public_key`/`inputs[0].signature`.
///
/// Returns `false` (never panics) for a transaction with no inputs — there
/// is nothing to verify against.
pub fn verify_transaction_signature(tx: &Transaction) -> bool {
    let Some(input) = tx.inputs.first() else {
        return false;
    };
    let Ok(public_key) = crate::crypto::PublicKey::try_from_slice(&input.public_key) else {
        return false;
    };
    let Ok(signature) = crate::crypto::Signature::try_from_slice(&input.signature) else {
        return false;
    };
    let digest = hash_transaction_clean(tx);
    public_key.verify(&digest, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Header, TxInput, TxOutput};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            timestamp: 1_700_000_000,
            inputs: vec![TxInput::default()],
            outputs: vec![TxOutput {
                amount: 100,
                address: [1u8; 20],
                payload: b"hello".to_vec(),
            }],
        }
    }

    #[test]
    fn hash_is_64_bytes() {
        let h = sha3_512(b"anything");
        assert_eq!(h.len(), 64);
    }

    #[test]
    fn hash_header_is_deterministic() {
        let header = Header {
            version: 1,
            height: 0,
            prev_hash: ZERO_HASH,
            root_hash: ZERO_HASH,
            timestamp: 0,
        };
        assert_eq!(hash_header(&header), hash_header(&header));
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = Keypair::generate();
        let mut tx = sample_tx();
        sign_transaction(&mut tx, &keypair);
        assert!(verify_transaction_signature(&tx));
    }

    #[test]
    fn tampering_with_output_invalidates_signature() {
        let keypair = Keypair::generate();
        let mut tx = sample_tx();
        sign_transaction(&mut tx, &keypair);
        tx.outputs[0].amount += 1;
        assert!(!verify_transaction_signature(&tx));
    }

    #[test]
    fn clean_hash_does_not_depend_on_current_signature_bytes() {
        let keypair = Keypair::generate();
        let mut tx = sample_tx();
        sign_transaction(&mut tx, &keypair);
        let clean_signed = hash_transaction_clean(&tx);

        let mut tampered_sig = tx.clone();
        tampered_sig.inputs[0].signature = [0xFF; 64];
        tampered_sig.inputs[0].public_key = [0xFF; 32];
        assert_eq!(hash_transaction_clean(&tampered_sig), clean_signed);
    }

    #[test]
    fn verify_rejects_empty_inputs() {
        let tx = Transaction {
            version: 1,
            timestamp: 0,
            inputs: vec![],
            outputs: vec![],
        };
        assert!(!verify_transaction_signature(&tx));
    }

    #[test]
    fn hash_transaction_changes_with_signature() {
        let keypair = Keypair::generate();
        let mut tx = sample_tx();
        let before = hash_transaction(&tx);
        sign_transaction(&mut tx, &keypair);
        let after = hash_transaction(&tx);
        assert_ne!(before, after);
    }
}
