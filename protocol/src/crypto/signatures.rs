//! # Digital Signatures
//!
//! Ed25519 signing and verification — the backbone of authentication for
//! transactions, block headers, and peer handshakes.
//!
//! ## Why not just use ed25519-dalek directly?
//!
//! Wrapping the operations gives us a single place to audit all signing
//! operations, a consistent error type, and type safety — callers can't
//! accidentally pass a hash where a message goes.
//!
//! ## Strictness
//!
//! We use `ed25519-dalek`'s strict verification by default, rejecting the
//! edge-case signatures a lenient implementation would accept.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

use super::keys::{Keypair, PublicKey, Signature, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors during signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Signs a message using a validator's keypair.
///
/// # Example
///
/// ```
/// use meridian_protocol::crypto::{Keypair, sign, verify};
///
/// let keypair = Keypair::generate();
/// let message = b"pre-prepare view 0";
/// let signature = sign(&keypair, message);
///
/// assert!(verify(&keypair.public_key(), message, &signature));
/// ```
pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verifies an Ed25519 signature against a public key and message.
///
/// Returns `true` if valid, `false` otherwise. We intentionally don't
/// distinguish "invalid signature" from "wrong public key" in the return
/// value — both are just "no."
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Verifies a signature using raw byte components, as they arrive off the
/// wire before being parsed into typed structs.
pub fn verify_raw(
    public_key_bytes: &[u8; PUBLIC_KEY_LENGTH],
    message: &[u8],
    signature_bytes: &[u8; SIGNATURE_LENGTH],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
    let signature = DalekSignature::from_bytes(signature_bytes);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Signs a message and returns the signature as raw bytes, for building
/// wire-format messages directly.
pub fn sign_to_bytes(keypair: &Keypair, message: &[u8]) -> Vec<u8> {
    sign(keypair, message).as_bytes().to_vec()
}

/// Batch-verifies multiple signatures. All must be valid for this to return
/// `Ok`; on the first failure the whole batch fails without identifying
/// which signature was bad (verify individually if you need that).
pub fn batch_verify(items: &[(PublicKey, Vec<u8>, Signature)]) -> Result<(), SignatureError> {
    for (pubkey, message, signature) in items {
        if !verify(pubkey, message, signature) {
            return Err(SignatureError::VerificationFailed);
        }
    }
    Ok(())
}
