//! # Wire Schema
//!
//! The four-method RPC surface (`Handshake`, `HandleTransaction`,
//! `HandleBlock`, `GetBlock`) is served as JSON over HTTP rather than a
//! generated gRPC stub — there's no protobuf toolchain in this workspace
//! and adding one just for this would be a dependency nobody else uses.
//! What crosses the wire is still exactly the canonical, hash-stable bytes
//! [`crate::codec`] produces: every field that participates in a hash is
//! hex-encoded from the canonical encoding, never re-serialized ad hoc.
//!
//! This module owns the JSON-facing request/response shapes
//! (`WireTransaction`, `WireBlock`, …) and their fallible conversions to
//! and from [`crate::types`]. [`crate::peer`] uses them to build request
//! bodies; `meridian-node`'s HTTP handlers use them to decode request
//! bodies and encode responses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Block, Header, Transaction, TxInput, TxOutput};

/// Errors converting between the wire (hex/JSON) representation and the
/// in-memory, fixed-width types.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("field `{0}` is not valid hex")]
    InvalidHex(&'static str),

    #[error("field `{field}` has the wrong length: expected {expected} bytes, got {actual}")]
    WrongLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn decode_hex_fixed<const N: usize>(field: &'static str, s: &str) -> Result<[u8; N], RpcError> {
    let bytes = hex::decode(s).map_err(|_| RpcError::InvalidHex(field))?;
    if bytes.len() != N {
        return Err(RpcError::WrongLength {
            field,
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn decode_hex_vec(field: &'static str, s: &str) -> Result<Vec<u8>, RpcError> {
    hex::decode(s).map_err(|_| RpcError::InvalidHex(field))
}

// ---------------------------------------------------------------------------
// Transaction / Block wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTxInput {
    pub prev_tx_hash: String,
    pub prev_out_index: u32,
    pub public_key: String,
    pub signature: String,
}

impl From<&TxInput> for WireTxInput {
    fn from(input: &TxInput) -> Self {
        Self {
            prev_tx_hash: hex::encode(&input.prev_tx_hash),
            prev_out_index: input.prev_out_index,
            public_key: hex::encode(input.public_key),
            signature: hex::encode(input.signature),
        }
    }
}

impl TryFrom<&WireTxInput> for TxInput {
    type Error = RpcError;

    fn try_from(w: &WireTxInput) -> Result<Self, Self::Error> {
        Ok(TxInput {
            prev_tx_hash: decode_hex_vec("inputs[].prev_tx_hash", &w.prev_tx_hash)?,
            prev_out_index: w.prev_out_index,
            public_key: decode_hex_fixed("inputs[].public_key", &w.public_key)?,
            signature: decode_hex_fixed("inputs[].signature", &w.signature)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTxOutput {
    pub amount: i64,
    pub address: String,
    pub payload: String,
}

impl From<&TxOutput> for WireTxOutput {
    fn from(output: &TxOutput) -> Self {
        Self {
            amount: output.amount,
            address: hex::encode(output.address),
            payload: hex::encode(&output.payload),
        }
    }
}

impl TryFrom<&WireTxOutput> for TxOutput {
    type Error = RpcError;

    fn try_from(w: &WireTxOutput) -> Result<Self, Self::Error> {
        Ok(TxOutput {
            amount: w.amount,
            address: decode_hex_fixed("outputs[].address", &w.address)?,
            payload: decode_hex_vec("outputs[].payload", &w.payload)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTransaction {
    pub version: u32,
    pub timestamp: i64,
    pub inputs: Vec<WireTxInput>,
    pub outputs: Vec<WireTxOutput>,
}

impl From<&Transaction> for WireTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            version: tx.version,
            timestamp: tx.timestamp,
            inputs: tx.inputs.iter().map(WireTxInput::from).collect(),
            outputs: tx.outputs.iter().map(WireTxOutput::from).collect(),
        }
    }
}

impl TryFrom<&WireTransaction> for Transaction {
    type Error = RpcError;

    fn try_from(w: &WireTransaction) -> Result<Self, Self::Error> {
        Ok(Transaction {
            version: w.version,
            timestamp: w.timestamp,
            inputs: w
                .inputs
                .iter()
                .map(TxInput::try_from)
                .collect::<Result<_, _>>()?,
            outputs: w
                .outputs
                .iter()
                .map(TxOutput::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHeader {
    pub version: u32,
    pub height: i32,
    pub prev_hash: String,
    pub root_hash: String,
    pub timestamp: i64,
}

impl From<&Header> for WireHeader {
    fn from(h: &Header) -> Self {
        Self {
            version: h.version,
            height: h.height,
            prev_hash: hex::encode(h.prev_hash),
            root_hash: hex::encode(h.root_hash),
            timestamp: h.timestamp,
        }
    }
}

impl TryFrom<&WireHeader> for Header {
    type Error = RpcError;

    fn try_from(w: &WireHeader) -> Result<Self, Self::Error> {
        Ok(Header {
            version: w.version,
            height: w.height,
            prev_hash: decode_hex_fixed("header.prev_hash", &w.prev_hash)?,
            root_hash: decode_hex_fixed("header.root_hash", &w.root_hash)?,
            timestamp: w.timestamp,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBlock {
    pub header: WireHeader,
    pub public_key: String,
    pub signature: String,
    pub transactions: Vec<WireTransaction>,
}

impl From<&Block> for WireBlock {
    fn from(b: &Block) -> Self {
        Self {
            header: WireHeader::from(&b.header),
            public_key: hex::encode(b.public_key),
            signature: hex::encode(b.signature),
            transactions: b.transactions.iter().map(WireTransaction::from).collect(),
        }
    }
}

impl TryFrom<&WireBlock> for Block {
    type Error = RpcError;

    fn try_from(w: &WireBlock) -> Result<Self, Self::Error> {
        Ok(Block {
            header: Header::try_from(&w.header)?,
            public_key: decode_hex_fixed("public_key", &w.public_key)?,
            signature: decode_hex_fixed("signature", &w.signature)?,
            transactions: w
                .transactions
                .iter()
                .map(Transaction::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

// ---------------------------------------------------------------------------
// RPC envelopes
// ---------------------------------------------------------------------------

/// Exchanged during `Handshake`: each side's view of itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
    pub height: i32,
    pub listen_addr: String,
    pub peer_list: Vec<String>,
}

/// Empty acknowledgement returned by `HandleTransaction`/`HandleBlock`.
/// Errors on these paths are logged server-side, never surfaced to the
/// caller (see spec §7's Network/Consensus error-handling policy).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Ack {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSearch {
    pub height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSearchResult {
    pub block: WireBlock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxInput;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            timestamp: 42,
            inputs: vec![TxInput {
                prev_tx_hash: vec![1, 2, 3],
                prev_out_index: 0,
                public_key: [9u8; 32],
                signature: [8u8; 64],
            }],
            outputs: vec![TxOutput {
                amount: 10,
                address: [1u8; 20],
                payload: b"hi".to_vec(),
            }],
        }
    }

    #[test]
    fn transaction_wire_roundtrip() {
        let tx = sample_tx();
        let wire = WireTransaction::from(&tx);
        let restored = Transaction::try_from(&wire).unwrap();
        assert_eq!(tx, restored);
    }

    #[test]
    fn block_wire_roundtrip() {
        let tx = sample_tx();
        let header = Header {
            version: 1,
            height: 3,
            prev_hash: [2u8; 64],
            root_hash: [3u8; 64],
            timestamp: 99,
        };
        let block = Block {
            header,
            public_key: [4u8; 32],
            signature: [5u8; 64],
            transactions: vec![tx],
        };
        let wire = WireBlock::from(&block);
        let json = serde_json::to_string(&wire).unwrap();
        let parsed: WireBlock = serde_json::from_str(&json).unwrap();
        let restored = Block::try_from(&parsed).unwrap();
        assert_eq!(block, restored);
    }

    #[test]
    fn bad_hex_length_is_rejected() {
        let mut wire = WireTransaction::from(&sample_tx());
        wire.inputs[0].public_key = "ab".to_string();
        let err = Transaction::try_from(&wire).unwrap_err();
        assert!(matches!(err, RpcError::WrongLength { .. }));
    }

    #[test]
    fn non_hex_string_is_rejected() {
        let mut wire = WireTransaction::from(&sample_tx());
        wire.inputs[0].public_key = "not hex!!".to_string();
        let err = Transaction::try_from(&wire).unwrap_err();
        assert!(matches!(err, RpcError::InvalidHex(_)));
    }
}
