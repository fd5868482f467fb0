//! # Canonical Binary Codec
//!
//! A deterministic, length-delimited binary encoding for the wire and
//! on-disk data model: `Header`, `Transaction` (and its `TxInput`/
//! `TxOutput`), and `Block`.
//!
//! ## Why not just use `serde_json` or `bincode`?
//!
//! Every hash and every signature in this system is computed over this
//! exact byte representation. JSON is not canonical (key order, float
//! formatting, whitespace all vary across implementations); `bincode`'s
//! wire format is an implementation detail of the Rust crate version, not
//! a stable schema. Hashing has to be stable across process restarts and,
//! eventually, across independent implementations — so the schema is
//! spelled out explicitly here: every field has a fixed tag number and a
//! wire type, exactly as if this were a tiny hand-written protobuf.
//!
//! ## Wire types
//!
//! Only two are needed for this schema:
//! - `0` — varint: a ZigZag-encoded LEB128 integer.
//! - `2` — length-delimited: a varint length followed by that many raw
//!   bytes (used for both variable-length byte strings and fixed-width
//!   arrays like public keys and signatures).
//!
//! Every message encodes its fields unconditionally, in declaration order,
//! regardless of whether a field is zero-valued. This matters specifically
//! for [`crate::hash::hash_transaction_clean`], which hashes a transaction
//! with its signature and public key fields zeroed rather than omitted —
//! omit-if-default encoding would change the byte length of the cleared
//! fields and break that scheme entirely.

use thiserror::Error;

use crate::types::{Block, Header, Transaction, TxInput, TxOutput};

/// Errors produced while decoding a canonically-encoded record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of buffer while decoding")]
    UnexpectedEof,

    #[error("field length {0} exceeds remaining buffer")]
    LengthOutOfBounds(u64),

    #[error("fixed-width field {field} expected {expected} bytes, got {actual}")]
    WrongFixedLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("varint is too large to fit in target integer type")]
    VarintOverflow,
}

pub type CodecResult<T> = Result<T, CodecError>;

// ---------------------------------------------------------------------------
// Low-level primitives
// ---------------------------------------------------------------------------

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn read_varint(buf: &[u8], pos: &mut usize) -> CodecResult<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = *buf.get(*pos).ok_or(CodecError::UnexpectedEof)?;
        *pos += 1;
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(CodecError::VarintOverflow);
        }
    }
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Wire tag for a varint field (wire type 0).
fn write_tag_varint(buf: &mut Vec<u8>, field: u32) {
    write_varint(buf, ((field as u64) << 3) | 0);
}

/// Wire tag for a length-delimited field (wire type 2).
fn write_tag_bytes(buf: &mut Vec<u8>, field: u32) {
    write_varint(buf, ((field as u64) << 3) | 2);
}

fn read_tag(buf: &[u8], pos: &mut usize) -> CodecResult<(u32, u8)> {
    let tag = read_varint(buf, pos)?;
    Ok(((tag >> 3) as u32, (tag & 0x7) as u8))
}

fn write_i64_field(buf: &mut Vec<u8>, field: u32, value: i64) {
    write_tag_varint(buf, field);
    write_varint(buf, zigzag_encode(value));
}

fn write_u32_field(buf: &mut Vec<u8>, field: u32, value: u32) {
    write_tag_varint(buf, field);
    write_varint(buf, value as u64);
}

fn write_bytes_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    write_tag_bytes(buf, field);
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn read_i64_field(buf: &[u8], pos: &mut usize) -> CodecResult<i64> {
    let (_, wire_type) = read_tag(buf, pos)?;
    debug_assert_eq!(wire_type, 0);
    Ok(zigzag_decode(read_varint(buf, pos)?))
}

fn read_u32_field(buf: &[u8], pos: &mut usize) -> CodecResult<u32> {
    let (_, wire_type) = read_tag(buf, pos)?;
    debug_assert_eq!(wire_type, 0);
    let v = read_varint(buf, pos)?;
    Ok(v as u32)
}

fn read_bytes_field(buf: &[u8], pos: &mut usize) -> CodecResult<Vec<u8>> {
    let (_, wire_type) = read_tag(buf, pos)?;
    debug_assert_eq!(wire_type, 2);
    let len = read_varint(buf, pos)?;
    let end = pos
        .checked_add(len as usize)
        .ok_or(CodecError::LengthOutOfBounds(len))?;
    if end > buf.len() {
        return Err(CodecError::LengthOutOfBounds(len));
    }
    let out = buf[*pos..end].to_vec();
    *pos = end;
    Ok(out)
}

fn read_fixed_bytes_field<const N: usize>(
    buf: &[u8],
    pos: &mut usize,
    field: &'static str,
) -> CodecResult<[u8; N]> {
    let bytes = read_bytes_field(buf, pos)?;
    if bytes.len() != N {
        return Err(CodecError::WrongFixedLength {
            field,
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

// ---------------------------------------------------------------------------
// TxInput — fields 1..4
// ---------------------------------------------------------------------------

pub fn encode_tx_input(buf: &mut Vec<u8>, input: &TxInput) {
    write_bytes_field(buf, 1, &input.prev_tx_hash);
    write_u32_field(buf, 2, input.prev_out_index);
    write_bytes_field(buf, 3, &input.public_key);
    write_bytes_field(buf, 4, &input.signature);
}

pub fn decode_tx_input(buf: &[u8], pos: &mut usize) -> CodecResult<TxInput> {
    let prev_tx_hash = read_bytes_field(buf, pos)?;
    let prev_out_index = read_u32_field(buf, pos)?;
    let public_key = read_fixed_bytes_field(buf, pos, "TxInput.public_key")?;
    let signature = read_fixed_bytes_field(buf, pos, "TxInput.signature")?;
    Ok(TxInput {
        prev_tx_hash,
        prev_out_index,
        public_key,
        signature,
    })
}

// ---------------------------------------------------------------------------
// TxOutput — fields 1..3
// ---------------------------------------------------------------------------

pub fn encode_tx_output(buf: &mut Vec<u8>, output: &TxOutput) {
    write_i64_field(buf, 1, output.amount);
    write_bytes_field(buf, 2, &output.address);
    write_bytes_field(buf, 3, &output.payload);
}

pub fn decode_tx_output(buf: &[u8], pos: &mut usize) -> CodecResult<TxOutput> {
    let amount = read_i64_field(buf, pos)?;
    let address = read_fixed_bytes_field(buf, pos, "TxOutput.address")?;
    let payload = read_bytes_field(buf, pos)?;
    Ok(TxOutput {
        amount,
        address,
        payload,
    })
}

// ---------------------------------------------------------------------------
// Transaction — fields 1..4 (inputs/outputs are length-prefixed sequences)
// ---------------------------------------------------------------------------

pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32_field(&mut buf, 1, tx.version);
    write_i64_field(&mut buf, 2, tx.timestamp);

    write_tag_bytes(&mut buf, 3);
    let mut inputs_buf = Vec::new();
    write_varint(&mut inputs_buf, tx.inputs.len() as u64);
    for input in &tx.inputs {
        encode_tx_input(&mut inputs_buf, input);
    }
    write_varint(&mut buf, inputs_buf.len() as u64);
    buf.extend_from_slice(&inputs_buf);

    write_tag_bytes(&mut buf, 4);
    let mut outputs_buf = Vec::new();
    write_varint(&mut outputs_buf, tx.outputs.len() as u64);
    for output in &tx.outputs {
        encode_tx_output(&mut outputs_buf, output);
    }
    write_varint(&mut buf, outputs_buf.len() as u64);
    buf.extend_from_slice(&outputs_buf);

    buf
}

pub fn decode_transaction(buf: &[u8]) -> CodecResult<Transaction> {
    let mut pos = 0usize;
    let version = read_u32_field(buf, &mut pos)?;
    let timestamp = read_i64_field(buf, &mut pos)?;

    let inputs_bytes = read_bytes_field(buf, &mut pos)?;
    let mut ipos = 0usize;
    let input_count = read_varint(&inputs_bytes, &mut ipos)?;
    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        inputs.push(decode_tx_input(&inputs_bytes, &mut ipos)?);
    }

    let outputs_bytes = read_bytes_field(buf, &mut pos)?;
    let mut opos = 0usize;
    let output_count = read_varint(&outputs_bytes, &mut opos)?;
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        outputs.push(decode_tx_output(&outputs_bytes, &mut opos)?);
    }

    Ok(Transaction {
        version,
        timestamp,
        inputs,
        outputs,
    })
}

// ---------------------------------------------------------------------------
// Header — fields 1..5
// ---------------------------------------------------------------------------

pub fn encode_header(header: &Header) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32_field(&mut buf, 1, header.version);
    write_i64_field(&mut buf, 2, header.height as i64);
    write_bytes_field(&mut buf, 3, &header.prev_hash);
    write_bytes_field(&mut buf, 4, &header.root_hash);
    write_i64_field(&mut buf, 5, header.timestamp);
    buf
}

pub fn decode_header(buf: &[u8]) -> CodecResult<Header> {
    let mut pos = 0usize;
    let version = read_u32_field(buf, &mut pos)?;
    let height = read_i64_field(buf, &mut pos)? as i32;
    let prev_hash = read_fixed_bytes_field(buf, &mut pos, "Header.prev_hash")?;
    let root_hash = read_fixed_bytes_field(buf, &mut pos, "Header.root_hash")?;
    let timestamp = read_i64_field(buf, &mut pos)?;
    Ok(Header {
        version,
        height,
        prev_hash,
        root_hash,
        timestamp,
    })
}

// ---------------------------------------------------------------------------
// Block — header, public_key, signature, then a sequence of transactions
// ---------------------------------------------------------------------------

pub fn encode_block(block: &Block) -> Vec<u8> {
    let mut buf = Vec::new();

    let header_bytes = encode_header(&block.header);
    write_bytes_field(&mut buf, 1, &header_bytes);
    write_bytes_field(&mut buf, 2, &block.public_key);
    write_bytes_field(&mut buf, 3, &block.signature);

    write_tag_bytes(&mut buf, 4);
    let mut txs_buf = Vec::new();
    write_varint(&mut txs_buf, block.transactions.len() as u64);
    for tx in &block.transactions {
        let tx_bytes = encode_transaction(tx);
        write_varint(&mut txs_buf, tx_bytes.len() as u64);
        txs_buf.extend_from_slice(&tx_bytes);
    }
    write_varint(&mut buf, txs_buf.len() as u64);
    buf.extend_from_slice(&txs_buf);

    buf
}

pub fn decode_block(buf: &[u8]) -> CodecResult<Block> {
    let mut pos = 0usize;
    let header_bytes = read_bytes_field(buf, &mut pos)?;
    let header = decode_header(&header_bytes)?;
    let public_key = read_fixed_bytes_field(buf, &mut pos, "Block.public_key")?;
    let signature = read_fixed_bytes_field(buf, &mut pos, "Block.signature")?;

    let txs_bytes = read_bytes_field(buf, &mut pos)?;
    let mut tpos = 0usize;
    let tx_count = read_varint(&txs_bytes, &mut tpos)?;
    let mut transactions = Vec::with_capacity(tx_count as usize);
    for _ in 0..tx_count {
        let len = read_varint(&txs_bytes, &mut tpos)? as usize;
        let end = tpos + len;
        if end > txs_bytes.len() {
            return Err(CodecError::LengthOutOfBounds(len as u64));
        }
        transactions.push(decode_transaction(&txs_bytes[tpos..end])?);
        tpos = end;
    }

    Ok(Block {
        header,
        public_key,
        signature,
        transactions,
    })
}
