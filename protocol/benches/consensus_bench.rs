// Consensus engine benchmarks for the Meridian protocol.
//
// Covers leader computation, single-validator propose-to-finalize
// round-trip latency, and block/header hashing at the sizes a validator
// set's quorum math actually produces.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use meridian_protocol::consensus::{classical_quorum, ConsensusEngine};
use meridian_protocol::crypto::Keypair;
use meridian_protocol::hash::hash_header;
use meridian_protocol::merkle::merkle_root;
use meridian_protocol::types::{Block, Header};
use std::sync::Arc;

fn sample_block(height: i32, validator: &Keypair) -> Block {
    let header = Header {
        version: 1,
        height,
        prev_hash: [0u8; 64],
        root_hash: merkle_root(&[]),
        timestamp: height as i64,
    };
    let signature = validator.sign(&hash_header(&header));
    Block {
        header,
        public_key: validator.public_key_bytes(),
        signature: signature.to_array(),
        transactions: vec![],
    }
}

fn bench_classical_quorum(c: &mut Criterion) {
    c.bench_function("consensus/classical_quorum", |b| {
        b.iter(|| classical_quorum(21));
    });
}

fn bench_leader_lookup(c: &mut Criterion) {
    let validators: Vec<String> = (0..21).map(|i| format!("validator-{i}")).collect();
    let (engine, _rx) = ConsensusEngine::new(
        validators,
        "validator-0".to_string(),
        classical_quorum(21),
        Arc::new(|_| true),
    );

    c.bench_function("consensus/leader_lookup", |b| {
        b.iter(|| engine.leader(12345));
    });
}

fn bench_single_validator_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("consensus/propose_to_finalize");
    group.throughput(Throughput::Elements(1));

    group.bench_with_input(BenchmarkId::from_parameter("solo"), &(), |b, _| {
        b.iter_with_setup(
            || {
                let validator = Keypair::generate();
                let node_id = hex::encode(validator.public_key_bytes());
                let (engine, finalized_rx) =
                    ConsensusEngine::new(vec![node_id.clone()], node_id, 1, Arc::new(|_| true));
                rt.block_on(async {
                    engine.start();
                });
                let block = sample_block(1, &validator);
                (engine, finalized_rx, block)
            },
            |(engine, mut finalized_rx, block)| {
                rt.block_on(async {
                    engine.propose_block(block);
                    finalized_rx.recv().await.unwrap();
                    engine.stop();
                });
            },
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_classical_quorum,
    bench_leader_lookup,
    bench_single_validator_round_trip,
);
criterion_main!(benches);
