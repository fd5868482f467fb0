// Signing & verification benchmarks for the Meridian protocol.
//
// Covers Ed25519 keypair generation, single-message signing and
// verification, transaction signing through the canonical hash contract,
// and batch verification at various sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use meridian_protocol::crypto::{batch_verify, sign, verify, Keypair};
use meridian_protocol::hash::{sign_transaction, verify_transaction_signature};
use meridian_protocol::types::{Transaction, TxInput, TxOutput};

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(Keypair::generate);
    });
}

fn bench_sign_message(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let message = b"transfer 500 MER from alice to bob; nonce=42";

    c.bench_function("ed25519/sign_message", |b| {
        b.iter(|| sign(&keypair, message));
    });
}

fn bench_verify_signature(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let message = b"transfer 500 MER from alice to bob; nonce=42";
    let signature = sign(&keypair, message);
    let public_key = keypair.public_key();

    c.bench_function("ed25519/verify_signature", |b| {
        b.iter(|| verify(&public_key, message, &signature));
    });
}

fn sample_transaction(validator: &Keypair) -> Transaction {
    Transaction {
        version: 1,
        timestamp: 1_700_000_000,
        inputs: vec![TxInput::default()],
        outputs: vec![TxOutput {
            amount: 1_000_000,
            address: validator.public_key().address().into_bytes(),
            payload: vec![],
        }],
    }
}

fn bench_sign_transaction(c: &mut Criterion) {
    let keypair = Keypair::generate();

    c.bench_function("ed25519/sign_transaction", |b| {
        b.iter(|| {
            let mut tx = sample_transaction(&keypair);
            sign_transaction(&mut tx, &keypair);
        });
    });
}

fn bench_verify_transaction(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let mut tx = sample_transaction(&keypair);
    sign_transaction(&mut tx, &keypair);

    c.bench_function("ed25519/verify_transaction", |b| {
        b.iter(|| verify_transaction_signature(&tx));
    });
}

fn bench_batch_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("ed25519/batch_verify");

    for size in [10, 50, 100, 500] {
        let items: Vec<_> = (0..size)
            .map(|i| {
                let kp = Keypair::generate();
                let msg = format!("tx-{:06}", i).into_bytes();
                let sig = sign(&kp, &msg);
                (kp.public_key(), msg, sig)
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| batch_verify(items).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_message,
    bench_verify_signature,
    bench_sign_transaction,
    bench_verify_transaction,
    bench_batch_verify,
);
criterion_main!(benches);
