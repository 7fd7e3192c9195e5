//! Performance benchmarks for the requester's hot paths.
//!
//! Run with: cargo bench

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use k256::ecdsa::SigningKey;

use zk_attestor::crypto::{recover_public_key, sign_prehash, CalldataPrefix};
use zk_attestor::domain::{Challenge, Nonce};
use zk_attestor::infra::{FreshnessWindow, MetadataValidator, NonceRegistry};
use zk_attestor::verifier::{bytes_to_inputs, PublicInputLayout, ReferenceCheck};

/// Benchmark calldata prefix extraction and both digests
fn bench_calldata_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("calldata_digest");

    for len in [10usize, 37, 68, 1024].iter() {
        let input = vec![0x5a; *len];
        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::new("signed_digest", len), &input, |b, input| {
            b.iter(|| {
                let prefix = CalldataPrefix::from_input(black_box(input));
                black_box(prefix.signed_message_digest());
            });
        });
    }

    group.finish();
}

/// Benchmark public key recovery
fn bench_recovery(c: &mut Criterion) {
    let key = SigningKey::from_bytes(&[7u8; 32].into()).unwrap();
    let digest = B256::repeat_byte(0x42);
    let signature = sign_prehash(&key, &digest).unwrap();

    c.bench_function("recover_public_key", |b| {
        b.iter(|| recover_public_key(black_box(&digest), black_box(&signature)).unwrap());
    });
}

/// Benchmark the structural contract check
fn bench_reference_check(c: &mut Criterion) {
    let address = Address::repeat_byte(0x35);
    let mut bytes = address.to_vec();
    bytes.extend_from_slice(&[0u8; 161]);
    let inputs = bytes_to_inputs(&bytes);
    let check = ReferenceCheck::ContractAddress(address);
    let layout = PublicInputLayout::default();

    c.bench_function("contract_reference_check", |b| {
        b.iter(|| check.check(black_box(&inputs), &layout).unwrap());
    });
}

/// Benchmark metadata validation with a growing nonce registry
fn bench_metadata_validation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let window = FreshnessWindow::default();
    let validator = MetadataValidator::new(window, Arc::new(NonceRegistry::new(window.retention())));
    let now = 1_700_000_000;

    c.bench_function("metadata_validate", |b| {
        b.to_async(&rt).iter(|| async {
            let meta = Challenge {
                origin: "https://app.test".to_string(),
                nonce: Nonce::generate(),
                issued_at: now,
            };
            validator
                .validate_at(&meta, "https://app.test", now)
                .await
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_calldata_digest,
    bench_recovery,
    bench_reference_check,
    bench_metadata_validation,
);
criterion_main!(benches);
