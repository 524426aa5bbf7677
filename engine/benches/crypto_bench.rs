// Hot-path crypto benchmarks for Quill.
//
// Covers detached signature verification (every sign-in) and associated
// token account derivation (every token payment check).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use quill_engine::config::USDT_MINT;
use quill_engine::crypto::{
    associated_token_address, find_program_address, verify_detached, Address, DetachedSignature,
};

fn bench_verify_detached(c: &mut Criterion) {
    let key = SigningKey::generate(&mut OsRng);
    let signer = Address::new(key.verifying_key().to_bytes());
    let nonce = b"4820193746501928";
    let signature = DetachedSignature::from_bytes(key.sign(nonce).to_bytes());

    c.bench_function("ed25519/verify_detached", |b| {
        b.iter(|| verify_detached(black_box(&signer), black_box(nonce), black_box(&signature)));
    });
}

fn bench_decode_signature(c: &mut Criterion) {
    let key = SigningKey::generate(&mut OsRng);
    let encoded = bs58::encode(key.sign(b"nonce").to_bytes()).into_string();

    c.bench_function("bs58/decode_signature", |b| {
        b.iter(|| DetachedSignature::from_base58(black_box(&encoded)));
    });
}

fn bench_associated_token_address(c: &mut Criterion) {
    let owner = Address::new(SigningKey::generate(&mut OsRng).verifying_key().to_bytes());

    c.bench_function("derivation/associated_token_address", |b| {
        b.iter(|| associated_token_address(black_box(&owner), black_box(&USDT_MINT)));
    });
}

fn bench_find_program_address_by_seed_count(c: &mut Criterion) {
    let program = Address::new([7u8; 32]);
    let seed = [42u8; 32];
    let mut group = c.benchmark_group("derivation/find_program_address");

    for count in [1usize, 3, 8] {
        let seeds: Vec<&[u8]> = (0..count).map(|_| &seed[..]).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &seeds, |b, seeds| {
            b.iter(|| find_program_address(black_box(seeds), black_box(&program)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_verify_detached,
    bench_decode_signature,
    bench_associated_token_address,
    bench_find_program_address_by_seed_count,
);
criterion_main!(benches);
