//! Codec benchmarks for murmur-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use murmur_protocol::{codec, Frame, SignalKind};

fn bench_encode_offer(c: &mut Criterion) {
    // Typical SDP offers run a few hundred bytes to a few KiB.
    let frame = Frame::signal_to("conn-2", SignalKind::Offer, vec![0u8; 1024]);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("offer_1KiB", |b| b.iter(|| codec::encode(black_box(&frame))));
    group.finish();
}

fn bench_decode_offer(c: &mut Criterion) {
    let frame = Frame::signal_to("conn-2", SignalKind::Offer, vec![0u8; 1024]);
    let encoded = codec::encode(&frame).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("offer_1KiB", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_roundtrip_candidate(c: &mut Criterion) {
    let frame = Frame::signal_to("conn-2", SignalKind::IceCandidate, vec![0u8; 128]);

    c.bench_function("roundtrip_candidate_128B", |b| {
        b.iter(|| {
            let encoded = codec::encode(black_box(&frame)).unwrap();
            codec::decode(black_box(&encoded)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_encode_offer,
    bench_decode_offer,
    bench_roundtrip_candidate
);
criterion_main!(benches);
