//! Criterion benchmarks for the BoxCar byte codec.
//!
//! The inbound decoder runs under the command lock on every listener period
//! and every acknowledgment wait, so it must stay far below a microsecond for
//! the buffer sizes the vehicle actually produces.
//!
//! Run with:
//! ```bash
//! cargo bench --package boxcar-core --bench codec_bench
//! ```

use boxcar_core::protocol::messages::INBOUND_BUFFER_SIZE;
use boxcar_core::protocol::{decode_command, decode_inbound, encode_command, Command};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Inbound fixtures ──────────────────────────────────────────────────────────

fn single_ack() -> Vec<u8> {
    vec![0x01]
}

/// A sensor storm: the vehicle drove along a line edge between two polls.
fn sensor_burst() -> Vec<u8> {
    (0..32).map(|i| if i % 2 == 0 { 0x02 } else { 0x03 }).collect()
}

/// A full read buffer with unknown bytes mixed in.
fn full_mixed_buffer() -> Vec<u8> {
    (0..INBOUND_BUFFER_SIZE).map(|i| (i % 7) as u8).collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_decode_inbound(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_inbound");
    let inputs = [
        ("single_ack", single_ack()),
        ("sensor_burst_32", sensor_burst()),
        ("full_mixed_256", full_mixed_buffer()),
    ];
    for (name, bytes) in &inputs {
        group.bench_with_input(BenchmarkId::new("buffer", name), bytes, |b, bytes| {
            b.iter(|| decode_inbound(black_box(bytes)))
        });
    }
    group.finish();
}

fn bench_command_hot_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_encode_decode");

    // SetSpeed is the most frequent command while the throttle moves.
    group.bench_function("SetSpeed", |b| {
        b.iter(|| {
            let bytes = encode_command(black_box(Command::SetSpeed(200)));
            decode_command(black_box(&bytes)).unwrap()
        })
    });

    group.bench_function("Forward", |b| {
        b.iter(|| {
            let bytes = encode_command(black_box(Command::Forward));
            decode_command(black_box(&bytes)).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode_inbound, bench_command_hot_path);
criterion_main!(benches);
