use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tokio::time::Instant;
use wiresink_rs::frame::{checksum, decode_frame};
use wiresink_rs::payload::decode_parameters;
use wiresink_rs::shard::{ReassemblyTable, ShardPiece};
use wiresink_rs::{Frame, FrameHeader, PacketType, SensorId};

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

const MONITORING_HEX: &str = "238A082623192014000000AC41750002500019DE";

fn benchmark_decode_frame(c: &mut Criterion) {
    let data = hex_to_bytes(MONITORING_HEX);

    c.bench_function("decode_frame", |b| {
        b.iter(|| {
            let result = decode_frame(black_box(&data));
            let _ = black_box(result);
        })
    });

    let frame = decode_frame(&data).unwrap();
    c.bench_function("decode_parameters", |b| {
        b.iter(|| {
            let list = decode_parameters(black_box(&frame.payload), 2);
            black_box(list.values.len())
        })
    });
}

fn benchmark_checksum(c: &mut Criterion) {
    let data = vec![0x5Au8; 1024];
    c.bench_function("checksum_1k", |b| b.iter(|| checksum(black_box(&data))));
}

fn benchmark_reassembly(c: &mut Criterion) {
    let id = SensorId::new([1, 2, 3, 4, 5, 6]);
    let payload: Vec<u8> = (0..=255).cycle().take(4096).collect();
    let frames: Vec<Frame> = ShardPiece::split(1, &payload, 256)
        .unwrap()
        .iter()
        .map(|piece| {
            Frame::new(
                id,
                FrameHeader::new(1, true, PacketType::Monitoring),
                piece.encode().unwrap(),
            )
        })
        .collect();

    c.bench_function("reassemble_16_pieces", |b| {
        b.iter(|| {
            let mut table = ReassemblyTable::new(Duration::from_secs(20));
            let now = Instant::now();
            let mut done = None;
            for frame in &frames {
                done = table.process(black_box(frame), now).completed;
            }
            black_box(done)
        })
    });
}

criterion_group!(
    benches,
    benchmark_decode_frame,
    benchmark_checksum,
    benchmark_reassembly
);
criterion_main!(benches);
