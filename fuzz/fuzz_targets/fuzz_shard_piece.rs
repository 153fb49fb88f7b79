#![no_main]

use libfuzzer_sys::fuzz_target;
use std::time::Duration;
use tokio::time::Instant;
use wiresink_rs::shard::{ReassemblyTable, ShardPiece};
use wiresink_rs::{Frame, FrameHeader, PacketType, SensorId};

fuzz_target!(|data: &[u8]| {
    if let Ok(piece) = ShardPiece::parse(data) {
        assert!(piece.shard_sequence < 64);
        assert!(piece.piece_sequence < 128);
    }

    // Feed the input as a stream of pieces split on a length prefix
    let mut table = ReassemblyTable::new(Duration::from_secs(20));
    let now = Instant::now();
    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let len = usize::from(len).min(tail.len());
        let (payload, next) = tail.split_at(len);
        let frame = Frame::new(
            SensorId::new([1; 6]),
            FrameHeader::new(1, true, PacketType::Monitoring),
            payload.to_vec(),
        );
        let _ = table.process(&frame, now);
        rest = next;
    }
    let _ = table.drain();
});
