//! Fragment reassembly through the async engine.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use wiresink_rs::collaborators::{ChannelTransport, OutboundFrame};
use wiresink_rs::shard::{ShardAck, ShardEngine, ShardPiece};
use wiresink_rs::{Frame, FrameHeader, PacketType, SensorId};

const ID: SensorId = SensorId::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x07]);

fn new_engine(timeout_secs: u64) -> (ShardEngine, UnboundedReceiver<OutboundFrame>) {
    let (transport, rx) = ChannelTransport::new();
    (
        ShardEngine::new(Arc::new(transport), Duration::from_secs(timeout_secs)),
        rx,
    )
}

fn frame_for(piece: &ShardPiece) -> Frame {
    Frame::new(
        ID,
        FrameHeader::new(5, true, PacketType::Monitoring),
        piece.encode().unwrap(),
    )
}

fn drain_acks(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<ShardAck> {
    let mut acks = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        acks.push(ShardAck::decode(&frame.bytes).unwrap().1);
    }
    acks
}

async fn deliver(engine: &ShardEngine, pieces: &[ShardPiece], order: &[usize]) -> Option<Frame> {
    let mut completed = None;
    for &i in order {
        if let Some(frame) = engine.submit(frame_for(&pieces[i])).await.unwrap() {
            completed = Some(frame);
        }
    }
    completed
}

#[tokio::test]
async fn test_in_order_reassembly() {
    let payload: Vec<u8> = (0..=200).collect();
    let pieces = ShardPiece::split(12, &payload, 64).unwrap();
    assert_eq!(pieces.len(), 4);

    let (engine, mut rx) = new_engine(20);
    let frame = deliver(&engine, &pieces, &[0, 1, 2, 3]).await.unwrap();
    assert_eq!(frame.payload, payload);
    assert_eq!(frame.param_count, 5);
    assert!(!frame.fragmented);
    assert_eq!(engine.active_reassemblies(), 0);
    assert!(drain_acks(&mut rx).iter().all(|ack| ack.success));
}

#[tokio::test]
async fn test_out_of_order_matches_in_order() {
    let payload: Vec<u8> = b"out of order pieces still make one payload".to_vec();
    let pieces = ShardPiece::split(3, &payload, 12).unwrap();
    assert_eq!(pieces.len(), 4);

    let (engine, _rx) = new_engine(20);
    let shuffled = deliver(&engine, &pieces, &[0, 2, 1, 3]).await.unwrap();
    let (engine, _rx) = new_engine(20);
    let ordered = deliver(&engine, &pieces, &[0, 1, 2, 3]).await.unwrap();
    assert_eq!(shuffled.payload, ordered.payload);
    assert_eq!(shuffled.payload, payload);
}

#[tokio::test]
async fn test_end_piece_first_after_start() {
    let payload: Vec<u8> = (0..40).collect();
    let pieces = ShardPiece::split(3, &payload, 10).unwrap();
    let (engine, _rx) = new_engine(20);
    let frame = deliver(&engine, &pieces, &[0, 3, 2, 1]).await.unwrap();
    assert_eq!(frame.payload, payload);
}

#[tokio::test]
async fn test_duplicate_piece_is_not_reapplied() {
    let pieces = ShardPiece::split(1, &[1, 2, 3, 4, 5, 6], 2).unwrap();
    let (engine, mut rx) = new_engine(20);
    let frame = deliver(&engine, &pieces, &[0, 1, 1, 0, 2]).await.unwrap();
    assert_eq!(frame.payload, vec![1, 2, 3, 4, 5, 6]);

    let acks = drain_acks(&mut rx);
    assert_eq!(acks.len(), 5);
    assert!(acks.iter().all(|ack| ack.success));
    assert_eq!(acks[2], ShardAck::success(1, 1));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_fresh_start() {
    let pieces = ShardPiece::split(9, &[10, 20, 30], 1).unwrap();
    let (engine, mut rx) = new_engine(20);

    engine.submit(frame_for(&pieces[0])).await.unwrap();
    tokio::time::sleep(Duration::from_secs(25)).await;

    let acks = drain_acks(&mut rx);
    assert_eq!(acks, vec![ShardAck::success(9, 0), ShardAck::failure(9, 0)]);
    assert_eq!(engine.active_reassemblies(), 0);

    // a late piece of the evicted shard is refused
    assert!(engine.submit(frame_for(&pieces[1])).await.unwrap().is_none());
    assert_eq!(drain_acks(&mut rx), vec![ShardAck::failure(9, 1)]);

    let frame = deliver(&engine, &pieces, &[0, 1, 2]).await.unwrap();
    assert_eq!(frame.payload, vec![10, 20, 30]);
}

#[tokio::test(start_paused = true)]
async fn test_progress_postpones_eviction() {
    let pieces = ShardPiece::split(2, &[1, 2, 3, 4], 1).unwrap();
    let (engine, mut rx) = new_engine(20);

    engine.submit(frame_for(&pieces[0])).await.unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;
    engine.submit(frame_for(&pieces[1])).await.unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(engine.active_reassemblies(), 1);

    engine.submit(frame_for(&pieces[2])).await.unwrap();
    let done = engine.submit(frame_for(&pieces[3])).await.unwrap();
    assert_eq!(done.unwrap().payload, vec![1, 2, 3, 4]);
    assert!(drain_acks(&mut rx).iter().all(|ack| ack.success));
}

#[tokio::test]
async fn test_malformed_piece_is_nacked() {
    let (engine, mut rx) = new_engine(20);
    let bad = Frame::new(
        ID,
        FrameHeader::new(1, true, PacketType::Alarm),
        vec![0x04, 0x00, 0x10],
    );
    assert!(engine.submit(bad).await.unwrap().is_none());
    assert_eq!(drain_acks(&mut rx), vec![ShardAck::failure(4, 0)]);
    assert_eq!(engine.active_reassemblies(), 0);
}
