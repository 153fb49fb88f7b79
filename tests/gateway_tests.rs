//! End-to-end tests of the gateway pipeline against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_test::assert_ok;
use wiresink_rs::collaborators::{
    ChannelReporter, ChannelTransport, MemoryValueStore, OutboundFrame, Report,
    StaticIdentityRegistry,
};
use wiresink_rs::config::DeviceMapping;
use wiresink_rs::constants::{RESOURCE_LAST_DATA_TIMESTAMP, RESOURCE_SENSOR_ID};
use wiresink_rs::frame::{decode_frame, encode_frame};
use wiresink_rs::payload::ParameterEntry;
use wiresink_rs::shard::{ShardAck, ShardPiece};
use wiresink_rs::{
    Collaborators, CommandIssuer, DeviceCommand, Frame, FrameHeader, Gateway, GatewayConfig,
    GatewayHandle, PacketType, SensorId, TypedValue, ValueStore,
};

const ID: SensorId = SensorId::new([0x23, 0x8A, 0x08, 0x26, 0x23, 0x19]);
const DEVICE: &str = "transformer-oil-1";

struct Rig {
    handle: GatewayHandle,
    store: MemoryValueStore,
    outbound: UnboundedReceiver<OutboundFrame>,
    reports: UnboundedReceiver<Report>,
    transport: ChannelTransport,
}

fn rig() -> Rig {
    let config = GatewayConfig {
        devices: vec![DeviceMapping {
            sensor_id: ID.to_hex(),
            name: DEVICE.into(),
        }],
        ..GatewayConfig::default()
    };
    let registry = StaticIdentityRegistry::from_mappings(&config.devices).unwrap();
    let store = MemoryValueStore::new();
    let (transport, outbound) = ChannelTransport::new();
    let (reporter, reports) = ChannelReporter::new();
    let collaborators = Collaborators {
        identities: Arc::new(registry),
        store: Arc::new(store.clone()),
        transport: Arc::new(transport.clone()),
        reporter: Arc::new(reporter),
    };
    let handle = Gateway::spawn(&config, collaborators).unwrap();
    Rig {
        handle,
        store,
        outbound,
        reports,
        transport,
    }
}

fn entry(name: &str, data: Vec<u8>) -> Vec<u8> {
    ParameterEntry::named(name, data).unwrap().to_bytes()
}

async fn next_outbound(rx: &mut UnboundedReceiver<OutboundFrame>) -> OutboundFrame {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no outbound frame")
        .expect("transport closed")
}

#[tokio::test]
async fn test_monitoring_frame_end_to_end() {
    let mut rig = rig();
    let payload = [
        entry("Temperature", 42.0f32.to_le_bytes().to_vec()),
        entry("BatteryRemaining", 97u16.to_le_bytes().to_vec()),
    ]
    .concat();
    let raw = encode_frame(&Frame::new(
        ID,
        FrameHeader::new(2, false, PacketType::Monitoring),
        payload,
    ));
    assert_ok!(rig.handle.submit(raw).await);

    let report = timeout(Duration::from_secs(5), rig.reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.device, DEVICE);
    assert_eq!(report.values.len(), 2);

    let ack = decode_frame(&next_outbound(&mut rig.outbound).await.bytes).unwrap();
    assert_eq!(ack.packet_type, PacketType::MonitoringResponse);
    assert_eq!(ack.payload, vec![0xFF]);

    assert_eq!(
        rig.store.read_value(DEVICE, "BatteryRemaining"),
        Some(TypedValue::U16(97))
    );
    assert!(rig
        .store
        .read_value(DEVICE, RESOURCE_LAST_DATA_TIMESTAMP)
        .is_some());
    assert_eq!(
        rig.store.read_value(DEVICE, RESOURCE_SENSOR_ID),
        Some(TypedValue::Text(ID.to_hex()))
    );
    rig.handle.shutdown().await;
}

#[tokio::test]
async fn test_fragmented_alarm_end_to_end() {
    let mut rig = rig();
    let payload = [
        entry("Temperature", 88.5f32.to_le_bytes().to_vec()),
        entry("BatteryRemaining", 12u16.to_le_bytes().to_vec()),
    ]
    .concat();
    let pieces = ShardPiece::split(6, &payload, 4).unwrap();
    assert_eq!(pieces.len(), 3);

    for piece in [&pieces[0], &pieces[2], &pieces[1]] {
        let raw = encode_frame(&Frame::new(
            ID,
            FrameHeader::new(2, true, PacketType::Alarm),
            piece.encode().unwrap(),
        ));
        assert_ok!(rig.handle.submit(raw).await);
    }

    let report = timeout(Duration::from_secs(5), rig.reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.values.get("Temperature"), Some(&TypedValue::F32(88.5)));
    assert_eq!(report.values.get("BatteryRemaining"), Some(&TypedValue::U16(12)));

    let mut acks = Vec::new();
    for _ in 0..3 {
        let sent = next_outbound(&mut rig.outbound).await;
        acks.push(ShardAck::decode(&sent.bytes).unwrap().1);
    }
    acks.sort_by_key(|ack| ack.piece_sequence);
    assert_eq!(
        acks,
        vec![
            ShardAck::success(6, 0),
            ShardAck::success(6, 1),
            ShardAck::success(6, 2)
        ]
    );
    rig.handle.shutdown().await;
    assert!(rig.outbound.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_rejects_in_flight_reassembly() {
    let mut rig = rig();
    let piece = ShardPiece::new(2, 0, false, vec![1, 2, 3]);
    let raw = encode_frame(&Frame::new(
        ID,
        FrameHeader::new(1, true, PacketType::Monitoring),
        piece.encode().unwrap(),
    ));
    assert_ok!(rig.handle.submit(raw).await);
    let first = next_outbound(&mut rig.outbound).await;
    assert_eq!(ShardAck::decode(&first.bytes).unwrap().1, ShardAck::success(2, 0));

    rig.handle.shutdown().await;
    let last = next_outbound(&mut rig.outbound).await;
    assert_eq!(ShardAck::decode(&last.bytes).unwrap().1, ShardAck::failure(2, 0));
}

#[tokio::test]
async fn test_reset_command_uses_seeded_identity() {
    let mut rig = rig();
    let issuer = CommandIssuer::new(Arc::new(rig.store.clone()), Arc::new(rig.transport.clone()));

    assert!(issuer
        .handle_write(DEVICE, "Reset_Set", &TypedValue::U8(1))
        .await
        .unwrap());
    let sent = next_outbound(&mut rig.outbound).await;
    assert_eq!(sent.target, ID);
    assert_eq!(decode_frame(&sent.bytes).unwrap().payload, vec![0x0C]);

    let bytes = issuer
        .issue(DEVICE, DeviceCommand::MonitoringDataQuery)
        .await
        .unwrap();
    assert_eq!(decode_frame(&bytes).unwrap().param_count, 0x0F);
    rig.handle.shutdown().await;
}

#[tokio::test]
async fn test_unknown_sensor_produces_no_report() {
    let mut rig = rig();
    let stranger = SensorId::new([9; 6]);
    let raw = encode_frame(&Frame::new(
        stranger,
        FrameHeader::new(1, false, PacketType::Alarm),
        entry("Temperature", 1.0f32.to_le_bytes().to_vec()),
    ));
    assert_ok!(rig.handle.submit(raw).await);

    let ack = next_outbound(&mut rig.outbound).await;
    assert_eq!(ack.target, stranger);
    rig.handle.shutdown().await;
    assert!(rig.reports.try_recv().is_err());
}
