//! Per-frame routing.
//!
//! `FrameProcessor` owns no state of its own. It validates the envelope,
//! acknowledges business frames, resolves the logical device and hands the
//! payload to parameter decoding or control dispatch. Fragmented frames are
//! returned to the caller for the shard queue.

use super::Collaborators;
use crate::collaborators::{IdentityRegistry, Reporter, Transport, ValueMap, ValueStore};
use crate::constants::RESOURCE_LAST_DATA_TIMESTAMP;
use crate::control::{ControlDispatcher, ControlMessage};
use crate::error::WireSinkError;
use crate::frame::{
    decode_frame, encode_data_status, peek_envelope, DataStatus, Frame, FrameHeader, SensorId,
};
use crate::logging::log_frame;
use crate::payload::{decode_parameters, TypedValue};
use log::{debug, warn};
use std::sync::Arc;

/// What happened to one inbound frame.
#[derive(Debug)]
pub enum FrameDisposition {
    /// Envelope validation failed; nothing past the envelope was read.
    Rejected(WireSinkError),
    /// No logical device is registered for the sender.
    UnknownSensor(SensorId),
    /// A piece of a fragmented frame, for the shard engine.
    Fragment(Frame),
    /// Values were decoded or a control message was dispatched.
    Handled,
}

#[derive(Clone)]
pub struct FrameProcessor {
    identities: Arc<dyn IdentityRegistry>,
    store: Arc<dyn ValueStore>,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    dispatcher: ControlDispatcher,
    source_tag: String,
}

impl FrameProcessor {
    pub fn new(collaborators: &Collaborators, source_tag: impl Into<String>) -> Self {
        FrameProcessor {
            identities: collaborators.identities.clone(),
            store: collaborators.store.clone(),
            transport: collaborators.transport.clone(),
            reporter: collaborators.reporter.clone(),
            dispatcher: ControlDispatcher::new(
                collaborators.identities.clone(),
                collaborators.store.clone(),
            ),
            source_tag: source_tag.into(),
        }
    }

    /// Handles one raw frame from the transport.
    pub async fn handle_raw(&self, raw: &[u8]) -> FrameDisposition {
        log_frame("RX", raw);

        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping frame: {}", e);
                if matches!(e, WireSinkError::ChecksumMismatch { .. }) {
                    self.reject_corrupt(raw).await;
                }
                return FrameDisposition::Rejected(e);
            }
        };

        if !frame.fragmented {
            if let Some(response) = frame.packet_type.status_response() {
                let header = FrameHeader::new(frame.param_count, false, response);
                self.send(
                    frame.identity,
                    encode_data_status(frame.identity, header, DataStatus::Success),
                )
                .await;
            }
        }

        self.route(frame).await
    }

    /// Routes a frame rebuilt by the shard engine. No data-status reply is
    /// sent; every piece was already acknowledged.
    pub async fn handle_reassembled(&self, frame: Frame) -> FrameDisposition {
        self.route(frame).await
    }

    /// Tells the sender of an unfragmented business frame that it arrived
    /// corrupted.
    async fn reject_corrupt(&self, raw: &[u8]) {
        let Ok((identity, header)) = peek_envelope(raw) else {
            return;
        };
        if header.fragmented {
            return;
        }
        if let Some(response) = header.packet_type.status_response() {
            let header = FrameHeader::new(header.param_count, false, response);
            self.send(
                identity,
                encode_data_status(identity, header, DataStatus::Failure),
            )
            .await;
        }
    }

    async fn route(&self, frame: Frame) -> FrameDisposition {
        let Some(device) = self.identities.lookup_device(&frame.identity) else {
            warn!("{}", WireSinkError::UnknownSensorIdentity(frame.identity));
            return FrameDisposition::UnknownSensor(frame.identity);
        };

        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.store
            .write_value(&device, RESOURCE_LAST_DATA_TIMESTAMP, TypedValue::I64(nanos));

        if frame.fragmented {
            return FrameDisposition::Fragment(frame);
        }

        if frame.packet_type.is_business() {
            self.decode_business(&device, &frame);
        } else if frame.packet_type.is_control() {
            self.dispatch_control(&device, &frame).await;
        } else {
            debug!(
                "Ignoring {:?} frame from {} ({})",
                frame.packet_type, device, frame.identity
            );
        }
        FrameDisposition::Handled
    }

    fn decode_business(&self, device: &str, frame: &Frame) {
        let list = decode_parameters(&frame.payload, usize::from(frame.param_count));
        if !list.errors.is_empty() {
            debug!(
                "{} parameter(s) skipped in frame from {}",
                list.errors.len(),
                device
            );
        }
        if list.is_empty() {
            return;
        }

        let mut values = ValueMap::new();
        for param in list.values {
            self.store
                .write_value(device, param.name, param.value.clone());
            values.insert(param.name.to_string(), param.value);
        }
        self.reporter
            .on_values_decoded(device, &self.source_tag, values);
    }

    async fn dispatch_control(&self, device: &str, frame: &Frame) {
        let message = match ControlMessage::from_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping control frame from {}: {}", device, e);
                return;
            }
        };

        let outcome = match self
            .dispatcher
            .dispatch(message.control_byte(), &message.body, frame)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Control response from {} not handled: {}", device, e);
                return;
            }
        };

        if let Some(values) = outcome.reported {
            if !values.is_empty() {
                self.reporter
                    .on_values_decoded(device, &self.source_tag, values);
            }
        }
        for (target, bytes) in outcome.outbound {
            self.send(target, bytes).await;
        }
    }

    async fn send(&self, target: SensorId, bytes: Vec<u8>) {
        log_frame("TX", &bytes);
        if let Err(e) = self.transport.send(target, bytes).await {
            warn!("Failed to send to {}: {}", target, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        ChannelReporter, ChannelTransport, MemoryValueStore, OutboundFrame, Report,
        StaticIdentityRegistry,
    };
    use crate::constants::RESOURCE_SENSOR_ID;
    use crate::frame::{encode_frame, PacketType};
    use crate::payload::ParameterEntry;
    use tokio::sync::mpsc::UnboundedReceiver;

    const ID: SensorId = SensorId::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    struct Harness {
        processor: FrameProcessor,
        store: MemoryValueStore,
        sent: UnboundedReceiver<OutboundFrame>,
        reports: UnboundedReceiver<Report>,
    }

    fn harness() -> Harness {
        let registry = StaticIdentityRegistry::new();
        registry.add(ID, "substation-7");
        let store = MemoryValueStore::new();
        let (transport, sent) = ChannelTransport::new();
        let (reporter, reports) = ChannelReporter::new();
        let collaborators = Collaborators {
            identities: Arc::new(registry),
            store: Arc::new(store.clone()),
            transport: Arc::new(transport),
            reporter: Arc::new(reporter),
        };
        Harness {
            processor: FrameProcessor::new(&collaborators, "AsyncReporting"),
            store,
            sent,
            reports,
        }
    }

    fn monitoring_frame(identity: SensorId) -> Vec<u8> {
        let mut payload = ParameterEntry::named("Temperature", 21.5f32.to_le_bytes().to_vec())
            .unwrap()
            .to_bytes();
        payload.extend(
            ParameterEntry::named("BatteryRemaining", 80u16.to_le_bytes().to_vec())
                .unwrap()
                .to_bytes(),
        );
        encode_frame(&Frame::new(
            identity,
            FrameHeader::new(2, false, PacketType::Monitoring),
            payload,
        ))
    }

    #[tokio::test]
    async fn test_monitoring_frame_is_acked_decoded_and_reported() {
        let mut h = harness();
        let disposition = h.processor.handle_raw(&monitoring_frame(ID)).await;
        assert!(matches!(disposition, FrameDisposition::Handled));

        let ack = h.sent.try_recv().unwrap();
        let ack_frame = decode_frame(&ack.bytes).unwrap();
        assert_eq!(ack_frame.packet_type, PacketType::MonitoringResponse);
        assert_eq!(ack_frame.param_count, 2);
        assert_eq!(ack_frame.payload, vec![0xFF]);

        let report = h.reports.try_recv().unwrap();
        assert_eq!(report.device, "substation-7");
        assert_eq!(report.source_tag, "AsyncReporting");
        assert_eq!(report.values.get("Temperature"), Some(&TypedValue::F32(21.5)));
        assert_eq!(report.values.get("BatteryRemaining"), Some(&TypedValue::U16(80)));

        assert!(matches!(
            h.store.read_value("substation-7", RESOURCE_LAST_DATA_TIMESTAMP),
            Some(TypedValue::I64(n)) if n > 0
        ));
    }

    #[tokio::test]
    async fn test_corrupt_monitoring_frame_gets_failure_status() {
        let mut h = harness();
        let mut raw = monitoring_frame(ID);
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        let disposition = h.processor.handle_raw(&raw).await;
        assert!(matches!(
            disposition,
            FrameDisposition::Rejected(WireSinkError::ChecksumMismatch { .. })
        ));
        let nack = decode_frame(&h.sent.try_recv().unwrap().bytes).unwrap();
        assert_eq!(nack.payload, vec![0x00]);
        assert!(h.reports.try_recv().is_err());
        assert!(!h.store.contains_device("substation-7"));
    }

    #[tokio::test]
    async fn test_short_frame_is_rejected_silently() {
        let mut h = harness();
        let disposition = h.processor.handle_raw(&[0xAA; 5]).await;
        assert!(matches!(
            disposition,
            FrameDisposition::Rejected(WireSinkError::FrameTooShort { len: 5, min: 9 })
        ));
        assert!(h.sent.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_sensor_is_acked_but_not_decoded() {
        let mut h = harness();
        let stranger = SensorId::new([1, 2, 3, 4, 5, 6]);
        let disposition = h.processor.handle_raw(&monitoring_frame(stranger)).await;
        assert!(matches!(disposition, FrameDisposition::UnknownSensor(id) if id == stranger));
        assert!(h.sent.try_recv().is_ok());
        assert!(h.reports.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fragment_is_forwarded_without_status_ack() {
        let mut h = harness();
        let raw = encode_frame(&Frame::new(
            ID,
            FrameHeader::new(1, true, PacketType::Monitoring),
            vec![0x01, 0x00, 0x00, 0x00],
        ));
        let disposition = h.processor.handle_raw(&raw).await;
        assert!(matches!(disposition, FrameDisposition::Fragment(f) if f.fragmented));
        assert!(h.sent.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reset_trigger_sends_reset_request() {
        let mut h = harness();
        h.store
            .write_value("substation-7", RESOURCE_SENSOR_ID, ID.to_hex().into());
        let raw = encode_frame(&Frame::new(
            ID,
            FrameHeader::new(0, false, PacketType::ControlResponse),
            vec![0x0E],
        ));
        h.processor.handle_raw(&raw).await;

        let sent = h.sent.try_recv().unwrap();
        assert_eq!(sent.target, ID);
        let request = decode_frame(&sent.bytes).unwrap();
        assert_eq!(request.packet_type, PacketType::ControlRequest);
        assert_eq!(request.payload, vec![0x0C]);
    }

    #[tokio::test]
    async fn test_reassembled_frame_is_not_status_acked() {
        let mut h = harness();
        let payload = ParameterEntry::named("Temperature", 3.0f32.to_le_bytes().to_vec())
            .unwrap()
            .to_bytes();
        let frame = Frame::new(ID, FrameHeader::new(1, false, PacketType::Alarm), payload);
        h.processor.handle_reassembled(frame).await;

        assert!(h.sent.try_recv().is_err());
        let report = h.reports.try_recv().unwrap();
        assert_eq!(report.values.get("Temperature"), Some(&TypedValue::F32(3.0)));
    }
}
