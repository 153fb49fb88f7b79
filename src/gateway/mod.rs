//! # Gateway Pipeline
//!
//! Two long-lived tasks connected by a bounded queue:
//!
//! ```text
//! submit(raw) -> [inbound queue] -> intake task --(fragments)--> [shard queue] -> shard task
//!                                       |                                            |
//!                                  FrameProcessor  <------- reassembled frames ------+
//! ```
//!
//! The intake task never waits for shard queue space, so a slow reassembly
//! cannot hold up fresh frames. A piece that finds the queue full is dropped
//! unacknowledged and the sensor retransmits it.

pub mod command;
pub mod pipeline;

pub use command::{CommandIssuer, DeviceCommand};
pub use pipeline::{FrameDisposition, FrameProcessor};

use crate::collaborators::{IdentityRegistry, Reporter, Transport, ValueStore};
use crate::config::GatewayConfig;
use crate::constants::RESOURCE_SENSOR_ID;
use crate::error::WireSinkError;
use crate::frame::Frame;
use crate::payload::TypedValue;
use crate::shard::ShardEngine;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// The external services the gateway runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub identities: Arc<dyn IdentityRegistry>,
    pub store: Arc<dyn ValueStore>,
    pub transport: Arc<dyn Transport>,
    pub reporter: Arc<dyn Reporter>,
}

pub struct Gateway;

impl Gateway {
    /// Validates `config`, seeds the value store with each configured
    /// device's sensor identity and starts the pipeline tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: &GatewayConfig,
        collaborators: Collaborators,
    ) -> Result<GatewayHandle, WireSinkError> {
        config.validate()?;
        for mapping in &config.devices {
            let identity = mapping.sensor_id()?;
            collaborators.store.write_value(
                &mapping.name,
                RESOURCE_SENSOR_ID,
                TypedValue::Text(identity.to_hex()),
            );
        }

        let processor = FrameProcessor::new(&collaborators, config.source_tag.clone());
        let engine = ShardEngine::new(
            collaborators.transport.clone(),
            config.reassembly_timeout(),
        );
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_depth);
        let (shard_tx, shard_rx) = mpsc::channel(config.shard_queue_depth);

        let intake = tokio::spawn(run_intake(processor.clone(), inbound_rx, shard_tx));
        let shard = tokio::spawn(run_shards(processor, engine.clone(), shard_rx));
        info!(
            "Gateway started: {} device(s), reassembly timeout {}s",
            config.devices.len(),
            config.reassembly_timeout_secs
        );

        Ok(GatewayHandle {
            inbound: Some(inbound_tx),
            intake: Some(intake),
            shard: Some(shard),
            engine,
        })
    }
}

async fn run_intake(
    processor: FrameProcessor,
    mut inbound: mpsc::Receiver<Vec<u8>>,
    shards: mpsc::Sender<Frame>,
) {
    while let Some(raw) = inbound.recv().await {
        let FrameDisposition::Fragment(frame) = processor.handle_raw(&raw).await else {
            continue;
        };
        match shards.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                warn!("Shard queue full, dropping piece from {}", frame.identity);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Shard queue closed, stopping intake");
                break;
            }
        }
    }
    debug!("Intake task finished");
}

async fn run_shards(
    processor: FrameProcessor,
    engine: ShardEngine,
    mut shards: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = shards.recv().await {
        match engine.submit(frame).await {
            Ok(Some(complete)) => {
                processor.handle_reassembled(complete).await;
            }
            Ok(None) => {}
            Err(e) => warn!("Shard engine rejected piece: {}", e),
        }
    }
    debug!("Shard task finished");
}

/// Handle to a running gateway.
pub struct GatewayHandle {
    inbound: Option<mpsc::Sender<Vec<u8>>>,
    intake: Option<JoinHandle<()>>,
    shard: Option<JoinHandle<()>>,
    engine: ShardEngine,
}

impl GatewayHandle {
    /// Queues one raw frame, waiting for space in the inbound queue.
    pub async fn submit(&self, raw: Vec<u8>) -> Result<(), WireSinkError> {
        let inbound = self.inbound.as_ref().ok_or(WireSinkError::ShutDown)?;
        inbound.send(raw).await.map_err(|_| WireSinkError::ShutDown)
    }

    pub fn engine(&self) -> &ShardEngine {
        &self.engine
    }

    /// Closes intake, lets both tasks drain their queues, then shuts the
    /// shard engine down.
    pub async fn shutdown(mut self) {
        self.inbound.take();
        for task in [self.intake.take(), self.shard.take()].into_iter().flatten() {
            if let Err(e) = task.await {
                warn!("Gateway task ended abnormally: {}", e);
            }
        }
        self.engine.shutdown().await;
        info!("Gateway stopped");
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        for task in [self.intake.take(), self.shard.take()].into_iter().flatten() {
            task.abort();
        }
    }
}
