//! # Shard Engine
//!
//! Async wrapper around [`ReassemblyTable`]. One table guarded by one lock
//! serves every sensor; the lock is held only while a piece is applied and
//! the sensor's timer is adjusted. Acknowledgements go out through the
//! [`Transport`] after the lock is released.
//!
//! Each active reassembly owns one eviction timer task. A timer carries the
//! generation it was armed for, so a timer that fires after its reassembly
//! completed or was superseded finds nothing to evict.

use super::reassembly::{Expiry, ReassemblyTable, TimerAction};
use super::{ShardAck, ShardPiece};
use crate::collaborators::Transport;
use crate::error::WireSinkError;
use crate::frame::{Frame, SensorId};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Reassembles fragmented frames and acknowledges every piece.
#[derive(Clone)]
pub struct ShardEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    state: Mutex<EngineState>,
    transport: Arc<dyn Transport>,
}

struct EngineState {
    table: ReassemblyTable,
    timers: HashMap<SensorId, JoinHandle<()>>,
    shut_down: bool,
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn send_ack(&self, identity: SensorId, ack: ShardAck) {
        debug!(
            "Shard ack to {}: {} shard {} piece {}",
            identity,
            if ack.success { "continue" } else { "restart" },
            ack.shard_sequence,
            ack.piece_sequence
        );
        if let Err(e) = self.transport.send(identity, ack.encode(identity)).await {
            warn!("Failed to send shard ack to {}: {}", identity, e);
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in state.timers.drain() {
            handle.abort();
        }
    }
}

impl ShardEngine {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        ShardEngine {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    table: ReassemblyTable::new(timeout),
                    timers: HashMap::new(),
                    shut_down: false,
                }),
                transport,
            }),
        }
    }

    /// Applies one frame and acknowledges it.
    ///
    /// Returns the reassembled frame once its last piece arrives, or the
    /// frame itself if it was never fragmented. Unfragmented frames are
    /// acknowledged by the caller's data-status reply, not here.
    pub async fn submit(&self, frame: Frame) -> Result<Option<Frame>, WireSinkError> {
        let identity = frame.identity;
        let outcome = {
            let mut state = self.inner.lock();
            if state.shut_down {
                None
            } else {
                let outcome = state.table.process(&frame, Instant::now());
                match outcome.timer {
                    TimerAction::Start {
                        generation,
                        deadline,
                    } => {
                        let timer = tokio::spawn(run_timer(
                            Arc::downgrade(&self.inner),
                            identity,
                            generation,
                            deadline,
                        ));
                        if let Some(old) = state.timers.insert(identity, timer) {
                            old.abort();
                        }
                    }
                    TimerAction::Cancel => {
                        if let Some(old) = state.timers.remove(&identity) {
                            old.abort();
                        }
                    }
                    TimerAction::Keep => {}
                }
                Some(outcome)
            }
        };

        let Some(outcome) = outcome else {
            let (sseq, pseq) = ShardPiece::peek_sequence(&frame.payload);
            self.inner
                .send_ack(identity, ShardAck::failure(sseq, pseq))
                .await;
            return Err(WireSinkError::ShutDown);
        };

        if frame.fragmented {
            self.inner.send_ack(identity, outcome.ack).await;
        }
        Ok(outcome.completed)
    }

    /// Number of reassemblies in progress.
    pub fn active_reassemblies(&self) -> usize {
        self.inner.lock().table.active()
    }

    /// Stops every timer and rejects every reassembly in flight.
    ///
    /// Later calls to [`ShardEngine::submit`] fail with
    /// [`WireSinkError::ShutDown`].
    pub async fn shutdown(&self) {
        let rejected = {
            let mut state = self.inner.lock();
            state.shut_down = true;
            for (_, handle) in state.timers.drain() {
                handle.abort();
            }
            state.table.drain()
        };
        info!(
            "Shard engine shut down, {} reassemblies rejected",
            rejected.len()
        );
        for (identity, ack) in rejected {
            self.inner.send_ack(identity, ack).await;
        }
    }
}

async fn run_timer(inner: Weak<EngineInner>, identity: SensorId, generation: u64, deadline: Instant) {
    let mut deadline = deadline;
    loop {
        sleep_until(deadline).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let expiry = {
            let mut state = inner.lock();
            let expiry = state.table.expire(&identity, generation, Instant::now());
            if matches!(expiry, Expiry::Evicted(_)) {
                state.timers.remove(&identity);
            }
            expiry
        };
        match expiry {
            Expiry::Pending(next) => deadline = next,
            Expiry::Evicted(ack) => {
                inner.send_ack(identity, ack).await;
                return;
            }
            Expiry::Gone => return,
        }
    }
}
