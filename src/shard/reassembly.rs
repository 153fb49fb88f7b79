//! # Reassembly Table
//!
//! Per-sensor reassembly state, keyed by sensor identity. The table is plain
//! synchronous state: the caller supplies the current time and owns the
//! timers, so every transition can be driven and tested without a runtime.
//!
//! A reassembly moves `Absent -> Accumulating -> (Complete | Evicted)`:
//!
//! * piece 0 of a shard sequence opens it, or supersedes a reassembly for a
//!   different shard sequence;
//! * the expected piece is appended and any buffered successors are merged;
//! * a lower piece is a duplicate, a higher piece is buffered;
//! * once the end piece is known and every piece up to it has been appended,
//!   the payload is handed back as a complete frame;
//! * a reassembly that makes no progress before its deadline is evicted.

use super::{ShardAck, ShardPiece};
use crate::error::WireSinkError;
use crate::frame::{Frame, FrameHeader, PacketType, SensorId};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// What the owner of the table must do with the sensor's eviction timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Start a timer for this generation, replacing any running one.
    Start { generation: u64, deadline: Instant },
    /// Stop the running timer.
    Cancel,
    /// Leave the timer alone.
    Keep,
}

/// Result of processing one frame.
#[derive(Debug)]
pub struct PieceOutcome {
    pub ack: ShardAck,
    /// A whole frame ready for parameter decoding.
    pub completed: Option<Frame>,
    pub timer: TimerAction,
}

/// Result of a timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Evicted; send this negative acknowledgement.
    Evicted(ShardAck),
    /// Progress moved the deadline; sleep again.
    Pending(Instant),
    /// The reassembly this timer was armed for no longer exists.
    Gone,
}

#[derive(Debug)]
struct Reassembly {
    generation: u64,
    shard_sequence: u8,
    expected: u8,
    accumulated: Vec<u8>,
    out_of_order: BTreeMap<u8, Vec<u8>>,
    final_piece: Option<u8>,
    last_piece: u8,
    param_count: u8,
    packet_type: PacketType,
    deadline: Instant,
}

impl Reassembly {
    fn is_complete(&self) -> bool {
        self.final_piece.is_some_and(|last| self.expected > last)
    }

    /// Appends the expected piece and merges every buffered successor.
    fn append(&mut self, data: &[u8]) {
        self.accumulated.extend_from_slice(data);
        self.expected += 1;
        while let Some(next) = self.out_of_order.remove(&self.expected) {
            self.accumulated.extend_from_slice(&next);
            self.expected += 1;
        }
    }
}

/// Process-wide reassembly state for every sensor.
#[derive(Debug)]
pub struct ReassemblyTable {
    entries: HashMap<SensorId, Reassembly>,
    timeout: Duration,
    next_generation: u64,
}

impl ReassemblyTable {
    pub fn new(timeout: Duration) -> Self {
        ReassemblyTable {
            entries: HashMap::new(),
            timeout,
            next_generation: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of reassemblies in progress.
    pub fn active(&self) -> usize {
        self.entries.len()
    }

    pub fn is_active(&self, identity: &SensorId) -> bool {
        self.entries.contains_key(identity)
    }

    /// Processes one frame.
    ///
    /// Unfragmented frames are acknowledged and returned as they are. For
    /// fragmented frames the payload is parsed as a piece and applied to the
    /// sensor's reassembly.
    pub fn process(&mut self, frame: &Frame, now: Instant) -> PieceOutcome {
        if !frame.fragmented {
            return PieceOutcome {
                ack: ShardAck::success(0, 0),
                completed: Some(frame.clone()),
                timer: TimerAction::Keep,
            };
        }

        let piece = match ShardPiece::parse(&frame.payload) {
            Ok(piece) => piece,
            Err(e) => {
                let (sseq, pseq) = ShardPiece::peek_sequence(&frame.payload);
                warn!("Rejecting piece from {}: {}", frame.identity, e);
                return nack(sseq, pseq);
            }
        };

        let identity = frame.identity;
        let superseded = match self.entries.get(&identity) {
            None => false,
            Some(entry) if entry.shard_sequence == piece.shard_sequence => {
                return self.continue_reassembly(identity, piece, now);
            }
            Some(entry) => {
                if !piece.is_start() {
                    warn!(
                        "Piece {} of shard {} from {} does not match active shard {}",
                        piece.piece_sequence, piece.shard_sequence, identity, entry.shard_sequence
                    );
                    return nack(piece.shard_sequence, piece.piece_sequence);
                }
                true
            }
        };

        if !piece.is_start() {
            warn!(
                "Piece {} of shard {} from {} has no reassembly to join",
                piece.piece_sequence, piece.shard_sequence, identity
            );
            return nack(piece.shard_sequence, piece.piece_sequence);
        }
        if superseded {
            debug!(
                "Shard {} from {} supersedes the active reassembly",
                piece.shard_sequence, identity
            );
        }
        self.start_reassembly(frame, piece, now)
    }

    fn start_reassembly(&mut self, frame: &Frame, piece: ShardPiece, now: Instant) -> PieceOutcome {
        self.next_generation += 1;
        let generation = self.next_generation;
        let deadline = now + self.timeout;
        let header = frame.header();

        let mut entry = Reassembly {
            generation,
            shard_sequence: piece.shard_sequence,
            expected: 0,
            accumulated: Vec::new(),
            out_of_order: BTreeMap::new(),
            final_piece: piece.end.then_some(piece.piece_sequence),
            last_piece: piece.piece_sequence,
            param_count: header.param_count,
            packet_type: header.packet_type,
            deadline,
        };
        entry.append(&piece.data);
        debug!("Started shard {} for {}", piece.shard_sequence, frame.identity);

        let ack = ShardAck::success(piece.shard_sequence, piece.piece_sequence);
        if entry.is_complete() {
            self.entries.remove(&frame.identity);
            return PieceOutcome {
                ack,
                completed: Some(finish(frame.identity, entry)),
                timer: TimerAction::Cancel,
            };
        }
        self.entries.insert(frame.identity, entry);
        PieceOutcome {
            ack,
            completed: None,
            timer: TimerAction::Start {
                generation,
                deadline,
            },
        }
    }

    fn continue_reassembly(
        &mut self,
        identity: SensorId,
        piece: ShardPiece,
        now: Instant,
    ) -> PieceOutcome {
        let Some(entry) = self.entries.get_mut(&identity) else {
            return nack(piece.shard_sequence, piece.piece_sequence);
        };
        let sseq = entry.shard_sequence;
        let pseq = piece.piece_sequence;

        if entry.final_piece.is_some_and(|last| pseq > last) {
            warn!(
                "Piece {} of shard {} from {} lies past the end piece",
                pseq, sseq, identity
            );
            return nack(sseq, pseq);
        }

        entry.last_piece = pseq;
        if pseq < entry.expected {
            debug!("Duplicate piece {} of shard {} from {}", pseq, sseq, identity);
        } else if pseq > entry.expected {
            if entry.out_of_order.insert(pseq, piece.data).is_none() {
                entry.deadline = now + self.timeout;
            }
            if piece.end {
                entry.final_piece = Some(pseq);
            }
        } else {
            entry.append(&piece.data);
            if piece.end {
                entry.final_piece = Some(pseq);
            }
            entry.deadline = now + self.timeout;
        }

        let ack = ShardAck::success(sseq, pseq);
        if !entry.is_complete() {
            return PieceOutcome {
                ack,
                completed: None,
                timer: TimerAction::Keep,
            };
        }

        match self.entries.remove(&identity) {
            Some(entry) => PieceOutcome {
                ack,
                completed: Some(finish(identity, entry)),
                timer: TimerAction::Cancel,
            },
            None => nack(sseq, pseq),
        }
    }

    /// Called when the timer armed for `generation` fires.
    pub fn expire(&mut self, identity: &SensorId, generation: u64, now: Instant) -> Expiry {
        match self.entries.get(identity) {
            Some(entry) if entry.generation == generation => {
                if now < entry.deadline {
                    return Expiry::Pending(entry.deadline);
                }
            }
            _ => return Expiry::Gone,
        }
        match self.entries.remove(identity) {
            Some(entry) => {
                warn!("{}", WireSinkError::ReassemblyTimeout(*identity));
                Expiry::Evicted(ShardAck::failure(entry.shard_sequence, entry.last_piece))
            }
            None => Expiry::Gone,
        }
    }

    /// Discards every reassembly, returning a negative acknowledgement for
    /// the last piece seen of each.
    pub fn drain(&mut self) -> Vec<(SensorId, ShardAck)> {
        self.entries
            .drain()
            .map(|(identity, entry)| {
                (
                    identity,
                    ShardAck::failure(entry.shard_sequence, entry.last_piece),
                )
            })
            .collect()
    }
}

fn nack(shard_sequence: u8, piece_sequence: u8) -> PieceOutcome {
    PieceOutcome {
        ack: ShardAck::failure(shard_sequence, piece_sequence),
        completed: None,
        timer: TimerAction::Keep,
    }
}

fn finish(identity: SensorId, entry: Reassembly) -> Frame {
    debug!(
        "Shard {} from {} complete: {} bytes",
        entry.shard_sequence,
        identity,
        entry.accumulated.len()
    );
    Frame::new(
        identity,
        FrameHeader::new(entry.param_count, false, entry.packet_type),
        entry.accumulated,
    )
}
