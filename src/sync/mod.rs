//! Synchronization layer: broadcast local operations, apply remote ones.
//!
//! The engine owns an explicitly constructed transport handle (no global
//! client), so tests can substitute an in-memory channel. The transport is
//! expected to provide at-least-once, per-author-ordered delivery plus an
//! on-demand snapshot fetch; everything else (duplicates, reordering across
//! authors, gaps) is absorbed by the store's idempotent operation contract.

pub mod memory;

pub use memory::{MemoryHub, MemoryTransport};

use std::collections::VecDeque;

use anyhow::Result;
use tracing::{info, warn};

use crate::board::Whiteboard;
use crate::op::{OpId, Operation};
use crate::store::StoreSnapshot;

/// Delivery channel collaborator. Wire encoding is the transport's concern;
/// the engine only requires operations to be serializable flat records.
pub trait Transport {
    /// Send an operation to all other participants
    fn broadcast(&mut self, op: Operation) -> Result<()>;

    /// Non-blocking poll for the next inbound operation
    fn poll(&mut self) -> Option<Operation>;

    /// Fetch the current canonical store snapshot (reconnect path)
    fn fetch_snapshot(&mut self) -> Result<StoreSnapshot>;
}

/// Drives one participant's replica against a transport
pub struct SyncSession<T: Transport> {
    transport: T,
    /// Operations the transport has not confirmed; replayed on resync so
    /// in-flight local edits are never silently lost
    pending: VecDeque<Operation>,
}

impl<T: Transport> SyncSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: VecDeque::new(),
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Broadcast everything the board has produced since the last flush.
    /// A successful broadcast confirms delivery; a failed operation stays
    /// pending and a later [`SyncSession::resync`] recovers the gap.
    pub fn flush(&mut self, board: &mut Whiteboard) -> usize {
        let ops = board.take_outbound();
        let count = ops.len();
        for op in ops {
            if let Err(err) = self.transport.broadcast(op.clone()) {
                warn!(%err, "broadcast failed, operation stays pending until resync");
                self.pending.push_back(op);
            }
        }
        count
    }

    /// Apply every inbound operation currently available; returns how many
    pub fn pump(&mut self, board: &mut Whiteboard) -> usize {
        let mut count = 0;
        while let Some(op) = self.transport.poll() {
            board.apply_remote(&op);
            count += 1;
        }
        count
    }

    /// Explicit delivery confirmation, for transports that acknowledge
    /// asynchronously rather than through the `broadcast` return value
    pub fn ack(&mut self, op_id: OpId) {
        self.pending.retain(|op| op.op_id != op_id);
    }

    /// Recover from a delivery gap: replace the local store wholesale with
    /// the canonical snapshot, then replay pending local operations on top
    /// and rebroadcast them.
    pub fn resync(&mut self, board: &mut Whiteboard) -> Result<()> {
        let snapshot = self.transport.fetch_snapshot()?;
        info!(
            elements = snapshot.elements.len(),
            pending = self.pending.len(),
            "resynchronizing from canonical snapshot"
        );
        board.restore_canonical(snapshot);

        let pending: Vec<Operation> = self.pending.drain(..).collect();
        for op in pending {
            board.apply_remote(&op);
            if let Err(err) = self.transport.broadcast(op.clone()) {
                warn!(%err, "rebroadcast failed during resync");
                self.pending.push_back(op);
            }
        }
        Ok(())
    }
}
