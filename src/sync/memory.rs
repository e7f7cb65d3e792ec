//! In-process transport: a hub that plays the canonical-server role.
//!
//! The hub keeps its own [`ElementStore`] fed by every broadcast, so
//! [`Transport::fetch_snapshot`] serves the same canonical state a relay
//! server would. Peers can be taken offline to simulate delivery gaps;
//! while offline, broadcasts fail and inbound deliveries are lost.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::op::Operation;
use crate::store::{ElementStore, StoreSnapshot};
use crate::sync::Transport;

struct HubInner {
    canonical: ElementStore,
    /// One FIFO inbox per connected peer; per-peer order is preserved
    inboxes: Vec<VecDeque<Operation>>,
    offline: Vec<bool>,
}

/// Shared hub all peers connect to
#[derive(Clone)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HubInner {
                canonical: ElementStore::new(),
                inboxes: Vec::new(),
                offline: Vec::new(),
            })),
        }
    }

    /// Register a new peer and hand back its transport handle
    pub fn connect(&self) -> MemoryTransport {
        let mut inner = self.inner.borrow_mut();
        inner.inboxes.push(VecDeque::new());
        inner.offline.push(false);
        MemoryTransport {
            hub: Rc::clone(&self.inner),
            slot: inner.inboxes.len() - 1,
        }
    }

    /// The hub's canonical state
    pub fn canonical_snapshot(&self) -> StoreSnapshot {
        self.inner.borrow().canonical.snapshot()
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One peer's handle onto a [`MemoryHub`]
pub struct MemoryTransport {
    hub: Rc<RefCell<HubInner>>,
    slot: usize,
}

impl MemoryTransport {
    /// Disconnect or reconnect this peer. Going offline discards anything
    /// queued for it; deliveries missed while offline are a real gap that
    /// only a resync closes.
    pub fn set_offline(&mut self, offline: bool) {
        let mut inner = self.hub.borrow_mut();
        inner.offline[self.slot] = offline;
        if offline {
            inner.inboxes[self.slot].clear();
        }
    }

    pub fn is_offline(&self) -> bool {
        self.hub.borrow().offline[self.slot]
    }
}

impl Transport for MemoryTransport {
    fn broadcast(&mut self, op: Operation) -> Result<()> {
        let mut inner = self.hub.borrow_mut();
        if inner.offline[self.slot] {
            bail!("peer is offline");
        }
        inner.canonical.apply(&op);
        let slot = self.slot;
        let offline = inner.offline.clone();
        for (i, inbox) in inner.inboxes.iter_mut().enumerate() {
            if i != slot && !offline[i] {
                inbox.push_back(op.clone());
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Option<Operation> {
        self.hub.borrow_mut().inboxes[self.slot].pop_front()
    }

    fn fetch_snapshot(&mut self) -> Result<StoreSnapshot> {
        let inner = self.hub.borrow();
        if inner.offline[self.slot] {
            bail!("peer is offline");
        }
        Ok(inner.canonical.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{AuthorId, ElementKind, Geometry, Style};
    use crate::geometry::Point;
    use crate::op::{OpId, OpKind};
    use uuid::Uuid;

    fn insert(author_bits: u128, seq: u64, clock: u64) -> Operation {
        let author = AuthorId(Uuid::from_u128(author_bits));
        Operation {
            op_id: OpId::new(),
            author,
            clock,
            element_id: crate::element::ElementId::new(author, seq),
            kind: OpKind::Insert {
                kind: ElementKind::Freehand,
                geometry: Geometry::Stroke {
                    points: vec![Point::new(0.0, 0.0)],
                },
                style: Style::default(),
            },
        }
    }

    #[test]
    fn broadcast_fans_out_to_everyone_else() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        let mut c = hub.connect();

        a.broadcast(insert(1, 1, 1)).unwrap();
        assert!(a.poll().is_none());
        assert!(b.poll().is_some());
        assert!(c.poll().is_some());
    }

    #[test]
    fn per_peer_delivery_order_is_preserved() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();

        let first = insert(1, 1, 1);
        let second = insert(1, 2, 2);
        a.broadcast(first.clone()).unwrap();
        a.broadcast(second.clone()).unwrap();
        assert_eq!(b.poll().unwrap().op_id, first.op_id);
        assert_eq!(b.poll().unwrap().op_id, second.op_id);
    }

    #[test]
    fn offline_peer_misses_deliveries_and_cannot_send() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();

        b.set_offline(true);
        a.broadcast(insert(1, 1, 1)).unwrap();
        assert!(b.broadcast(insert(2, 1, 1)).is_err());
        b.set_offline(false);
        assert!(b.poll().is_none());

        // The snapshot is the recovery path for the missed delivery
        let snap = b.fetch_snapshot().unwrap();
        assert_eq!(snap.elements.len(), 1);
    }
}
