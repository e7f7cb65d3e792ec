//! The element store - THE source of truth for one replica's canvas.
//!
//! Every mutation, local or remote, arrives as an [`Operation`] and is
//! applied idempotently: duplicate deliveries are absorbed, updates whose
//! insert has not arrived yet are buffered, and concurrent field writes are
//! resolved by last-writer-wins on `(clock, author)`. Tombstoned elements
//! are retained so operations referencing them converge instead of erroring.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::element::{DrawingElement, ElementId, Stamp};
use crate::op::{OpId, OpKind, Operation, UpdatePatch};

/// Default cap on buffered orphan updates
pub const DEFAULT_MAX_ORPHANS: usize = 256;
/// Default lifetime of a buffered orphan update before it is dropped
pub const DEFAULT_ORPHAN_TTL: Duration = Duration::from_secs(30);

/// Tuning for the orphan-update buffer
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub max_orphans: usize,
    pub orphan_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_orphans: DEFAULT_MAX_ORPHANS,
            orphan_ttl: DEFAULT_ORPHAN_TTL,
        }
    }
}

/// What applying an operation did to the store.
///
/// None of these are errors: retransmission and reordering are normal
/// delivery conditions and must be safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The operation took effect
    Applied,
    /// This exact operation was already applied
    DuplicateOp,
    /// Insert for an element id that already exists
    DuplicateInsert,
    /// Update for an element whose insert has not arrived yet; buffered
    Buffered,
    /// Update lost last-writer-wins against the current field value
    Stale,
    /// No effect (tombstone of an unknown or already-tombstoned element)
    NoOp,
    /// Payload shape does not fit the element's kind; dropped
    Rejected,
}

impl ApplyOutcome {
    pub fn took_effect(self) -> bool {
        self == ApplyOutcome::Applied
    }
}

/// Serializable full copy of a store's element set, stamps included.
///
/// Used for sync resync, persistence, and (live-filtered) undo history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub elements: Vec<DrawingElement>,
}

/// One replica's canonical mapping of element id to drawing element
#[derive(Debug)]
pub struct ElementStore {
    elements: HashMap<ElementId, DrawingElement>,
    /// Element ids sorted by `(created_at, id)` - the one insertion order
    /// that is identical on every replica regardless of delivery order
    order: Vec<ElementId>,
    /// Applied operation ids; never drained, so retransmission is safe
    applied: HashSet<OpId>,
    /// Updates waiting for their insert, oldest first
    orphans: VecDeque<(Operation, Instant)>,
    config: StoreConfig,
}

impl Default for ElementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            elements: HashMap::new(),
            order: Vec::new(),
            applied: HashSet::new(),
            orphans: VecDeque::new(),
            config,
        }
    }

    /// Build a store from a snapshot (load from disk, or sync resync)
    pub fn from_snapshot(snapshot: StoreSnapshot, config: StoreConfig) -> Self {
        let mut store = Self::with_config(config);
        store.restore(snapshot);
        store
    }

    /// Apply an operation, local or remote. Never fails; every delivery
    /// condition maps to an [`ApplyOutcome`].
    pub fn apply(&mut self, op: &Operation) -> ApplyOutcome {
        self.prune_orphans();

        if self.applied.contains(&op.op_id) {
            debug!(op_id = %op.op_id, "duplicate operation absorbed");
            return ApplyOutcome::DuplicateOp;
        }

        match &op.kind {
            OpKind::Insert {
                kind,
                geometry,
                style,
            } => {
                if self.elements.contains_key(&op.element_id) {
                    self.applied.insert(op.op_id);
                    debug!(element = %op.element_id, "duplicate insert absorbed");
                    return ApplyOutcome::DuplicateInsert;
                }
                if !geometry.matches(*kind) {
                    self.applied.insert(op.op_id);
                    warn!(element = %op.element_id, kind = kind.name(), "insert payload does not fit kind, dropped");
                    return ApplyOutcome::Rejected;
                }

                let element = DrawingElement::new(
                    op.element_id,
                    *kind,
                    geometry.clone(),
                    *style,
                    op.stamp(),
                );
                let pos = self.order_position(element.created_at, element.id);
                self.elements.insert(op.element_id, element);
                self.order.insert(pos, op.element_id);
                self.applied.insert(op.op_id);

                // Replay any updates that arrived ahead of this insert
                let ready: Vec<Operation> = {
                    let mut ready = Vec::new();
                    self.orphans.retain(|(buffered, _)| {
                        if buffered.element_id == op.element_id {
                            ready.push(buffered.clone());
                            false
                        } else {
                            true
                        }
                    });
                    ready
                };
                for buffered in &ready {
                    let outcome = self.apply(buffered);
                    debug!(op_id = %buffered.op_id, element = %op.element_id, ?outcome, "replayed buffered update");
                }

                ApplyOutcome::Applied
            }
            OpKind::Update { patch } => {
                let stamp = op.stamp();
                let Some(element) = self.elements.get_mut(&op.element_id) else {
                    return self.buffer_orphan(op);
                };
                let outcome = match patch {
                    UpdatePatch::Geometry(geometry) => {
                        if !geometry.matches(element.kind) {
                            warn!(element = %op.element_id, "geometry patch does not fit kind, dropped");
                            ApplyOutcome::Rejected
                        } else if stamp > element.geometry_stamp {
                            element.geometry = geometry.clone();
                            element.geometry_stamp = stamp;
                            ApplyOutcome::Applied
                        } else {
                            ApplyOutcome::Stale
                        }
                    }
                    UpdatePatch::Style(style) => {
                        if stamp > element.style_stamp {
                            element.style = *style;
                            element.style_stamp = stamp;
                            ApplyOutcome::Applied
                        } else {
                            ApplyOutcome::Stale
                        }
                    }
                };
                self.applied.insert(op.op_id);
                outcome
            }
            OpKind::Tombstone => {
                self.applied.insert(op.op_id);
                match self.elements.get_mut(&op.element_id) {
                    None => ApplyOutcome::NoOp,
                    Some(element) if element.deleted => ApplyOutcome::NoOp,
                    Some(element) => {
                        element.deleted = true;
                        element.deleted_stamp = element.deleted_stamp.max(op.stamp());
                        ApplyOutcome::Applied
                    }
                }
            }
        }
    }

    fn buffer_orphan(&mut self, op: &Operation) -> ApplyOutcome {
        while self.orphans.len() >= self.config.max_orphans {
            if let Some((dropped, _)) = self.orphans.pop_front() {
                warn!(op_id = %dropped.op_id, element = %dropped.element_id, "orphan buffer full, dropped oldest update");
            }
        }
        debug!(op_id = %op.op_id, element = %op.element_id, "update for unknown element buffered");
        self.orphans.push_back((op.clone(), Instant::now()));
        ApplyOutcome::Buffered
    }

    /// Drop buffered updates whose insert never arrived within the TTL
    pub fn prune_orphans(&mut self) {
        let ttl = self.config.orphan_ttl;
        let now = Instant::now();
        let before = self.orphans.len();
        self.orphans
            .retain(|(_, buffered_at)| now.duration_since(*buffered_at) < ttl);
        let dropped = before - self.orphans.len();
        if dropped > 0 {
            warn!(dropped, "expired orphan updates dropped");
        }
    }

    /// Position in `order` where an element with this creation key belongs
    fn order_position(&self, created_at: Stamp, id: ElementId) -> usize {
        let key = (created_at, id);
        self.order
            .binary_search_by(|other| {
                let e = &self.elements[other];
                (e.created_at, e.id).cmp(&key)
            })
            .unwrap_or_else(|pos| pos)
    }

    /// Non-tombstoned elements in insertion order, lazily
    pub fn list_visible(&self) -> impl DoubleEndedIterator<Item = &DrawingElement> {
        self.order
            .iter()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| !e.deleted)
    }

    pub fn get(&self, id: ElementId) -> Option<&DrawingElement> {
        self.elements.get(&id)
    }

    /// All elements including tombstones, in insertion order
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn visible_count(&self) -> usize {
        self.list_visible().count()
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// Topmost visible element at a canvas point, if any
    pub fn element_at(&self, p: crate::geometry::Point, tolerance: f32) -> Option<ElementId> {
        self.list_visible()
            .filter(|e| e.hit_test(p, tolerance))
            .map(|e| e.id)
            .next_back()
    }

    /// Full snapshot, tombstones and stamps included (sync, persistence)
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            elements: self
                .order
                .iter()
                .filter_map(|id| self.elements.get(id))
                .cloned()
                .collect(),
        }
    }

    /// Snapshot of the live (non-tombstoned) sequence only (undo history)
    pub fn visible_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            elements: self.list_visible().cloned().collect(),
        }
    }

    /// Replace this store's contents wholesale with a canonical snapshot
    /// (resync or load from disk). The applied-op set and orphan buffer are
    /// reset; that is sound only because the snapshot is full: redelivery of
    /// operations already folded into it stays idempotent by value
    /// (re-inserts are absorbed, re-updates lose LWW).
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.elements.clear();
        self.applied.clear();
        self.orphans.clear();
        for element in snapshot.elements {
            self.elements.insert(element.id, element);
        }
        self.rebuild_order();
    }

    /// Rewind the live sequence to a prior local snapshot (undo/redo).
    ///
    /// Unlike [`ElementStore::restore`], the idempotence bookkeeping
    /// survives: the applied-op set and the orphan buffer are kept, so
    /// redelivered operations stay absorbed after the rewind. Tombstone
    /// records absent from the snapshot are retained; elements the snapshot
    /// holds live are restored as given (this is how undoing a local delete
    /// brings the element back).
    pub fn restore_visible(&mut self, snapshot: StoreSnapshot) {
        self.elements.retain(|_, element| element.deleted);
        for element in snapshot.elements {
            self.elements.insert(element.id, element);
        }
        self.rebuild_order();
    }

    fn rebuild_order(&mut self) {
        let mut ids: Vec<(Stamp, ElementId)> = self
            .elements
            .values()
            .map(|element| (element.created_at, element.id))
            .collect();
        ids.sort();
        self.order = ids.into_iter().map(|(_, id)| id).collect();
    }
}
