//! The whiteboard facade: one participant's engine instance.
//!
//! Owns the viewport, element store, drawing session, undo history, and
//! Lamport clock, and unifies the two mutation paths: pointer input becomes
//! operations that are applied locally and queued for broadcast; inbound
//! remote operations go through the same idempotent store contract. All of
//! this runs on one logical event loop; nothing here blocks except the text
//! prompt, which is an intentional pause.

use tracing::{debug, warn};

use crate::element::{AuthorId, ElementId, Style};
use crate::geometry::{Point, Viewport};
use crate::op::{LamportClock, Operation};
use crate::render::{self, DrawCommand};
use crate::session::{DrawingSession, EditPolicy, SessionError, TextPrompt, Tool};
use crate::store::{ApplyOutcome, ElementStore, StoreConfig, StoreSnapshot};
use crate::undo::UndoManager;

/// Hit-test tolerance for the select tool, in canvas units
pub const HIT_TOLERANCE: f32 = 4.0;

/// One participant's whiteboard engine
pub struct Whiteboard {
    /// Purely local; never synchronized
    pub viewport: Viewport,
    store: ElementStore,
    session: DrawingSession,
    undo: UndoManager,
    clock: LamportClock,
    /// Locally produced operations awaiting pickup by the sync layer
    outbound: Vec<Operation>,
    /// Visible state captured at gesture start, committed to history when
    /// the gesture completes
    gesture_base: Option<StoreSnapshot>,
    selected: Option<ElementId>,
}

impl Whiteboard {
    pub fn new(author: AuthorId, policy: &dyn EditPolicy) -> Self {
        Self::with_config(author, policy, StoreConfig::default())
    }

    pub fn with_config(author: AuthorId, policy: &dyn EditPolicy, config: StoreConfig) -> Self {
        Self {
            viewport: Viewport::new(),
            store: ElementStore::with_config(config),
            session: DrawingSession::new(author, policy),
            undo: UndoManager::default(),
            clock: LamportClock::new(),
            outbound: Vec::new(),
            gesture_base: None,
            selected: None,
        }
    }

    pub fn author(&self) -> AuthorId {
        self.session.author()
    }

    pub fn can_edit(&self) -> bool {
        self.session.can_edit()
    }

    pub fn tool(&self) -> Tool {
        self.session.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.session.set_tool(tool);
    }

    pub fn style(&self) -> Style {
        self.session.style()
    }

    pub fn set_style(&mut self, style: Style) {
        self.session.set_style(style);
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Record the pre-gesture state as one undo history entry
    fn commit_history(&mut self, base: &StoreSnapshot) {
        if let Err(err) = self.undo.save_state(base) {
            warn!(%err, "history snapshot not recorded, gesture will not be undoable");
        }
    }

    /// Apply locally and queue for broadcast
    fn emit(&mut self, ops: Vec<Operation>) {
        for op in ops {
            self.store.apply(&op);
            self.outbound.push(op);
        }
    }

    /// Pointer-down in screen space
    pub fn pointer_down(
        &mut self,
        screen: Point,
        prompt: &mut dyn TextPrompt,
    ) -> Result<(), SessionError> {
        let pos = self.viewport.screen_to_canvas(screen);

        if self.session.tool() == Tool::Select {
            self.selected = self.store.element_at(pos, HIT_TOLERANCE);
            return Ok(());
        }

        let base = self.store.visible_snapshot();
        let ops = self.session.pointer_down(pos, &mut self.clock, prompt)?;
        if ops.is_empty() {
            // Cancelled text prompt, or spurious down
            return Ok(());
        }

        let text_gesture = self.session.tool() == Tool::Text;
        self.emit(ops);
        if text_gesture {
            // Text completes at pointer-down: one insert, one history entry
            self.commit_history(&base);
        } else {
            self.gesture_base = Some(base);
        }
        Ok(())
    }

    /// Pointer-move in screen space
    pub fn pointer_move(&mut self, screen: Point) {
        let pos = self.viewport.screen_to_canvas(screen);
        let ops = self.session.pointer_move(pos, &mut self.clock);
        self.emit(ops);
    }

    /// Pointer-up finalizes the in-progress gesture and commits one history
    /// snapshot for it
    pub fn pointer_up(&mut self) {
        let was_active = self.session.in_gesture();
        let ops = self.session.pointer_up(&mut self.clock);
        self.emit(ops);
        if was_active {
            if let Some(base) = self.gesture_base.take() {
                self.commit_history(&base);
            }
        }
    }

    /// Pointer leaving the canvas ends the gesture like pointer-up
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Grant or revoke edit capability. Revocation mid-gesture abandons the
    /// gesture; its element is reverted on every replica.
    pub fn set_can_edit(&mut self, can_edit: bool) {
        let ops = self.session.set_can_edit(can_edit, &mut self.clock);
        if !ops.is_empty() {
            self.gesture_base = None;
        }
        self.emit(ops);
    }

    /// Tombstone the selected element
    pub fn delete_selected(&mut self) -> Result<(), SessionError> {
        let Some(id) = self.selected.take() else {
            return Ok(());
        };
        let base = self.store.visible_snapshot();
        let op = self.session.delete_element(id, &mut self.clock)?;
        self.emit(vec![op]);
        self.commit_history(&base);
        Ok(())
    }

    /// Tombstone every visible element (the "clear whiteboard" action)
    pub fn clear_canvas(&mut self) -> Result<(), SessionError> {
        let ids: Vec<ElementId> = self.store.list_visible().map(|e| e.id).collect();
        if ids.is_empty() {
            return Ok(());
        }
        let base = self.store.visible_snapshot();
        let mut ops = Vec::with_capacity(ids.len());
        for id in ids {
            ops.push(self.session.delete_element(id, &mut self.clock)?);
        }
        self.emit(ops);
        self.selected = None;
        self.commit_history(&base);
        Ok(())
    }

    /// Local-view rewind; does not retract broadcast operations, and keeps
    /// the store's idempotence bookkeeping so redelivered operations stay
    /// absorbed. Returns whether anything was undone (empty history is a
    /// no-op).
    pub fn undo(&mut self) -> bool {
        let current = self.store.visible_snapshot();
        match self.undo.undo(&current) {
            Some(snapshot) => {
                self.store.restore_visible(snapshot);
                self.selected = None;
                true
            }
            None => false,
        }
    }

    /// Inverse of [`Whiteboard::undo`], symmetric stack discipline
    pub fn redo(&mut self) -> bool {
        let current = self.store.visible_snapshot();
        match self.undo.redo(&current) {
            Some(snapshot) => {
                self.store.restore_visible(snapshot);
                self.selected = None;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    // --- Sync-facing surface ---

    /// Drain locally produced operations for broadcast
    pub fn take_outbound(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.outbound)
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Apply an inbound remote operation. The clock advances to at least the
    /// operation's value before application.
    pub fn apply_remote(&mut self, op: &Operation) -> ApplyOutcome {
        self.clock.observe(op.clock);
        let outcome = self.store.apply(op);
        debug!(op_id = %op.op_id, ?outcome, "remote operation applied");
        outcome
    }

    /// Full store snapshot (stamps and tombstones included)
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    /// Replace the local store wholesale with a canonical snapshot,
    /// advancing the clock past every stamp it contains
    pub fn restore_canonical(&mut self, snapshot: StoreSnapshot) {
        for element in &snapshot.elements {
            self.clock.observe(element.created_at.clock);
            self.clock.observe(element.geometry_stamp.clock);
            self.clock.observe(element.style_stamp.clock);
            self.clock.observe(element.deleted_stamp.clock);
        }
        self.store.restore(snapshot);
        self.selected = None;
    }

    pub fn clock_value(&self) -> u64 {
        self.clock.current()
    }

    // --- Rendering ---

    /// Pure projection of the current visible set through the viewport
    pub fn display_list(&self) -> Vec<DrawCommand> {
        render::display_list(&self.viewport, self.store.list_visible())
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset_zoom();
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.viewport.pan(dx, dy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Color;
    use crate::session::AllowAll;

    struct Canned(Option<String>);

    impl TextPrompt for Canned {
        fn request_text(&mut self) -> Option<String> {
            self.0.clone()
        }
    }

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    fn board() -> Whiteboard {
        Whiteboard::new(AuthorId::new(), &AllowAll)
    }

    fn draw_stroke(board: &mut Whiteboard, from: Point, to: Point) {
        let mut prompt = Canned(None);
        board.pointer_down(from, &mut prompt).unwrap();
        board.pointer_move(to);
        board.pointer_up();
    }

    #[test]
    fn gesture_produces_outbound_operations() {
        let mut b = board();
        draw_stroke(&mut b, p(0.0, 0.0), p(10.0, 10.0));
        let ops = b.take_outbound();
        assert!(!ops.is_empty());
        assert_eq!(b.store().visible_count(), 1);
        assert!(!b.has_outbound());
    }

    #[test]
    fn pointer_input_respects_viewport_transform() {
        let mut b = board();
        b.zoom_in();
        b.pan(30.0, 0.0);
        let mut prompt = Canned(None);
        b.pointer_down(p(60.0, 24.0), &mut prompt).unwrap();
        b.pointer_up();
        let element = b.store().list_visible().next().unwrap();
        let crate::element::Geometry::Stroke { points } = &element.geometry else {
            panic!("expected stroke");
        };
        let expected = b.viewport.screen_to_canvas(p(60.0, 24.0));
        assert!(points[0].distance_to(expected) < 1e-3);
    }

    #[test]
    fn undo_then_redo_restores_post_gesture_state() {
        let mut b = board();
        draw_stroke(&mut b, p(0.0, 0.0), p(5.0, 5.0));
        let after = b.store().visible_snapshot();

        assert!(b.undo());
        assert_eq!(b.store().visible_count(), 0);
        assert!(b.redo());
        assert_eq!(b.store().visible_snapshot(), after);

        // Empty stacks are no-ops
        assert!(b.redo() == false);
        b.undo();
        assert!(!b.undo());
    }

    #[test]
    fn one_history_entry_per_gesture_not_per_operation() {
        let mut b = board();
        let mut prompt = Canned(None);
        b.pointer_down(p(0.0, 0.0), &mut prompt).unwrap();
        for i in 0..20 {
            b.pointer_move(p(i as f32, 0.0));
        }
        b.pointer_up();
        assert!(b.undo());
        assert!(!b.can_undo());
    }

    #[test]
    fn select_tool_picks_and_delete_tombstones() {
        let mut b = board();
        b.set_tool(Tool::Rectangle);
        let mut prompt = Canned(None);
        b.pointer_down(p(0.0, 0.0), &mut prompt).unwrap();
        b.pointer_move(p(20.0, 20.0));
        b.pointer_up();

        b.set_tool(Tool::Select);
        b.pointer_down(p(10.0, 10.0), &mut prompt).unwrap();
        assert!(b.selected().is_some());
        b.delete_selected().unwrap();
        assert_eq!(b.store().visible_count(), 0);
        // Retained as a tombstone for convergence
        assert_eq!(b.store().element_count(), 1);
    }

    #[test]
    fn clear_canvas_is_undoable() {
        let mut b = board();
        draw_stroke(&mut b, p(0.0, 0.0), p(5.0, 0.0));
        draw_stroke(&mut b, p(0.0, 5.0), p(5.0, 5.0));
        b.clear_canvas().unwrap();
        assert_eq!(b.store().visible_count(), 0);
        assert!(b.undo());
        assert_eq!(b.store().visible_count(), 2);
    }

    #[test]
    fn undo_keeps_redelivered_remote_inserts_absorbed() {
        let mut a = board();
        let mut b = board();
        let mut prompt = Canned(None);

        // B draws a stroke and then deletes it; A sees both
        draw_stroke(&mut b, p(0.0, 0.0), p(6.0, 0.0));
        let inserts = b.take_outbound();
        b.set_tool(Tool::Select);
        b.pointer_down(p(3.0, 0.0), &mut prompt).unwrap();
        b.delete_selected().unwrap();
        let deletes = b.take_outbound();
        for op in inserts.iter().chain(deletes.iter()) {
            a.apply_remote(op);
        }

        // A rewinds its own gesture, then B's ops arrive a second time
        draw_stroke(&mut a, p(0.0, 9.0), p(6.0, 9.0));
        assert!(a.undo());
        for op in inserts.iter().chain(deletes.iter()) {
            assert_eq!(a.apply_remote(op), ApplyOutcome::DuplicateOp);
        }
        assert_eq!(a.store().visible_count(), 0);

        // Redo brings back A's own stroke only
        assert!(a.redo());
        assert_eq!(a.store().visible_count(), 1);
        assert!(a.store().get(inserts[0].element_id).unwrap().deleted);
    }

    #[test]
    fn remote_ops_advance_the_local_clock() {
        let mut a = board();
        let mut b = board();
        draw_stroke(&mut a, p(0.0, 0.0), p(5.0, 5.0));
        let ops = a.take_outbound();
        let highest = ops.iter().map(|op| op.clock).max().unwrap();
        for op in &ops {
            b.apply_remote(op);
        }
        assert!(b.clock_value() >= highest);
        // The next local op sorts after everything seen
        draw_stroke(&mut b, p(1.0, 1.0), p(2.0, 2.0));
        assert!(b.take_outbound().iter().all(|op| op.clock > highest));
    }

    #[test]
    fn capability_revocation_mid_gesture_reverts_the_element() {
        let mut b = board();
        let mut prompt = Canned(None);
        b.pointer_down(p(0.0, 0.0), &mut prompt).unwrap();
        b.pointer_move(p(5.0, 0.0));
        b.set_can_edit(false);
        assert_eq!(b.store().visible_count(), 0);
        // The revert is broadcast, not just local
        let ops = b.take_outbound();
        assert!(matches!(ops.last().unwrap().kind, crate::op::OpKind::Tombstone));
        // And no history entry was committed for the abandoned gesture
        assert!(!b.can_undo());
    }

    #[test]
    fn remote_update_wins_lww_over_older_local_style() {
        let mut a = board();
        let mut b = board();
        draw_stroke(&mut a, p(0.0, 0.0), p(5.0, 5.0));
        let insert_ops = a.take_outbound();
        for op in &insert_ops {
            b.apply_remote(op);
        }
        let id = insert_ops[0].element_id;

        // B restyles the element with a later clock
        let op = crate::op::Operation {
            op_id: crate::op::OpId::new(),
            author: b.author(),
            clock: 100,
            element_id: id,
            kind: crate::op::OpKind::Update {
                patch: crate::op::UpdatePatch::Style(Style {
                    color: Color::RED,
                    ..Style::default()
                }),
            },
        };
        a.apply_remote(&op);
        assert_eq!(a.store().get(id).unwrap().style.color, Color::RED);
    }
}
