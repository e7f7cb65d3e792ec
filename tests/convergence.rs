//! Cross-replica convergence: replicas that have seen the same operations
//! agree on the canvas, whatever the delivery order.

use proptest::prelude::*;
use uuid::Uuid;

use slateboard::{
    AllowAll, AuthorId, Color, ElementId, ElementKind, ElementStore, Geometry, MemoryHub, OpId,
    OpKind, Operation, Point, Style, SyncSession, TextPrompt, UpdatePatch, Whiteboard,
};

struct NoPrompt;

impl TextPrompt for NoPrompt {
    fn request_text(&mut self) -> Option<String> {
        None
    }
}

fn author(n: u8) -> AuthorId {
    AuthorId(Uuid::from_u128(n as u128 + 1))
}

/// Element kind is a pure function of the id so that generated geometry
/// always fits: even sequence numbers are rectangles, odd ones strokes.
fn kind_for(seq: u64) -> ElementKind {
    if seq % 2 == 0 {
        ElementKind::Rectangle
    } else {
        ElementKind::Freehand
    }
}

fn geometry_for(seq: u64, x: f32, y: f32) -> Geometry {
    match kind_for(seq) {
        ElementKind::Rectangle => Geometry::Corners {
            start: Point::new(0.0, 0.0),
            end: Point::new(x, y),
        },
        _ => Geometry::Stroke {
            points: vec![Point::new(0.0, 0.0), Point::new(x, y)],
        },
    }
}

/// One generated edit before clocks and operation ids are assigned
#[derive(Debug, Clone)]
struct Edit {
    author: u8,
    seq: u64,
    action: u8,
    x: f32,
    y: f32,
}

fn edit() -> impl Strategy<Value = Edit> {
    (0u8..3, 0u64..5, 0u8..4, -50.0f32..50.0, -50.0f32..50.0).prop_map(
        |(author, seq, action, x, y)| Edit {
            author,
            seq,
            action,
            x,
            y,
        },
    )
}

/// Turn generated edits into a well-formed operation log: one insert per
/// element id, globally unique clocks and operation ids. Updates may still
/// target elements that are never inserted (permanent orphans).
fn build_ops(edits: Vec<Edit>) -> Vec<Operation> {
    let mut inserted: Vec<ElementId> = Vec::new();
    let mut ops = Vec::with_capacity(edits.len());

    for (index, edit) in edits.into_iter().enumerate() {
        let element_id = ElementId::new(author(edit.author), edit.seq);
        let kind = match edit.action {
            0 if !inserted.contains(&element_id) => {
                inserted.push(element_id);
                OpKind::Insert {
                    kind: kind_for(edit.seq),
                    geometry: geometry_for(edit.seq, edit.x, edit.y),
                    style: Style::default(),
                }
            }
            0 | 1 => OpKind::Update {
                patch: UpdatePatch::Style(Style {
                    color: Color::new(index as u8, 0, 0),
                    ..Style::default()
                }),
            },
            2 => OpKind::Update {
                patch: UpdatePatch::Geometry(geometry_for(edit.seq, edit.y, edit.x)),
            },
            _ => OpKind::Tombstone,
        };
        ops.push(Operation {
            op_id: OpId(Uuid::from_u128(index as u128 + 1000)),
            author: author(edit.author),
            clock: index as u64 + 1,
            element_id,
            kind,
        });
    }
    ops
}

fn ops_and_permutation() -> impl Strategy<Value = (Vec<Operation>, Vec<usize>)> {
    prop::collection::vec(edit(), 1..40).prop_flat_map(|edits| {
        let ops = build_ops(edits);
        let indices: Vec<usize> = (0..ops.len()).collect();
        (Just(ops), Just(indices).prop_shuffle())
    })
}

proptest! {
    /// The same operation multiset produces the same store in any order
    #[test]
    fn stores_converge_under_delivery_permutation((ops, permutation) in ops_and_permutation()) {
        let mut in_order = ElementStore::new();
        let mut permuted = ElementStore::new();
        for op in &ops {
            in_order.apply(op);
        }
        for &i in &permutation {
            permuted.apply(&ops[i]);
        }
        prop_assert_eq!(in_order.snapshot(), permuted.snapshot());

        let a: Vec<ElementId> = in_order.list_visible().map(|e| e.id).collect();
        let b: Vec<ElementId> = permuted.list_visible().map(|e| e.id).collect();
        prop_assert_eq!(a, b);
    }

    /// Applying the log twice is the same as applying it once
    #[test]
    fn double_delivery_is_idempotent((ops, _) in ops_and_permutation()) {
        let mut once = ElementStore::new();
        let mut twice = ElementStore::new();
        for op in &ops {
            once.apply(op);
        }
        for op in ops.iter().chain(ops.iter()) {
            twice.apply(op);
        }
        prop_assert_eq!(once.snapshot(), twice.snapshot());
    }

    /// Undoing every gesture and redoing them all restores the final state
    #[test]
    fn undo_all_then_redo_all_round_trips(strokes in prop::collection::vec(
        (-50.0f32..50.0, -50.0f32..50.0, 1usize..8), 1..10,
    )) {
        let mut board = Whiteboard::new(AuthorId::new(), &AllowAll);
        for (x, y, moves) in &strokes {
            board.pointer_down(Point::new(*x, *y), &mut NoPrompt).unwrap();
            for i in 0..*moves {
                board.pointer_move(Point::new(x + i as f32, *y));
            }
            board.pointer_up();
        }
        let final_state = board.store().visible_snapshot();

        let mut undone = 0;
        while board.undo() {
            undone += 1;
        }
        prop_assert_eq!(undone, strokes.len());
        prop_assert_eq!(board.store().visible_count(), 0);

        while board.redo() {}
        prop_assert_eq!(board.store().visible_snapshot(), final_state);
    }
}

fn draw_stroke(board: &mut Whiteboard, from: Point, to: Point) {
    board.pointer_down(from, &mut NoPrompt).unwrap();
    board.pointer_move(to);
    board.pointer_up();
}

#[test]
fn three_participants_converge_end_to_end() {
    let hub = MemoryHub::new();
    let mut boards: Vec<Whiteboard> = (0..3).map(|_| Whiteboard::new(AuthorId::new(), &AllowAll)).collect();
    let mut sessions: Vec<SyncSession<_>> = (0..3).map(|_| SyncSession::new(hub.connect())).collect();

    for (i, board) in boards.iter_mut().enumerate() {
        let y = i as f32 * 10.0;
        draw_stroke(board, Point::new(0.0, y), Point::new(20.0, y));
    }
    for (board, session) in boards.iter_mut().zip(sessions.iter_mut()) {
        session.flush(board);
    }
    for (board, session) in boards.iter_mut().zip(sessions.iter_mut()) {
        session.pump(board);
    }

    let reference = boards[0].snapshot();
    for board in &boards[1..] {
        assert_eq!(board.snapshot(), reference);
    }
    assert_eq!(boards[0].store().visible_count(), 3);
}

#[test]
fn undo_is_local_and_does_not_retract_broadcast_edits() {
    let hub = MemoryHub::new();
    let mut a = Whiteboard::new(AuthorId::new(), &AllowAll);
    let mut b = Whiteboard::new(AuthorId::new(), &AllowAll);
    let mut sync_a = SyncSession::new(hub.connect());
    let mut sync_b = SyncSession::new(hub.connect());

    draw_stroke(&mut a, Point::new(0.0, 0.0), Point::new(5.0, 0.0));
    sync_a.flush(&mut a);
    sync_b.pump(&mut b);
    assert_eq!(b.store().visible_count(), 1);

    // A rewinds its local view; nothing is broadcast and B keeps the stroke
    assert!(a.undo());
    assert_eq!(a.store().visible_count(), 0);
    assert_eq!(sync_a.flush(&mut a), 0);
    assert_eq!(b.store().visible_count(), 1);
}

#[test]
fn late_insert_resolves_buffered_remote_update() {
    // The update for an element races ahead of its insert across the wire
    let mut a = Whiteboard::new(AuthorId::new(), &AllowAll);
    let mut b = Whiteboard::new(AuthorId::new(), &AllowAll);

    draw_stroke(&mut a, Point::new(0.0, 0.0), Point::new(5.0, 5.0));
    let mut ops = a.take_outbound();
    assert!(ops.len() >= 2);
    let insert = ops.remove(0);
    for op in &ops {
        b.apply_remote(op);
    }
    assert_eq!(b.store().visible_count(), 0);
    assert!(b.store().orphan_count() > 0);

    b.apply_remote(&insert);
    assert_eq!(b.store().orphan_count(), 0);
    assert_eq!(b.snapshot(), a.snapshot());
}
