//! slateboard - a collaborative whiteboard engine.
//!
//! Several participants edit one shared drawing; each runs its own replica
//! of the element store and exchanges operations (insert, update, tombstone)
//! stamped with a Lamport clock. Conflicts resolve field-by-field by
//! last-writer-wins on `(clock, author)`, so replicas that have seen the
//! same operations render the same canvas regardless of delivery order.
//!
//! [`Whiteboard`] is the per-participant facade: it turns pointer input into
//! operations, keeps local undo history and the viewport, and exposes the
//! surface a [`sync::SyncSession`] drives. Rendering is a pure projection
//! into a [`DrawCommand`] list for whatever backend hosts the canvas.

pub mod board;
pub mod element;
pub mod export;
pub mod geometry;
pub mod op;
pub mod render;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;
pub mod undo;

pub use board::Whiteboard;
pub use element::{AuthorId, Color, DrawingElement, ElementId, ElementKind, Geometry, Stamp, Style};
pub use geometry::{Point, Viewport};
pub use op::{LamportClock, OpId, OpKind, Operation, UpdatePatch};
pub use render::DrawCommand;
pub use session::{AllowAll, DrawingSession, EditPolicy, SessionError, TextPrompt, Tool};
pub use store::{ApplyOutcome, ElementStore, StoreConfig, StoreSnapshot};
pub use sync::{MemoryHub, SyncSession, Transport};
pub use undo::UndoManager;
