//! Per-tool drawing session: turns pointer input into operations.
//!
//! The session is the only producer of local mutations. Each pointer-down to
//! pointer-up interaction is one gesture; the session emits the insert and
//! batched updates for it, and the board commits one history snapshot when
//! the gesture completes. Edit capability is checked once at session start,
//! not per operation; a denied session fails closed on every mutating entry
//! point but can still select, pan, and zoom.

use thiserror::Error;
use tracing::debug;

use crate::element::{AuthorId, ElementId, ElementKind, Geometry, Style};
use crate::geometry::Point;
use crate::op::{LamportClock, OpId, OpKind, Operation, UpdatePatch};

/// Points accumulated per incremental stroke update
pub const DEFAULT_POINT_BATCH: usize = 4;

/// Available drawing tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Select,
    Freehand,
    Eraser,
    Rectangle,
    Ellipse,
    Text,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Freehand => "Freehand",
            Tool::Eraser => "Eraser",
            Tool::Rectangle => "Rectangle",
            Tool::Ellipse => "Ellipse",
            Tool::Text => "Text",
        }
    }

    /// Whether using this tool mutates the document
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Tool::Select)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Surfaced to the initiating session only; never fatal
    #[error("participant {0} does not have edit capability")]
    CapabilityDenied(AuthorId),
}

/// Blocking prompt collaborator for the text tool. Returning `None` cancels
/// the text gesture.
pub trait TextPrompt {
    fn request_text(&mut self) -> Option<String>;
}

/// Capability collaborator: may this participant mutate the document?
/// Queried once per session start.
pub trait EditPolicy {
    fn can_edit(&self, author: AuthorId) -> bool;
}

/// Policy that lets every participant draw
pub struct AllowAll;

impl EditPolicy for AllowAll {
    fn can_edit(&self, _author: AuthorId) -> bool {
        true
    }
}

/// In-progress gesture state
#[derive(Debug)]
enum Gesture {
    Idle,
    Stroke {
        id: ElementId,
        points: Vec<Point>,
        /// Points appended since the last geometry update was emitted
        unsent: usize,
    },
    Shape {
        id: ElementId,
        start: Point,
    },
}

/// Per-participant tool state machine
pub struct DrawingSession {
    author: AuthorId,
    tool: Tool,
    style: Style,
    can_edit: bool,
    next_seq: u64,
    point_batch: usize,
    gesture: Gesture,
}

impl DrawingSession {
    /// Start a session, performing the one-time capability check
    pub fn new(author: AuthorId, policy: &dyn EditPolicy) -> Self {
        Self {
            author,
            tool: Tool::Freehand,
            style: Style::default(),
            can_edit: policy.can_edit(author),
            next_seq: 0,
            point_batch: DEFAULT_POINT_BATCH,
            gesture: Gesture::Idle,
        }
    }

    pub fn author(&self) -> AuthorId {
        self.author
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    pub fn in_gesture(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    fn next_element_id(&mut self) -> ElementId {
        self.next_seq += 1;
        ElementId::new(self.author, self.next_seq)
    }

    fn make_op(&self, clock: &mut LamportClock, element_id: ElementId, kind: OpKind) -> Operation {
        Operation {
            op_id: OpId::new(),
            author: self.author,
            clock: clock.tick(),
            element_id,
            kind,
        }
    }

    fn require_edit(&self) -> Result<(), SessionError> {
        if self.can_edit {
            Ok(())
        } else {
            Err(SessionError::CapabilityDenied(self.author))
        }
    }

    /// Pointer-down in canvas space. For the text tool this solicits content
    /// synchronously via the prompt collaborator and emits a single insert.
    pub fn pointer_down(
        &mut self,
        pos: Point,
        clock: &mut LamportClock,
        prompt: &mut dyn TextPrompt,
    ) -> Result<Vec<Operation>, SessionError> {
        if !self.tool.is_mutating() {
            return Ok(Vec::new());
        }
        self.require_edit()?;
        if self.in_gesture() {
            // Missed pointer-up; ignore rather than start a nested gesture
            return Ok(Vec::new());
        }

        match self.tool {
            Tool::Freehand | Tool::Eraser => {
                let id = self.next_element_id();
                let kind = if self.tool == Tool::Eraser {
                    ElementKind::Eraser
                } else {
                    ElementKind::Freehand
                };
                self.gesture = Gesture::Stroke {
                    id,
                    points: vec![pos],
                    unsent: 0,
                };
                Ok(vec![self.make_op(
                    clock,
                    id,
                    OpKind::Insert {
                        kind,
                        geometry: Geometry::Stroke { points: vec![pos] },
                        style: self.style,
                    },
                )])
            }
            Tool::Rectangle | Tool::Ellipse => {
                let id = self.next_element_id();
                let kind = if self.tool == Tool::Ellipse {
                    ElementKind::Ellipse
                } else {
                    ElementKind::Rectangle
                };
                self.gesture = Gesture::Shape { id, start: pos };
                Ok(vec![self.make_op(
                    clock,
                    id,
                    OpKind::Insert {
                        kind,
                        geometry: Geometry::Corners {
                            start: pos,
                            end: pos,
                        },
                        style: self.style,
                    },
                )])
            }
            Tool::Text => {
                // Intentional, user-visible pause while content is supplied
                let Some(content) = prompt.request_text() else {
                    return Ok(Vec::new());
                };
                if content.is_empty() {
                    return Ok(Vec::new());
                }
                let id = self.next_element_id();
                Ok(vec![self.make_op(
                    clock,
                    id,
                    OpKind::Insert {
                        kind: ElementKind::Text,
                        geometry: Geometry::Anchored {
                            anchor: pos,
                            content,
                        },
                        style: self.style,
                    },
                )])
            }
            Tool::Select => unreachable!("select handled above"),
        }
    }

    /// Pointer-move while a gesture is active. Strokes append a point and
    /// emit a geometry update per point batch; shapes update the end corner
    /// only, never a growing point list.
    pub fn pointer_move(&mut self, pos: Point, clock: &mut LamportClock) -> Vec<Operation> {
        match &mut self.gesture {
            Gesture::Idle => Vec::new(),
            Gesture::Stroke { id, points, unsent } => {
                points.push(pos);
                *unsent += 1;
                if *unsent >= self.point_batch {
                    *unsent = 0;
                    let id = *id;
                    let geometry = Geometry::Stroke {
                        points: points.clone(),
                    };
                    vec![self.make_op(
                        clock,
                        id,
                        OpKind::Update {
                            patch: UpdatePatch::Geometry(geometry),
                        },
                    )]
                } else {
                    Vec::new()
                }
            }
            Gesture::Shape { id, start } => {
                let id = *id;
                let start = *start;
                vec![self.make_op(
                    clock,
                    id,
                    OpKind::Update {
                        patch: UpdatePatch::Geometry(Geometry::Corners { start, end: pos }),
                    },
                )]
            }
        }
    }

    /// Pointer-up finalizes the gesture, flushing any unsent stroke points
    pub fn pointer_up(&mut self, clock: &mut LamportClock) -> Vec<Operation> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Idle => Vec::new(),
            Gesture::Stroke { id, points, unsent } => {
                if unsent > 0 {
                    vec![self.make_op(
                        clock,
                        id,
                        OpKind::Update {
                            patch: UpdatePatch::Geometry(Geometry::Stroke { points }),
                        },
                    )]
                } else {
                    Vec::new()
                }
            }
            Gesture::Shape { .. } => Vec::new(),
        }
    }

    /// Pointer-leave exits the gesture exactly like pointer-up
    pub fn pointer_leave(&mut self, clock: &mut LamportClock) -> Vec<Operation> {
        self.pointer_up(clock)
    }

    /// Abandon an in-progress gesture, reverting it to no element. The
    /// insert may already be on the wire, so the revert is a tombstone.
    pub fn cancel_gesture(&mut self, clock: &mut LamportClock) -> Vec<Operation> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let id = match gesture {
            Gesture::Idle => return Vec::new(),
            Gesture::Stroke { id, .. } => id,
            Gesture::Shape { id, .. } => id,
        };
        debug!(element = %id, "gesture abandoned");
        vec![self.make_op(clock, id, OpKind::Tombstone)]
    }

    /// Tombstone an existing element (the delete-selected path)
    pub fn delete_element(
        &self,
        id: ElementId,
        clock: &mut LamportClock,
    ) -> Result<Operation, SessionError> {
        self.require_edit()?;
        Ok(self.make_op(clock, id, OpKind::Tombstone))
    }

    /// Update edit capability. Losing it mid-gesture abandons the gesture.
    pub fn set_can_edit(&mut self, can_edit: bool, clock: &mut LamportClock) -> Vec<Operation> {
        self.can_edit = can_edit;
        if can_edit {
            Vec::new()
        } else {
            self.cancel_gesture(clock)
        }
    }
}
