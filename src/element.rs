//! Drawing element types: identity, kinds, geometry payloads, and style.
//!
//! Element identity is permanent and assigned by its author without
//! coordination (author id + local counter). Once set, `kind` never changes;
//! only geometry, style, and the tombstone flag mutate, each carrying a
//! last-writer stamp for conflict resolution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{point_segment_distance, Point};

/// Unique participant identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AuthorId(pub Uuid);

impl AuthorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuthorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuthorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element identifier - author id plus a per-author counter, globally unique
/// without coordination
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ElementId {
    pub author: AuthorId,
    pub seq: u64,
}

impl ElementId {
    pub fn new(author: AuthorId, seq: u64) -> Self {
        Self { author, seq }
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.author, self.seq)
    }
}

/// Logical timestamp: Lamport clock value paired with the writing author.
///
/// The derived `Ord` compares `(clock, author)`, so concurrent writes with
/// equal clocks resolve to the same winner on every replica.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Stamp {
    pub clock: u64,
    pub author: AuthorId,
}

impl Stamp {
    pub fn new(clock: u64, author: AuthorId) -> Self {
        Self { clock, author }
    }
}

/// RGB color for element styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS hex string for SVG export
    pub fn to_css(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Visual style shared by all element kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub color: Color,
    /// Stroke width in canvas units, always positive
    pub stroke_width: u32,
    /// Font size multiplier, meaningful for text elements only
    pub font_scale: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            stroke_width: 2,
            font_scale: 1.0,
        }
    }
}

/// The different kinds of drawing elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Freehand,
    Eraser,
    Rectangle,
    Ellipse,
    Text,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Freehand => "Freehand",
            ElementKind::Eraser => "Eraser",
            ElementKind::Rectangle => "Rectangle",
            ElementKind::Ellipse => "Ellipse",
            ElementKind::Text => "Text",
        }
    }
}

/// Kind-dependent geometry payload.
///
/// A closed tagged variant so every consumer handles all payload shapes
/// exhaustively: stroke kinds carry an ordered point sequence, rectangle and
/// ellipse carry two corner points, text carries an anchor and its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Stroke { points: Vec<Point> },
    Corners { start: Point, end: Point },
    Anchored { anchor: Point, content: String },
}

impl Geometry {
    /// Whether this payload shape is valid for the given element kind
    pub fn matches(&self, kind: ElementKind) -> bool {
        matches!(
            (kind, self),
            (ElementKind::Freehand, Geometry::Stroke { .. })
                | (ElementKind::Eraser, Geometry::Stroke { .. })
                | (ElementKind::Rectangle, Geometry::Corners { .. })
                | (ElementKind::Ellipse, Geometry::Corners { .. })
                | (ElementKind::Text, Geometry::Anchored { .. })
        )
    }
}

/// A single drawing element in the shared document.
///
/// Tombstoned elements are retained, not removed, so concurrent operations
/// that reference them converge instead of erroring. The per-field stamps
/// record the last writer of each mutable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub geometry: Geometry,
    pub style: Style,
    pub created_at: Stamp,
    pub deleted: bool,
    pub(crate) geometry_stamp: Stamp,
    pub(crate) style_stamp: Stamp,
    pub(crate) deleted_stamp: Stamp,
}

impl DrawingElement {
    /// Create a freshly inserted element; all field stamps start at the
    /// insert stamp.
    pub fn new(
        id: ElementId,
        kind: ElementKind,
        geometry: Geometry,
        style: Style,
        stamp: Stamp,
    ) -> Self {
        Self {
            id,
            kind,
            geometry,
            style,
            created_at: stamp,
            deleted: false,
            geometry_stamp: stamp,
            style_stamp: stamp,
            deleted_stamp: stamp,
        }
    }

    /// Axis-aligned bounding box `(min, max)` in canvas space
    pub fn bounds(&self) -> (Point, Point) {
        match &self.geometry {
            Geometry::Stroke { points } => {
                let mut min = Point::new(f32::MAX, f32::MAX);
                let mut max = Point::new(f32::MIN, f32::MIN);
                for p in points {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                }
                if points.is_empty() {
                    (Point::new(0.0, 0.0), Point::new(0.0, 0.0))
                } else {
                    (min, max)
                }
            }
            Geometry::Corners { start, end } => (
                Point::new(start.x.min(end.x), start.y.min(end.y)),
                Point::new(start.x.max(end.x), start.y.max(end.y)),
            ),
            Geometry::Anchored { anchor, content } => {
                // Rough text extent: character cell scaled by font size
                let size = 8.0 * self.style.stroke_width as f32 * self.style.font_scale;
                let width = content.chars().count() as f32 * size * 0.6;
                (*anchor, Point::new(anchor.x + width, anchor.y + size))
            }
        }
    }

    /// Hit test in canvas space with the given tolerance
    pub fn hit_test(&self, p: Point, tolerance: f32) -> bool {
        let tol = tolerance + self.style.stroke_width as f32 / 2.0;
        match &self.geometry {
            Geometry::Stroke { points } => match points.len() {
                0 => false,
                1 => p.distance_to(points[0]) <= tol,
                _ => points
                    .windows(2)
                    .any(|w| point_segment_distance(p, w[0], w[1]) <= tol),
            },
            Geometry::Corners { start, end } => {
                let (min, max) = self.bounds();
                match self.kind {
                    ElementKind::Ellipse => {
                        let cx = (start.x + end.x) / 2.0;
                        let cy = (start.y + end.y) / 2.0;
                        let rx = ((max.x - min.x) / 2.0).max(tol);
                        let ry = ((max.y - min.y) / 2.0).max(tol);
                        let nx = (p.x - cx) / rx;
                        let ny = (p.y - cy) / ry;
                        nx * nx + ny * ny <= 1.0
                    }
                    _ => {
                        p.x >= min.x - tol
                            && p.x <= max.x + tol
                            && p.y >= min.y - tol
                            && p.y <= max.y + tol
                    }
                }
            }
            Geometry::Anchored { .. } => {
                let (min, max) = self.bounds();
                p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
            }
        }
    }
}
