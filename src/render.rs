//! Frame projection: visible elements plus viewport in, draw commands out.
//!
//! This module keeps no state of its own. A frame is a pure function of the
//! store's visible sequence and the viewport, so any backend (HTML canvas,
//! terminal cells, a test harness) just walks the command list in order -
//! later commands paint over earlier ones.

use crate::element::{Color, DrawingElement, ElementKind, Geometry};
use crate::geometry::{Point, Viewport};

/// Base glyph size in canvas units at font scale 1.0 and stroke width 1
pub const TEXT_BASE_SIZE: f32 = 8.0;

/// One screen-space drawing instruction
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Polyline through `points`; `erase` strokes paint in the background
    /// color rather than removing pixels
    Stroke {
        points: Vec<Point>,
        color: Color,
        width: f32,
        erase: bool,
    },
    /// Axis-aligned rectangle outline
    Rect {
        min: Point,
        max: Point,
        color: Color,
        width: f32,
    },
    /// Ellipse outline
    Ellipse {
        center: Point,
        rx: f32,
        ry: f32,
        color: Color,
        width: f32,
    },
    /// Text anchored at its top-left corner
    Text {
        anchor: Point,
        content: String,
        color: Color,
        size: f32,
    },
}

/// Project visible elements through the viewport into screen-space commands.
/// Input order is preserved, so the backend's paint order matches the
/// replica-independent insertion order.
pub fn display_list<'a>(
    viewport: &Viewport,
    elements: impl Iterator<Item = &'a DrawingElement>,
) -> Vec<DrawCommand> {
    elements
        .filter_map(|element| project(viewport, element))
        .collect()
}

fn project(viewport: &Viewport, element: &DrawingElement) -> Option<DrawCommand> {
    let width = element.style.stroke_width as f32 * viewport.scale;
    let color = element.style.color;
    match &element.geometry {
        Geometry::Stroke { points } => {
            if points.is_empty() {
                return None;
            }
            Some(DrawCommand::Stroke {
                points: points.iter().map(|p| viewport.canvas_to_screen(*p)).collect(),
                color,
                width,
                erase: element.kind == ElementKind::Eraser,
            })
        }
        Geometry::Corners { start, end } => {
            let min = viewport.canvas_to_screen(Point::new(
                start.x.min(end.x),
                start.y.min(end.y),
            ));
            let max = viewport.canvas_to_screen(Point::new(
                start.x.max(end.x),
                start.y.max(end.y),
            ));
            match element.kind {
                ElementKind::Ellipse => Some(DrawCommand::Ellipse {
                    center: Point::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0),
                    rx: (max.x - min.x) / 2.0,
                    ry: (max.y - min.y) / 2.0,
                    color,
                    width,
                }),
                _ => Some(DrawCommand::Rect {
                    min,
                    max,
                    color,
                    width,
                }),
            }
        }
        Geometry::Anchored { anchor, content } => {
            if content.is_empty() {
                return None;
            }
            Some(DrawCommand::Text {
                anchor: viewport.canvas_to_screen(*anchor),
                content: content.clone(),
                color,
                size: TEXT_BASE_SIZE
                    * element.style.stroke_width as f32
                    * element.style.font_scale
                    * viewport.scale,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{AuthorId, ElementId, Stamp, Style};

    fn element(kind: ElementKind, geometry: Geometry) -> DrawingElement {
        let author = AuthorId::new();
        DrawingElement::new(
            ElementId::new(author, 1),
            kind,
            geometry,
            Style::default(),
            Stamp::new(1, author),
        )
    }

    #[test]
    fn stroke_points_are_transformed_to_screen_space() {
        let mut vp = Viewport::new();
        vp.pan(100.0, 50.0);
        vp.zoom_in();
        let el = element(
            ElementKind::Freehand,
            Geometry::Stroke {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            },
        );
        let cmds = display_list(&vp, std::iter::once(&el));
        let DrawCommand::Stroke { points, width, erase, .. } = &cmds[0] else {
            panic!("expected stroke");
        };
        assert!(points[0].distance_to(vp.canvas_to_screen(Point::new(0.0, 0.0))) < 1e-3);
        assert!(points[1].distance_to(vp.canvas_to_screen(Point::new(10.0, 0.0))) < 1e-3);
        assert!((width - 2.0 * vp.scale).abs() < 1e-6);
        assert!(!erase);
    }

    #[test]
    fn eraser_projects_as_background_colored_stroke() {
        let vp = Viewport::new();
        let el = element(
            ElementKind::Eraser,
            Geometry::Stroke {
                points: vec![Point::new(1.0, 1.0)],
            },
        );
        let cmds = display_list(&vp, std::iter::once(&el));
        assert!(matches!(cmds[0], DrawCommand::Stroke { erase: true, .. }));
    }

    #[test]
    fn ellipse_center_and_radii_from_any_corner_orientation() {
        let vp = Viewport::new();
        // Dragged up-left: end is above and left of start
        let el = element(
            ElementKind::Ellipse,
            Geometry::Corners {
                start: Point::new(10.0, 8.0),
                end: Point::new(0.0, 0.0),
            },
        );
        let cmds = display_list(&vp, std::iter::once(&el));
        let DrawCommand::Ellipse { center, rx, ry, .. } = cmds[0] else {
            panic!("expected ellipse");
        };
        assert!(center.distance_to(Point::new(5.0, 4.0)) < 1e-6);
        assert!((rx - 5.0).abs() < 1e-6 && (ry - 4.0).abs() < 1e-6);
    }

    #[test]
    fn empty_payloads_produce_no_commands() {
        let vp = Viewport::new();
        let stroke = element(ElementKind::Freehand, Geometry::Stroke { points: vec![] });
        let text = element(
            ElementKind::Text,
            Geometry::Anchored {
                anchor: Point::new(0.0, 0.0),
                content: String::new(),
            },
        );
        assert!(display_list(&vp, [&stroke, &text].into_iter()).is_empty());
    }

    #[test]
    fn command_order_follows_element_order() {
        let vp = Viewport::new();
        let a = element(
            ElementKind::Rectangle,
            Geometry::Corners {
                start: Point::new(0.0, 0.0),
                end: Point::new(1.0, 1.0),
            },
        );
        let b = element(
            ElementKind::Freehand,
            Geometry::Stroke {
                points: vec![Point::new(0.0, 0.0)],
            },
        );
        let cmds = display_list(&vp, [&a, &b].into_iter());
        assert!(matches!(cmds[0], DrawCommand::Rect { .. }));
        assert!(matches!(cmds[1], DrawCommand::Stroke { .. }));
    }
}
