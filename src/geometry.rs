//! Canvas-space geometry and the local viewport.
//!
//! All element coordinates live in canvas space. The viewport maps canvas
//! space to screen space with a clamped zoom factor and a pan offset; it is
//! purely local state and is never synchronized.

use serde::{Deserialize, Serialize};

/// Minimum zoom factor
pub const MIN_SCALE: f32 = 0.5;
/// Maximum zoom factor
pub const MAX_SCALE: f32 = 3.0;
/// Multiplier applied per zoom step
pub const ZOOM_STEP: f32 = 1.2;

/// A point on the canvas (canvas space can be negative for infinite canvas feel)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Distance from a point to the segment `a`-`b`, used for stroke hit-testing
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance_to(Point::new(a.x + t * abx, a.y + t * aby))
}

/// Viewport - what part of the canvas is visible, and at what zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Convert screen coordinates to canvas coordinates
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset_x) / self.scale,
            (screen.y - self.offset_y) / self.scale,
        )
    }

    /// Convert canvas coordinates to screen coordinates
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point::new(
            canvas.x * self.scale + self.offset_x,
            canvas.y * self.scale + self.offset_y,
        )
    }

    /// Zoom in one step, clamped at [`MAX_SCALE`] (a no-op at the bound)
    pub fn zoom_in(&mut self) {
        self.scale = (self.scale * ZOOM_STEP).clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Zoom out one step, clamped at [`MIN_SCALE`]
    pub fn zoom_out(&mut self) {
        self.scale = (self.scale / ZOOM_STEP).clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Reset zoom to 1:1
    pub fn reset_zoom(&mut self) {
        self.scale = 1.0;
    }

    /// Pan the viewport by a screen-space delta
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }
}
