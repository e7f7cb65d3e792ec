//! SVG export of the visible canvas.
//!
//! Exports in canvas units with:
//! - the bounding box of all visible elements plus a margin as the viewBox
//! - eraser strokes painted in the background color, matching the canvas
//! - kind-specific rendering for each element

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;

use crate::element::{DrawingElement, ElementKind, Geometry};
use crate::geometry::Point;
use crate::render::TEXT_BASE_SIZE;
use crate::store::ElementStore;

/// Margin around the content bounding box, in canvas units
const MARGIN: f32 = 10.0;
/// Canvas background, also the eraser stroke color
const BACKGROUND: &str = "white";

/// Export the visible elements to an SVG string
pub fn export_svg(store: &ElementStore) -> String {
    let mut output = String::new();

    let (min, max) = calculate_bounds(store);
    let width = max.x - min.x + 2.0 * MARGIN;
    let height = max.y - min.y + 2.0 * MARGIN;
    let offset = Point::new(-min.x + MARGIN, -min.y + MARGIN);

    writeln!(
        &mut output,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg"
     width="{width:.1}" height="{height:.1}"
     viewBox="0 0 {width:.1} {height:.1}"
     style="background-color: {BACKGROUND};">"#
    )
    .unwrap();

    // Visible-order traversal doubles as paint order
    for element in store.list_visible() {
        render_element(&mut output, element, offset);
    }

    writeln!(&mut output, "</svg>").unwrap();

    output
}

/// Save SVG to a file
pub fn save_svg(store: &ElementStore, path: &Path) -> Result<()> {
    let svg = export_svg(store);
    std::fs::write(path, svg)?;
    Ok(())
}

/// Bounding box of all visible elements
fn calculate_bounds(store: &ElementStore) -> (Point, Point) {
    let mut any = false;
    let mut min = Point::new(f32::MAX, f32::MAX);
    let mut max = Point::new(f32::MIN, f32::MIN);

    for element in store.list_visible() {
        let (emin, emax) = element.bounds();
        min.x = min.x.min(emin.x);
        min.y = min.y.min(emin.y);
        max.x = max.x.max(emax.x);
        max.y = max.y.max(emax.y);
        any = true;
    }

    if any {
        (min, max)
    } else {
        (Point::new(0.0, 0.0), Point::new(100.0, 100.0))
    }
}

/// Render a single element to SVG
fn render_element(output: &mut String, element: &DrawingElement, offset: Point) {
    let color = if element.kind == ElementKind::Eraser {
        BACKGROUND.to_string()
    } else {
        element.style.color.to_css()
    };
    let width = element.style.stroke_width;

    match &element.geometry {
        Geometry::Stroke { points } => {
            render_stroke(output, points, &color, width, offset);
        }
        Geometry::Corners { start, end } => {
            let min = Point::new(
                start.x.min(end.x) + offset.x,
                start.y.min(end.y) + offset.y,
            );
            let max = Point::new(
                start.x.max(end.x) + offset.x,
                start.y.max(end.y) + offset.y,
            );
            match element.kind {
                ElementKind::Ellipse => render_ellipse(output, min, max, &color, width),
                _ => render_rectangle(output, min, max, &color, width),
            }
        }
        Geometry::Anchored { anchor, content } => {
            let size = TEXT_BASE_SIZE * width as f32 * element.style.font_scale;
            render_text(
                output,
                Point::new(anchor.x + offset.x, anchor.y + offset.y),
                content,
                &color,
                size,
            );
        }
    }
}

/// Render a freehand or eraser stroke as a polyline
fn render_stroke(output: &mut String, points: &[Point], color: &str, width: u32, offset: Point) {
    if points.is_empty() {
        return;
    }
    if points.len() == 1 {
        // Degenerate stroke: a tap leaves a dot
        let p = points[0];
        writeln!(
            output,
            r#"  <circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"#,
            p.x + offset.x,
            p.y + offset.y,
            width as f32 / 2.0,
            color
        )
        .unwrap();
        return;
    }

    let mut path = String::new();
    for (i, p) in points.iter().enumerate() {
        let cmd = if i == 0 { 'M' } else { 'L' };
        write!(path, "{} {:.1} {:.1} ", cmd, p.x + offset.x, p.y + offset.y).unwrap();
    }
    writeln!(
        output,
        r#"  <path d="{}" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round" fill="none"/>"#,
        path.trim_end(),
        color,
        width
    )
    .unwrap();
}

fn render_rectangle(output: &mut String, min: Point, max: Point, color: &str, width: u32) {
    writeln!(
        output,
        r#"  <rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" stroke="{}" stroke-width="{}" fill="none"/>"#,
        min.x,
        min.y,
        max.x - min.x,
        max.y - min.y,
        color,
        width
    )
    .unwrap();
}

fn render_ellipse(output: &mut String, min: Point, max: Point, color: &str, width: u32) {
    writeln!(
        output,
        r#"  <ellipse cx="{:.1}" cy="{:.1}" rx="{:.1}" ry="{:.1}" stroke="{}" stroke-width="{}" fill="none"/>"#,
        (min.x + max.x) / 2.0,
        (min.y + max.y) / 2.0,
        (max.x - min.x) / 2.0,
        (max.y - min.y) / 2.0,
        color,
        width
    )
    .unwrap();
}

fn render_text(output: &mut String, anchor: Point, content: &str, color: &str, size: f32) {
    writeln!(
        output,
        r#"  <text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="{:.1}" dominant-baseline="hanging" fill="{}">{}</text>"#,
        anchor.x,
        anchor.y,
        size,
        color,
        escape_xml(content)
    )
    .unwrap();
}

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
