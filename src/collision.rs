//! Axis-aligned overlap and point containment tests.
//!
//! Blockers are tested against cell rectangles during raycasting;
//! areas are tested against world points for the manual fog layer.

use crate::types::{Area, Blocker, Point};

/// An axis-aligned rectangle: (min_x, min_y, max_x, max_y)
pub type Rect = (f64, f64, f64, f64);

/// Normalized world rectangle of a blocker. Negative extents are
/// flipped so min <= max.
pub fn blocker_rect(b: &Blocker) -> Rect {
    let (x0, x1) = if b.width >= 0.0 {
        (b.x, b.x + b.width)
    } else {
        (b.x + b.width, b.x)
    };
    let (y0, y1) = if b.height >= 0.0 {
        (b.y, b.y + b.height)
    } else {
        (b.y + b.height, b.y)
    };
    (x0, y0, x1, y1)
}

/// True if the interiors of two rectangles overlap.
/// Touching (shared edge or corner) is NOT counted as overlap.
#[inline]
pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3
}

/// True if `cell` overlaps any of the precomputed blocker rectangles.
#[inline]
pub fn rect_hits_any(cell: &Rect, blockers: &[Rect]) -> bool {
    blockers.iter().any(|b| rects_overlap(cell, b))
}

#[inline]
pub fn point_in_circle(
    px: f64,
    py: f64,
    cx: f64,
    cy: f64,
    radius: f64,
) -> bool {
    let dx = px - cx;
    let dy = py - cy;
    dx * dx + dy * dy <= radius * radius
}

/// Bounding-box test, edges inclusive.
#[inline]
pub fn point_in_rect(
    px: f64,
    py: f64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> bool {
    px >= x && px <= x + width && py >= y && py <= y + height
}

/// Ray-casting point-in-polygon test.
pub fn point_in_polygon(px: f64, py: f64, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].x, vertices[i].y);
        let (xj, yj) = (vertices[j].x, vertices[j].y);
        if (yi > py) != (yj > py) {
            let intersect_x = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn area_contains(area: &Area, px: f64, py: f64) -> bool {
    match area {
        Area::Circle { x, y, radius } => {
            point_in_circle(px, py, *x, *y, *radius)
        }
        Area::Rectangle {
            x,
            y,
            width,
            height,
        } => point_in_rect(px, py, *x, *y, *width, *height),
        Area::Polygon { points } => point_in_polygon(px, py, points),
    }
}

pub fn point_in_any_area(px: f64, py: f64, areas: &[Area]) -> bool {
    areas.iter().any(|a| area_contains(a, px, py))
}
