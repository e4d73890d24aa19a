//! Manual fog painting.
//!
//! Reveals are retained as shapes in the `AreaLayer`, the list that is
//! synchronized and persisted. Hides drop records from that list and
//! clear the covered cells of the live grid with `paint_area`.

use crate::collision::{
    area_contains, point_in_any_area, point_in_circle, point_in_rect,
};
use crate::error::FogError;
use crate::grid::FogGrid;
use crate::types::{Area, CellState, FogSettings, Point};

/// Reject shapes that indicate a caller bug.
pub fn validate_area(area: &Area) -> Result<(), FogError> {
    match area {
        Area::Circle { radius, .. } => {
            if !radius.is_finite() || *radius < 0.0 {
                return Err(FogError::InvalidRadius(*radius));
            }
        }
        Area::Rectangle { width, height, .. } => {
            let finite = width.is_finite() && height.is_finite();
            if !finite || *width < 0.0 || *height < 0.0 {
                return Err(FogError::InvalidExtent {
                    width: *width,
                    height: *height,
                });
            }
        }
        Area::Polygon { points } => {
            if points.len() < 3 {
                return Err(FogError::InvalidPolygon {
                    points: points.len(),
                });
            }
        }
    }
    Ok(())
}

/// Retained list of manually revealed shapes plus the shared fog
/// settings (which carry the global-reveal flag).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaLayer {
    areas: Vec<Area>,
    settings: FogSettings,
}

impl AreaLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn settings(&self) -> &FogSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: FogSettings) {
        self.settings = settings;
    }

    pub fn add(&mut self, area: Area) -> Result<(), FogError> {
        validate_area(&area)?;
        self.areas.push(area);
        Ok(())
    }

    /// Drop every record whose center lies within `radius` of (x, y).
    ///
    /// Only the center is tested, so a large area overlapping the brush
    /// survives when its center is outside it.
    pub fn remove_centered_within(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
    ) -> usize {
        self.remove_centered(|cx, cy| point_in_circle(cx, cy, x, y, radius))
    }

    /// Drop every record whose center lies inside the rectangle. Same
    /// center-only rule as `remove_centered_within`.
    pub fn remove_centered_in_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> usize {
        self.remove_centered(|cx, cy| {
            point_in_rect(cx, cy, x, y, width, height)
        })
    }

    fn remove_centered(&mut self, hit: impl Fn(f64, f64) -> bool) -> usize {
        let before = self.areas.len();
        self.areas.retain(|a| {
            let (cx, cy) = a.center();
            !hit(cx, cy)
        });
        before - self.areas.len()
    }

    pub fn reveal_all(&mut self) {
        self.settings.global_reveal = true;
    }

    pub fn hide_all(&mut self) {
        self.areas.clear();
        self.settings.global_reveal = false;
    }

    /// Wholesale replacement, used when a remote snapshot or a stored
    /// map is applied.
    pub fn replace(&mut self, areas: Vec<Area>, settings: FogSettings) {
        self.areas = areas;
        self.settings = settings;
    }

    pub fn replace_areas(&mut self, areas: Vec<Area>) {
        self.areas = areas;
    }

    /// Is this world point revealed by the manual layer?
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.settings.global_reveal || point_in_any_area(x, y, &self.areas)
    }
}

/// Set every cell whose center is inside `area` to `state`.
/// Returns the number of cells written.
pub fn paint_area(
    grid: &mut FogGrid,
    area: &Area,
    state: CellState,
) -> usize {
    let (x0, y0, x1, y1) = match area {
        Area::Circle { x, y, radius } => {
            (x - radius, y - radius, x + radius, y + radius)
        }
        Area::Rectangle {
            x,
            y,
            width,
            height,
        } => (*x, *y, x + width, y + height),
        Area::Polygon { points } => polygon_bounds(points),
    };
    let (gx0, gy0) = grid.world_to_grid(x0, y0);
    let (gx1, gy1) = grid.world_to_grid(x1, y1);
    let gx0 = gx0.max(0);
    let gy0 = gy0.max(0);
    let gx1 = gx1.min(grid.cols() as i64 - 1);
    let gy1 = gy1.min(grid.rows() as i64 - 1);

    let mut written = 0;
    for gy in gy0..=gy1 {
        for gx in gx0..=gx1 {
            let (wx, wy) = grid.grid_to_world(gx, gy);
            if area_contains(area, wx, wy) {
                grid.set(gx, gy, state);
                written += 1;
            }
        }
    }
    written
}

fn polygon_bounds(points: &[Point]) -> (f64, f64, f64, f64) {
    let inf = f64::INFINITY;
    let mut b = (inf, inf, -inf, -inf);
    for p in points {
        b.0 = b.0.min(p.x);
        b.1 = b.1.min(p.y);
        b.2 = b.2.max(p.x);
        b.3 = b.3.max(p.y);
    }
    b
}
