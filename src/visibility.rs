//! Line-of-sight pass over the fog grid.
//!
//! Each vision source casts a fixed fan of rays (one per degree by
//! default) and marches them outward in sub-cell steps, lighting every
//! cell it passes until a blocker is hit. The blocking cell itself is
//! lit; everything behind it on that ray stays dark.

use crate::collision::{blocker_rect, rects_overlap, Rect};
use crate::grid::FogGrid;
use crate::types::{Blocker, CellState, VisionSource};

/// Sampling parameters for a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayParams {
    /// Rays per full circle.
    pub ray_count: u32,
    /// March step in grid units.
    pub ray_step: f64,
}

impl Default for RayParams {
    fn default() -> Self {
        Self {
            ray_count: 360,
            ray_step: 0.3,
        }
    }
}

/// Summary of one pass, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub rays: usize,
    pub blocked_rays: usize,
}

/// Round to nearest, ties toward positive infinity.
///
/// `f64::round` sends -0.5 to -1; this sends it to 0, so a source
/// sitting exactly on a cell boundary lands in the same cell on every
/// axis and sign.
#[inline]
pub fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Per-cell opacity, precomputed once per pass so the march loop only
/// does an index lookup.
struct BlockMap {
    cols: usize,
    blocked: Vec<bool>,
}

impl BlockMap {
    fn build(grid: &FogGrid, blockers: &[Blocker]) -> Self {
        let cols = grid.cols();
        let rows = grid.rows();
        let mut blocked = vec![false; cols * rows];
        if cols == 0 || rows == 0 {
            return Self { cols, blocked };
        }
        let cs = grid.cell_size();
        let rects: Vec<Rect> = blockers.iter().map(blocker_rect).collect();
        for r in &rects {
            // Candidate cell range; exact interior overlap decides.
            let x0 = ((r.0 / cs).floor() as i64).max(0);
            let y0 = ((r.1 / cs).floor() as i64).max(0);
            let x1 = ((r.2 / cs).ceil() as i64).min(cols as i64 - 1);
            let y1 = ((r.3 / cs).ceil() as i64).min(rows as i64 - 1);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    if rects_overlap(&grid.cell_rect(x, y), r) {
                        blocked[y as usize * cols + x as usize] = true;
                    }
                }
            }
        }
        Self { cols, blocked }
    }

    /// Caller guarantees (x, y) is in bounds.
    #[inline]
    fn is_blocked(&self, x: i64, y: i64) -> bool {
        self.blocked[y as usize * self.cols + x as usize]
    }
}

/// Ray angles in degrees for one source.
///
/// Full circle: `ray_count` evenly spaced rays starting at 0°.
/// Cone: same angular spacing, from `angle - fov/2` to `angle + fov/2`
/// inclusive. A cone of 360° or more is treated as a full circle.
pub fn ray_angles(source: &VisionSource, ray_count: u32) -> Vec<f64> {
    let spacing = 360.0 / ray_count.max(1) as f64;
    match source.cone_params() {
        Some((angle, fov)) if fov < 360.0 => {
            let fov = fov.max(0.0);
            let start = angle - fov / 2.0;
            let n = (fov / spacing + 1e-9).floor() as usize;
            (0..=n).map(|k| start + k as f64 * spacing).collect()
        }
        _ => (0..ray_count).map(|k| k as f64 * spacing).collect(),
    }
}

/// March a single ray, lighting cells until a blocker or the radius.
/// Returns true if the ray was stopped by a blocker.
fn march_ray(
    grid: &mut FogGrid,
    blocks: &BlockMap,
    origin: (f64, f64),
    angle_deg: f64,
    max_dist: f64,
    step: f64,
) -> bool {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    if !(sin.is_finite() && cos.is_finite()) {
        return false;
    }
    let mut k: u64 = 0;
    loop {
        let d = k as f64 * step;
        // Also false for NaN, which would otherwise never terminate.
        if !(d <= max_dist) {
            return false;
        }
        let cx = round_half_up(origin.0 + cos * d);
        let cy = round_half_up(origin.1 + sin * d);
        if grid.in_bounds(cx, cy) {
            let hit = blocks.is_blocked(cx, cy);
            grid.set(cx, cy, CellState::Visible);
            if hit {
                return true;
            }
        }
        k += 1;
    }
}

/// Distance from `origin` to the farthest grid corner, in grid units.
/// No cell lies farther out along any ray.
fn reach_limit(grid: &FogGrid, origin: (f64, f64)) -> f64 {
    let w = grid.cols() as f64;
    let h = grid.rows() as f64;
    let dx = origin.0.abs().max((w - origin.0).abs());
    let dy = origin.1.abs().max((h - origin.1).abs());
    dx.hypot(dy) + 1.0
}

/// Recompute visibility: downgrade last pass's `Visible` cells to
/// `Explored`, then light everything each source can see.
///
/// Deterministic for a fixed grid size, source list and blocker list.
/// Sources with non-finite coordinates or radius, and a non-positive
/// step, light nothing.
pub fn compute_visibility(
    grid: &mut FogGrid,
    sources: &[VisionSource],
    blockers: &[Blocker],
    params: &RayParams,
) -> PassStats {
    grid.downgrade_visible_to_explored();

    let mut stats = PassStats::default();
    if sources.is_empty() || grid.cols() == 0 || grid.rows() == 0 {
        return stats;
    }

    let cs = grid.cell_size();
    let step = params.ray_step;
    if !(step.is_finite() && step > 0.0 && cs.is_finite() && cs > 0.0) {
        return stats;
    }
    let blocks = BlockMap::build(grid, blockers);

    for source in sources {
        let origin = (source.x / cs, source.y / cs);
        let max_dist = source.radius / cs;
        if !(origin.0.is_finite() && origin.1.is_finite() && max_dist >= 0.0) {
            continue;
        }
        let max_dist = max_dist.min(reach_limit(grid, origin));
        for angle in ray_angles(source, params.ray_count) {
            stats.rays += 1;
            if march_ray(grid, &blocks, origin, angle, max_dist, step) {
                stats.blocked_rays += 1;
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        grid: &mut FogGrid,
        sources: &[VisionSource],
        blockers: &[Blocker],
    ) -> PassStats {
        compute_visibility(grid, sources, blockers, &RayParams::default())
    }

    #[test]
    fn rounding_ties_go_up() {
        assert_eq!(round_half_up(0.5), 1);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(1.49), 1);
        assert_eq!(round_half_up(-1.5), -1);
        assert_eq!(round_half_up(2.5), 3);
    }

    #[test]
    fn full_circle_angles() {
        let angles = ray_angles(&VisionSource::new(0.0, 0.0, 1.0), 360);
        assert_eq!(angles.len(), 360);
        assert_eq!(angles[0], 0.0);
        assert!((angles[359] - 359.0).abs() < 1e-9);
    }

    #[test]
    fn cone_angles_cover_both_edges() {
        let cone = VisionSource::cone(0.0, 0.0, 1.0, 90.0, 60.0);
        let angles = ray_angles(&cone, 360);
        assert_eq!(angles.len(), 61);
        assert!((angles[0] - 60.0).abs() < 1e-9);
        assert!((angles[60] - 120.0).abs() < 1e-9);
    }

    #[test]
    fn wide_cone_is_full_circle() {
        let cone = VisionSource::cone(0.0, 0.0, 1.0, 0.0, 400.0);
        let angles = ray_angles(&cone, 360);
        assert_eq!(angles.len(), 360);
    }

    #[test]
    fn open_field_lights_radius() {
        let mut g = FogGrid::new(10, 10, 1.0);
        run(&mut g, &[VisionSource::new(5.0, 5.0, 3.0)], &[]);
        assert_eq!(g.get(5, 5), CellState::Visible);
        assert_eq!(g.get(8, 5), CellState::Visible);
        assert_eq!(g.get(5, 2), CellState::Visible);
        assert_eq!(g.get(9, 5), CellState::Hidden);
        assert_eq!(g.get(0, 0), CellState::Hidden);
    }

    #[test]
    fn no_sources_only_downgrades() {
        let mut g = FogGrid::new(3, 3, 1.0);
        g.set(1, 1, CellState::Visible);
        let stats = run(&mut g, &[], &[]);
        assert_eq!(stats.rays, 0);
        assert_eq!(g.get(1, 1), CellState::Explored);
    }

    #[test]
    fn blocker_occludes_target_but_is_lit() {
        let mut g = FogGrid::new(10, 10, 1.0);
        let source = VisionSource::new(0.0, 0.0, 20.0);
        let wall = Blocker::new(5.0, 0.0, 1.0, 1.0);
        let stats = run(&mut g, &[source], &[wall]);
        assert!(stats.blocked_rays > 0);
        assert_eq!(g.get(5, 0), CellState::Visible);
        assert_ne!(g.get(8, 0), CellState::Visible);
        assert_ne!(g.get(9, 0), CellState::Visible);
        // Off-axis cells are still reachable.
        assert_eq!(g.get(8, 4), CellState::Visible);
    }

    #[test]
    fn moving_source_leaves_explored_trail() {
        let mut g = FogGrid::new(20, 1, 1.0);
        run(&mut g, &[VisionSource::new(2.0, 0.0, 1.0)], &[]);
        assert_eq!(g.get(2, 0), CellState::Visible);
        run(&mut g, &[VisionSource::new(15.0, 0.0, 1.0)], &[]);
        assert_eq!(g.get(2, 0), CellState::Explored);
        assert_eq!(g.get(15, 0), CellState::Visible);
        assert_eq!(g.get(8, 0), CellState::Hidden);
    }

    #[test]
    fn recompute_is_deterministic() {
        let sources = vec![
            VisionSource::new(12.3, 7.7, 9.0),
            VisionSource::cone(3.0, 15.0, 12.0, 45.0, 90.0),
        ];
        let blockers = vec![
            Blocker::new(8.0, 4.0, 2.0, 6.0),
            Blocker::new(2.0, 10.0, 5.0, 1.0),
        ];
        let mut g = FogGrid::new(20, 20, 1.0);
        run(&mut g, &sources, &blockers);
        let first = g.clone();
        run(&mut g, &sources, &blockers);
        assert_eq!(g, first);
    }

    #[test]
    fn cone_does_not_see_behind() {
        let mut g = FogGrid::new(21, 21, 1.0);
        run(&mut g, &[VisionSource::cone(10.0, 10.0, 8.0, 0.0, 90.0)], &[]);
        assert_eq!(g.get(16, 10), CellState::Visible);
        assert_eq!(g.get(4, 10), CellState::Hidden);
    }

    #[test]
    fn source_outside_grid_is_harmless() {
        let mut g = FogGrid::new(5, 5, 1.0);
        run(&mut g, &[VisionSource::new(-3.0, 2.0, 5.0)], &[]);
        assert_eq!(g.get(0, 2), CellState::Visible);
        assert_eq!(g.get(4, 4), CellState::Hidden);
    }

    #[test]
    fn non_finite_sources_light_nothing() {
        let mut g = FogGrid::new(5, 5, 1.0);
        let sources = [
            VisionSource::new(2.0, 2.0, f64::NAN),
            VisionSource::new(f64::NAN, 2.0, 3.0),
            VisionSource::new(2.0, 2.0, -1.0),
            VisionSource::cone(2.0, 2.0, 3.0, f64::NAN, 90.0),
        ];
        run(&mut g, &sources, &[]);
        assert_eq!(g.census().visible, 0);
    }

    #[test]
    fn unbounded_radius_stops_at_grid_edge() {
        let mut g = FogGrid::new(6, 4, 1.0);
        run(&mut g, &[VisionSource::new(1.0, 1.0, f64::INFINITY)], &[]);
        assert_eq!(g.census().visible, 24);
    }

    #[test]
    fn degenerate_step_is_skipped() {
        let mut g = FogGrid::new(5, 5, 1.0);
        for step in [0.0, -0.3, f64::NAN] {
            let params = RayParams {
                ray_step: step,
                ..RayParams::default()
            };
            let sources = [VisionSource::new(2.0, 2.0, 3.0)];
            let stats = compute_visibility(&mut g, &sources, &[], &params);
            assert_eq!(stats.rays, 0);
        }
        assert_eq!(g.census().visible, 0);
    }

    #[test]
    fn world_units_scale_by_cell_size() {
        let mut g = FogGrid::new(10, 10, 40.0);
        run(&mut g, &[VisionSource::new(200.0, 200.0, 80.0)], &[]);
        assert_eq!(g.get(5, 5), CellState::Visible);
        assert_eq!(g.get(7, 5), CellState::Visible);
        assert_eq!(g.get(8, 5), CellState::Hidden);
    }
}
