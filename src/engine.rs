//! Fog engine: owns the grid, vision sources, blockers and the manual
//! area layer, and exposes every mutation the map UI can perform.
//!
//! The grid only ever holds the automatic visibility result. Manual
//! reveals live in the area layer and are unioned in at query time, so
//! two engines holding the same layer agree on every painted cell.
//! Hide operations also clear the grid cells they cover.
//!
//! All calls are synchronous. Source and blocker mutations end with a
//! visibility pass. Every mutating call emits exactly one
//! `FogEvent::Changed`.
//!
//! The engine has no internal locking. Share it across threads behind a
//! single mutex.

use crossbeam::channel::Receiver;
use log::{debug, info};

use crate::area::{paint_area, validate_area, AreaLayer};
use crate::collision::point_in_circle;
use crate::error::FogError;
use crate::events::{EventHub, FogEvent};
use crate::grid::{Census, FogGrid};
use crate::types::{
    Area, Blocker, BrushMode, BrushStroke, CellState, FogConfig,
    FogSettings, FogStateExport, Point, VisionSource, VisionSourcePatch,
    FOG_VERSION,
};
use crate::visibility::{compute_visibility, RayParams};

#[derive(Debug)]
pub struct FogEngine {
    config: FogConfig,
    grid: Option<FogGrid>,
    map_size: Option<(f64, f64)>,
    sources: Vec<VisionSource>,
    blockers: Vec<Blocker>,
    layer: AreaLayer,
    brush_size: f64,
    events: EventHub,
}

impl FogEngine {
    /// Engine with no map loaded. Area operations fail with
    /// `NotInitialized` until `initialize` is called.
    pub fn new(config: FogConfig) -> Result<Self, FogError> {
        config.validate()?;
        let brush_size = config.clamp_brush(config.default_brush_size);
        Ok(Self {
            config,
            grid: None,
            map_size: None,
            sources: Vec::new(),
            blockers: Vec::new(),
            layer: AreaLayer::new(),
            brush_size,
            events: EventHub::new(),
        })
    }

    pub fn with_map(
        config: FogConfig,
        map_width: f64,
        map_height: f64,
    ) -> Result<Self, FogError> {
        let mut engine = Self::new(config)?;
        engine.initialize(map_width, map_height);
        Ok(engine)
    }

    /// Rebuild an engine from an export. The grid takes the export's
    /// dimensions and cell size; no visibility pass is run.
    ///
    /// The cell count is checked against the exported bytes before
    /// anything is allocated.
    pub fn from_export(
        config: FogConfig,
        state: FogStateExport,
    ) -> Result<Self, FogError> {
        check_grid_len(&state)?;
        let mut engine = Self::new(FogConfig {
            cell_size: state.cell_size,
            ..config
        })?;
        engine.grid =
            Some(FogGrid::new(state.cols, state.rows, state.cell_size));
        engine.map_size = Some((
            state.cols as f64 * state.cell_size,
            state.rows as f64 * state.cell_size,
        ));
        engine.import_state(state)?;
        Ok(engine)
    }

    /// Build a fresh all-hidden grid covering the map. Sources, blockers
    /// and painted areas are kept and the visibility pass is rerun.
    pub fn initialize(&mut self, map_width: f64, map_height: f64) {
        let grid =
            FogGrid::for_map(map_width, map_height, self.config.cell_size);
        info!(
            "fog grid initialized: {}x{} cells of {} units",
            grid.cols(),
            grid.rows(),
            grid.cell_size()
        );
        self.grid = Some(grid);
        self.map_size = Some((map_width, map_height));
        self.recompute();
    }

    // -- Accessors -------------------------------------------------

    pub fn config(&self) -> &FogConfig {
        &self.config
    }

    /// The automatic visibility result. Use `state_at` for what a
    /// viewer actually sees.
    pub fn grid(&self) -> Option<&FogGrid> {
        self.grid.as_ref()
    }

    pub fn map_size(&self) -> Option<(f64, f64)> {
        self.map_size
    }

    pub fn sources(&self) -> &[VisionSource] {
        &self.sources
    }

    pub fn blockers(&self) -> &[Blocker] {
        &self.blockers
    }

    pub fn areas(&self) -> &[Area] {
        self.layer.areas()
    }

    pub fn settings(&self) -> &FogSettings {
        self.layer.settings()
    }

    pub fn brush_size(&self) -> f64 {
        self.brush_size
    }

    pub fn subscribe(&mut self) -> Receiver<FogEvent> {
        self.events.subscribe()
    }

    fn notify(&mut self) {
        self.events.emit(FogEvent::Changed);
    }

    fn require_grid(&self) -> Result<&FogGrid, FogError> {
        self.grid.as_ref().ok_or(FogError::NotInitialized)
    }

    fn grid_mut(&mut self) -> Result<&mut FogGrid, FogError> {
        self.grid.as_mut().ok_or(FogError::NotInitialized)
    }

    // -- Visibility ------------------------------------------------

    /// Rerun the visibility pass and notify. Without a grid only the
    /// notification fires.
    pub fn recompute(&mut self) {
        let params = RayParams {
            ray_count: self.config.ray_count,
            ray_step: self.config.ray_step,
        };
        if let Some(grid) = self.grid.as_mut() {
            let stats = compute_visibility(
                grid,
                &self.sources,
                &self.blockers,
                &params,
            );
            debug!(
                "visibility pass: {} sources, {} rays, {} blocked",
                self.sources.len(),
                stats.rays,
                stats.blocked_rays
            );
        }
        self.notify();
    }

    pub fn add_vision_source(&mut self, source: VisionSource) {
        self.sources.push(source);
        self.recompute();
    }

    /// Remove every source positioned within `radius` of (x, y).
    /// Returns how many were removed.
    pub fn remove_vision_source(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
    ) -> usize {
        let before = self.sources.len();
        self.sources
            .retain(|s| !point_in_circle(s.x, s.y, x, y, radius));
        let removed = before - self.sources.len();
        self.recompute();
        removed
    }

    pub fn remove_vision_source_at(
        &mut self,
        index: usize,
    ) -> Option<VisionSource> {
        if index >= self.sources.len() {
            return None;
        }
        let removed = self.sources.remove(index);
        self.recompute();
        Some(removed)
    }

    /// Partially update one source. Returns false if `index` is out of
    /// range, in which case nothing happens.
    pub fn update_vision_source(
        &mut self,
        index: usize,
        patch: &VisionSourcePatch,
    ) -> bool {
        match self.sources.get_mut(index) {
            Some(source) => {
                patch.apply(source);
                self.recompute();
                true
            }
            None => false,
        }
    }

    pub fn clear_vision_sources(&mut self) {
        self.sources.clear();
        self.recompute();
    }

    /// Replace the whole source list with the latest snapshot from the
    /// map.
    pub fn update_vision_sources(&mut self, sources: Vec<VisionSource>) {
        self.sources = sources;
        self.recompute();
    }

    pub fn add_blocker(&mut self, blocker: Blocker) {
        self.blockers.push(blocker);
        self.recompute();
    }

    pub fn set_blockers(&mut self, blockers: Vec<Blocker>) {
        self.blockers = blockers;
        self.recompute();
    }

    pub fn clear_blockers(&mut self) {
        self.blockers.clear();
        self.recompute();
    }

    // -- Manual areas ----------------------------------------------

    fn reveal(&mut self, area: Area) -> Result<(), FogError> {
        validate_area(&area)?;
        self.require_grid()?;
        self.layer.add(area)?;
        self.notify();
        Ok(())
    }

    /// Record a revealed circle of `radius` around the world point
    /// (x, y). Cells whose center it covers read as `Visible`.
    pub fn reveal_area(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
    ) -> Result<(), FogError> {
        self.reveal(Area::Circle { x, y, radius })
    }

    /// Hide every cell within `radius` of (x, y) and drop area records
    /// whose center falls inside the brush. Returns the number of
    /// records dropped.
    pub fn hide_area(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
    ) -> Result<usize, FogError> {
        let area = Area::Circle { x, y, radius };
        validate_area(&area)?;
        paint_area(self.grid_mut()?, &area, CellState::Hidden);
        let removed = self.layer.remove_centered_within(x, y, radius);
        self.notify();
        Ok(removed)
    }

    pub fn reveal_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), FogError> {
        self.reveal(Area::Rectangle {
            x,
            y,
            width,
            height,
        })
    }

    /// Hide the cells under a rectangle and drop area records whose
    /// center lies inside it.
    pub fn hide_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<usize, FogError> {
        let area = Area::Rectangle {
            x,
            y,
            width,
            height,
        };
        validate_area(&area)?;
        paint_area(self.grid_mut()?, &area, CellState::Hidden);
        let removed = self.layer.remove_centered_in_rect(x, y, width, height);
        self.notify();
        Ok(removed)
    }

    pub fn reveal_polygon(
        &mut self,
        points: Vec<Point>,
    ) -> Result<(), FogError> {
        self.reveal(Area::Polygon { points })
    }

    /// Raise the global-reveal flag; every cell reads as `Visible`.
    pub fn reveal_all(&mut self) -> Result<(), FogError> {
        self.require_grid()?;
        self.layer.reveal_all();
        self.notify();
        Ok(())
    }

    /// Set every cell hidden, clear the area list and drop the
    /// global-reveal flag.
    pub fn hide_all(&mut self) -> Result<(), FogError> {
        self.grid_mut()?.fill(CellState::Hidden);
        self.layer.hide_all();
        self.notify();
        Ok(())
    }

    /// Flip one cell between revealed and hidden using a cell-sized
    /// brush. Returns the cell's effective state afterwards.
    ///
    /// A single cell cannot be hidden under global reveal.
    pub fn toggle_cell(
        &mut self,
        gx: i64,
        gy: i64,
    ) -> Result<CellState, FogError> {
        let grid = self.require_grid()?;
        let (wx, wy) = grid.grid_to_world(gx, gy);
        let radius = grid.cell_size() / 2.0;
        if self.state_at(gx, gy) == CellState::Visible {
            if self.layer.settings().global_reveal {
                return Err(FogError::GlobalRevealActive);
            }
            self.hide_area(wx, wy, radius)?;
        } else {
            self.reveal_area(wx, wy, radius)?;
        }
        Ok(self.state_at(gx, gy))
    }

    /// Clamped to the configured brush bounds.
    pub fn set_brush_size(&mut self, size: f64) {
        self.brush_size = self.config.clamp_brush(size);
    }

    /// Apply one brush dab given in normalized map coordinates.
    pub fn apply_stroke(
        &mut self,
        stroke: &BrushStroke,
    ) -> Result<(), FogError> {
        let (w, h) = self.map_size.ok_or(FogError::NotInitialized)?;
        let x = stroke.u.clamp(0.0, 1.0) * w;
        let y = stroke.v.clamp(0.0, 1.0) * h;
        let radius = stroke.radius.unwrap_or(self.brush_size);
        match stroke.mode {
            BrushMode::Reveal => self.reveal_area(x, y, radius),
            BrushMode::Hide => self.hide_area(x, y, radius).map(|_| ()),
        }
    }

    // -- Queries ---------------------------------------------------

    /// Is this world point revealed by the manual layer?
    pub fn is_revealed(&self, x: f64, y: f64) -> bool {
        self.layer.contains(x, y)
    }

    /// Effective state of a cell: `Visible` when the manual layer covers
    /// its center, otherwise whatever the last visibility pass left.
    pub fn state_at(&self, gx: i64, gy: i64) -> CellState {
        let Some(grid) = self.grid.as_ref() else {
            return CellState::Hidden;
        };
        if !grid.in_bounds(gx, gy) {
            return CellState::Hidden;
        }
        let (wx, wy) = grid.grid_to_world(gx, gy);
        if self.layer.contains(wx, wy) {
            CellState::Visible
        } else {
            grid.get(gx, gy)
        }
    }

    /// Fog opacity over a world point. Zero when fog is disabled or no
    /// map is loaded.
    pub fn opacity_at(&self, x: f64, y: f64) -> f64 {
        if !self.layer.settings().enabled {
            return 0.0;
        }
        match self.grid.as_ref() {
            Some(grid) => {
                let (gx, gy) = grid.world_to_grid(x, y);
                self.state_at(gx, gy).opacity()
            }
            None => 0.0,
        }
    }

    /// Effective-state counts over the whole grid.
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        let Some(grid) = self.grid.as_ref() else {
            return census;
        };
        for gy in 0..grid.rows() as i64 {
            for gx in 0..grid.cols() as i64 {
                match self.state_at(gx, gy) {
                    CellState::Hidden => census.hidden += 1,
                    CellState::Explored => census.explored += 1,
                    CellState::Visible => census.visible += 1,
                }
            }
        }
        census
    }

    // -- Settings / remote state -----------------------------------

    pub fn set_settings(&mut self, settings: FogSettings) {
        self.layer.set_settings(settings);
        self.notify();
    }

    /// Replace the area list and settings wholesale. The grid needs no
    /// repair since painted reveals never enter it.
    pub fn apply_remote(&mut self, areas: Vec<Area>, settings: FogSettings) {
        self.layer.replace(areas, settings);
        self.notify();
    }

    /// Replace the area list, keeping settings, and clear the
    /// global-reveal flag.
    pub fn replace_areas(&mut self, areas: Vec<Area>) {
        let mut settings = self.layer.settings().clone();
        settings.global_reveal = false;
        self.layer.replace(areas, settings);
        self.notify();
    }

    // -- Export / import -------------------------------------------

    pub fn export_state(&self) -> Result<FogStateExport, FogError> {
        let grid = self.require_grid()?;
        Ok(FogStateExport {
            version: FOG_VERSION,
            cols: grid.cols(),
            rows: grid.rows(),
            cell_size: grid.cell_size(),
            grid: grid.to_bytes(),
            sources: self.sources.clone(),
            blockers: self.blockers.clone(),
            areas: self.layer.areas().to_vec(),
            settings: self.layer.settings().clone(),
        })
    }

    /// Restore grid, sources, blockers and the manual layer verbatim.
    /// The grid is not recomputed, so restored cell states survive
    /// until the next pass. Nothing changes unless the whole export is
    /// valid.
    pub fn import_state(
        &mut self,
        state: FogStateExport,
    ) -> Result<(), FogError> {
        let grid = self.grid.as_mut().ok_or(FogError::NotInitialized)?;
        if state.cols != grid.cols()
            || state.rows != grid.rows()
            || state.cell_size != grid.cell_size()
        {
            return Err(FogError::SnapshotMismatch {
                cols: state.cols,
                rows: state.rows,
                cell_size: state.cell_size,
                expected_cols: grid.cols(),
                expected_rows: grid.rows(),
                expected_cell_size: grid.cell_size(),
            });
        }
        check_grid_len(&state)?;
        if let Some(&bad) = state
            .grid
            .iter()
            .find(|&&b| CellState::try_from(b).is_err())
        {
            return Err(FogError::InvalidCellState(bad));
        }
        for area in &state.areas {
            validate_area(area)?;
        }
        grid.load_bytes(&state.grid);
        self.sources = state.sources;
        self.blockers = state.blockers;
        self.layer.replace(state.areas, state.settings);
        self.notify();
        Ok(())
    }
}

/// The export must carry exactly `cols * rows` cell bytes.
fn check_grid_len(state: &FogStateExport) -> Result<(), FogError> {
    if state.cols.checked_mul(state.rows) == Some(state.grid.len()) {
        Ok(())
    } else {
        Err(FogError::GridLengthMismatch {
            cols: state.cols,
            rows: state.rows,
            len: state.grid.len(),
        })
    }
}
