//! Data types for the fog engine and its wire/storage formats.
//!
//! Every struct here derives Serialize + Deserialize so it can
//! round-trip through the JSON interchange used by the export,
//! sync and persistence layers.

use serde::{Deserialize, Serialize};

use crate::error::FogError;

/// Export format version written by `FogEngine::export_state`.
pub const FOG_VERSION: u32 = 1;

// -- Cells ---------------------------------------------------------

/// Visibility state of one grid cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    /// Never seen.
    #[default]
    Hidden,
    /// Seen before, not seen now.
    Explored,
    /// Seen right now.
    Visible,
}

impl CellState {
    pub fn as_u8(self) -> u8 {
        match self {
            CellState::Hidden => 0,
            CellState::Explored => 1,
            CellState::Visible => 2,
        }
    }

    /// Render opacity of the fog over a cell in this state.
    pub fn opacity(self) -> f64 {
        match self {
            CellState::Hidden => 1.0,
            CellState::Explored => 0.3,
            CellState::Visible => 0.0,
        }
    }
}

impl TryFrom<u8> for CellState {
    type Error = FogError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CellState::Hidden),
            1 => Ok(CellState::Explored),
            2 => Ok(CellState::Visible),
            other => Err(FogError::InvalidCellState(other)),
        }
    }
}

// -- Sources / blockers --------------------------------------------

/// A token's eyes or a light. `angle` and `fov` are in degrees; when
/// both are present the source only sees inside that cone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSource {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<f64>,
}

impl VisionSource {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self {
            x,
            y,
            radius,
            angle: None,
            fov: None,
        }
    }

    pub fn cone(x: f64, y: f64, radius: f64, angle: f64, fov: f64) -> Self {
        Self {
            x,
            y,
            radius,
            angle: Some(angle),
            fov: Some(fov),
        }
    }

    /// `(angle, fov)` when this source is directional.
    pub fn cone_params(&self) -> Option<(f64, f64)> {
        match (self.angle, self.fov) {
            (Some(a), Some(f)) => Some((a, f)),
            _ => None,
        }
    }
}

/// Partial update for a single vision source. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionSourcePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<f64>,
}

impl VisionSourcePatch {
    pub fn apply(&self, source: &mut VisionSource) {
        if let Some(x) = self.x {
            source.x = x;
        }
        if let Some(y) = self.y {
            source.y = y;
        }
        if let Some(r) = self.radius {
            source.radius = r;
        }
        if self.angle.is_some() {
            source.angle = self.angle;
        }
        if self.fov.is_some() {
            source.fov = self.fov;
        }
    }
}

/// Axis-aligned opaque rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Blocker {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

// -- Areas ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A manually painted region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Area {
    Circle { x: f64, y: f64, radius: f64 },
    Rectangle { x: f64, y: f64, width: f64, height: f64 },
    Polygon { points: Vec<Point> },
}

impl Area {
    /// Reference point used when a hide brush decides whether to
    /// remove this record. Circles use their center, rectangles their
    /// midpoint and polygons the vertex average.
    pub fn center(&self) -> (f64, f64) {
        match self {
            Area::Circle { x, y, .. } => (*x, *y),
            Area::Rectangle {
                x,
                y,
                width,
                height,
            } => (x + width / 2.0, y + height / 2.0),
            Area::Polygon { points } => {
                if points.is_empty() {
                    return (0.0, 0.0);
                }
                let n = points.len() as f64;
                let sx: f64 = points.iter().map(|p| p.x).sum();
                let sy: f64 = points.iter().map(|p| p.y).sum();
                (sx / n, sy / n)
            }
        }
    }
}

// -- Brush ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushMode {
    Reveal,
    Hide,
}

/// Pointer payload for one brush dab. `u`/`v` are normalized map
/// coordinates in [0, 1]; `radius` falls back to the engine's brush
/// size when absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrushStroke {
    pub u: f64,
    pub v: f64,
    pub mode: BrushMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

// -- Settings / config ---------------------------------------------

fn default_true() -> bool {
    true
}
fn default_fog_color() -> String {
    "#000000".to_string()
}
fn default_fog_opacity() -> f64 {
    0.8
}
fn default_blur_amount() -> f64 {
    10.0
}
fn default_transition_speed() -> f64 {
    0.5
}

/// Fog presentation settings shared between viewers of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FogSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub global_reveal: bool,
    #[serde(default = "default_fog_color")]
    pub fog_color: String,
    #[serde(default = "default_fog_opacity")]
    pub fog_opacity: f64,
    #[serde(default = "default_blur_amount")]
    pub blur_amount: f64,
    #[serde(default = "default_transition_speed")]
    pub transition_speed: f64,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            global_reveal: false,
            fog_color: default_fog_color(),
            fog_opacity: default_fog_opacity(),
            blur_amount: default_blur_amount(),
            transition_speed: default_transition_speed(),
        }
    }
}

fn default_cell_size() -> f64 {
    40.0
}
fn default_ray_count() -> u32 {
    360
}
fn default_ray_step() -> f64 {
    0.3
}
fn default_storage_cell_size() -> f64 {
    50.0
}
fn default_brush_size() -> f64 {
    150.0
}
fn default_min_brush_size() -> f64 {
    50.0
}
fn default_max_brush_size() -> f64 {
    500.0
}

/// Local engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogConfig {
    /// World units per live grid cell.
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    /// Rays per full circle.
    #[serde(default = "default_ray_count")]
    pub ray_count: u32,
    /// March step in grid units.
    #[serde(default = "default_ray_step")]
    pub ray_step: f64,
    /// World units per persisted cell. Independent of `cell_size`.
    #[serde(default = "default_storage_cell_size")]
    pub storage_cell_size: f64,
    #[serde(default = "default_brush_size")]
    pub default_brush_size: f64,
    #[serde(default = "default_min_brush_size")]
    pub min_brush_size: f64,
    #[serde(default = "default_max_brush_size")]
    pub max_brush_size: f64,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            ray_count: default_ray_count(),
            ray_step: default_ray_step(),
            storage_cell_size: default_storage_cell_size(),
            default_brush_size: default_brush_size(),
            min_brush_size: default_min_brush_size(),
            max_brush_size: default_max_brush_size(),
        }
    }
}

impl FogConfig {
    pub fn from_json(json: &str) -> Result<Self, FogError> {
        let config: FogConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FogError> {
        let positive = [
            ("cell_size", self.cell_size),
            ("ray_step", self.ray_step),
            ("storage_cell_size", self.storage_cell_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(FogError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.ray_count == 0 {
            return Err(FogError::InvalidConfig(
                "ray_count must be at least 1".into(),
            ));
        }
        if self.min_brush_size > self.max_brush_size {
            return Err(FogError::InvalidConfig(format!(
                "min_brush_size {} exceeds max_brush_size {}",
                self.min_brush_size, self.max_brush_size
            )));
        }
        Ok(())
    }

    pub fn clamp_brush(&self, size: f64) -> f64 {
        size.clamp(self.min_brush_size, self.max_brush_size)
    }
}

// -- Engine I/O ----------------------------------------------------

/// Plain-data snapshot of grid, sources, blockers and the manual layer
/// for local save/restore. `grid` holds one `CellState::as_u8` byte per
/// cell, row-major, and carries only the automatic visibility result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogStateExport {
    #[serde(default = "default_version")]
    pub version: u32,
    pub cols: usize,
    pub rows: usize,
    pub cell_size: f64,
    pub grid: Vec<u8>,
    #[serde(default)]
    pub sources: Vec<VisionSource>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub settings: FogSettings,
}

fn default_version() -> u32 {
    FOG_VERSION
}

/// Input to the JSON recompute entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeParams {
    #[serde(default)]
    pub config: FogConfig,
    pub state: FogStateExport,
}

/// Full fog state broadcast on a session channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub visible_areas: Vec<Area>,
    pub fog_settings: FogSettings,
    pub updated_by: String,
}

/// One persisted fog cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogRecord {
    pub session_id: String,
    pub map_id: String,
    pub grid_x: i32,
    pub grid_y: i32,
    pub is_revealed: bool,
}

// -- Tests ---------------------------------------------------------
