//! Error type shared by the engine and its adapters.
//!
//! Grid reads/writes and the raycasting pass never fail; everything
//! here is either a caller bug (fail fast) or a transport/store
//! failure the caller can recover from.

#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error("fog grid not initialized; call initialize() first")]
    NotInitialized,

    #[error("polygon area needs at least 3 points, got {points}")]
    InvalidPolygon { points: usize },

    #[error("invalid radius: {0}")]
    InvalidRadius(f64),

    #[error("invalid rectangle extent: {width}x{height}")]
    InvalidExtent { width: f64, height: f64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(
        "snapshot is {cols}x{rows} @ {cell_size}, \
         live grid is {expected_cols}x{expected_rows} @ {expected_cell_size}"
    )]
    SnapshotMismatch {
        cols: usize,
        rows: usize,
        cell_size: f64,
        expected_cols: usize,
        expected_rows: usize,
        expected_cell_size: f64,
    },

    #[error("snapshot grid has {len} cells, {cols}x{rows} needs {cols}*{rows}")]
    GridLengthMismatch { cols: usize, rows: usize, len: usize },

    #[error("invalid cell state byte: {0}")]
    InvalidCellState(u8),

    #[error("cell cannot be hidden while global reveal is on")]
    GlobalRevealActive,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
