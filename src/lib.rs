//! Fog-of-war engine for tabletop battle maps.
//!
//! Tracks per-cell visibility (hidden / explored / visible), recomputes
//! it from moving vision sources with angular raycasting against opaque
//! blockers, and keeps a manually painted area layer that is
//! synchronized between viewers and persisted per map.
//!
//! With the `python` feature, exposes `recompute_json`, which accepts
//! a JSON string (`RecomputeParams`) and returns a JSON string (the
//! recomputed `FogStateExport`).

pub mod area;
pub mod collision;
pub mod engine;
pub mod error;
pub mod events;
pub mod grid;
pub mod persistence;
pub mod sync;
pub mod types;
pub mod visibility;

pub use engine::FogEngine;
pub use error::FogError;

/// Run one visibility pass over an exported state.
///
/// Takes a JSON string matching `RecomputeParams` and returns the
/// recomputed `FogStateExport` as JSON.
pub fn recompute_json_str(params_json: &str) -> Result<String, FogError> {
    let params: types::RecomputeParams = serde_json::from_str(params_json)?;
    let mut engine = FogEngine::from_export(params.config, params.state)?;
    engine.recompute();
    let state = engine.export_state()?;
    Ok(serde_json::to_string(&state)?)
}

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;

    #[pyfunction]
    fn recompute_json(params_json: &str) -> PyResult<String> {
        super::recompute_json_str(params_json).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "fog recompute failed: {e}"
            ))
        })
    }

    /// Fog engine, importable from Python.
    #[pymodule]
    fn fog_engine(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(recompute_json, m)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellState, FogStateExport};

    #[test]
    fn recompute_json_lights_cells() {
        let json = r#"{
            "config": {"ray_count": 360},
            "state": {
                "cols": 5,
                "rows": 5,
                "cell_size": 10.0,
                "grid": [0,0,0,0,0, 0,0,0,0,0, 0,0,0,0,0,
                         0,0,0,0,0, 0,0,0,0,2],
                "sources": [{"x": 20.0, "y": 20.0, "radius": 10.0}],
                "blockers": []
            }
        }"#;
        let out = recompute_json_str(json).expect("recompute");
        let state: FogStateExport =
            serde_json::from_str(&out).expect("deserialize");
        assert_eq!(state.grid[2 * 5 + 2], CellState::Visible.as_u8());
        // The previously visible corner fell back to explored.
        assert_eq!(state.grid[24], CellState::Explored.as_u8());
        assert_eq!(state.sources.len(), 1);
    }

    #[test]
    fn recompute_json_rejects_short_grid() {
        let json = r#"{"state": {
            "cols": 2, "rows": 2, "cell_size": 1.0, "grid": [0]
        }}"#;
        assert!(matches!(
            recompute_json_str(json),
            Err(FogError::GridLengthMismatch { .. })
        ));
    }

    #[test]
    fn recompute_json_rejects_oversized_dimensions() {
        let json = r#"{"state": {
            "cols": 4000000000000, "rows": 1, "cell_size": 1.0, "grid": []
        }}"#;
        assert!(matches!(
            recompute_json_str(json),
            Err(FogError::GridLengthMismatch { len: 0, .. })
        ));
    }

    #[test]
    fn recompute_json_keeps_painted_areas() {
        let json = r#"{"state": {
            "cols": 2, "rows": 1, "cell_size": 10.0, "grid": [0, 0],
            "areas": [{"type": "circle", "x": 5.0, "y": 5.0, "radius": 3.0}]
        }}"#;
        let out = recompute_json_str(json).expect("recompute");
        let state: FogStateExport =
            serde_json::from_str(&out).expect("deserialize");
        assert_eq!(state.areas.len(), 1);
        assert_eq!(state.grid, vec![0, 0]);
    }

    #[test]
    fn recompute_json_rejects_garbage() {
        assert!(matches!(
            recompute_json_str("not json"),
            Err(FogError::Serialization(_))
        ));
    }
}
