//! Durable save/restore of the manual fog layer.
//!
//! Storage uses its own fixed cell resolution, independent of the live
//! grid. Saving rasterizes the area layer at that resolution (a cell is
//! revealed when its center is covered) and replaces every stored row
//! for the `(session, map)` pair. Loading turns each revealed row back
//! into a circle inscribed in its cell.
//!
//! Only manually revealed cells are stored; explored state from the
//! visibility pass is not.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::collision::point_in_any_area;
use crate::engine::FogEngine;
use crate::error::FogError;
use crate::types::{Area, FogRecord};

/// Row store for fog cells, e.g. a hosted database table keyed by
/// `(session_id, map_id, grid_x, grid_y)`.
#[allow(async_fn_in_trait)]
pub trait FogStore {
    /// Delete every row for the map.
    async fn delete_map(
        &self,
        session_id: &str,
        map_id: &str,
    ) -> Result<(), FogError>;

    async fn insert(&self, rows: Vec<FogRecord>) -> Result<(), FogError>;

    /// Rows with `is_revealed == true` for the map.
    async fn select_revealed(
        &self,
        session_id: &str,
        map_id: &str,
    ) -> Result<Vec<FogRecord>, FogError>;
}

/// In-memory store for tests and offline use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<FogRecord>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `FogError::Store`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<FogRecord> {
        self.rows.lock().clone()
    }

    fn check(&self) -> Result<(), FogError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(FogError::Store("store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl FogStore for MemoryStore {
    async fn delete_map(
        &self,
        session_id: &str,
        map_id: &str,
    ) -> Result<(), FogError> {
        self.check()?;
        self.rows
            .lock()
            .retain(|r| !(r.session_id == session_id && r.map_id == map_id));
        Ok(())
    }

    async fn insert(&self, rows: Vec<FogRecord>) -> Result<(), FogError> {
        self.check()?;
        self.rows.lock().extend(rows);
        Ok(())
    }

    async fn select_revealed(
        &self,
        session_id: &str,
        map_id: &str,
    ) -> Result<Vec<FogRecord>, FogError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|r| {
                r.session_id == session_id
                    && r.map_id == map_id
                    && r.is_revealed
            })
            .cloned()
            .collect())
    }
}

pub struct FogPersistence<S: FogStore> {
    store: S,
    cell_size: f64,
}

impl<S: FogStore> FogPersistence<S> {
    /// `storage_cell_size` must be finite and positive, as in
    /// `FogConfig::validate`.
    pub fn new(store: S, storage_cell_size: f64) -> Result<Self, FogError> {
        if !(storage_cell_size.is_finite() && storage_cell_size > 0.0) {
            return Err(FogError::InvalidConfig(format!(
                "storage_cell_size must be positive, got {storage_cell_size}"
            )));
        }
        Ok(Self {
            store,
            cell_size: storage_cell_size,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Storage grid `(cols, rows)` for a map of the given world size.
    pub fn storage_dims(&self, map_width: f64, map_height: f64) -> (i32, i32) {
        (
            (map_width / self.cell_size).ceil().max(0.0) as i32,
            (map_height / self.cell_size).ceil().max(0.0) as i32,
        )
    }

    /// Revealed rows for every storage cell whose center is covered by
    /// `areas` (or every cell under global reveal), row-major.
    pub fn rasterize(
        &self,
        session_id: &str,
        map_id: &str,
        areas: &[Area],
        global_reveal: bool,
        map_width: f64,
        map_height: f64,
    ) -> Vec<FogRecord> {
        let (cols, rows) = self.storage_dims(map_width, map_height);
        let cs = self.cell_size;
        (0..rows)
            .into_par_iter()
            .flat_map_iter(|gy| {
                (0..cols).filter_map(move |gx| {
                    let cx = (gx as f64 + 0.5) * cs;
                    let cy = (gy as f64 + 0.5) * cs;
                    if global_reveal || point_in_any_area(cx, cy, areas) {
                        Some(FogRecord {
                            session_id: session_id.to_string(),
                            map_id: map_id.to_string(),
                            grid_x: gx,
                            grid_y: gy,
                            is_revealed: true,
                        })
                    } else {
                        None
                    }
                })
            })
            .collect()
    }

    /// Replace all stored rows for the map with `rows`.
    pub async fn write(
        &self,
        session_id: &str,
        map_id: &str,
        rows: Vec<FogRecord>,
    ) -> Result<usize, FogError> {
        let count = rows.len();
        let result = async {
            self.store.delete_map(session_id, map_id).await?;
            if !rows.is_empty() {
                self.store.insert(rows).await?;
            }
            Ok::<(), FogError>(())
        }
        .await;
        match result {
            Ok(()) => {
                info!(
                    "fog saved: {session_id}/{map_id}, {count} revealed cells"
                );
                Ok(count)
            }
            Err(e) => {
                warn!("fog save failed for {session_id}/{map_id}: {e}");
                Err(e)
            }
        }
    }

    /// Rasterize the engine's area layer and replace the stored rows.
    pub async fn save_engine(
        &self,
        session_id: &str,
        map_id: &str,
        engine: &FogEngine,
    ) -> Result<usize, FogError> {
        let (w, h) = engine.map_size().ok_or(FogError::NotInitialized)?;
        let rows = self.rasterize(
            session_id,
            map_id,
            engine.areas(),
            engine.settings().global_reveal,
            w,
            h,
        );
        self.write(session_id, map_id, rows).await
    }

    /// Stored revealed cells as circles inscribed in their storage cell.
    pub async fn load(
        &self,
        session_id: &str,
        map_id: &str,
    ) -> Result<Vec<Area>, FogError> {
        let rows = self
            .store
            .select_revealed(session_id, map_id)
            .await
            .map_err(|e| {
                warn!("fog load failed for {session_id}/{map_id}: {e}");
                e
            })?;
        let cs = self.cell_size;
        let areas: Vec<Area> = rows
            .iter()
            .filter(|r| r.is_revealed)
            .map(|r| Area::Circle {
                x: (r.grid_x as f64 + 0.5) * cs,
                y: (r.grid_y as f64 + 0.5) * cs,
                radius: cs / 2.0,
            })
            .collect();
        info!(
            "fog loaded: {session_id}/{map_id}, {} revealed cells",
            areas.len()
        );
        Ok(areas)
    }

    /// Load and replace the engine's area list. On failure the engine is
    /// left untouched.
    pub async fn load_into(
        &self,
        session_id: &str,
        map_id: &str,
        engine: &mut FogEngine,
    ) -> Result<usize, FogError> {
        let areas = self.load(session_id, map_id).await?;
        let count = areas.len();
        engine.replace_areas(areas);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FogConfig, VisionSource};

    fn engine() -> FogEngine {
        FogEngine::with_map(FogConfig::default(), 500.0, 400.0).unwrap()
    }

    fn persistence() -> FogPersistence<MemoryStore> {
        FogPersistence::new(MemoryStore::new(), 50.0).unwrap()
    }

    #[test]
    fn degenerate_storage_cell_size_rejected() {
        for size in [0.0, -50.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                FogPersistence::new(MemoryStore::new(), size),
                Err(FogError::InvalidConfig(_))
            ));
        }
    }

    #[tokio::test]
    async fn round_trip_matches_at_cell_centers() {
        let mut original = engine();
        original.reveal_area(100.0, 100.0, 60.0).unwrap();
        original.reveal_area(300.0, 250.0, 80.0).unwrap();
        original.reveal_area(450.0, 50.0, 30.0).unwrap();

        let p = persistence();
        let saved = p.save_engine("s1", "m1", &original).await.unwrap();
        assert!(saved > 0);

        let mut restored = engine();
        let loaded = p.load_into("s1", "m1", &mut restored).await.unwrap();
        assert_eq!(loaded, saved);

        let (cols, rows) = p.storage_dims(500.0, 400.0);
        for gy in 0..rows {
            for gx in 0..cols {
                let x = (gx as f64 + 0.5) * 50.0;
                let y = (gy as f64 + 0.5) * 50.0;
                assert_eq!(
                    restored.is_revealed(x, y),
                    original.is_revealed(x, y),
                    "mismatch at ({x}, {y})"
                );
            }
        }
    }

    #[tokio::test]
    async fn save_replaces_previous_rows_for_the_map_only() {
        let p = persistence();
        let mut e = engine();
        e.reveal_area(100.0, 100.0, 100.0).unwrap();
        p.save_engine("s1", "m1", &e).await.unwrap();
        p.save_engine("s1", "m2", &e).await.unwrap();
        let m2_rows =
            p.store().select_revealed("s1", "m2").await.unwrap().len();

        e.hide_all().unwrap();
        e.reveal_area(25.0, 25.0, 1.0).unwrap();
        assert_eq!(p.save_engine("s1", "m1", &e).await.unwrap(), 1);
        let m1_rows = p.store().select_revealed("s1", "m1").await.unwrap();
        assert_eq!(m1_rows.len(), 1);
        assert_eq!(
            p.store().select_revealed("s1", "m2").await.unwrap().len(),
            m2_rows
        );
    }

    #[tokio::test]
    async fn explored_cells_are_not_persisted() {
        let p = persistence();
        let mut e = engine();
        e.add_vision_source(VisionSource::new(200.0, 200.0, 150.0));
        e.clear_vision_sources();
        assert!(e.census().explored > 0);
        assert_eq!(p.save_engine("s1", "m1", &e).await.unwrap(), 0);
        assert!(p.store().rows().is_empty());
    }

    #[tokio::test]
    async fn global_reveal_saves_every_cell() {
        let p = persistence();
        let mut e = engine();
        e.reveal_all().unwrap();
        assert_eq!(p.save_engine("s1", "m1", &e).await.unwrap(), 10 * 8);
    }

    #[tokio::test]
    async fn store_failure_is_recoverable() {
        let p = persistence();
        let mut e = engine();
        e.reveal_area(100.0, 100.0, 60.0).unwrap();
        p.store().set_failing(true);
        assert!(matches!(
            p.save_engine("s1", "m1", &e).await,
            Err(FogError::Store(_))
        ));
        assert!(matches!(
            p.load_into("s1", "m1", &mut e).await,
            Err(FogError::Store(_))
        ));
        assert_eq!(e.areas().len(), 1);

        p.store().set_failing(false);
        assert!(p.save_engine("s1", "m1", &e).await.is_ok());
    }

    #[tokio::test]
    async fn save_without_map_fails_fast() {
        let p = persistence();
        let e = FogEngine::new(FogConfig::default()).unwrap();
        assert!(matches!(
            p.save_engine("s1", "m1", &e).await,
            Err(FogError::NotInitialized)
        ));
    }

    #[test]
    fn rasterize_is_row_major() {
        let p = persistence();
        let areas = vec![Area::Rectangle {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        }];
        let rows = p.rasterize("s", "m", &areas, false, 200.0, 200.0);
        let cells: Vec<(i32, i32)> =
            rows.iter().map(|r| (r.grid_x, r.grid_y)).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }
}
