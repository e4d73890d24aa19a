//! Fixed-size cell grid holding per-cell visibility state.

use crate::types::CellState;

/// `cols × rows` cells, row-major. Knows nothing about sources or
/// blockers; `cell_size` only converts between world and grid space.
#[derive(Debug, Clone, PartialEq)]
pub struct FogGrid {
    cols: usize,
    rows: usize,
    cell_size: f64,
    data: Vec<CellState>,
}

/// Number of cells in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub hidden: usize,
    pub explored: usize,
    pub visible: usize,
}

impl FogGrid {
    pub fn new(cols: usize, rows: usize, cell_size: f64) -> Self {
        Self {
            cols,
            rows,
            cell_size,
            data: vec![CellState::Hidden; cols * rows],
        }
    }

    /// Grid covering a `map_width × map_height` world area.
    pub fn for_map(map_width: f64, map_height: f64, cell_size: f64) -> Self {
        let cols = (map_width / cell_size).ceil().max(0.0) as usize;
        let rows = (map_height / cell_size).ceil().max(0.0) as usize;
        Self::new(cols, rows, cell_size)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.cols + x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.cols && (y as usize) < self.rows
    }

    /// Out-of-bounds reads report `Hidden`.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> CellState {
        match self.index(x, y) {
            Some(i) => self.data[i],
            None => CellState::Hidden,
        }
    }

    /// Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, state: CellState) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = state;
        }
    }

    pub fn fill(&mut self, state: CellState) {
        self.data.fill(state);
    }

    /// Every `Visible` cell becomes `Explored`; other cells are untouched.
    pub fn downgrade_visible_to_explored(&mut self) {
        for cell in self.data.iter_mut() {
            if *cell == CellState::Visible {
                *cell = CellState::Explored;
            }
        }
    }

    /// Cell containing a world point (floor).
    pub fn world_to_grid(&self, world_x: f64, world_y: f64) -> (i64, i64) {
        (
            (world_x / self.cell_size).floor() as i64,
            (world_y / self.cell_size).floor() as i64,
        )
    }

    /// World-space center of a cell.
    pub fn grid_to_world(&self, x: i64, y: i64) -> (f64, f64) {
        (
            x as f64 * self.cell_size + self.cell_size / 2.0,
            y as f64 * self.cell_size + self.cell_size / 2.0,
        )
    }

    /// World rectangle `(min_x, min_y, max_x, max_y)` covered by a cell.
    pub fn cell_rect(&self, x: i64, y: i64) -> (f64, f64, f64, f64) {
        let cs = self.cell_size;
        (
            x as f64 * cs,
            y as f64 * cs,
            (x + 1) as f64 * cs,
            (y + 1) as f64 * cs,
        )
    }

    pub fn opacity(&self, x: i64, y: i64) -> f64 {
        self.get(x, y).opacity()
    }

    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for cell in &self.data {
            match cell {
                CellState::Hidden => census.hidden += 1,
                CellState::Explored => census.explored += 1,
                CellState::Visible => census.visible += 1,
            }
        }
        census
    }

    /// Coordinates of every cell currently in `state`, row-major.
    pub fn cells_in_state(&self, state: CellState) -> Vec<(i64, i64)> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == state)
            .map(|(i, _)| ((i % self.cols) as i64, (i / self.cols) as i64))
            .collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.iter().map(|c| c.as_u8()).collect()
    }

    /// Overwrite all cells from a byte slice of the same length.
    /// Returns false and leaves the grid untouched on a length mismatch
    /// or an unknown state byte.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != self.data.len() {
            return false;
        }
        let parsed: Result<Vec<CellState>, _> =
            bytes.iter().map(|&b| CellState::try_from(b)).collect();
        match parsed {
            Ok(cells) => {
                self.data = cells;
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_hidden() {
        let g = FogGrid::new(4, 3, 10.0);
        assert_eq!(g.census(), Census { hidden: 12, explored: 0, visible: 0 });
    }

    #[test]
    fn for_map_rounds_up() {
        let g = FogGrid::for_map(1920.0, 1290.0, 40.0);
        assert_eq!(g.cols(), 48);
        assert_eq!(g.rows(), 33);
    }

    #[test]
    fn out_of_bounds_set_is_noop() {
        let mut g = FogGrid::new(3, 3, 1.0);
        let before = g.clone();
        g.set(-1, 0, CellState::Visible);
        g.set(0, 3, CellState::Visible);
        g.set(3, 0, CellState::Visible);
        assert_eq!(g, before);
        assert_eq!(g.get(-5, -5), CellState::Hidden);
    }

    #[test]
    fn every_cell_has_a_state() {
        let mut g = FogGrid::new(5, 5, 1.0);
        g.set(1, 1, CellState::Visible);
        g.set(2, 2, CellState::Explored);
        let c = g.census();
        assert_eq!(c.hidden + c.explored + c.visible, 25);
    }

    #[test]
    fn downgrade_only_touches_visible() {
        let mut g = FogGrid::new(3, 1, 1.0);
        g.set(0, 0, CellState::Hidden);
        g.set(1, 0, CellState::Explored);
        g.set(2, 0, CellState::Visible);
        g.downgrade_visible_to_explored();
        assert_eq!(g.get(0, 0), CellState::Hidden);
        assert_eq!(g.get(1, 0), CellState::Explored);
        assert_eq!(g.get(2, 0), CellState::Explored);
    }

    #[test]
    fn downgrade_is_idempotent() {
        let mut g = FogGrid::new(4, 4, 1.0);
        g.set(0, 0, CellState::Visible);
        g.set(1, 2, CellState::Explored);
        g.set(3, 3, CellState::Visible);
        g.downgrade_visible_to_explored();
        let once = g.clone();
        g.downgrade_visible_to_explored();
        assert_eq!(g, once);
    }

    #[test]
    fn world_grid_conversion() {
        let g = FogGrid::new(10, 10, 40.0);
        assert_eq!(g.world_to_grid(85.0, 39.9), (2, 0));
        assert_eq!(g.grid_to_world(2, 0), (100.0, 20.0));
        assert_eq!(g.cell_rect(1, 2), (40.0, 80.0, 80.0, 120.0));
    }

    #[test]
    fn bytes_round_trip_and_reject_bad_input() {
        let mut g = FogGrid::new(2, 2, 1.0);
        g.set(1, 0, CellState::Visible);
        g.set(0, 1, CellState::Explored);
        let bytes = g.to_bytes();
        assert_eq!(bytes, vec![0, 2, 1, 0]);

        let mut other = FogGrid::new(2, 2, 1.0);
        assert!(other.load_bytes(&bytes));
        assert_eq!(other, g);
        assert!(!other.load_bytes(&[0, 0, 0]));
        assert!(!other.load_bytes(&[0, 9, 0, 0]));
        assert_eq!(other, g);
    }

    #[test]
    fn cells_in_state_lists_coordinates() {
        let mut g = FogGrid::new(3, 2, 1.0);
        g.set(2, 0, CellState::Visible);
        g.set(1, 1, CellState::Visible);
        assert_eq!(g.cells_in_state(CellState::Visible), vec![(2, 0), (1, 1)]);
    }
}
