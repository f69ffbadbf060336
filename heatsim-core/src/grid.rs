use std::ops::{Index, IndexMut};

use crate::error::{HeatError, HeatResult, PLATE_STORAGE};

/// Smallest plate side that still leaves one interior cell.
pub const MIN_SIDE: usize = 3;

/// Row-major temperature grid backed by one contiguous buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: usize,
    columns: usize,
    data: Vec<f64>,
}

/// Reserve a zeroed buffer, reporting failure instead of aborting.
pub(crate) fn alloc_cells(cells: usize, what: &'static str) -> HeatResult<Vec<f64>> {
    let mut data = Vec::new();
    data.try_reserve_exact(cells)
        .map_err(|_| HeatError::Allocation { what, cells })?;
    data.resize(cells, 0.0);
    Ok(data)
}

impl Grid {
    /// Zero-filled plate; running out of memory is an error, not an abort.
    pub fn new(rows: usize, columns: usize) -> HeatResult<Grid> {
        let cells = rows
            .checked_mul(columns)
            .ok_or_else(|| HeatError::grid(rows, columns, "cell count overflows"))?;
        Ok(Grid {
            rows,
            columns,
            data: alloc_cells(cells, PLATE_STORAGE)?,
        })
    }

    pub fn from_vec(rows: usize, columns: usize, data: Vec<f64>) -> HeatResult<Grid> {
        if rows.checked_mul(columns) != Some(data.len()) {
            return Err(HeatError::grid(
                rows,
                columns,
                format!("buffer holds {} cells", data.len()),
            ));
        }
        Ok(Grid {
            rows,
            columns,
            data,
        })
    }

    /// Fill from a closure over `(row, col)`.
    pub fn from_fn<F>(rows: usize, columns: usize, mut f: F) -> HeatResult<Grid>
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut grid = Grid::new(rows, columns)?;
        for r in 0..rows {
            let row = grid.row_mut(r);
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = f(r, c);
            }
        }
        Ok(grid)
    }

    /// Plates need an interior: at least 3 rows and 3 columns.
    pub fn validate_shape(&self) -> HeatResult<()> {
        if self.rows < MIN_SIDE || self.columns < MIN_SIDE {
            return Err(HeatError::grid(
                self.rows,
                self.columns,
                "plates must be at least 3x3",
            ));
        }
        Ok(())
    }

    // ---- Accessors ----

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> &[f64] {
        &self.data
    }

    pub fn into_cells(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.columns {
            return None;
        }
        Some(self.data[row * self.columns + col])
    }

    /// Returns false (and leaves the grid untouched) when out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> bool {
        if row >= self.rows || col >= self.columns {
            return false;
        }
        self.data[row * self.columns + col] = value;
        true
    }

    pub fn row(&self, r: usize) -> &[f64] {
        let start = r * self.columns;
        &self.data[start..start + self.columns]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        let start = r * self.columns;
        &mut self.data[start..start + self.columns]
    }

    /// Rows `start..end` as one contiguous slice.
    pub fn rows_slice(&self, start: usize, end: usize) -> &[f64] {
        &self.data[start * self.columns..end * self.columns]
    }

    pub fn rows_slice_mut(&mut self, start: usize, end: usize) -> &mut [f64] {
        &mut self.data[start * self.columns..end * self.columns]
    }

    pub fn is_border(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.columns
    }

    // ---- Whole-grid operations ----

    /// Copy every cell of an equally shaped grid.
    pub fn copy_from(&mut self, src: &Grid) -> HeatResult<()> {
        if self.rows != src.rows || self.columns != src.columns {
            return Err(HeatError::grid(
                src.rows,
                src.columns,
                format!("cannot copy into a {}x{} grid", self.rows, self.columns),
            ));
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Largest absolute per-cell difference, or None when shapes differ.
    pub fn max_abs_diff(&self, other: &Grid) -> Option<f64> {
        if self.rows != other.rows || self.columns != other.columns {
            return None;
        }
        let diff = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        Some(diff)
    }
}

impl Index<(usize, usize)> for Grid {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        debug_assert!(col < self.columns);
        &self.data[row * self.columns + col]
    }
}

impl IndexMut<(usize, usize)> for Grid {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        debug_assert!(col < self.columns);
        &mut self.data[row * self.columns + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_layout() {
        let g = Grid::from_fn(3, 4, |r, c| (r * 10 + c) as f64).unwrap();
        assert_eq!(g.cells()[5], 11.0);
        assert_eq!(g.row(2), &[20.0, 21.0, 22.0, 23.0]);
        assert_eq!(g[(1, 3)], 13.0);
        assert_eq!(g.rows_slice(1, 3).len(), 8);
    }

    #[test]
    fn bounds_safe_access() {
        let mut g = Grid::new(3, 3).unwrap();
        assert_eq!(g.get(3, 0), None);
        assert_eq!(g.get(0, 3), None);
        assert!(!g.set(0, 5, 1.0));
        assert!(g.set(1, 1, 7.5));
        assert_eq!(g.get(1, 1), Some(7.5));
    }

    #[test]
    fn from_vec_checks_length() {
        let err = Grid::from_vec(3, 3, vec![0.0; 8]).unwrap_err();
        assert!(matches!(err, HeatError::InvalidGrid { rows: 3, columns: 3, .. }));
    }

    #[test]
    fn shape_validation() {
        assert!(Grid::new(2, 5).unwrap().validate_shape().is_err());
        assert!(Grid::new(5, 2).unwrap().validate_shape().is_err());
        assert!(Grid::new(3, 3).unwrap().validate_shape().is_ok());
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        assert!(matches!(
            Grid::new(usize::MAX, 2),
            Err(HeatError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn copy_requires_same_shape() {
        let src = Grid::from_fn(3, 3, |r, c| (r + c) as f64).unwrap();
        let mut dst = Grid::new(3, 3).unwrap();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst, src);

        let mut other = Grid::new(4, 3).unwrap();
        assert!(other.copy_from(&src).is_err());
    }

    #[test]
    fn border_cells() {
        let g = Grid::new(4, 5).unwrap();
        assert!(g.is_border(0, 2));
        assert!(g.is_border(3, 2));
        assert!(g.is_border(2, 0));
        assert!(g.is_border(2, 4));
        assert!(!g.is_border(1, 1));
        assert!(!g.is_border(2, 3));
    }
}
