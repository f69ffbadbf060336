use crate::convergence::LocalConvergence;
use crate::error::{HeatResult, WORKER_STORAGE};
use crate::grid::{alloc_cells, Grid};
use crate::partition::RowRange;
use crate::stencil;

/// A worker's slice of the plate: its owned rows framed by one ghost row on
/// each side, double-buffered.
///
/// Row 0 of each buffer is the upper ghost, rows `1..=owned` are owned and
/// row `owned + 1` is the lower ghost. Ghosts that sit on the plate border are
/// copied once and never refreshed.
#[derive(Debug)]
pub struct LocalBlock {
    columns: usize,
    owned: usize,
    current: Vec<f64>,
    next: Vec<f64>,
}

impl LocalBlock {
    /// Copy rows `range.start - 1 ..= range.end` out of `grid`.
    pub fn from_grid(grid: &Grid, range: RowRange) -> HeatResult<LocalBlock> {
        let columns = grid.columns();
        if range.is_empty() {
            return Ok(LocalBlock {
                columns,
                owned: 0,
                current: Vec::new(),
                next: Vec::new(),
            });
        }

        let src = grid.rows_slice(range.start - 1, range.end + 1);
        let mut current = alloc_cells(src.len(), WORKER_STORAGE)?;
        current.copy_from_slice(src);
        let mut next = alloc_cells(src.len(), WORKER_STORAGE)?;
        next.copy_from_slice(src);

        Ok(LocalBlock {
            columns,
            owned: range.len(),
            current,
            next,
        })
    }

    // ---- Accessors ----

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn owned(&self) -> usize {
        self.owned
    }

    pub fn is_empty(&self) -> bool {
        self.owned == 0
    }

    fn row(&self, r: usize) -> &[f64] {
        let start = r * self.columns;
        &self.current[start..start + self.columns]
    }

    fn row_mut(&mut self, r: usize) -> &mut [f64] {
        let start = r * self.columns;
        &mut self.current[start..start + self.columns]
    }

    /// First owned row, as sent to the upper peer.
    pub fn top_owned(&self) -> &[f64] {
        self.row(1)
    }

    /// Last owned row, as sent to the lower peer.
    pub fn bottom_owned(&self) -> &[f64] {
        self.row(self.owned)
    }

    pub fn top_ghost(&self) -> &[f64] {
        self.row(0)
    }

    pub fn bottom_ghost(&self) -> &[f64] {
        self.row(self.owned + 1)
    }

    pub fn set_top_ghost(&mut self, row: &[f64]) {
        self.row_mut(0).copy_from_slice(row);
    }

    pub fn set_bottom_ghost(&mut self, row: &[f64]) {
        let last = self.owned + 1;
        self.row_mut(last).copy_from_slice(row);
    }

    /// Owned rows of the current state, contiguous.
    pub fn owned_rows(&self) -> &[f64] {
        if self.is_empty() {
            return &[];
        }
        &self.current[self.columns..(self.owned + 1) * self.columns]
    }

    // ---- Iteration ----

    /// One stencil pass from `current` into `next`.
    pub fn compute(&mut self, c: f64, local: &mut LocalConvergence) {
        if self.is_empty() {
            return;
        }
        stencil::sweep(
            &self.current,
            &mut self.next,
            self.columns,
            self.owned,
            c,
            local,
        );
    }

    /// Promote the computed state to current.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}
