//! Five-point finite-difference update.
//!
//! Every backend funnels through [`sweep`], so a cell's next value depends only
//! on its frozen neighbours and never on how rows were split between workers.

use crate::convergence::LocalConvergence;
use crate::grid::Grid;

/// `alpha * delta_t / h^2`, fixed for a plate's whole run.
pub fn coefficient(alpha: f64, delta_t: f64, h: f64) -> f64 {
    alpha * delta_t / (h * h)
}

#[inline]
fn update(u: f64, up: f64, down: f64, left: f64, right: f64, c: f64) -> f64 {
    let lap = (up + down + left + right) - 4.0 * u;
    u + c * lap
}

/// Next-state temperature of one interior cell.
///
/// `row` and `col` must not lie on the border.
pub fn next_cell(grid: &Grid, row: usize, col: usize, c: f64) -> f64 {
    debug_assert!(!grid.is_border(row, col));
    update(
        grid[(row, col)],
        grid[(row - 1, col)],
        grid[(row + 1, col)],
        grid[(row, col - 1)],
        grid[(row, col + 1)],
        c,
    )
}

/// Update `owned` rows of a block that carries one ghost row above and below.
///
/// Both slices hold `(owned + 2) * n` cells. Only rows `1..=owned` and columns
/// `1..n-1` of `next` are written; ghost rows and border columns are left alone.
pub fn sweep(
    current: &[f64],
    next: &mut [f64],
    n: usize,
    owned: usize,
    c: f64,
    local: &mut LocalConvergence,
) {
    debug_assert_eq!(current.len(), (owned + 2) * n);
    debug_assert_eq!(next.len(), current.len());

    for y in 1..=owned {
        let row = y * n;
        for x in 1..(n - 1) {
            let i = row + x;

            let u = current[i];
            let v = update(
                u,
                current[i - n],
                current[i + n],
                current[i - 1],
                current[i + 1],
                c,
            );
            next[i] = v;
            local.observe(u, v);
        }
    }
}
