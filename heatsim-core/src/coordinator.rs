//! Lockstep iteration protocol shared by every backend.
//!
//! Each worker cycles `ExchangingBorders -> Computing -> Reducing` until the
//! reduction reports that no cell anywhere moved by epsilon or more.

use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::block::LocalBlock;
use crate::comm::{ChannelComm, Communicator, SerialComm, SharedBoard, SharedComm, WorkerContext};
use crate::convergence::ConvergenceTracker;
use crate::error::{HeatError, HeatResult};
use crate::grid::Grid;
use crate::partition::{partition_grid, RowRange};

/// How workers are realised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Everything on the calling thread.
    Serial,
    /// Scoped threads sharing a border board and a counting barrier.
    #[default]
    Threads,
    /// Scoped threads that share nothing and talk only over channels.
    Distributed,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Serial => "serial",
            Backend::Threads => "threads",
            Backend::Distributed => "distributed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    ExchangingBorders,
    Computing,
    Reducing,
    Converged,
}

/// Per-run knobs that every worker sees.
#[derive(Clone, Copy, Debug)]
pub struct Protocol {
    pub coefficient: f64,
    pub tracker: ConvergenceTracker,
    pub max_iterations: Option<u64>,
}

/// What a worker hands back once the run has converged.
#[derive(Debug)]
pub struct WorkerOutcome {
    pub rank: usize,
    pub states_k: u64,
    pub range: RowRange,
    pub block: LocalBlock,
}

/// Drive one worker to global convergence.
pub fn run_worker<C: Communicator>(
    ctx: WorkerContext,
    mut block: LocalBlock,
    comm: &C,
    protocol: &Protocol,
) -> HeatResult<WorkerOutcome> {
    let rank = ctx.rank;
    let mut states_k: u64 = 0;
    let mut state = CoordinatorState::Init;
    trace!(rank, ?state, rows = ctx.range.len());

    loop {
        state = CoordinatorState::ExchangingBorders;
        trace!(rank, states_k, ?state);
        comm.exchange_borders(&ctx, &mut block)?;
        comm.barrier()?;

        state = CoordinatorState::Computing;
        trace!(rank, states_k, ?state);
        let mut local = protocol.tracker.local();
        block.compute(protocol.coefficient, &mut local);
        states_k += 1;

        state = CoordinatorState::Reducing;
        trace!(rank, states_k, ?state, settled = local.is_settled());
        let converged = comm.reduce_and(local.is_settled())?;
        block.swap();

        if converged {
            break;
        }
        // Every worker holds the same count and verdict, so all stop together.
        if let Some(limit) = protocol.max_iterations {
            if states_k >= limit {
                return Err(HeatError::IterationLimit { limit });
            }
        }
    }

    state = CoordinatorState::Converged;
    trace!(rank, states_k, ?state);
    Ok(WorkerOutcome {
        rank,
        states_k,
        range: ctx.range,
        block,
    })
}

/// Run a validated plate to equilibrium with `workers` workers.
///
/// Returns the iteration count and the plate in its final state.
pub fn coordinate(
    mut grid: Grid,
    workers: usize,
    backend: Backend,
    protocol: &Protocol,
) -> HeatResult<(u64, Grid)> {
    let workers = match backend {
        Backend::Serial => 1,
        _ => workers,
    };
    let mut ranges = partition_grid(grid.rows(), workers)?;
    // Empty ranges trail the populated ones and would only ever vote
    // "settled", which cannot change an AND. They get no thread.
    ranges.retain(|r| !r.is_empty());
    let active = ranges.len();
    debug!(
        backend = backend.as_str(),
        workers,
        active,
        rows = grid.rows(),
        columns = grid.columns(),
        "partitioned plate"
    );

    // Every buffer is obtained before any worker starts, so a failed
    // allocation never strands peers at a barrier.
    let mut blocks = Vec::with_capacity(active);
    for range in &ranges {
        blocks.push(LocalBlock::from_grid(&grid, *range)?);
    }
    let contexts: Vec<WorkerContext> = (0..active)
        .map(|rank| WorkerContext::for_rank(rank, &ranges))
        .collect();

    let outcomes = match backend {
        Backend::Serial => {
            let block = blocks.pop().ok_or_else(|| {
                HeatError::grid(grid.rows(), grid.columns(), "plate has no interior rows")
            })?;
            vec![run_worker(contexts[0], block, &SerialComm, protocol)?]
        }
        Backend::Threads => {
            let board = SharedBoard::new(active, grid.columns());
            let team = SharedComm::team(&board);
            launch(contexts, blocks, team, protocol, || board.abort())?
        }
        Backend::Distributed => {
            // Dropping an unstarted rank's endpoints already fails its peers.
            launch(contexts, blocks, ChannelComm::mesh(active), protocol, || {})?
        }
    };

    let states_k = outcomes.first().map_or(0, |o| o.states_k);
    for outcome in &outcomes {
        debug_assert_eq!(outcome.states_k, states_k, "rank {} drifted", outcome.rank);
        if outcome.range.is_empty() {
            continue;
        }
        grid.rows_slice_mut(outcome.range.start, outcome.range.end)
            .copy_from_slice(outcome.block.owned_rows());
    }
    Ok((states_k, grid))
}

/// One scoped thread per worker; the first error by rank order wins.
///
/// If the OS refuses a thread, the endpoints of every unstarted rank are
/// dropped and `abort` releases the ranks already running, so the scope can
/// still join them.
fn launch<C, A>(
    contexts: Vec<WorkerContext>,
    blocks: Vec<LocalBlock>,
    comms: Vec<C>,
    protocol: &Protocol,
    abort: A,
) -> HeatResult<Vec<WorkerOutcome>>
where
    C: Communicator,
    A: Fn(),
{
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(contexts.len());
        let mut refused = None;
        for ((ctx, block), comm) in contexts.into_iter().zip(blocks).zip(comms) {
            let rank = ctx.rank;
            let spawned = thread::Builder::new()
                .name(format!("heatsim-worker-{rank}"))
                .spawn_scoped(scope, move || run_worker(ctx, block, &comm, protocol));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(rank, error = %e, "worker thread refused");
                    refused = Some(HeatError::WorkerSpawn {
                        rank,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
        if refused.is_some() {
            abort();
        }

        let results: Vec<HeatResult<WorkerOutcome>> = handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect();

        match refused {
            Some(err) => Err(err),
            None => results.into_iter().collect(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::ConvergenceRule;

    fn protocol(epsilon: f64) -> Protocol {
        Protocol {
            coefficient: 0.1,
            tracker: ConvergenceTracker::new(epsilon, ConvergenceRule::Inclusive),
            max_iterations: None,
        }
    }

    fn hot_interior() -> Grid {
        Grid::from_fn(6, 5, |r, c| {
            if r == 0 || c == 0 || r == 5 || c == 4 { 0.0 } else { 50.0 }
        })
        .unwrap()
    }

    #[test]
    fn serial_ignores_worker_count() {
        let (k1, g1) = coordinate(hot_interior(), 1, Backend::Serial, &protocol(0.5)).unwrap();
        let (k2, g2) = coordinate(hot_interior(), 7, Backend::Serial, &protocol(0.5)).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(g1, g2);
    }

    #[test]
    fn backends_agree() {
        let p = protocol(0.5);
        let (k, g) = coordinate(hot_interior(), 1, Backend::Serial, &p).unwrap();
        for backend in [Backend::Threads, Backend::Distributed] {
            for workers in [1, 2, 3, 6] {
                let (kb, gb) = coordinate(hot_interior(), workers, backend, &p).unwrap();
                assert_eq!(kb, k, "{backend:?} with {workers} workers");
                assert_eq!(gb, g, "{backend:?} with {workers} workers");
            }
        }
    }

    #[test]
    fn already_settled_plate_takes_one_pass() {
        let flat = Grid::from_fn(4, 4, |_, _| 3.0).unwrap();
        let (k, g) = coordinate(flat.clone(), 2, Backend::Threads, &protocol(1e-6)).unwrap();
        assert_eq!(k, 1);
        assert_eq!(g, flat);
    }

    #[test]
    fn only_populated_ranks_are_launched() {
        let p = protocol(0.5);
        let (k, g) = coordinate(hot_interior(), 1, Backend::Serial, &p).unwrap();
        for backend in [Backend::Threads, Backend::Distributed] {
            let (kb, gb) = coordinate(hot_interior(), 10_000, backend, &p).unwrap();
            assert_eq!((kb, &gb), (k, &g), "{backend:?}");
        }
    }

    #[test]
    fn iteration_cap_stops_every_worker() {
        let mut p = protocol(1e-300);
        p.max_iterations = Some(5);
        for backend in [Backend::Serial, Backend::Threads, Backend::Distributed] {
            assert_eq!(
                coordinate(hot_interior(), 3, backend, &p).unwrap_err(),
                HeatError::IterationLimit { limit: 5 }
            );
        }
    }
}
