use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{Communicator, WorkerContext};
use crate::block::LocalBlock;
use crate::error::{CommPhase, HeatError, HeatResult};

struct Generation {
    arrived: usize,
    id: u64,
    all_true: bool,
    verdict: bool,
    aborted: bool,
}

/// Counting barrier that also folds one bool per party.
///
/// A generation is released only when its last party arrives; that party
/// publishes the AND of every value and opens the next generation.
struct AndBarrier {
    parties: usize,
    state: Mutex<Generation>,
    released: Condvar,
}

impl AndBarrier {
    fn new(parties: usize) -> AndBarrier {
        AndBarrier {
            parties,
            state: Mutex::new(Generation {
                arrived: 0,
                id: 0,
                all_true: true,
                verdict: true,
                aborted: false,
            }),
            released: Condvar::new(),
        }
    }

    /// `None` once the barrier has been aborted.
    fn arrive(&self, value: bool) -> Option<bool> {
        let mut st = self.state.lock();
        if st.aborted {
            return None;
        }
        let id = st.id;
        st.all_true &= value;
        st.arrived += 1;

        if st.arrived == self.parties {
            st.verdict = st.all_true;
            st.arrived = 0;
            st.all_true = true;
            st.id = st.id.wrapping_add(1);
            self.released.notify_all();
            return Some(st.verdict);
        }

        // The verdict cannot be overwritten before we read it: the next
        // generation needs this thread to arrive again.
        while st.id == id && !st.aborted {
            self.released.wait(&mut st);
        }
        if st.id == id {
            return None;
        }
        Some(st.verdict)
    }

    /// Release every waiter, now and later, without a verdict.
    fn abort(&self) {
        self.state.lock().aborted = true;
        self.released.notify_all();
    }
}

/// Border rows every thread can see.
struct BorderSlot {
    top: Mutex<Vec<f64>>,
    bottom: Mutex<Vec<f64>>,
}

/// State shared by all threads of one plate run.
pub struct SharedBoard {
    slots: Vec<BorderSlot>,
    barrier: AndBarrier,
}

impl SharedBoard {
    pub fn new(workers: usize, columns: usize) -> Arc<SharedBoard> {
        let slots = (0..workers)
            .map(|_| BorderSlot {
                top: Mutex::new(vec![0.0; columns]),
                bottom: Mutex::new(vec![0.0; columns]),
            })
            .collect();
        Arc::new(SharedBoard {
            slots,
            barrier: AndBarrier::new(workers),
        })
    }

    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Fail every pending and future collective, e.g. when a worker thread
    /// could not be started and the generation can never fill up.
    pub fn abort(&self) {
        self.barrier.abort();
    }
}

/// Shared-memory backend: threads publish their edge rows to a common board
/// and meet at a counting barrier.
pub struct SharedComm {
    rank: usize,
    board: Arc<SharedBoard>,
}

impl SharedComm {
    fn arrive(&self, value: bool, phase: CommPhase) -> HeatResult<bool> {
        self.board
            .barrier
            .arrive(value)
            .ok_or_else(|| HeatError::comm(self.rank, phase))
    }

    /// One endpoint per worker thread.
    pub fn team(board: &Arc<SharedBoard>) -> Vec<SharedComm> {
        (0..board.workers())
            .map(|rank| SharedComm {
                rank,
                board: Arc::clone(board),
            })
            .collect()
    }
}

impl Communicator for SharedComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.board.workers()
    }

    fn exchange_borders(&self, ctx: &WorkerContext, block: &mut LocalBlock) -> HeatResult<()> {
        let own = &self.board.slots[self.rank];
        if ctx.has_upper_peer() {
            own.top.lock().copy_from_slice(block.top_owned());
        }
        if ctx.has_lower_peer() {
            own.bottom.lock().copy_from_slice(block.bottom_owned());
        }

        // Everyone has published before anyone reads.
        self.arrive(true, CommPhase::Exchange)?;

        if ctx.has_upper_peer() {
            let above = self.board.slots[self.rank - 1].bottom.lock();
            block.set_top_ghost(&above);
        }
        if ctx.has_lower_peer() {
            let below = self.board.slots[self.rank + 1].top.lock();
            block.set_bottom_ghost(&below);
        }
        Ok(())
    }

    fn barrier(&self) -> HeatResult<()> {
        self.arrive(true, CommPhase::Barrier).map(|_| ())
    }

    fn reduce_and(&self, value: bool) -> HeatResult<bool> {
        self.arrive(value, CommPhase::Reduce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn reduce_and_agrees_across_threads() {
        let board = SharedBoard::new(4, 3);
        let team = SharedComm::team(&board);

        let verdicts: Vec<(bool, bool)> = thread::scope(|s| {
            let handles: Vec<_> = team
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let first = comm.reduce_and(true).unwrap();
                        let second = comm.reduce_and(comm.rank() != 2).unwrap();
                        (first, second)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(verdicts.iter().all(|&(first, second)| first && !second));
    }

    #[test]
    fn abort_releases_waiting_threads() {
        let board = SharedBoard::new(2, 3);
        let mut team = SharedComm::team(&board);
        let lonely = team.remove(0);

        let err = thread::scope(|s| {
            let waiter = s.spawn(move || lonely.barrier());
            // The second party never shows up.
            board.abort();
            waiter.join().unwrap().unwrap_err()
        });
        assert_eq!(
            err,
            HeatError::WorkerCommunication {
                rank: 0,
                phase: CommPhase::Barrier
            }
        );
        assert!(team[0].reduce_and(true).is_err());
    }

    #[test]
    fn single_party_barrier_never_blocks() {
        let board = SharedBoard::new(1, 3);
        let comm = SharedComm::team(&board).pop().unwrap();
        comm.barrier().unwrap();
        assert!(!comm.reduce_and(false).unwrap());
        assert!(comm.reduce_and(true).unwrap());
    }
}
