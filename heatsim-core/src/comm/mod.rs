//! Worker backends.
//!
//! The iteration protocol is written once against [`Communicator`]; a backend
//! only decides how ghost rows travel and how the lockstep points are reached.

mod channel;
mod serial;
mod shared;

pub use channel::ChannelComm;
pub use serial::SerialComm;
pub use shared::{SharedBoard, SharedComm};

use crate::block::LocalBlock;
use crate::error::HeatResult;
use crate::partition::RowRange;

/// What a worker knows about its place in the decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    pub rank: usize,
    pub range: RowRange,
    /// Whether the next rank down owns any rows.
    pub lower_populated: bool,
}

impl WorkerContext {
    pub fn for_rank(rank: usize, ranges: &[RowRange]) -> WorkerContext {
        let lower_populated = ranges
            .get(rank + 1)
            .is_some_and(|r| !r.is_empty());
        WorkerContext {
            rank,
            range: ranges[rank],
            lower_populated,
        }
    }

    /// Upper ghost comes from a peer rather than the plate border.
    pub fn has_upper_peer(&self) -> bool {
        self.rank > 0 && !self.range.is_empty()
    }

    /// Lower ghost comes from a peer rather than the plate border.
    pub fn has_lower_peer(&self) -> bool {
        !self.range.is_empty() && self.lower_populated
    }
}

/// Capabilities every worker backend provides.
///
/// `barrier` and `reduce_and` are collective: each returns only once all
/// `size()` workers have called it for the same iteration.
pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Refresh the block's ghost rows from its neighbours' latest owned rows.
    fn exchange_borders(&self, ctx: &WorkerContext, block: &mut LocalBlock) -> HeatResult<()>;

    fn barrier(&self) -> HeatResult<()>;

    /// Logical AND of every worker's `value`.
    fn reduce_and(&self, value: bool) -> HeatResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;

    #[test]
    fn peers_follow_populated_ranges() {
        let ranges = partition(3, 5).unwrap();
        let ctx: Vec<WorkerContext> = (0..5).map(|r| WorkerContext::for_rank(r, &ranges)).collect();

        assert!(!ctx[0].has_upper_peer());
        assert!(ctx[0].has_lower_peer());
        assert!(ctx[1].has_upper_peer());
        assert!(ctx[1].has_lower_peer());
        assert!(ctx[2].has_upper_peer());
        assert!(!ctx[2].has_lower_peer());
        for c in &ctx[3..] {
            assert!(!c.has_upper_peer());
            assert!(!c.has_lower_peer());
        }
    }
}
