use thiserror::Error;

pub type HeatResult<T> = Result<T, HeatError>;

/// Allocation label for a full plate grid.
pub const PLATE_STORAGE: &str = "plate grid";
/// Allocation label for a worker's private block.
pub const WORKER_STORAGE: &str = "worker block";

/// Protocol phase in which a worker lost contact with a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommPhase {
    Exchange,
    Barrier,
    Reduce,
}

impl CommPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommPhase::Exchange => "border exchange",
            CommPhase::Barrier => "barrier",
            CommPhase::Reduce => "convergence reduction",
        }
    }
}

impl std::fmt::Display for CommPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeatError {
    /// Plate is smaller than 3x3, or its cell buffer does not match its shape.
    #[error("invalid grid {rows}x{columns}: {reason}")]
    InvalidGrid {
        rows: usize,
        columns: usize,
        reason: String,
    },

    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("could not allocate {cells} cells for {what}")]
    Allocation { what: &'static str, cells: usize },

    /// A peer vanished mid-protocol. The run cannot be resumed.
    #[error("worker {rank} lost its peer during {phase}")]
    WorkerCommunication { rank: usize, phase: CommPhase },

    #[error("no equilibrium within {limit} iterations")]
    IterationLimit { limit: u64 },

    /// The OS refused to start a worker thread; peers already running are
    /// released and the plate fails.
    #[error("could not start worker {rank}: {reason}")]
    WorkerSpawn { rank: usize, reason: String },
}

impl HeatError {
    pub(crate) fn grid(rows: usize, columns: usize, reason: impl Into<String>) -> Self {
        HeatError::InvalidGrid {
            rows,
            columns,
            reason: reason.into(),
        }
    }

    pub(crate) fn comm(rank: usize, phase: CommPhase) -> Self {
        HeatError::WorkerCommunication { rank, phase }
    }

    /// Failing to hold a whole plate in memory leaves nothing for the rest of
    /// a batch either; every other error only invalidates the plate at hand.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, HeatError::Allocation { what: PLATE_STORAGE, .. })
    }
}
