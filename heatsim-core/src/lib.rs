//! Parallel heat-diffusion core: iterates a plate's five-point stencil until
//! thermal equilibrium, on one thread, a shared-memory thread team, or a set
//! of message-passing ranks.

pub mod block;
pub mod comm;
pub mod convergence;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod grid;
pub mod partition;
pub mod stencil;

pub use convergence::{ConvergenceRule, ConvergenceTracker};
pub use coordinator::Backend;
pub use engine::{EngineConfig, IterationResult, SimulationEngine, SimulationParams};
pub use error::{CommPhase, HeatError, HeatResult};
pub use grid::Grid;
pub use partition::{partition, partition_grid, RowRange};
