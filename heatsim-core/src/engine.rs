use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::convergence::{ConvergenceRule, ConvergenceTracker};
use crate::coordinator::{coordinate, Backend, Protocol};
use crate::error::{HeatError, HeatResult};
use crate::grid::Grid;
use crate::stencil;

/// Physical parameters of one plate, fixed for its whole run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub delta_t: f64,
    pub alpha: f64,
    pub h: f64,
    pub epsilon: f64,
}

impl SimulationParams {
    pub fn new(delta_t: f64, alpha: f64, h: f64, epsilon: f64) -> SimulationParams {
        SimulationParams {
            delta_t,
            alpha,
            h,
            epsilon,
        }
    }

    /// Every parameter must be a finite, strictly positive number.
    pub fn validate(&self) -> HeatResult<()> {
        for (name, value) in [
            ("delta_t", self.delta_t),
            ("alpha", self.alpha),
            ("h", self.h),
            ("epsilon", self.epsilon),
        ] {
            if !value.is_finite() {
                return Err(HeatError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite",
                });
            }
            if value <= 0.0 {
                return Err(HeatError::InvalidParameter {
                    name,
                    value,
                    reason: "must be positive",
                });
            }
        }
        Ok(())
    }

    pub fn coefficient(&self) -> f64 {
        stencil::coefficient(self.alpha, self.delta_t, self.h)
    }
}

/// A plate at equilibrium and the number of passes it took.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationResult {
    pub states_k: u64,
    pub grid: Grid,
}

impl IterationResult {
    /// Simulated time covered by the run, in seconds.
    pub fn simulated_seconds(&self, params: &SimulationParams) -> f64 {
        self.states_k as f64 * params.delta_t
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub workers: usize,
    pub backend: Backend,
    pub rule: ConvergenceRule,
    /// No cap by default; a plate that never settles runs forever.
    pub max_iterations: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: num_cpus::get(),
            backend: Backend::default(),
            rule: ConvergenceRule::default(),
            max_iterations: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimulationEngine {
    config: EngineConfig,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> SimulationEngine {
        SimulationEngine { config }
    }

    // ---- Configuration ----

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_rule(mut self, rule: ConvergenceRule) -> Self {
        self.config.rule = rule;
        self
    }

    pub fn with_max_iterations(mut self, limit: Option<u64>) -> Self {
        self.config.max_iterations = limit;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Core ----

    /// Validate, then iterate the plate until no interior cell changes by
    /// epsilon or more in one pass.
    pub fn run(&self, grid: Grid, params: &SimulationParams) -> HeatResult<IterationResult> {
        grid.validate_shape()?;
        params.validate()?;
        if self.config.workers == 0 {
            return Err(HeatError::InvalidParameter {
                name: "worker_count",
                value: 0.0,
                reason: "at least one worker is required",
            });
        }
        if self.config.max_iterations == Some(0) {
            return Err(HeatError::InvalidParameter {
                name: "max_iterations",
                value: 0.0,
                reason: "a cap must allow at least one iteration",
            });
        }

        let protocol = Protocol {
            coefficient: params.coefficient(),
            tracker: ConvergenceTracker::new(params.epsilon, self.config.rule),
            max_iterations: self.config.max_iterations,
        };
        debug!(
            coefficient = protocol.coefficient,
            rule = self.config.rule.as_str(),
            "starting plate"
        );

        let t0 = Instant::now();
        let (states_k, grid) = coordinate(
            grid,
            self.config.workers,
            self.config.backend,
            &protocol,
        )?;
        info!(
            states_k,
            workers = self.config.workers,
            backend = self.config.backend.as_str(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "plate reached equilibrium"
        );

        Ok(IterationResult { states_k, grid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_must_be_positive_and_finite() {
        assert!(SimulationParams::new(0.1, 0.01, 1.0, 0.01).validate().is_ok());
        for (p, name) in [
            (SimulationParams::new(0.0, 0.01, 1.0, 0.01), "delta_t"),
            (SimulationParams::new(0.1, -1.0, 1.0, 0.01), "alpha"),
            (SimulationParams::new(0.1, 0.01, f64::NAN, 0.01), "h"),
            (SimulationParams::new(0.1, 0.01, 1.0, 0.0), "epsilon"),
            (SimulationParams::new(f64::INFINITY, 0.01, 1.0, 0.01), "delta_t"),
        ] {
            match p.validate() {
                Err(HeatError::InvalidParameter { name: got, .. }) => assert_eq!(got, name),
                other => panic!("expected {name} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn coefficient_is_precomputed_from_params() {
        let p = SimulationParams::new(0.5, 2.0, 2.0, 1.0);
        assert!((p.coefficient() - 0.25).abs() < 1e-15);
    }

    #[test]
    fn zero_workers_rejected() {
        let g = Grid::from_fn(3, 3, |_, _| 0.0).unwrap();
        let err = SimulationEngine::default()
            .with_workers(0)
            .run(g, &SimulationParams::new(1.0, 1.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, HeatError::InvalidParameter { name: "worker_count", .. }));
    }

    #[test]
    fn grid_is_checked_before_parameters() {
        let g = Grid::new(2, 9).unwrap();
        let err = SimulationEngine::default()
            .run(g, &SimulationParams::new(0.0, 0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, HeatError::InvalidGrid { .. }));
    }

    #[test]
    fn simulated_time_scales_with_iterations() {
        let r = IterationResult {
            states_k: 40,
            grid: Grid::new(3, 3).unwrap(),
        };
        let p = SimulationParams::new(1.5, 1.0, 1.0, 1.0);
        assert_eq!(r.simulated_seconds(&p), 60.0);
    }
}
