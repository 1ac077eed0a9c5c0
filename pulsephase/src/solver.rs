//! Inverse phase solving.
//!
//! Finds the epoch at which a phase model reaches a requested phase by
//! Newton iteration on `φ(t) - φ*`:
//!
//! ```text
//! t₀     = guess, or reference epoch + (φ* - φ_ref) / f_ref
//! tₙ₊₁   = tₙ - (φ(tₙ) - φ*) / f(tₙ)
//! ```
//!
//! Iteration stops once a step is smaller than the solver precision, or
//! after [`DEFAULT_MAX_ITERATIONS`] steps, in which case the last estimate
//! is returned and a warning is logged.
//!
//! # Example
//!
//! ```ignore
//! let solver = InverseSolver::new();
//! let solution = solver.solve(&segment, Phase::new(1_000_000, 0.5), None);
//! assert!(solution.converged);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::epoch::{Mjd, MJD_PRECISION};
use crate::phase::Phase;

/// Step size (seconds) below which the iteration has converged.
pub const DEFAULT_PRECISION: f64 = 1e-10;

/// Hard cap on Newton steps per solve.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10_000;

/// Anything that can be inverted: a phase model with a reference point.
pub trait InversePhase {
    /// Pulse phase at `t`.
    fn phase(&self, t: &Mjd) -> Phase;

    /// Spin frequency at `t` in Hz.
    fn frequency(&self, t: &Mjd) -> f64;

    fn reference_epoch(&self) -> Mjd;

    fn reference_phase(&self) -> Phase;

    fn reference_frequency(&self) -> f64;
}

/// Result of one inversion.
#[derive(Debug, Clone, Copy)]
pub struct InverseSolution {
    pub epoch: Mjd,
    pub iterations: u32,
    /// Size of the last step in seconds.
    pub last_step: f64,
    pub converged: bool,
}

/// Cumulative usage counters.
#[derive(Debug, Default)]
pub struct SolverStats {
    calls: AtomicU64,
    iterations: AtomicU64,
    unconverged: AtomicU64,
}

impl SolverStats {
    fn record(&self, solution: &InverseSolution) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.iterations
            .fetch_add(solution.iterations as u64, Ordering::Relaxed);
        if !solution.converged {
            self.unconverged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn unconverged(&self) -> u64 {
        self.unconverged.load(Ordering::Relaxed)
    }

    /// Mean Newton steps per call.
    pub fn mean_iterations(&self) -> f64 {
        match self.calls() {
            0 => 0.0,
            n => self.iterations() as f64 / n as f64,
        }
    }
}

impl Clone for SolverStats {
    fn clone(&self) -> Self {
        Self {
            calls: AtomicU64::new(self.calls()),
            iterations: AtomicU64::new(self.iterations()),
            unconverged: AtomicU64::new(self.unconverged()),
        }
    }
}

/// Newton solver for [`InversePhase`] models.
#[derive(Debug, Clone)]
pub struct InverseSolver {
    precision: f64,
    max_iterations: u32,
    stats: SolverStats,
}

impl Default for InverseSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl InverseSolver {
    pub fn new() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stats: SolverStats::default(),
        }
    }

    /// Declared tolerance of the model, in seconds.
    ///
    /// Never finer than the resolution of an [`Mjd`].
    pub fn with_precision(mut self, seconds: f64) -> Self {
        self.precision = seconds;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn precision(&self) -> f64 {
        self.precision.max(MJD_PRECISION)
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Epoch at which `model` reaches `target`.
    pub fn solve<M: InversePhase + ?Sized>(
        &self,
        model: &M,
        target: Phase,
        guess: Option<Mjd>,
    ) -> InverseSolution {
        let mut epoch = guess.unwrap_or_else(|| {
            let turns = (target - model.reference_phase()).in_turns();
            model.reference_epoch() + turns / model.reference_frequency()
        });

        let precision = self.precision();
        let mut solution = InverseSolution {
            epoch,
            iterations: 0,
            last_step: f64::INFINITY,
            converged: false,
        };

        while solution.iterations < self.max_iterations {
            let step = (model.phase(&epoch) - target).in_turns() / model.frequency(&epoch);
            epoch -= step;
            solution.iterations += 1;
            solution.last_step = step.abs();
            if solution.last_step < precision {
                solution.converged = true;
                break;
            }
        }
        solution.epoch = epoch;

        if !solution.converged {
            warn!(
                phase = %target,
                epoch = %epoch,
                last_step = solution.last_step,
                iterations = solution.iterations,
                "Inverse phase did not converge; returning last estimate"
            );
        }

        self.stats.record(&solution);
        solution
    }
}
