use bitflags::bitflags;

use crate::error::{PhysicsError, Result};

bitflags! {
    /// Switches for the sequential impulse solver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SolverMode: u32 {
        /// Shuffle constraint order every eighth iteration with the seeded generator.
        const RANDOMIZE_ORDER = 1;
        /// Start from a scaled copy of last step's impulses.
        const USE_WARMSTARTING = 1 << 1;
        /// Solve pooled per-step rows. When cleared, rows live on each contact's persistent payload.
        const CACHE_FRIENDLY = 1 << 2;
    }
}

impl Default for SolverMode {
    fn default() -> Self {
        Self::all()
    }
}

/// Per-solve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactSolverInfo {
    pub time_step: f32,
    pub num_iterations: u32,
    /// Relaxation applied to warm-started impulses and friction rows on the persistent path.
    pub damping: f32,
    /// Fraction of penetration corrected per step.
    pub erp: f32,
    pub warmstarting_factor: f32,
    /// Penetration tolerated before positional correction starts.
    pub linear_slop: f32,
    pub solver_mode: SolverMode,
}

impl Default for ContactSolverInfo {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 60.0,
            num_iterations: 10,
            damping: 1.0,
            erp: 0.2,
            warmstarting_factor: 0.85,
            linear_slop: 0.0,
            solver_mode: SolverMode::default(),
        }
    }
}

impl ContactSolverInfo {
    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_num_iterations(mut self, num_iterations: u32) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    pub fn with_erp(mut self, erp: f32) -> Self {
        self.erp = erp;
        self
    }

    pub fn with_solver_mode(mut self, solver_mode: SolverMode) -> Self {
        self.solver_mode = solver_mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field, value, reason| Err(PhysicsError::InvalidConfig { field, value, reason });
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return invalid("time_step", self.time_step, "must be positive and finite");
        }
        if self.num_iterations == 0 {
            return invalid("num_iterations", 0.0, "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.erp) {
            return invalid("erp", self.erp, "must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.warmstarting_factor) {
            return invalid("warmstarting_factor", self.warmstarting_factor, "must lie in [0, 1]");
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return invalid("damping", self.damping, "must lie in (0, 1]");
        }
        if self.linear_slop < 0.0 {
            return invalid("linear_slop", self.linear_slop, "must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let info = ContactSolverInfo::default();
        assert!(info.validate().is_ok());
        assert_eq!(info.num_iterations, 10);
        assert!(info.solver_mode.contains(SolverMode::CACHE_FRIENDLY));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let info = ContactSolverInfo::default().with_num_iterations(0);
        assert!(matches!(info.validate(), Err(PhysicsError::InvalidConfig { field: "num_iterations", .. })));
    }
}
