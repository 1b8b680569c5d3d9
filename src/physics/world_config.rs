use glam::Vec3;

use crate::error::{PhysicsError, Result};
use crate::physics::collision_detection::contact_manifold::DEFAULT_CONTACT_BREAKING_THRESHOLD;
use crate::physics::constraints::contact_solver_info::ContactSolverInfo;

/// Settings for a [`DynamicsWorld`](crate::physics::simulation::DynamicsWorld).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    pub gravity: Vec3,
    /// Contacts farther apart than this are dropped from manifolds. Also pads broadphase bounds.
    pub contact_breaking_threshold: f32,
    /// Seconds a body must rest before it may fall asleep.
    pub deactivation_time: f32,
    pub disable_deactivation: bool,
    /// Sweep moving bodies after solving and stop them at the first time of impact.
    pub use_continuous: bool,
    pub solver_info: ContactSolverInfo,
    /// Seed of the solver's order shuffling.
    pub random_seed: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -10.0, 0.0),
            contact_breaking_threshold: DEFAULT_CONTACT_BREAKING_THRESHOLD,
            deactivation_time: 2.0,
            disable_deactivation: false,
            use_continuous: false,
            solver_info: ContactSolverInfo::default(),
            random_seed: 0,
        }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    #[must_use]
    pub fn with_contact_breaking_threshold(mut self, threshold: f32) -> Self {
        self.contact_breaking_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_deactivation_time(mut self, seconds: f32) -> Self {
        self.deactivation_time = seconds;
        self
    }

    #[must_use]
    pub fn with_disable_deactivation(mut self, disable: bool) -> Self {
        self.disable_deactivation = disable;
        self
    }

    #[must_use]
    pub fn with_continuous(mut self, use_continuous: bool) -> Self {
        self.use_continuous = use_continuous;
        self
    }

    #[must_use]
    pub fn with_solver_info(mut self, solver_info: ContactSolverInfo) -> Self {
        self.solver_info = solver_info;
        self
    }

    #[must_use]
    pub fn with_random_seed(mut self, seed: u32) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig {
                field: "gravity",
                value: self.gravity.length(),
                reason: "must be finite",
            });
        }
        if !(self.contact_breaking_threshold > 0.0 && self.contact_breaking_threshold.is_finite()) {
            return Err(PhysicsError::InvalidConfig {
                field: "contact_breaking_threshold",
                value: self.contact_breaking_threshold,
                reason: "must be positive and finite",
            });
        }
        if self.deactivation_time.is_nan() || self.deactivation_time < 0.0 {
            return Err(PhysicsError::InvalidConfig {
                field: "deactivation_time",
                value: self.deactivation_time,
                reason: "must not be negative",
            });
        }
        self.solver_info.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WorldConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = WorldConfig::default().with_contact_breaking_threshold(0.0);
        assert!(matches!(
            config.validate(),
            Err(PhysicsError::InvalidConfig {
                field: "contact_breaking_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_solver_info_is_validated() {
        let config =
            WorldConfig::default().with_solver_info(ContactSolverInfo::default().with_time_step(0.0));
        assert!(config.validate().is_err());
    }
}
