use crate::physics::handles::ObjectHandle;
use glam::Vec3;
use tracing::warn;

/// Structured report for numerical trouble that is handled locally instead of raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// An object's bounds grew past what the broadphase accepts; it was removed from simulation.
    AabbOverflow {
        object: ObjectHandle,
        aabb_min: Vec3,
        aabb_max: Vec3,
    },
    /// A body's velocity or transform became non-finite and was reset.
    NonFiniteState { object: ObjectHandle },
}

/// Receiver for [`Diagnostic`] reports. Injected into the worlds so hosts can route them.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::AabbOverflow {
                object,
                aabb_min,
                aabb_max,
            } => warn!(
                %object,
                ?aabb_min,
                ?aabb_max,
                "overflow in AABB, object removed from simulation; \
                 if you can reproduce this, please report it"
            ),
            Diagnostic::NonFiniteState { object } => {
                warn!(%object, "non-finite body state, velocities reset")
            }
        }
    }
}

/// Keeps every diagnostic in memory. Useful in tests and tooling.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}
