use thiserror::Error;

/// Errors surfaced at the crate boundary.
///
/// Narrow-phase and solver code never produce these; they only arise from
/// registering objects, building shapes and validating configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("stale or unknown handle {0}")]
    StaleHandle(String),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("triangle index {index} out of bounds for mesh with {vertex_count} vertices")]
    MeshIndexOutOfBounds { index: u32, vertex_count: usize },

    #[error("invalid configuration: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: f32,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PhysicsError::MeshIndexOutOfBounds {
            index: 7,
            vertex_count: 3,
        };
        assert_eq!(
            err.to_string(),
            "triangle index 7 out of bounds for mesh with 3 vertices"
        );

        let err = PhysicsError::InvalidConfig {
            field: "time_step",
            value: -1.0,
            reason: "must be positive",
        };
        assert!(err.to_string().contains("time_step"));
    }
}
