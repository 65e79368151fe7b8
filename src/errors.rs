use thiserror::Error;

/// Errors produced while building or running a simulation
///
/// Any error returned from `Simulator::step` is fatal for the run: the simulator
/// moves into the aborted phase and refuses further steps.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Policy attribute set differs from the arrival schedule attribute set
    #[error("Configuration mismatch for policy '{policy}': {detail}")]
    ConfigurationMismatch { policy: String, detail: String },

    #[error("Unknown policy id '{0}'")]
    UnknownPolicy(String),

    #[error("Policy name '{0}' is used more than once")]
    DuplicatePolicy(String),

    /// Schedule and policies were not loaded before stepping
    #[error("Simulator is not ready: load an arrival schedule and policies first")]
    NotReady,

    /// A previous step failed; the run cannot continue
    #[error("Simulation run was aborted by an earlier error")]
    Aborted,

    #[error("Arrival schedule is empty")]
    EmptySchedule,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A bookkeeping invariant failed after a step
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    /// A policy panicked while producing its bid
    #[error("Bid worker for policy '{policy}' failed: {message}")]
    WorkerFailed { policy: String, message: String },

    #[error("Failed to build bid worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chart error: {0}")]
    Chart(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimulationError::ConfigurationMismatch {
            policy: "random".to_string(),
            detail: "3 attributes expected, found 2".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration mismatch for policy 'random': 3 attributes expected, found 2");

        let err = SimulationError::WorkerFailed { policy: "p1".to_string(), message: "boom".to_string() };
        assert!(err.to_string().contains("p1"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SimulationError = io.into();
        assert!(matches!(err, SimulationError::Io(_)));
    }
}
