//! Error types for the simulator binary.
//!
//! [`EngineError`] wraps every failure mode of engine startup and the
//! simulation run so `main` can propagate with `?`.

/// Top-level error for the simulator binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: kubesim_core::config::ConfigError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: kubesim_core::runner::RunnerError,
    },

    /// The random submitter could not be configured.
    #[error("submitter error: {message}")]
    Submitter {
        /// Description of the submitter failure.
        message: String,
    },
}
