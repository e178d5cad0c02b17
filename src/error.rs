//! Error taxonomy.
//!
//! Every fallible operation returns a [`KrigeError`]. Errors are local to the
//! call that produced them (one load, one fit, one query); the binary maps them
//! to process exit codes via [`KrigeError::exit_code`].

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum KrigeError {
    /// Malformed or non-finite input, or unresolved duplicate locations at load time.
    #[error("data error: {0}")]
    Data(String),

    /// The variogram optimiser did not converge, or the bin set is under-determined.
    #[error("variogram fit failed: {0}")]
    FitConvergence(String),

    /// The kriging system could not be solved.
    #[error("singular kriging system: {0}")]
    SingularSystem(String),

    /// A query coincides with several observations that disagree.
    #[error("query at ({x:.3}, {y:.3}) coincides with {count} observations carrying different values")]
    DuplicateLocation { x: f64, y: f64, count: usize },

    /// No observation survived the neighbourhood search for a query.
    #[error("no observations within the search neighbourhood of ({x:.3}, {y:.3})")]
    EmptyNeighborhood { x: f64, y: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Io(String),
}

impl KrigeError {
    /// Process exit code for the `krige` binary.
    ///
    /// - `2`: bad input, configuration or file access
    /// - `3`: not enough data to fit
    /// - `4`: numerical failure
    pub fn exit_code(&self) -> u8 {
        match self {
            KrigeError::Data(_)
            | KrigeError::DuplicateLocation { .. }
            | KrigeError::InvalidConfig(_)
            | KrigeError::Io(_) => 2,
            KrigeError::FitConvergence(_) | KrigeError::EmptyNeighborhood { .. } => 3,
            KrigeError::SingularSystem(_) => 4,
        }
    }
}
