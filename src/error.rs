//! Error taxonomy for the training core
//!
//! All fallible operations return `anyhow::Result`; the variants below are
//! attached to those errors so that a driver can tell a misuse of the API
//! apart from a numeric blow-up or a broken environment:
//!
//! ```rust
//! # use phasic_rl::error::PPGError;
//! fn is_fatal_for_run(err: &anyhow::Error) -> bool {
//!     matches!(err.downcast_ref::<PPGError>(), Some(PPGError::EnvironmentFault { .. }))
//! }
//! ```

use thiserror::Error;

/// Failure classes raised by the buffers, losses, agent and runner
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PPGError {
    /// The caller broke a precondition (empty buffer entering a phase,
    /// ragged batch rows, zero environments, ...)
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// A loss evaluated to NaN or infinity
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// An environment failed to reset or step
    #[error("environment {env_id} failed: {message}")]
    EnvironmentFault {
        /// Index of the failing environment inside the pool
        env_id: usize,
        /// Underlying error rendered as text
        message: String,
    },
}

impl PPGError {
    /// Shorthand for [`PPGError::PreconditionViolation`]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }
}
