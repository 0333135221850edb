//! Error taxonomy for executor operations.

use helios_driver::DriverStatus;

/// Executor-level errors.
///
/// Every failed driver call is converted at the point of occurrence into one
/// of these kinds, with the operation context (addresses, sizes, names) and
/// the driver status folded into the message.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The driver reported out-of-memory on an allocation.
    #[error("out of device memory: {0}")]
    ResourceExhausted(String),

    /// A pointer, symbol, or module lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other driver failure, carrying the driver status and operation
    /// context.
    #[error("internal error: {0}")]
    Internal(String),

    /// Malformed load spec: neither an embedded binary nor an in-process
    /// symbol was provided.
    #[error("invalid load spec: {0}")]
    Config(String),
}

impl ExecError {
    /// Classify a driver status into the executor taxonomy, attaching
    /// operation context.
    pub(crate) fn from_status(status: DriverStatus, context: impl Into<String>) -> Self {
        let message = format!("{}: {}", context.into(), status);
        if status.is_out_of_memory() {
            ExecError::ResourceExhausted(message)
        } else if status.is_not_found() {
            ExecError::NotFound(message)
        } else {
            ExecError::Internal(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Check a raw driver result, converting failures with context.
pub(crate) fn check<T>(
    result: helios_driver::DriverResult<T>,
    context: impl FnOnce() -> String,
) -> Result<T> {
    result.map_err(|status| ExecError::from_status(status, context()))
}
