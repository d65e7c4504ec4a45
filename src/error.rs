use thiserror::Error;

/// Error type shared by all operations in this crate.
///
/// The variants follow the coarse status taxonomy of the original FSS
/// literature implementations: bad inputs are `InvalidArgument`, missing
/// registrations are `Unimplemented`, states that cannot accept the requested
/// operation are `FailedPrecondition`, and failures of the underlying crypto
/// primitives are `Internal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value type was used that has no registered value-correction
    /// function. Call `register_value_type` before generating keys.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Failures of OpenSSL or broken internal invariants. These should never
    /// occur for valid inputs.
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn unimplemented(msg: impl Into<String>) -> Self {
        Error::Unimplemented(msg.into())
    }

    pub(crate) fn failed_precondition(msg: impl Into<String>) -> Self {
        Error::FailedPrecondition(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Internal(format!("openssl: {}", e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
