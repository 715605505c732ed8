//! Shared error type across codeprobe crates.

use thiserror::Error;

/// Stable error codes, used in logs and exit diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Config file is malformed or out of range.
    InvalidConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Listener could not be bound.
    BindFailed,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::BindFailed => "BIND_FAILED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CodeProbeError>;

/// Unified error type used by core and server.
///
/// Probe failures are not represented here: they are recovered inside the
/// probe loop and only ever surface as a [`crate::FailureKind`] label.
#[derive(Debug, Error)]
pub enum CodeProbeError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("bind failed: {0}")]
    Bind(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl CodeProbeError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CodeProbeError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            CodeProbeError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            CodeProbeError::Bind(_) => ErrorCode::BindFailed,
            CodeProbeError::Internal(_) => ErrorCode::Internal,
        }
    }
}
