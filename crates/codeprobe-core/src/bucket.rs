//! Code buckets: the representative HTTP status values that get probed.

use std::fmt;

use serde::Deserialize;

use crate::error::{CodeProbeError, Result};

/// One representative HTTP status value.
///
/// Used as the `code` metric label and as the path parameter of the probe URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "u16")]
pub struct CodeBucket(u16);

impl CodeBucket {
    pub const OK: CodeBucket = CodeBucket(200);
    pub const REDIRECT: CodeBucket = CodeBucket(300);
    pub const CLIENT_ERROR: CodeBucket = CodeBucket(400);
    pub const SERVER_ERROR: CodeBucket = CodeBucket(500);

    /// Validate and wrap a status value (100..=599).
    pub fn new(code: u16) -> Result<Self> {
        if !(100..=599).contains(&code) {
            return Err(CodeProbeError::InvalidConfig(format!(
                "code bucket {code} is not an HTTP status (100..=599)"
            )));
        }
        Ok(Self(code))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// The built-in bucket set: one value per status class that the target echoes.
    pub fn defaults() -> Vec<CodeBucket> {
        vec![Self::OK, Self::REDIRECT, Self::CLIENT_ERROR, Self::SERVER_ERROR]
    }
}

impl TryFrom<u16> for CodeBucket {
    type Error = CodeProbeError;

    fn try_from(code: u16) -> Result<Self> {
        Self::new(code)
    }
}

impl fmt::Display for CodeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
