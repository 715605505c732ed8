//! Classification of request-layer failures.

use std::fmt;

/// Category of a failed probe request, used as the `error` metric label.
///
/// Every transport failure maps to exactly one kind; [`FailureKind::Other`]
/// catches whatever the transport does not describe more precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Request did not complete within the request timeout.
    Timeout,
    /// TCP/TLS connection could not be established.
    Connect,
    /// Redirect policy violated (loop or limit).
    Redirect,
    /// Response body could not be read.
    Body,
    /// Response could not be decoded.
    Decode,
    /// Protocol-level error while sending the request.
    Request,
    /// Request could not be built (bad URL, bad header).
    Builder,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Stable label value.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connect => "connect",
            FailureKind::Redirect => "redirect",
            FailureKind::Body => "body",
            FailureKind::Decode => "decode",
            FailureKind::Request => "request",
            FailureKind::Builder => "builder",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
