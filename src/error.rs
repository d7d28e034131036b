use crate::networking::response::RejectResponse;
use thiserror::Error;

/// Everything that can go wrong between constructing an argument list and
/// receiving a verified reply. Protocol outcomes that a caller may want to
/// match on (`CallRejected`, `RequestCleanedUp`) are explicit variants
/// rather than panics.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed bytes. Fatal to the call that produced them.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Structurally well-formed but semantically invalid data, such as a
    /// record constructed with a duplicate field tag.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A certificate whose root hash or signature did not check out.
    /// Never downgraded to a warning.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The network rejected the call at the application level.
    #[error("call rejected: code={:?} message={}", .0.reject_code, .0.reject_message)]
    CallRejected(RejectResponse),

    /// The call completed but its result was garbage-collected by the
    /// network before we observed it. Distinct from "never existed".
    #[error("the request result was cleaned up by the network before it could be read")]
    RequestCleanedUp,

    /// A failure below the protocol: connection refused, DNS, TLS.
    /// Eligible for caller-level retry.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("signing error: {0}")]
    Signing(String),

    /// The caller-supplied deadline expired while the request was still
    /// pending.
    #[error("timed out waiting for the request to reach a terminal state")]
    Timeout,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
