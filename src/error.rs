//! GSS error types.
//!
//! Every failure carries enough to rebuild the two-part [`Status`]
//! (major outcome plus mechanism minor code) that callers of the legacy
//! interface expect. Errors raised by collaborators (primitive crypto,
//! token framing, configuration, I/O) are wrapped here and keep their
//! chain via `#[source]`; they never cross the crate boundary as a
//! foreign type.

use thiserror::Error;

use crate::codec::CodecError;
use crate::krb5::crypto::CryptoError;
use crate::oid::Oid;
use crate::status::{CallError, MajorStatus, Status};

/// Minor code for allocation failures, mirrors `ENOMEM`.
pub const MINOR_OUT_OF_MEMORY: u32 = 12;

/// GSS errors.
#[derive(Error, Debug)]
pub enum GssError {
    /// A required handle or buffer reference was missing or malformed.
    #[error("Call error: {}", .call.description())]
    Call {
        /// What was wrong with the reference
        call: CallError,
        /// Routine part reported alongside the call error
        major: MajorStatus,
    },

    /// Mechanism is not installed.
    #[error("Unsupported mechanism: {0}")]
    BadMech(Oid),

    /// Name could not be parsed or canonicalized.
    #[error("Invalid name: {reason}")]
    BadName {
        /// Why the name was rejected
        reason: String,
        /// Mechanism minor code
        minor: u32,
    },

    /// Name type is not understood by the mechanism.
    #[error("Unsupported name type: {0}")]
    BadNameType(Oid),

    /// Channel bindings were supplied but cannot be honored.
    #[error("Channel bindings are not supported")]
    BadBindings,

    /// Integrity or layout check of a protected token failed.
    #[error("Bad MIC: {reason}")]
    BadMic {
        /// What failed to verify
        reason: String,
        /// Mechanism minor code
        minor: u32,
    },

    /// No usable credential.
    #[error("No credential: {reason}")]
    NoCred {
        /// Why lookup failed
        reason: String,
        /// Mechanism minor code
        minor: u32,
    },

    /// Operation needs an established (or at least protection-ready) context.
    #[error("No context: {reason}")]
    NoContext {
        /// Why the context is unusable
        reason: String,
        /// Mechanism minor code
        minor: u32,
    },

    /// Token could not be unframed.
    #[error("Defective token: {0}")]
    DefectiveToken(#[source] CodecError),

    /// The ticket bound to the context has expired.
    #[error("Context expired")]
    ContextExpired,

    /// Mechanism failure with a diagnostic.
    #[error("Failure: {reason}")]
    Failure {
        /// What went wrong
        reason: String,
        /// Mechanism minor code
        minor: u32,
    },

    /// Operation is not provided.
    #[error("Unavailable: {0}")]
    Unavailable(&'static str),

    /// Cryptographic primitive failed.
    ///
    /// Reported as [`MajorStatus::Failure`]; the context is never advanced
    /// when a primitive fails.
    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for GSS operations
pub type Result<T> = std::result::Result<T, GssError>;

impl GssError {
    /// Missing handle reference.
    pub fn inaccessible_read(major: MajorStatus) -> Self {
        GssError::Call {
            call: CallError::InaccessibleRead,
            major,
        }
    }

    /// Handle or parameter present but not usable, e.g. the "no context"
    /// sentinel passed where a context is required.
    pub fn bad_structure(major: MajorStatus) -> Self {
        GssError::Call {
            call: CallError::BadStructure,
            major,
        }
    }

    /// Shorthand for [`GssError::BadMic`].
    pub fn bad_mic(reason: impl Into<String>, minor: u32) -> Self {
        GssError::BadMic {
            reason: reason.into(),
            minor,
        }
    }

    /// Shorthand for [`GssError::Failure`].
    pub fn failure(reason: impl Into<String>, minor: u32) -> Self {
        GssError::Failure {
            reason: reason.into(),
            minor,
        }
    }

    /// Shorthand for [`GssError::NoCred`].
    pub fn no_cred(reason: impl Into<String>, minor: u32) -> Self {
        GssError::NoCred {
            reason: reason.into(),
            minor,
        }
    }

    /// Major outcome of this error.
    pub fn major(&self) -> MajorStatus {
        match self {
            GssError::Call { major, .. } => *major,
            GssError::BadMech(_) => MajorStatus::BadMech,
            GssError::BadName { .. } => MajorStatus::BadName,
            GssError::BadNameType(_) => MajorStatus::BadNameType,
            GssError::BadBindings => MajorStatus::BadBindings,
            GssError::BadMic { .. } => MajorStatus::BadMic,
            GssError::NoCred { .. } => MajorStatus::NoCred,
            GssError::NoContext { .. } => MajorStatus::NoContext,
            GssError::DefectiveToken(_) => MajorStatus::DefectiveToken,
            GssError::ContextExpired => MajorStatus::ContextExpired,
            GssError::Failure { .. } => MajorStatus::Failure,
            GssError::Unavailable(_) => MajorStatus::Unavailable,
            GssError::Crypto(_) | GssError::Config(_) | GssError::Io(_) => MajorStatus::Failure,
        }
    }

    /// Mechanism minor code of this error.
    pub fn minor(&self) -> u32 {
        match self {
            GssError::BadName { minor, .. }
            | GssError::BadMic { minor, .. }
            | GssError::NoCred { minor, .. }
            | GssError::NoContext { minor, .. }
            | GssError::Failure { minor, .. } => *minor,
            GssError::Io(err) => err.raw_os_error().map_or(0, |code| code as u32),
            _ => 0,
        }
    }

    /// Project into the structured two-part status.
    pub fn status(&self) -> Status {
        let status = Status::new(self.major(), self.minor());
        match self {
            GssError::Call { call, .. } => status.with_call_error(*call),
            _ => status,
        }
    }
}

impl From<CryptoError> for GssError {
    fn from(err: CryptoError) -> Self {
        GssError::Crypto(err)
    }
}

impl From<CodecError> for GssError {
    fn from(err: CodecError) -> Self {
        GssError::DefectiveToken(err)
    }
}

impl From<toml::de::Error> for GssError {
    fn from(err: toml::de::Error) -> Self {
        GssError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_status() {
        let err = GssError::inaccessible_read(MajorStatus::NoContext);
        let status = err.status();
        assert_eq!(status.major, MajorStatus::NoContext);
        assert_eq!(status.call_error, Some(CallError::InaccessibleRead));
        assert_eq!(status.to_legacy(), 0x0108_0000);
    }

    #[test]
    fn test_bad_structure_status() {
        let err = GssError::bad_structure(MajorStatus::NoContext);
        assert_eq!(err.major(), MajorStatus::NoContext);
        assert_eq!(err.status().call_error, Some(CallError::BadStructure));
        assert_eq!(err.status().to_legacy(), 0x0308_0000);
    }

    #[test]
    fn test_minor_is_carried() {
        let err = GssError::bad_mic("sequence", 7);
        assert_eq!(err.status(), Status::new(MajorStatus::BadMic, 7));
    }

    #[test]
    fn test_crypto_error_is_failure() {
        use std::error::Error;

        let err: GssError = CryptoError::Rng("entropy".to_string()).into();
        assert_eq!(err.major(), MajorStatus::Failure);
        assert!(err.source().unwrap().to_string().contains("entropy"));
    }

    #[test]
    fn test_codec_error_is_defective_token() {
        let err: GssError = CodecError::BadTag(0x61).into();
        assert_eq!(err.major(), MajorStatus::DefectiveToken);
    }
}
