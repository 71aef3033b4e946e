//! Two-part status reporting.
//!
//! Every GSS call yields a primary outcome and a mechanism-specific minor
//! code. Instead of packing routine errors, supplementary information and
//! calling errors into one integer, the three dimensions are kept apart:
//!
//! - [`MajorStatus`]: the routine outcome
//! - [`Supplementary`]: orthogonal informational bits
//! - [`CallError`]: the caller passed a missing or malformed reference
//!
//! The RFC 2744 32-bit layout is only produced at the compatibility
//! boundary by [`Status::to_legacy`]:
//!
//! ```text
//!  31       24 23       16 15                0
//! +-----------+-----------+------------------+
//! |  calling  |  routine  |  supplementary   |
//! +-----------+-----------+------------------+
//! ```

use std::fmt;

/// Primary outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MajorStatus {
    /// Operation completed.
    Complete = 0,
    /// Another token exchange is needed. Not an error.
    ContinueNeeded = 0xFF,
    /// Unsupported mechanism requested.
    BadMech = 1,
    /// Invalid name provided.
    BadName = 2,
    /// Name of unsupported type provided.
    BadNameType = 3,
    /// Incorrect channel bindings.
    BadBindings = 4,
    /// Invalid status code.
    BadStatus = 5,
    /// Token had an invalid integrity check.
    BadMic = 6,
    /// No credentials supplied or usable.
    NoCred = 7,
    /// No context established.
    NoContext = 8,
    /// Invalid token.
    DefectiveToken = 9,
    /// Invalid credential.
    DefectiveCredential = 10,
    /// Referenced credentials expired.
    CredentialsExpired = 11,
    /// Context expired.
    ContextExpired = 12,
    /// Unspecified failure, see the minor code.
    Failure = 13,
    /// Quality of protection unavailable.
    BadQop = 14,
    /// Operation not authorized.
    Unauthorized = 15,
    /// Operation unavailable.
    Unavailable = 16,
    /// Duplicate credential element.
    DuplicateElement = 17,
    /// Name is not a mechanism name.
    NameNotMn = 18,
}

impl MajorStatus {
    const ROUTINE: [MajorStatus; 18] = [
        MajorStatus::BadMech,
        MajorStatus::BadName,
        MajorStatus::BadNameType,
        MajorStatus::BadBindings,
        MajorStatus::BadStatus,
        MajorStatus::BadMic,
        MajorStatus::NoCred,
        MajorStatus::NoContext,
        MajorStatus::DefectiveToken,
        MajorStatus::DefectiveCredential,
        MajorStatus::CredentialsExpired,
        MajorStatus::ContextExpired,
        MajorStatus::Failure,
        MajorStatus::BadQop,
        MajorStatus::Unauthorized,
        MajorStatus::Unavailable,
        MajorStatus::DuplicateElement,
        MajorStatus::NameNotMn,
    ];

    /// Routine error number (bits 16-23 of the legacy layout), zero for
    /// non-errors.
    pub fn routine_code(&self) -> u32 {
        match self {
            MajorStatus::Complete | MajorStatus::ContinueNeeded => 0,
            other => *other as u32,
        }
    }

    /// Look up a routine error number.
    pub fn from_routine_code(code: u32) -> Option<Self> {
        if code == 0 {
            return Some(MajorStatus::Complete);
        }
        Self::ROUTINE.iter().copied().find(|m| *m as u32 == code)
    }

    /// Whether this outcome is an error.
    pub fn is_error(&self) -> bool {
        !matches!(self, MajorStatus::Complete | MajorStatus::ContinueNeeded)
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            MajorStatus::Complete => "No error",
            MajorStatus::ContinueNeeded => "Continuation call to routine required",
            MajorStatus::BadMech => "An unsupported mechanism was requested",
            MajorStatus::BadName => "An invalid name was supplied",
            MajorStatus::BadNameType => "A supplied name was of an unsupported type",
            MajorStatus::BadBindings => "Incorrect channel bindings were supplied",
            MajorStatus::BadStatus => "An invalid status code was supplied",
            MajorStatus::BadMic => "A token had an invalid Message Integrity Check (MIC)",
            MajorStatus::NoCred => "No credentials were supplied, or the credentials were unavailable or inaccessible",
            MajorStatus::NoContext => "No context has been established",
            MajorStatus::DefectiveToken => "Invalid token was supplied",
            MajorStatus::DefectiveCredential => "Invalid credential was supplied",
            MajorStatus::CredentialsExpired => "The referenced credentials have expired",
            MajorStatus::ContextExpired => "The referenced context has expired",
            MajorStatus::Failure => "Unspecified error in underlying mechanism",
            MajorStatus::BadQop => "The quality-of-protection requested could not be provided",
            MajorStatus::Unauthorized => "The operation is forbidden by local security policy",
            MajorStatus::Unavailable => "The operation or option is unavailable",
            MajorStatus::DuplicateElement => "The requested credential element already exists",
            MajorStatus::NameNotMn => "The provided name was not a mechanism name",
        }
    }
}

/// Supplementary information bits (bits 0-15 of the legacy layout).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Supplementary(u16);

impl Supplementary {
    /// Routine must be called again to complete its function
    pub const CONTINUE_NEEDED: u16 = 1 << 0;
    /// Token was a duplicate of an earlier token
    pub const DUPLICATE_TOKEN: u16 = 1 << 1;
    /// Token's validity period has expired
    pub const OLD_TOKEN: u16 = 1 << 2;
    /// A later token has already been processed
    pub const UNSEQ_TOKEN: u16 = 1 << 3;
    /// An expected per-message token was not received
    pub const GAP_TOKEN: u16 = 1 << 4;

    /// Create new empty flags
    pub fn new() -> Self {
        Self(0)
    }

    /// Create from raw bits
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Set a flag
    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    /// Check if flag is set
    pub fn has(&self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// Check if no flag is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Calling errors: a required reference was missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallError {
    /// A required input parameter could not be read
    InaccessibleRead = 1,
    /// A required output parameter could not be written
    InaccessibleWrite = 2,
    /// A parameter was malformed
    BadStructure = 3,
}

impl CallError {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(CallError::InaccessibleRead),
            2 => Some(CallError::InaccessibleWrite),
            3 => Some(CallError::BadStructure),
            _ => None,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            CallError::InaccessibleRead => "A required input parameter could not be read",
            CallError::InaccessibleWrite => "A required output parameter could not be written",
            CallError::BadStructure => "A parameter was malformed",
        }
    }
}

/// Structured result of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Routine outcome
    pub major: MajorStatus,
    /// Mechanism-specific diagnostic, zero when unused
    pub minor: u32,
    /// Informational bits
    pub supplementary: Supplementary,
    /// Caller structure error, if any
    pub call_error: Option<CallError>,
}

const CALLING_SHIFT: u32 = 24;
const ROUTINE_SHIFT: u32 = 16;

impl Status {
    /// A plain successful status.
    pub fn complete() -> Self {
        Self::new(MajorStatus::Complete, 0)
    }

    /// Another round trip is required.
    pub fn continue_needed() -> Self {
        let mut supplementary = Supplementary::new();
        supplementary.set(Supplementary::CONTINUE_NEEDED);
        Self {
            major: MajorStatus::ContinueNeeded,
            minor: 0,
            supplementary,
            call_error: None,
        }
    }

    /// Status with a major outcome and minor code.
    pub fn new(major: MajorStatus, minor: u32) -> Self {
        Self {
            major,
            minor,
            supplementary: Supplementary::new(),
            call_error: None,
        }
    }

    /// Attach a calling error.
    pub fn with_call_error(mut self, call_error: CallError) -> Self {
        self.call_error = Some(call_error);
        self
    }

    /// Whether the routine or calling part signals an error.
    pub fn is_error(&self) -> bool {
        self.major.is_error() || self.call_error.is_some()
    }

    /// Whether the caller must continue the exchange.
    pub fn is_continue_needed(&self) -> bool {
        self.supplementary.has(Supplementary::CONTINUE_NEEDED)
    }

    /// Compose the RFC 2744 major status word.
    pub fn to_legacy(&self) -> u32 {
        let calling = self.call_error.map_or(0, |c| c as u32);
        (calling << CALLING_SHIFT)
            | (self.major.routine_code() << ROUTINE_SHIFT)
            | self.supplementary.bits() as u32
    }

    /// Decompose an RFC 2744 major status word.
    pub fn from_legacy(word: u32, minor: u32) -> Option<Self> {
        let calling = word >> CALLING_SHIFT;
        let routine = (word >> ROUTINE_SHIFT) & 0xFF;
        let supplementary = Supplementary::from_bits((word & 0xFFFF) as u16);

        let call_error = match calling {
            0 => None,
            code => Some(CallError::from_code(code)?),
        };
        let mut major = MajorStatus::from_routine_code(routine)?;
        if major == MajorStatus::Complete && supplementary.has(Supplementary::CONTINUE_NEEDED) {
            major = MajorStatus::ContinueNeeded;
        }

        Some(Self {
            major,
            minor,
            supplementary,
            call_error,
        })
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::complete()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major.description())?;
        if let Some(call) = self.call_error {
            write!(f, "; {}", call.description())?;
        }
        let notes = [
            (Supplementary::DUPLICATE_TOKEN, "duplicate token"),
            (Supplementary::OLD_TOKEN, "old token"),
            (Supplementary::UNSEQ_TOKEN, "out-of-sequence token"),
            (Supplementary::GAP_TOKEN, "gap in token sequence"),
        ];
        for (bit, note) in notes {
            if self.supplementary.has(bit) {
                write!(f, "; {note}")?;
            }
        }
        if self.minor != 0 {
            write!(f, " (minor {})", self.minor)?;
        }
        Ok(())
    }
}
