//! Token framing.
//!
//! Two nested framings are shared by every mechanism token:
//!
//! ```text
//! outer wrapper (mechanism independent):
//!   0x60 <der-len> 0x06 <der-len> <mechanism oid> <inner token>
//!
//! inner token (ticket mechanism):
//!   <2: token tag> <body>
//!     01 00  authentication request
//!     02 00  authentication reply
//!     01 01  MIC
//!     02 01  wrap
//! ```
//!
//! The outer wrapper is validated before any cryptographic state is
//! consulted: a token whose embedded identifier differs from the expected
//! mechanism is rejected right here.

use thiserror::Error;

use crate::oid::Oid;

mod der;
mod token;
mod wrapper;

pub use der::{der_length_size, read_der_length, write_der_length};
pub use token::{
    strip_tag, AuthenticatorChecksum, PerMessageHeader, TokenTag, AUTHENTICATOR_CHECKSUM_LEN,
    AUTHENTICATOR_CHECKSUM_TYPE, FILLER, PER_MESSAGE_HEADER_LEN, SEAL_ALG_NONE, TOKEN_TAG_LEN,
};
pub use wrapper::{decapsulate, decapsulate_for, encapsulate, encapsulate_tagged, Unframed};

/// Outer wrapper tag: [APPLICATION 0] constructed
pub const WRAPPER_TAG: u8 = 0x60;

/// Universal OBJECT IDENTIFIER tag
pub const OID_TAG: u8 = 0x06;

/// Framing errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Buffer ended before a field was complete.
    #[error("Token truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes the field requires
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Leading byte is not the wrapper tag.
    #[error("Bad wrapper tag: 0x{0:02x}")]
    BadTag(u8),

    /// Length octets are malformed or unsupported.
    #[error("Malformed length encoding")]
    BadLength,

    /// Declared length disagrees with the buffer.
    #[error("Length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Length in the header
        declared: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Identifier tag missing.
    #[error("Bad identifier tag: 0x{0:02x}")]
    BadOidTag(u8),

    /// Identifier has zero length.
    #[error("Empty mechanism identifier")]
    EmptyOid,

    /// Embedded identifier is not the expected mechanism.
    #[error("Mechanism mismatch: expected {expected}, found {found}")]
    MechMismatch {
        /// Mechanism the caller is bound to
        expected: Oid,
        /// Mechanism named by the token
        found: Oid,
    },

    /// Inner token tag is not the one expected.
    #[error("Unexpected inner token tag {found:02x?}")]
    BadInnerTag {
        /// Tag bytes found
        found: [u8; 2],
    },

    /// Fixed field did not carry its required value.
    #[error("Bad {field}: 0x{value:04x}")]
    BadField {
        /// Field name
        field: &'static str,
        /// Value found
        value: u16,
    },
}

/// Ensure `buf` holds at least `needed` bytes.
pub(crate) fn need(buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}
