//! Errors raised by the cryptographic primitive collaborator.
//!
//! A primitive failure is always opaque to the caller of the GSS layer:
//! it surfaces as [`MajorStatus::Failure`](crate::status::MajorStatus::Failure)
//! and must leave the context untouched.

use thiserror::Error;

/// Errors from primitive operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key type has no cipher or checksum in this provider.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(i32),

    /// Key bytes do not fit the key type.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Input is not a whole number of cipher blocks.
    #[error("Input length {len} is not a multiple of {block}")]
    BlockLength {
        /// Offending length
        len: usize,
        /// Cipher block size
        block: usize,
    },

    /// Checksum type cannot be computed with this key.
    #[error("Checksum {checksum} unavailable for key type {key_type}")]
    ChecksumUnavailable {
        /// Requested checksum
        checksum: &'static str,
        /// Key type number
        key_type: i32,
    },

    /// Cipher operation failed.
    #[error("Cipher failure: {0}")]
    Cipher(String),

    /// Random source failed.
    #[error("Random source failure: {0}")]
    Rng(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = CryptoError::BlockLength { len: 5, block: 8 };
        assert!(err.to_string().contains("multiple of 8"));

        let err = CryptoError::ChecksumUnavailable {
            checksum: "hmac-sha1-des3-kd",
            key_type: 3,
        };
        assert!(err.to_string().contains("key type 3"));
    }
}
