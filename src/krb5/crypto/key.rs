//! Session and long-term key material.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::CryptoError;

/// Encryption type of a key, as numbered by the Kerberos registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncType {
    /// des-cbc-crc
    DesCbcCrc,
    /// des-cbc-md4
    DesCbcMd4,
    /// des-cbc-md5
    DesCbcMd5,
    /// des3-cbc-sha1-kd
    Des3CbcSha1Kd,
    /// Anything else
    Other(i32),
}

impl EncType {
    /// Registry number.
    pub fn number(&self) -> i32 {
        match self {
            EncType::DesCbcCrc => 1,
            EncType::DesCbcMd4 => 2,
            EncType::DesCbcMd5 => 3,
            EncType::Des3CbcSha1Kd => 16,
            EncType::Other(n) => *n,
        }
    }

    /// Map a registry number.
    pub fn from_number(n: i32) -> Self {
        match n {
            1 => EncType::DesCbcCrc,
            2 => EncType::DesCbcMd4,
            3 => EncType::DesCbcMd5,
            16 => EncType::Des3CbcSha1Kd,
            other => EncType::Other(other),
        }
    }

    /// Raw key length, if the type is known.
    pub fn key_len(&self) -> Option<usize> {
        match self {
            EncType::DesCbcCrc | EncType::DesCbcMd4 | EncType::DesCbcMd5 => Some(8),
            EncType::Des3CbcSha1Kd => Some(24),
            EncType::Other(_) => None,
        }
    }
}

/// Key bytes plus type. Zeroized on drop, redacted in debug output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    #[zeroize(skip)]
    enctype: EncType,
    bytes: Vec<u8>,
}

impl SessionKey {
    /// Create a key, checking the length against the type.
    pub fn new(enctype: EncType, bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if let Some(expected) = enctype.key_len() {
            if bytes.len() != expected {
                return Err(CryptoError::InvalidKey(format!(
                    "{:?} key must be {} bytes, got {}",
                    enctype,
                    expected,
                    bytes.len()
                )));
            }
        }
        Ok(Self { enctype, bytes })
    }

    /// Key type.
    pub fn enctype(&self) -> EncType {
        self.enctype
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't leak key material in debug output
        write!(
            f,
            "SessionKey({:?}, [REDACTED, {} bytes])",
            self.enctype,
            self.bytes.len()
        )
    }
}
