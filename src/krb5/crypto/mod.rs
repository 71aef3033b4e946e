//! Narrow interface to the cryptographic primitive collaborator.
//!
//! The mechanism never implements ciphers or checksums itself. It calls a
//! [`CryptoProvider`] with well-defined inputs and propagates every failure
//! as an opaque [`CryptoError`]:
//!
//! | Operation       | Profile A (DES)            | Profile B (3DES)              |
//! |-----------------|----------------------------|-------------------------------|
//! | keyed checksum  | RSA-MD5-DES, 8 bytes       | HMAC-SHA1-DES3-KD, 20 bytes   |
//! | encrypt with IV | DES-CBC, no padding        | 3DES-CBC, no padding          |
//! | random bytes    | system CSPRNG              | system CSPRNG                 |
//!
//! # Feature Flag
//!
//! The software provider [`RustCryptoProvider`] requires the `crypto`
//! feature (enabled by default):
//!
//! ```toml
//! gss-core = { version = "0.4", features = ["crypto"] }
//! ```

use std::fmt;

mod error;
mod key;

#[cfg(feature = "crypto")]
mod rustcrypto;

pub use error::CryptoError;
pub use key::{EncType, SessionKey};

#[cfg(feature = "crypto")]
pub use rustcrypto::{nfold, random_to_key, seed_len, RustCryptoProvider};

/// Cipher block size shared by both profiles
pub const BLOCK_SIZE: usize = 8;

/// Keyed checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumType {
    /// MD5 digest encrypted with DES-CBC under a zero IV, last block kept
    RsaMd5DesGss,
    /// HMAC-SHA1 keyed with a key derived from the usage number
    HmacSha1Des3Kd,
}

impl ChecksumType {
    /// Output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            ChecksumType::RsaMd5DesGss => 8,
            ChecksumType::HmacSha1Des3Kd => 20,
        }
    }

    /// Checksum natural for a key's type.
    pub fn for_key(key: &SessionKey) -> Option<Self> {
        match key.enctype() {
            EncType::DesCbcCrc | EncType::DesCbcMd4 | EncType::DesCbcMd5 => {
                Some(ChecksumType::RsaMd5DesGss)
            },
            EncType::Des3CbcSha1Kd => Some(ChecksumType::HmacSha1Des3Kd),
            EncType::Other(_) => None,
        }
    }

    /// Registry-style name.
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumType::RsaMd5DesGss => "rsa-md5-des-gss",
            ChecksumType::HmacSha1Des3Kd => "hmac-sha1-des3-kd",
        }
    }
}

/// Primitive operations consumed by the mechanism.
///
/// Implementations must be safe for concurrent use by independent contexts.
/// The cipher is chosen by the key's [`EncType`]; encrypt and decrypt work
/// on whole blocks and apply no padding.
pub trait CryptoProvider: Send + Sync + fmt::Debug {
    /// Keyed checksum over `data`. `usage` selects the derived key where the
    /// algorithm uses one.
    fn checksum(
        &self,
        key: &SessionKey,
        kind: ChecksumType,
        usage: u32,
        data: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// CBC-encrypt `data` under `key` starting from `iv`.
    fn encrypt_iv(&self, key: &SessionKey, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// CBC-decrypt `data` under `key` starting from `iv`.
    fn decrypt_iv(&self, key: &SessionKey, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Fill `buf` from a cryptographically secure source.
    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

/// Constant-time comparison of checksums
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"checksum", b"checksum"));
        assert!(!constant_time_eq(b"checksum", b"checksun"));
        assert!(!constant_time_eq(b"checksum", b"check"));
    }

    #[test]
    fn test_checksum_for_key() {
        let des = SessionKey::new(EncType::DesCbcMd5, vec![1u8; 8]).unwrap();
        let des3 = SessionKey::new(EncType::Des3CbcSha1Kd, vec![1u8; 24]).unwrap();
        let aes = SessionKey::new(EncType::Other(18), vec![1u8; 32]).unwrap();

        assert_eq!(ChecksumType::for_key(&des), Some(ChecksumType::RsaMd5DesGss));
        assert_eq!(ChecksumType::for_key(&des3), Some(ChecksumType::HmacSha1Des3Kd));
        assert_eq!(ChecksumType::for_key(&aes), None);
        assert_eq!(ChecksumType::HmacSha1Des3Kd.output_len(), 20);
    }
}
