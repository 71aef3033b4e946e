//! Software primitive provider built on RustCrypto ciphers and digests.
//!
//! Provides DES and triple-DES in CBC mode without padding, the two keyed
//! checksums of the legacy per-message tokens, and OS randomness.

use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;

use super::{ChecksumType, CryptoError, CryptoProvider, EncType, SessionKey, BLOCK_SIZE};

type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;
type Des3CbcEnc = cbc::Encryptor<des::TdesEde3>;
type Des3CbcDec = cbc::Decryptor<des::TdesEde3>;
type HmacSha1 = Hmac<Sha1>;

/// Derived-key constant suffix for checksum keys
const KD_CHECKSUM: u8 = 0x99;

/// Triple-DES key length
const DES3_KEY_LEN: usize = 24;

/// Bytes of key-generation seed per triple-DES key
const DES3_SEED_LEN: usize = 21;

#[derive(Debug, Clone, Copy)]
enum BlockCipher {
    Des,
    Des3,
}

fn cipher_for(key: &SessionKey) -> Result<BlockCipher, CryptoError> {
    match key.enctype() {
        EncType::DesCbcCrc | EncType::DesCbcMd4 | EncType::DesCbcMd5 => Ok(BlockCipher::Des),
        EncType::Des3CbcSha1Kd => Ok(BlockCipher::Des3),
        EncType::Other(n) => Err(CryptoError::UnsupportedKeyType(n)),
    }
}

fn check_blocks(data: &[u8]) -> Result<(), CryptoError> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::BlockLength {
            len: data.len(),
            block: BLOCK_SIZE,
        });
    }
    Ok(())
}

fn invalid_length(_: cbc::cipher::InvalidLength) -> CryptoError {
    CryptoError::InvalidKey("key or IV has the wrong length".to_string())
}

fn cbc_encrypt(key: &SessionKey, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_blocks(data)?;
    let out = match cipher_for(key)? {
        BlockCipher::Des => DesCbcEnc::new_from_slices(key.as_bytes(), iv)
            .map_err(invalid_length)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        BlockCipher::Des3 => Des3CbcEnc::new_from_slices(key.as_bytes(), iv)
            .map_err(invalid_length)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
    };
    Ok(out)
}

fn cbc_decrypt(key: &SessionKey, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_blocks(data)?;
    let out = match cipher_for(key)? {
        BlockCipher::Des => DesCbcDec::new_from_slices(key.as_bytes(), iv)
            .map_err(invalid_length)?
            .decrypt_padded_vec_mut::<NoPadding>(data),
        BlockCipher::Des3 => Des3CbcDec::new_from_slices(key.as_bytes(), iv)
            .map_err(invalid_length)?
            .decrypt_padded_vec_mut::<NoPadding>(data),
    };
    out.map_err(|e| CryptoError::Cipher(e.to_string()))
}

/// Stretch or shrink `input` to `out_len` bytes with the n-fold operation
/// used by derived-key constants (rotate by 13 bits, ones'-complement add).
pub fn nfold(input: &[u8], out_len: usize) -> Vec<u8> {
    let in_len = input.len();
    let mut out = vec![0u8; out_len];
    if in_len == 0 || out_len == 0 {
        return out;
    }

    let lcm = in_len / gcd(in_len, out_len) * out_len;
    let in_bits = in_len * 8;
    let mut carry: u32 = 0;

    for i in (0..lcm).rev() {
        let msbit = ((in_bits - 1) + (in_bits + 13) * (i / in_len) + (in_len - i % in_len) * 8)
            % in_bits;
        let hi = u32::from(input[((in_len - 1) - (msbit >> 3)) % in_len]);
        let lo = u32::from(input[(in_len - (msbit >> 3)) % in_len]);
        carry += (((hi << 8) | lo) >> ((msbit & 7) + 1)) & 0xFF;
        carry += u32::from(out[i % out_len]);
        out[i % out_len] = (carry & 0xFF) as u8;
        carry >>= 8;
    }

    if carry != 0 {
        for byte in out.iter_mut().rev() {
            carry += u32::from(*byte);
            *byte = (carry & 0xFF) as u8;
            carry >>= 8;
        }
    }

    out
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Set the low bit of every byte so the byte has odd parity.
fn fix_parity(key: &mut [u8]) {
    for byte in key.iter_mut() {
        let high = *byte & 0xFE;
        let odd = high.count_ones() % 2 == 1;
        *byte = if odd { high } else { high | 1 };
    }
}

/// Expand 21 random bytes into a 24-byte triple-DES key.
fn des3_random_to_key(seed: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(DES3_KEY_LEN);
    for chunk in seed.chunks(7) {
        let mut part = [0u8; 8];
        part[..7].copy_from_slice(chunk);
        part[7] = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, b)| acc | ((b & 1) << (i + 1)));
        fix_parity(&mut part);
        key.extend_from_slice(&part);
    }
    key
}

/// Number of random bytes [`random_to_key`] consumes for a key type.
pub fn seed_len(enctype: EncType) -> Result<usize, CryptoError> {
    match enctype {
        EncType::DesCbcCrc | EncType::DesCbcMd4 | EncType::DesCbcMd5 => Ok(BLOCK_SIZE),
        EncType::Des3CbcSha1Kd => Ok(DES3_SEED_LEN),
        EncType::Other(n) => Err(CryptoError::UnsupportedKeyType(n)),
    }
}

/// Turn uniformly random bytes into a key of `enctype`, fixing parity.
pub fn random_to_key(enctype: EncType, seed: &[u8]) -> Result<SessionKey, CryptoError> {
    let expected = seed_len(enctype)?;
    if seed.len() != expected {
        return Err(CryptoError::InvalidKey(format!(
            "{} seed bytes required, got {}",
            expected,
            seed.len()
        )));
    }
    let bytes = match enctype {
        EncType::Des3CbcSha1Kd => des3_random_to_key(seed),
        _ => {
            let mut key = seed.to_vec();
            fix_parity(&mut key);
            key
        },
    };
    SessionKey::new(enctype, bytes)
}

/// Triple-DES derived key for `constant`.
fn des3_derive(key: &SessionKey, constant: &[u8]) -> Result<SessionKey, CryptoError> {
    let zero_iv = [0u8; BLOCK_SIZE];
    let mut block = nfold(constant, BLOCK_SIZE);
    let mut seed = Vec::with_capacity(DES3_SEED_LEN + BLOCK_SIZE);

    while seed.len() < DES3_SEED_LEN {
        block = cbc_encrypt(key, &zero_iv, &block)?;
        seed.extend_from_slice(&block);
    }
    seed.truncate(DES3_SEED_LEN);

    SessionKey::new(EncType::Des3CbcSha1Kd, des3_random_to_key(&seed))
}

/// RustCrypto-backed [`CryptoProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    /// Create a provider
    pub fn new() -> Self {
        Self
    }

    fn rsa_md5_des(&self, key: &SessionKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !matches!(cipher_for(key)?, BlockCipher::Des) {
            return Err(CryptoError::ChecksumUnavailable {
                checksum: ChecksumType::RsaMd5DesGss.name(),
                key_type: key.enctype().number(),
            });
        }
        let digest = md5::compute(data);
        let encrypted = cbc_encrypt(key, &[0u8; BLOCK_SIZE], &digest.0)?;
        Ok(encrypted[encrypted.len() - BLOCK_SIZE..].to_vec())
    }

    fn hmac_sha1_des3_kd(
        &self,
        key: &SessionKey,
        usage: u32,
        data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if !matches!(cipher_for(key)?, BlockCipher::Des3) {
            return Err(CryptoError::ChecksumUnavailable {
                checksum: ChecksumType::HmacSha1Des3Kd.name(),
                key_type: key.enctype().number(),
            });
        }
        let mut constant = usage.to_be_bytes().to_vec();
        constant.push(KD_CHECKSUM);
        let kc = des3_derive(key, &constant)?;

        let mut mac = HmacSha1::new_from_slice(kc.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn checksum(
        &self,
        key: &SessionKey,
        kind: ChecksumType,
        usage: u32,
        data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match kind {
            ChecksumType::RsaMd5DesGss => self.rsa_md5_des(key, data),
            ChecksumType::HmacSha1Des3Kd => self.hmac_sha1_des3_kd(key, usage, data),
        }
    }

    fn encrypt_iv(&self, key: &SessionKey, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cbc_encrypt(key, iv, data)
    }

    fn decrypt_iv(&self, key: &SessionKey, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cbc_decrypt(key, iv, data)
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| CryptoError::Rng(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn des_key() -> SessionKey {
        SessionKey::new(EncType::DesCbcMd5, hex!("0123456789abcdef").to_vec()).unwrap()
    }

    fn des3_key() -> SessionKey {
        SessionKey::new(
            EncType::Des3CbcSha1Kd,
            hex!("dce06b1f64c857a11c3db57c51899b2cc1791008ce973b92").to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_nfold_vectors() {
        assert_eq!(nfold(b"012345", 8), hex!("be072631276b1955"));
        assert_eq!(nfold(b"password", 7), hex!("78a07b6caf85fa"));
        assert_eq!(
            nfold(b"Rough Consensus, and Running Code", 8),
            hex!("bb6ed30870b7f0e0")
        );
        assert_eq!(
            nfold(b"password", 21),
            hex!("59e4a8ca7c0385c3c37b3f6d2000247cb6e6bd5b3e")
        );
    }

    #[test]
    fn test_des3_derived_key_vector() {
        let derived = des3_derive(&des3_key(), &hex!("0000000155")).unwrap();
        assert_eq!(
            derived.as_bytes(),
            hex!("925179d04591a79b5d3192c4a7e9c289b049c71f6ee604cd")
        );
    }

    #[test]
    fn test_random_to_key() {
        let des = random_to_key(EncType::DesCbcMd5, &[0u8; 8]).unwrap();
        assert_eq!(des.as_bytes(), &[0x01; 8]);

        let des3 = random_to_key(EncType::Des3CbcSha1Kd, &[0xFFu8; 21]).unwrap();
        assert_eq!(des3.len(), 24);
        assert!(des3.as_bytes().iter().all(|b| b.count_ones() % 2 == 1));

        assert!(random_to_key(EncType::DesCbcMd5, &[0u8; 7]).is_err());
        assert!(matches!(
            random_to_key(EncType::Other(18), &[0u8; 16]),
            Err(CryptoError::UnsupportedKeyType(18))
        ));
    }

    #[test]
    fn test_parity() {
        let mut key = [0u8, 1, 2, 0xFE];
        fix_parity(&mut key);
        assert_eq!(key, [0x01, 0x01, 0x02, 0xFE]);
        for byte in key {
            assert_eq!(byte.count_ones() % 2, 1);
        }
    }

    #[test]
    fn test_cbc_round_trip() {
        let provider = RustCryptoProvider::new();
        let iv = hex!("0102030405060708");
        for key in [des_key(), des3_key()] {
            let ct = provider.encrypt_iv(&key, &iv, b"sixteen byte msg").unwrap();
            assert_eq!(ct.len(), 16);
            assert_ne!(&ct[..], b"sixteen byte msg");
            let pt = provider.decrypt_iv(&key, &iv, &ct).unwrap();
            assert_eq!(&pt[..], b"sixteen byte msg");
        }
    }

    #[test]
    fn test_cbc_rejects_partial_block() {
        let provider = RustCryptoProvider::new();
        let err = provider
            .encrypt_iv(&des_key(), &[0u8; 8], b"short")
            .unwrap_err();
        assert!(matches!(err, CryptoError::BlockLength { len: 5, .. }));
    }

    #[test]
    fn test_checksum_lengths_and_keys() {
        let provider = RustCryptoProvider::new();
        let a = provider
            .checksum(&des_key(), ChecksumType::RsaMd5DesGss, 0, b"data")
            .unwrap();
        assert_eq!(a.len(), 8);
        let b = provider
            .checksum(&des3_key(), ChecksumType::HmacSha1Des3Kd, 23, b"data")
            .unwrap();
        assert_eq!(b.len(), 20);

        assert!(provider
            .checksum(&des_key(), ChecksumType::HmacSha1Des3Kd, 23, b"data")
            .is_err());
        assert!(provider
            .checksum(&des3_key(), ChecksumType::RsaMd5DesGss, 0, b"data")
            .is_err());
    }

    #[test]
    fn test_md5_des_checksum_uses_plain_session_key() {
        let provider = RustCryptoProvider::new();
        let key = des_key();
        let digest = md5::compute(b"data");
        let encrypted = provider.encrypt_iv(&key, &[0u8; 8], &digest.0).unwrap();

        let cksum = provider
            .checksum(&key, ChecksumType::RsaMd5DesGss, 23, b"data")
            .unwrap();
        assert_eq!(cksum, encrypted[8..]);
    }

    #[test]
    fn test_checksum_depends_on_usage() {
        let provider = RustCryptoProvider::new();
        let k = des3_key();
        let c23 = provider.checksum(&k, ChecksumType::HmacSha1Des3Kd, 23, b"x").unwrap();
        let c24 = provider.checksum(&k, ChecksumType::HmacSha1Des3Kd, 24, b"x").unwrap();
        assert_ne!(c23, c24);
    }

    #[test]
    fn test_unsupported_key_type() {
        let provider = RustCryptoProvider::new();
        let key = SessionKey::new(EncType::Other(18), vec![0u8; 32]).unwrap();
        assert!(matches!(
            provider.encrypt_iv(&key, &[0u8; 8], &[0u8; 8]),
            Err(CryptoError::UnsupportedKeyType(18))
        ));
    }

    #[test]
    fn test_random_bytes() {
        let provider = RustCryptoProvider::new();
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        provider.random_bytes(&mut a).unwrap();
        provider.random_bytes(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
