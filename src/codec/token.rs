//! Inner token markers and fixed-layout fields of the ticket mechanism.

use bytes::{Buf, BufMut};

use super::{need, CodecError};

/// Length of an inner token tag
pub const TOKEN_TAG_LEN: usize = 2;

/// Length of the per-message header: tag, signing alg, sealing alg, filler
pub const PER_MESSAGE_HEADER_LEN: usize = 8;

/// Sealing algorithm value meaning "payload not encrypted"
pub const SEAL_ALG_NONE: u16 = 0xFFFF;

/// Filler carried after the sealing algorithm
pub const FILLER: u16 = 0xFFFF;

/// Authenticator checksum type carrying bindings hash and flags
pub const AUTHENTICATOR_CHECKSUM_TYPE: i32 = 0x8003;

/// Encoded length of the authenticator checksum
pub const AUTHENTICATOR_CHECKSUM_LEN: usize = 24;

const BINDINGS_LEN: usize = 16;

/// Two-byte inner token tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenTag {
    /// Authentication request
    ApReq,
    /// Authentication reply
    ApRep,
    /// Integrity-only message token
    Mic,
    /// Wrapped message
    Wrap,
}

impl TokenTag {
    /// Wire bytes.
    pub const fn as_bytes(self) -> [u8; 2] {
        match self {
            TokenTag::ApReq => [0x01, 0x00],
            TokenTag::ApRep => [0x02, 0x00],
            TokenTag::Mic => [0x01, 0x01],
            TokenTag::Wrap => [0x02, 0x01],
        }
    }

    /// Parse wire bytes.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        match bytes {
            [0x01, 0x00] => Some(TokenTag::ApReq),
            [0x02, 0x00] => Some(TokenTag::ApRep),
            [0x01, 0x01] => Some(TokenTag::Mic),
            [0x02, 0x01] => Some(TokenTag::Wrap),
            _ => None,
        }
    }
}

/// Check that `inner` starts with `expected` and return the body after it.
pub fn strip_tag(inner: &[u8], expected: TokenTag) -> Result<&[u8], CodecError> {
    need(inner, TOKEN_TAG_LEN)?;
    let found = [inner[0], inner[1]];
    if found != expected.as_bytes() {
        return Err(CodecError::BadInnerTag { found });
    }
    Ok(&inner[TOKEN_TAG_LEN..])
}

/// Authenticator checksum (type 0x8003).
///
/// ```text
/// [4: LE length = 16][16: channel binding hash][4: LE context flags]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthenticatorChecksum {
    /// Binding hash, all zero when no bindings were supplied
    pub bindings: [u8; BINDINGS_LEN],
    /// Requested context flags
    pub flags: u32,
}

impl AuthenticatorChecksum {
    /// Checksum with no channel bindings.
    pub fn new(flags: u32) -> Self {
        Self {
            bindings: [0u8; BINDINGS_LEN],
            flags,
        }
    }

    /// Encode to the fixed 24-byte layout.
    pub fn encode(&self) -> [u8; AUTHENTICATOR_CHECKSUM_LEN] {
        let mut buf = Vec::with_capacity(AUTHENTICATOR_CHECKSUM_LEN);
        buf.put_u32_le(BINDINGS_LEN as u32);
        buf.put_slice(&self.bindings);
        buf.put_u32_le(self.flags);

        let mut out = [0u8; AUTHENTICATOR_CHECKSUM_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Decode, checking the embedded length.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        need(data, AUTHENTICATOR_CHECKSUM_LEN)?;
        let mut cursor = data;

        let lgth = cursor.get_u32_le();
        if lgth != BINDINGS_LEN as u32 {
            return Err(CodecError::BadField {
                field: "binding length",
                value: lgth as u16,
            });
        }
        let mut bindings = [0u8; BINDINGS_LEN];
        cursor.copy_to_slice(&mut bindings);
        let flags = cursor.get_u32_le();

        Ok(Self { bindings, flags })
    }

    /// Whether any channel bindings were supplied.
    pub fn has_bindings(&self) -> bool {
        self.bindings.iter().any(|&b| b != 0)
    }
}

/// Eight-byte header shared by wrap and MIC tokens.
///
/// ```text
/// [2: tag][2: LE signing alg][2: LE sealing alg][2: filler FF FF]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerMessageHeader {
    /// Token kind
    pub tag: TokenTag,
    /// Signing (checksum) algorithm
    pub sgn_alg: u16,
    /// Sealing algorithm, [`SEAL_ALG_NONE`] when unencrypted
    pub seal_alg: u16,
}

impl PerMessageHeader {
    /// Header for an unencrypted token.
    pub fn new(tag: TokenTag, sgn_alg: u16) -> Self {
        Self {
            tag,
            sgn_alg,
            seal_alg: SEAL_ALG_NONE,
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> [u8; PER_MESSAGE_HEADER_LEN] {
        let mut buf = Vec::with_capacity(PER_MESSAGE_HEADER_LEN);
        buf.put_slice(&self.tag.as_bytes());
        buf.put_u16_le(self.sgn_alg);
        buf.put_u16_le(self.seal_alg);
        buf.put_u16_le(FILLER);

        let mut out = [0u8; PER_MESSAGE_HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Parse a header that must carry `expected` and a valid filler.
    ///
    /// The algorithm fields are returned as found; judging them is up to
    /// the mechanism.
    pub fn parse(data: &[u8], expected: TokenTag) -> Result<Self, CodecError> {
        need(data, PER_MESSAGE_HEADER_LEN)?;
        let mut cursor = strip_tag(data, expected)?;

        let sgn_alg = cursor.get_u16_le();
        let seal_alg = cursor.get_u16_le();
        let filler = cursor.get_u16_le();
        if filler != FILLER {
            return Err(CodecError::BadField {
                field: "filler",
                value: filler,
            });
        }

        Ok(Self {
            tag: expected,
            sgn_alg,
            seal_alg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_tag_bytes() {
        for tag in [TokenTag::ApReq, TokenTag::ApRep, TokenTag::Mic, TokenTag::Wrap] {
            assert_eq!(TokenTag::from_bytes(tag.as_bytes()), Some(tag));
        }
        assert_eq!(TokenTag::from_bytes([0x03, 0x00]), None);
    }

    #[test]
    fn test_strip_tag() {
        assert_eq!(strip_tag(&hex!("0201 aabb"), TokenTag::Wrap).unwrap(), &hex!("aabb"));
        assert!(matches!(
            strip_tag(&hex!("0101 aabb"), TokenTag::Wrap),
            Err(CodecError::BadInnerTag { found: [0x01, 0x01] })
        ));
        assert!(matches!(
            strip_tag(&[0x02], TokenTag::Wrap),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_authenticator_checksum_layout() {
        let cksum = AuthenticatorChecksum::new(0x0000_0032);
        let encoded = cksum.encode();
        assert_eq!(
            encoded,
            hex!("10000000 00000000000000000000000000000000 32000000")
        );
        let decoded = AuthenticatorChecksum::decode(&encoded).unwrap();
        assert_eq!(decoded, cksum);
        assert!(!decoded.has_bindings());
    }

    #[test]
    fn test_authenticator_checksum_rejects_bad_length() {
        let mut encoded = AuthenticatorChecksum::new(2).encode();
        encoded[0] = 0x11;
        assert!(matches!(
            AuthenticatorChecksum::decode(&encoded),
            Err(CodecError::BadField { field: "binding length", .. })
        ));
        assert!(AuthenticatorChecksum::decode(&encoded[..20]).is_err());
    }

    #[test]
    fn test_per_message_header_layout() {
        let des = PerMessageHeader::new(TokenTag::Wrap, 0);
        assert_eq!(des.encode(), hex!("0201 0000 ffff ffff"));

        let des3 = PerMessageHeader::new(TokenTag::Mic, 4);
        assert_eq!(des3.encode(), hex!("0101 0400 ffff ffff"));
        assert_eq!(PerMessageHeader::parse(&des3.encode(), TokenTag::Mic).unwrap(), des3);
    }

    #[test]
    fn test_per_message_header_rejects_filler() {
        let header = hex!("0201 0000 ffff fffe");
        assert!(matches!(
            PerMessageHeader::parse(&header, TokenTag::Wrap),
            Err(CodecError::BadField { field: "filler", .. })
        ));
    }
}
