//! Mechanism-independent outer token wrapper.

use bytes::BufMut;

use super::der::{der_length_size, read_der_length, write_der_length};
use super::token::TokenTag;
use super::{need, CodecError, OID_TAG, WRAPPER_TAG};
use crate::oid::Oid;

/// Borrowed view of an unframed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unframed<'a> {
    /// DER content octets of the embedded mechanism identifier
    pub mech: &'a [u8],
    /// Inner token
    pub inner: &'a [u8],
}

impl Unframed<'_> {
    /// Owned copy of the embedded identifier.
    pub fn mech_oid(&self) -> Result<Oid, CodecError> {
        Oid::from_der(self.mech.to_vec()).map_err(|_| CodecError::EmptyOid)
    }
}

/// Frame `inner` with the wrapper naming `mech`.
///
/// Fails with [`CodecError::BadLength`] if the framed content would not fit
/// a four-octet length.
pub fn encapsulate(mech: &Oid, inner: &[u8]) -> Result<Vec<u8>, CodecError> {
    encapsulate_parts(mech, &[], inner)
}

/// Frame `tag ++ body` with the wrapper naming `mech`.
pub fn encapsulate_tagged(
    mech: &Oid,
    tag: TokenTag,
    body: &[u8],
) -> Result<Vec<u8>, CodecError> {
    encapsulate_parts(mech, &tag.as_bytes(), body)
}

fn encapsulate_parts(mech: &Oid, prefix: &[u8], body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let oid_len = mech.len();
    let content_len = 1 + der_length_size(oid_len) + oid_len + prefix.len() + body.len();
    let mut buf = Vec::with_capacity(1 + der_length_size(content_len) + content_len);

    buf.put_u8(WRAPPER_TAG);
    write_der_length(&mut buf, content_len)?;
    buf.put_u8(OID_TAG);
    write_der_length(&mut buf, oid_len)?;
    buf.put_slice(mech.as_bytes());
    buf.put_slice(prefix);
    buf.put_slice(body);
    Ok(buf)
}

/// Split a token into its embedded identifier and inner token.
///
/// The declared length must cover exactly the rest of the buffer.
pub fn decapsulate(token: &[u8]) -> Result<Unframed<'_>, CodecError> {
    need(token, 1)?;
    if token[0] != WRAPPER_TAG {
        return Err(CodecError::BadTag(token[0]));
    }

    let (content_len, consumed) = read_der_length(&token[1..])?;
    let content = &token[1 + consumed..];
    if content_len != content.len() {
        return Err(CodecError::LengthMismatch {
            declared: content_len,
            actual: content.len(),
        });
    }

    need(content, 1)?;
    if content[0] != OID_TAG {
        return Err(CodecError::BadOidTag(content[0]));
    }
    let (oid_len, consumed) = read_der_length(&content[1..])?;
    if oid_len == 0 {
        return Err(CodecError::EmptyOid);
    }
    let rest = &content[1 + consumed..];
    need(rest, oid_len)?;

    Ok(Unframed {
        mech: &rest[..oid_len],
        inner: &rest[oid_len..],
    })
}

/// Unframe a token that must name `expected`.
pub fn decapsulate_for<'a>(token: &'a [u8], expected: &Oid) -> Result<&'a [u8], CodecError> {
    let unframed = decapsulate(token)?;
    if unframed.mech != expected.as_bytes() {
        return Err(CodecError::MechMismatch {
            expected: expected.clone(),
            found: unframed.mech_oid()?,
        });
    }
    Ok(unframed.inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::{GSS_KRB5, NT_USER_NAME};
    use hex_literal::hex;

    #[test]
    fn test_wire_layout() {
        let token = encapsulate_tagged(&GSS_KRB5, TokenTag::ApReq, b"abc").unwrap();
        assert_eq!(
            token,
            hex!("60 10 06 09 2a864886f712010202 0100 616263").to_vec()
        );
    }

    #[test]
    fn test_unframe() {
        let token = encapsulate(&GSS_KRB5, b"inner bytes").unwrap();
        let unframed = decapsulate(&token).unwrap();
        assert_eq!(unframed.mech, GSS_KRB5.as_bytes());
        assert_eq!(unframed.inner, b"inner bytes");
        assert_eq!(unframed.mech_oid().unwrap(), GSS_KRB5);
    }

    #[test]
    fn test_long_form_length() {
        let body = vec![0xAB; 300];
        let token = encapsulate(&GSS_KRB5, &body).unwrap();
        assert_eq!(token[1], 0x82);
        assert_eq!(decapsulate(&token).unwrap().inner, &body[..]);
    }

    #[test]
    fn test_mech_mismatch_rejected() {
        let token = encapsulate(&NT_USER_NAME, b"x").unwrap();
        let err = decapsulate_for(&token, &GSS_KRB5).unwrap_err();
        assert!(matches!(err, CodecError::MechMismatch { .. }));
        assert_eq!(decapsulate_for(&token, &NT_USER_NAME).unwrap(), b"x");
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(decapsulate(&[]), Err(CodecError::Truncated { .. })));
        assert!(matches!(decapsulate(&[0x61, 0x00]), Err(CodecError::BadTag(0x61))));

        let mut token = encapsulate(&GSS_KRB5, b"x").unwrap();
        token.push(0);
        assert!(matches!(
            decapsulate(&token),
            Err(CodecError::LengthMismatch { .. })
        ));

        let token = hex!("60 03 04 01 2a");
        assert!(matches!(decapsulate(&token), Err(CodecError::BadOidTag(0x04))));

        let token = hex!("60 02 06 00");
        assert!(matches!(decapsulate(&token), Err(CodecError::EmptyOid)));

        let token = hex!("60 03 06 05 2a");
        assert!(matches!(
            decapsulate(&token),
            Err(CodecError::Truncated { .. })
        ));
    }
}
