//! Per-message protection: wrap, unwrap and MIC tokens.
//!
//! ```text
//! wrap:  hdr8 · E(seq8, iv = cksum[..8]) · cksum · confounder8 · data · pad
//! mic:   hdr8 · E(seq8, iv = cksum[..8]) · cksum
//! seq8:  [4: LE sequence number][4: direction, 00 initiator / FF acceptor]
//! ```
//!
//! The wrap checksum covers hdr8 · confounder · data · pad; the MIC
//! checksum covers hdr8 · message. Receive order is strict: the decrypted
//! sequence number must equal the expected one exactly.

use bytes::BufMut;

use super::context::{Krb5Context, Role};
use super::{incomplete, minor, Krb5Mechanism};
use crate::codec::{
    self, CodecError, PerMessageHeader, TokenTag, PER_MESSAGE_HEADER_LEN, SEAL_ALG_NONE,
};
use crate::error::{GssError, Result};
use crate::krb5::crypto::{constant_time_eq, ChecksumType, SessionKey, BLOCK_SIZE};
use crate::oid::GSS_KRB5;

/// Signing algorithm: DES MAC of an MD5 digest
pub const SGN_ALG_DES_MAC_MD5: u16 = 0x0000;

/// Signing algorithm: HMAC-SHA1 with a derived triple-DES key
pub const SGN_ALG_HMAC_SHA1_DES3_KD: u16 = 0x0004;

/// Key usage for per-message checksums
pub const KEY_USAGE_SIGN: u32 = 23;

const SEQ_BLOCK_LEN: usize = 8;
const CONFOUNDER_LEN: usize = 8;
const DIRECTION_INITIATOR: [u8; 4] = [0x00; 4];
const DIRECTION_ACCEPTOR: [u8; 4] = [0xFF; 4];

/// Checksum profile selected by the session key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Profile {
    sgn_alg: u16,
    kind: ChecksumType,
}

impl Profile {
    fn for_key(key: &SessionKey) -> Result<Self> {
        let kind = ChecksumType::for_key(key).ok_or_else(|| {
            GssError::failure(
                format!("no per-message profile for key type {}", key.enctype().number()),
                minor::BAD_SIGN_TYPE,
            )
        })?;
        let sgn_alg = match kind {
            ChecksumType::RsaMd5DesGss => SGN_ALG_DES_MAC_MD5,
            ChecksumType::HmacSha1Des3Kd => SGN_ALG_HMAC_SHA1_DES3_KD,
        };
        Ok(Self { sgn_alg, kind })
    }

    fn cksum_len(&self) -> usize {
        self.kind.output_len()
    }

    /// Judge the algorithm fields of a received header.
    fn check(&self, header: &PerMessageHeader) -> Result<()> {
        if header.seal_alg != SEAL_ALG_NONE {
            return Err(GssError::bad_mic(
                format!("unsupported sealing algorithm 0x{:04x}", header.seal_alg),
                0,
            ));
        }
        match header.sgn_alg {
            SGN_ALG_DES_MAC_MD5 | SGN_ALG_HMAC_SHA1_DES3_KD if header.sgn_alg == self.sgn_alg => {
                Ok(())
            },
            SGN_ALG_DES_MAC_MD5 | SGN_ALG_HMAC_SHA1_DES3_KD => Err(GssError::bad_mic(
                format!("signing algorithm {} does not match the session key", header.sgn_alg),
                minor::BAD_SIGN_TYPE,
            )),
            other => Err(GssError::failure(
                format!("unknown signing algorithm 0x{other:04x}"),
                minor::BAD_SIGN_TYPE,
            )),
        }
    }
}

/// Direction marker this side writes
fn own_direction(role: Role) -> [u8; 4] {
    match role {
        Role::Initiator => DIRECTION_INITIATOR,
        Role::Acceptor => DIRECTION_ACCEPTOR,
    }
}

/// Direction marker this side expects from the peer
fn peer_direction(role: Role) -> [u8; 4] {
    match role {
        Role::Initiator => DIRECTION_ACCEPTOR,
        Role::Acceptor => DIRECTION_INITIATOR,
    }
}

/// Header errors surface as verification failures; truncation stays a framing error.
fn header_error(err: CodecError) -> GssError {
    match err {
        CodecError::Truncated { .. } => GssError::DefectiveToken(err),
        other => GssError::bad_mic(other.to_string(), 0),
    }
}

fn bad_length(what: &str) -> GssError {
    GssError::bad_mic(format!("{what} has an inconsistent length"), minor::BAD_LENGTH)
}

/// Frame an outgoing per-message token.
fn frame(inner: &[u8]) -> Result<Vec<u8>> {
    codec::encapsulate(&GSS_KRB5, inner)
        .map_err(|e| GssError::failure(format!("cannot frame token: {e}"), minor::WRONG_SIZE))
}

/// How a rejected sequence number relates to the expected one
fn sequence_class(expected: u32, found: u32) -> &'static str {
    let behind = expected.wrapping_sub(found);
    if behind == 1 {
        "duplicate"
    } else if behind < u32::MAX / 2 {
        "old"
    } else {
        "out-of-order"
    }
}

/// Parts of a received token that still need verifying
struct Received<'a> {
    header: &'a [u8],
    enc_seq: &'a [u8],
    cksum: &'a [u8],
    rest: &'a [u8],
}

fn split_token<'a>(inner: &'a [u8], profile: &Profile) -> Result<Received<'a>> {
    let fixed = PER_MESSAGE_HEADER_LEN + SEQ_BLOCK_LEN + profile.cksum_len();
    if inner.len() < fixed {
        return Err(bad_length("token"));
    }
    let (header, tail) = inner.split_at(PER_MESSAGE_HEADER_LEN);
    let (enc_seq, tail) = tail.split_at(SEQ_BLOCK_LEN);
    let (cksum, rest) = tail.split_at(profile.cksum_len());
    Ok(Received {
        header,
        enc_seq,
        cksum,
        rest,
    })
}

impl Krb5Mechanism {
    /// Encrypt `[seq][direction]` under the session key with the checksum as IV.
    fn seal_sequence(&self, ctx: &Krb5Context, cksum: &[u8]) -> Result<Vec<u8>> {
        let mut block = Vec::with_capacity(SEQ_BLOCK_LEN);
        block.put_u32_le(ctx.send_seq);
        block.put_slice(&own_direction(ctx.role));
        Ok(self.provider.encrypt_iv(&ctx.key, &cksum[..BLOCK_SIZE], &block)?)
    }

    /// Decrypt a sequence block and check its direction marker.
    fn open_sequence(&self, ctx: &Krb5Context, cksum: &[u8], enc_seq: &[u8]) -> Result<u32> {
        let block = self.provider.decrypt_iv(&ctx.key, &cksum[..BLOCK_SIZE], enc_seq)?;
        if block.len() != SEQ_BLOCK_LEN {
            return Err(bad_length("sequence block"));
        }
        if block[4..] != peer_direction(ctx.role) {
            tracing::warn!("Token carries the wrong direction marker");
            return Err(GssError::bad_mic("wrong direction marker", 0));
        }
        Ok(u32::from_le_bytes([block[0], block[1], block[2], block[3]]))
    }

    /// Compare against the expected receive sequence number.
    fn check_sequence(ctx: &Krb5Context, seq: u32) -> Result<()> {
        if seq != ctx.recv_seq {
            let class = sequence_class(ctx.recv_seq, seq);
            tracing::warn!(
                "Rejected {} token: sequence {} expected {}",
                class,
                seq,
                ctx.recv_seq
            );
            return Err(GssError::bad_mic(format!("{class} token"), 0));
        }
        Ok(())
    }

    fn verify_checksum(
        &self,
        ctx: &Krb5Context,
        profile: &Profile,
        signed: &[u8],
        cksum: &[u8],
    ) -> Result<()> {
        let expected = self
            .provider
            .checksum(&ctx.key, profile.kind, KEY_USAGE_SIGN, signed)?;
        if !constant_time_eq(&expected, cksum) {
            tracing::warn!("Per-message checksum mismatch");
            return Err(GssError::bad_mic("checksum mismatch", 0));
        }
        Ok(())
    }

    /// Build a wrap token around `message`. Integrity protection only.
    pub(super) fn wrap_message(&self, ctx: &mut Krb5Context, message: &[u8]) -> Result<Vec<u8>> {
        let profile = Profile::for_key(&ctx.key)?;
        let header = PerMessageHeader::new(TokenTag::Wrap, profile.sgn_alg).encode();

        let mut confounder = [0u8; CONFOUNDER_LEN];
        self.provider.random_bytes(&mut confounder)?;

        let pad_len = BLOCK_SIZE - message.len() % BLOCK_SIZE;
        let mut padded = Vec::with_capacity(message.len() + pad_len);
        padded.put_slice(message);
        padded.put_bytes(pad_len as u8, pad_len);

        let mut signed = Vec::with_capacity(header.len() + CONFOUNDER_LEN + padded.len());
        signed.put_slice(&header);
        signed.put_slice(&confounder);
        signed.put_slice(&padded);
        let cksum = self
            .provider
            .checksum(&ctx.key, profile.kind, KEY_USAGE_SIGN, &signed)?;
        let enc_seq = self.seal_sequence(ctx, &cksum)?;

        let mut inner = Vec::with_capacity(
            PER_MESSAGE_HEADER_LEN + SEQ_BLOCK_LEN + cksum.len() + CONFOUNDER_LEN + padded.len(),
        );
        inner.put_slice(&header);
        inner.put_slice(&enc_seq);
        inner.put_slice(&cksum);
        inner.put_slice(&confounder);
        inner.put_slice(&padded);

        let token = frame(&inner)?;
        ctx.send_seq = ctx.send_seq.wrapping_add(1);
        Ok(token)
    }

    /// Verify a wrap token and return the payload.
    pub(super) fn unwrap_message(&self, ctx: &mut Krb5Context, token: &[u8]) -> Result<Vec<u8>> {
        if !ctx.is_established() {
            return Err(incomplete());
        }
        let inner = codec::decapsulate_for(token, &GSS_KRB5)?;
        let header = PerMessageHeader::parse(inner, TokenTag::Wrap).map_err(header_error)?;
        let profile = Profile::for_key(&ctx.key)?;
        profile.check(&header)?;

        let parts = split_token(inner, &profile)?;
        let body = parts.rest;
        if body.len() < CONFOUNDER_LEN + BLOCK_SIZE || body.len() % BLOCK_SIZE != 0 {
            return Err(bad_length("wrapped payload"));
        }
        let (confounder, padded) = body.split_at(CONFOUNDER_LEN);

        let seq = self.open_sequence(ctx, parts.cksum, parts.enc_seq)?;

        let pad_len = usize::from(padded[padded.len() - 1]);
        if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
            return Err(GssError::bad_mic(format!("bad pad length {pad_len}"), 0));
        }
        let (data, pad) = padded.split_at(padded.len() - pad_len);
        if pad.iter().any(|&b| usize::from(b) != pad_len) {
            return Err(GssError::bad_mic("inconsistent padding", 0));
        }

        let mut signed = Vec::with_capacity(parts.header.len() + confounder.len() + padded.len());
        signed.put_slice(parts.header);
        signed.put_slice(confounder);
        signed.put_slice(padded);
        self.verify_checksum(ctx, &profile, &signed, parts.cksum)?;

        Self::check_sequence(ctx, seq)?;
        ctx.recv_seq = ctx.recv_seq.wrapping_add(1);
        Ok(data.to_vec())
    }

    /// Build a MIC token over `message`.
    pub(super) fn mic_message(&self, ctx: &mut Krb5Context, message: &[u8]) -> Result<Vec<u8>> {
        let profile = Profile::for_key(&ctx.key)?;
        let header = PerMessageHeader::new(TokenTag::Mic, profile.sgn_alg).encode();

        let mut signed = Vec::with_capacity(header.len() + message.len());
        signed.put_slice(&header);
        signed.put_slice(message);
        let cksum = self
            .provider
            .checksum(&ctx.key, profile.kind, KEY_USAGE_SIGN, &signed)?;
        let enc_seq = self.seal_sequence(ctx, &cksum)?;

        let mut inner = Vec::with_capacity(PER_MESSAGE_HEADER_LEN + SEQ_BLOCK_LEN + cksum.len());
        inner.put_slice(&header);
        inner.put_slice(&enc_seq);
        inner.put_slice(&cksum);

        let token = frame(&inner)?;
        ctx.send_seq = ctx.send_seq.wrapping_add(1);
        Ok(token)
    }

    /// Verify a MIC token against `message`.
    pub(super) fn verify_mic_message(
        &self,
        ctx: &mut Krb5Context,
        message: &[u8],
        token: &[u8],
    ) -> Result<()> {
        if !ctx.is_established() {
            return Err(incomplete());
        }
        let inner = codec::decapsulate_for(token, &GSS_KRB5)?;
        let header = PerMessageHeader::parse(inner, TokenTag::Mic).map_err(header_error)?;
        let profile = Profile::for_key(&ctx.key)?;
        profile.check(&header)?;

        let parts = split_token(inner, &profile)?;
        if !parts.rest.is_empty() {
            return Err(bad_length("MIC token"));
        }
        let seq = self.open_sequence(ctx, parts.cksum, parts.enc_seq)?;

        let mut signed = Vec::with_capacity(parts.header.len() + message.len());
        signed.put_slice(parts.header);
        signed.put_slice(message);
        self.verify_checksum(ctx, &profile, &signed, parts.cksum)?;

        Self::check_sequence(ctx, seq)?;
        ctx.recv_seq = ctx.recv_seq.wrapping_add(1);
        Ok(())
    }
}
