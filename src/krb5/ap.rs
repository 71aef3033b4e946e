//! Authentication exchange collaborator.
//!
//! Building and opening the authentication request and reply is delegated
//! to an [`ApExchange`]. The mechanism only sees the decoded contents.
//!
//! [`SealedApExchange`] is a compact reference encoding. Every sealed part
//! is encrypted and checksummed under a key with its own usage number:
//!
//! ```text
//! request body:  [1: version 5][1: options][2: len][ticket][2: len][authenticator]
//! reply body:    [1: version 5][sealed reply]
//! sealed part:   E(key, [8: confounder][4: len][plain][zero pad]) ++ checksum
//! ```

use std::fmt;
use std::string::FromUtf8Error;
use std::sync::Arc;

use bytes::{Buf, BufMut};
use thiserror::Error;

use super::minor;
use super::ticket::ServiceTicket;
use crate::codec::{need, AuthenticatorChecksum, CodecError, AUTHENTICATOR_CHECKSUM_TYPE};
use crate::error::GssError;
use crate::krb5::crypto::{
    constant_time_eq, ChecksumType, CryptoError, CryptoProvider, EncType, SessionKey, BLOCK_SIZE,
};

/// Key usage of the sealed ticket
pub const KEY_USAGE_TICKET: u32 = 2;

/// Key usage of the sealed authenticator
pub const KEY_USAGE_AUTHENTICATOR: u32 = 11;

/// Key usage of the sealed reply
pub const KEY_USAGE_AP_REP: u32 = 12;

/// Protocol version byte
const PVNO: u8 = 5;

/// Option bit: the initiator wants a reply
const OPT_MUTUAL_REQUIRED: u8 = 0x01;

const CONFOUNDER_LEN: usize = 8;

/// Errors from building or opening exchange messages.
#[derive(Debug, Error)]
pub enum ApError {
    /// Message layout is wrong.
    #[error("Malformed exchange message: {0}")]
    Codec(#[from] CodecError),

    /// Sealed part failed its checksum.
    #[error("Integrity check failed")]
    Integrity,

    /// Authenticator carries a checksum type other than 0x8003.
    #[error("Unsupported authenticator checksum type 0x{0:x}")]
    ChecksumType(i32),

    /// A principal name is not UTF-8.
    #[error("Invalid principal name: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// Primitive failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<ApError> for GssError {
    fn from(err: ApError) -> Self {
        match err {
            ApError::Codec(e) => GssError::DefectiveToken(e),
            ApError::Crypto(e) => GssError::Crypto(e),
            other => GssError::failure(other.to_string(), minor::VALIDATE_FAILED),
        }
    }
}

/// Decrypted contents of a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketContents {
    /// Client principal
    pub client: String,
    /// Service principal
    pub server: String,
    /// Session key
    pub session_key: SessionKey,
    /// Issue time, seconds since the Unix epoch
    pub authtime: u64,
    /// Expiry, seconds since the Unix epoch
    pub endtime: u64,
}

/// Initiator's authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticator {
    /// Client principal
    pub client: String,
    /// Client timestamp, seconds since the Unix epoch
    pub ctime: u64,
    /// Initiator's first sequence number
    pub seq_number: u32,
    /// Bindings hash and requested flags
    pub checksum: AuthenticatorChecksum,
}

/// Opened authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApRequest {
    /// Ticket contents
    pub ticket: TicketContents,
    /// Authenticator
    pub authenticator: Authenticator,
    /// Whether the initiator wants a reply
    pub mutual_required: bool,
}

/// Contents of the authentication reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApReply {
    /// Echo of the authenticator timestamp
    pub ctime: u64,
    /// Acceptor's first sequence number
    pub seq_number: u32,
}

/// Builds and opens authentication exchange messages.
pub trait ApExchange: Send + Sync + fmt::Debug {
    /// Build the request body carrying `ticket` and `authenticator`.
    fn build_request(
        &self,
        ticket: &ServiceTicket,
        authenticator: &Authenticator,
        mutual_required: bool,
    ) -> Result<Vec<u8>, ApError>;

    /// Open a request body with the service's long-term key.
    fn read_request(&self, service_key: &SessionKey, body: &[u8]) -> Result<ApRequest, ApError>;

    /// Build the reply body under the session key.
    fn build_reply(&self, session_key: &SessionKey, reply: &ApReply) -> Result<Vec<u8>, ApError>;

    /// Open a reply body with the session key.
    fn read_reply(&self, session_key: &SessionKey, body: &[u8]) -> Result<ApReply, ApError>;
}

/// Reference [`ApExchange`] built on a [`CryptoProvider`].
#[derive(Debug, Clone)]
pub struct SealedApExchange {
    provider: Arc<dyn CryptoProvider>,
}

impl SealedApExchange {
    /// Create an exchange using `provider`
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Seal ticket contents under a service's long-term key.
    pub fn seal_ticket(&self, service_key: &SessionKey, ticket: &TicketContents) -> Result<Vec<u8>, ApError> {
        let mut plain = Vec::new();
        put_bytes(&mut plain, ticket.client.as_bytes())?;
        put_bytes(&mut plain, ticket.server.as_bytes())?;
        plain.put_i32(ticket.session_key.enctype().number());
        put_bytes(&mut plain, ticket.session_key.as_bytes())?;
        plain.put_u64(ticket.authtime);
        plain.put_u64(ticket.endtime);

        self.seal(service_key, KEY_USAGE_TICKET, &plain)
    }

    fn open_ticket(&self, service_key: &SessionKey, sealed: &[u8]) -> Result<TicketContents, ApError> {
        let plain = self.open(service_key, KEY_USAGE_TICKET, sealed)?;
        let mut r = Reader::new(&plain);

        let client = r.string()?;
        let server = r.string()?;
        let enctype = EncType::from_number(r.i32()?);
        let session_key = SessionKey::new(enctype, r.bytes()?.to_vec())?;
        let authtime = r.u64()?;
        let endtime = r.u64()?;
        r.finish()?;

        Ok(TicketContents {
            client,
            server,
            session_key,
            authtime,
            endtime,
        })
    }

    fn seal(&self, key: &SessionKey, usage: u32, plain: &[u8]) -> Result<Vec<u8>, ApError> {
        let kind = checksum_for(key)?;

        let mut body = vec![0u8; CONFOUNDER_LEN];
        self.provider.random_bytes(&mut body)?;
        body.put_u32(plain.len() as u32);
        body.put_slice(plain);
        let padded = body.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        body.resize(padded, 0);

        let mac = self.provider.checksum(key, kind, usage, &body)?;
        let mut sealed = self.provider.encrypt_iv(key, &[0u8; BLOCK_SIZE], &body)?;
        sealed.extend_from_slice(&mac);
        Ok(sealed)
    }

    fn open(&self, key: &SessionKey, usage: u32, sealed: &[u8]) -> Result<Vec<u8>, ApError> {
        let kind = checksum_for(key)?;
        let mac_len = kind.output_len();
        need(sealed, mac_len + 2 * BLOCK_SIZE)?;

        let (ciphertext, mac) = sealed.split_at(sealed.len() - mac_len);
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(ApError::Integrity);
        }
        let body = self.provider.decrypt_iv(key, &[0u8; BLOCK_SIZE], ciphertext)?;
        let expected = self.provider.checksum(key, kind, usage, &body)?;
        if !constant_time_eq(&expected, mac) {
            return Err(ApError::Integrity);
        }

        let mut r = Reader::new(&body[CONFOUNDER_LEN..]);
        let len = r.u32()? as usize;
        let plain = r.take(len)?;
        Ok(plain.to_vec())
    }
}

impl ApExchange for SealedApExchange {
    fn build_request(
        &self,
        ticket: &ServiceTicket,
        authenticator: &Authenticator,
        mutual_required: bool,
    ) -> Result<Vec<u8>, ApError> {
        let mut plain = Vec::new();
        put_bytes(&mut plain, authenticator.client.as_bytes())?;
        plain.put_u64(authenticator.ctime);
        plain.put_u32(authenticator.seq_number);
        plain.put_i32(AUTHENTICATOR_CHECKSUM_TYPE);
        put_bytes(&mut plain, &authenticator.checksum.encode())?;
        let sealed = self.seal(&ticket.session_key, KEY_USAGE_AUTHENTICATOR, &plain)?;

        let mut body = Vec::with_capacity(6 + ticket.blob.len() + sealed.len());
        body.put_u8(PVNO);
        body.put_u8(if mutual_required { OPT_MUTUAL_REQUIRED } else { 0 });
        put_bytes(&mut body, &ticket.blob)?;
        put_bytes(&mut body, &sealed)?;
        Ok(body)
    }

    fn read_request(&self, service_key: &SessionKey, body: &[u8]) -> Result<ApRequest, ApError> {
        let mut r = Reader::new(body);
        check_version(r.u8()?)?;
        let options = r.u8()?;
        let ticket_blob = r.bytes()?;
        let sealed = r.bytes()?;
        r.finish()?;

        let ticket = self.open_ticket(service_key, ticket_blob)?;

        let plain = self.open(&ticket.session_key, KEY_USAGE_AUTHENTICATOR, sealed)?;
        let mut r = Reader::new(&plain);
        let client = r.string()?;
        let ctime = r.u64()?;
        let seq_number = r.u32()?;
        let cksum_type = r.i32()?;
        if cksum_type != AUTHENTICATOR_CHECKSUM_TYPE {
            return Err(ApError::ChecksumType(cksum_type));
        }
        let checksum = AuthenticatorChecksum::decode(r.bytes()?)?;
        r.finish()?;

        Ok(ApRequest {
            ticket,
            authenticator: Authenticator {
                client,
                ctime,
                seq_number,
                checksum,
            },
            mutual_required: options & OPT_MUTUAL_REQUIRED != 0,
        })
    }

    fn build_reply(&self, session_key: &SessionKey, reply: &ApReply) -> Result<Vec<u8>, ApError> {
        let mut plain = Vec::with_capacity(12);
        plain.put_u64(reply.ctime);
        plain.put_u32(reply.seq_number);

        let mut body = vec![PVNO];
        body.extend_from_slice(&self.seal(session_key, KEY_USAGE_AP_REP, &plain)?);
        Ok(body)
    }

    fn read_reply(&self, session_key: &SessionKey, body: &[u8]) -> Result<ApReply, ApError> {
        need(body, 1)?;
        check_version(body[0])?;

        let plain = self.open(session_key, KEY_USAGE_AP_REP, &body[1..])?;
        let mut r = Reader::new(&plain);
        let ctime = r.u64()?;
        let seq_number = r.u32()?;
        r.finish()?;

        Ok(ApReply { ctime, seq_number })
    }
}

fn checksum_for(key: &SessionKey) -> Result<ChecksumType, CryptoError> {
    ChecksumType::for_key(key).ok_or(CryptoError::UnsupportedKeyType(key.enctype().number()))
}

fn check_version(pvno: u8) -> Result<(), CodecError> {
    if pvno != PVNO {
        return Err(CodecError::BadField {
            field: "protocol version",
            value: u16::from(pvno),
        });
    }
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), CodecError> {
    let len = u16::try_from(data.len()).map_err(|_| CodecError::BadLength)?;
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}

/// Bounds-checked cursor.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        need(self.buf, len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        need(self.buf, 1)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        need(self.buf, 4)?;
        Ok(self.buf.get_u32())
    }

    fn i32(&mut self) -> Result<i32, CodecError> {
        need(self.buf, 4)?;
        Ok(self.buf.get_i32())
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        need(self.buf, 8)?;
        Ok(self.buf.get_u64())
    }

    fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        need(self.buf, 2)?;
        let len = self.buf.get_u16() as usize;
        self.take(len)
    }

    fn string(&mut self) -> Result<String, ApError> {
        Ok(String::from_utf8(self.bytes()?.to_vec())?)
    }

    fn finish(self) -> Result<(), CodecError> {
        if !self.buf.is_empty() {
            return Err(CodecError::LengthMismatch {
                declared: 0,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }
}
