//! Ticket-based mechanism (RFC 1964 token formats).
//!
//! # Handshake
//!
//! ```text
//! initiator                                  acceptor
//!   Unbound ── AP-REQ (01 00) ─────────────►  Unbound
//!   │ mutual?                                   │ verify ticket + authenticator
//!   ▼ yes                                       ▼
//!   AwaitingReply ◄───────────── AP-REP (02 00) Established  (reply only if mutual)
//!   ▼
//!   Established
//! ```
//!
//! # Per-message tokens
//!
//! Two profiles, chosen by the session key type:
//!
//! | Key    | SGN_ALG | Checksum              | Token body                                       |
//! |--------|---------|-----------------------|--------------------------------------------------|
//! | DES    | 00 00   | RSA-MD5-DES, 8 bytes  | hdr8 · seq8 · cksum8 · confounder8 · data+pad    |
//! | 3DES   | 04 00   | HMAC-SHA1-DES3-KD, 20 | hdr8 · seq8 · cksum20 · confounder8 · data+pad   |
//!
//! Payloads are integrity protected only; SEAL_ALG is always FF FF.
//!
//! # Collaborators
//!
//! - [`CryptoProvider`]: checksums, CBC with explicit IV, randomness
//! - [`TicketStore`]: service tickets for initiators
//! - [`ApExchange`]: builds and opens the authentication messages

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod crypto;

mod ap;
mod context;
mod cred;
mod msg;
#[cfg(feature = "crypto")]
mod realm;
mod ticket;

pub use ap::{
    ApError, ApExchange, ApReply, ApRequest, Authenticator, SealedApExchange, TicketContents,
    KEY_USAGE_AP_REP, KEY_USAGE_AUTHENTICATOR, KEY_USAGE_TICKET,
};
pub use context::{Krb5Context, Phase, Role};
pub use cred::{AcceptorKey, InitiatorSource, Krb5Credential};
pub use msg::{KEY_USAGE_SIGN, SGN_ALG_DES_MAC_MD5, SGN_ALG_HMAC_SHA1_DES3_KD};
#[cfg(feature = "crypto")]
pub use realm::MemoryRealm;
pub use ticket::{ServiceTicket, TicketStore};

use crate::config::{InitialSequence, Krb5Config};
use crate::context::{AcceptRequest, InitRequest, MechState};
use crate::error::{GssError, Result};
use crate::mech::{ContextInfo, Mechanism, StepOutput, UnwrapOutput, WrapOutput};
use crate::oid::{Oid, GSS_KRB5};
use crypto::CryptoProvider;

/// Minor status codes of this mechanism.
pub mod minor {
    /// Host-based service name has no `@`
    pub const BAD_SERVICE_NAME: u32 = 1;
    /// String UID is not numeric
    pub const BAD_STRING_UID: u32 = 2;
    /// UID has no user
    pub const NO_USER: u32 = 3;
    /// Authentication exchange failed to verify
    pub const VALIDATE_FAILED: u32 = 4;
    /// Buffer allocation failed
    pub const BUFFER_ALLOC: u32 = 5;
    /// Bad message context
    pub const BAD_MSG_CTX: u32 = 6;
    /// Field has the wrong size
    pub const WRONG_SIZE: u32 = 7;
    /// Credential used the wrong way
    pub const BAD_USAGE: u32 = 8;
    /// Unknown quality of protection
    pub const UNKNOWN_QOP: u32 = 9;
    /// No ticket matches the target
    pub const CCACHE_NOMATCH: u32 = 10;
    /// Acceptor key does not match the ticket
    pub const KEYTAB_NOMATCH: u32 = 11;
    /// No ticket source available
    pub const TGT_MISSING: u32 = 12;
    /// No subkey
    pub const NO_SUBKEY: u32 = 13;
    /// Context is already established
    pub const CONTEXT_ESTABLISHED: u32 = 14;
    /// Signing algorithm does not match the key
    pub const BAD_SIGN_TYPE: u32 = 15;
    /// Token length is inconsistent
    pub const BAD_LENGTH: u32 = 16;
    /// Context is not yet established
    pub const CTX_INCOMPLETE: u32 = 17;
}

static MECH_OID: Oid = GSS_KRB5;

/// Seconds since the Unix epoch.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// The ticket mechanism.
#[derive(Debug, Clone)]
pub struct Krb5Mechanism {
    provider: Arc<dyn CryptoProvider>,
    exchange: Arc<dyn ApExchange>,
    tickets: Option<Arc<dyn TicketStore>>,
    config: Krb5Config,
    clock: fn() -> u64,
}

impl Krb5Mechanism {
    /// Start building a mechanism around `provider`
    pub fn builder(provider: Arc<dyn CryptoProvider>) -> Krb5MechanismBuilder {
        Krb5MechanismBuilder {
            exchange: None,
            provider,
            tickets: None,
            config: Krb5Config::default(),
            clock: unix_now,
        }
    }

    /// Mechanism settings
    pub fn config(&self) -> &Krb5Config {
        &self.config
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn initial_sequence(&self) -> Result<u32> {
        match self.config.initial_sequence {
            InitialSequence::Zero => Ok(0),
            InitialSequence::Random => {
                let mut buf = [0u8; 4];
                self.provider.random_bytes(&mut buf)?;
                Ok(u32::from_le_bytes(buf))
            },
        }
    }
}

/// Builder for [`Krb5Mechanism`].
#[derive(Debug)]
pub struct Krb5MechanismBuilder {
    provider: Arc<dyn CryptoProvider>,
    exchange: Option<Arc<dyn ApExchange>>,
    tickets: Option<Arc<dyn TicketStore>>,
    config: Krb5Config,
    clock: fn() -> u64,
}

impl Krb5MechanismBuilder {
    /// Replace the default [`SealedApExchange`]
    pub fn exchange(mut self, exchange: Arc<dyn ApExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Store consulted when an initiator passes no credential
    pub fn ticket_store(mut self, store: Arc<dyn TicketStore>) -> Self {
        self.tickets = Some(store);
        self
    }

    /// Mechanism settings
    pub fn config(mut self, config: Krb5Config) -> Self {
        self.config = config;
        self
    }

    /// Time source, seconds since the Unix epoch
    pub fn clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Finish the mechanism
    pub fn build(self) -> Krb5Mechanism {
        let exchange = self
            .exchange
            .unwrap_or_else(|| Arc::new(SealedApExchange::new(Arc::clone(&self.provider))));
        Krb5Mechanism {
            provider: self.provider,
            exchange,
            tickets: self.tickets,
            config: self.config,
            clock: self.clock,
        }
    }
}

fn incomplete() -> GssError {
    GssError::NoContext {
        reason: "context is not established".to_string(),
        minor: minor::CTX_INCOMPLETE,
    }
}

fn context_ref(state: &MechState) -> Result<&Krb5Context> {
    match state {
        MechState::Krb5(ctx) => Ok(&**ctx),
        MechState::Unbound => Err(incomplete()),
    }
}

fn context_mut(state: &mut MechState) -> Result<&mut Krb5Context> {
    match state {
        MechState::Krb5(ctx) => Ok(&mut **ctx),
        MechState::Unbound => Err(incomplete()),
    }
}

impl Mechanism for Krb5Mechanism {
    fn oid(&self) -> &Oid {
        &MECH_OID
    }

    fn name(&self) -> &'static str {
        "krb5"
    }

    fn init(&self, state: &mut MechState, req: &InitRequest<'_>) -> Result<StepOutput> {
        match state {
            MechState::Unbound => {
                let (ctx, output) = self.initiate(req)?;
                *state = MechState::Krb5(Box::new(ctx));
                Ok(output)
            },
            MechState::Krb5(ctx) => self.continue_initiate(ctx, req),
        }
    }

    fn accept(&self, state: &mut MechState, req: &AcceptRequest<'_>) -> Result<StepOutput> {
        match state {
            MechState::Unbound => {
                let (ctx, output) = self.accept_request(req)?;
                *state = MechState::Krb5(Box::new(ctx));
                Ok(output)
            },
            MechState::Krb5(_) => Err(GssError::failure(
                "acceptor context is already established",
                minor::CONTEXT_ESTABLISHED,
            )),
        }
    }

    fn delete(&self, state: &mut MechState) -> Result<Option<Vec<u8>>> {
        if let MechState::Krb5(ctx) = state {
            tracing::debug!("Releasing {:?} context in phase {:?}", ctx.role(), ctx.phase());
        }
        // Dropping the boxed context zeroizes the session key
        *state = MechState::Unbound;
        Ok(None)
    }

    fn context_time(&self, state: &MechState) -> Result<u32> {
        let remaining = context_ref(state)?.remaining(self.now());
        if remaining == 0 {
            return Err(GssError::ContextExpired);
        }
        Ok(remaining)
    }

    fn inquire(&self, state: &MechState) -> Result<ContextInfo> {
        let ctx = context_ref(state)?;
        Ok(ContextInfo {
            source: Some(ctx.source().clone()),
            target: Some(ctx.target().clone()),
            lifetime: ctx.remaining(self.now()),
            mech: GSS_KRB5,
            flags: ctx.flags(),
            locally_initiated: ctx.role() == Role::Initiator,
            open: ctx.is_established(),
        })
    }

    fn wrap(&self, state: &mut MechState, conf_req: bool, message: &[u8]) -> Result<WrapOutput> {
        let ctx = context_mut(state)?;
        if conf_req {
            tracing::debug!("Confidentiality requested; payload is integrity protected only");
        }
        let token = self.wrap_message(ctx, message)?;
        Ok(WrapOutput {
            token,
            conf_applied: false,
        })
    }

    fn unwrap(&self, state: &mut MechState, token: &[u8]) -> Result<UnwrapOutput> {
        let ctx = context_mut(state)?;
        let message = self.unwrap_message(ctx, token)?;
        Ok(UnwrapOutput {
            message,
            conf_applied: false,
            qop: 0,
        })
    }

    fn get_mic(&self, state: &mut MechState, message: &[u8]) -> Result<Vec<u8>> {
        let ctx = context_mut(state)?;
        self.mic_message(ctx, message)
    }

    fn verify_mic(&self, state: &mut MechState, message: &[u8], token: &[u8]) -> Result<()> {
        let ctx = context_mut(state)?;
        self.verify_mic_message(ctx, message, token)
    }
}
