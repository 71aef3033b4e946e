//! Handshake state machine.

use super::ap::{ApReply, Authenticator};
use super::cred::{AcceptorKey, InitiatorSource};
use super::ticket::ServiceTicket;
use super::{minor, Krb5Mechanism};
use crate::codec::{self, AuthenticatorChecksum, CodecError, TokenTag};
use crate::context::{AcceptRequest, ContextFlags, InitRequest};
use crate::credential::{Credential, CredentialState};
use crate::error::{GssError, Result};
use crate::krb5::crypto::SessionKey;
use crate::mech::StepOutput;
use crate::name::Name;
use crate::oid::{
    GSS_KRB5, NT_HOSTBASED_SERVICE, NT_HOSTBASED_SERVICE_X, NT_KRB5_PRINCIPAL_NAME, NT_USER_NAME,
};
use crate::status::Status;

/// Services this mechanism can grant
const SUPPORTED_FLAGS: u32 =
    ContextFlags::MUTUAL | ContextFlags::REPLAY | ContextFlags::SEQUENCE | ContextFlags::INTEG;

/// Which side of the exchange a context is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the authentication request
    Initiator,
    /// Received the authentication request
    Acceptor,
}

/// Establishment phase once a context holds a session key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Initiator waiting for the acceptor's reply
    AwaitingReply,
    /// Ready for per-message protection in both directions
    Established,
}

/// Per-context state of the ticket mechanism.
#[derive(Debug)]
pub struct Krb5Context {
    pub(super) role: Role,
    pub(super) phase: Phase,
    pub(super) key: SessionKey,
    pub(super) endtime: u64,
    pub(super) send_seq: u32,
    pub(super) recv_seq: u32,
    pub(super) flags: ContextFlags,
    pub(super) source: Name,
    pub(super) target: Name,
    /// Authenticator timestamp the reply must echo
    pub(super) ctime: u64,
}

impl Krb5Context {
    /// Side of the exchange
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether establishment has completed
    pub fn is_established(&self) -> bool {
        self.phase == Phase::Established
    }

    /// Session key
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Next sequence number this side sends
    pub fn send_seq(&self) -> u32 {
        self.send_seq
    }

    /// Sequence number expected from the peer
    pub fn recv_seq(&self) -> u32 {
        self.recv_seq
    }

    /// Granted services
    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    /// Initiator name
    pub fn source(&self) -> &Name {
        &self.source
    }

    /// Acceptor name
    pub fn target(&self) -> &Name {
        &self.target
    }

    /// Context expiry, seconds since the Unix epoch.
    ///
    /// The ticket end time, capped on the initiator side by the lifetime it
    /// asked for.
    pub fn endtime(&self) -> u64 {
        self.endtime
    }

    /// Seconds left at `now`, saturating at both ends
    pub fn remaining(&self, now: u64) -> u32 {
        u32::try_from(self.endtime.saturating_sub(now)).unwrap_or(u32::MAX)
    }
}

/// Turn an imported name into a principal name.
pub(super) fn canonicalize(name: &Name) -> Result<String> {
    let text = name.as_str().ok_or_else(|| GssError::BadName {
        reason: "name is not UTF-8".to_string(),
        minor: 0,
    })?;
    let name_type = name.name_type();

    if name_type == &NT_KRB5_PRINCIPAL_NAME || name_type == &NT_USER_NAME {
        return Ok(text.to_string());
    }
    if name_type == &NT_HOSTBASED_SERVICE || name_type == &NT_HOSTBASED_SERVICE_X {
        return match text.split_once('@') {
            Some((service, host)) if !service.is_empty() && !host.is_empty() => {
                Ok(format!("{service}/{host}"))
            },
            _ => Err(GssError::BadName {
                reason: format!("expected service@host, got {text:?}"),
                minor: minor::BAD_SERVICE_NAME,
            }),
        };
    }
    Err(GssError::BadNameType(name_type.clone()))
}

/// Whether two principals name the same entity, ignoring a missing realm.
pub(super) fn same_principal(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.split_once('@'), b.split_once('@')) {
        (Some((a_name, _)), None) => a_name == b,
        (None, Some((b_name, _))) => a == b_name,
        _ => false,
    }
}

fn granted(requested: u32) -> ContextFlags {
    ContextFlags::from_bits(requested)
        .intersect(SUPPORTED_FLAGS)
        .with(ContextFlags::PROT_READY)
}

fn principal_name(principal: &str) -> Name {
    Name::import(principal, NT_KRB5_PRINCIPAL_NAME)
}

impl Krb5Mechanism {
    /// Initiator's first call: build and emit the authentication request.
    pub(super) fn initiate(&self, req: &InitRequest<'_>) -> Result<(Krb5Context, StepOutput)> {
        if req.bindings.is_some() {
            return Err(GssError::BadBindings);
        }

        let server = canonicalize(req.target)?;
        let ticket = self.ticket_for(req.credential, &server)?;

        let now = self.now();
        if ticket.endtime <= now {
            return Err(GssError::ContextExpired);
        }

        // zero asks for the default, as with an absent request
        let requested = req
            .lifetime
            .filter(|&secs| secs > 0)
            .map_or(self.config.default_lifetime_secs, u64::from);
        let endtime = ticket.endtime.min(now.saturating_add(requested));

        let mutual = req.flags.has(ContextFlags::MUTUAL);
        let seq = self.initial_sequence()?;
        let authenticator = Authenticator {
            client: ticket.client.clone(),
            ctime: now,
            seq_number: seq,
            checksum: AuthenticatorChecksum::new(req.flags.bits()),
        };
        let body = self.exchange.build_request(&ticket, &authenticator, mutual)?;
        let token = codec::encapsulate_tagged(&GSS_KRB5, TokenTag::ApReq, &body)?;

        let ctx = Krb5Context {
            role: Role::Initiator,
            phase: if mutual {
                Phase::AwaitingReply
            } else {
                Phase::Established
            },
            key: ticket.session_key.clone(),
            endtime,
            send_seq: seq,
            // Without a reply both directions start from the initiator's number
            recv_seq: seq,
            flags: granted(req.flags.bits()),
            source: principal_name(&ticket.client),
            target: principal_name(&ticket.server),
            ctime: now,
        };

        let lifetime = ctx.remaining(now);
        tracing::debug!(
            "Initiator sent request to {} (mutual: {}), phase {:?}",
            ticket.server,
            mutual,
            ctx.phase
        );

        let output = StepOutput {
            status: if mutual {
                Status::continue_needed()
            } else {
                Status::complete()
            },
            output_token: token,
            flags: ctx.flags,
            lifetime,
            source: None,
        };
        Ok((ctx, output))
    }

    /// Initiator's second call: verify the acceptor's reply.
    ///
    /// The context is only modified once every check has passed.
    pub(super) fn continue_initiate(
        &self,
        ctx: &mut Krb5Context,
        req: &InitRequest<'_>,
    ) -> Result<StepOutput> {
        if ctx.phase == Phase::Established {
            return Err(GssError::failure(
                "initiator context is already established",
                minor::CONTEXT_ESTABLISHED,
            ));
        }

        let token = req.input_token.ok_or(GssError::DefectiveToken(CodecError::Truncated {
            needed: 1,
            available: 0,
        }))?;
        let inner = codec::decapsulate_for(token, &GSS_KRB5)?;
        let body = codec::strip_tag(inner, TokenTag::ApRep)?;
        let reply: ApReply = self.exchange.read_reply(&ctx.key, body)?;

        if reply.ctime != ctx.ctime {
            tracing::warn!("Reply timestamp does not echo the authenticator");
            return Err(GssError::failure(
                "reply does not echo the authenticator timestamp",
                minor::VALIDATE_FAILED,
            ));
        }

        ctx.recv_seq = reply.seq_number;
        ctx.phase = Phase::Established;
        tracing::debug!("Initiator verified reply, context established");

        Ok(StepOutput {
            status: Status::complete(),
            output_token: Vec::new(),
            flags: ctx.flags,
            lifetime: ctx.remaining(self.now()),
            source: None,
        })
    }

    /// Acceptor's only call: verify the request and reply if asked to.
    pub(super) fn accept_request(&self, req: &AcceptRequest<'_>) -> Result<(Krb5Context, StepOutput)> {
        let acceptor = acceptor_key(req.credential)?;
        if req.bindings.is_some() {
            return Err(GssError::BadBindings);
        }

        let inner = codec::decapsulate_for(req.input_token, &GSS_KRB5)?;
        let body = codec::strip_tag(inner, TokenTag::ApReq)?;
        let request = self.exchange.read_request(&acceptor.key, body)?;
        let ticket = &request.ticket;
        let auth = &request.authenticator;

        if !same_principal(&ticket.server, &acceptor.principal) {
            return Err(GssError::failure(
                format!("ticket is for {}, not {}", ticket.server, acceptor.principal),
                minor::KEYTAB_NOMATCH,
            ));
        }
        if auth.client != ticket.client {
            tracing::warn!("Authenticator client does not match ticket client");
            return Err(GssError::failure(
                "authenticator client does not match ticket",
                minor::VALIDATE_FAILED,
            ));
        }

        let now = self.now();
        if ticket.endtime <= now {
            return Err(GssError::ContextExpired);
        }
        let skew = now.abs_diff(auth.ctime);
        if skew > self.config.clock_skew_secs {
            tracing::warn!("Clock skew of {}s exceeds {}s", skew, self.config.clock_skew_secs);
            return Err(GssError::failure("clock skew too great", minor::VALIDATE_FAILED));
        }
        if auth.checksum.has_bindings() {
            return Err(GssError::BadBindings);
        }

        let mut flags = granted(auth.checksum.flags);
        let (send_seq, token) = if request.mutual_required {
            let seq = self.initial_sequence()?;
            let reply = ApReply {
                ctime: auth.ctime,
                seq_number: seq,
            };
            let body = self.exchange.build_reply(&ticket.session_key, &reply)?;
            flags.set(ContextFlags::MUTUAL);
            (seq, codec::encapsulate_tagged(&GSS_KRB5, TokenTag::ApRep, &body)?)
        } else {
            flags.clear(ContextFlags::MUTUAL);
            (auth.seq_number, Vec::new())
        };

        let ctx = Krb5Context {
            role: Role::Acceptor,
            phase: Phase::Established,
            key: ticket.session_key.clone(),
            endtime: ticket.endtime,
            send_seq,
            recv_seq: auth.seq_number,
            flags,
            source: principal_name(&ticket.client),
            target: principal_name(&acceptor.principal),
            ctime: auth.ctime,
        };
        tracing::debug!(
            "Acceptor authenticated {} (reply: {})",
            ticket.client,
            request.mutual_required
        );

        let output = StepOutput {
            status: Status::complete(),
            output_token: token,
            flags,
            lifetime: ctx.remaining(now),
            source: Some(ctx.source.clone()),
        };
        Ok((ctx, output))
    }

    /// Resolve the initiator's ticket for `server`.
    fn ticket_for(&self, credential: Option<&Credential>, server: &str) -> Result<ServiceTicket> {
        let source = match credential {
            Some(cred) => match cred.state() {
                CredentialState::Krb5(krb5) => krb5.initiator.clone().ok_or_else(|| {
                    GssError::no_cred("credential cannot initiate", minor::BAD_USAGE)
                })?,
            },
            None => match &self.tickets {
                Some(store) => InitiatorSource::Store(store.clone()),
                None => {
                    return Err(GssError::no_cred("no default ticket store", minor::TGT_MISSING))
                },
            },
        };

        let ticket = match source {
            InitiatorSource::Ticket(ticket) => Some(ticket),
            InitiatorSource::Store(store) => store.find_ticket(server)?,
        };
        match ticket {
            Some(ticket) if same_principal(&ticket.server, server) => Ok(ticket),
            _ => Err(GssError::no_cred(
                format!("no ticket for {server}"),
                minor::CCACHE_NOMATCH,
            )),
        }
    }
}

fn acceptor_key(credential: Option<&Credential>) -> Result<&AcceptorKey> {
    let cred = credential.ok_or_else(|| GssError::no_cred("no acceptor credential", 0))?;
    match cred.state() {
        CredentialState::Krb5(krb5) => krb5
            .acceptor
            .as_ref()
            .ok_or_else(|| GssError::no_cred("credential cannot accept", minor::BAD_USAGE)),
    }
}
