//! Ticket mechanism credential contents.

use std::sync::Arc;

use super::ticket::{ServiceTicket, TicketStore};
use crate::krb5::crypto::SessionKey;

/// Where an initiator gets its service ticket.
#[derive(Debug, Clone)]
pub enum InitiatorSource {
    /// One ticket, usable only for its own server
    Ticket(ServiceTicket),
    /// Lookup by server principal
    Store(Arc<dyn TicketStore>),
}

/// Acceptor identity and long-term key.
#[derive(Debug, Clone)]
pub struct AcceptorKey {
    /// Service principal
    pub principal: String,
    /// Long-term key tickets are sealed under
    pub key: SessionKey,
}

/// Credential contents for the ticket mechanism.
#[derive(Debug, Clone, Default)]
pub struct Krb5Credential {
    /// Initiator half
    pub initiator: Option<InitiatorSource>,
    /// Acceptor half
    pub acceptor: Option<AcceptorKey>,
}
