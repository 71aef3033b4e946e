//! Service tickets and the ticket store collaborator.

use std::fmt;

use crate::error::Result;
use crate::krb5::crypto::SessionKey;

/// A service ticket as held by the initiator.
///
/// `blob` is opaque: only the service that owns the long-term key can
/// open it. The other fields are the initiator's copy of what it contains.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceTicket {
    /// Client principal the ticket was issued to
    pub client: String,
    /// Service principal the ticket is for
    pub server: String,
    /// Session key shared with the service
    pub session_key: SessionKey,
    /// Expiry, seconds since the Unix epoch
    pub endtime: u64,
    /// Encrypted ticket as sent on the wire
    pub blob: Vec<u8>,
}

impl ServiceTicket {
    /// Seconds left before expiry at `now`, zero once expired
    pub fn remaining(&self, now: u64) -> u64 {
        self.endtime.saturating_sub(now)
    }
}

impl fmt::Debug for ServiceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTicket")
            .field("client", &self.client)
            .field("server", &self.server)
            .field("session_key", &self.session_key)
            .field("endtime", &self.endtime)
            .field("blob_len", &self.blob.len())
            .finish()
    }
}

/// Source of service tickets.
///
/// Must tolerate concurrent lookups from independent contexts.
pub trait TicketStore: Send + Sync + fmt::Debug {
    /// Ticket for `server`, `None` if the store holds or can obtain none.
    fn find_ticket(&self, server: &str) -> Result<Option<ServiceTicket>>;
}
