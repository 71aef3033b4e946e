//! Credential handles.
//!
//! Credentials are acquired outside the establishment path (from a ticket
//! store or a service key) and are read-only once built.

use std::sync::Arc;

use crate::error::{GssError, Result};
use crate::krb5::crypto::SessionKey;
use crate::krb5::{AcceptorKey, InitiatorSource, Krb5Credential, ServiceTicket, TicketStore};
use crate::oid::{Oid, GSS_KRB5};

/// What a credential may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredUsage {
    /// Initiate contexts only
    Initiate,
    /// Accept contexts only
    Accept,
    /// Both
    Both,
}

/// Mechanism-specific credential contents
#[derive(Debug, Clone)]
pub enum CredentialState {
    /// Ticket mechanism
    Krb5(Krb5Credential),
}

/// A credential bound to one mechanism.
#[derive(Debug, Clone)]
pub struct Credential {
    mech: Oid,
    state: CredentialState,
}

impl Credential {
    /// Initiator credential holding one service ticket.
    pub fn initiator(ticket: ServiceTicket) -> Self {
        Self::krb5(Krb5Credential {
            initiator: Some(InitiatorSource::Ticket(ticket)),
            acceptor: None,
        })
    }

    /// Initiator credential that looks tickets up in `store`.
    pub fn initiator_from_store(store: Arc<dyn TicketStore>) -> Self {
        Self::krb5(Krb5Credential {
            initiator: Some(InitiatorSource::Store(store)),
            acceptor: None,
        })
    }

    /// Acceptor credential: service principal plus its long-term key.
    pub fn acceptor(principal: impl Into<String>, key: SessionKey) -> Self {
        Self::krb5(Krb5Credential {
            initiator: None,
            acceptor: Some(AcceptorKey {
                principal: principal.into(),
                key,
            }),
        })
    }

    fn krb5(cred: Krb5Credential) -> Self {
        Self {
            mech: GSS_KRB5,
            state: CredentialState::Krb5(cred),
        }
    }

    /// Merge an initiator and an acceptor credential of the same mechanism.
    pub fn combine(self, other: Credential) -> Result<Self> {
        if self.mech != other.mech {
            return Err(GssError::BadMech(other.mech));
        }
        match (self.state, other.state) {
            (CredentialState::Krb5(a), CredentialState::Krb5(b)) => {
                Ok(Self::krb5(Krb5Credential {
                    initiator: a.initiator.or(b.initiator),
                    acceptor: a.acceptor.or(b.acceptor),
                }))
            },
        }
    }

    /// Mechanism this credential belongs to
    pub fn mechanism(&self) -> &Oid {
        &self.mech
    }

    /// Permitted usage
    pub fn usage(&self) -> CredUsage {
        match &self.state {
            CredentialState::Krb5(cred) => match (&cred.initiator, &cred.acceptor) {
                (Some(_), Some(_)) => CredUsage::Both,
                (None, Some(_)) => CredUsage::Accept,
                _ => CredUsage::Initiate,
            },
        }
    }

    /// Mechanism-specific contents
    pub fn state(&self) -> &CredentialState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::krb5::crypto::EncType;

    fn key() -> SessionKey {
        SessionKey::new(EncType::DesCbcMd5, vec![0x01; 8]).unwrap()
    }

    #[test]
    fn test_usage() {
        let acceptor = Credential::acceptor("host/server.example.org@EXAMPLE.ORG", key());
        assert_eq!(acceptor.usage(), CredUsage::Accept);
        assert_eq!(acceptor.mechanism(), &GSS_KRB5);

        let ticket = ServiceTicket {
            client: "alice@EXAMPLE.ORG".to_string(),
            server: "host/server.example.org@EXAMPLE.ORG".to_string(),
            session_key: key(),
            endtime: u64::MAX,
            blob: vec![1, 2, 3],
        };
        let initiator = Credential::initiator(ticket);
        assert_eq!(initiator.usage(), CredUsage::Initiate);

        let both = initiator.combine(acceptor).unwrap();
        assert_eq!(both.usage(), CredUsage::Both);
    }
}
