//! In-memory realm.
//!
//! Holds service keys and issues service tickets on demand, standing in
//! for a key distribution center in tests and the `gss selftest` command.
//!
//! ```ignore
//! let realm = Arc::new(MemoryRealm::new("EXAMPLE.ORG"));
//! let acceptor = realm.add_service("host/server")?;
//! let initiator = Credential::initiator_from_store(realm.clone());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::ap::{SealedApExchange, TicketContents};
use super::ticket::{ServiceTicket, TicketStore};
use super::unix_now;
use crate::credential::Credential;
use crate::error::{GssError, Result};
use crate::krb5::crypto::{
    random_to_key, seed_len, CryptoProvider, EncType, RustCryptoProvider, SessionKey,
};

/// Default ticket lifetime: ten hours
const DEFAULT_LIFETIME_SECS: u64 = 36_000;

/// Key distribution center kept entirely in memory.
#[derive(Debug)]
pub struct MemoryRealm {
    realm: String,
    client: String,
    enctype: EncType,
    lifetime_secs: u64,
    clock: fn() -> u64,
    provider: Arc<RustCryptoProvider>,
    exchange: SealedApExchange,
    services: RwLock<HashMap<String, SessionKey>>,
}

impl MemoryRealm {
    /// Create an empty realm issuing DES3 tickets to `user@REALM`.
    pub fn new(realm: impl Into<String>) -> Self {
        let realm = realm.into();
        let provider = Arc::new(RustCryptoProvider::new());
        Self {
            client: format!("user@{realm}"),
            realm,
            enctype: EncType::Des3CbcSha1Kd,
            lifetime_secs: DEFAULT_LIFETIME_SECS,
            clock: unix_now,
            exchange: SealedApExchange::new(provider.clone()),
            provider,
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Principal tickets are issued to
    pub fn with_client(mut self, client: &str) -> Self {
        self.client = self.qualify(client);
        self
    }

    /// Key type for service and session keys
    pub fn with_enctype(mut self, enctype: EncType) -> Self {
        self.enctype = enctype;
        self
    }

    /// Lifetime of issued tickets
    pub fn with_lifetime(mut self, secs: u64) -> Self {
        self.lifetime_secs = secs;
        self
    }

    /// Time source for ticket timestamps
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Realm name
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Client principal
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Append `@REALM` to a principal that has no realm.
    pub fn qualify(&self, principal: &str) -> String {
        if principal.contains('@') {
            principal.to_string()
        } else {
            format!("{principal}@{}", self.realm)
        }
    }

    /// Register a service with a fresh key and return its acceptor credential.
    pub fn add_service(&self, principal: &str) -> Result<Credential> {
        let principal = self.qualify(principal);
        let key = self.random_key()?;

        let mut services = self
            .services
            .write()
            .map_err(|_| GssError::failure("realm lock poisoned", 0))?;
        services.insert(principal.clone(), key.clone());
        tracing::debug!("Registered service {}", principal);

        Ok(Credential::acceptor(principal, key))
    }

    /// Issue a ticket for a registered service.
    pub fn issue_ticket(&self, server: &str) -> Result<Option<ServiceTicket>> {
        let server = self.qualify(server);
        let service_key = {
            let services = self
                .services
                .read()
                .map_err(|_| GssError::failure("realm lock poisoned", 0))?;
            match services.get(&server) {
                Some(key) => key.clone(),
                None => return Ok(None),
            }
        };

        let now = (self.clock)();
        let contents = TicketContents {
            client: self.client.clone(),
            server: server.clone(),
            session_key: self.random_key()?,
            authtime: now,
            endtime: now.saturating_add(self.lifetime_secs),
        };
        let blob = self.exchange.seal_ticket(&service_key, &contents)?;
        tracing::debug!("Issued ticket for {} to {}", server, self.client);

        Ok(Some(ServiceTicket {
            client: contents.client.clone(),
            server: contents.server.clone(),
            session_key: contents.session_key.clone(),
            endtime: contents.endtime,
            blob,
        }))
    }

    fn random_key(&self) -> Result<SessionKey> {
        let mut seed = vec![0u8; seed_len(self.enctype)?];
        self.provider.random_bytes(&mut seed)?;
        Ok(random_to_key(self.enctype, &seed)?)
    }
}

impl TicketStore for MemoryRealm {
    fn find_ticket(&self, server: &str) -> Result<Option<ServiceTicket>> {
        self.issue_ticket(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredUsage, CredentialState};

    #[test]
    fn test_qualify() {
        let realm = MemoryRealm::new("EXAMPLE.ORG");
        assert_eq!(realm.qualify("host/a"), "host/a@EXAMPLE.ORG");
        assert_eq!(realm.qualify("host/a@OTHER.ORG"), "host/a@OTHER.ORG");
        assert_eq!(realm.client(), "user@EXAMPLE.ORG");

        let realm = realm.with_client("alice");
        assert_eq!(realm.client(), "alice@EXAMPLE.ORG");
    }

    #[test]
    fn test_issue_for_registered_service() {
        let realm = MemoryRealm::new("EXAMPLE.ORG").with_enctype(EncType::DesCbcMd5);
        assert!(realm.find_ticket("host/a").unwrap().is_none());

        let cred = realm.add_service("host/a").unwrap();
        assert_eq!(cred.usage(), CredUsage::Accept);
        let CredentialState::Krb5(krb5) = cred.state();
        let acceptor = krb5.acceptor.as_ref().unwrap();
        assert_eq!(acceptor.principal, "host/a@EXAMPLE.ORG");
        assert_eq!(acceptor.key.enctype(), EncType::DesCbcMd5);

        let ticket = realm.find_ticket("host/a").unwrap().unwrap();
        assert_eq!(ticket.server, "host/a@EXAMPLE.ORG");
        assert_eq!(ticket.client, "user@EXAMPLE.ORG");
        assert_eq!(ticket.session_key.enctype(), EncType::DesCbcMd5);
        assert_ne!(ticket.session_key, acceptor.key);
    }

    #[test]
    fn test_ticket_lifetime() {
        fn fixed() -> u64 {
            1_000
        }
        let realm = MemoryRealm::new("EXAMPLE.ORG")
            .with_clock(fixed)
            .with_lifetime(60);
        realm.add_service("host/a").unwrap();

        let ticket = realm.issue_ticket("host/a@EXAMPLE.ORG").unwrap().unwrap();
        assert_eq!(ticket.endtime, 1_060);
        assert_eq!(ticket.remaining(1_030), 30);
    }
}
