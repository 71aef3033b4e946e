//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use gss::config::Krb5Config;
use gss::krb5::crypto::{EncType, RustCryptoProvider};
use gss::oid::NT_HOSTBASED_SERVICE;
use gss::{
    AcceptRequest, ContextFlags, ContextHandle, Credential, Gss, InitRequest, Krb5Mechanism,
    MechanismRegistry, MemoryRealm, Name,
};

/// Service principal every fixture registers
pub const SERVICE: &str = "host/server.example.org";

/// A realm, one registered service and a facade with the ticket mechanism
pub struct Peers {
    pub gss: Gss,
    pub realm: Arc<MemoryRealm>,
    pub service: Credential,
    pub target: Name,
}

impl Peers {
    /// Peers over a default realm issuing `enctype` keys
    pub fn new(enctype: EncType) -> Self {
        Self::with_realm(MemoryRealm::new("EXAMPLE.ORG").with_enctype(enctype))
    }

    /// Peers over a customised realm
    pub fn with_realm(realm: MemoryRealm) -> Self {
        let realm = Arc::new(realm);
        let service = realm.add_service(SERVICE).unwrap();
        let gss = facade(mechanism(&realm).build());
        Self {
            gss,
            realm,
            service,
            target: Name::import("host@server.example.org", NT_HOSTBASED_SERVICE),
        }
    }

    /// Run the whole handshake, returning (initiator, acceptor)
    pub fn establish(&self, mutual: bool) -> (ContextHandle, ContextHandle) {
        let mut initiator = ContextHandle::none();
        let mut acceptor = ContextHandle::none();

        let req = InitRequest::new(&self.target).flags(flags(mutual));
        let request = self.gss.init_sec_context(Some(&mut initiator), &req).unwrap();
        let reply = self
            .gss
            .accept_sec_context(
                Some(&mut acceptor),
                &AcceptRequest::new(&request.output_token).credential(&self.service),
            )
            .unwrap();
        if mutual {
            self.gss
                .init_sec_context(Some(&mut initiator), &req.input_token(&reply.output_token))
                .unwrap();
        }
        (initiator, acceptor)
    }
}

/// Mechanism builder wired to `realm`
pub fn mechanism(realm: &Arc<MemoryRealm>) -> gss::krb5::Krb5MechanismBuilder {
    Krb5Mechanism::builder(Arc::new(RustCryptoProvider::new()))
        .ticket_store(realm.clone())
        .config(Krb5Config::default())
}

/// Facade with a single mechanism installed
pub fn facade(mech: Krb5Mechanism) -> Gss {
    let registry = MechanismRegistry::builder()
        .install(Arc::new(mech))
        .build()
        .unwrap();
    Gss::new(Arc::new(registry))
}

/// Integrity and sequencing, plus mutual authentication if asked
pub fn flags(mutual: bool) -> ContextFlags {
    let flags = ContextFlags::new()
        .with(ContextFlags::INTEG)
        .with(ContextFlags::SEQUENCE)
        .with(ContextFlags::REPLAY);
    if mutual {
        flags.with(ContextFlags::MUTUAL)
    } else {
        flags
    }
}
