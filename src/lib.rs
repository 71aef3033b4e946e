//! # GSS Core - Generic Security Service Framework
//!
//! Mechanism-independent security context establishment and per-message
//! protection, with a ticket-based mutual authentication mechanism that
//! speaks the RFC 1964 token formats.
//!
//! ## Features
//!
//! - **Pluggable mechanisms**: one [`Mechanism`] trait, dispatched by object identifier
//! - **Ticket mechanism**: authentication request/reply, optional mutual authentication
//! - **Per-message protection**: wrap/unwrap and MIC tokens with strict sequencing
//! - **Structured status**: major outcome, supplementary bits, call errors, minor codes
//!
//! ## Protocol Overview
//!
//! ### Architecture
//!
//! ```text
//! Initiator                                            Acceptor
//!    |                                                     |
//!    |---- 60 .. 06 <oid> 01 00 <authentication request> ->|
//!    |<--- 60 .. 06 <oid> 02 00 <authentication reply> ----|   (mutual only)
//!    |                                                     |
//!    |==== 60 .. 06 <oid> 02 01 <wrap token> =============>|
//!    |<=== 60 .. 06 <oid> 02 01 <wrap token> ==============|
//! ```
//!
//! ### State Machine
//!
//! ```text
//!                init (mutual)
//!     [Unbound] ──────────────> [AwaitingReply]
//!         │                          │
//!         │ init (no mutual)         │ init (reply verified)
//!         │ accept                   │
//!         v                          v
//!     [Established] <────────────────┘
//! ```
//!
//! ### Status Words
//!
//! | Bits   | Meaning                                     |
//! |--------|---------------------------------------------|
//! | 24..31 | Calling error (inaccessible read/write ...) |
//! | 16..23 | Routine error ([`MajorStatus`])             |
//! | 0..15  | Supplementary info (continue needed ...)    |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gss::krb5::crypto::RustCryptoProvider;
//! use gss::{ContextFlags, ContextHandle, Credential, Gss, InitRequest, AcceptRequest};
//! use gss::{Krb5Mechanism, MechanismRegistry, MemoryRealm, Name};
//! use gss::oid::NT_HOSTBASED_SERVICE;
//!
//! let realm = Arc::new(MemoryRealm::new("EXAMPLE.ORG"));
//! let service = realm.add_service("host/server")?;
//! let krb5 = Krb5Mechanism::builder(Arc::new(RustCryptoProvider::new()))
//!     .ticket_store(realm)
//!     .build();
//! let gss = Gss::new(Arc::new(MechanismRegistry::builder().install(Arc::new(krb5)).build()?));
//!
//! let target = Name::import("host@server", NT_HOSTBASED_SERVICE);
//! let mut client = ContextHandle::none();
//! let mut server = ContextHandle::none();
//!
//! let req = InitRequest::new(&target).flags(ContextFlags::new().with(ContextFlags::MUTUAL));
//! let out = gss.init_sec_context(Some(&mut client), &req)?;
//! let reply = gss.accept_sec_context(
//!     Some(&mut server),
//!     &AcceptRequest::new(&out.output_token).credential(&service),
//! )?;
//! gss.init_sec_context(Some(&mut client), &req.input_token(&reply.output_token))?;
//!
//! let wrapped = gss.wrap(&mut client, false, b"hello")?;
//! assert_eq!(gss.unwrap(&mut server, &wrapped.token)?.message, b"hello");
//! ```
//!
//! ## Modules
//!
//! - [`context`]: Context handles, establishment and per-message calls
//! - [`mech`]: Mechanism trait and registry
//! - [`krb5`]: Ticket-based mechanism and its collaborators
//! - [`codec`]: Token framing
//! - [`status`]: Structured status and legacy status words
//! - [`oid`], [`name`], [`credential`]: Identifiers, names and credentials
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod codec;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod krb5;
pub mod mech;
pub mod name;
pub mod oid;
pub mod status;

// Re-exports for convenience
pub use config::Config;
pub use context::{
    AcceptOutput, AcceptRequest, ContextFlags, ContextHandle, Gss, InitOutput, InitRequest,
};
pub use credential::{CredUsage, Credential};
pub use error::{GssError, Result};
#[cfg(feature = "crypto")]
pub use krb5::MemoryRealm;
pub use krb5::{Krb5Mechanism, ServiceTicket, TicketStore};
pub use mech::{ContextInfo, Mechanism, MechanismRegistry, UnwrapOutput, WrapOutput};
pub use name::Name;
pub use oid::{Oid, OidSet};
pub use status::{MajorStatus, Status};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Mechanism named by a token's outer wrapper, `None` if it is not framed.
pub fn detect_mech(token: &[u8]) -> Option<Oid> {
    codec::decapsulate(token).ok()?.mech_oid().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::GSS_KRB5;

    #[test]
    fn test_detect_mech() {
        let token = codec::encapsulate(&GSS_KRB5, &[0x02, 0x01]).unwrap();
        assert_eq!(detect_mech(&token), Some(GSS_KRB5));
        assert_eq!(detect_mech(b"not a token"), None);
        assert_eq!(detect_mech(&[]), None);
    }
}
