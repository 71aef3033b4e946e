//! Security contexts and the mechanism-independent call surface.
//!
//! # Handle lifecycle
//!
//! ```text
//!   ContextHandle::none()
//!        │ init / accept (first call)
//!        ▼
//!   bound to a mechanism ──(continuation calls)──► bound
//!        │ first-call failure          │ delete
//!        ▼                             ▼
//!   ContextHandle::none()        ContextHandle::none()
//! ```
//!
//! A continuation failure leaves the context in place so the caller can
//! inspect it; only `delete` releases it then.

use std::sync::Arc;

mod establish;
mod flags;
mod message;

pub use establish::{AcceptOutput, AcceptRequest, InitOutput, InitRequest};
pub use flags::ContextFlags;

use crate::error::{GssError, Result};
use crate::krb5::Krb5Context;
use crate::mech::{ContextInfo, Mechanism, MechanismRegistry};
use crate::oid::{Oid, OidSet};
use crate::status::MajorStatus;

/// Mechanism-specific part of a context.
#[derive(Debug, Default)]
pub enum MechState {
    /// Allocated, no mechanism step has succeeded yet
    #[default]
    Unbound,
    /// Ticket mechanism state
    Krb5(Box<Krb5Context>),
}

/// A context bound to one mechanism for its whole life.
#[derive(Debug)]
pub struct SecurityContext {
    mech: Oid,
    state: MechState,
}

impl SecurityContext {
    fn new(mech: Oid) -> Self {
        Self {
            mech,
            state: MechState::Unbound,
        }
    }

    /// Bound mechanism
    pub fn mech(&self) -> &Oid {
        &self.mech
    }

    /// Mechanism-specific state
    pub fn state(&self) -> &MechState {
        &self.state
    }
}

/// Caller-owned reference to a context, or the "no context" sentinel.
#[derive(Debug, Default)]
pub struct ContextHandle(Option<Box<SecurityContext>>);

impl ContextHandle {
    /// The "no context" sentinel
    pub const fn none() -> Self {
        Self(None)
    }

    /// Whether no context is bound
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Mechanism of the bound context
    pub fn mech(&self) -> Option<&Oid> {
        self.0.as_deref().map(SecurityContext::mech)
    }

    /// The bound context
    pub fn context(&self) -> Option<&SecurityContext> {
        self.0.as_deref()
    }

    fn bound(&self) -> Result<&SecurityContext> {
        self.0.as_deref().ok_or_else(no_context)
    }

    fn bound_mut(&mut self) -> Result<&mut SecurityContext> {
        self.0.as_deref_mut().ok_or_else(no_context)
    }
}

fn no_context() -> GssError {
    GssError::bad_structure(MajorStatus::NoContext)
}

/// Entry point for all GSS calls.
///
/// Holds the mechanism registry. Cheap to clone; every call is synchronous
/// and independent contexts may be driven from different threads.
#[derive(Debug, Clone)]
pub struct Gss {
    registry: Arc<MechanismRegistry>,
}

impl Gss {
    /// Create a facade over `registry`
    pub fn new(registry: Arc<MechanismRegistry>) -> Self {
        Self { registry }
    }

    /// Installed mechanisms
    pub fn registry(&self) -> &MechanismRegistry {
        &self.registry
    }

    /// Identifiers of all installed mechanisms
    pub fn indicate_mechs(&self) -> OidSet {
        self.registry.mechanisms()
    }

    fn mech_for(&self, ctx: &SecurityContext) -> Result<Arc<dyn Mechanism>> {
        self.registry.find_bound(&ctx.mech)
    }

    /// Remaining lifetime of a context in seconds.
    ///
    /// An expired context is reported as [`GssError::ContextExpired`].
    pub fn context_time(&self, handle: &ContextHandle) -> Result<u32> {
        let ctx = handle.bound()?;
        self.mech_for(ctx)?.context_time(&ctx.state)
    }

    /// Describe a context.
    pub fn inquire_context(&self, handle: &ContextHandle) -> Result<ContextInfo> {
        let ctx = handle.bound()?;
        self.mech_for(ctx)?.inquire(&ctx.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::GSS_KRB5;
    use crate::status::CallError;

    #[test]
    fn test_handle_sentinel() {
        let handle = ContextHandle::none();
        assert!(handle.is_none());
        assert!(handle.mech().is_none());
        assert!(matches!(
            handle.bound(),
            Err(GssError::Call {
                call: CallError::BadStructure,
                major: MajorStatus::NoContext,
            })
        ));
    }

    #[test]
    fn test_bound_handle() {
        let handle = ContextHandle(Some(Box::new(SecurityContext::new(GSS_KRB5))));
        assert!(!handle.is_none());
        assert_eq!(handle.mech(), Some(&GSS_KRB5));
        assert!(matches!(
            handle.context().map(SecurityContext::state),
            Some(MechState::Unbound)
        ));
    }
}
