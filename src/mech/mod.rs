//! Mechanism interface and dispatch.
//!
//! Every mechanism exposes the same operation set behind [`Mechanism`].
//! The facade never looks inside a context's [`MechState`]: it resolves the
//! mechanism from the context's bound identifier and hands the state over.
//!
//! ```text
//! facade ──► MechanismRegistry::find / find_bound ──► Arc<dyn Mechanism>
//!                                                        │
//!                                     init / accept / wrap / unwrap ...
//!                                                        ▼
//!                                           &mut MechState (per context)
//! ```

use std::fmt;

mod registry;

pub use registry::{MechanismRegistry, RegistryBuilder};

use crate::context::{AcceptRequest, ContextFlags, InitRequest, MechState};
use crate::error::Result;
use crate::name::Name;
use crate::oid::Oid;
use crate::status::Status;

/// Result of one establishment step inside a mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Complete or continue-needed
    pub status: Status,
    /// Token for the peer, empty if none
    pub output_token: Vec<u8>,
    /// Services actually available
    pub flags: ContextFlags,
    /// Remaining lifetime in seconds
    pub lifetime: u32,
    /// Authenticated initiator, set by acceptors
    pub source: Option<Name>,
}

/// Wrapped message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOutput {
    /// Token to send
    pub token: Vec<u8>,
    /// Whether the payload was encrypted
    pub conf_applied: bool,
}

/// Unwrapped message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrapOutput {
    /// Recovered message
    pub message: Vec<u8>,
    /// Whether the payload had been encrypted
    pub conf_applied: bool,
    /// Quality of protection, always the default
    pub qop: u32,
}

/// Snapshot of a context's parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    /// Initiator name, if known
    pub source: Option<Name>,
    /// Acceptor name, if known
    pub target: Option<Name>,
    /// Remaining lifetime in seconds
    pub lifetime: u32,
    /// Bound mechanism
    pub mech: Oid,
    /// Granted services
    pub flags: ContextFlags,
    /// Whether this side initiated
    pub locally_initiated: bool,
    /// Whether establishment has completed
    pub open: bool,
}

/// A pluggable authentication mechanism.
///
/// Implementations must be shareable across threads; per-context state
/// lives in the [`MechState`] handed to each call, never in the mechanism.
pub trait Mechanism: Send + Sync + fmt::Debug {
    /// Identifier of this mechanism.
    fn oid(&self) -> &Oid;

    /// Short human-readable name.
    fn name(&self) -> &'static str;

    /// Run one initiator step. `state` is [`MechState::Unbound`] on the
    /// first call.
    fn init(&self, state: &mut MechState, req: &InitRequest<'_>) -> Result<StepOutput>;

    /// Run one acceptor step.
    fn accept(&self, state: &mut MechState, req: &AcceptRequest<'_>) -> Result<StepOutput>;

    /// Release mechanism resources held by `state`.
    ///
    /// Returns an optional token for the peer.
    fn delete(&self, state: &mut MechState) -> Result<Option<Vec<u8>>>;

    /// Remaining lifetime in seconds.
    fn context_time(&self, state: &MechState) -> Result<u32>;

    /// Describe the context.
    fn inquire(&self, state: &MechState) -> Result<ContextInfo>;

    /// Protect `message`.
    fn wrap(&self, state: &mut MechState, conf_req: bool, message: &[u8]) -> Result<WrapOutput>;

    /// Verify and unprotect a wrapped token.
    fn unwrap(&self, state: &mut MechState, token: &[u8]) -> Result<UnwrapOutput>;

    /// Compute a detached integrity token over `message`.
    fn get_mic(&self, state: &mut MechState, message: &[u8]) -> Result<Vec<u8>>;

    /// Verify a detached integrity token.
    fn verify_mic(&self, state: &mut MechState, message: &[u8], token: &[u8]) -> Result<()>;
}
