//! Context establishment: init, accept and delete.

use super::{no_context, ContextFlags, ContextHandle, Gss, SecurityContext};
use crate::codec;
use crate::credential::Credential;
use crate::error::{GssError, Result};
use crate::mech::StepOutput;
use crate::name::Name;
use crate::oid::Oid;
use crate::status::{MajorStatus, Status};

/// Arguments of an initiator step.
#[derive(Debug, Clone, Copy)]
pub struct InitRequest<'a> {
    /// Initiator credential, `None` for the mechanism's default
    pub credential: Option<&'a Credential>,
    /// Acceptor to authenticate to
    pub target: &'a Name,
    /// Mechanism, `None` for the registry default
    pub mech: Option<&'a Oid>,
    /// Requested services
    pub flags: ContextFlags,
    /// Requested lifetime in seconds, `None` for the default
    pub lifetime: Option<u32>,
    /// Channel bindings
    pub bindings: Option<&'a [u8]>,
    /// Token received from the acceptor, `None` on the first call
    pub input_token: Option<&'a [u8]>,
}

impl<'a> InitRequest<'a> {
    /// Request for `target` with defaults everywhere else
    pub fn new(target: &'a Name) -> Self {
        Self {
            credential: None,
            target,
            mech: None,
            flags: ContextFlags::new(),
            lifetime: None,
            bindings: None,
            input_token: None,
        }
    }

    /// Use an explicit credential
    pub fn credential(mut self, credential: &'a Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Use an explicit mechanism
    pub fn mech(mut self, mech: &'a Oid) -> Self {
        self.mech = Some(mech);
        self
    }

    /// Request services
    pub fn flags(mut self, flags: ContextFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Request a lifetime in seconds; zero means the default
    pub fn lifetime(mut self, secs: u32) -> Self {
        self.lifetime = Some(secs);
        self
    }

    /// Supply channel bindings
    pub fn bindings(mut self, bindings: &'a [u8]) -> Self {
        self.bindings = Some(bindings);
        self
    }

    /// Supply the acceptor's token
    pub fn input_token(mut self, token: &'a [u8]) -> Self {
        self.input_token = Some(token);
        self
    }
}

/// Arguments of an acceptor step.
#[derive(Debug, Clone, Copy)]
pub struct AcceptRequest<'a> {
    /// Acceptor credential
    pub credential: Option<&'a Credential>,
    /// Token received from the initiator
    pub input_token: &'a [u8],
    /// Channel bindings
    pub bindings: Option<&'a [u8]>,
}

impl<'a> AcceptRequest<'a> {
    /// Request consuming `input_token`
    pub fn new(input_token: &'a [u8]) -> Self {
        Self {
            credential: None,
            input_token,
            bindings: None,
        }
    }

    /// Use an explicit credential
    pub fn credential(mut self, credential: &'a Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Supply channel bindings
    pub fn bindings(mut self, bindings: &'a [u8]) -> Self {
        self.bindings = Some(bindings);
        self
    }
}

/// Result of an initiator step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutput {
    /// Complete or continue-needed
    pub status: Status,
    /// Token for the acceptor, empty if none
    pub output_token: Vec<u8>,
    /// Mechanism actually used
    pub mech: Oid,
    /// Services available
    pub flags: ContextFlags,
    /// Remaining lifetime in seconds
    pub lifetime: u32,
}

impl InitOutput {
    fn from_step(mech: Oid, step: StepOutput) -> Self {
        Self {
            status: step.status,
            output_token: step.output_token,
            mech,
            flags: step.flags,
            lifetime: step.lifetime,
        }
    }
}

/// Result of an acceptor step.
#[derive(Debug, Clone)]
pub struct AcceptOutput {
    /// Complete or continue-needed
    pub status: Status,
    /// Token for the initiator, empty if none
    pub output_token: Vec<u8>,
    /// Authenticated initiator
    pub source: Option<Name>,
    /// Mechanism actually used
    pub mech: Oid,
    /// Services available
    pub flags: ContextFlags,
    /// Remaining lifetime in seconds
    pub lifetime: u32,
    /// Delegated credential, never produced
    pub delegated: Option<Credential>,
}

impl AcceptOutput {
    fn from_step(mech: Oid, step: StepOutput) -> Self {
        Self {
            status: step.status,
            output_token: step.output_token,
            source: step.source,
            mech,
            flags: step.flags,
            lifetime: step.lifetime,
            delegated: None,
        }
    }
}

impl Gss {
    /// Run one initiator step.
    ///
    /// With an unbound handle a context is allocated, bound to the resolved
    /// mechanism and stored in `handle` only if the step succeeds. With a
    /// bound handle the existing context is continued and left untouched on
    /// failure.
    pub fn init_sec_context(
        &self,
        handle: Option<&mut ContextHandle>,
        req: &InitRequest<'_>,
    ) -> Result<InitOutput> {
        let handle = handle.ok_or_else(|| GssError::inaccessible_read(MajorStatus::NoContext))?;

        if handle.is_none() {
            let mech = self.registry.find(req.mech)?;
            let mut ctx = Box::new(SecurityContext::new(mech.oid().clone()));
            tracing::debug!("Allocated initiator context for {}", ctx.mech);

            // On failure `ctx` is dropped here and the handle stays unbound
            let step = mech.init(&mut ctx.state, req).inspect_err(|e| {
                tracing::debug!("First init step failed, context released: {}", e);
            })?;

            let output = InitOutput::from_step(ctx.mech.clone(), step);
            handle.0 = Some(ctx);
            return Ok(output);
        }

        let ctx = handle.bound_mut()?;
        if let Some(requested) = req.mech {
            if requested != &ctx.mech {
                return Err(GssError::BadMech(requested.clone()));
            }
        }
        let mech = self.mech_for(ctx)?;
        let step = mech.init(&mut ctx.state, req)?;
        Ok(InitOutput::from_step(ctx.mech.clone(), step))
    }

    /// Run one acceptor step.
    ///
    /// On the first call the mechanism is taken from the identifier embedded
    /// in the initiator's token, never from the registry default.
    pub fn accept_sec_context(
        &self,
        handle: Option<&mut ContextHandle>,
        req: &AcceptRequest<'_>,
    ) -> Result<AcceptOutput> {
        let handle = handle.ok_or_else(|| GssError::inaccessible_read(MajorStatus::NoContext))?;

        if handle.is_none() {
            let unframed = codec::decapsulate(req.input_token)?;
            let oid = unframed.mech_oid()?;
            let mech = self.registry.find_bound(&oid)?;

            let mut ctx = Box::new(SecurityContext::new(oid));
            tracing::debug!("Allocated acceptor context for {}", ctx.mech);

            let step = mech.accept(&mut ctx.state, req).inspect_err(|e| {
                tracing::debug!("First accept step failed, context released: {}", e);
            })?;

            let output = AcceptOutput::from_step(ctx.mech.clone(), step);
            handle.0 = Some(ctx);
            return Ok(output);
        }

        let ctx = handle.bound_mut()?;
        let mech = self.mech_for(ctx)?;
        let step = mech.accept(&mut ctx.state, req)?;
        Ok(AcceptOutput::from_step(ctx.mech.clone(), step))
    }

    /// Tear down a context in any phase.
    ///
    /// The handle is reset to the sentinel whatever the mechanism teardown
    /// reports; a teardown error is still returned afterwards.
    pub fn delete_sec_context(&self, handle: Option<&mut ContextHandle>) -> Result<Option<Vec<u8>>> {
        let handle = handle.ok_or_else(|| GssError::inaccessible_read(MajorStatus::NoContext))?;
        let mut ctx = handle.0.take().ok_or_else(no_context)?;

        let result = self
            .mech_for(&ctx)
            .and_then(|mech| mech.delete(&mut ctx.state));
        if let Err(e) = &result {
            tracing::warn!("Teardown of {} context failed: {}", ctx.mech, e);
        }
        tracing::debug!("Released {} context", ctx.mech);
        result
    }
}
