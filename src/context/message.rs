//! Per-message calls against an existing context.

use super::{ContextHandle, Gss};
use crate::error::Result;
use crate::mech::{UnwrapOutput, WrapOutput};

impl Gss {
    /// Protect a message.
    ///
    /// `conf_req` is honored only if the mechanism can encrypt; check
    /// [`WrapOutput::conf_applied`] before relying on confidentiality.
    pub fn wrap(&self, handle: &mut ContextHandle, conf_req: bool, message: &[u8]) -> Result<WrapOutput> {
        let ctx = handle.bound_mut()?;
        let mech = self.mech_for(ctx)?;
        mech.wrap(&mut ctx.state, conf_req, message)
    }

    /// Verify a wrapped token and recover its message.
    pub fn unwrap(&self, handle: &mut ContextHandle, token: &[u8]) -> Result<UnwrapOutput> {
        let ctx = handle.bound_mut()?;
        let mech = self.mech_for(ctx)?;
        mech.unwrap(&mut ctx.state, token)
    }

    /// Compute a detached integrity token.
    pub fn get_mic(&self, handle: &mut ContextHandle, message: &[u8]) -> Result<Vec<u8>> {
        let ctx = handle.bound_mut()?;
        let mech = self.mech_for(ctx)?;
        mech.get_mic(&mut ctx.state, message)
    }

    /// Verify a detached integrity token.
    pub fn verify_mic(&self, handle: &mut ContextHandle, message: &[u8], token: &[u8]) -> Result<()> {
        let ctx = handle.bound_mut()?;
        let mech = self.mech_for(ctx)?;
        mech.verify_mic(&mut ctx.state, message, token)
    }
}
