//! Context service flags.
//!
//! Bit values follow the C bindings so the raw word can be exchanged with
//! other implementations (it travels inside the authenticator checksum).

/// Requested or granted context services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContextFlags(u32);

#[allow(missing_docs)]
impl ContextFlags {
    /// Credential delegation
    pub const DELEG: u32 = 1 << 0;
    /// Mutual authentication
    pub const MUTUAL: u32 = 1 << 1;
    /// Replay detection
    pub const REPLAY: u32 = 1 << 2;
    /// Out-of-sequence detection
    pub const SEQUENCE: u32 = 1 << 3;
    /// Confidentiality
    pub const CONF: u32 = 1 << 4;
    /// Integrity
    pub const INTEG: u32 = 1 << 5;
    /// Anonymity
    pub const ANON: u32 = 1 << 6;
    /// Per-message protection is available
    pub const PROT_READY: u32 = 1 << 7;
    /// Context may be exported
    pub const TRANS: u32 = 1 << 8;

    /// Create new empty flags
    pub fn new() -> Self {
        Self(0)
    }

    /// Create from raw bits
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Set a flag
    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }

    /// Clear a flag
    pub fn clear(&mut self, flag: u32) {
        self.0 &= !flag;
    }

    /// Check if flag is set
    pub fn has(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, flag: u32) -> Self {
        self.set(flag);
        self
    }

    /// Keep only the bits also present in `mask`
    pub fn intersect(&self, mask: u32) -> Self {
        Self(self.0 & mask)
    }
}
