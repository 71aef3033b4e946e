//! Installed mechanisms.
//!
//! The registry is built once and never mutated afterwards. Share it with
//! an `Arc`; tests inject their own instead of touching global state.

use std::sync::Arc;

use super::Mechanism;
use crate::error::{GssError, Result};
use crate::oid::{Oid, OidSet};

/// Immutable, ordered list of mechanisms with one default.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use gss::krb5::crypto::RustCryptoProvider;
/// use gss::krb5::{Krb5Mechanism, MemoryRealm};
/// use gss::mech::MechanismRegistry;
/// use gss::oid::GSS_KRB5;
///
/// let realm = Arc::new(MemoryRealm::new("EXAMPLE.ORG"));
/// let krb5 = Krb5Mechanism::builder(Arc::new(RustCryptoProvider::new()))
///     .ticket_store(realm)
///     .build();
/// let registry = MechanismRegistry::builder()
///     .install(Arc::new(krb5))
///     .build()
///     .unwrap();
///
/// assert_eq!(registry.find(None).unwrap().oid(), &GSS_KRB5);
/// assert!(registry.mechanisms().contains(&GSS_KRB5));
/// ```
#[derive(Debug, Clone)]
pub struct MechanismRegistry {
    mechs: Vec<Arc<dyn Mechanism>>,
    default: usize,
}

impl MechanismRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolve a caller's mechanism choice.
    ///
    /// `None` selects the default mechanism; an explicit identifier must
    /// match an installed mechanism exactly.
    pub fn find(&self, oid: Option<&Oid>) -> Result<Arc<dyn Mechanism>> {
        match oid {
            None => {
                let mech = &self.mechs[self.default];
                tracing::debug!("Using default mechanism {}", mech.oid());
                Ok(Arc::clone(mech))
            },
            Some(oid) => self.find_bound(oid),
        }
    }

    /// Resolve the mechanism an existing context is bound to.
    ///
    /// Never substitutes the default.
    pub fn find_bound(&self, oid: &Oid) -> Result<Arc<dyn Mechanism>> {
        self.mechs
            .iter()
            .find(|m| m.oid() == oid)
            .map(Arc::clone)
            .ok_or_else(|| GssError::BadMech(oid.clone()))
    }

    /// Identifier of the default mechanism
    pub fn default_oid(&self) -> &Oid {
        self.mechs[self.default].oid()
    }

    /// All installed mechanisms, in installation order
    pub fn mechanisms(&self) -> OidSet {
        self.mechs.iter().map(|m| m.oid().clone()).collect()
    }

    /// Iterate over installed mechanisms
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Mechanism>> {
        self.mechs.iter()
    }

    /// Number of installed mechanisms
    pub fn len(&self) -> usize {
        self.mechs.len()
    }

    /// Always false for a built registry
    pub fn is_empty(&self) -> bool {
        self.mechs.is_empty()
    }
}

/// Builder for [`MechanismRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    mechs: Vec<Arc<dyn Mechanism>>,
    default: Option<Oid>,
}

impl RegistryBuilder {
    /// Install a mechanism. The first one installed is the default unless
    /// [`default_mech`](Self::default_mech) says otherwise.
    pub fn install(mut self, mech: Arc<dyn Mechanism>) -> Self {
        self.mechs.push(mech);
        self
    }

    /// Choose the default mechanism
    pub fn default_mech(mut self, oid: Oid) -> Self {
        self.default = Some(oid);
        self
    }

    /// Finish the registry.
    ///
    /// Fails when nothing is installed, when an identifier is installed
    /// twice, or when the chosen default is not installed.
    pub fn build(self) -> Result<MechanismRegistry> {
        if self.mechs.is_empty() {
            return Err(GssError::Config("no mechanisms installed".to_string()));
        }

        let mut seen = OidSet::new();
        for mech in &self.mechs {
            if !seen.insert(mech.oid().clone()) {
                return Err(GssError::Config(format!(
                    "mechanism {} installed twice",
                    mech.oid()
                )));
            }
        }

        let default = match &self.default {
            None => 0,
            Some(oid) => self
                .mechs
                .iter()
                .position(|m| m.oid() == oid)
                .ok_or_else(|| GssError::BadMech(oid.clone()))?,
        };

        Ok(MechanismRegistry {
            mechs: self.mechs,
            default,
        })
    }
}
