//! Object identifiers and identifier sets.
//!
//! An [`Oid`] names a mechanism or a name type. It holds the DER content
//! octets (no tag, no length) and compares byte-exactly.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{GssError, Result};

/// Object identifier in DER content encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid(Cow<'static, [u8]>);

/// Ticket mechanism, {iso(1) member-body(2) US(840) mit(113554) infosys(1) gssapi(2) krb5(2)}
pub const GSS_KRB5: Oid = Oid::from_static(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x02");

/// User name form, 1.2.840.113554.1.2.1.1
pub const NT_USER_NAME: Oid = Oid::from_static(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x01\x01");

/// String UID name form, 1.2.840.113554.1.2.1.3
pub const NT_STRING_UID_NAME: Oid = Oid::from_static(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x01\x03");

/// Legacy host-based service name form, 1.2.840.113554.1.2.1.4
pub const NT_HOSTBASED_SERVICE_X: Oid =
    Oid::from_static(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x01\x04");

/// Host-based service name form, 1.3.6.1.5.6.2
pub const NT_HOSTBASED_SERVICE: Oid = Oid::from_static(b"\x2b\x06\x01\x05\x06\x02");

/// Mechanism principal name form, 1.2.840.113554.1.2.2.1
pub const NT_KRB5_PRINCIPAL_NAME: Oid =
    Oid::from_static(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x02\x01");

impl Oid {
    /// Wrap a static DER encoding.
    pub const fn from_static(der: &'static [u8]) -> Self {
        Self(Cow::Borrowed(der))
    }

    /// Take ownership of a DER encoding.
    ///
    /// Empty encodings are rejected.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        if der.is_empty() {
            return Err(GssError::failure("empty object identifier", 0));
        }
        Ok(Self(Cow::Owned(der)))
    }

    /// DER content octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the encoding is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode into arcs, `None` if the encoding is malformed.
    pub fn arcs(&self) -> Option<Vec<u64>> {
        let mut arcs = Vec::new();
        let mut value: u64 = 0;
        let mut pending = false;

        for &byte in self.0.iter() {
            if value > (u64::MAX >> 7) {
                return None;
            }
            value = (value << 7) | u64::from(byte & 0x7F);
            pending = true;
            if byte & 0x80 == 0 {
                if arcs.is_empty() {
                    let first = (value / 40).min(2);
                    arcs.push(first);
                    arcs.push(value - first * 40);
                } else {
                    arcs.push(value);
                }
                value = 0;
                pending = false;
            }
        }

        if pending || arcs.is_empty() {
            None
        } else {
            Some(arcs)
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arcs() {
            Some(arcs) => {
                let dotted: Vec<String> = arcs.iter().map(u64::to_string).collect();
                write!(f, "{}", dotted.join("."))
            },
            None => write!(f, "<malformed oid>"),
        }
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl FromStr for Oid {
    type Err = GssError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || GssError::failure(format!("malformed object identifier: {s}"), 0);

        let arcs = s
            .split('.')
            .map(|arc| arc.parse::<u64>().map_err(|_| bad()))
            .collect::<Result<Vec<_>>>()?;
        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(bad());
        }

        let mut der = Vec::new();
        let first = arcs[0]
            .checked_mul(40)
            .and_then(|v| v.checked_add(arcs[1]))
            .ok_or_else(bad)?;
        push_base128(&mut der, first);
        for &arc in &arcs[2..] {
            push_base128(&mut der, arc);
        }
        Oid::from_der(der)
    }
}

fn push_base128(buf: &mut Vec<u8>, value: u64) {
    let mut groups = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;
    while rest != 0 {
        groups.push(((rest & 0x7F) as u8) | 0x80);
        rest >>= 7;
    }
    buf.extend(groups.iter().rev());
}

/// Unordered set of identifiers without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OidSet {
    members: Vec<Oid>,
}

impl OidSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn insert(&mut self, oid: Oid) -> bool {
        if self.contains(&oid) {
            return false;
        }
        self.members.push(oid);
        true
    }

    /// Test membership.
    pub fn contains(&self, oid: &Oid) -> bool {
        self.members.iter().any(|m| m == oid)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Oid> {
        self.members.iter()
    }
}

impl FromIterator<Oid> for OidSet {
    fn from_iter<I: IntoIterator<Item = Oid>>(iter: I) -> Self {
        let mut set = OidSet::new();
        for oid in iter {
            set.insert(oid);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_well_known() {
        assert_eq!(GSS_KRB5.to_string(), "1.2.840.113554.1.2.2");
        assert_eq!(NT_HOSTBASED_SERVICE.to_string(), "1.3.6.1.5.6.2");
        assert_eq!(NT_KRB5_PRINCIPAL_NAME.to_string(), "1.2.840.113554.1.2.2.1");
    }

    #[test]
    fn test_parse_matches_constant() {
        let oid: Oid = "1.2.840.113554.1.2.2".parse().unwrap();
        assert_eq!(oid, GSS_KRB5);
        assert!("1.2.x".parse::<Oid>().is_err());
        assert!("7.1".parse::<Oid>().is_err());
        assert!("1".parse::<Oid>().is_err());
    }

    #[test]
    fn test_equality_is_byte_exact() {
        let owned = Oid::from_der(GSS_KRB5.as_bytes().to_vec()).unwrap();
        assert_eq!(owned, GSS_KRB5);
        assert_ne!(GSS_KRB5, NT_KRB5_PRINCIPAL_NAME);
        assert!(Oid::from_der(Vec::new()).is_err());
    }

    #[test]
    fn test_malformed_arcs() {
        let truncated = Oid::from_der(vec![0x2a, 0x86]).unwrap();
        assert!(truncated.arcs().is_none());
        assert_eq!(truncated.to_string(), "<malformed oid>");
    }

    #[test]
    fn test_oid_set() {
        let mut set = OidSet::new();
        assert!(set.is_empty());
        assert!(set.insert(GSS_KRB5));
        assert!(!set.insert(GSS_KRB5));
        assert!(set.insert(NT_USER_NAME));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&GSS_KRB5));
        assert!(!set.contains(&NT_HOSTBASED_SERVICE));
    }
}
