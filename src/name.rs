//! Principal names.
//!
//! A [`Name`] is an uninterpreted byte string tagged with its name type.
//! Mechanisms canonicalize it when they need a mechanism name.

use std::fmt;

use crate::oid::Oid;

/// Name with its type identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
    bytes: Vec<u8>,
    name_type: Oid,
}

impl Name {
    /// Import a name of the given type.
    pub fn import(bytes: impl Into<Vec<u8>>, name_type: Oid) -> Self {
        Self {
            bytes: bytes.into(),
            name_type,
        }
    }

    /// Raw name bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Name type.
    pub fn name_type(&self) -> &Oid {
        &self.name_type
    }

    /// Name as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?}, {})", String::from_utf8_lossy(&self.bytes), self.name_type)
    }
}
