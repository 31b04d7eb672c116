//! Query identity: a stable token per (prefix, filter) shape.
//!
//! The token is the CRC-32 (IEEE) of `prefix + filter`, rendered as an unsigned
//! decimal. Identities already recorded by hosts use this exact rendering, so it
//! must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::QuerySpec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryIdentity(String);

impl QueryIdentity {
    /// Derive the identity for a query. Fields are concatenated without a
    /// separator, so ("ab", "c") and ("a", "bc") share an identity.
    pub fn derive(spec: &QuerySpec) -> Self {
        let mut key = String::with_capacity(spec.prefix.len() + spec.filter.len());
        key.push_str(&spec.prefix);
        key.push_str(&spec.filter);
        Self(crc32fast::hash(key.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
