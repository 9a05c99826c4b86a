//! Object Identifier parsing, formatting and ordering.

use std::fmt;

use crate::{Error, Result};

/// A non-empty sequence of unsigned integers naming an SNMP managed
/// object. Ordering is the natural component-wise numeric comparison:
/// a strict prefix sorts before any of its extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    pub fn from_components(components: &[u32]) -> Self {
        Self(components.to_vec())
    }

    /// Parse a dotted OID string. Accepts a leading dot and tolerates
    /// a single trailing dot; rejects empty components, non-numeric
    /// components, and components that overflow u32.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);

        if trimmed.is_empty() {
            return Err(Error::parse("empty OID"));
        }

        let mut components = Vec::new();
        for part in trimmed.split('.') {
            if part.is_empty() {
                return Err(Error::parse(format!("empty OID component in '{}'", s)));
            }
            let value: u32 = part
                .parse()
                .map_err(|_| Error::parse(format!("invalid OID component '{}' in '{}'", part, s)))?;
            components.push(value);
        }

        Ok(Self(components))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn into_components(self) -> Vec<u32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn append(&self, component: u32) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }

    /// True if `self` is a strict prefix of `other`.
    pub fn is_prefix_of(&self, other: &Oid) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_oid() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.components(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    }

    #[test]
    fn tolerates_leading_and_trailing_dot() {
        let a = Oid::parse(".1.3.6.1").unwrap();
        let b = Oid::parse("1.3.6.1.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_components() {
        assert!(Oid::parse("1..3").is_err());
        assert!(Oid::parse("").is_err());
        assert!(Oid::parse(".").is_err());
    }

    #[test]
    fn rejects_non_numeric_and_overflow() {
        assert!(Oid::parse("1.3.six.1").is_err());
        assert!(Oid::parse("1.3.99999999999999").is_err());
    }

    #[test]
    fn numeric_lexicographic_order() {
        let a = Oid::parse("1.3.6.1.2.1.2.2.1.2.1").unwrap();
        let b = Oid::parse("1.3.6.1.2.1.2.2.1.10.1").unwrap();
        assert!(a < b, "component 2 < component 10 numerically, not lexically as strings");
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        let short = Oid::parse("1.3.6.1").unwrap();
        let long = Oid::parse("1.3.6.1.2").unwrap();
        assert!(short < long);
        assert!(short.is_prefix_of(&long));
        assert!(!long.is_prefix_of(&short));
    }

    #[test]
    fn equal_oids_are_not_prefixes() {
        let a = Oid::parse("1.3.6.1").unwrap();
        let b = Oid::parse("1.3.6.1").unwrap();
        assert!(!a.is_prefix_of(&b));
    }
}
