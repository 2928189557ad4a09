//! Matching regions.
//!
//! A region is the scope key for pairing: either the `global` sentinel or a
//! fixed two-letter country code. Matching is exact, never cross-region.
//! Validation here is shape-only; whether a code denotes a real country is
//! a presentation-layer concern.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The sentinel region that matches clients worldwide.
pub const GLOBAL: &str = "global";

/// A matching scope: `global` or an ISO-3166-style two-letter country code.
///
/// Country codes are normalized to uppercase so `de` and `DE` name the same
/// queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Region {
    /// Worldwide matching.
    Global,
    /// Exact-match country scope.
    Country([u8; 2]),
}

impl Region {
    /// The global sentinel region.
    #[must_use]
    pub fn global() -> Self {
        Region::Global
    }

    /// Create a country region from a two-letter code.
    ///
    /// # Errors
    ///
    /// Returns an error message if the code is not exactly two ASCII letters.
    pub fn country(code: &str) -> Result<Self, &'static str> {
        let bytes = code.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err("Country code must be exactly two ASCII letters");
        }
        Ok(Region::Country([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
        ]))
    }

    /// Whether this is the global sentinel.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Region::Global)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Global => f.write_str(GLOBAL),
            Region::Country(code) => {
                write!(f, "{}{}", code[0] as char, code[1] as char)
            }
        }
    }
}

impl FromStr for Region {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(GLOBAL) {
            Ok(Region::Global)
        } else {
            Region::country(s)
        }
    }
}

impl TryFrom<String> for Region {
    type Error = &'static str;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Region> for String {
    fn from(region: Region) -> String {
        region.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parsing() {
        assert_eq!("global".parse::<Region>(), Ok(Region::Global));
        assert_eq!("GLOBAL".parse::<Region>(), Ok(Region::Global));
        assert_eq!("de".parse::<Region>(), Region::country("DE"));
        assert!("".parse::<Region>().is_err());
        assert!("DEU".parse::<Region>().is_err());
        assert!("d1".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_normalization() {
        let lower: Region = "jp".parse().unwrap();
        let upper: Region = "JP".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), "JP");
    }

    #[test]
    fn test_global_is_not_a_country() {
        let global = Region::global();
        let de: Region = "DE".parse().unwrap();
        assert!(global.is_global());
        assert!(!de.is_global());
        assert_ne!(global, de);
    }
}
