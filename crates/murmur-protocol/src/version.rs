//! Signaling protocol versioning.
//!
//! The relay advertises its major version in the `Welcome` frame it sends
//! on connect; only the major travels on the wire. A client whose major
//! differs should disconnect rather than attempt to pair, since frame
//! semantics may have changed incompatibly. Minor bumps cover additive
//! changes (new frame types, new optional fields) that old peers can
//! safely ignore.

use serde::{Deserialize, Serialize};

/// The version this build of the protocol speaks.
pub const PROTOCOL_VERSION: Version = Version { major: 1, minor: 0 };

/// A signaling protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Incremented on breaking frame or matchmaking semantics changes.
    pub major: u8,
    /// Incremented on additive, ignorable changes.
    pub minor: u8,
}

impl Version {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether a peer speaking `other` can exchange frames with this one.
    ///
    /// Compatibility is same-major; this is the check a client runs against
    /// the major advertised in the `Welcome` frame.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Default for Version {
    fn default() -> Self {
        PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::Frame;

    #[test]
    fn test_minor_revisions_interoperate() {
        let relay = Version::new(1, 1);
        let client = PROTOCOL_VERSION;

        assert!(client.is_compatible_with(&relay));
        assert!(relay.is_compatible_with(&client));
        // A major bump breaks pairing in both directions.
        assert!(!client.is_compatible_with(&Version::new(2, 0)));
        assert!(!Version::new(2, 0).is_compatible_with(&client));
    }

    #[test]
    fn test_welcome_carries_current_major() {
        let frame = Frame::welcome("conn-1", PROTOCOL_VERSION.major, 30_000);
        match frame {
            Frame::Welcome { version, .. } => {
                assert!(PROTOCOL_VERSION.is_compatible_with(&Version::new(version, 0)));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_version_display() {
        assert_eq!(PROTOCOL_VERSION.to_string(), "1.0");
        assert_eq!(Version::new(1, 2).to_string(), "1.2");
    }
}
