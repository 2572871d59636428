//! TS server protocol versions.

use std::fmt;

/// A TS server protocol version, ordered lexicographically by
/// `(major, minor, patch)`.
///
/// The server reports its version during the handshake; the bridge compares
/// it against the milestone constants below to decide which commands and
/// request shapes are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl ProtocolVersion {
    /// First version that accepts batched `updateOpen` requests.
    pub const V3_4_0: Self = Self::new(3, 4, 0);
    /// First version that serves `geterr` from the syntax-only server.
    pub const V4_4_0: Self = Self::new(4, 4, 0);

    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a dotted version string such as `"4.4.2"`.
    ///
    /// Missing components default to zero; prerelease suffixes after a
    /// component (`"4.0.0-dev"`) reject the whole string, matching how the
    /// server reports plain release triples.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Returns true if this version is at least `other`.
    #[must_use]
    pub fn gte(self, other: Self) -> bool {
        self >= other
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
