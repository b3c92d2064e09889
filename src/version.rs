//! Schema versioning utilities

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version bump a change calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bump {
    /// Nothing changed on the wire
    Patch,
    /// Backward-compatible change
    Minor,
    /// Backward-incompatible change
    Major,
}

/// Version label of one side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Semantic version (e.g., "1.2.3")
    pub version: Version,
}

impl SchemaVersion {
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    /// Create from a version string
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        // Strip leading 'v' if present
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        let version = Version::parse(version_str)?;
        Ok(Self::new(version))
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Check if this is a major version bump from another version
    pub fn is_major_bump_from(&self, other: &SchemaVersion) -> bool {
        self.version.major > other.version.major
    }

    /// Check if this is a minor version bump from another version
    pub fn is_minor_bump_from(&self, other: &SchemaVersion) -> bool {
        self.version.major == other.version.major && self.version.minor > other.version.minor
    }

    /// Bump kind between `other` and this version
    pub fn bump_from(&self, other: &SchemaVersion) -> Bump {
        if self.is_major_bump_from(other) {
            Bump::Major
        } else if self.is_minor_bump_from(other) {
            Bump::Minor
        } else {
            Bump::Patch
        }
    }

    /// Next version for the given bump
    pub fn bump(&self, bump: Bump) -> Self {
        let v = &self.version;
        let version = match bump {
            Bump::Patch => Version::new(v.major, v.minor, v.patch + 1),
            Bump::Minor => Version::new(v.major, v.minor + 1, 0),
            Bump::Major => Version::new(v.major + 1, 0, 0),
        };
        Self::new(version)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}
