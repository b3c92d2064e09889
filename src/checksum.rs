//! Document fingerprints

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum of a document's canonical JSON form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum of any serializable value
    ///
    /// Name-indexed collections are ordered maps, so equal documents always
    /// serialize to the same bytes.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Self {
        let canonical = serde_json::to_vec(value).unwrap_or_default();
        Self::from_bytes(&canonical)
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Field, FileTree, Struct, Type};
    use crate::merge::merge;

    fn document(field_type: &str) -> Document {
        merge(vec![FileTree::new("a.thrift")
            .with_struct(Struct::new("Foo").field(Field::new(1, "bar", Type::named(field_type))))])
        .unwrap()
    }

    #[test]
    fn test_checksum_consistency() {
        assert_eq!(Checksum::of(&document("i32")), Checksum::of(&document("i32")));
    }

    #[test]
    fn test_checksum_different_content() {
        assert_ne!(Checksum::of(&document("i32")), Checksum::of(&document("i64")));
    }

    #[test]
    fn test_checksum_ignores_file_layout() {
        let split = merge(vec![
            FileTree::new("a.thrift").with_struct(Struct::new("A")),
            FileTree::new("b.thrift").with_struct(Struct::new("B")),
        ])
        .unwrap();
        let joined = merge(vec![FileTree::new("all.thrift")
            .with_struct(Struct::new("B"))
            .with_struct(Struct::new("A"))])
        .unwrap();

        assert_eq!(Checksum::of(&split), Checksum::of(&joined));
        assert_eq!(Checksum::of(&split).short().len(), 12);
    }
}
