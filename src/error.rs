//! Error types for the compatibility checker
//!
//! Only input problems live here. A detected incompatibility is not an
//! error: it is the verdict payload (see [`crate::report`]).

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{DeclarationKind, ModelError};

/// Result type for checker operations
pub type Result<T> = std::result::Result<T, CompatError>;

/// Fatal input errors, raised before any comparison takes place
#[derive(Error, Debug)]
pub enum CompatError {
    #[error("{kind} '{name}' is declared in both {first} and {second}")]
    DuplicateDeclaration {
        kind: DeclarationKind,
        name: String,
        first: String,
        second: String,
    },

    #[error("Malformed declaration tree: {0}")]
    Model(#[from] ModelError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read declaration tree {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Invalid version: {0}")]
    Version(#[from] semver::Error),

    #[error("Incompatible change released as {new} (from {old}) without a major version bump: {reason}")]
    UnderstatedBump {
        old: String,
        new: String,
        reason: String,
    },
}
