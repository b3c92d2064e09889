//! Thrift Schema Compatibility Checker
//!
//! Decides whether a new revision of a Thrift IDL schema stays backward
//! compatible with an older one: code built against the old schema must keep
//! interoperating with endpoints upgraded to the new one.
//!
//! ## Features
//!
//! - **Document Merging**: Every parsed file of a version folds into one name-indexed document
//! - **Declaration Matching**: Old and new declarations pair up by name; additions are always safe
//! - **Structural Comparison**: Fields by id, exact types, requiredness policy, methods by name
//! - **Causal Reports**: The first violation comes back with its full path
//!
//! ## Architecture
//!
//! ```text
//! old trees ──► merge ──► Document ─┐
//!                                   ├──► match ──► compare ──► Verdict
//! new trees ──► merge ──► Document ─┘
//! ```
//!
//! Parsing the IDL text and resolving includes happen upstream; this crate
//! starts from the parser's declaration trees.
//!
//! ```
//! use thrift_compat::{CompatibilityChecker, Field, FileTree, Struct, Type};
//!
//! let old = FileTree::new("user.thrift")
//!     .with_struct(Struct::new("User").field(Field::new(1, "id", Type::named("i32"))));
//! let new = FileTree::new("user.thrift")
//!     .with_struct(Struct::new("User").field(Field::new(1, "id", Type::named("i64"))));
//!
//! let result = CompatibilityChecker::new().check(vec![old], vec![new]).unwrap();
//! assert_eq!(
//!     result.message().unwrap(),
//!     "struct 'User' was changed: field 'id' was changed: type was changed: i32 → i64"
//! );
//! ```

pub mod checker;
pub mod checksum;
pub mod compare;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod report;
pub mod version;

pub use checker::{check_configured, CompatibilityChecker, CompatibilityResult};
pub use checksum::Checksum;
pub use compare::{compare, Comparator};
pub use config::{CompareMode, CompatConfig, Policy, RequirednessPolicy};
pub use error::{CompatError, Result};
pub use loader::SourceSet;
pub use merge::merge;
pub use model::{
    ConstValue, Constant, DeclarationKind, Document, Enum, Field, FileTree, Method, ModelError, Service,
    Struct, Type, Typedef,
};
pub use report::{Context, FieldRole, Incompatibility, TypePosition, Verdict, Violation};
pub use version::{Bump, SchemaVersion};
