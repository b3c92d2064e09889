//! Violations and verdicts
//!
//! The comparator stops at the first incompatibility it finds. Every
//! recursive level that sees it come back prefixes a [`Context`] frame, so
//! the final [`Incompatibility`] reads as one causal chain from the
//! top-level declaration down to the offending element.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{DeclarationKind, Requiredness, Type};

/// Position of a nested type inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypePosition {
    MapKey,
    MapValue,
    ListElement,
    SetElement,
}

impl fmt::Display for TypePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePosition::MapKey => f.write_str("map key"),
            TypePosition::MapValue => f.write_str("map value"),
            TypePosition::ListElement => f.write_str("list element"),
            TypePosition::SetElement => f.write_str("set element"),
        }
    }
}

/// Role of a field-shaped element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Field,
    Argument,
    Exception,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRole::Field => f.write_str("field"),
            FieldRole::Argument => f.write_str("argument"),
            FieldRole::Exception => f.write_str("exception"),
        }
    }
}

/// One step of the path leading to a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Context {
    File { name: String },
    Declaration { kind: DeclarationKind, name: String },
    Method { name: String },
    Field { role: FieldRole, name: String, id: i32 },
    ReturnType,
    Type { position: TypePosition },
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::File { name } => write!(f, "file '{}' was changed", name),
            Context::Declaration { kind, name } => write!(f, "{} '{}' was changed", kind, name),
            Context::Method { name } => write!(f, "method '{}' was changed", name),
            Context::Field { role, name, .. } => write!(f, "{} '{}' was changed", role, name),
            Context::ReturnType => f.write_str("return type"),
            Context::Type { position } => write!(f, "{}", position),
        }
    }
}

/// A single backward-incompatible change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    FileRemoved { name: String },
    DeclarationRemoved { kind: DeclarationKind, name: String },
    MethodRemoved { name: String },
    FieldRemoved { role: FieldRole, name: String, id: i32 },
    FieldIdChanged { role: FieldRole, name: String, old: i32, new: i32 },
    TypeChanged { old: Type, new: Type },
    TypeContainerMismatch { old: Type, new: Type },
    RequirednessTightened,
    RequirednessLoosened,
    OnewayChanged { old: bool, new: bool },
    DefaultChanged { old: Option<String>, new: Option<String> },
    EnumValueRemoved { name: String, value: i32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::FileRemoved { name } => write!(f, "file '{}' was removed", name),
            Violation::DeclarationRemoved { kind, name } => write!(f, "{} '{}' was removed", kind, name),
            Violation::MethodRemoved { name } => write!(f, "method '{}' was removed", name),
            Violation::FieldRemoved { role, name, id } => {
                write!(f, "{} '{}' (id {}) was removed", role, name, id)
            }
            Violation::FieldIdChanged { role, name, old, new } => {
                write!(f, "{} '{}' id was changed: {} → {}", role, name, old, new)
            }
            Violation::TypeChanged { old, new } => write!(f, "type was changed: {} → {}", old, new),
            Violation::TypeContainerMismatch { old, new } => {
                write!(f, "type was changed between container and non-container: {} → {}", old, new)
            }
            Violation::RequirednessTightened => write!(
                f,
                "requiredness was changed: {} → {}",
                Requiredness::Optional,
                Requiredness::Required
            ),
            Violation::RequirednessLoosened => write!(
                f,
                "requiredness was changed: {} → {}",
                Requiredness::Required,
                Requiredness::Optional
            ),
            Violation::OnewayChanged { old, new } => write!(f, "oneway was changed: {} → {}", old, new),
            Violation::DefaultChanged { old, new } => write!(
                f,
                "default was changed: {} → {}",
                old.as_deref().unwrap_or("none"),
                new.as_deref().unwrap_or("none")
            ),
            Violation::EnumValueRemoved { name, value } => {
                write!(f, "enum value '{}' ({}) was removed", name, value)
            }
        }
    }
}

/// The first violation found, with the path that led to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incompatibility {
    /// Outermost frame first
    pub context: Vec<Context>,
    pub violation: Violation,
}

impl Incompatibility {
    /// Prefix a frame while unwinding
    pub fn within(mut self, frame: Context) -> Self {
        self.context.insert(0, frame);
        self
    }
}

impl From<Violation> for Incompatibility {
    fn from(violation: Violation) -> Self {
        Self {
            context: Vec::new(),
            violation,
        }
    }
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.context {
            write!(f, "{}: ", frame)?;
        }
        write!(f, "{}", self.violation)
    }
}

/// Binary outcome of a compatibility check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Compatible,
    Incompatible(Incompatibility),
}

impl Verdict {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Verdict::Compatible)
    }

    /// The incompatibility, if any
    pub fn incompatibility(&self) -> Option<&Incompatibility> {
        match self {
            Verdict::Compatible => None,
            Verdict::Incompatible(reason) => Some(reason),
        }
    }

    /// Human-readable causal chain; `None` on success
    pub fn message(&self) -> Option<String> {
        self.incompatibility().map(ToString::to_string)
    }
}

impl From<Result<(), Incompatibility>> for Verdict {
    fn from(outcome: Result<(), Incompatibility>) -> Self {
        match outcome {
            Ok(()) => Verdict::Compatible,
            Err(reason) => Verdict::Incompatible(reason),
        }
    }
}
