//! Structural comparison
//!
//! Walks matched old/new declarations depth-first, in old-side order, and
//! stops at the first backward-incompatible change. The walk never mutates
//! either document.
//!
//! ## Rules
//!
//! - Fields (and method arguments) are matched by numeric id. Names are not
//!   on the wire, so renames are free; a new id is free; a vanished id is not.
//! - Types must match exactly. `i32` to `i64` is a change. Containers are
//!   compared element by element.
//! - Requiredness follows [`RequirednessPolicy`].
//! - Methods are matched by name. A renamed method is a removed method.
//! - A type naming a struct, enum or typedef present on both sides is
//!   compared in place, once per run.
//! - Constants must still exist; their values may change.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::config::{Policy, RequirednessPolicy};
use crate::matcher::{match_by_name, Match};
use crate::model::{
    DeclarationKind, DeclarationRef, Document, Enum, Field, Method, Service, Struct, Type, Typedef,
};
use crate::report::{Context, FieldRole, Incompatibility, TypePosition, Verdict, Violation};

type Outcome = std::result::Result<(), Incompatibility>;

/// Compare two documents under `policy`
pub fn compare(policy: &Policy, old: &Document, new: &Document) -> Verdict {
    Comparator::new(policy, old, new).run()
}

/// One comparison run over a pair of documents
pub struct Comparator<'a> {
    policy: &'a Policy,
    old: &'a Document,
    new: &'a Document,
    /// Declarations already compared, or being compared further up the stack
    visited: HashSet<(DeclarationKind, &'a str)>,
}

impl<'a> Comparator<'a> {
    pub fn new(policy: &'a Policy, old: &'a Document, new: &'a Document) -> Self {
        Self {
            policy,
            old,
            new,
            visited: HashSet::new(),
        }
    }

    pub fn run(mut self) -> Verdict {
        debug!(
            old_declarations = self.old.len(),
            new_declarations = self.new.len(),
            "comparing documents"
        );
        let verdict = Verdict::from(self.compare_documents());
        debug!(visited = self.visited.len(), "comparison finished");
        verdict
    }

    fn compare_documents(&mut self) -> Outcome {
        let (old, new) = (self.old, self.new);

        self.compare_services()?;
        self.compare_struct_kind(DeclarationKind::Struct, &old.structs, &new.structs)?;
        self.compare_struct_kind(DeclarationKind::Exception, &old.exceptions, &new.exceptions)?;
        self.compare_struct_kind(DeclarationKind::Union, &old.unions, &new.unions)?;

        for m in match_by_name(&old.enums, &new.enums).matches {
            match m {
                Match::Paired { name, old, new } => self.compare_enum(name, old, new)?,
                Match::Unmatched { name, .. } => return Err(removed(DeclarationKind::Enum, name)),
            }
        }

        for m in match_by_name(&old.typedefs, &new.typedefs).matches {
            match m {
                Match::Paired { name, old, new } => self.compare_typedef(name, old, new)?,
                Match::Unmatched { name, .. } => return Err(removed(DeclarationKind::Typedef, name)),
            }
        }

        // Values are not on the wire; only presence matters
        if let Some(name) = match_by_name(&old.constants, &new.constants).unmatched().next() {
            return Err(removed(DeclarationKind::Constant, name));
        }

        Ok(())
    }

    fn compare_services(&mut self) -> Outcome {
        let (old, new) = (self.old, self.new);
        let matching = match_by_name(&old.services, &new.services);
        let mut claimed: HashSet<&str> = HashSet::new();

        for m in &matching.matches {
            match *m {
                Match::Paired { name, old, new } => self
                    .compare_methods(old, new)
                    .map_err(|e| e.within(declaration(DeclarationKind::Service, name)))?,
                Match::Unmatched { name, old } => {
                    if !self.policy.allow_service_rename {
                        return Err(removed(DeclarationKind::Service, name));
                    }

                    match self.find_renamed_service(old, &matching.added, &claimed) {
                        Ok(new_name) => {
                            info!(old = name, new = new_name, "service treated as renamed");
                            claimed.insert(new_name);
                        }
                        Err(Some(reason)) => {
                            return Err(reason.within(declaration(DeclarationKind::Service, name)))
                        }
                        Err(None) => return Err(removed(DeclarationKind::Service, name)),
                    }
                }
            }
        }

        Ok(())
    }

    /// First unclaimed new-only service that serves every method of `old`
    ///
    /// With a single candidate, its failure is returned so the report names
    /// the offending method rather than the whole service.
    fn find_renamed_service(
        &mut self,
        old: &'a Service,
        added: &[(&'a str, &'a Service)],
        claimed: &HashSet<&str>,
    ) -> std::result::Result<&'a str, Option<Incompatibility>> {
        let candidates: Vec<(&'a str, &'a Service)> = added
            .iter()
            .copied()
            .filter(|(name, _)| !claimed.contains(name))
            .collect();

        let mut failure = None;
        for &(name, candidate) in &candidates {
            let snapshot = self.visited.clone();
            match self.compare_methods(old, candidate) {
                Ok(()) => return Ok(name),
                Err(reason) => {
                    self.visited = snapshot;
                    if candidates.len() == 1 {
                        failure = Some(reason);
                    }
                }
            }
        }
        Err(failure)
    }

    fn compare_methods(&mut self, old: &'a Service, new: &'a Service) -> Outcome {
        for m in match_by_name(&old.methods, &new.methods).matches {
            match m {
                Match::Paired { name, old, new } => self.compare_method(old, new).map_err(|e| {
                    e.within(Context::Method {
                        name: name.to_string(),
                    })
                })?,
                Match::Unmatched { name, .. } => {
                    return Err(Violation::MethodRemoved {
                        name: name.to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    fn compare_method(&mut self, old: &'a Method, new: &'a Method) -> Outcome {
        if self.policy.check_oneway && old.oneway != new.oneway {
            return Err(Violation::OnewayChanged {
                old: old.oneway,
                new: new.oneway,
            }
            .into());
        }

        self.compare_type(&old.return_type, &new.return_type)
            .map_err(|e| e.within(Context::ReturnType))?;
        self.compare_fields(&old.arguments, &new.arguments, FieldRole::Argument)?;

        if self.policy.check_throws {
            self.compare_fields(&old.throws, &new.throws, FieldRole::Exception)?;
        }
        Ok(())
    }

    fn compare_struct_kind(
        &mut self,
        kind: DeclarationKind,
        old: &'a BTreeMap<String, Struct>,
        new: &'a BTreeMap<String, Struct>,
    ) -> Outcome {
        for m in match_by_name(old, new).matches {
            match m {
                Match::Paired { name, old, new } => self.compare_struct(kind, name, old, new)?,
                Match::Unmatched { name, .. } => return Err(removed(kind, name)),
            }
        }
        Ok(())
    }

    fn compare_struct(
        &mut self,
        kind: DeclarationKind,
        name: &'a str,
        old: &'a Struct,
        new: &'a Struct,
    ) -> Outcome {
        if !self.visited.insert((kind, name)) {
            return Ok(());
        }
        debug!(%kind, name, "comparing declaration");

        self.compare_fields(&old.fields, &new.fields, FieldRole::Field)
            .map_err(|e| e.within(declaration(kind, name)))
    }

    fn compare_enum(&mut self, name: &'a str, old: &'a Enum, new: &'a Enum) -> Outcome {
        if !self.visited.insert((DeclarationKind::Enum, name)) {
            return Ok(());
        }

        match old
            .values
            .iter()
            .find(|v| !new.values.iter().any(|n| n.value == v.value))
        {
            Some(missing) => Err(Incompatibility::from(Violation::EnumValueRemoved {
                name: missing.name.clone(),
                value: missing.value,
            })
            .within(declaration(DeclarationKind::Enum, name))),
            None => Ok(()),
        }
    }

    fn compare_typedef(&mut self, name: &'a str, old: &'a Typedef, new: &'a Typedef) -> Outcome {
        if !self.visited.insert((DeclarationKind::Typedef, name)) {
            return Ok(());
        }

        self.compare_type(&old.target, &new.target)
            .map_err(|e| e.within(declaration(DeclarationKind::Typedef, name)))
    }

    /// Id-matched comparison; fields only present on the new side are free
    fn compare_fields(&mut self, old: &'a [Field], new: &'a [Field], role: FieldRole) -> Outcome {
        for old_field in old {
            let Some(new_field) = new.iter().find(|f| f.id == old_field.id) else {
                let violation = match new.iter().find(|f| f.name == old_field.name) {
                    Some(moved) => Violation::FieldIdChanged {
                        role,
                        name: old_field.name.clone(),
                        old: old_field.id,
                        new: moved.id,
                    },
                    None => Violation::FieldRemoved {
                        role,
                        name: old_field.name.clone(),
                        id: old_field.id,
                    },
                };
                return Err(violation.into());
            };

            self.compare_field(old_field, new_field).map_err(|e| {
                e.within(Context::Field {
                    role,
                    name: old_field.name.clone(),
                    id: old_field.id,
                })
            })?;
        }
        Ok(())
    }

    fn compare_field(&mut self, old: &'a Field, new: &'a Field) -> Outcome {
        self.compare_type(&old.ty, &new.ty)?;

        match (self.policy.requiredness, old.optional, new.optional) {
            (RequirednessPolicy::OptionalToRequiredBreaks, true, false) => {
                return Err(Violation::RequirednessTightened.into())
            }
            (RequirednessPolicy::RequiredToOptionalBreaks, false, true) => {
                return Err(Violation::RequirednessLoosened.into())
            }
            _ => {}
        }

        if self.policy.check_defaults && old.default != new.default {
            return Err(Violation::DefaultChanged {
                old: old.default.as_ref().map(ToString::to_string),
                new: new.default.as_ref().map(ToString::to_string),
            }
            .into());
        }
        Ok(())
    }

    fn compare_type(&mut self, old: &'a Type, new: &'a Type) -> Outcome {
        match (old, new) {
            (Type::Named(old_name), Type::Named(new_name)) if old_name == new_name => {
                self.follow_reference(old_name)
            }
            (Type::Map { key: old_key, value: old_value }, Type::Map { key: new_key, value: new_value }) => {
                self.compare_nested(old_key, new_key, TypePosition::MapKey)?;
                self.compare_nested(old_value, new_value, TypePosition::MapValue)
            }
            (Type::List(old_element), Type::List(new_element)) => {
                self.compare_nested(old_element, new_element, TypePosition::ListElement)
            }
            (Type::Set(old_element), Type::Set(new_element)) => {
                self.compare_nested(old_element, new_element, TypePosition::SetElement)
            }
            _ if old.is_container() != new.is_container() => Err(Violation::TypeContainerMismatch {
                old: old.clone(),
                new: new.clone(),
            }
            .into()),
            _ => Err(Violation::TypeChanged {
                old: old.clone(),
                new: new.clone(),
            }
            .into()),
        }
    }

    fn compare_nested(&mut self, old: &'a Type, new: &'a Type, position: TypePosition) -> Outcome {
        self.compare_type(old, new)
            .map_err(|e| e.within(Context::Type { position }))
    }

    /// Compare the declaration a type name refers to, if both sides have it
    fn follow_reference(&mut self, name: &'a str) -> Outcome {
        if !self.policy.follow_references {
            return Ok(());
        }

        let (old, new) = (self.old, self.new);
        match (old.lookup(name), new.lookup(name)) {
            (Some(DeclarationRef::Struct(old_kind, old)), Some(DeclarationRef::Struct(new_kind, new)))
                if old_kind == new_kind =>
            {
                self.compare_struct(old_kind, name, old, new)
            }
            (Some(DeclarationRef::Enum(old)), Some(DeclarationRef::Enum(new))) => {
                self.compare_enum(name, old, new)
            }
            (Some(DeclarationRef::Typedef(old)), Some(DeclarationRef::Typedef(new))) => {
                self.compare_typedef(name, old, new)
            }
            // Scalars, or a declaration the top-level pass reports as removed
            _ => Ok(()),
        }
    }
}

fn declaration(kind: DeclarationKind, name: &str) -> Context {
    Context::Declaration {
        kind,
        name: name.to_string(),
    }
}

fn removed(kind: DeclarationKind, name: &str) -> Incompatibility {
    Violation::DeclarationRemoved {
        kind,
        name: name.to_string(),
    }
    .into()
}
