//! Document merging
//!
//! Folds every parsed file of one schema version into a single
//! name-indexed [`Document`]. Two files declaring the same name within the
//! same kind make the input set ill-formed and abort the merge, as does a
//! tree that breaks the model invariants (see [`FileTree::validate`]).

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{CompatError, Result};
use crate::model::{DeclarationKind, Document, FileTree};

/// Merge the parsed files of one side into a Document
pub fn merge<I>(trees: I) -> Result<Document>
where
    I: IntoIterator<Item = FileTree>,
{
    let mut merger = Merger::default();
    for tree in trees {
        merger.absorb(tree)?;
    }

    let document = merger.document;
    debug!(
        declarations = document.len(),
        structs = document.structs.len(),
        services = document.services.len(),
        "merged document"
    );
    Ok(document)
}

#[derive(Default)]
struct Merger {
    document: Document,
    /// Originating file of every declaration absorbed so far
    origins: BTreeMap<(DeclarationKind, String), String>,
}

impl Merger {
    fn absorb(&mut self, tree: FileTree) -> Result<()> {
        debug!(file = %tree.path, "absorbing declaration tree");
        tree.validate()?;

        let FileTree {
            path,
            typedefs,
            constants,
            enums,
            structs,
            exceptions,
            unions,
            services,
            ..
        } = tree;

        insert_all(&mut self.origins, &path, DeclarationKind::Typedef, typedefs, &mut self.document.typedefs)?;
        insert_all(&mut self.origins, &path, DeclarationKind::Constant, constants, &mut self.document.constants)?;
        insert_all(&mut self.origins, &path, DeclarationKind::Enum, enums, &mut self.document.enums)?;
        insert_all(&mut self.origins, &path, DeclarationKind::Struct, structs, &mut self.document.structs)?;
        insert_all(&mut self.origins, &path, DeclarationKind::Exception, exceptions, &mut self.document.exceptions)?;
        insert_all(&mut self.origins, &path, DeclarationKind::Union, unions, &mut self.document.unions)?;
        insert_all(&mut self.origins, &path, DeclarationKind::Service, services, &mut self.document.services)?;

        Ok(())
    }
}

fn insert_all<T>(
    origins: &mut BTreeMap<(DeclarationKind, String), String>,
    path: &str,
    kind: DeclarationKind,
    from: BTreeMap<String, T>,
    into: &mut BTreeMap<String, T>,
) -> Result<()> {
    for (name, declaration) in from {
        let key = (kind, name);
        if let Some(first) = origins.get(&key) {
            return Err(CompatError::DuplicateDeclaration {
                kind,
                name: key.1,
                first: first.clone(),
                second: path.to_string(),
            });
        }
        into.insert(key.1.clone(), declaration);
        origins.insert(key, path.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, ModelError, Service, Struct, Type, Typedef};

    #[test]
    fn test_merge_combines_files() {
        let base = FileTree::new("base.thrift")
            .with_struct(Struct::new("User").field(Field::new(1, "id", Type::named("i64"))))
            .with_typedef(Typedef::new("UserId", Type::named("i64")));
        let api = FileTree::new("api.thrift").with_service(Service::new("UserService"));

        let doc = merge(vec![base, api]).unwrap();

        assert!(doc.structs.contains_key("User"));
        assert!(doc.typedefs.contains_key("UserId"));
        assert!(doc.services.contains_key("UserService"));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_duplicate_within_kind_is_rejected() {
        let a = FileTree::new("a.thrift").with_struct(Struct::new("User"));
        let b = FileTree::new("b.thrift").with_struct(Struct::new("User"));

        match merge(vec![a, b]) {
            Err(CompatError::DuplicateDeclaration { kind, name, first, second }) => {
                assert_eq!(kind, DeclarationKind::Struct);
                assert_eq!(name, "User");
                assert_eq!(first, "a.thrift");
                assert_eq!(second, "b.thrift");
            }
            other => panic!("Expected DuplicateDeclaration, got {:?}", other),
        }
    }

    #[test]
    fn test_same_name_in_different_kinds_is_allowed() {
        let a = FileTree::new("a.thrift").with_struct(Struct::new("Thing"));
        let b = FileTree::new("b.thrift").with_exception(Struct::new("Thing"));

        let doc = merge(vec![a, b]).unwrap();
        assert!(doc.structs.contains_key("Thing"));
        assert!(doc.exceptions.contains_key("Thing"));
    }

    #[test]
    fn test_repeated_field_id_is_rejected() {
        let tree = FileTree::new("a.thrift").with_struct(
            Struct::new("Foo")
                .field(Field::new(1, "a", Type::named("i32")))
                .field(Field::new(1, "b", Type::named("i64"))),
        );

        match merge(vec![tree]) {
            Err(CompatError::Model(ModelError::DuplicateFieldId { owner, id })) => {
                assert_eq!(owner, "struct 'Foo'");
                assert_eq!(id, 1);
            }
            other => panic!("Expected DuplicateFieldId, got {:?}", other),
        }
    }

    #[test]
    fn test_mislabelled_entry_is_rejected() {
        let tree: FileTree = serde_json::from_value(serde_json::json!({
            "path": "a.thrift",
            "structs": { "Foo": { "name": "Bar" } }
        }))
        .unwrap();

        let err = merge(vec![tree]).unwrap_err();
        assert!(matches!(
            err,
            CompatError::Model(ModelError::KeyMismatch { kind: "struct", .. })
        ));
        assert_eq!(
            err.to_string(),
            "Malformed declaration tree: struct 'Bar' is indexed under the key 'Foo'"
        );
    }

    #[test]
    fn test_namespaces_are_not_merged() {
        let mut a = FileTree::new("a.thrift");
        a.namespaces.insert("go".to_string(), "a".to_string());
        let mut b = FileTree::new("b.thrift");
        b.namespaces.insert("go".to_string(), "b".to_string());

        assert!(merge(vec![a, b]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_document() {
        assert!(merge(Vec::new()).unwrap().is_empty());
    }
}
