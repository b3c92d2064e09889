//! Declaration trees and the merged Document
//!
//! These types mirror what the external IDL parser hands over: one
//! [`FileTree`] per parsed file, with every include already resolved. The
//! merger folds a side's trees into a single [`Document`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the return type of a method that returns nothing
pub const VOID: &str = "void";

/// Kind of a top-level declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Typedef,
    Constant,
    Enum,
    Struct,
    Exception,
    Union,
    Service,
}

impl DeclarationKind {
    /// Keyword used for this kind in messages
    pub fn keyword(&self) -> &'static str {
        match self {
            DeclarationKind::Typedef => "typedef",
            DeclarationKind::Constant => "const",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Struct => "struct",
            DeclarationKind::Exception => "exception",
            DeclarationKind::Union => "union",
            DeclarationKind::Service => "service",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Violations of the declaration-tree invariants
///
/// These indicate a defect in whatever produced the tree, never a
/// compatibility verdict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("container type '{container}' is missing its {position} type")]
    MissingSubtype {
        container: String,
        position: &'static str,
    },

    #[error("type '{name}' cannot carry a {position} type")]
    UnexpectedSubtype { name: String, position: &'static str },

    #[error("{owner} uses field id {id} more than once")]
    DuplicateFieldId { owner: String, id: i32 },

    #[error("{kind} '{name}' is indexed under the key '{key}'")]
    KeyMismatch {
        kind: &'static str,
        key: String,
        name: String,
    },
}

/// A field, argument or return type
///
/// Container kinds always carry their element types, so a `map` without a
/// key type cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawType", into = "RawType")]
pub enum Type {
    /// A scalar (`i32`, `string`, ...) or a reference to a named declaration
    Named(String),
    Map { key: Box<Type>, value: Box<Type> },
    List(Box<Type>),
    Set(Box<Type>),
}

impl Type {
    /// A scalar or declaration name; containers go through [`Type::map`],
    /// [`Type::list`] and [`Type::set`]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(
            !is_container_tag(&name),
            "container type '{}' built without its element types",
            name
        );
        Type::Named(name)
    }

    pub fn void() -> Self {
        Type::Named(VOID.to_string())
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn set(element: Type) -> Self {
        Type::Set(Box::new(element))
    }

    /// The type tag: the scalar or declaration name, or the container kind
    pub fn name(&self) -> &str {
        match self {
            Type::Named(name) => name,
            Type::Map { .. } => "map",
            Type::List(_) => "list",
            Type::Set(_) => "set",
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Type::Named(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Named(name) => f.write_str(name),
            Type::Map { key, value } => write!(f, "map<{},{}>", key, value),
            Type::List(element) => write!(f, "list<{}>", element),
            Type::Set(element) => write!(f, "set<{}>", element),
        }
    }
}

fn is_container_tag(name: &str) -> bool {
    matches!(name, "map" | "list" | "set")
}

/// Loose type shape as emitted by the parser: `{name, key?, value?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<RawType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<RawType>>,
}

impl TryFrom<RawType> for Type {
    type Error = ModelError;

    fn try_from(raw: RawType) -> Result<Self, Self::Error> {
        let RawType { name, key, value } = raw;

        let required = |sub: Option<Box<RawType>>, position: &'static str, container: &str| {
            sub.ok_or_else(|| ModelError::MissingSubtype {
                container: container.to_string(),
                position,
            })
            .and_then(|raw| Type::try_from(*raw))
        };

        match name.as_str() {
            "map" => {
                let key = required(key, "key", &name)?;
                let value = required(value, "value", &name)?;
                Ok(Type::map(key, value))
            }
            "list" | "set" => {
                if key.is_some() {
                    return Err(ModelError::UnexpectedSubtype { name, position: "key" });
                }
                let element = required(value, "value", &name)?;
                if name == "list" {
                    Ok(Type::list(element))
                } else {
                    Ok(Type::set(element))
                }
            }
            _ => {
                if key.is_some() {
                    return Err(ModelError::UnexpectedSubtype { name, position: "key" });
                }
                if value.is_some() {
                    return Err(ModelError::UnexpectedSubtype { name, position: "value" });
                }
                Ok(Type::Named(name))
            }
        }
    }
}

impl From<Type> for RawType {
    fn from(ty: Type) -> Self {
        match ty {
            Type::Named(name) => RawType {
                name,
                key: None,
                value: None,
            },
            Type::Map { key, value } => RawType {
                name: "map".to_string(),
                key: Some(Box::new(RawType::from(*key))),
                value: Some(Box::new(RawType::from(*value))),
            },
            Type::List(element) => RawType {
                name: "list".to_string(),
                key: None,
                value: Some(Box::new(RawType::from(*element))),
            },
            Type::Set(element) => RawType {
                name: "set".to_string(),
                key: None,
                value: Some(Box::new(RawType::from(*element))),
            },
        }
    }
}

/// Literal payload of a default value or constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConstValue {
    Int(i64),
    Double(f64),
    String(String),
    /// Reference to another constant or an enum value
    Identifier(String),
    List(Vec<ConstValue>),
    Map(Vec<(ConstValue, ConstValue)>),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Double(v) => write!(f, "{}", v),
            ConstValue::String(v) => write!(f, "\"{}\"", v),
            ConstValue::Identifier(v) => f.write_str(v),
            ConstValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ConstValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Whether a field must always be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requiredness {
    Required,
    Optional,
}

impl fmt::Display for Requiredness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requiredness::Required => f.write_str("required"),
            Requiredness::Optional => f.write_str("optional"),
        }
    }
}

/// A struct member, method argument or declared exception
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Wire identity, unique within the enclosing list
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConstValue>,
}

impl Field {
    /// Create a required field
    pub fn new(id: i32, name: impl Into<String>, ty: Type) -> Self {
        Self {
            id,
            name: name.into(),
            optional: false,
            ty,
            default: None,
        }
    }

    /// Mark the field optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn requiredness(&self) -> Requiredness {
        if self.optional {
            Requiredness::Optional
        } else {
            Requiredness::Required
        }
    }
}

/// Shape shared by structs, exceptions and unions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub oneway: bool,
    #[serde(default = "Type::void")]
    pub return_type: Type,
    #[serde(default)]
    pub arguments: Vec<Field>,
    #[serde(default)]
    pub throws: Vec<Field>,
}

impl Method {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            oneway: false,
            return_type,
            arguments: Vec::new(),
            throws: Vec::new(),
        }
    }

    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    pub fn argument(mut self, argument: Field) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn throws(mut self, exception: Field) -> Self {
        self.throws.push(exception);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub methods: BTreeMap<String, Method>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.insert(method.name.clone(), method);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    #[serde(default)]
    pub values: Vec<EnumValue>,
}

impl Enum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: i32) -> Self {
        self.values.push(EnumValue {
            name: name.into(),
            value,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typedef {
    pub name: String,
    #[serde(rename = "type")]
    pub target: Type,
}

impl Typedef {
    pub fn new(name: impl Into<String>, target: Type) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub value: ConstValue,
}

impl Constant {
    pub fn new(name: impl Into<String>, ty: Type, value: ConstValue) -> Self {
        Self {
            name: name.into(),
            ty,
            value,
        }
    }
}

/// One parsed IDL file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileTree {
    /// Path of the source file, relative to the include root
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default)]
    pub typedefs: BTreeMap<String, Typedef>,
    #[serde(default)]
    pub constants: BTreeMap<String, Constant>,
    #[serde(default)]
    pub enums: BTreeMap<String, Enum>,
    #[serde(default)]
    pub structs: BTreeMap<String, Struct>,
    #[serde(default)]
    pub exceptions: BTreeMap<String, Struct>,
    #[serde(default)]
    pub unions: BTreeMap<String, Struct>,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl FileTree {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Base name of the source file, used to pair files across sides
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.path)
    }

    pub fn with_typedef(mut self, typedef: Typedef) -> Self {
        self.typedefs.insert(typedef.name.clone(), typedef);
        self
    }

    pub fn with_constant(mut self, constant: Constant) -> Self {
        self.constants.insert(constant.name.clone(), constant);
        self
    }

    pub fn with_enum(mut self, value: Enum) -> Self {
        self.enums.insert(value.name.clone(), value);
        self
    }

    pub fn with_struct(mut self, value: Struct) -> Self {
        self.structs.insert(value.name.clone(), value);
        self
    }

    pub fn with_exception(mut self, value: Struct) -> Self {
        self.exceptions.insert(value.name.clone(), value);
        self
    }

    pub fn with_union(mut self, value: Struct) -> Self {
        self.unions.insert(value.name.clone(), value);
        self
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.insert(service.name.clone(), service);
        self
    }
}

impl FileTree {
    /// Check the invariants serde cannot express: map keys agree with the
    /// declared names, and field ids are unique within each field list.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_keys(DeclarationKind::Typedef, &self.typedefs, |t| &t.name)?;
        check_keys(DeclarationKind::Constant, &self.constants, |c| &c.name)?;
        check_keys(DeclarationKind::Enum, &self.enums, |e| &e.name)?;

        for (kind, structs) in [
            (DeclarationKind::Struct, &self.structs),
            (DeclarationKind::Exception, &self.exceptions),
            (DeclarationKind::Union, &self.unions),
        ] {
            check_keys(kind, structs, |s| &s.name)?;
            for s in structs.values() {
                check_field_ids(&s.fields, || format!("{} '{}'", kind, s.name))?;
            }
        }

        check_keys(DeclarationKind::Service, &self.services, |s| &s.name)?;
        for service in self.services.values() {
            for (key, method) in &service.methods {
                if *key != method.name {
                    return Err(ModelError::KeyMismatch {
                        kind: "method",
                        key: key.clone(),
                        name: method.name.clone(),
                    });
                }
                let owner = || format!("method '{}.{}'", service.name, method.name);
                check_field_ids(&method.arguments, owner)?;
                check_field_ids(&method.throws, owner)?;
            }
        }

        Ok(())
    }
}

fn check_keys<T, F>(kind: DeclarationKind, entries: &BTreeMap<String, T>, name_of: F) -> Result<(), ModelError>
where
    F: Fn(&T) -> &String,
{
    match entries.iter().find(|(key, entry)| *key != name_of(*entry)) {
        Some((key, entry)) => Err(ModelError::KeyMismatch {
            kind: kind.keyword(),
            key: key.clone(),
            name: name_of(entry).clone(),
        }),
        None => Ok(()),
    }
}

fn check_field_ids(fields: &[Field], owner: impl Fn() -> String) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    match fields.iter().find(|f| !seen.insert(f.id)) {
        Some(field) => Err(ModelError::DuplicateFieldId {
            owner: owner(),
            id: field.id,
        }),
        None => Ok(()),
    }
}

/// A declaration found by name, see [`Document::lookup`]
#[derive(Debug, Clone, Copy)]
pub enum DeclarationRef<'a> {
    Struct(DeclarationKind, &'a Struct),
    Enum(&'a Enum),
    Typedef(&'a Typedef),
}

impl DeclarationRef<'_> {
    pub fn kind(&self) -> DeclarationKind {
        match self {
            DeclarationRef::Struct(kind, _) => *kind,
            DeclarationRef::Enum(_) => DeclarationKind::Enum,
            DeclarationRef::Typedef(_) => DeclarationKind::Typedef,
        }
    }
}

/// All declarations of one schema version, indexed by name per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub typedefs: BTreeMap<String, Typedef>,
    #[serde(default)]
    pub constants: BTreeMap<String, Constant>,
    #[serde(default)]
    pub enums: BTreeMap<String, Enum>,
    #[serde(default)]
    pub structs: BTreeMap<String, Struct>,
    #[serde(default)]
    pub exceptions: BTreeMap<String, Struct>,
    #[serde(default)]
    pub unions: BTreeMap<String, Struct>,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl Document {
    /// Resolve a type name to a struct-like, enum or typedef declaration
    pub fn lookup(&self, name: &str) -> Option<DeclarationRef<'_>> {
        if let Some(s) = self.structs.get(name) {
            return Some(DeclarationRef::Struct(DeclarationKind::Struct, s));
        }
        if let Some(s) = self.exceptions.get(name) {
            return Some(DeclarationRef::Struct(DeclarationKind::Exception, s));
        }
        if let Some(s) = self.unions.get(name) {
            return Some(DeclarationRef::Struct(DeclarationKind::Union, s));
        }
        if let Some(e) = self.enums.get(name) {
            return Some(DeclarationRef::Enum(e));
        }
        self.typedefs.get(name).map(DeclarationRef::Typedef)
    }

    /// Total number of top-level declarations
    pub fn len(&self) -> usize {
        self.typedefs.len()
            + self.constants.len()
            + self.enums.len()
            + self.structs.len()
            + self.exceptions.len()
            + self.unions.len()
            + self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_map_requires_key_and_value() {
        let raw: RawType = serde_json::from_value(serde_json::json!({
            "name": "map",
            "value": { "name": "string" }
        }))
        .unwrap();

        let err = Type::try_from(raw).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingSubtype {
                container: "map".to_string(),
                position: "key"
            }
        );
    }

    #[test]
    fn test_scalar_rejects_subtypes() {
        let result: Result<Type, _> = serde_json::from_value(serde_json::json!({
            "name": "i32",
            "value": { "name": "string" }
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("cannot carry a value type"), "{}", err);
    }

    #[test]
    fn test_list_rejects_key() {
        let raw = RawType {
            name: "list".to_string(),
            key: Some(Box::new(RawType {
                name: "i32".to_string(),
                key: None,
                value: None,
            })),
            value: Some(Box::new(RawType {
                name: "i32".to_string(),
                key: None,
                value: None,
            })),
        };
        assert!(matches!(
            Type::try_from(raw),
            Err(ModelError::UnexpectedSubtype { position: "key", .. })
        ));
    }

    #[test]
    fn test_nested_container_from_json() {
        let ty: Type = serde_json::from_value(serde_json::json!({
            "name": "map",
            "key": { "name": "string" },
            "value": { "name": "list", "value": { "name": "Item" } }
        }))
        .unwrap();

        assert_eq!(ty, Type::map(Type::named("string"), Type::list(Type::named("Item"))));
        assert_eq!(ty.to_string(), "map<string,list<Item>>");
        assert!(ty.is_container());
        assert_eq!(ty.name(), "map");
    }

    #[test]
    fn test_method_defaults_to_void() {
        let method: Method = serde_json::from_value(serde_json::json!({ "name": "ping" })).unwrap();
        assert_eq!(method.return_type, Type::void());
        assert!(!method.oneway);
        assert!(method.arguments.is_empty());
    }

    #[test]
    fn test_const_value_display() {
        let value = ConstValue::Map(vec![(
            ConstValue::String("a".to_string()),
            ConstValue::List(vec![ConstValue::Int(1), ConstValue::Identifier("Color.RED".to_string())]),
        )]);
        assert_eq!(value.to_string(), "{\"a\": [1, Color.RED]}");
    }

    #[test]
    fn test_lookup_by_kind() {
        let doc = Document {
            exceptions: [("Oops".to_string(), Struct::new("Oops"))].into_iter().collect(),
            typedefs: [("UserId".to_string(), Typedef::new("UserId", Type::named("i64")))]
                .into_iter()
                .collect(),
            ..Document::default()
        };

        assert_eq!(doc.lookup("Oops").map(|d| d.kind()), Some(DeclarationKind::Exception));
        assert_eq!(doc.lookup("UserId").map(|d| d.kind()), Some(DeclarationKind::Typedef));
        assert!(doc.lookup("i32").is_none());
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_field_ids_unique_per_list() {
        let method = Method::new("get", Type::void())
            .argument(Field::new(1, "id", Type::named("i64")))
            .throws(Field::new(1, "missing", Type::named("NotFound")));
        let tree = FileTree::new("api.thrift").with_service(Service::new("Api").method(method.clone()));
        assert!(tree.validate().is_ok());

        let repeated = method.argument(Field::new(1, "again", Type::named("i32")));
        let tree = FileTree::new("api.thrift").with_service(Service::new("Api").method(repeated));
        assert_eq!(
            tree.validate().unwrap_err().to_string(),
            "method 'Api.get' uses field id 1 more than once"
        );
    }

    #[test]
    fn test_method_key_must_match_name() {
        let mut service = Service::new("Api");
        service
            .methods
            .insert("ping".to_string(), Method::new("pong", Type::void()));
        let tree = FileTree::new("api.thrift").with_service(service);

        assert_eq!(
            tree.validate(),
            Err(ModelError::KeyMismatch {
                kind: "method",
                key: "ping".to_string(),
                name: "pong".to_string(),
            })
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "built without its element types")]
    fn test_named_rejects_container_tag() {
        let _ = Type::named("list");
    }

    #[test]
    fn test_file_name_strips_directories() {
        let tree = FileTree::new("shared/common/base.thrift");
        assert_eq!(tree.file_name(), "base.thrift");
    }
}
