//! Schema model: attributes, objects, arrays, maps, validations and named types
//!
//! Named types are referenced by name ([`DataType::User`]) and resolved through
//! a [`TypeLookup`], which keeps recursive types representable without shared
//! ownership.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::error::{Error, Result};

/// Maximum number of user type aliases followed before giving up.
const MAX_ALIAS_DEPTH: usize = 64;

/// Primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Int,
    Int32,
    Int64,
    UInt,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Any,
}

impl Primitive {
    /// Design name of the primitive
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt => "uint",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
            Primitive::Any => "any",
        }
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Primitive::Int | Primitive::Int32 | Primitive::Int64)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, Primitive::UInt | Primitive::UInt32 | Primitive::UInt64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer() || self.is_float()
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five shapes a type can take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Primitive(Primitive),
    Array(Box<AttributeSchema>),
    Map {
        key: Box<AttributeSchema>,
        elem: Box<AttributeSchema>,
    },
    Object(ObjectSchema),
    /// Reference to a named type
    User(String),
}

impl DataType {
    /// Name of the referenced user type, if any
    pub fn user_type_name(&self) -> Option<&str> {
        match self {
            DataType::User(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Primitive(p) => write!(f, "{p}"),
            DataType::Array(elem) => write!(f, "array<{}>", elem.data_type),
            DataType::Map { key, elem } => {
                write!(f, "map<{}, {}>", key.data_type, elem.data_type)
            }
            DataType::Object(obj) => {
                let names: Vec<&str> = obj.keys().collect();
                write!(f, "object{{{}}}", names.join(", "))
            }
            DataType::User(name) => f.write_str(name),
        }
    }
}

/// Ordered set of named attributes. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectSchema(IndexMap<String, AttributeSchema>);

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute, keeping the position of a replaced one
    pub fn insert(&mut self, name: impl Into<String>, attribute: AttributeSchema) {
        self.0.insert(name.into(), attribute);
    }

    /// Remove an attribute, preserving the order of the others
    pub fn remove(&mut self, name: &str) -> Option<AttributeSchema> {
        self.0.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeSchema> {
        self.0.get_mut(name)
    }

    /// The stored key equal to `name`
    pub fn get_key(&self, name: &str) -> Option<&str> {
        self.0.get_key_value(name).map(|(k, _)| k.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeSchema)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut AttributeSchema)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AttributeSchema)> for ObjectSchema {
    fn from_iter<I: IntoIterator<Item = (String, AttributeSchema)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// String formats understood by format checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Date,
    DateTime,
    Uuid,
    Email,
    Hostname,
    Ipv4,
    Ipv6,
    Ip,
    Uri,
    Mac,
    Cidr,
    Regexp,
    Json,
    Rfc1123,
}

/// Constraint set attached to an attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validation {
    /// Names of required child attributes (object types only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        self == &Validation::default()
    }

    /// Whether any constraint applies to the value itself, ignoring the
    /// required list which constrains children.
    pub fn constrains_value(&self) -> bool {
        !Validation {
            required: Vec::new(),
            ..self.clone()
        }
        .is_empty()
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    pub fn add_required(&mut self, name: &str) {
        if !self.is_required(name) {
            self.required.push(name.to_string());
        }
    }

    pub fn remove_required(&mut self, name: &str) {
        self.required.retain(|r| r != name);
    }

    /// Merge `other` into `self`; `other` wins on scalar constraints and the
    /// required lists are unioned.
    pub fn merge(&mut self, other: &Validation) {
        for name in &other.required {
            self.add_required(name);
        }
        if !other.values.is_empty() {
            self.values = other.values.clone();
        }
        self.format = other.format.or(self.format);
        if other.pattern.is_some() {
            self.pattern = other.pattern.clone();
        }
        self.minimum = other.minimum.or(self.minimum);
        self.maximum = other.maximum.or(self.maximum);
        self.exclusive_minimum = other.exclusive_minimum.or(self.exclusive_minimum);
        self.exclusive_maximum = other.exclusive_maximum.or(self.exclusive_maximum);
        self.min_length = other.min_length.or(self.min_length);
        self.max_length = other.max_length.or(self.max_length);
    }
}

/// A typed attribute with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Validation::is_empty")]
    pub validation: Validation,
}

impl AttributeSchema {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            description: None,
            default: None,
            validation: Validation::default(),
        }
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self::new(DataType::Primitive(primitive))
    }

    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }

    pub fn array_of(elem: AttributeSchema) -> Self {
        Self::new(DataType::Array(Box::new(elem)))
    }

    pub fn map_of(key: AttributeSchema, elem: AttributeSchema) -> Self {
        Self::new(DataType::Map {
            key: Box::new(key),
            elem: Box::new(elem),
        })
    }

    pub fn object(object: ObjectSchema) -> Self {
        Self::new(DataType::Object(object))
    }

    /// Reference to the named type `name`
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(DataType::User(name.into()))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Mark the given child attributes as required
    pub fn require<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.validation.add_required(name.as_ref());
        }
        self
    }

    /// Follows user type references down to the attribute that defines the
    /// shape.
    pub fn resolve<'t>(&'t self, types: &'t dyn TypeLookup) -> Result<&'t AttributeSchema> {
        let mut current = self;
        for _ in 0..MAX_ALIAS_DEPTH {
            match &current.data_type {
                DataType::User(name) => current = &types.resolve(name)?.attribute,
                _ => return Ok(current),
            }
        }
        Err(Error::UnresolvedType(self.data_type.to_string()))
    }

    /// The object shape of this attribute, looking through user types
    pub fn as_object<'t>(&'t self, types: &'t dyn TypeLookup) -> Option<&'t ObjectSchema> {
        match &self.resolve(types).ok()?.data_type {
            DataType::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_object(&self, types: &dyn TypeLookup) -> bool {
        self.as_object(types).is_some()
    }

    pub fn is_primitive(&self, types: &dyn TypeLookup) -> bool {
        matches!(
            self.resolve(types).map(|a| &a.data_type),
            Ok(DataType::Primitive(_))
        )
    }

    pub fn is_array(&self, types: &dyn TypeLookup) -> bool {
        matches!(
            self.resolve(types).map(|a| &a.data_type),
            Ok(DataType::Array(_))
        )
    }

    pub fn is_map(&self, types: &dyn TypeLookup) -> bool {
        matches!(
            self.resolve(types).map(|a| &a.data_type),
            Ok(DataType::Map { .. })
        )
    }

    /// Whether `name` is required, consulting the user type this attribute
    /// refers to as well.
    pub fn is_required(&self, name: &str, types: &dyn TypeLookup) -> bool {
        if self.validation.is_required(name) {
            return true;
        }
        self.resolve(types)
            .map(|a| a.validation.is_required(name))
            .unwrap_or(false)
    }
}

/// A named field selection over a result type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewExpr {
    pub name: String,
    pub attributes: Vec<ViewAttribute>,
}

impl ViewExpr {
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }
}

/// Attribute listed in a view, optionally rendered through a nested view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl ViewAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: None,
        }
    }
}

/// Named type. A user type with views is a projectable result type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserType {
    /// Filled from the type table key when omitted
    #[serde(default)]
    pub name: String,
    pub attribute: AttributeSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewExpr>,
}

impl UserType {
    pub fn new(name: impl Into<String>, attribute: AttributeSchema) -> Self {
        Self {
            name: name.into(),
            attribute,
            views: Vec::new(),
        }
    }

    pub fn with_views(mut self, views: Vec<ViewExpr>) -> Self {
        self.views = views;
        self
    }

    pub fn is_projectable(&self) -> bool {
        !self.views.is_empty()
    }

    pub fn view(&self, name: &str) -> Option<&ViewExpr> {
        self.views.iter().find(|v| v.name == name)
    }
}

/// Resolves named type references
pub trait TypeLookup {
    fn lookup(&self, name: &str) -> Option<&UserType>;

    fn resolve(&self, name: &str) -> Result<&UserType> {
        self.lookup(name)
            .ok_or_else(|| Error::UnresolvedType(name.to_string()))
    }
}

impl TypeLookup for IndexMap<String, UserType> {
    fn lookup(&self, name: &str) -> Option<&UserType> {
        self.get(name)
    }
}
