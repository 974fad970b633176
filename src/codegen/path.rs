//! Path template compilation
//!
//! Each route of an endpoint compiles into a [`PathTemplate`]: a function
//! name, a positional format string where every wildcard segment reads
//! `/%v`, and one argument per wildcard in the order the wildcards appear.

use serde::Serialize;

use super::policy::{Location, StoragePolicy, storage_policy};
use crate::core::error::{Error, Result};
use crate::core::utils::goify;
use crate::expr::{AttributeSchema, DataType, EndpointRef, MappedAttribute, Primitive, TypeLookup};

pub use crate::expr::http::{WILDCARD_RE, extract_route_wildcards};

/// Separator used to join encoded slice elements
pub const SLICE_SEPARATOR: &str = ",";

/// Encoding of the elements of a slice-typed path or query argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceEncoding {
    /// Query-escaped string
    Escape,
    /// Base-10 integer
    Base10,
    /// Shortest decimal that parses back to the same float
    ShortestFloat,
    /// `true` / `false`
    Bool,
    /// Bytes read as a string then escaped
    Bytes,
    /// Any other value, converted to its string form
    Display,
}

impl SliceEncoding {
    pub fn for_primitive(primitive: Primitive) -> Self {
        match primitive {
            Primitive::String => SliceEncoding::Escape,
            Primitive::Bytes => SliceEncoding::Bytes,
            Primitive::Boolean => SliceEncoding::Bool,
            Primitive::Float32 | Primitive::Float64 => SliceEncoding::ShortestFloat,
            Primitive::Int
            | Primitive::Int32
            | Primitive::Int64
            | Primitive::UInt
            | Primitive::UInt32
            | Primitive::UInt64 => SliceEncoding::Base10,
            Primitive::Any => SliceEncoding::Display,
        }
    }

    /// Encoding of the elements of `att` when it is an array
    pub fn for_slice(att: &AttributeSchema, types: &dyn TypeLookup) -> Option<Self> {
        let resolved = att.resolve(types).ok()?;
        let DataType::Array(elem) = &resolved.data_type else {
            return None;
        };
        match &elem.resolve(types).ok()?.data_type {
            DataType::Primitive(p) => Some(Self::for_primitive(*p)),
            _ => Some(SliceEncoding::Display),
        }
    }
}

/// A value substituted into a path template
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue {
    String(String),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<PathValue>),
}

impl PathValue {
    /// Form of a non-slice argument: substituted as is
    fn direct(&self) -> String {
        match self {
            PathValue::String(s) => s.clone(),
            PathValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            PathValue::List(items) => encode_slice(items),
            other => other.element(),
        }
    }

    /// Form of a slice element
    fn element(&self) -> String {
        match self {
            PathValue::String(s) => escape(s),
            PathValue::Bytes(b) => escape(&String::from_utf8_lossy(b)),
            PathValue::Int(i) => i.to_string(),
            PathValue::UInt(u) => u.to_string(),
            PathValue::Float32(f) => f.to_string(),
            PathValue::Float(f) => f.to_string(),
            PathValue::Bool(b) => b.to_string(),
            PathValue::List(items) => encode_slice(items),
        }
    }
}

/// Query escaping: everything but ASCII alphanumerics and `-_.~` is
/// percent-encoded and spaces become `+`.
fn escape(s: &str) -> String {
    // form encoding keeps `*` and escapes `~`, the query table does the reverse
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Encodes slice elements and joins them with [`SLICE_SEPARATOR`].
pub fn encode_slice(items: &[PathValue]) -> String {
    items
        .iter()
        .map(PathValue::element)
        .collect::<Vec<_>>()
        .join(SLICE_SEPARATOR)
}

/// Argument of a path template function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathArgData {
    /// Logical name
    pub name: String,
    pub var_name: String,
    pub field_name: String,
    pub type_name: String,
    pub required: bool,
    pub policy: StoragePolicy,
    /// Set for slice arguments, which are encoded before substitution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceEncoding>,
}

/// Compiled path of one route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathTemplate {
    /// Name of the generated path function
    pub name: String,
    /// Full path pattern
    pub path: String,
    /// Positional template, one `%v` per wildcard
    pub format: String,
    pub args: Vec<PathArgData>,
}

impl PathTemplate {
    /// Compiles `path` using the path params of an endpoint.
    pub fn compile(
        name: impl Into<String>,
        path: &str,
        params: &MappedAttribute,
        types: &dyn TypeLookup,
    ) -> Result<Self> {
        let mut args = Vec::new();
        for wildcard in extract_route_wildcards(path) {
            let att = params
                .get(&wildcard)
                .ok_or_else(|| Error::unknown_attribute(wildcard.as_str()))?;
            let required = params.is_required(&wildcard);
            args.push(PathArgData {
                var_name: goify(&wildcard, false),
                field_name: goify(&wildcard, true),
                type_name: att.data_type.to_string(),
                required,
                policy: storage_policy(required, att.default.is_some(), Location::Path),
                slice: SliceEncoding::for_slice(att, types),
                name: wildcard,
            });
        }
        let format = WILDCARD_RE.replace_all(path, "/%v").into_owned();
        Ok(Self {
            name: name.into(),
            path: path.to_string(),
            format,
            args,
        })
    }

    /// Substitutes `values`, given in argument order, into the template.
    pub fn render(&self, values: &[PathValue]) -> Result<String> {
        if values.len() != self.args.len() {
            return Err(Error::TemplateArity {
                template: self.name.clone(),
                expected: self.args.len(),
                actual: values.len(),
            });
        }
        let mut rendered = String::with_capacity(self.format.len());
        let mut pieces = self.format.split("%v");
        if let Some(first) = pieces.next() {
            rendered.push_str(first);
        }
        for (piece, value) in pieces.zip(values) {
            rendered.push_str(&value.direct());
            rendered.push_str(piece);
        }
        Ok(rendered)
    }
}

/// Name of the path function of route `index` of an endpoint
pub fn path_function_name(service: &str, endpoint: &str, index: usize) -> String {
    let base = format!("{}{}Path", goify(endpoint, true), goify(service, true));
    if index == 0 { base } else { format!("{base}{index}") }
}

/// Path templates of every route of `ep`, in route order.
pub fn path_templates(ep: &EndpointRef<'_>) -> Result<Vec<PathTemplate>> {
    let params = ep.path_params();
    ep.full_paths()
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let name = path_function_name(&ep.service.name, &ep.endpoint.name, i);
            tracing::trace!("Compiling path template {name} for {path}");
            PathTemplate::compile(name, path, &params, ep.types())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ObjectSchema, Validation};
    use crate::expr::UserType;
    use indexmap::IndexMap;

    fn params(entries: &[(&str, AttributeSchema)]) -> MappedAttribute {
        let mut obj = ObjectSchema::new();
        for (name, att) in entries {
            obj.insert(*name, att.clone());
        }
        let required = entries.iter().map(|(n, _)| n.to_string()).collect();
        MappedAttribute::from_object(
            obj,
            Validation {
                required,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_template_argument_order() {
        let types: IndexMap<String, UserType> = IndexMap::new();
        // declared in the opposite order of the wildcards
        let params = params(&[
            ("view", AttributeSchema::string()),
            ("id", AttributeSchema::primitive(Primitive::Int32)),
        ]);
        let path = "/account/test/{id}/view/{view}";
        let template = PathTemplate::compile("ShowAccountPath", path, &params, &types).unwrap();
        assert_eq!(template.format, "/account/test/%v/view/%v");
        let names: Vec<&str> = template.args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "view"]);
        assert_eq!(template.args[0].type_name, "int32");

        let rendered = template
            .render(&[PathValue::Int(5), PathValue::String("x".to_string())])
            .unwrap();
        assert_eq!(rendered, "/account/test/5/view/x");
    }

    #[test]
    fn test_slice_encoding() {
        let ints = [PathValue::Int(1), PathValue::Int(2), PathValue::Int(3)];
        assert_eq!(encode_slice(&ints), "1,2,3");
        let bools = [PathValue::Bool(true), PathValue::Bool(false)];
        assert_eq!(encode_slice(&bools), "true,false");
        let floats = [PathValue::Float(1.5), PathValue::Float(2.0)];
        assert_eq!(encode_slice(&floats), "1.5,2");
        // each width prints its own shortest form
        let floats = [PathValue::Float32(0.1), PathValue::Float(0.1)];
        assert_eq!(encode_slice(&floats), "0.1,0.1");
        assert_eq!(encode_slice(&[PathValue::Float(0.1f32 as f64)]), "0.10000000149011612");
        let strings = [
            PathValue::String("a b".to_string()),
            PathValue::String("c/d".to_string()),
        ];
        assert_eq!(encode_slice(&strings), "a+b,c%2Fd");
        let marks = [PathValue::String("a*b~c".to_string())];
        assert_eq!(encode_slice(&marks), "a%2Ab~c");
    }

    #[test]
    fn test_slice_argument() {
        let types: IndexMap<String, UserType> = IndexMap::new();
        let params = params(&[(
            "sliceInt",
            AttributeSchema::array_of(AttributeSchema::primitive(Primitive::Int)),
        )]);
        let template = PathTemplate::compile("P", "/test/{sliceInt}", &params, &types).unwrap();
        assert_eq!(template.args[0].slice, Some(SliceEncoding::Base10));
        let value = PathValue::List(vec![PathValue::Int(1), PathValue::Int(2), PathValue::Int(3)]);
        assert_eq!(template.render(&[value]).unwrap(), "/test/1,2,3");
    }

    #[test]
    fn test_render_arity_mismatch() {
        let types: IndexMap<String, UserType> = IndexMap::new();
        let params = params(&[("id", AttributeSchema::string())]);
        let template = PathTemplate::compile("P", "/{id}", &params, &types).unwrap();
        assert!(matches!(
            template.render(&[]),
            Err(Error::TemplateArity { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_wildcard_is_internal() {
        let types: IndexMap<String, UserType> = IndexMap::new();
        let err = PathTemplate::compile("P", "/{id}", &MappedAttribute::new(), &types).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_path_function_name() {
        assert_eq!(path_function_name("account", "show", 0), "ShowAccountPath");
        assert_eq!(path_function_name("account", "show", 1), "ShowAccountPath1");
    }

    #[test]
    fn test_optional_path_param_policy() {
        let types: IndexMap<String, UserType> = IndexMap::new();
        let mut obj = ObjectSchema::new();
        obj.insert("id", AttributeSchema::string());
        let params = MappedAttribute::from_object(obj, Validation::default());
        let template = PathTemplate::compile("P", "/{id}", &params, &types).unwrap();
        assert!(template.args[0].policy.field_pointer);
        assert!(!template.args[0].policy.wire_pointer);
    }
}
