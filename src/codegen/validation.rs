//! Validation code synthesis
//!
//! Walks attributes and lists the checks a generated validator performs, in
//! a fixed order per attribute. Named object types are validated by their
//! own function, which nested checks call.

use serde::Serialize;
use serde_json::{Value as JsonValue, json};

use crate::core::utils::goify;
use crate::expr::{AttributeSchema, DataType, TypeLookup};

/// Root name used in the error paths of body validators
pub const BODY_ROOT: &str = "body";

/// The constraint a check enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Required,
    Enum,
    Format,
    Pattern,
    MinLength,
    MaxLength,
    Minimum,
    ExclusiveMinimum,
    Maximum,
    ExclusiveMaximum,
    /// Call the validator of a named type
    Nested,
}

/// One check on one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckData {
    /// Error path of the checked value, `[*]` standing for array indices and
    /// `key` / `[key]` for map keys and values.
    pub path: String,
    pub kind: CheckKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    /// Validator called by [`CheckKind::Nested`] checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl CheckData {
    fn new(path: &str, kind: CheckKind, value: Option<JsonValue>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            value,
            function: None,
        }
    }
}

/// Validator generated for a type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidateData {
    pub name: String,
    pub type_name: String,
    pub checks: Vec<CheckData>,
}

/// `Validate` followed by the identifier of the type
pub fn validate_function_name(type_name: &str) -> String {
    format!("Validate{}", goify(type_name, true))
}

/// Whether `att`, directly or through nested types, carries a constraint.
pub fn needs_validation(att: &AttributeSchema, types: &dyn TypeLookup) -> bool {
    needs_validation_rec(att, types, &mut Vec::new())
}

fn needs_validation_rec(
    att: &AttributeSchema,
    types: &dyn TypeLookup,
    seen: &mut Vec<String>,
) -> bool {
    if att.validation.constrains_value() || !att.validation.required.is_empty() {
        return true;
    }
    match &att.data_type {
        DataType::Primitive(_) => false,
        DataType::Array(elem) => needs_validation_rec(elem, types, seen),
        DataType::Map { key, elem } => {
            needs_validation_rec(key, types, seen) || needs_validation_rec(elem, types, seen)
        }
        DataType::Object(obj) => obj.iter().any(|(_, f)| needs_validation_rec(f, types, seen)),
        DataType::User(name) => {
            if seen.iter().any(|s| s == name) {
                return false;
            }
            let Some(user_type) = types.lookup(name) else {
                return false;
            };
            seen.push(name.clone());
            needs_validation_rec(&user_type.attribute, types, seen)
        }
    }
}

/// Checks applied to the value at `path`, `required` telling whether its
/// parent requires it.
pub fn attribute_checks(
    att: &AttributeSchema,
    path: &str,
    required: bool,
    types: &dyn TypeLookup,
) -> Vec<CheckData> {
    let mut checks = Vec::new();
    collect_checks(att, path, required, types, &mut Vec::new(), &mut checks);
    checks
}

fn collect_checks(
    att: &AttributeSchema,
    path: &str,
    required: bool,
    types: &dyn TypeLookup,
    aliases: &mut Vec<String>,
    out: &mut Vec<CheckData>,
) {
    if required {
        out.push(CheckData::new(path, CheckKind::Required, None));
    }

    if let DataType::User(name) = &att.data_type {
        let Some(user_type) = types.lookup(name) else {
            return;
        };
        if user_type.attribute.is_object(types) {
            if needs_validation(att, types) {
                out.push(CheckData {
                    function: Some(validate_function_name(name)),
                    ..CheckData::new(path, CheckKind::Nested, None)
                });
            }
        } else if !aliases.iter().any(|a| a == name) {
            aliases.push(name.clone());
            collect_checks(&user_type.attribute, path, false, types, aliases, out);
            aliases.pop();
        }
        return;
    }

    value_checks(att, path, out);

    match &att.data_type {
        DataType::Array(elem) => {
            collect_checks(elem, &format!("{path}[*]"), false, types, aliases, out);
        }
        DataType::Map { key, elem } => {
            collect_checks(key, &format!("{path}.key"), false, types, aliases, out);
            collect_checks(elem, &format!("{path}[key]"), false, types, aliases, out);
        }
        DataType::Object(obj) => {
            for (name, field) in obj.iter() {
                let child = format!("{path}.{name}");
                let required = att.validation.is_required(name);
                collect_checks(field, &child, required, types, aliases, out);
            }
        }
        DataType::Primitive(_) | DataType::User(_) => {}
    }
}

fn value_checks(att: &AttributeSchema, path: &str, out: &mut Vec<CheckData>) {
    let v = &att.validation;
    if !v.values.is_empty() {
        out.push(CheckData::new(path, CheckKind::Enum, Some(JsonValue::Array(v.values.clone()))));
    }
    if let Some(format) = v.format {
        out.push(CheckData::new(path, CheckKind::Format, serde_json::to_value(format).ok()));
    }
    if let Some(pattern) = &v.pattern {
        out.push(CheckData::new(path, CheckKind::Pattern, Some(json!(pattern))));
    }
    if let Some(min) = v.min_length {
        out.push(CheckData::new(path, CheckKind::MinLength, Some(json!(min))));
    }
    if let Some(max) = v.max_length {
        out.push(CheckData::new(path, CheckKind::MaxLength, Some(json!(max))));
    }
    if let Some(min) = v.minimum {
        out.push(CheckData::new(path, CheckKind::Minimum, Some(json!(min))));
    }
    if let Some(min) = v.exclusive_minimum {
        out.push(CheckData::new(path, CheckKind::ExclusiveMinimum, Some(json!(min))));
    }
    if let Some(max) = v.maximum {
        out.push(CheckData::new(path, CheckKind::Maximum, Some(json!(max))));
    }
    if let Some(max) = v.exclusive_maximum {
        out.push(CheckData::new(path, CheckKind::ExclusiveMaximum, Some(json!(max))));
    }
}

/// Validator of the type `type_name` defined by `attribute`, or `None` when
/// nothing in the type is constrained.
pub fn validate_data(
    type_name: &str,
    attribute: &AttributeSchema,
    types: &dyn TypeLookup,
) -> Option<ValidateData> {
    if !needs_validation(attribute, types) {
        return None;
    }
    let resolved = attribute.resolve(types).ok()?;
    let mut checks = Vec::new();
    match &resolved.data_type {
        DataType::Object(obj) => {
            for (name, field) in obj.iter() {
                let path = format!("{BODY_ROOT}.{name}");
                let required = resolved.validation.is_required(name);
                checks.extend(attribute_checks(field, &path, required, types));
            }
        }
        _ => checks = attribute_checks(resolved, BODY_ROOT, false, types),
    }
    if checks.is_empty() {
        return None;
    }
    tracing::trace!("Type {type_name} validated by {} check(s)", checks.len());
    Some(ValidateData {
        name: validate_function_name(type_name),
        type_name: type_name.to_string(),
        checks,
    })
}
