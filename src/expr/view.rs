//! View projection of result types
//!
//! A projectable result type declares named views, each listing the subset
//! of attributes rendered under that view. Projection narrows the type to the
//! attributes of one view. View names are checked before the compiler runs,
//! so an unknown view is reported as [`Error::UnresolvedView`].

use super::schema::{AttributeSchema, DataType, ObjectSchema, TypeLookup};
use crate::core::error::{Error, Result};

/// Name of the view every result type implicitly has
pub const DEFAULT_VIEW: &str = "default";

/// Projects `result` through the view `view`.
///
/// `result` must reference a named type, or be an array of one. Attributes
/// listed with a nested view are projected recursively.
pub fn project(
    result: &AttributeSchema,
    view: &str,
    types: &dyn TypeLookup,
) -> Result<AttributeSchema> {
    let type_name = match &result.data_type {
        DataType::User(name) => name,
        DataType::Array(elem) => {
            let mut projected = result.clone();
            projected.data_type = DataType::Array(Box::new(project(elem, view, types)?));
            return Ok(projected);
        }
        other => return Err(Error::unresolved_view(other.to_string(), view)),
    };

    let user_type = types.resolve(type_name)?;
    let resolved = user_type.attribute.resolve(types)?;
    let DataType::Object(object) = &resolved.data_type else {
        return Err(Error::unresolved_view(type_name.as_str(), view));
    };

    let selection = match user_type.view(view) {
        Some(selection) => selection,
        None if view == DEFAULT_VIEW => return Ok(resolved.clone()),
        None => return Err(Error::unresolved_view(type_name.as_str(), view)),
    };

    let mut projected = ObjectSchema::new();
    for (name, att) in object.iter() {
        let Some(listed) = selection.attributes.iter().find(|a| a.name == name) else {
            continue;
        };
        let att = match &listed.view {
            Some(nested) => project(att, nested, types)?,
            None => att.clone(),
        };
        projected.insert(name, att);
    }

    let mut validation = resolved.validation.clone();
    validation.required.retain(|r| projected.contains(r));
    Ok(AttributeSchema {
        data_type: DataType::Object(projected),
        description: resolved.description.clone(),
        default: None,
        validation,
    })
}

/// Views declared by the type `result` refers to, empty when the result is
/// not a projectable type.
pub fn view_names(result: &AttributeSchema, types: &dyn TypeLookup) -> Vec<String> {
    result
        .data_type
        .user_type_name()
        .and_then(|name| types.lookup(name))
        .map(|ut| ut.views.iter().map(|v| v.name.clone()).collect())
        .unwrap_or_default()
}
