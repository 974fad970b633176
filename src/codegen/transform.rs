//! Structural transforms between wire types and logical types
//!
//! Decoded bodies use synthesized types that mirror the logical types
//! field by field. A [`TransformPlan`] describes how to rebuild the logical
//! value from the wire value. Conversions between two distinct named types
//! become helper functions, created once per service and reused.

use std::collections::HashSet;

use serde::Serialize;

use super::context::ServiceScope;
use super::policy::{Location, storage_policy};
use crate::core::error::{Error, Result};
use crate::core::utils::goify;
use crate::expr::{AttributeSchema, DataType, Primitive, TypeLookup};

/// How to build a target value from a source value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformPlan {
    /// Same shape, assign as is
    Assign,
    Object { fields: Vec<FieldTransform> },
    Array { elem: Box<TransformPlan> },
    Map {
        key: Box<TransformPlan>,
        elem: Box<TransformPlan>,
    },
    /// Call the named helper
    Helper { name: String },
}

/// Transform of one field shared by the source and target objects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldTransform {
    pub name: String,
    pub field_name: String,
    pub source_pointer: bool,
    pub target_pointer: bool,
    pub plan: TransformPlan,
}

/// Function converting between two named types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformHelper {
    pub name: String,
    pub source_type: String,
    pub target_type: String,
    pub plan: TransformPlan,
}

/// `unmarshal<Source>To<Target>`
pub fn helper_name(source: &str, target: &str) -> String {
    format!("unmarshal{}To{}", goify(source, true), goify(target, true))
}

/// Plans the conversion of `source` into `target`, registering the helpers
/// it needs with `scope`.
pub fn transform(
    scope: &mut ServiceScope<'_>,
    source: &AttributeSchema,
    target: &AttributeSchema,
) -> Result<TransformPlan> {
    Transformer {
        scope,
        pending: HashSet::new(),
    }
    .plan(source, target)
}

struct Transformer<'s, 'a> {
    scope: &'s mut ServiceScope<'a>,
    pending: HashSet<String>,
}

impl Transformer<'_, '_> {
    fn plan(
        &mut self,
        source: &AttributeSchema,
        target: &AttributeSchema,
    ) -> Result<TransformPlan> {
        if let (DataType::User(s), DataType::User(t)) = (&source.data_type, &target.data_type) {
            if s == t {
                return Ok(TransformPlan::Assign);
            }
            return self.helper(s, t);
        }

        let src = source.resolve(&*self.scope)?.clone();
        let tgt = target.resolve(&*self.scope)?.clone();
        match (&src.data_type, &tgt.data_type) {
            (DataType::Primitive(a), DataType::Primitive(b)) if a == b || *b == Primitive::Any => {
                Ok(TransformPlan::Assign)
            }
            (DataType::Array(s), DataType::Array(t)) => Ok(TransformPlan::Array {
                elem: Box::new(self.plan(s, t)?),
            }),
            (DataType::Map { key: sk, elem: se }, DataType::Map { key: tk, elem: te }) => {
                Ok(TransformPlan::Map {
                    key: Box::new(self.plan(sk, tk)?),
                    elem: Box::new(self.plan(se, te)?),
                })
            }
            (DataType::Object(s), DataType::Object(t)) => {
                let mut fields = Vec::new();
                for (name, target_field) in t.iter() {
                    let Some(source_field) = s.get(name) else {
                        continue;
                    };
                    let plan = self.plan(source_field, target_field)?;
                    fields.push(FieldTransform {
                        name: name.to_string(),
                        field_name: goify(name, true),
                        source_pointer: pointer(&src, name, source_field),
                        target_pointer: pointer(&tgt, name, target_field),
                        plan,
                    });
                }
                Ok(TransformPlan::Object { fields })
            }
            (s, t) => Err(Error::IncompatibleTypes {
                source_type: s.to_string(),
                target_type: t.to_string(),
            }),
        }
    }

    fn helper(&mut self, source: &str, target: &str) -> Result<TransformPlan> {
        let name = helper_name(source, target);
        if self.scope.has_helper(&name) || !self.pending.insert(name.clone()) {
            return Ok(TransformPlan::Helper { name });
        }

        let source_att = self.scope.resolve(source)?.attribute.clone();
        let target_att = self.scope.resolve(target)?.attribute.clone();
        let plan = self.plan(&source_att, &target_att)?;
        tracing::trace!("Transform helper {name} created");
        self.scope.add_helper(TransformHelper {
            name: name.clone(),
            source_type: source.to_string(),
            target_type: target.to_string(),
            plan,
        });
        self.pending.remove(&name);
        Ok(TransformPlan::Helper { name })
    }
}

fn pointer(parent: &AttributeSchema, name: &str, field: &AttributeSchema) -> bool {
    let required = parent.validation.is_required(name);
    storage_policy(required, field.default.is_some(), Location::Body).field_pointer
}
