//! Object schemas with a logical-name to wire-name mapping
//!
//! Headers, params and bodies address attributes by the name they carry on the
//! wire while the payload and result types use logical names. A
//! [`MappedAttribute`] keeps both views of the same object consistent.
//!
//! The external representation of a mapping is an object whose keys read
//! `logical:wire` whenever the two names differ.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::schema::{AttributeSchema, DataType, ObjectSchema, Validation};
use crate::core::error::{Error, Result};

/// An object schema augmented with a logical/wire name bijection.
///
/// `name_map` only holds explicit mappings, attributes without one use their
/// logical name on the wire. `reverse_map` is always the exact inverse of
/// `name_map` and every key of `name_map` is an attribute of `schema`.
/// [`map`](Self::map) and [`merge`](Self::merge) keep wire names unique.
/// An object read with two keys sharing a wire name is accepted as is and
/// reported by [`duplicate_wire_names`](Self::duplicate_wire_names).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttributeSchema", into = "AttributeSchema")]
pub struct MappedAttribute {
    schema: ObjectSchema,
    validation: Validation,
    description: Option<String>,
    name_map: HashMap<String, String>,
    reverse_map: HashMap<String, String>,
}

impl MappedAttribute {
    /// Create an empty mapped attribute
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapped attribute from an object, splitting `logical:wire` keys.
    pub fn from_object(object: ObjectSchema, validation: Validation) -> Self {
        let mut mapped = MappedAttribute::new();
        for (key, attribute) in object.iter() {
            let (logical, wire) = split_key(key);
            mapped.schema.insert(logical, attribute.clone());
            if logical != wire {
                mapped.name_map.insert(logical.to_string(), wire.to_string());
                mapped.reverse_map.insert(wire.to_string(), logical.to_string());
            }
        }
        for name in &validation.required {
            let (logical, _) = split_key(name);
            mapped.validation.add_required(logical);
        }
        mapped.validation.merge(&Validation {
            required: Vec::new(),
            ..validation
        });
        mapped
    }

    /// Record that attribute `logical` travels as `wire`. Fails if another
    /// attribute already travels as `wire`.
    pub fn map(&mut self, wire: &str, logical: &str) -> Result<()> {
        if !self.schema.contains(logical) {
            return Err(Error::unknown_attribute(logical));
        }
        if let Some(owner) = self.wire_owner(wire).filter(|owner| *owner != logical) {
            return Err(Error::DuplicateWireName {
                wire: wire.to_string(),
                owner: owner.to_string(),
            });
        }
        if let Some(previous) = self.name_map.remove(logical) {
            self.reverse_map.remove(&previous);
        }
        if wire != logical {
            self.name_map.insert(logical.to_string(), wire.to_string());
            self.reverse_map.insert(wire.to_string(), logical.to_string());
        }
        Ok(())
    }

    /// Remove an attribute together with its mapping and required flag.
    pub fn delete(&mut self, logical: &str) {
        self.schema.remove(logical);
        if let Some(wire) = self.name_map.remove(logical) {
            self.reverse_map.remove(&wire);
        }
        self.validation.remove_required(logical);
    }

    /// Wire name of the attribute with logical name `logical`
    pub fn elem_name(&self, logical: &str) -> Result<&str> {
        if let Some(wire) = self.name_map.get(logical) {
            return Ok(wire);
        }
        self.schema
            .get_key(logical)
            .ok_or_else(|| Error::unknown_attribute(logical))
    }

    /// Logical name of the attribute carried as `wire`
    pub fn key_name(&self, wire: &str) -> Result<&str> {
        if let Some(logical) = self.reverse_map.get(wire) {
            return Ok(logical);
        }
        if self.name_map.contains_key(wire) {
            return Err(Error::unknown_attribute(wire));
        }
        self.schema
            .get_key(wire)
            .ok_or_else(|| Error::unknown_attribute(wire))
    }

    /// Merge `other` into `self`. Attributes of `other` replace attributes of
    /// `self` with the same logical name or the same wire name, including
    /// their requiredness.
    pub fn merge(&mut self, other: &MappedAttribute) {
        for (name, attribute) in other.schema.iter() {
            let wire = other.name_map.get(name).map(String::as_str).unwrap_or(name);
            if let Some(owner) = self.wire_owner(wire).map(str::to_string) {
                self.delete(&owner);
            }
            self.delete(name);
            self.schema.insert(name, attribute.clone());
            if other.validation.is_required(name) {
                self.validation.add_required(name);
            }
            if let Some(wire) = other.name_map.get(name) {
                self.name_map.insert(name.to_string(), wire.clone());
                self.reverse_map.insert(wire.clone(), name.to_string());
            }
        }
    }

    /// External representation: an object keyed by `logical:wire`.
    pub fn attribute(&self) -> AttributeSchema {
        let object: ObjectSchema = self
            .schema
            .iter()
            .map(|(name, attribute)| {
                let key = match self.name_map.get(name) {
                    Some(wire) => format!("{name}:{wire}"),
                    None => name.to_string(),
                };
                (key, attribute.clone())
            })
            .collect();
        AttributeSchema {
            data_type: DataType::Object(object),
            description: self.description.clone(),
            default: None,
            validation: self.validation.clone(),
        }
    }

    /// Object schema keyed by logical names
    pub fn object(&self) -> &ObjectSchema {
        &self.schema
    }

    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    pub fn get(&self, logical: &str) -> Option<&AttributeSchema> {
        self.schema.get(logical)
    }

    /// Mutable access to an attribute; the name mapping is unaffected.
    pub fn get_mut(&mut self, logical: &str) -> Option<&mut AttributeSchema> {
        self.schema.get_mut(logical)
    }

    /// Replace or add an attribute under its logical name
    pub fn insert(&mut self, logical: &str, attribute: AttributeSchema, required: bool) {
        self.schema.insert(logical, attribute);
        if required {
            self.validation.add_required(logical);
        } else {
            self.validation.remove_required(logical);
        }
    }

    pub fn contains(&self, logical: &str) -> bool {
        self.schema.contains(logical)
    }

    pub fn is_required(&self, logical: &str) -> bool {
        self.validation.is_required(logical)
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn len(&self) -> usize {
        self.schema.len()
    }

    /// Logical names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schema.keys()
    }

    /// `(logical, wire, attribute)` triples ordered by wire name.
    ///
    /// Every emission of wire elements goes through this ordering so
    /// generated output does not depend on declaration order.
    pub fn sorted_by_wire(&self) -> Vec<(&str, &str, &AttributeSchema)> {
        let mut entries: Vec<(&str, &str, &AttributeSchema)> = self
            .schema
            .iter()
            .map(|(name, attribute)| {
                let wire = self.name_map.get(name).map(String::as_str).unwrap_or(name);
                (name, wire, attribute)
            })
            .collect();
        entries.sort_by(|a, b| a.1.cmp(b.1));
        entries
    }

    /// Wire names carried by more than one attribute, sorted
    pub fn duplicate_wire_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = BTreeSet::new();
        for (_, wire, _) in self.sorted_by_wire() {
            if !seen.insert(wire) {
                duplicates.insert(wire.to_string());
            }
        }
        duplicates.into_iter().collect()
    }

    /// Logical name of the attribute currently travelling as `wire`
    fn wire_owner(&self, wire: &str) -> Option<&str> {
        if let Some(logical) = self.reverse_map.get(wire) {
            return Some(logical);
        }
        if self.name_map.contains_key(wire) {
            return None;
        }
        self.schema.get_key(wire)
    }

    /// Delete every attribute of `other` present in `self`
    pub fn remove_all(&mut self, other: &MappedAttribute) {
        for name in other.names() {
            self.delete(name);
        }
    }
}

fn split_key(key: &str) -> (&str, &str) {
    match key.split_once(':') {
        Some((logical, wire)) => (logical.trim(), wire.trim()),
        None => (key, key),
    }
}

impl TryFrom<AttributeSchema> for MappedAttribute {
    type Error = Error;

    fn try_from(attribute: AttributeSchema) -> Result<Self> {
        match attribute.data_type {
            DataType::Object(object) => {
                let mut mapped = MappedAttribute::from_object(object, attribute.validation);
                mapped.description = attribute.description;
                Ok(mapped)
            }
            other => Err(Error::IncompatibleTypes {
                source_type: other.to_string(),
                target_type: "object".to_string(),
            }),
        }
    }
}

impl From<MappedAttribute> for AttributeSchema {
    fn from(mapped: MappedAttribute) -> Self {
        mapped.attribute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::schema::Primitive;

    fn headers() -> MappedAttribute {
        let mut obj = ObjectSchema::new();
        obj.insert("token:Authorization", AttributeSchema::string());
        obj.insert("request_id:X-Request-Id", AttributeSchema::string());
        obj.insert("version", AttributeSchema::primitive(Primitive::Int));
        MappedAttribute::from_object(
            obj,
            Validation {
                required: vec!["token:Authorization".to_string(), "version".to_string()],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_from_object_splits_keys() {
        let mapped = headers();
        assert_eq!(
            mapped.names().collect::<Vec<_>>(),
            vec!["token", "request_id", "version"]
        );
        assert!(mapped.is_required("token"));
        assert!(mapped.is_required("version"));
        assert!(!mapped.is_required("request_id"));
        assert_eq!(mapped.elem_name("token").unwrap(), "Authorization");
        assert_eq!(mapped.elem_name("version").unwrap(), "version");
    }

    #[test]
    fn test_name_mapping_inverse_law() {
        let mapped = headers();
        for logical in mapped.names() {
            let wire = mapped.elem_name(logical).unwrap();
            assert_eq!(mapped.key_name(wire).unwrap(), logical);
        }
        for wire in ["Authorization", "X-Request-Id", "version"] {
            let logical = mapped.key_name(wire).unwrap();
            assert_eq!(mapped.elem_name(logical).unwrap(), wire);
        }
    }

    #[test]
    fn test_unknown_names_fail() {
        let mapped = headers();
        assert!(matches!(
            mapped.elem_name("missing"),
            Err(Error::UnknownAttribute(_))
        ));
        assert!(matches!(
            mapped.key_name("missing"),
            Err(Error::UnknownAttribute(_))
        ));
        // a logical name with an explicit mapping is not a wire name
        assert!(mapped.key_name("token").is_err());
    }

    #[test]
    fn test_map_requires_known_attribute() {
        let mut mapped = headers();
        assert!(mapped.map("X-Version", "version").is_ok());
        assert_eq!(mapped.elem_name("version").unwrap(), "X-Version");
        assert_eq!(mapped.key_name("X-Version").unwrap(), "version");

        assert!(mapped.map("X-Token", "token").is_ok());
        assert!(mapped.key_name("Authorization").is_err());

        assert!(mapped.map("X-Nope", "nope").is_err());
    }

    #[test]
    fn test_delete_removes_required_and_mapping() {
        let mut mapped = headers();
        mapped.delete("token");
        assert!(!mapped.contains("token"));
        assert!(!mapped.is_required("token"));
        assert!(mapped.key_name("Authorization").is_err());
        assert!(mapped.validation().required.iter().all(|r| mapped.contains(r)));
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = headers();
        let mut obj = ObjectSchema::new();
        obj.insert("version:X-Api-Version", AttributeSchema::string());
        obj.insert("trace", AttributeSchema::string());
        let other = MappedAttribute::from_object(
            obj,
            Validation {
                required: vec!["trace".to_string()],
                ..Default::default()
            },
        );

        base.merge(&other);
        assert_eq!(base.len(), 4);
        assert_eq!(base.elem_name("version").unwrap(), "X-Api-Version");
        assert_eq!(
            base.get("version").unwrap().data_type,
            DataType::Primitive(Primitive::String)
        );
        assert!(!base.is_required("version"));
        assert!(base.is_required("trace"));
        assert!(base.is_required("token"));
    }

    #[test]
    fn test_map_rejects_taken_wire_name() {
        let mut mapped = headers();
        let err = mapped.map("Authorization", "request_id").unwrap_err();
        assert!(matches!(err, Error::DuplicateWireName { ref owner, .. } if owner == "token"));
        assert!(!err.is_internal());
        // an unmapped attribute owns its logical name on the wire
        assert!(mapped.map("version", "token").is_err());
        // remapping an attribute to its current wire name is a no-op
        assert!(mapped.map("Authorization", "token").is_ok());

        assert_eq!(mapped.elem_name("request_id").unwrap(), "X-Request-Id");
        assert_eq!(mapped.key_name("Authorization").unwrap(), "token");
        assert!(mapped.duplicate_wire_names().is_empty());
    }

    #[test]
    fn test_merge_replaces_same_wire_name() {
        let mut base = headers();
        let mut obj = ObjectSchema::new();
        obj.insert("auth:Authorization", AttributeSchema::string());
        let other = MappedAttribute::from_object(obj, Validation::default());

        base.merge(&other);
        assert!(!base.contains("token"));
        assert!(!base.is_required("token"));
        assert_eq!(base.key_name("Authorization").unwrap(), "auth");
        assert_eq!(base.elem_name("auth").unwrap(), "Authorization");
        let wires: Vec<&str> = base.sorted_by_wire().iter().map(|e| e.1).collect();
        assert_eq!(wires, vec!["Authorization", "X-Request-Id", "version"]);
        assert!(base.duplicate_wire_names().is_empty());
    }

    #[test]
    fn test_duplicate_wire_names_in_object() {
        let mut obj = ObjectSchema::new();
        obj.insert("a:W", AttributeSchema::string());
        obj.insert("b:W", AttributeSchema::string());
        obj.insert("c", AttributeSchema::string());
        obj.insert("d:c", AttributeSchema::string());
        let mapped = MappedAttribute::from_object(obj, Validation::default());
        assert_eq!(mapped.duplicate_wire_names(), vec!["W".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_sorted_by_wire() {
        let mapped = headers();
        let wires: Vec<&str> = mapped.sorted_by_wire().iter().map(|e| e.1).collect();
        assert_eq!(wires, vec!["Authorization", "X-Request-Id", "version"]);
    }

    #[test]
    fn test_attribute_round_trip() {
        let mapped = headers();
        let attribute = mapped.attribute();
        let obj = match &attribute.data_type {
            DataType::Object(obj) => obj,
            other => panic!("expected object, got {other}"),
        };
        assert!(obj.contains("token:Authorization"));
        assert!(obj.contains("version"));
        assert_eq!(MappedAttribute::try_from(attribute).unwrap(), mapped);
    }

    #[test]
    fn test_non_object_is_rejected() {
        let result = MappedAttribute::try_from(AttributeSchema::string());
        assert!(matches!(result, Err(Error::IncompatibleTypes { .. })));
    }
}
