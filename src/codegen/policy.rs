//! Pointer and value storage of attributes
//!
//! Every decision on whether a generated field or decoded wire value is held
//! by pointer goes through [`storage_policy`].

use serde::Serialize;

/// Where an attribute travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Body,
    Path,
    Query,
    Header,
}

/// Conversion between a wire value and the field it is stored into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Glue {
    /// Assign as is
    None,
    /// Store the address of a decoded value into a pointer field
    AddressOf,
    /// Read a pointer field into a value
    Dereference,
}

/// Storage of one attribute on both sides of the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoragePolicy {
    /// The logical field is a pointer
    pub field_pointer: bool,
    /// The decoded wire value is a pointer
    pub wire_pointer: bool,
}

impl StoragePolicy {
    /// Glue needed when a decoded value is stored into the field
    pub fn decode_glue(&self) -> Glue {
        match (self.wire_pointer, self.field_pointer) {
            (false, true) => Glue::AddressOf,
            (true, false) => Glue::Dereference,
            _ => Glue::None,
        }
    }

    /// Glue needed when the field is read to encode the wire value
    pub fn encode_glue(&self) -> Glue {
        match (self.field_pointer, self.wire_pointer) {
            (true, false) => Glue::Dereference,
            (false, true) => Glue::AddressOf,
            _ => Glue::None,
        }
    }
}

/// Storage policy of an attribute.
///
/// An attribute is held by pointer exactly when it is neither required nor
/// defaulted. Path segments are always present so their wire value is never
/// a pointer, even when the field is.
pub fn storage_policy(required: bool, has_default: bool, location: Location) -> StoragePolicy {
    let field_pointer = !required && !has_default;
    let wire_pointer = match location {
        Location::Path => false,
        Location::Body | Location::Query | Location::Header => field_pointer,
    };
    StoragePolicy {
        field_pointer,
        wire_pointer,
    }
}
