//! Design expressions: the finalized model the compiler consumes

pub mod http;
pub mod mapped;
pub mod schema;
pub mod validate;
pub mod view;

pub use http::{
    ApiExpr, BodyDecl, EndpointExpr, EndpointRef, ErrorExpr, ResponseExpr, RouteExpr, ServiceExpr,
    Tag, Verb, extract_route_wildcards,
};
pub use mapped::MappedAttribute;
pub use schema::{
    AttributeSchema, DataType, Format, ObjectSchema, Primitive, TypeLookup, UserType, Validation,
    ViewAttribute, ViewExpr,
};
pub use validate::{DesignError, ValidationErrors};
