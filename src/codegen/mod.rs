//! Transport code synthesis
//!
//! Turns a finalized [`crate::expr::ApiExpr`] into per-service data: body
//! types, constructors, transforms, validators, path templates and response
//! tables. Renderers consume the result through [`RenderContext`].

pub mod body;
pub mod context;
pub mod init;
pub mod path;
pub mod policy;
pub mod render;
pub mod response;
pub mod service;
pub mod transform;
pub mod validation;

pub use body::{BodyData, ViewBodyData};
pub use context::{BuildContext, ServiceScope, TypeRegistry, TypeStore};
pub use init::{InitArgData, InitData};
pub use path::{PathTemplate, PathValue, SliceEncoding, encode_slice};
pub use policy::{Glue, Location, StoragePolicy, storage_policy};
pub use render::RenderContext;
pub use response::{ErrorData, ErrorGroupData, ResponseData, TagData};
pub use service::{
    EndpointData, FieldData, HeaderData, ParamData, PayloadData, ResultData, RouteData,
    ServiceData, TypeData, compile,
};
pub use transform::{TransformHelper, TransformPlan};
pub use validation::{CheckData, CheckKind, ValidateData};
