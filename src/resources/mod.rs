use serde::Serialize;
use serde_json::Value;

pub use crate::error::{Error, Result};
pub use crate::stack::{RemovalPolicy, ResourceOptions, Stack};
pub use crate::template::{get_att, get_ref, join, sub, CfnResource, StrVal};

pub mod iam;
pub use iam::*;
pub mod lambda;
pub use lambda::*;
pub mod s3_bucket;
pub use s3_bucket::*;
pub mod cloudfront;
pub use cloudfront::*;
pub mod certificate;
pub use certificate::*;
pub mod route53;
pub use route53::*;

// higher level resources:
pub mod static_website;
pub use static_website::*;

/// Properties of a typed resource struct. These structs only hold strings,
/// bools, numbers and lists, so serialization cannot fail.
pub(crate) fn to_properties<T: Serialize>(resource: &T) -> Value {
    serde_json::to_value(resource).unwrap_or_default()
}
