//! Synthesizes and deploys a CloudFormation stack that hosts a static website:
//! an S3 bucket read through a CloudFront origin access identity, a
//! viewer-request CloudFront Function, an existing ACM certificate and a
//! Route 53 alias record.

pub mod config;
pub mod deploy;
pub mod error;
pub mod lookup;
pub mod provider;
pub mod regions;
pub mod resources;
pub mod stack;
pub mod template;
pub mod variables;

pub use config::{Environment, StackConfig};
pub use error::{Error, Result};
pub use lookup::{ContextCache, HostedZone, HostedZoneLookup, HostedZoneQuery};
pub use resources::static_website::{required_lookups, StaticWebsite};
pub use stack::Stack;
pub use template::Template;
pub use variables::Variables;
