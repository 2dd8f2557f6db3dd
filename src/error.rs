use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading configuration, building the
/// stack, or talking to AWS.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more required variables are empty
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),

    #[error("Invalid region code {region:?}\nMust be one of {valid:?}")]
    InvalidRegion {
        region: String,
        valid: &'static [&'static str],
    },

    #[error("Invalid account id {0:?}\nMust be exactly 12 digits")]
    InvalidAccount(String),

    /// The credentials in use belong to another account than `ACCOUNT`
    #[error("Credentials belong to account {actual}, but ACCOUNT is {expected}")]
    AccountMismatch { expected: String, actual: String },

    #[error("Failed to parse {path:?} line {line}: {reason}")]
    DotEnv {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid stack name {name}\n{reason}")]
    InvalidStackName { name: String, reason: &'static str },

    #[error("Invalid resource name {name:?}\n{reason}")]
    InvalidLogicalId { name: String, reason: &'static str },

    #[error("Resource '{0}' is declared twice in the same stack")]
    DuplicateLogicalId(String),

    #[error("Invalid bucket name {name:?}\n{reason}")]
    InvalidBucketName { name: String, reason: &'static str },

    #[error("Invalid certificate ARN {arn:?}: {reason}")]
    InvalidCertificateArn { arn: String, reason: String },

    #[error("Function code is {size} bytes, CloudFront Functions allow at most {max}")]
    FunctionCodeTooLarge { size: usize, max: usize },

    #[error("Failed to read asset {path:?}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Hosted zone lookup for {domain:?} failed: {reason}")]
    HostedZoneLookup { domain: String, reason: String },

    /// A lookup was needed during synthesis but has not been resolved yet
    #[error("No cached value for context key '{0}'. Run synth without --no-lookups to resolve it")]
    MissingContext(String),

    /// Options that are individually valid but cannot be combined
    #[error("Invalid configuration for '{resource}': {reason}")]
    InvalidResource { resource: String, reason: String },

    #[error("Validation failed on resource '{name}'\n{source}")]
    ResourceValidation {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to serialize template: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error returned by an AWS API call
    #[error("AWS error: {0}")]
    Aws(String),

    #[error("Stack {stack} failed: {reason}")]
    StackFailed { stack: String, reason: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_resource(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidResource {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}
