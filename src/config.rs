//! Explicit configuration for the static website stack.
//!
//! Every value the stack reads comes through [`StackConfig`]. It is built from a
//! [`Variables`] snapshot, so nothing in the constructor reaches into the
//! process environment on its own.
//!
//! # Variables
//!
//! - `ACCOUNT` - target AWS account id
//! - `REGION` - target AWS region
//! - `RECORD_NAME` - DNS name the site is served from, eg: `www.example.com`
//! - `DOMAIN_NAME` - hosted zone to look up, eg: `example.com`
//! - `BUCKET_NAME` - physical name of the asset bucket
//! - `CERT_ARN` - ACM certificate (in us-east-1) covering `RECORD_NAME`

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::regions::verify_region;
use crate::variables::Variables;

pub const DEFAULT_STACK_NAME: &str = "GdbStaticBasicStack";
pub const DEFAULT_FUNCTION_ASSET: &str = "assets/redirect.js";

pub const ACCOUNT: &str = "ACCOUNT";
pub const REGION: &str = "REGION";
pub const RECORD_NAME: &str = "RECORD_NAME";
pub const DOMAIN_NAME: &str = "DOMAIN_NAME";
pub const BUCKET_NAME: &str = "BUCKET_NAME";
pub const CERT_ARN: &str = "CERT_ARN";

/// Where the stack gets deployed. Either field may be empty, in which case the
/// AWS default provider chain decides at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub env: Environment,
    pub stack_name: String,
    pub record_name: String,
    pub domain_name: String,
    pub bucket_name: String,
    pub cert_arn: String,
    /// path to the viewer-request function source
    pub function_asset: PathBuf,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            stack_name: DEFAULT_STACK_NAME.to_string(),
            record_name: String::new(),
            domain_name: String::new(),
            bucket_name: String::new(),
            cert_arn: String::new(),
            function_asset: PathBuf::from(DEFAULT_FUNCTION_ASSET),
        }
    }
}

impl StackConfig {
    /// Reads the recognized variables. Unset variables become empty strings;
    /// nothing is validated here.
    pub fn from_variables(vars: &Variables) -> Self {
        Self {
            env: Environment {
                account: vars.get_or_empty(ACCOUNT),
                region: vars.get_or_empty(REGION),
            },
            record_name: vars.get_or_empty(RECORD_NAME),
            domain_name: vars.get_or_empty(DOMAIN_NAME),
            bucket_name: vars.get_or_empty(BUCKET_NAME),
            cert_arn: vars.get_or_empty(CERT_ARN),
            ..Default::default()
        }
    }

    /// Names of required variables that are empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            (RECORD_NAME, &self.record_name),
            (DOMAIN_NAME, &self.domain_name),
            (BUCKET_NAME, &self.bucket_name),
            (CERT_ARN, &self.cert_arn),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(Error::MissingVariables(missing));
        }
        if !self.env.region.is_empty() {
            verify_region(&self.env.region)?;
        }
        if !self.env.account.is_empty()
            && (self.env.account.len() != 12 || !self.env.account.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(Error::InvalidAccount(self.env.account.clone()));
        }
        Ok(())
    }
}
