use crate::regions::{is_valid_region, partition_of, CLOUDFRONT_CERT_REGION};

use super::*;

/// An ACM certificate that already exists, referenced by ARN. Nothing is
/// declared in the stack for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    arn: String,
    region: String,
    account: String,
}

impl Certificate {
    /// Parses `arn:<partition>:acm:<region>:<account>:certificate/<id>`.
    pub fn from_arn(arn: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidCertificateArn {
            arn: arn.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        let [prefix, partition, service, region, account, resource] = parts[..] else {
            return Err(invalid("expected arn:<partition>:acm:<region>:<account>:certificate/<id>"));
        };
        if prefix != "arn" || partition.is_empty() {
            return Err(invalid("must start with arn:<partition>"));
        }
        if service != "acm" {
            return Err(invalid("not an ACM certificate"));
        }
        if !is_valid_region(region) {
            return Err(invalid("unknown region"));
        }
        if partition != partition_of(region) {
            return Err(invalid("partition does not match the region"));
        }
        if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("account must be 12 digits"));
        }
        match resource.strip_prefix("certificate/") {
            Some(id) if !id.is_empty() => {}
            _ => return Err(invalid("resource must be certificate/<id>")),
        }
        Ok(Self {
            arn: arn.to_string(),
            region: region.to_string(),
            account: account.to_string(),
        })
    }

    /// Like [`Certificate::from_arn`], but also requires the certificate to
    /// live in the one region CloudFront reads certificates from.
    pub fn for_cloudfront(arn: &str) -> Result<Self> {
        let cert = Self::from_arn(arn)?;
        if cert.region != CLOUDFRONT_CERT_REGION {
            return Err(Error::InvalidCertificateArn {
                arn: arn.to_string(),
                reason: format!(
                    "CloudFront only accepts certificates from {CLOUDFRONT_CERT_REGION}, this one is in {}",
                    cert.region
                ),
            });
        }
        Ok(cert)
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}
