use serde::Serialize;
use serde_json::Value;

use crate::lookup::HostedZone;

use super::*;

/// Hosted zone that CloudFront alias targets live in. The same for every
/// distribution.
pub const CLOUDFRONT_ALIAS_ZONE_ID: &str = "Z2FDTNDATAQYW2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RecordType {
    #[default]
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: StrVal,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
}

/// `AWS::Route53::RecordSet` aliased to another AWS resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: RecordType,
    pub hosted_zone_id: String,
    pub alias_target: AliasTarget,
}

impl CfnResource for CfnRecordSet {
    fn type_string(&self) -> &'static str {
        "AWS::Route53::RecordSet"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        if self.hosted_zone_id.is_empty() {
            return Err(Error::invalid_resource(&self.name, "record set needs a hosted zone id"));
        }
        if self.name.trim_end_matches('.').is_empty() {
            return Err(Error::invalid_resource(self.type_string(), "record name cannot be empty"));
        }
        Ok(())
    }
}

/// True when `record_name` is `zone_name` or a name below it. Only whole
/// labels count, so `myexample.com` is not in `example.com`.
pub fn is_in_zone(record_name: &str, zone_name: &str) -> bool {
    let record_name = record_name.trim_end_matches('.').to_ascii_lowercase();
    let zone_name = zone_name.trim_end_matches('.').to_ascii_lowercase();
    record_name == zone_name || record_name.ends_with(&format!(".{zone_name}"))
}

/// Qualifies `record_name` against `zone_name`:
/// `www` in `example.com` becomes `www.example.com.`, names that already end
/// in the zone get the trailing dot, names ending in `.` are left alone.
pub fn fully_qualified_record_name(record_name: &str, zone_name: &str) -> String {
    if record_name.ends_with('.') {
        record_name.to_string()
    } else if is_in_zone(record_name, zone_name) {
        format!("{record_name}.")
    } else {
        format!("{record_name}.{}.", zone_name.trim_end_matches('.'))
    }
}

/// Declares an `A` record in `zone` aliasing `record_name` to a CloudFront
/// distribution.
pub fn add_alias_record(
    stack: &mut Stack,
    id: &str,
    zone: &HostedZone,
    record_name: &str,
    distribution: &DistributionRef,
) -> Result<String> {
    let record = CfnRecordSet {
        name: fully_qualified_record_name(record_name, &zone.name),
        record_type: RecordType::A,
        hosted_zone_id: zone.id.clone(),
        alias_target: AliasTarget {
            dns_name: distribution.domain_name(),
            hosted_zone_id: CLOUDFRONT_ALIAS_ZONE_ID.to_string(),
        },
    };
    stack.add(id, record)
}
