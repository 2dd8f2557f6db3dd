use std::cell::RefCell;

use serde_json::{json, Value};

use static_basic::config::Environment;
use static_basic::resources::{FunctionCode, CLOUDFRONT_ALIAS_ZONE_ID};
use static_basic::template::SavedResource;
use static_basic::{
    ContextCache, Error, HostedZone, HostedZoneLookup, HostedZoneQuery, Result, StackConfig, StaticWebsite,
    Template,
};

const CERT_ARN: &str = "arn:aws:acm:us-east-1:123456789012:certificate/0b2c1f4e-aaaa-bbbb-cccc-1234567890ab";
const REDIRECT: &str = "function handler(event) { return event.request; }";

/// Answers every lookup with the same zone and remembers what was asked.
struct FixedZone {
    zone: HostedZone,
    asked: RefCell<Vec<String>>,
}

impl FixedZone {
    fn new() -> Self {
        Self {
            zone: HostedZone {
                id: "Z0123456789ABC".into(),
                name: "example.com.".into(),
            },
            asked: RefCell::new(vec![]),
        }
    }
}

impl HostedZoneLookup for FixedZone {
    fn lookup_hosted_zone(&self, _env: &Environment, query: &HostedZoneQuery) -> Result<HostedZone> {
        self.asked.borrow_mut().push(query.domain_name.clone());
        if query.domain_name.is_empty() {
            return Err(Error::HostedZoneLookup {
                domain: String::new(),
                reason: "domain name is empty".into(),
            });
        }
        Ok(self.zone.clone())
    }
}

fn config() -> StackConfig {
    StackConfig {
        env: Environment {
            account: "123456789012".into(),
            region: "us-east-1".into(),
        },
        record_name: "www.example.com".into(),
        domain_name: "example.com".into(),
        bucket_name: "example-assets".into(),
        cert_arn: CERT_ARN.into(),
        ..Default::default()
    }
}

fn build(config: &StackConfig) -> Result<StaticWebsite> {
    StaticWebsite::with_function_code(config, &FixedZone::new(), FunctionCode::from_inline(REDIRECT))
}

fn template() -> Template {
    build(&config()).unwrap().stack.to_template().unwrap()
}

fn only<'a>(template: &'a Template, ty: &'a str) -> (&'a String, &'a SavedResource) {
    let mut found = template.resources_of_type(ty);
    let first = found.next().unwrap_or_else(|| panic!("no {ty} in template"));
    assert!(found.next().is_none(), "more than one {ty}");
    first
}

fn default_behavior(template: &Template) -> Value {
    let (_, dist) = only(template, "AWS::CloudFront::Distribution");
    dist.properties["DistributionConfig"]["DefaultCacheBehavior"].clone()
}

#[test]
fn bucket_policy_grants_the_identity_read_on_objects() {
    let template = template();
    let (oai_id, _) = only(&template, "AWS::CloudFront::CloudFrontOriginAccessIdentity");
    let (_, policy) = only(&template, "AWS::S3::BucketPolicy");
    let statements = policy.properties["PolicyDocument"]["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0],
        json!({
            "Effect": "Allow",
            "Action": ["s3:GetObject"],
            "Principal": {"CanonicalUser": {"Fn::GetAtt": [oai_id, "S3CanonicalUserId"]}},
            "Resource": [{"Fn::Sub": "arn:${AWS::Partition}:s3:::example-assets/*"}],
        })
    );
}

#[test]
fn object_pattern_follows_bucket_name() {
    let mut config = config();
    config.bucket_name = "another-site".into();
    let website = build(&config).unwrap();
    assert_eq!(website.bucket.object_pattern(), "another-site/*");
    let template = website.stack.to_template().unwrap();
    let (_, oai) = only(&template, "AWS::CloudFront::CloudFrontOriginAccessIdentity");
    assert_eq!(
        oai.properties["CloudFrontOriginAccessIdentityConfig"]["Comment"],
        json!("another-site-identity")
    );
}

#[test]
fn default_behavior_is_read_only() {
    let behavior = default_behavior(&template());
    assert_eq!(behavior["AllowedMethods"], json!(["GET", "HEAD"]));
    assert_eq!(behavior["CachedMethods"], json!(["GET", "HEAD"]));
    assert_eq!(behavior["ViewerProtocolPolicy"], json!("redirect-to-https"));
    assert_eq!(behavior["CachePolicyId"], json!("658327ea-f89d-4fab-a63d-7e88639e58f6"));
}

#[test]
fn viewer_request_runs_the_function() {
    let template = template();
    let (function_id, function) = only(&template, "AWS::CloudFront::Function");
    assert_eq!(function.properties["FunctionCode"], json!(REDIRECT));
    assert_eq!(function.properties["FunctionConfig"]["Runtime"], json!("cloudfront-js-1.0"));
    assert_eq!(function.properties["AutoPublish"], json!(true));
    assert_eq!(
        default_behavior(&template)["FunctionAssociations"],
        json!([{"EventType": "viewer-request", "FunctionARN": {"Fn::GetAtt": [function_id, "FunctionARN"]}}])
    );
}

#[test]
fn distribution_serves_the_record_over_the_certificate() {
    let template = template();
    let (_, dist) = only(&template, "AWS::CloudFront::Distribution");
    let config = &dist.properties["DistributionConfig"];
    assert_eq!(config["Aliases"], json!(["www.example.com"]));
    assert_eq!(config["Comment"], json!("example-assets-cloudfront"));
    assert_eq!(config["DefaultRootObject"], json!("index.html"));
    assert_eq!(config["PriceClass"], json!("PriceClass_All"));
    assert_eq!(config["ViewerCertificate"]["AcmCertificateArn"], json!(CERT_ARN));
    assert_eq!(config["ViewerCertificate"]["SslSupportMethod"], json!("sni-only"));

    let (bucket_id, _) = only(&template, "AWS::S3::Bucket");
    let origin = &config["Origins"][0];
    assert_eq!(origin["DomainName"], json!({"Fn::GetAtt": [bucket_id, "RegionalDomainName"]}));
    assert_eq!(origin["Id"], config["DefaultCacheBehavior"]["TargetOriginId"]);
}

#[test]
fn record_aliases_the_distribution_in_the_looked_up_zone() {
    let template = template();
    let (dist_id, _) = only(&template, "AWS::CloudFront::Distribution");
    let (_, record) = only(&template, "AWS::Route53::RecordSet");
    assert_eq!(record.properties["Type"], json!("A"));
    assert_eq!(record.properties["Name"], json!("www.example.com."));
    assert_eq!(record.properties["HostedZoneId"], json!("Z0123456789ABC"));
    assert_eq!(
        record.properties["AliasTarget"],
        json!({
            "DNSName": {"Fn::GetAtt": [dist_id, "DomainName"]},
            "HostedZoneId": CLOUDFRONT_ALIAS_ZONE_ID,
        })
    );
}

#[test]
fn bucket_is_destroyed_and_emptied_with_the_stack() {
    let template = template();
    let (_, bucket) = only(&template, "AWS::S3::Bucket");
    assert_eq!(bucket.deletion_policy.as_deref(), Some("Delete"));
    assert_eq!(bucket.update_replace_policy.as_deref(), Some("Delete"));
    only(&template, "Custom::S3AutoDeleteObjects");
    only(&template, "AWS::Lambda::Function");
}

#[test]
fn synthesis_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let first = build(&config()).unwrap().stack.synth(dir.path().join("a")).unwrap();
    let second = build(&config()).unwrap().stack.synth(dir.path().join("b")).unwrap();
    assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    assert_eq!(template(), template());
}

#[test]
fn outputs_point_at_the_site() {
    let template = template();
    assert_eq!(
        template.outputs.keys().collect::<Vec<_>>(),
        ["BucketName", "DistributionDomainName", "DistributionId", "SiteUrl"]
    );
    assert_eq!(template.outputs["SiteUrl"].value.as_str(), Some("https://www.example.com"));
}

#[test]
fn empty_domain_name_fails_at_lookup() {
    let mut config = config();
    config.domain_name = String::new();
    let zones = FixedZone::new();
    let result = StaticWebsite::with_function_code(&config, &zones, FunctionCode::from_inline(REDIRECT));
    assert!(matches!(result, Err(Error::HostedZoneLookup { .. })));
    assert_eq!(*zones.asked.borrow(), vec![String::new()]);
}

#[test]
fn lookups_come_from_the_context() {
    let config = config();
    let mut context = ContextCache::default();
    let code = || FunctionCode::from_inline(REDIRECT);

    let err = StaticWebsite::with_function_code(&config, &context, code()).err().unwrap();
    assert!(matches!(err, Error::MissingContext(_)));

    let zone = HostedZone {
        id: "ZCONTEXT".into(),
        name: "example.com.".into(),
    };
    for query in static_basic::required_lookups(&config) {
        context.set_hosted_zone(&config.env, &query, &zone).unwrap();
    }
    let website = StaticWebsite::with_function_code(&config, &context, code()).unwrap();
    assert_eq!(website.hosted_zone, zone);
}

#[test]
fn certificate_outside_us_east_1_is_rejected() {
    let mut config = config();
    config.cert_arn = CERT_ARN.replace("us-east-1", "eu-west-1");
    assert!(matches!(build(&config).err().unwrap(), Error::InvalidCertificateArn { .. }));
}

#[test]
fn function_code_comes_from_the_asset_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.function_asset = dir.path().join("missing.js");
    let err = StaticWebsite::new(&config, &FixedZone::new()).err().unwrap();
    assert!(matches!(err, Error::Asset { .. }));

    std::fs::write(&config.function_asset, REDIRECT).unwrap();
    let website = StaticWebsite::new(&config, &FixedZone::new()).unwrap();
    let template = website.stack.to_template().unwrap();
    let (_, function) = only(&template, "AWS::CloudFront::Function");
    assert_eq!(function.properties["FunctionCode"], json!(REDIRECT));
}

#[test]
fn shipped_redirect_asset_fits_cloudfront() {
    let code = FunctionCode::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/redirect.js")).unwrap();
    let website = StaticWebsite::with_function_code(&config(), &FixedZone::new(), code).unwrap();
    assert!(website.stack.to_template().is_ok());
}
