use tracing::{info, warn};

use crate::config::StackConfig;
use crate::lookup::{HostedZone, HostedZoneLookup, HostedZoneQuery};

use super::*;

pub const DEFAULT_ROOT_OBJECT: &str = "index.html";

/// A bucket served over HTTPS through CloudFront under a custom DNS name.
///
/// The stack is built in one pass, each resource declared after everything it
/// references:
/// hosted zone lookup, bucket, origin access identity, bucket policy,
/// viewer-request function, certificate, distribution, alias record.
pub struct StaticWebsite {
    pub stack: Stack,
    pub hosted_zone: HostedZone,
    pub bucket: BucketRef,
    pub origin_access_identity: OriginAccessIdentityRef,
    pub bucket_policy: String,
    pub function: FunctionRef,
    pub certificate: Certificate,
    pub distribution: DistributionRef,
    pub record: String,
}

/// Lookups [`StaticWebsite::new`] will ask `zones` for.
pub fn required_lookups(config: &StackConfig) -> Vec<HostedZoneQuery> {
    vec![HostedZoneQuery::new(&config.domain_name)]
}

impl StaticWebsite {
    /// Builds the stack, reading the viewer-request function from
    /// `config.function_asset`.
    pub fn new<L: HostedZoneLookup>(config: &StackConfig, zones: &L) -> Result<Self> {
        let code = FunctionCode::from_file(&config.function_asset)?;
        Self::with_function_code(config, zones, code)
    }

    pub fn with_function_code<L: HostedZoneLookup>(
        config: &StackConfig,
        zones: &L,
        code: FunctionCode,
    ) -> Result<Self> {
        let mut stack = Stack::new(&config.stack_name, config.env.clone())?;
        stack.set_description(format!("Static website for {}", config.record_name));

        let hosted_zone = zones.lookup_hosted_zone(&config.env, &HostedZoneQuery::new(&config.domain_name))?;
        if !is_in_zone(&config.record_name, &hosted_zone.name) {
            warn!(
                record = %config.record_name,
                zone = %hosted_zone.name,
                "record name is not inside the hosted zone, it will be qualified with the zone name"
            );
        }

        let bucket = add_s3_bucket(
            &mut stack,
            "WebsiteBucket",
            BucketProps {
                bucket_name: config.bucket_name.clone(),
                removal_policy: RemovalPolicy::Destroy,
                auto_delete_objects: true,
                block_public_access: true,
            },
        )?;

        let origin_access_identity = add_origin_access_identity(
            &mut stack,
            "OriginAccessIdentity",
            &format!("{}-identity", config.bucket_name),
        )?;

        let statement = PolicyStatement::allow(&["s3:GetObject"])
            .with_principal(Principal::CanonicalUser(origin_access_identity.s3_canonical_user_id()))
            .with_resource(bucket.objects_arn());
        let bucket_policy = add_bucket_policy(&mut stack, "WebsiteBucketPolicy", &bucket, vec![statement])?;

        let function = add_cloudfront_function(&mut stack, "CloudFrontFunction", code)?;

        let certificate = Certificate::for_cloudfront(&config.cert_arn)?;

        let mut behavior = BehaviorOptions::new(S3Origin {
            bucket: bucket.clone(),
            origin_access_identity: origin_access_identity.clone(),
        });
        behavior.allowed_methods = AllowedMethods::GetHead;
        behavior.cached_methods = CachedMethods::GetHead;
        behavior.cache_policy = CachePolicy::CachingOptimized;
        behavior.viewer_protocol_policy = ViewerProtocolPolicy::RedirectToHttps;
        behavior.function_associations = vec![(function.clone(), FunctionEventType::ViewerRequest)];

        let mut props = DistributionProps::new(behavior);
        props.domain_names = vec![config.record_name.clone()];
        props.certificate = Some(certificate.clone());
        props.comment = Some(format!("{}-cloudfront", config.bucket_name));
        props.default_root_object = Some(DEFAULT_ROOT_OBJECT.to_string());
        props.price_class = PriceClass::PriceClassAll;
        let distribution = add_distribution(&mut stack, "Distribution", props)?;

        let record = add_alias_record(&mut stack, "Route53RecordSet", &hosted_zone, &config.record_name, &distribution)?;

        stack.add_output("BucketName", "Bucket holding the site assets", bucket.name())?;
        stack.add_output("DistributionId", "CloudFront distribution id", distribution.distribution_id())?;
        stack.add_output(
            "DistributionDomainName",
            "CloudFront domain name",
            distribution.domain_name(),
        )?;
        stack.add_output(
            "SiteUrl",
            "Public URL of the site",
            format!("https://{}", config.record_name.trim_end_matches('.')).into(),
        )?;

        info!(stack = stack.name(), record = %config.record_name, "built static website stack");
        Ok(Self {
            stack,
            hosted_zone,
            bucket,
            origin_access_identity,
            bucket_policy,
            function,
            certificate,
            distribution,
            record,
        })
    }
}
