use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use super::*;

/// CloudFront Functions reject code larger than this.
pub const MAX_FUNCTION_CODE_BYTES: usize = 10 * 1024;
pub const MAX_FUNCTION_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllowedMethods {
    #[default]
    GetHead,
    GetHeadOptions,
    All,
}

impl AllowedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
            AllowedMethods::All => &["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
        }
    }
}

impl Serialize for AllowedMethods {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.methods().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachedMethods {
    #[default]
    GetHead,
    GetHeadOptions,
}

impl CachedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            CachedMethods::GetHead => &["GET", "HEAD"],
            CachedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
        }
    }
}

impl Serialize for CachedMethods {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.methods().serialize(serializer)
    }
}

/// Managed cache policies, see
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    CachingOptimized,
    CachingOptimizedForUncompressedObjects,
    CachingDisabled,
    ElementalMediaPackage,
    Amplify,
    /// id of a cache policy created outside this stack
    Custom(String),
}

impl CachePolicy {
    pub fn id(&self) -> &str {
        match self {
            CachePolicy::CachingOptimized => "658327ea-f89d-4fab-a63d-7e88639e58f6",
            CachePolicy::CachingOptimizedForUncompressedObjects => "b2884449-e4de-46a7-ac36-70bc7f1ddd6d",
            CachePolicy::CachingDisabled => "4135ea2d-6df8-44a3-9df3-4b5a84be39ad",
            CachePolicy::ElementalMediaPackage => "08627262-05a9-4f76-9ded-b50ca2e3a84f",
            CachePolicy::Amplify => "2e54312d-136d-493c-8eb9-b001f22f67d2",
            CachePolicy::Custom(id) => id,
        }
    }
}

impl Serialize for CachePolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    #[default]
    AllowAll,
    HttpsOnly,
    RedirectToHttps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PriceClass {
    #[serde(rename = "PriceClass_100")]
    PriceClass100,
    #[serde(rename = "PriceClass_200")]
    PriceClass200,
    #[default]
    #[serde(rename = "PriceClass_All")]
    PriceClassAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionEventType {
    ViewerRequest,
    ViewerResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HttpVersion {
    #[serde(rename = "http1.1")]
    Http1_1,
    #[default]
    #[serde(rename = "http2")]
    Http2,
    #[serde(rename = "http2and3")]
    Http2And3,
    #[serde(rename = "http3")]
    Http3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SecurityPolicy {
    #[serde(rename = "TLSv1.2_2018")]
    TlsV1_2_2018,
    #[serde(rename = "TLSv1.2_2019")]
    TlsV1_2_2019,
    #[default]
    #[serde(rename = "TLSv1.2_2021")]
    TlsV1_2_2021,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslSupportMethod {
    #[default]
    SniOnly,
    Vip,
}

// ---- origin access identity ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginAccessIdentityConfig {
    pub comment: String,
}

/// `AWS::CloudFront::CloudFrontOriginAccessIdentity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnOriginAccessIdentity {
    pub cloud_front_origin_access_identity_config: OriginAccessIdentityConfig,
}

impl CfnResource for CfnOriginAccessIdentity {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::CloudFrontOriginAccessIdentity"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        if self.cloud_front_origin_access_identity_config.comment.len() > 128 {
            return Err(Error::invalid_resource(self.type_string(), "comment cannot be longer than 128 characters"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAccessIdentityRef {
    pub logical_id: String,
}

impl OriginAccessIdentityRef {
    /// canonical user id to grant S3 permissions to
    pub fn s3_canonical_user_id(&self) -> StrVal {
        get_att(&self.logical_id, "S3CanonicalUserId")
    }

    /// the value an S3 origin expects, `origin-access-identity/cloudfront/<id>`
    pub fn origin_access_identity_path(&self) -> StrVal {
        join("", vec!["origin-access-identity/cloudfront/".into(), get_ref(&self.logical_id)])
    }
}

pub fn add_origin_access_identity(stack: &mut Stack, id: &str, comment: &str) -> Result<OriginAccessIdentityRef> {
    let oai = CfnOriginAccessIdentity {
        cloud_front_origin_access_identity_config: OriginAccessIdentityConfig {
            comment: comment.to_string(),
        },
    };
    let logical_id = stack.add(id, oai)?;
    Ok(OriginAccessIdentityRef { logical_id })
}

// ---- cloudfront functions ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCode {
    pub source: Option<PathBuf>,
    pub code: String,
}

impl FunctionCode {
    /// Loads the file verbatim. Nothing is compiled or checked beyond its size.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let code = std::fs::read_to_string(path).map_err(|source| Error::Asset {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            code,
        })
    }

    pub fn from_inline(code: impl Into<String>) -> Self {
        Self {
            source: None,
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfig {
    pub comment: String,
    pub runtime: String,
}

/// `AWS::CloudFront::Function`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnCloudFrontFunction {
    pub name: String,
    pub auto_publish: bool,
    pub function_code: String,
    pub function_config: FunctionConfig,
}

impl CfnResource for CfnCloudFrontFunction {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Function"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        let size = self.function_code.len();
        if size > MAX_FUNCTION_CODE_BYTES {
            return Err(Error::FunctionCodeTooLarge {
                size,
                max: MAX_FUNCTION_CODE_BYTES,
            });
        }
        if self.function_code.trim().is_empty() {
            return Err(Error::invalid_resource(&self.name, "function code is empty"));
        }
        let valid_name = !self.name.is_empty()
            && self.name.len() <= MAX_FUNCTION_NAME_LEN
            && self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_name {
            return Err(Error::invalid_resource(
                &self.name,
                "function names must be 1-64 characters of [A-Za-z0-9_-]",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub logical_id: String,
    pub name: String,
}

impl FunctionRef {
    pub fn arn(&self) -> StrVal {
        get_att(&self.logical_id, "FunctionARN")
    }
}

/// `<region><stack><id>` with anything outside `[A-Za-z0-9_-]` dropped. Names
/// longer than 64 characters keep their first and last 32.
pub fn generate_function_name(region: &str, stack_name: &str, id: &str) -> String {
    let name: String = format!("{region}{stack_name}{id}")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.len() <= MAX_FUNCTION_NAME_LEN {
        return name;
    }
    let half = MAX_FUNCTION_NAME_LEN / 2;
    format!("{}{}", &name[..half], &name[name.len() - half..])
}

pub fn add_cloudfront_function(stack: &mut Stack, id: &str, code: FunctionCode) -> Result<FunctionRef> {
    let name = generate_function_name(&stack.env().region, stack.name(), id);
    if let Some(path) = &code.source {
        debug!(function = %name, ?path, bytes = code.code.len(), "loaded function code");
    }
    let function = CfnCloudFrontFunction {
        name: name.clone(),
        auto_publish: true,
        function_code: code.code,
        function_config: FunctionConfig {
            comment: name.clone(),
            runtime: "cloudfront-js-1.0".to_string(),
        },
    };
    let logical_id = stack.add(id, function)?;
    Ok(FunctionRef { logical_id, name })
}

// ---- distribution ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3OriginConfig {
    pub origin_access_identity: StrVal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Origin {
    pub id: String,
    pub domain_name: StrVal,
    pub s3_origin_config: S3OriginConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionAssociation {
    pub event_type: FunctionEventType,
    #[serde(rename = "FunctionARN")]
    pub function_arn: StrVal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultCacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: AllowedMethods,
    pub cached_methods: CachedMethods,
    pub cache_policy_id: CachePolicy,
    pub compress: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub function_associations: Vec<FunctionAssociation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ViewerCertificate {
    pub acm_certificate_arn: String,
    pub minimum_protocol_version: SecurityPolicy,
    pub ssl_support_method: SslSupportMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_root_object: Option<String>,
    pub enabled: bool,
    pub http_version: HttpVersion,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    pub price_class: PriceClass,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_certificate: Option<ViewerCertificate>,
}

/// `AWS::CloudFront::Distribution`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnDistribution {
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        let config = &self.distribution_config;
        let ty = self.type_string();
        if config.comment.as_ref().is_some_and(|c| c.len() > 128) {
            return Err(Error::invalid_resource(ty, "comment cannot be longer than 128 characters"));
        }
        if !config.aliases.is_empty() && config.viewer_certificate.is_none() {
            return Err(Error::invalid_resource(ty, "a certificate is required to use custom domain names"));
        }
        if config.aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(Error::invalid_resource(ty, "domain names cannot be empty"));
        }
        let behavior = &config.default_cache_behavior;
        if !config.origins.iter().any(|o| o.id == behavior.target_origin_id) {
            return Err(Error::invalid_resource(
                ty,
                format!("default behavior targets unknown origin {}", behavior.target_origin_id),
            ));
        }
        let allowed = behavior.allowed_methods.methods();
        if !behavior.cached_methods.methods().iter().all(|m| allowed.contains(m)) {
            return Err(Error::invalid_resource(ty, "cached methods must be a subset of allowed methods"));
        }
        let mut seen = vec![];
        for association in &behavior.function_associations {
            if seen.contains(&association.event_type) {
                return Err(Error::invalid_resource(
                    ty,
                    format!("only one function may be associated with {:?}", association.event_type),
                ));
            }
            seen.push(association.event_type);
        }
        Ok(())
    }
}

/// An S3 bucket served through an origin access identity.
#[derive(Debug, Clone)]
pub struct S3Origin {
    pub bucket: BucketRef,
    pub origin_access_identity: OriginAccessIdentityRef,
}

#[derive(Debug, Clone)]
pub struct BehaviorOptions {
    pub origin: S3Origin,
    pub allowed_methods: AllowedMethods,
    pub cached_methods: CachedMethods,
    pub cache_policy: CachePolicy,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub compress: bool,
    pub function_associations: Vec<(FunctionRef, FunctionEventType)>,
}

impl BehaviorOptions {
    pub fn new(origin: S3Origin) -> Self {
        Self {
            origin,
            allowed_methods: AllowedMethods::GetHead,
            cached_methods: CachedMethods::GetHead,
            cache_policy: CachePolicy::CachingOptimized,
            viewer_protocol_policy: ViewerProtocolPolicy::AllowAll,
            compress: true,
            function_associations: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistributionProps {
    pub domain_names: Vec<String>,
    pub certificate: Option<Certificate>,
    pub comment: Option<String>,
    pub default_root_object: Option<String>,
    pub default_behavior: BehaviorOptions,
    pub price_class: PriceClass,
    pub http_version: HttpVersion,
    pub enable_ipv6: bool,
    pub minimum_protocol_version: SecurityPolicy,
    pub enabled: bool,
}

impl DistributionProps {
    pub fn new(default_behavior: BehaviorOptions) -> Self {
        Self {
            domain_names: vec![],
            certificate: None,
            comment: None,
            default_root_object: None,
            default_behavior,
            price_class: PriceClass::PriceClassAll,
            http_version: HttpVersion::Http2,
            enable_ipv6: true,
            minimum_protocol_version: SecurityPolicy::TlsV1_2_2021,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRef {
    pub logical_id: String,
}

impl DistributionRef {
    pub fn distribution_id(&self) -> StrVal {
        get_ref(&self.logical_id)
    }

    pub fn domain_name(&self) -> StrVal {
        get_att(&self.logical_id, "DomainName")
    }
}

pub fn add_distribution(stack: &mut Stack, id: &str, props: DistributionProps) -> Result<DistributionRef> {
    let behavior = props.default_behavior;
    let origin_id = format!("{}Origin1", stack.logical_id(id)?);
    let origin = Origin {
        id: origin_id.clone(),
        domain_name: behavior.origin.bucket.regional_domain_name(),
        s3_origin_config: S3OriginConfig {
            origin_access_identity: behavior.origin.origin_access_identity.origin_access_identity_path(),
        },
    };
    let function_associations = behavior
        .function_associations
        .iter()
        .map(|(function, event_type)| FunctionAssociation {
            event_type: *event_type,
            function_arn: function.arn(),
        })
        .collect();
    let viewer_certificate = props.certificate.as_ref().map(|cert| ViewerCertificate {
        acm_certificate_arn: cert.arn().to_string(),
        minimum_protocol_version: props.minimum_protocol_version,
        ssl_support_method: SslSupportMethod::SniOnly,
    });
    let distribution = CfnDistribution {
        distribution_config: DistributionConfig {
            aliases: props.domain_names,
            comment: props.comment,
            default_root_object: props.default_root_object,
            enabled: props.enabled,
            http_version: props.http_version,
            ipv6_enabled: props.enable_ipv6,
            price_class: props.price_class,
            origins: vec![origin],
            default_cache_behavior: DefaultCacheBehavior {
                target_origin_id: origin_id,
                viewer_protocol_policy: behavior.viewer_protocol_policy,
                allowed_methods: behavior.allowed_methods,
                cached_methods: behavior.cached_methods,
                cache_policy_id: behavior.cache_policy,
                compress: behavior.compress,
                function_associations,
            },
            viewer_certificate,
        },
    };
    // surface option errors at declaration time rather than at synth
    distribution.validate()?;
    let logical_id = stack.add(id, distribution)?;
    Ok(DistributionRef { logical_id })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn enums_serialize_to_cfn_strings() {
        assert_eq!(serde_json::to_value(AllowedMethods::GetHead).unwrap(), json!(["GET", "HEAD"]));
        assert_eq!(
            serde_json::to_value(CachePolicy::CachingOptimized).unwrap(),
            json!("658327ea-f89d-4fab-a63d-7e88639e58f6")
        );
        assert_eq!(
            serde_json::to_value(ViewerProtocolPolicy::RedirectToHttps).unwrap(),
            json!("redirect-to-https")
        );
        assert_eq!(serde_json::to_value(PriceClass::PriceClassAll).unwrap(), json!("PriceClass_All"));
        assert_eq!(serde_json::to_value(FunctionEventType::ViewerRequest).unwrap(), json!("viewer-request"));
        assert_eq!(serde_json::to_value(SecurityPolicy::TlsV1_2_2021).unwrap(), json!("TLSv1.2_2021"));
    }

    #[test]
    fn function_names_fit() {
        assert_eq!(generate_function_name("us-east-1", "MyStack", "Redirect"), "us-east-1MyStackRedirect");
        let long = generate_function_name("ap-southeast-2", &"S".repeat(80), "CloudFrontFunction");
        assert_eq!(long.len(), MAX_FUNCTION_NAME_LEN);
        assert!(long.starts_with("ap-southeast-2"));
        assert!(long.ends_with("CloudFrontFunction"));
    }

    #[test]
    fn oversized_function_code_is_rejected() {
        let function = CfnCloudFrontFunction {
            name: "fn".into(),
            auto_publish: true,
            function_code: "x".repeat(MAX_FUNCTION_CODE_BYTES + 1),
            function_config: FunctionConfig {
                comment: "fn".into(),
                runtime: "cloudfront-js-1.0".into(),
            },
        };
        assert!(matches!(function.validate(), Err(Error::FunctionCodeTooLarge { .. })));
    }

    #[test]
    fn missing_asset_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = FunctionCode::from_file(dir.path().join("nope.js")).unwrap_err();
        assert!(matches!(err, Error::Asset { .. }));
    }

    fn origin() -> S3Origin {
        S3Origin {
            bucket: BucketRef {
                logical_id: "Bucket".into(),
                bucket_name: "bucket".into(),
            },
            origin_access_identity: OriginAccessIdentityRef {
                logical_id: "Oai".into(),
            },
        }
    }

    #[test]
    fn aliases_need_a_certificate() {
        let mut stack = Stack::new("dist-stack", Default::default()).unwrap();
        let mut props = DistributionProps::new(BehaviorOptions::new(origin()));
        props.domain_names = vec!["www.example.com".into()];
        let err = add_distribution(&mut stack, "Dist", props).unwrap_err();
        assert!(err.to_string().contains("certificate is required"));
    }

    #[test]
    fn cached_methods_must_be_allowed() {
        let mut stack = Stack::new("dist-stack", Default::default()).unwrap();
        let mut behavior = BehaviorOptions::new(origin());
        behavior.cached_methods = CachedMethods::GetHeadOptions;
        let err = add_distribution(&mut stack, "Dist", DistributionProps::new(behavior)).unwrap_err();
        assert!(err.to_string().contains("subset of allowed methods"));
    }
}
