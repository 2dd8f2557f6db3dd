use serde::Serialize;
use serde_json::Value;

use super::*;

pub const AUTO_DELETE_TAG: &str = "auto-delete-objects";

/// Empties the bucket named in the custom resource properties when the
/// custom resource is deleted. Every other request type is acknowledged as is.
const CLEANUP_HANDLER: &str = r#"const { S3Client, ListObjectVersionsCommand, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const response = require('cfn-response');
const s3 = new S3Client({});
async function emptyBucket(bucketName) {
    let keyMarker;
    let versionIdMarker;
    do {
        const page = await s3.send(new ListObjectVersionsCommand({
            Bucket: bucketName, KeyMarker: keyMarker, VersionIdMarker: versionIdMarker,
        }));
        const objects = [...(page.Versions || []), ...(page.DeleteMarkers || [])]
            .map((o) => ({ Key: o.Key, VersionId: o.VersionId }));
        if (objects.length > 0) {
            await s3.send(new DeleteObjectsCommand({ Bucket: bucketName, Delete: { Objects: objects, Quiet: true } }));
        }
        keyMarker = page.NextKeyMarker;
        versionIdMarker = page.NextVersionIdMarker;
    } while (keyMarker || versionIdMarker);
}
function bucketToEmpty(event) {
    const bucketName = event.ResourceProperties.BucketName;
    if (event.RequestType === 'Delete') {
        return bucketName;
    }
    const oldBucketName = (event.OldResourceProperties || {}).BucketName;
    if (event.RequestType === 'Update' && oldBucketName && oldBucketName !== bucketName) {
        return oldBucketName;
    }
    return undefined;
}
exports.handler = function(event, context) {
    console.log('REQUEST RECEIVED: ' + JSON.stringify(event));
    const done = (status) => response.send(event, context, status);
    const bucketName = bucketToEmpty(event);
    if (!bucketName) {
        return done(response.SUCCESS);
    }
    emptyBucket(bucketName)
        .then(() => done(response.SUCCESS))
        .catch((err) => {
            if (err.name === 'NoSuchBucket') {
                return done(response.SUCCESS);
            }
            console.log(`Error deleting objects from S3 bucket: ${err}`);
            done(response.FAILED);
        });
};
"#;

pub struct BucketProps {
    /// physical name. Leave empty to let CloudFormation generate one.
    pub bucket_name: String,
    pub removal_policy: RemovalPolicy,
    /// empty the bucket before it gets deleted. Requires `RemovalPolicy::Destroy`.
    pub auto_delete_objects: bool,
    pub block_public_access: bool,
}

impl Default for BucketProps {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            removal_policy: RemovalPolicy::Retain,
            auto_delete_objects: false,
            block_public_access: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlockConfiguration {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    pub fn block_all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// `AWS::S3::Bucket`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucket {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        match &self.bucket_name {
            Some(name) => validate_bucket_name(name),
            None => Ok(()),
        }
    }
}

/// `AWS::S3::BucketPolicy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnBucketPolicy {
    pub bucket: StrVal,
    pub policy_document: PolicyDocument,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        self.policy_document.validate()
    }
}

pub struct CleanupResource {
    pub lambda_logical_id: String,
    pub bucket_logical_id: String,
}

impl CfnResource for CleanupResource {
    fn type_string(&self) -> &'static str {
        "Custom::S3AutoDeleteObjects"
    }
    fn properties(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("ServiceToken".to_string(), to_properties(&get_att(&self.lambda_logical_id, "Arn")));
        map.insert("BucketName".to_string(), to_properties(&get_ref(&self.bucket_logical_id)));
        Value::Object(map)
    }
}

/// A bucket that has been declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRef {
    pub logical_id: String,
    pub bucket_name: String,
}

impl BucketRef {
    pub fn name(&self) -> StrVal {
        get_ref(&self.logical_id)
    }

    pub fn arn(&self) -> StrVal {
        get_att(&self.logical_id, "Arn")
    }

    pub fn regional_domain_name(&self) -> StrVal {
        get_att(&self.logical_id, "RegionalDomainName")
    }

    /// `<bucket>/*`, or `${LogicalId}/*` when CloudFormation names the bucket.
    pub fn object_pattern(&self) -> String {
        if self.bucket_name.is_empty() {
            object_pattern(&format!("${{{}}}", self.logical_id))
        } else {
            object_pattern(&self.bucket_name)
        }
    }

    /// ARN matching every object in the bucket.
    pub fn objects_arn(&self) -> StrVal {
        sub(format!("arn:${{AWS::Partition}}:s3:::{}", self.object_pattern()))
    }
}

pub fn object_pattern(bucket_name: &str) -> String {
    format!("{bucket_name}/*")
}

pub fn add_s3_bucket(stack: &mut Stack, id: &str, props: BucketProps) -> Result<BucketRef> {
    if !props.bucket_name.is_empty() {
        validate_bucket_name(&props.bucket_name)?;
    }
    if props.auto_delete_objects && props.removal_policy != RemovalPolicy::Destroy {
        return Err(Error::invalid_resource(
            id,
            "Cannot use 'auto_delete_objects' property on a bucket without setting removal policy to 'DESTROY'.",
        ));
    }
    let mut bucket = CfnBucket {
        bucket_name: (!props.bucket_name.is_empty()).then(|| props.bucket_name.clone()),
        ..Default::default()
    };
    if props.block_public_access {
        bucket.public_access_block_configuration = Some(PublicAccessBlockConfiguration::block_all());
    }
    if props.auto_delete_objects {
        bucket.tags.push(Tag {
            key: AUTO_DELETE_TAG.to_string(),
            value: "true".to_string(),
        });
    }
    let logical_id = stack.add_with_options(
        id,
        bucket,
        ResourceOptions {
            removal_policy: Some(props.removal_policy),
            ..Default::default()
        },
    )?;
    let bucket_ref = BucketRef {
        logical_id,
        bucket_name: props.bucket_name,
    };
    if props.auto_delete_objects {
        add_auto_delete_objects(stack, id, &bucket_ref)?;
    }
    Ok(bucket_ref)
}

pub fn add_bucket_policy(
    stack: &mut Stack,
    id: &str,
    bucket: &BucketRef,
    statements: Vec<PolicyStatement>,
) -> Result<String> {
    let policy = CfnBucketPolicy {
        bucket: bucket.name(),
        policy_document: PolicyDocument::new(statements),
    };
    stack.add(id, policy)
}

// s3 buckets in cloudformation cannot be deleted if they contain objects.
// a custom resource backed by a small function empties the bucket first.
fn add_auto_delete_objects(stack: &mut Stack, id: &str, bucket: &BucketRef) -> Result<String> {
    let policy = Policy {
        policy_name: "auto-delete-objects".to_string(),
        policy_document: PolicyDocument::new(vec![
            PolicyStatement::allow(&["s3:ListBucket", "s3:ListBucketVersions"]).with_resource(bucket.arn()),
            PolicyStatement::allow(&["s3:DeleteObject", "s3:DeleteObjectVersion"])
                .with_resource(bucket.objects_arn()),
        ]),
    };
    let role = CfnRole {
        assume_role_policy_document: create_assume_role_policy_doc("lambda.amazonaws.com"),
        description: Some(format!("empties {} before it is deleted", bucket.logical_id)),
        managed_policy_arns: vec![sub(LAMBDA_BASIC_EXECUTION_ROLE)],
        policies: vec![policy],
    };
    let role_id = stack.add(&format!("{id}AutoDeleteObjectsRole"), role)?;
    let cleanup_function = CfnFunction {
        description: Some(format!("Lambda function for auto-deleting objects in {}", bucket.logical_id)),
        runtime: FunctionRuntime::Nodejs20x,
        handler: "index.handler".to_string(),
        role: get_att(&role_id, "Arn"),
        code: Code {
            zip_file: CLEANUP_HANDLER.to_string(),
        },
        memory_size: 128,
        timeout: 900,
    };
    let function_id = stack.add(&format!("{id}AutoDeleteObjectsFunction"), cleanup_function)?;
    let cleanup = CleanupResource {
        lambda_logical_id: function_id,
        bucket_logical_id: bucket.logical_id.clone(),
    };
    stack.add(&format!("{id}AutoDeleteObjectsCustomResource"), cleanup)
}

pub fn validate_bucket_name(bucket_name: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidBucketName {
        name: bucket_name.to_string(),
        reason,
    };
    if bucket_name.len() > 63 || bucket_name.len() < 3 {
        return Err(invalid("Must be between 3 and 63 characters"));
    }
    let valid_char_check = |c: char| -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
    };
    if !bucket_name.chars().all(valid_char_check) {
        return Err(invalid("May only contain lowercase letters, numbers, dots, and dashes"));
    }
    let first_ok = bucket_name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let last_ok = bucket_name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    if !first_ok || !last_ok {
        return Err(invalid("First and last character must be either lowercase letter, or number"));
    }
    if bucket_name.contains("..") {
        return Err(invalid("May not contain two consecutive dots"));
    }
    Ok(())
}
