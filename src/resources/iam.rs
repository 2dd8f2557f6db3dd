use serde::Serialize;
use serde_json::Value;

use super::*;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const LAMBDA_BASIC_EXECUTION_ROLE: &str =
    "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Principal {
    /// the canonical user id of an S3 principal, eg: a CloudFront origin access identity
    CanonicalUser(StrVal),
    Service(String),
    #[serde(rename = "AWS")]
    Aws(StrVal),
    #[serde(rename = "*")]
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<StrVal>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str]) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            principal: None,
            resources: vec![],
        }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<StrVal>) -> Self {
        self.resources.push(resource.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.statements.is_empty() {
            return Err(Error::invalid_resource("PolicyDocument", "a policy document needs at least one statement"));
        }
        for statement in &self.statements {
            if statement.actions.is_empty() {
                return Err(Error::invalid_resource("PolicyStatement", "a statement needs at least one action"));
            }
        }
        Ok(())
    }
}

pub fn create_assume_role_policy_doc(service: &str) -> PolicyDocument {
    PolicyDocument::new(vec![PolicyStatement::allow(&["sts:AssumeRole"])
        .with_principal(Principal::Service(service.to_string()))])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

/// `AWS::IAM::Role`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnRole {
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "ManagedPolicyArns", skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<StrVal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        self.assume_role_policy_document.validate()?;
        for policy in &self.policies {
            policy.policy_document.validate()?;
        }
        Ok(())
    }
}
