//! CloudFormation template model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A template property that is either a literal string or an intrinsic
/// function resolved by CloudFormation at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrVal {
    Str(String),
    Fn(Intrinsic),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    #[serde(rename = "Ref")]
    Ref(String),
    #[serde(rename = "Fn::GetAtt")]
    GetAtt(String, String),
    #[serde(rename = "Fn::Sub")]
    Sub(String),
    #[serde(rename = "Fn::Join")]
    Join(String, Vec<StrVal>),
}

impl StrVal {
    /// The literal value, if this is not an intrinsic.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StrVal::Str(s) => Some(s.as_str()),
            StrVal::Fn(_) => None,
        }
    }

    /// Logical ids this value points at.
    pub fn references(&self) -> Vec<&str> {
        match self {
            StrVal::Str(_) => vec![],
            StrVal::Fn(Intrinsic::Ref(id)) | StrVal::Fn(Intrinsic::GetAtt(id, _)) => vec![id.as_str()],
            StrVal::Fn(Intrinsic::Sub(s)) => sub_references(s),
            StrVal::Fn(Intrinsic::Join(_, parts)) => {
                parts.iter().flat_map(|p| p.references()).collect()
            }
        }
    }
}

impl From<&str> for StrVal {
    fn from(value: &str) -> Self {
        StrVal::Str(value.to_string())
    }
}

impl From<String> for StrVal {
    fn from(value: String) -> Self {
        StrVal::Str(value)
    }
}

impl From<Intrinsic> for StrVal {
    fn from(value: Intrinsic) -> Self {
        StrVal::Fn(value)
    }
}

pub fn get_ref(logical_id: &str) -> StrVal {
    Intrinsic::Ref(logical_id.to_string()).into()
}

pub fn get_att(logical_id: &str, attribute: &str) -> StrVal {
    Intrinsic::GetAtt(logical_id.to_string(), attribute.to_string()).into()
}

pub fn sub(template: impl Into<String>) -> StrVal {
    Intrinsic::Sub(template.into()).into()
}

pub fn join(delimiter: &str, parts: Vec<StrVal>) -> StrVal {
    Intrinsic::Join(delimiter.to_string(), parts).into()
}

// `${Name}` and `${Name.Attr}` placeholders that are not pseudo parameters
fn sub_references(s: &str) -> Vec<&str> {
    let mut out = vec![];
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        let name = &after[..end];
        let name = name.split('.').next().unwrap_or(name);
        if !name.starts_with("AWS::") && !name.starts_with('!') {
            out.push(name);
        }
        rest = &after[end + 1..];
    }
    out
}

/// One resource type that can be declared in a template.
pub trait CfnResource {
    fn type_string(&self) -> &'static str;
    fn properties(&self) -> Value;
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: StrVal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl Template {
    /// Resources of a given type, eg: `AWS::S3::Bucket`.
    pub fn resources_of_type<'a>(
        &'a self,
        ty: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a SavedResource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.ty == ty)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
