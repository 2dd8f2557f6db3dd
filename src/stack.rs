use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Environment;
use crate::error::{Error, Result};
use crate::template::{CfnResource, ResourceOutput, SavedResource, StrVal, Template};

/// What CloudFormation does with a resource's physical counterpart when the
/// resource leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// delete the physical resource
    Destroy,
    /// keep it around, orphaned from the stack
    #[default]
    Retain,
    /// snapshot, then delete (only for types that support snapshots)
    Snapshot,
}

impl RemovalPolicy {
    pub fn as_cfn(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub depends_on: Vec<String>,
    pub removal_policy: Option<RemovalPolicy>,
}

pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
    pub options: ResourceOptions,
}

/// A named set of resources that is deployed as one CloudFormation stack.
pub struct Stack {
    name: String,
    env: Environment,
    description: Option<String>,
    resources: Vec<Resource>,
    outputs: BTreeMap<String, ResourceOutput>,
}

impl Stack {
    pub fn new(name: &str, env: Environment) -> Result<Self> {
        let name = validate_stack_name(name)?;
        Ok(Self {
            name,
            env,
            description: None,
            resources: vec![],
            outputs: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.iter().any(|r| r.name == logical_id)
    }

    /// The logical id a construct id maps to in this stack. The hash suffix
    /// keeps ids stable across synths and unique across stacks.
    pub fn logical_id(&self, construct_id: &str) -> Result<String> {
        let path = format!("{}/{}", self.name, construct_id);
        let hash = adler::adler32_slice(path.as_bytes());
        let prefix: String = construct_id.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let logical_id = format!("{prefix}{hash:08X}");
        verify_resource_name(&logical_id)?;
        Ok(logical_id)
    }

    pub fn add<R: CfnResource + 'static>(&mut self, construct_id: &str, resource: R) -> Result<String> {
        self.add_with_options(construct_id, resource, ResourceOptions::default())
    }

    /// Declares a resource and returns its logical id. Every resource the new
    /// one references, by property or `DependsOn`, must already be declared.
    pub fn add_with_options<R: CfnResource + 'static>(
        &mut self,
        construct_id: &str,
        resource: R,
        options: ResourceOptions,
    ) -> Result<String> {
        let name = self.logical_id(construct_id)?;
        if self.contains(&name) {
            return Err(Error::DuplicateLogicalId(name));
        }
        let mut referenced = vec![];
        collect_references(&resource.properties(), &mut referenced);
        referenced.extend(options.depends_on.iter().cloned());
        if let Some(missing) = referenced.iter().find(|r| !self.contains(r)) {
            return Err(Error::invalid_resource(
                &name,
                format!("references '{missing}' which is not declared in stack {}", self.name),
            ));
        }
        debug!(stack = %self.name, logical_id = %name, ty = resource.type_string(), "declared resource");
        self.resources.push(Resource {
            name: name.clone(),
            properties: Box::new(resource),
            options,
        });
        Ok(name)
    }

    pub fn add_output(&mut self, name: &str, description: &str, value: StrVal) -> Result<()> {
        verify_resource_name(name)?;
        self.outputs.insert(
            name.to_string(),
            ResourceOutput {
                description: description.to_string(),
                value,
            },
        );
        Ok(())
    }

    pub fn to_template(&self) -> Result<Template> {
        let mut out_template = Template {
            description: self.description.clone(),
            outputs: self.outputs.clone(),
            ..Default::default()
        };
        for resource in self.resources.iter() {
            resource
                .properties
                .validate()
                .map_err(|e| Error::ResourceValidation {
                    name: resource.name.clone(),
                    source: Box::new(e),
                })?;
            let policy = resource.options.removal_policy.map(|p| p.as_cfn().to_string());
            let saved_resource = SavedResource {
                ty: resource.properties.type_string().to_string(),
                properties: resource.properties.properties(),
                depends_on: resource.options.depends_on.clone(),
                deletion_policy: policy.clone(),
                update_replace_policy: policy,
            };
            out_template.resources.insert(resource.name.clone(), saved_resource);
        }
        Ok(out_template)
    }

    /// Writes `<out_dir>/<stack name>.template.json` and returns its path.
    pub fn synth<P: AsRef<Path>>(&self, out_dir: P) -> Result<PathBuf> {
        let out_dir = out_dir.as_ref();
        let body = self.to_template()?.to_json_pretty()?;
        std::fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
        let path = out_dir.join(format!("{}.template.json", self.name));
        std::fs::write(&path, body).map_err(|e| Error::io(&path, e))?;
        info!(stack = %self.name, resources = self.resources.len(), ?path, "synthesized template");
        Ok(path)
    }
}

fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Ok(intrinsic) = serde_json::from_value::<StrVal>(value.clone()) {
                if let StrVal::Fn(_) = intrinsic {
                    for r in intrinsic.references() {
                        if !r.starts_with("AWS::") {
                            out.push(r.to_string());
                        }
                    }
                    return;
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

/// A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
/// It must start with an alphabetical character and can't be longer than 128 characters.
pub fn validate_stack_name(stack_name: &str) -> Result<String> {
    let reason = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let invalid = || Error::InvalidStackName {
        name: stack_name.to_string(),
        reason,
    };
    let mut chars = stack_name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid()),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') || stack_name.len() > 128 {
        return Err(invalid());
    }
    Ok(stack_name.to_string())
}

pub fn verify_resource_name(resource_name: &str) -> Result<()> {
    let reason = if resource_name.len() > 255 {
        "must be less than 255 characters"
    } else if resource_name.is_empty() {
        "Must contain at least 1 character"
    } else if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        "Must contain only alphanumeric characters [A-Za-z0-9]"
    } else {
        return Ok(());
    };
    Err(Error::InvalidLogicalId {
        name: resource_name.to_string(),
        reason,
    })
}
