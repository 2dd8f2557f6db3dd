use serde::Serialize;
use serde_json::Value;

use super::*;

/// Inline `ZipFile` code is capped by CloudFormation.
pub const MAX_INLINE_CODE_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionRuntime {
    #[serde(rename = "nodejs20.x")]
    Nodejs20x,
    #[serde(rename = "nodejs22.x")]
    Nodejs22x,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Code {
    pub zip_file: String,
}

/// `AWS::Lambda::Function` with inline code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub runtime: FunctionRuntime,
    pub handler: String,
    pub role: StrVal,
    pub code: Code,
    pub memory_size: u32,
    pub timeout: u32,
}

impl CfnResource for CfnFunction {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }
    fn properties(&self) -> Value {
        to_properties(self)
    }
    fn validate(&self) -> Result<()> {
        if self.code.zip_file.len() > MAX_INLINE_CODE_BYTES {
            return Err(Error::invalid_resource(
                "AWS::Lambda::Function",
                format!("inline code is {} bytes, the limit is {MAX_INLINE_CODE_BYTES}", self.code.zip_file.len()),
            ));
        }
        if !(128..=10240).contains(&self.memory_size) {
            return Err(Error::invalid_resource("AWS::Lambda::Function", "memory must be between 128 and 10240 MB"));
        }
        if !(1..=900).contains(&self.timeout) {
            return Err(Error::invalid_resource("AWS::Lambda::Function", "timeout must be between 1 and 900 seconds"));
        }
        Ok(())
    }
}
