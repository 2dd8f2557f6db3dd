//! Pushes a synthesized template to CloudFormation and waits for it to settle.

use std::collections::BTreeMap;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, OnFailure, StackStatus};
use aws_sdk_cloudformation::Client;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Shared SDK config. An empty region falls back to the default provider chain.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if !region.is_empty() {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// An empty `expected` accepts any account.
pub fn check_account(expected: &str, actual: Option<&str>) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    match actual {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(Error::AccountMismatch {
            expected: expected.to_string(),
            actual: actual.unwrap_or("<unknown>").to_string(),
        }),
    }
}

/// Makes sure the credentials in `sdk_config` act on `expected`. Skips the
/// STS call when no account is configured.
pub async fn verify_account(sdk_config: &SdkConfig, expected: &str) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let client = aws_sdk_sts::Client::new(sdk_config);
    let identity = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| Error::Aws(aws_error(&e)))?;
    check_account(expected, identity.account())?;
    debug!(account = expected, "credentials match the target account");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    InProgress,
    Complete,
    Failed,
}

/// Rollbacks count as failures even when they completed.
pub fn stack_state(status: &StackStatus) -> StackState {
    let status = status.as_str();
    if status.ends_with("_IN_PROGRESS") {
        StackState::InProgress
    } else if status.ends_with("_FAILED") || status.contains("ROLLBACK") {
        StackState::Failed
    } else {
        StackState::Complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
    Created,
    Updated,
    Unchanged,
}

/// What a describe call reports about one stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSnapshot {
    pub status: StackStatus,
    pub reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

/// The CloudFormation calls deploy and destroy are built from.
#[allow(async_fn_in_trait)]
pub trait StackApi {
    /// `Ok(None)` when no stack by that name exists.
    async fn describe(&self, name: &str) -> Result<Option<StackSnapshot>>;
    async fn create(&self, name: &str, body: &str) -> Result<()>;
    /// `Ok(false)` when the template matches what is deployed.
    async fn update(&self, name: &str, body: &str) -> Result<bool>;
    async fn delete(&self, name: &str) -> Result<()>;
}

fn aws_error<E: std::error::Error>(e: &E) -> String {
    DisplayErrorContext(e).to_string()
}

fn error_says<E: ProvideErrorMetadata + std::error::Error>(e: &E, needle: &str) -> bool {
    e.message().is_some_and(|m| m.contains(needle)) || aws_error(e).contains(needle)
}

impl StackApi for Client {
    async fn describe(&self, name: &str) -> Result<Option<StackSnapshot>> {
        let resp = match self.describe_stacks().stack_name(name).send().await {
            Ok(resp) => resp,
            Err(e) if error_says(&e, "does not exist") => return Ok(None),
            Err(e) => return Err(Error::Aws(aws_error(&e))),
        };
        let Some(stack) = resp.stacks().first() else {
            return Ok(None);
        };
        let status = stack.stack_status().cloned().ok_or_else(|| Error::StackFailed {
            stack: name.to_string(),
            reason: "stack has no status".to_string(),
        })?;
        let outputs = stack
            .outputs()
            .iter()
            .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
            .collect();
        Ok(Some(StackSnapshot {
            status,
            reason: stack.stack_status_reason().map(str::to_string),
            outputs,
        }))
    }

    async fn create(&self, name: &str, body: &str) -> Result<()> {
        self.create_stack()
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await
            .map_err(|e| Error::Aws(aws_error(&e)))?;
        Ok(())
    }

    async fn update(&self, name: &str, body: &str) -> Result<bool> {
        let resp = self
            .update_stack()
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await;
        match resp {
            Ok(_) => Ok(true),
            Err(e) if error_says(&e, "No updates are to be performed") => Ok(false),
            Err(e) => Err(Error::Aws(aws_error(&e))),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| Error::Aws(aws_error(&e)))?;
        Ok(())
    }
}

pub async fn does_stack_exist<C: StackApi>(api: &C, name: &str) -> Result<bool> {
    Ok(api.describe(name).await?.is_some())
}

/// `Ok(None)` while the stack is still changing, `Ok(Some(stack))` once it
/// settled successfully.
pub async fn describe_stack<C: StackApi>(api: &C, name: &str) -> Result<Option<StackSnapshot>> {
    let stack = api.describe(name).await?.ok_or_else(|| Error::StackFailed {
        stack: name.to_string(),
        reason: "stack not found".to_string(),
    })?;
    debug!(stack = name, status = stack.status.as_str(), "stack status");
    match stack_state(&stack.status) {
        StackState::InProgress => Ok(None),
        StackState::Complete => Ok(Some(stack)),
        StackState::Failed => Err(Error::StackFailed {
            stack: name.to_string(),
            reason: format!(
                "{}: {}",
                stack.status.as_str(),
                stack.reason.as_deref().unwrap_or("Failed to get stack failure reason")
            ),
        }),
    }
}

pub async fn wait_for_output<C: StackApi>(api: &C, name: &str) -> Result<BTreeMap<String, String>> {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        if !does_stack_exist(api, name).await? {
            // OnFailure::Delete removes stacks that failed to create
            return Err(Error::StackFailed {
                stack: name.to_string(),
                reason: "stack was rolled back and deleted".to_string(),
            });
        }
        if let Some(stack) = describe_stack(api, name).await? {
            return Ok(stack.outputs);
        }
    }
}

pub async fn create_or_update_stack<C: StackApi>(api: &C, name: &str, body: &str) -> Result<StackChange> {
    if does_stack_exist(api, name).await? {
        info!(stack = name, "updating stack");
        if !api.update(name, body).await? {
            info!(stack = name, "no changes");
            return Ok(StackChange::Unchanged);
        }
        Ok(StackChange::Updated)
    } else {
        info!(stack = name, "creating stack");
        api.create(name, body).await?;
        Ok(StackChange::Created)
    }
}

/// Creates or updates `name` and returns its outputs once it settles.
pub async fn deploy<C: StackApi>(api: &C, name: &str, body: &str) -> Result<BTreeMap<String, String>> {
    let change = create_or_update_stack(api, name, body).await?;
    let outputs = match change {
        StackChange::Unchanged => match describe_stack(api, name).await? {
            Some(stack) => stack.outputs,
            None => wait_for_output(api, name).await?,
        },
        StackChange::Created | StackChange::Updated => wait_for_output(api, name).await?,
    };
    info!(stack = name, ?change, "deploy finished");
    Ok(outputs)
}

/// Deletes `name` and waits until it is gone. Returns false when there was
/// nothing to delete.
pub async fn destroy<C: StackApi>(api: &C, name: &str) -> Result<bool> {
    if !does_stack_exist(api, name).await? {
        warn!(stack = name, "stack does not exist, nothing to destroy");
        return Ok(false);
    }
    info!(stack = name, "deleting stack");
    api.delete(name).await?;
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        if !does_stack_exist(api, name).await? {
            break;
        }
        // a deleted stack is only reachable by name until it disappears
        if let Some(stack) = describe_stack(api, name).await? {
            if stack.status == StackStatus::DeleteComplete {
                break;
            }
        }
    }
    info!(stack = name, "stack deleted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Answers describe calls from a script, one entry per call. The last
    /// entry repeats once the script runs out.
    #[derive(Default)]
    struct ScriptedStacks {
        describes: Mutex<VecDeque<Option<StackSnapshot>>>,
        no_updates: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedStacks {
        fn new(script: Vec<Option<StackSnapshot>>) -> Self {
            Self {
                describes: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl StackApi for ScriptedStacks {
        async fn describe(&self, _name: &str) -> Result<Option<StackSnapshot>> {
            self.calls.lock().unwrap().push("describe");
            let mut script = self.describes.lock().unwrap();
            if script.len() > 1 {
                Ok(script.pop_front().unwrap())
            } else {
                Ok(script.front().cloned().unwrap())
            }
        }
        async fn create(&self, _name: &str, _body: &str) -> Result<()> {
            self.calls.lock().unwrap().push("create");
            Ok(())
        }
        async fn update(&self, _name: &str, _body: &str) -> Result<bool> {
            self.calls.lock().unwrap().push("update");
            Ok(!self.no_updates)
        }
        async fn delete(&self, _name: &str) -> Result<()> {
            self.calls.lock().unwrap().push("delete");
            Ok(())
        }
    }

    fn stack(status: StackStatus) -> Option<StackSnapshot> {
        Some(StackSnapshot {
            status,
            reason: Some("because".to_string()),
            outputs: BTreeMap::from([("SiteUrl".to_string(), "https://www.example.com".to_string())]),
        })
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(stack_state(&StackStatus::CreateComplete), StackState::Complete);
        assert_eq!(stack_state(&StackStatus::UpdateComplete), StackState::Complete);
        assert_eq!(stack_state(&StackStatus::DeleteComplete), StackState::Complete);
        assert_eq!(stack_state(&StackStatus::CreateInProgress), StackState::InProgress);
        assert_eq!(
            stack_state(&StackStatus::UpdateRollbackCompleteCleanupInProgress),
            StackState::InProgress
        );
        assert_eq!(stack_state(&StackStatus::RollbackComplete), StackState::Failed);
        assert_eq!(stack_state(&StackStatus::UpdateRollbackComplete), StackState::Failed);
        assert_eq!(stack_state(&StackStatus::DeleteFailed), StackState::Failed);
    }

    #[test]
    fn account_must_match_when_configured() {
        assert!(check_account("", Some("999999999999")).is_ok());
        assert!(check_account("123456789012", Some("123456789012")).is_ok());
        let err = check_account("123456789012", Some("999999999999")).unwrap_err();
        assert!(matches!(
            err,
            Error::AccountMismatch { ref expected, ref actual } if expected == "123456789012" && actual == "999999999999"
        ));
        assert!(matches!(check_account("123456789012", None), Err(Error::AccountMismatch { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_completion() {
        let api = ScriptedStacks::new(vec![
            None,
            stack(StackStatus::CreateInProgress),
            stack(StackStatus::CreateInProgress),
            stack(StackStatus::CreateInProgress),
            stack(StackStatus::CreateComplete),
        ]);
        let outputs = deploy(&api, "site", "{}").await.unwrap();
        assert_eq!(outputs["SiteUrl"], "https://www.example.com");
        assert_eq!(api.calls()[..2], ["describe", "create"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_that_was_deleted_is_an_error() {
        let api = ScriptedStacks::new(vec![
            None,
            stack(StackStatus::CreateInProgress),
            stack(StackStatus::CreateInProgress),
            None,
        ]);
        let err = deploy(&api, "site", "{}").await.unwrap_err();
        assert!(err.to_string().contains("rolled back and deleted"));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_stack_returns_current_outputs() {
        let api = ScriptedStacks {
            no_updates: true,
            ..ScriptedStacks::new(vec![stack(StackStatus::UpdateComplete)])
        };
        let outputs = deploy(&api, "site", "{}").await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(api.calls(), ["describe", "update", "describe"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rolled_back_update_is_an_error() {
        let api = ScriptedStacks::new(vec![
            stack(StackStatus::UpdateComplete),
            stack(StackStatus::UpdateRollbackInProgress),
            stack(StackStatus::UpdateRollbackInProgress),
            stack(StackStatus::UpdateRollbackComplete),
        ]);
        let err = deploy(&api, "site", "{}").await.unwrap_err();
        assert!(matches!(err, Error::StackFailed { ref reason, .. } if reason.contains("because")));
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_waits_until_the_stack_is_gone() {
        let api = ScriptedStacks::new(vec![
            stack(StackStatus::CreateComplete),
            stack(StackStatus::DeleteInProgress),
            stack(StackStatus::DeleteInProgress),
            None,
        ]);
        assert!(destroy(&api, "site").await.unwrap());
        assert!(api.calls().contains(&"delete"));

        let missing = ScriptedStacks::new(vec![None]);
        assert!(!destroy(&missing, "site").await.unwrap());
        assert!(!missing.calls().contains(&"delete"));
    }
}
