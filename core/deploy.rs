//! Interface to the external deployment collaborator, plus the retry loop
//! callers wrap around it. No network deployer lives in this crate.

use crate::config::Config;
use crate::error::{AppError, Result};
use log;
use serde::Serialize;
use std::path::Path;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient network timeout; worth another attempt.
    Timeout,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl DeployFailure {
    /// Builds a failure from an error message, recognising timeout-class
    /// errors by their wording.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        let kind = if lowered.contains("timeout")
            || lowered.contains("timed out")
            || lowered.contains("etimedout")
        {
            FailureKind::Timeout
        } else {
            FailureKind::Other
        };
        Self { kind, message }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

/// Publishes a local folder and returns its retrieval URLs.
pub trait Deployer {
    fn deploy(&self, folder: &Path, project: &str) -> Result<Vec<String>, DeployFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.deploy.max_attempts == 0 {
            return Err(AppError::InvalidArgument(
                "deploy.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts: config.deploy.max_attempts,
            delay: config.get_retry_delay()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReceipt {
    pub links: Vec<String>,
    pub attempts: u32,
}

pub fn deploy_with_retry<D: Deployer + ?Sized>(
    deployer: &D,
    folder: &Path,
    project: &str,
    policy: &RetryPolicy,
) -> Result<DeployReceipt> {
    if !folder.is_dir() {
        return Err(AppError::Deploy(format!(
            "Folder does not exist: {}",
            folder.display()
        )));
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        log::info!(
            "Deploying {} as '{}' (attempt {}/{})",
            folder.display(),
            project,
            attempt,
            policy.max_attempts
        );
        let failure = match deployer.deploy(folder, project) {
            Ok(links) if !links.is_empty() => {
                log::info!("Deployment succeeded: {}", links.join(", "));
                return Ok(DeployReceipt {
                    links,
                    attempts: attempt,
                });
            }
            Ok(_) => DeployFailure {
                kind: FailureKind::Other,
                message: "deployer returned no links".to_string(),
            },
            Err(failure) => failure,
        };

        if failure.is_transient() && attempt < policy.max_attempts {
            log::warn!(
                "Deployment attempt {} timed out ({}), retrying in {:?}",
                attempt,
                failure.message,
                policy.delay
            );
            thread::sleep(policy.delay);
            continue;
        }
        return Err(AppError::Deploy(format!(
            "Deployment failed after {} attempt(s): {}",
            attempt, failure.message
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct ScriptedDeployer {
        outcomes: RefCell<Vec<Result<Vec<String>, DeployFailure>>>,
        calls: RefCell<u32>,
    }

    impl ScriptedDeployer {
        fn new(mut outcomes: Vec<Result<Vec<String>, DeployFailure>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: RefCell::new(outcomes),
                calls: RefCell::new(0),
            }
        }
    }

    impl Deployer for ScriptedDeployer {
        fn deploy(&self, _folder: &Path, _project: &str) -> Result<Vec<String>, DeployFailure> {
            *self.calls.borrow_mut() += 1;
            self.outcomes
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(DeployFailure::from_message("script exhausted")))
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
        }
    }

    fn link(id: &str) -> Vec<String> {
        vec![format!("https://example.net/{}", id)]
    }

    #[test]
    fn classifies_timeouts_from_message() {
        assert!(DeployFailure::from_message("connect ETIMEDOUT 1.2.3.4:443").is_transient());
        assert!(DeployFailure::from_message("Request timed out").is_transient());
        assert!(!DeployFailure::from_message("Folder size exceeds limit").is_transient());
    }

    #[test]
    fn retries_a_timeout_once() {
        let tmp = TempDir::new().unwrap();
        let deployer = ScriptedDeployer::new(vec![
            Err(DeployFailure::from_message("socket timeout")),
            Ok(link("abc")),
        ]);
        let receipt = deploy_with_retry(&deployer, tmp.path(), "site", &policy()).unwrap();
        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.links, link("abc"));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let tmp = TempDir::new().unwrap();
        let deployer = ScriptedDeployer::new(vec![
            Err(DeployFailure::from_message("timeout")),
            Err(DeployFailure::from_message("timeout")),
            Ok(link("never")),
        ]);
        let err = deploy_with_retry(&deployer, tmp.path(), "site", &policy()).unwrap_err();
        assert!(matches!(err, AppError::Deploy(_)));
        assert_eq!(*deployer.calls.borrow(), 2);
    }

    #[test]
    fn other_failures_are_not_retried() {
        let tmp = TempDir::new().unwrap();
        let deployer = ScriptedDeployer::new(vec![
            Err(DeployFailure::from_message("insufficient balance")),
            Ok(link("never")),
        ]);
        assert!(deploy_with_retry(&deployer, tmp.path(), "site", &policy()).is_err());
        assert_eq!(*deployer.calls.borrow(), 1);
    }

    #[test]
    fn empty_link_list_is_a_failure() {
        let tmp = TempDir::new().unwrap();
        let deployer = ScriptedDeployer::new(vec![Ok(Vec::new())]);
        assert!(deploy_with_retry(&deployer, tmp.path(), "site", &policy()).is_err());
    }

    #[test]
    fn missing_folder_fails_before_deploying() {
        let tmp = TempDir::new().unwrap();
        let deployer = ScriptedDeployer::new(vec![Ok(link("x"))]);
        let missing = tmp.path().join("dist");
        assert!(deploy_with_retry(&deployer, &missing, "site", &policy()).is_err());
        assert_eq!(*deployer.calls.borrow(), 0);
    }

    #[test]
    fn policy_comes_from_config() {
        let mut config = Config::default();
        let policy = RetryPolicy::from_config(&config).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay, Duration::from_secs(2));

        config.deploy.max_attempts = 0;
        assert!(RetryPolicy::from_config(&config).is_err());
    }
}
