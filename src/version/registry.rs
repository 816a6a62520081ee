//! Source trait for application metadata hosted on GitHub

#[cfg(test)]
use mockall::automock;

use crate::version::error::RegistryError;
use crate::version::types::{AppManifest, Release, Repository, WorkflowRun};

/// Trait for reading repositories, manifests, releases and workflow runs
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Lists every non-archived repository of an owner, following pagination
    async fn list_repositories(&self, owner: &str) -> Result<Vec<Repository>, RegistryError>;

    /// Fetches and decodes `app.json` from the default branch
    ///
    /// # Returns
    /// * `Ok(None)` - The repository has no `app.json`
    async fn fetch_app_manifest(&self, repo: &str) -> Result<Option<AppManifest>, RegistryError>;

    /// Fetches releases, newest first
    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>, RegistryError>;

    /// Fetches the most recent workflow run, if any
    async fn latest_workflow_run(&self, repo: &str) -> Result<Option<WorkflowRun>, RegistryError>;
}
