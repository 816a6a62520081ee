//! Common types shared by the catalog and the GitHub source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An application tracked by the catalog, keyed by its `app.json` id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub app_id: String,
    pub name: String,
    pub publisher: String,
    /// GitHub repository in `owner/name` form
    pub repository: String,
    pub latest_version: Option<String>,
    pub latest_release_tag: Option<String>,
    pub workflow_status: Option<String>,
    /// Milliseconds since UNIX epoch of the last sync
    pub updated_at: i64,
}

/// The fields of a Business Central `app.json` manifest that the catalog needs
///
/// AL tooling writes PascalCase keys in older projects, so both spellings are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppManifest {
    #[serde(alias = "Id")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Publisher")]
    pub publisher: String,
    #[serde(alias = "Version")]
    pub version: String,
}

/// A GitHub repository as returned by the repository listing endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub archived: bool,
}

/// A GitHub release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// The most recent GitHub Actions workflow run of a repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRun {
    pub status: String,
    pub conclusion: Option<String>,
}

impl WorkflowRun {
    /// Single label for display: the conclusion once finished, the status otherwise
    pub fn label(&self) -> &str {
        self.conclusion.as_deref().unwrap_or(&self.status)
    }
}
