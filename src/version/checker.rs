//! Outdatedness classification for installed apps

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use crate::version::error::CacheError;
use crate::version::parser::parse;

/// Read access to the reference ("latest") version of each application
#[cfg_attr(test, automock)]
pub trait ReferenceStore: Send + Sync {
    /// Get the latest known version for an application
    fn get_latest_version(&self, app_id: &str) -> Result<Option<String>, CacheError>;
}

/// Anything that carries an installed version string
pub trait Installed {
    fn version(&self) -> Option<&str>;
}

impl Installed for &str {
    fn version(&self) -> Option<&str> {
        Some(*self)
    }
}

impl Installed for String {
    fn version(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl Installed for Option<String> {
    fn version(&self) -> Option<&str> {
        self.as_deref()
    }
}

/// Status of an installed version relative to the reference version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionStatus {
    /// Installed version equals the reference version
    Latest,
    /// Installed version is older than the reference version
    Outdated,
    /// Installed version is ahead of the reference (prerelease or development build)
    Newer,
    /// Either version contains no digits
    Invalid,
    /// No installed or reference version available
    NoReference,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Latest => "latest",
            VersionStatus::Outdated => "outdated",
            VersionStatus::Newer => "newer",
            VersionStatus::Invalid => "invalid",
            VersionStatus::NoReference => "no-reference",
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Classify an installed version against the reference version.
pub fn classify(installed: Option<&str>, latest: Option<&str>) -> VersionStatus {
    let (Some(installed), Some(latest)) = (non_empty(installed), non_empty(latest)) else {
        return VersionStatus::NoReference;
    };

    let installed = parse(installed);
    let latest = parse(latest);
    if installed.is_empty() || latest.is_empty() {
        return VersionStatus::Invalid;
    }

    match installed.compare(&latest) {
        Ordering::Less => VersionStatus::Outdated,
        Ordering::Equal => VersionStatus::Latest,
        Ordering::Greater => VersionStatus::Newer,
    }
}

/// Whether `installed` is strictly older than `latest`.
///
/// Missing, empty or unparseable input on either side is never outdated.
pub fn is_outdated(installed: Option<&str>, latest: Option<&str>) -> bool {
    classify(installed, latest) == VersionStatus::Outdated
}

/// Count the installations that are outdated relative to `latest`.
pub fn count_outdated<I: Installed>(latest: Option<&str>, installations: &[I]) -> usize {
    if non_empty(latest).is_none() {
        return 0;
    }

    installations
        .iter()
        .filter(|installation| is_outdated(installation.version(), latest))
        .count()
}

/// Per-application row of a fleet summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetRow {
    pub app_id: String,
    pub latest_version: Option<String>,
    pub installations: usize,
    pub outdated: usize,
}

/// Outdated counts across every installation of every application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub rows: Vec<FleetRow>,
    pub total_installations: usize,
    pub total_outdated: usize,
}

/// Group installations by application id and count outdated ones per app.
///
/// Rows keep the order in which applications first appear.
pub fn summarize_fleet<'a, S, I>(
    store: &S,
    installations: impl IntoIterator<Item = (&'a str, I)>,
) -> Result<FleetSummary, CacheError>
where
    S: ReferenceStore + ?Sized,
    I: Installed,
{
    let mut grouped: IndexMap<&'a str, Vec<I>> = IndexMap::new();
    for (app_id, installation) in installations {
        grouped.entry(app_id).or_default().push(installation);
    }

    let mut summary = FleetSummary::default();
    for (app_id, installs) in grouped {
        let latest_version = store.get_latest_version(app_id)?;
        let outdated = count_outdated(latest_version.as_deref(), &installs);

        summary.total_installations += installs.len();
        summary.total_outdated += outdated;
        summary.rows.push(FleetRow {
            app_id: app_id.to_string(),
            latest_version,
            installations: installs.len(),
            outdated,
        });
    }

    Ok(summary)
}
