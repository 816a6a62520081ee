//! Side-by-side comparison of the apps installed in several environments

use indexmap::IndexMap;
use serde::Serialize;

use crate::environment::types::Environment;
use crate::version::parser::parse;

/// How an app's installations differ across the compared environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowStatus {
    /// Installed everywhere with equal versions
    Identical,
    /// Installed everywhere, but versions differ
    VersionMismatch,
    /// Absent from at least one environment
    Missing,
}

/// One app across all compared environments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub app_id: String,
    pub name: String,
    /// Installed version per environment, in environment order; `None` when absent
    pub versions: Vec<Option<String>>,
    pub status: RowStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentComparison {
    pub environments: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl EnvironmentComparison {
    /// Rows that are not identical across environments
    pub fn differences(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows
            .iter()
            .filter(|row| row.status != RowStatus::Identical)
    }
}

/// Whether two installed version strings denote the same version.
///
/// Parseable versions compare with zero padding (`18.0` == `18.0.0.0`);
/// anything else falls back to exact text.
fn same_version(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let (left, right) = (parse(a), parse(b));
            if left.is_empty() || right.is_empty() {
                a == b
            } else {
                left.compare(&right).is_eq()
            }
        }
        (None, None) => true,
        _ => false,
    }
}

/// `installed[i]` is `None` when the app is absent from environment `i`,
/// otherwise the installed version (which may itself be unknown).
fn row_status(installed: &[Option<Option<&str>>]) -> RowStatus {
    if installed.iter().any(Option::is_none) {
        return RowStatus::Missing;
    }

    let mut versions = installed.iter().flatten().copied();
    let Some(first) = versions.next() else {
        return RowStatus::Identical;
    };

    if versions.all(|version| same_version(first, version)) {
        RowStatus::Identical
    } else {
        RowStatus::VersionMismatch
    }
}

/// Compare the installed apps of the given environments.
///
/// Rows follow the order in which apps are first seen, walking the
/// environments in the order given.
pub fn compare_environments(environments: &[&Environment]) -> EnvironmentComparison {
    let mut names: IndexMap<&str, &str> = IndexMap::new();
    for environment in environments {
        for app in &environment.installed_apps {
            names.entry(app.app_id.as_str()).or_insert(app.name.as_str());
        }
    }

    let rows = names
        .into_iter()
        .map(|(app_id, name)| {
            let installed: Vec<Option<Option<&str>>> = environments
                .iter()
                .map(|environment| {
                    environment
                        .installed_apps
                        .iter()
                        .find(|app| app.app_id == app_id)
                        .map(|app| app.version.as_deref())
                })
                .collect();

            ComparisonRow {
                app_id: app_id.to_string(),
                name: name.to_string(),
                versions: installed
                    .iter()
                    .map(|version| version.flatten().map(str::to_string))
                    .collect(),
                status: row_status(&installed),
            }
        })
        .collect();

    EnvironmentComparison {
        environments: environments.iter().map(|e| e.name.clone()).collect(),
        rows,
    }
}
