//! Catalog synchronization from GitHub
//!
//! Each repository that carries an `app.json` becomes one catalog entry. The
//! reference version is taken from the stable release matching the manifest
//! version, or the newest stable release, or the manifest itself.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{SYNC_STAGGER_DELAY_MS, SyncConfig};
use crate::version::cache::Cache;
use crate::version::error::RegistryError;
use crate::version::parser::{parse, strip_tag_prefix};
use crate::version::registry::ReleaseSource;
use crate::version::types::{CatalogEntry, Release};

/// Result of syncing a single repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Catalog entry written
    Synced,
    /// Repository has no `app.json`
    Skipped,
    /// Repository was synced within the refresh interval
    Fresh,
    /// Fetching or saving failed; see the log
    Failed,
}

/// Counts per outcome for an owner-wide sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synced: usize,
    pub skipped: usize,
    pub fresh: usize,
    pub failed: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Synced => self.synced += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Fresh => self.fresh += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }
}

/// Pick the release that represents the manifest version.
///
/// Drafts and prereleases are never selected. A stable release whose tag
/// equals the manifest version wins; otherwise the highest stable release is
/// used.
pub fn select_release<'a>(manifest_version: &str, releases: &'a [Release]) -> Option<&'a Release> {
    let manifest = parse(manifest_version);
    let published = || {
        releases
            .iter()
            .filter(|release| !release.draft && !release.prerelease)
    };

    if !manifest.is_empty() {
        let matching = published().find(|release| {
            let tag = parse(&release.tag_name);
            !tag.is_empty() && tag.compare(&manifest).is_eq()
        });
        if matching.is_some() {
            return matching;
        }
    }

    published()
        .map(|release| (release, parse(&release.tag_name)))
        .filter(|(_, version)| !version.is_empty())
        .max_by(|(_, a), (_, b)| a.compare(b))
        .map(|(release, _)| release)
}

/// Fetch one repository's manifest, releases and workflow status and save
/// them to the catalog.
///
/// Errors are logged and reported as [`SyncOutcome::Failed`].
pub async fn sync_repository(source: &dyn ReleaseSource, cache: &Cache, repo: &str) -> SyncOutcome {
    let manifest = match source.fetch_app_manifest(repo).await {
        Ok(Some(manifest)) => manifest,
        Ok(None) => {
            debug!("Skipping {}: no app.json", repo);
            return SyncOutcome::Skipped;
        }
        Err(e) => {
            error!("Failed to fetch app.json for {}: {}", repo, e);
            return SyncOutcome::Failed;
        }
    };

    let releases = match source.list_releases(repo).await {
        Ok(releases) => releases,
        Err(e) => {
            error!("Failed to fetch releases for {}: {}", repo, e);
            return SyncOutcome::Failed;
        }
    };

    let workflow_status = source
        .latest_workflow_run(repo)
        .await
        .inspect_err(|e| warn!("Failed to fetch workflow status for {}: {}", repo, e))
        .ok()
        .flatten()
        .map(|run| run.label().to_string());

    let release = select_release(&manifest.version, &releases);
    let latest_version = release
        .map(|r| strip_tag_prefix(&r.tag_name).to_string())
        .unwrap_or_else(|| manifest.version.clone());

    let entry = CatalogEntry {
        app_id: manifest.id,
        name: manifest.name,
        publisher: manifest.publisher,
        repository: repo.to_string(),
        latest_version: Some(latest_version),
        latest_release_tag: release.map(|r| r.tag_name.clone()),
        workflow_status,
        updated_at: Cache::current_timestamp_ms(),
    };

    match cache.upsert_application(&entry) {
        Ok(()) => {
            info!(
                "Synced {} ({}) latest={:?}",
                entry.name, repo, entry.latest_version
            );
            SyncOutcome::Synced
        }
        Err(e) => {
            error!("Failed to save catalog entry for {}: {}", repo, e);
            SyncOutcome::Failed
        }
    }
}

/// Sync every repository of an owner into the catalog
///
/// Repositories are processed `concurrency` at a time with staggered start
/// times. Only a failure to list the repositories is returned as an error;
/// per-repository failures are counted in the report.
pub async fn sync_owner(
    source: &dyn ReleaseSource,
    cache: &Cache,
    owner: &str,
    config: &SyncConfig,
    force: bool,
) -> Result<SyncReport, RegistryError> {
    let repositories = source.list_repositories(owner).await?;
    let concurrency = config.concurrency.max(1);
    info!(
        "Syncing {} repositories for {} ({} at a time)",
        repositories.len(),
        owner,
        concurrency
    );

    let outcomes: Vec<SyncOutcome> = stream::iter(repositories.into_iter().enumerate())
        .map(|(i, repo)| async move {
            let repo = repo.full_name;
            if !force {
                let fresh = cache
                    .is_repository_fresh(&repo, config.refresh_interval)
                    .inspect_err(|e| error!("Failed to check freshness of {}: {}", repo, e))
                    .unwrap_or(false);
                if fresh {
                    debug!("Skipping {}: synced recently", repo);
                    return SyncOutcome::Fresh;
                }
            }

            let delay = Duration::from_millis(SYNC_STAGGER_DELAY_MS * (i % concurrency) as u64);
            sleep(delay).await;
            sync_repository(source, cache, &repo).await
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = SyncReport::default();
    for outcome in outcomes {
        report.record(outcome);
    }

    info!(
        "Sync finished for {}: {} synced, {} skipped, {} fresh, {} failed",
        owner, report.synced, report.skipped, report.fresh, report.failed
    );
    Ok(report)
}
