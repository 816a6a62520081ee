//! GitHub REST API source implementation

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::OwnerKind;
use crate::version::error::RegistryError;
use crate::version::registry::ReleaseSource;
use crate::version::types::{AppManifest, Release, Repository, WorkflowRun};

/// Default base URL for GitHub API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Maximum page size accepted by the GitHub API
const DEFAULT_PAGE_SIZE: usize = 100;

const MANIFEST_PATH: &str = "app.json";

/// Response from the repository contents API
#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
    encoding: String,
}

/// Response from the workflow runs API
#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    workflow_runs: Vec<WorkflowRun>,
}

/// Source implementation backed by the GitHub REST API
pub struct GitHubRegistry {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    owner_kind: OwnerKind,
    page_size: usize,
}

impl GitHubRegistry {
    /// Creates a new GitHubRegistry with a custom base URL
    pub fn new(base_url: &str, token: Option<String>, owner_kind: OwnerKind) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("bc-env-manager")
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            owner_kind,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the repository listing page size, capped at the API maximum
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, RegistryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(path.to_string()));
        }

        let rate_limit_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || (status == reqwest::StatusCode::FORBIDDEN && rate_limit_exhausted)
        {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(RegistryError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RegistryError> {
        self.get(path).await?.json().await.map_err(|e| {
            warn!("Failed to parse GitHub response for {}: {}", path, e);
            RegistryError::InvalidResponse(e.to_string())
        })
    }

    fn repositories_path(&self, owner: &str) -> String {
        match self.owner_kind {
            // public repositories only, even with a token
            OwnerKind::User => format!("/users/{owner}/repos"),
            OwnerKind::Org => format!("/orgs/{owner}/repos"),
        }
    }
}

impl Default for GitHubRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None, OwnerKind::default())
    }
}

/// Decode a base64 `app.json` payload as returned by the contents API.
///
/// GitHub wraps the base64 text at 60 columns and AL tooling often writes a
/// UTF-8 BOM, so whitespace and the BOM are stripped before parsing.
pub fn decode_manifest(content: &str) -> Result<AppManifest, RegistryError> {
    let decode_error = |reason: String| RegistryError::Decode {
        path: MANIFEST_PATH.to_string(),
        reason,
    };

    let compact: String = content.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| decode_error(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))?;

    serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| decode_error(e.to_string()))
}

#[async_trait::async_trait]
impl ReleaseSource for GitHubRegistry {
    async fn list_repositories(&self, owner: &str) -> Result<Vec<Repository>, RegistryError> {
        let base_path = self.repositories_path(owner);
        let mut repositories = Vec::new();
        let mut page = 1;

        loop {
            let path = format!("{}?per_page={}&page={}", base_path, self.page_size, page);
            let batch: Vec<Repository> = self.get_json(&path).await?;
            let batch_len = batch.len();

            repositories.extend(batch.into_iter().filter(|repo| !repo.archived));

            if batch_len < self.page_size {
                break;
            }
            page += 1;
        }

        debug!("Found {} repositories for {}", repositories.len(), owner);
        Ok(repositories)
    }

    async fn fetch_app_manifest(&self, repo: &str) -> Result<Option<AppManifest>, RegistryError> {
        let path = format!("/repos/{}/contents/{}", repo, MANIFEST_PATH);
        let content: ContentResponse = match self.get_json(&path).await {
            Ok(content) => content,
            Err(RegistryError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if content.encoding != "base64" {
            return Err(RegistryError::Decode {
                path: format!("{repo}/{MANIFEST_PATH}"),
                reason: format!("unsupported encoding {}", content.encoding),
            });
        }

        decode_manifest(&content.content).map(Some)
    }

    async fn list_releases(&self, repo: &str) -> Result<Vec<Release>, RegistryError> {
        self.get_json(&format!("/repos/{}/releases?per_page=100", repo))
            .await
    }

    async fn latest_workflow_run(&self, repo: &str) -> Result<Option<WorkflowRun>, RegistryError> {
        let path = format!("/repos/{}/actions/runs?per_page=1", repo);
        match self.get_json::<WorkflowRunsResponse>(&path).await {
            Ok(runs) => Ok(runs.workflow_runs.into_iter().next()),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use rstest::rstest;

    fn encode(json: &str) -> String {
        let encoded = STANDARD.encode(json);
        // GitHub wraps content at 60 columns
        encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn page_query(page: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), page.into()),
        ])
    }

    #[rstest]
    #[case(0, 1)]
    #[case(2, 2)]
    #[case(100, 100)]
    #[case(200, 100)]
    fn with_page_size_stays_within_api_limits(#[case] requested: usize, #[case] expected: usize) {
        let registry = GitHubRegistry::default().with_page_size(requested);
        assert_eq!(registry.page_size, expected);
    }

    #[tokio::test]
    async fn list_repositories_with_oversized_page_size_follows_full_pages() {
        let mut server = Server::new_async().await;
        let full_page: Vec<_> = (0..100)
            .map(|i| serde_json::json!({"full_name": format!("contoso/app-{i}")}))
            .collect();

        let first = server
            .mock("GET", "/orgs/contoso/repos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::Value::Array(full_page).to_string())
            .create_async()
            .await;
        let second = server
            .mock("GET", "/orgs/contoso/repos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("page".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"full_name": "contoso/last"}]"#)
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org).with_page_size(200);
        let repos = registry.list_repositories("contoso").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(repos.len(), 101);
    }

    #[test]
    fn decode_manifest_handles_wrapped_base64_and_bom() {
        let json = "\u{feff}{\"id\":\"a1\",\"name\":\"Sales\",\"publisher\":\"Contoso\",\"version\":\"18.0.0.0\",\"brief\":\"x\"}";

        let manifest = decode_manifest(&encode(json)).unwrap();

        assert_eq!(
            manifest,
            AppManifest {
                id: "a1".to_string(),
                name: "Sales".to_string(),
                publisher: "Contoso".to_string(),
                version: "18.0.0.0".to_string(),
            }
        );
    }

    #[test]
    fn decode_manifest_accepts_pascal_case_keys() {
        let json = r#"{"Id":"a1","Name":"Sales","Publisher":"Contoso","Version":"1.0.0.0"}"#;

        let manifest = decode_manifest(&encode(json)).unwrap();

        assert_eq!(manifest.id, "a1");
        assert_eq!(manifest.version, "1.0.0.0");
    }

    #[test]
    fn decode_manifest_rejects_invalid_base64() {
        let result = decode_manifest("not base64 !!");
        assert!(matches!(result, Err(RegistryError::Decode { .. })));
    }

    #[test]
    fn decode_manifest_rejects_missing_fields() {
        let result = decode_manifest(&encode(r#"{"id":"a1"}"#));
        assert!(matches!(result, Err(RegistryError::Decode { .. })));
    }

    #[tokio::test]
    async fn list_repositories_follows_pages_and_skips_archived() {
        let mut server = Server::new_async().await;

        let first = server
            .mock("GET", "/orgs/contoso/repos")
            .match_query(page_query("1"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"full_name": "contoso/sales", "archived": false},
                    {"full_name": "contoso/legacy", "archived": true}
                ]"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/orgs/contoso/repos")
            .match_query(page_query("2"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"full_name": "contoso/service"}]"#)
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org).with_page_size(2);
        let repos = registry.list_repositories("contoso").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let names: Vec<_> = repos.into_iter().map(|r| r.full_name).collect();
        assert_eq!(names, vec!["contoso/sales", "contoso/service"]);
    }

    #[tokio::test]
    async fn list_repositories_sends_bearer_token() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/users/someone/repos")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let registry =
            GitHubRegistry::new(&server.url(), Some("secret".to_string()), OwnerKind::User);
        let repos = registry.list_repositories("someone").await.unwrap();

        mock.assert_async().await;
        assert!(repos.is_empty());
    }

    #[tokio::test]
    async fn fetch_app_manifest_decodes_content() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({
            "encoding": "base64",
            "content": encode(r#"{"id":"a1","name":"Sales","publisher":"Contoso","version":"18.0.0.0"}"#),
        });

        let mock = server
            .mock("GET", "/repos/contoso/sales/contents/app.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let manifest = registry.fetch_app_manifest("contoso/sales").await.unwrap();

        mock.assert_async().await;
        assert_eq!(manifest.map(|m| m.version), Some("18.0.0.0".to_string()));
    }

    #[tokio::test]
    async fn fetch_app_manifest_returns_none_when_missing() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/contoso/docs/contents/app.json")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let manifest = registry.fetch_app_manifest("contoso/docs").await.unwrap();

        mock.assert_async().await;
        assert_eq!(manifest, None);
    }

    #[tokio::test]
    async fn list_releases_parses_release_fields() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/contoso/sales/releases")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"tag_name": "v18.1.0.0", "name": "18.1", "draft": false, "prerelease": true, "published_at": "2024-02-01T00:00:00Z"},
                    {"tag_name": "v18.0.0.0", "name": null, "draft": false, "prerelease": false, "published_at": "2024-01-01T00:00:00Z"}
                ]"#,
            )
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let releases = registry.list_releases("contoso/sales").await.unwrap();

        mock.assert_async().await;
        assert_eq!(releases.len(), 2);
        assert!(releases[0].prerelease);
        assert_eq!(releases[1].tag_name, "v18.0.0.0");
        assert!(releases[1].published_at.is_some());
    }

    #[tokio::test]
    async fn list_releases_returns_rate_limited_for_429() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/contoso/sales/releases")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "60")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let result = registry.list_releases("contoso/sales").await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(RegistryError::RateLimited {
                retry_after_secs: Some(60)
            })
        ));
    }

    #[tokio::test]
    async fn list_releases_returns_rate_limited_for_exhausted_403() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/contoso/sales/releases")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let result = registry.list_releases("contoso/sales").await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(RegistryError::RateLimited {
                retry_after_secs: None
            })
        ));
    }

    #[tokio::test]
    async fn latest_workflow_run_returns_first_run() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/contoso/sales/actions/runs")
            .match_query(Matcher::UrlEncoded("per_page".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"total_count": 5, "workflow_runs": [{"status": "completed", "conclusion": "failure"}]}"#,
            )
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let run = registry.latest_workflow_run("contoso/sales").await.unwrap();

        mock.assert_async().await;
        assert_eq!(run.as_ref().map(|r| r.label()), Some("failure"));
    }

    #[tokio::test]
    async fn latest_workflow_run_returns_none_without_runs() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/contoso/sales/actions/runs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total_count": 0, "workflow_runs": []}"#)
            .create_async()
            .await;

        let registry = GitHubRegistry::new(&server.url(), None, OwnerKind::Org);
        let run = registry.latest_workflow_run("contoso/sales").await.unwrap();

        mock.assert_async().await;
        assert_eq!(run, None);
    }
}
