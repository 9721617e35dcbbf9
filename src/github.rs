//! Source-control host access.
//!
//! Defines the [`SourceHost`] trait the pipeline talks to, and
//! [`GitHubClient`], its implementation over the GitHub REST API.
//!
//! # Endpoints
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `GET`   | `/repos/{owner}/{repo}/releases` | window resolver, publisher |
//! | `GET`   | `/repos/{owner}/{repo}/commits?since&until` | commit fetcher |
//! | `GET`   | `/repos/{owner}/{repo}/commits/{sha}` | commit fetcher |
//! | `POST`  | `/repos/{owner}/{repo}/releases` | publisher |
//! | `PATCH` | `/repos/{owner}/{repo}/releases/{id}` | publisher |
//!
//! Every request carries the bearer token supplied by the caller and is
//! bounded by the configured timeout; a timeout surfaces as
//! [`TransportError::Timeout`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use tracing::debug;

use crate::error::{error_for_status, TransportError};
use crate::models::{CommitRecord, ReleaseRecord, ReleaseWindow};

/// Results per page requested from list endpoints. A shorter page ends a
/// listing.
const PER_PAGE: usize = 100;

/// One file as reported by the commit detail endpoint, before truncation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    pub filename: String,
    #[serde(default)]
    pub patch: Option<String>,
}

/// Body of a create-release request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl NewRelease {
    /// A published, non-prerelease release named `Release <tag>`.
    pub fn for_tag(tag: &str, body: &str) -> Self {
        Self {
            tag_name: tag.to_string(),
            name: format!("Release {}", tag),
            body: body.to_string(),
            draft: false,
            prerelease: false,
        }
    }
}

/// The operations the pipeline needs from a source-control host.
///
/// Implemented by [`GitHubClient`] for production and by in-memory fakes
/// in tests.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Releases in host order (most recent first on GitHub).
    async fn list_releases(&self) -> Result<Vec<ReleaseRecord>, TransportError>;

    /// Commits whose timestamps fall within the window, in host order.
    async fn list_commits(&self, window: &ReleaseWindow)
        -> Result<Vec<CommitRecord>, TransportError>;

    /// Files changed by one commit, with untruncated patches.
    async fn commit_files(&self, sha: &str) -> Result<Vec<RemoteFile>, TransportError>;

    async fn create_release(&self, release: &NewRelease) -> Result<ReleaseRecord, TransportError>;

    /// Replace only the body of an existing release.
    async fn update_release_body(&self, id: u64, body: &str)
        -> Result<ReleaseRecord, TransportError>;
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct ReleaseWire {
    id: u64,
    tag_name: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    body: Option<String>,
}

impl From<ReleaseWire> for ReleaseRecord {
    fn from(w: ReleaseWire) -> Self {
        ReleaseRecord {
            tag_name: w.tag_name,
            id: Some(w.id),
            published_at: w.published_at,
            body: w.body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitInner {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CommitListItem {
    sha: String,
    commit: CommitInner,
}

#[derive(Debug, Deserialize)]
struct CommitDetailWire {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    body: &'a str,
}

// ============ GitHub client ============

/// [`SourceHost`] backed by the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
    timeout: Duration,
}

impl GitHubClient {
    /// Build a client for one repository.
    ///
    /// `api_base` is normally `https://api.github.com`; tests point it at a
    /// local server.
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("release-herald/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            timeout,
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, suffix
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.timeout))?;
        error_for_status(response).await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.without_url().to_string()))
    }

    /// GET every page of a list endpoint, stopping at the first short page.
    async fn get_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, TransportError> {
        let mut all = Vec::new();
        for page in 1.. {
            let items: Vec<T> = self
                .send_json(
                    self.request(reqwest::Method::GET, url)
                        .query(query)
                        .query(&[("per_page", PER_PAGE), ("page", page)]),
                )
                .await?;
            let page_len = items.len();
            all.extend(items);
            if page_len < PER_PAGE {
                break;
            }
            debug!(url, page, "following next page");
        }
        Ok(all)
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn list_releases(&self) -> Result<Vec<ReleaseRecord>, TransportError> {
        let url = self.repo_url("releases");
        let releases: Vec<ReleaseWire> = self.get_all_pages(&url, &[]).await?;
        Ok(releases.into_iter().map(ReleaseRecord::from).collect())
    }

    async fn list_commits(
        &self,
        window: &ReleaseWindow,
    ) -> Result<Vec<CommitRecord>, TransportError> {
        let url = self.repo_url("commits");
        let query = [
            ("since", window.start_rfc3339()),
            ("until", window.end_rfc3339()),
        ];
        let items: Vec<CommitListItem> = self.get_all_pages(&url, &query).await?;
        Ok(items
            .into_iter()
            .map(|c| CommitRecord::new(c.sha, c.commit.message))
            .collect())
    }

    async fn commit_files(&self, sha: &str) -> Result<Vec<RemoteFile>, TransportError> {
        let url = self.repo_url(&format!("commits/{}", sha));
        let detail: CommitDetailWire = self
            .send_json(self.request(reqwest::Method::GET, &url))
            .await?;
        Ok(detail.files)
    }

    async fn create_release(&self, release: &NewRelease) -> Result<ReleaseRecord, TransportError> {
        let url = self.repo_url("releases");
        let created: ReleaseWire = self
            .send_json(self.request(reqwest::Method::POST, &url).json(release))
            .await?;
        Ok(created.into())
    }

    async fn update_release_body(
        &self,
        id: u64,
        body: &str,
    ) -> Result<ReleaseRecord, TransportError> {
        let url = self.repo_url(&format!("releases/{}", id));
        let updated: ReleaseWire = self
            .send_json(
                self.request(reqwest::Method::PATCH, &url)
                    .json(&UpdateBody { body }),
            )
            .await?;
        Ok(updated.into())
    }
}
