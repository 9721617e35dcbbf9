//! Error taxonomy for the release-note pipeline.
//!
//! Only a handful of failures ever reach the caller: a bad configuration,
//! a failed commit listing, a failed publish, or a failed artifact write.
//! Everything else is absorbed inside the pipeline and shows up as
//! placeholder text in the composed document.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, HeraldError>;

/// Failure talking to either external API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429 from the host.
    #[error("rate limited by host: {0}")]
    RateLimited(String),

    #[error("host returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether a single bounded retry is allowed.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimited(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            // Strip the URL: it may carry query parameters we do not want in logs.
            TransportError::Network(err.without_url().to_string())
        }
    }
}

/// Pass a successful response through, or turn it into a [`TransportError`].
///
/// 429 is always a rate limit. GitHub also reports exhausted quotas as 403
/// with `x-ratelimit-remaining: 0`, which is treated the same way.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let quota_exhausted = status.as_u16() == 403
        && response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 || quota_exhausted {
        Err(TransportError::RateLimited(body))
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Errors that end a pipeline invocation.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// A required credential or identifier is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to list commits: {0}")]
    CommitList(#[source] TransportError),

    #[error("failed to publish release {tag}: {source}")]
    Publish {
        tag: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to write release notes to {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HeraldError {
    /// Short machine-readable kind, used in webhook responses.
    pub fn kind(&self) -> &'static str {
        match self {
            HeraldError::Configuration(_) => "configuration",
            HeraldError::CommitList(_) => "commit_list",
            HeraldError::Publish { .. } => "publish",
            HeraldError::Artifact { .. } => "artifact",
        }
    }
}
