//! Core data models used throughout the release-note pipeline.
//!
//! These types represent the commit window, fetched commits, rewritten
//! descriptions, and the composed release document that flow from the
//! resolver through to the publisher.

use chrono::{DateTime, Utc};

/// The `[start, end]` time span of commits to summarize.
///
/// Constructed through [`ReleaseWindow::new`], which clamps `start` so that
/// `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReleaseWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: start.min(end),
            end,
        }
    }

    /// RFC 3339 rendering used for query parameters and document headers.
    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

/// One file touched by a commit, with its diff cut to the configured cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub patch_excerpt: String,
}

/// Per-commit change detail, or the reason it could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitChanges {
    /// Detail has not been requested yet (list responses carry no files).
    NotFetched,
    Files(Vec<FileChange>),
    /// The detail call failed; the string is the transport failure.
    Unavailable(String),
}

/// One source-control commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub raw_message: String,
    pub changes: CommitChanges,
}

impl CommitRecord {
    pub fn new(sha: impl Into<String>, raw_message: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            raw_message: raw_message.into(),
            changes: CommitChanges::NotFetched,
        }
    }

    /// Abbreviated SHA for logs and document entries.
    pub fn short_sha(&self) -> &str {
        let end = self
            .sha
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.sha.len());
        &self.sha[..end]
    }
}

/// How a rewritten description was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteSource {
    Generated,
    /// A fixed placeholder stood in for generated text.
    Placeholder,
}

/// AI-polished description of one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenCommit {
    pub sha: String,
    /// The original commit message, used for categorization.
    pub raw_message: String,
    pub text: String,
    pub source: RewriteSource,
}

impl RewrittenCommit {
    pub fn is_placeholder(&self) -> bool {
        self.source == RewriteSource::Placeholder
    }
}

/// The final composed note, ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDocument {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Cross-commit narrative ("Summary of Updates").
    pub summary_text: Option<String>,
    /// Per-category summaries, in category-table order. `None` under the flat policy.
    pub category_sections: Option<Vec<CategorySection>>,
    /// One entry per input commit, in source order.
    pub entries: Vec<RewrittenCommit>,
    /// Rendered markdown body.
    pub body: String,
}

/// Summarized text for one change category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySection {
    pub name: String,
    pub summary: String,
    pub commit_count: usize,
}

impl ReleaseDocument {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A release as reported by the source-control host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub tag_name: String,
    pub id: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
    pub body: Option<String>,
}

/// Result of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created { id: u64 },
    Updated { id: u64 },
}

impl PublishOutcome {
    pub fn id(&self) -> u64 {
        match self {
            PublishOutcome::Created { id } | PublishOutcome::Updated { id } => *id,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            PublishOutcome::Created { .. } => "created",
            PublishOutcome::Updated { .. } => "updated",
        }
    }
}

/// What a trigger adapter receives back from one pipeline invocation.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Notes were composed and published (or would have been, on a dry run).
    Published {
        tag: String,
        publish: Option<PublishOutcome>,
        document: ReleaseDocument,
    },
    /// The window held no commits; nothing was published.
    NoChanges {
        tag: String,
        document: ReleaseDocument,
    },
    Failed {
        reason: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }

    pub fn document(&self) -> Option<&ReleaseDocument> {
        match self {
            RunOutcome::Published { document, .. } | RunOutcome::NoChanges { document, .. } => {
                Some(document)
            }
            RunOutcome::Failed { .. } => None,
        }
    }
}
