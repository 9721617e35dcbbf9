//! Commit fetching.
//!
//! Lists the commits in a [`ReleaseWindow`] and fills in per-commit file
//! changes. Patches are cut to a hard character cap so prompt sizes stay
//! predictable.
//!
//! A failed listing ends the invocation ([`HeraldError::CommitList`]). A
//! failed detail call does not: that commit is marked
//! [`CommitChanges::Unavailable`] and the batch carries on.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::HeraldError;
use crate::github::{RemoteFile, SourceHost};
use crate::models::{CommitChanges, CommitRecord, FileChange, ReleaseWindow};
use crate::retry::retry_once_on_rate_limit;

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Maximum patch length, in characters, kept per file.
    pub patch_char_cap: usize,
    /// Maximum number of detail requests in flight.
    pub concurrency: usize,
    /// Pause before the single retry of a rate-limited call.
    pub retry_backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            patch_char_cap: 500,
            concurrency: 4,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Cut `patch` to at most `cap` characters.
///
/// The cut is a plain character count, not line-aware, and never splits a
/// UTF-8 code point.
pub fn truncate_patch(patch: &str, cap: usize) -> &str {
    match patch.char_indices().nth(cap) {
        Some((byte_idx, _)) => &patch[..byte_idx],
        None => patch,
    }
}

pub fn to_file_changes(files: Vec<RemoteFile>, cap: usize) -> Vec<FileChange> {
    files
        .into_iter()
        .map(|f| FileChange {
            patch_excerpt: truncate_patch(f.patch.as_deref().unwrap_or(""), cap).to_string(),
            path: f.filename,
        })
        .collect()
}

/// List the commits in the window, in host order.
pub async fn fetch_commits(
    host: &dyn SourceHost,
    window: &ReleaseWindow,
) -> Result<Vec<CommitRecord>, HeraldError> {
    let commits = host
        .list_commits(window)
        .await
        .map_err(HeraldError::CommitList)?;
    info!(
        count = commits.len(),
        since = %window.start_rfc3339(),
        until = %window.end_rfc3339(),
        "fetched commits"
    );
    Ok(commits)
}

/// Fill in the file changes for one commit. Never fails.
pub async fn fetch_commit_detail(
    host: &dyn SourceHost,
    mut commit: CommitRecord,
    opts: &FetchOptions,
) -> CommitRecord {
    let sha = commit.sha.clone();
    let result = retry_once_on_rate_limit("commit detail", opts.retry_backoff, || {
        host.commit_files(&sha)
    })
    .await;

    commit.changes = match result {
        Ok(files) => CommitChanges::Files(to_file_changes(files, opts.patch_char_cap)),
        Err(e) => {
            warn!(sha = %commit.short_sha(), error = %e, "commit detail unavailable");
            CommitChanges::Unavailable(e.to_string())
        }
    };
    commit
}

/// Fetch detail for every commit with bounded concurrency.
///
/// The returned list is in the same order as `commits`, whatever order the
/// requests complete in.
pub async fn fetch_details(
    host: &dyn SourceHost,
    commits: Vec<CommitRecord>,
    opts: &FetchOptions,
) -> Vec<CommitRecord> {
    stream::iter(commits)
        .map(|c| fetch_commit_detail(host, c, opts).boxed())
        .buffered(opts.concurrency.max(1))
        .collect()
        .await
}
