//! Commit message rewriting.
//!
//! Turns one [`CommitRecord`] into a short professional description by
//! sending its file list and bounded patch excerpts to a [`TextGenerator`].
//!
//! Every commit yields exactly one [`RewrittenCommit`]. When no text can be
//! generated, a fixed placeholder stating the reason is used instead:
//!
//! | Situation | Placeholder |
//! |-----------|-------------|
//! | detail fetch failed | [`DETAILS_UNAVAILABLE`] |
//! | commit touches no files | [`NO_FILES`] |
//! | model returned nothing | [`EMPTY_OUTPUT`] |
//! | generation call failed | [`GENERATION_FAILED`] |

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::llm::TextGenerator;
use crate::models::{CommitChanges, CommitRecord, FileChange, RewriteSource, RewrittenCommit};
use crate::retry::retry_once_on_rate_limit;

pub const DETAILS_UNAVAILABLE: &str = "Unknown commit changes (unable to fetch details).";
pub const NO_FILES: &str = "Unknown commit changes (no files modified).";
pub const EMPTY_OUTPUT: &str = "Generated commit message unavailable.";
pub const GENERATION_FAILED: &str = "Commit description unavailable (text generation failed).";

const SYSTEM_PROMPT: &str =
    "You are an AI assistant that generates well-written commit messages from code changes.";

/// Build the user prompt for one commit's changes.
pub fn build_prompt(raw_message: &str, files: &[FileChange]) -> String {
    let changes = files
        .iter()
        .map(|f| format!("File: {}\nChanges:\n{}", f.path, f.patch_excerpt))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Analyze the following code changes and generate a clear, professional commit message. \
         Write a single concise paragraph.\n\n\
         Original message: {}\n\n{}",
        raw_message.lines().next().unwrap_or("").trim(),
        changes
    )
}

fn placeholder(commit: &CommitRecord, text: &str) -> RewrittenCommit {
    RewrittenCommit {
        sha: commit.sha.clone(),
        raw_message: commit.raw_message.clone(),
        text: text.to_string(),
        source: RewriteSource::Placeholder,
    }
}

pub struct Rewriter<'a> {
    generator: &'a dyn TextGenerator,
    max_tokens: u32,
}

impl<'a> Rewriter<'a> {
    pub fn new(generator: &'a dyn TextGenerator, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// One generation attempt.
    ///
    /// Commits without usable file detail resolve to a placeholder without
    /// calling the model. Transport failures are returned so the caller can
    /// decide whether to retry.
    pub async fn try_rewrite(
        &self,
        commit: &CommitRecord,
    ) -> Result<RewrittenCommit, TransportError> {
        let files = match &commit.changes {
            CommitChanges::Files(files) if !files.is_empty() => files,
            CommitChanges::Files(_) => return Ok(placeholder(commit, NO_FILES)),
            CommitChanges::Unavailable(_) | CommitChanges::NotFetched => {
                return Ok(placeholder(commit, DETAILS_UNAVAILABLE))
            }
        };

        let prompt = build_prompt(&commit.raw_message, files);
        let text = self
            .generator
            .generate(SYSTEM_PROMPT, &prompt, self.max_tokens)
            .await?;

        Ok(match text {
            Some(text) => RewrittenCommit {
                sha: commit.sha.clone(),
                raw_message: commit.raw_message.clone(),
                text,
                source: RewriteSource::Generated,
            },
            None => {
                warn!(sha = %commit.short_sha(), "model returned no text");
                placeholder(commit, EMPTY_OUTPUT)
            }
        })
    }

    /// Rewrite one commit, substituting [`GENERATION_FAILED`] on transport
    /// failure. Does not retry.
    pub async fn rewrite(&self, commit: &CommitRecord) -> RewrittenCommit {
        match self.try_rewrite(commit).await {
            Ok(rewritten) => rewritten,
            Err(e) => {
                warn!(sha = %commit.short_sha(), error = %e, "rewrite failed");
                placeholder(commit, GENERATION_FAILED)
            }
        }
    }

    /// Rewrite one commit, retrying a rate-limited call once before
    /// substituting [`GENERATION_FAILED`].
    pub async fn rewrite_retrying(
        &self,
        commit: &CommitRecord,
        retry_backoff: Duration,
    ) -> RewrittenCommit {
        let result =
            retry_once_on_rate_limit("rewrite", retry_backoff, || self.try_rewrite(commit)).await;
        match result {
            Ok(rewritten) => {
                debug!(
                    sha = %commit.short_sha(),
                    placeholder = rewritten.is_placeholder(),
                    "rewrote commit"
                );
                rewritten
            }
            Err(e) => {
                warn!(sha = %commit.short_sha(), error = %e, "rewrite failed");
                placeholder(commit, GENERATION_FAILED)
            }
        }
    }

    /// Rewrite a batch with bounded concurrency.
    ///
    /// Output order matches input order.
    pub async fn rewrite_all(
        &self,
        commits: &[CommitRecord],
        concurrency: usize,
        retry_backoff: Duration,
    ) -> Vec<RewrittenCommit> {
        let futures: Vec<_> = commits
            .iter()
            .map(|c| self.rewrite_retrying(c, retry_backoff).boxed())
            .collect();
        stream::iter(futures)
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
