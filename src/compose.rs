//! Release-note composition.
//!
//! Two [`Composer`] strategies are provided:
//!
//! - **[`FlatComposer`]** concatenates all rewritten commits and asks the
//!   model for one cohesive "Summary of Updates".
//! - **[`CategorizedComposer`]** routes commits through a [`CategoryTable`],
//!   summarizes each category on its own, then optionally summarizes
//!   across categories.
//!
//! Both render markdown with the window bounds in the header and one entry
//! per commit, in source order. An empty commit list yields an explicit
//! "no changes" document without calling the model.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::categorize::CategoryTable;
use crate::llm::TextGenerator;
use crate::models::{CategorySection, ReleaseDocument, ReleaseWindow, RewrittenCommit};
use crate::retry::retry_once_on_rate_limit;

pub const NO_SUMMARY: &str = "No summary available.";
pub const NO_CHANGES: &str = "No changes were committed in this period.";

const SYSTEM_PROMPT: &str =
    "You are an AI assistant specialized in generating clean, structured, and informative release notes.";

#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(
        &self,
        title: &str,
        window: &ReleaseWindow,
        commits: Vec<RewrittenCommit>,
    ) -> ReleaseDocument;
}

/// Shared summarization call used by both strategies.
#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
    retry_backoff: Duration,
}

impl Summarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        max_tokens: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            generator,
            max_tokens,
            retry_backoff,
        }
    }

    /// Summarize `messages` for `category`, or [`NO_SUMMARY`] on any failure.
    pub async fn summarize(&self, category: &str, messages: &[&str]) -> String {
        if messages.is_empty() {
            return NO_SUMMARY.to_string();
        }
        let prompt = format!(
            "You are an expert technical writer. Convert the following commit messages into a \
             structured, well-written summary for the category '{}'. Keep it professional and \
             concise:\n\n{}",
            category,
            messages.join("\n")
        );

        let result = retry_once_on_rate_limit("summary", self.retry_backoff, || {
            self.generator.generate(SYSTEM_PROMPT, &prompt, self.max_tokens)
        })
        .await;

        match result {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!(category, "model returned no summary");
                NO_SUMMARY.to_string()
            }
            Err(e) => {
                warn!(category, error = %e, "summary failed");
                NO_SUMMARY.to_string()
            }
        }
    }
}

/// Texts worth summarizing: placeholders carry no information for the model.
fn generated_texts<'c>(commits: impl IntoIterator<Item = &'c RewrittenCommit>) -> Vec<&'c str> {
    commits
        .into_iter()
        .filter(|c| !c.is_placeholder())
        .map(|c| c.text.as_str())
        .collect()
}

// ============ Rendering ============

fn header(window: &ReleaseWindow) -> String {
    format!(
        "### Release Notes ({} to {})\n\n",
        window.start_rfc3339(),
        window.end_rfc3339()
    )
}

fn entry_line(commit: &RewrittenCommit) -> String {
    let short: String = commit.sha.chars().take(7).collect();
    let text = commit.text.replace('\n', " ");
    if commit.is_placeholder() {
        format!("- [unavailable] {} (`{}`)\n", text, short)
    } else {
        format!("- {} (`{}`)\n", text, short)
    }
}

/// Document for a window with no commits.
pub fn no_changes_document(window: &ReleaseWindow) -> ReleaseDocument {
    let mut body = header(window);
    body.push_str("#### Summary of Updates\n");
    body.push_str(NO_CHANGES);
    body.push('\n');
    ReleaseDocument {
        window_start: window.start,
        window_end: window.end,
        summary_text: None,
        category_sections: None,
        entries: Vec::new(),
        body,
    }
}

// ============ Flat ============

pub struct FlatComposer {
    summarizer: Summarizer,
}

impl FlatComposer {
    pub fn new(summarizer: Summarizer) -> Self {
        Self { summarizer }
    }
}

#[async_trait]
impl Composer for FlatComposer {
    async fn compose(
        &self,
        title: &str,
        window: &ReleaseWindow,
        commits: Vec<RewrittenCommit>,
    ) -> ReleaseDocument {
        if commits.is_empty() {
            return no_changes_document(window);
        }

        let summary = self
            .summarizer
            .summarize(title, &generated_texts(&commits))
            .await;

        let mut body = header(window);
        body.push_str("#### Summary of Updates\n");
        body.push_str(&summary);
        body.push_str("\n\n#### Changes\n");
        for commit in &commits {
            body.push_str(&entry_line(commit));
        }

        ReleaseDocument {
            window_start: window.start,
            window_end: window.end,
            summary_text: Some(summary),
            category_sections: None,
            entries: commits,
            body,
        }
    }
}

// ============ Categorized ============

pub struct CategorizedComposer {
    summarizer: Summarizer,
    table: CategoryTable,
    overall_summary: bool,
}

impl CategorizedComposer {
    pub fn new(summarizer: Summarizer, table: CategoryTable, overall_summary: bool) -> Self {
        Self {
            summarizer,
            table,
            overall_summary,
        }
    }
}

#[async_trait]
impl Composer for CategorizedComposer {
    async fn compose(
        &self,
        title: &str,
        window: &ReleaseWindow,
        commits: Vec<RewrittenCommit>,
    ) -> ReleaseDocument {
        if commits.is_empty() {
            return no_changes_document(window);
        }

        let groups = self.table.group(&commits);

        let mut sections = Vec::with_capacity(groups.len());
        for (name, members) in &groups {
            let summary = self
                .summarizer
                .summarize(name, &generated_texts(members.iter().copied()))
                .await;
            sections.push(CategorySection {
                name: name.clone(),
                summary,
                commit_count: members.len(),
            });
        }

        let overall = if self.overall_summary {
            let parts: Vec<String> = sections
                .iter()
                .filter(|s| s.summary != NO_SUMMARY)
                .map(|s| format!("{}:\n{}", s.name, s.summary))
                .collect();
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            Some(self.summarizer.summarize(title, &refs).await)
        } else {
            None
        };

        let mut body = header(window);
        if let Some(ref overall) = overall {
            body.push_str("#### Summary of Updates\n");
            body.push_str(overall);
            body.push_str("\n\n");
        }
        for (section, (_, members)) in sections.iter().zip(&groups) {
            body.push_str(&format!("#### {}\n{}\n\n", section.name, section.summary));
            for commit in members {
                body.push_str(&entry_line(commit));
            }
            body.push('\n');
        }
        let body = format!("{}\n", body.trim_end());

        ReleaseDocument {
            window_start: window.start,
            window_end: window.end,
            summary_text: overall,
            category_sections: Some(sections),
            entries: commits,
            body,
        }
    }
}
