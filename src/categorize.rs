//! Marker-based commit categorization.
//!
//! A [`CategoryTable`] maps category names to marker strings (for example
//! `"-bf"` or `"-bug fixed"`). A commit message is routed to the first
//! category, in table order, that has a marker occurring in the message
//! (case-insensitive). Messages matching no marker go to the fallback
//! category. They are never dropped.

use crate::config::{CategoryConfig, ComposeConfig};
use crate::models::RewrittenCommit;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CategoryRule {
    name: String,
    /// Lowercased, non-empty markers.
    markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl CategoryTable {
    pub fn new(categories: &[CategoryConfig], fallback: &str) -> Self {
        let rules = categories
            .iter()
            .map(|c| CategoryRule {
                name: c.name.clone(),
                markers: c
                    .markers
                    .iter()
                    .map(|m| m.trim().to_lowercase())
                    .filter(|m| !m.is_empty())
                    .collect(),
            })
            .collect();
        Self {
            rules,
            fallback: fallback.to_string(),
        }
    }

    pub fn from_config(cfg: &ComposeConfig) -> Self {
        Self::new(&cfg.categories, &cfg.fallback_category)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// The single category a commit message belongs to.
    pub fn classify(&self, message: &str) -> &str {
        let lowered = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.markers.iter().any(|m| lowered.contains(m.as_str())))
            .map(|rule| rule.name.as_str())
            .unwrap_or(&self.fallback)
    }

    /// Group commits by category, in table order with the fallback last.
    ///
    /// Categories with no commits are omitted. Within a category, commits
    /// keep their input order.
    pub fn group<'c>(
        &self,
        commits: &'c [RewrittenCommit],
    ) -> Vec<(String, Vec<&'c RewrittenCommit>)> {
        let names = self
            .rules
            .iter()
            .map(|r| r.name.as_str())
            .chain(std::iter::once(self.fallback.as_str()));

        let mut groups: Vec<(String, Vec<&RewrittenCommit>)> =
            names.map(|n| (n.to_string(), Vec::new())).collect();

        for commit in commits {
            let category = self.classify(&commit.raw_message);
            if let Some((_, bucket)) = groups.iter_mut().find(|(n, _)| n == category) {
                bucket.push(commit);
            }
        }

        groups.retain(|(_, bucket)| !bucket.is_empty());
        groups
    }
}
