//! Commit-range resolution.
//!
//! The window of unreleased history starts at the publish time of the most
//! recent release (skipping the tag being processed) and ends at "now".
//! When no usable release exists, or the lookup fails, the start falls back
//! to a configurable [`LookbackPolicy`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::{LookbackKind, WindowConfig};
use crate::github::SourceHost;
use crate::models::{ReleaseRecord, ReleaseWindow};

/// Install-date anchor used when none is configured: `now - 30 days`.
const ASSUMED_INSTALL_AGE_DAYS: i64 = 30;

/// How to pick the window start when there is no previous release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookbackPolicy {
    /// `now - days`.
    DaysBeforeNow { days: i64 },
    /// Midnight UTC of `install_date + offset_days`.
    InstallDateOffset {
        install_date: Option<NaiveDate>,
        offset_days: i64,
    },
}

impl LookbackPolicy {
    pub fn from_config(cfg: &WindowConfig) -> Self {
        match cfg.policy {
            LookbackKind::DaysBeforeNow => LookbackPolicy::DaysBeforeNow { days: cfg.days },
            LookbackKind::InstallDateOffset => LookbackPolicy::InstallDateOffset {
                install_date: cfg.install_date,
                offset_days: cfg.offset_days,
            },
        }
    }

    pub fn default_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            LookbackPolicy::DaysBeforeNow { days } => Duration::try_days(days)
                .and_then(|d| now.checked_sub_signed(d))
                .unwrap_or(now),
            LookbackPolicy::InstallDateOffset {
                install_date,
                offset_days,
            } => {
                let installed = install_date.unwrap_or_else(|| {
                    (now - Duration::days(ASSUMED_INSTALL_AGE_DAYS)).date_naive()
                });
                Duration::try_days(offset_days)
                    .and_then(|d| installed.checked_add_signed(d))
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
                    .unwrap_or(now)
            }
        }
    }
}

/// The most recent published release other than `exclude_tag`.
///
/// Releases are expected in host order (newest first). Drafts, which have
/// no `published_at`, are skipped.
pub fn previous_release<'a>(
    releases: &'a [ReleaseRecord],
    exclude_tag: Option<&str>,
) -> Option<&'a ReleaseRecord> {
    releases
        .iter()
        .filter(|r| Some(r.tag_name.as_str()) != exclude_tag)
        .find(|r| r.published_at.is_some())
}

/// Resolve the window of commits to summarize.
///
/// Never fails: a failed release lookup is logged and degrades to the
/// default lookback.
pub async fn resolve_window(
    host: &dyn SourceHost,
    exclude_tag: Option<&str>,
    policy: &LookbackPolicy,
    now: DateTime<Utc>,
) -> ReleaseWindow {
    let start = match host.list_releases().await {
        Ok(releases) => match previous_release(&releases, exclude_tag) {
            Some(prev) => {
                debug!(tag = %prev.tag_name, "window starts at previous release");
                prev.published_at.unwrap_or_else(|| policy.default_start(now))
            }
            None => {
                info!("no previous release found, using default lookback");
                policy.default_start(now)
            }
        },
        Err(e) => {
            warn!(error = %e, "release lookup failed, using default lookback");
            policy.default_start(now)
        }
    };

    ReleaseWindow::new(start, now)
}
