//! Pipeline orchestration.
//!
//! Runs one invocation of the release-note flow:
//!
//! ```text
//! resolve window → list commits → fetch details → rewrite → compose → publish
//! ```
//!
//! Each stage is swappable: the host and generator are traits, the
//! composition strategy is a [`Composer`], and the lookback is a
//! [`LookbackPolicy`]. All inputs arrive through [`PipelineSettings`]; the
//! pipeline never reads the environment.
//!
//! Publishing is the only remote write and happens once, after the document
//! is fully assembled. Dropping the future returned by [`Pipeline::run`]
//! before that point abandons in-flight requests without touching the
//! release.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::artifact::write_artifact;
use crate::categorize::CategoryTable;
use crate::compose::{CategorizedComposer, Composer, FlatComposer, Summarizer};
use crate::config::{CompositionKind, Config, Credentials, OutputMode};
use crate::error::HeraldError;
use crate::fetch::{fetch_commits, fetch_details, FetchOptions};
use crate::github::{GitHubClient, SourceHost};
use crate::llm::{OpenAiChat, TextGenerator};
use crate::models::{ReleaseDocument, RunOutcome};
use crate::publish::publish;
use crate::rewrite::Rewriter;
use crate::window::{resolve_window, LookbackPolicy};

/// What started this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Manual run. Without a tag, one is derived from the invocation time.
    Manual { tag: Option<String> },
    /// Webhook for a created release or a pushed tag.
    Tag(String),
}

impl Trigger {
    /// Tag to publish under.
    pub fn tag(&self, now: DateTime<Utc>) -> String {
        match self {
            Trigger::Manual { tag: Some(tag) } | Trigger::Tag(tag) => tag.clone(),
            Trigger::Manual { tag: None } => format!("v{}", now.format("%Y%m%d%H%M%S")),
        }
    }

    /// Tag to ignore when looking for the previous release.
    pub fn exclude_tag(&self) -> Option<&str> {
        match self {
            Trigger::Manual { tag } => tag.as_deref(),
            Trigger::Tag(tag) => Some(tag),
        }
    }
}

/// Where to write the local copy of the notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSink {
    pub path: PathBuf,
    pub mode: OutputMode,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub title: String,
    pub lookback: LookbackPolicy,
    pub fetch: FetchOptions,
    pub rewrite_max_tokens: u32,
    pub artifact: Option<ArtifactSink>,
    /// Compose everything but skip the publish step.
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.compose.title.clone(),
            lookback: LookbackPolicy::from_config(&config.window),
            fetch: FetchOptions {
                patch_char_cap: config.fetch.patch_char_cap,
                concurrency: config.fetch.concurrency,
                retry_backoff: Duration::from_millis(config.fetch.retry_backoff_ms),
            },
            rewrite_max_tokens: config.llm.rewrite_max_tokens,
            artifact: config.output.path.as_ref().map(|path| ArtifactSink {
                path: path.clone(),
                mode: config.output.mode,
            }),
            dry_run: false,
        }
    }
}

/// Build the configured composition strategy.
pub fn composer_from_config(
    config: &Config,
    generator: Arc<dyn TextGenerator>,
) -> Box<dyn Composer> {
    let summarizer = Summarizer::new(
        generator,
        config.llm.summary_max_tokens,
        Duration::from_millis(config.fetch.retry_backoff_ms),
    );
    match config.compose.policy {
        CompositionKind::Flat => Box::new(FlatComposer::new(summarizer)),
        CompositionKind::Categorized => Box::new(CategorizedComposer::new(
            summarizer,
            CategoryTable::from_config(&config.compose),
            config.compose.overall_summary,
        )),
    }
}

pub struct Pipeline {
    host: Arc<dyn SourceHost>,
    generator: Arc<dyn TextGenerator>,
    composer: Box<dyn Composer>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        host: Arc<dyn SourceHost>,
        generator: Arc<dyn TextGenerator>,
        composer: Box<dyn Composer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            host,
            generator,
            composer,
            settings,
        }
    }

    /// Wire up the GitHub and OpenAI clients from resolved configuration.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self, HeraldError> {
        let client_err = |e: crate::error::TransportError| {
            HeraldError::Configuration(format!("failed to build HTTP client: {}", e))
        };

        let host = GitHubClient::new(
            &config.github.api_base,
            &credentials.owner,
            &credentials.repo,
            &credentials.github_token,
            Duration::from_secs(config.github.timeout_secs),
        )
        .map_err(client_err)?;

        let generator: Arc<dyn TextGenerator> = Arc::new(
            OpenAiChat::new(
                &config.llm.base_url,
                &credentials.llm_api_key,
                &config.llm.model,
                Duration::from_secs(config.llm.timeout_secs),
            )
            .map_err(client_err)?,
        );

        let composer = composer_from_config(config, generator.clone());
        Ok(Self::new(
            Arc::new(host),
            generator,
            composer,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PipelineSettings {
        &mut self.settings
    }

    pub fn host(&self) -> &dyn SourceHost {
        self.host.as_ref()
    }

    /// Run once, at the current time.
    pub async fn run_now(&self, trigger: &Trigger) -> RunOutcome {
        self.run(trigger, Utc::now()).await
    }

    /// Run once and report one of published, no-changes, or failed.
    pub async fn run(&self, trigger: &Trigger, now: DateTime<Utc>) -> RunOutcome {
        match self.try_run(trigger, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "release notes run failed");
                RunOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_run(
        &self,
        trigger: &Trigger,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, HeraldError> {
        let tag = trigger.tag(now);
        let host = self.host.as_ref();

        let window =
            resolve_window(host, trigger.exclude_tag(), &self.settings.lookback, now).await;
        info!(
            tag = %tag,
            since = %window.start_rfc3339(),
            until = %window.end_rfc3339(),
            "resolved release window"
        );

        let commits = fetch_commits(host, &window).await?;

        if commits.is_empty() {
            info!(tag = %tag, "no commits in window, nothing to publish");
            let document = self
                .composer
                .compose(&self.settings.title, &window, Vec::new())
                .await;
            self.write_artifact(&tag, &document);
            return Ok(RunOutcome::NoChanges { tag, document });
        }

        let opts = &self.settings.fetch;
        let detailed = fetch_details(host, commits, opts).await;

        let rewriter = Rewriter::new(self.generator.as_ref(), self.settings.rewrite_max_tokens);
        let rewritten = rewriter
            .rewrite_all(&detailed, opts.concurrency, opts.retry_backoff)
            .await;

        let document = self
            .composer
            .compose(&self.settings.title, &window, rewritten)
            .await;
        self.write_artifact(&tag, &document);

        if self.settings.dry_run {
            info!(tag = %tag, "dry run, skipping publish");
            return Ok(RunOutcome::Published {
                tag,
                publish: None,
                document,
            });
        }

        let outcome = publish(host, &tag, &document).await?;
        Ok(RunOutcome::Published {
            tag,
            publish: Some(outcome),
            document,
        })
    }

    /// Artifact failures are logged, not fatal.
    fn write_artifact(&self, tag: &str, document: &ReleaseDocument) {
        if let Some(sink) = &self.settings.artifact {
            match write_artifact(&sink.path, sink.mode, tag, document) {
                Ok(()) => info!(path = %sink.path.display(), "wrote release notes"),
                Err(e) => warn!(error = %e, "could not write release notes artifact"),
            }
        }
    }
}
