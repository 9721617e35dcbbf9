//! # Release Herald CLI (`herald`)
//!
//! Generates release notes for one GitHub repository from the commits made
//! since its previous release, and publishes them to the release for a tag.
//!
//! ## Usage
//!
//! ```bash
//! herald --config ./config/herald.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `herald generate` | Compose and publish notes now (manual trigger) |
//! | `herald window` | Show the commit window that would be summarized |
//! | `herald serve webhook` | Start the GitHub webhook receiver |
//! | `herald completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Publish notes under a timestamp tag (v20250615090507)
//! herald generate
//!
//! # Publish notes for an existing tag, keeping a local copy
//! herald generate --tag v1.4.0 --output RELEASE_NOTES.md
//!
//! # Preview without touching the release
//! herald generate --dry-run
//! ```

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use release_herald::config::{self, OutputMode};
use release_herald::logging::{self, LogFormat, LogLevel};
use release_herald::models::RunOutcome;
use release_herald::pipeline::{ArtifactSink, Pipeline, Trigger};
use release_herald::webhook::{self, WebhookState};
use release_herald::window::resolve_window;

/// Release Herald: AI-written release notes for GitHub repositories.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`. Credentials may also come from `GITHUB_TOKEN` and
/// `OPENAI_API_KEY`.
#[derive(Parser)]
#[command(
    name = "herald",
    about = "Release Herald: AI-written release notes for GitHub repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/herald.toml")]
    config: PathBuf,

    /// Log verbosity (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plaintext)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose release notes for the commits since the last release and publish them.
    ///
    /// Creates the release for the tag if it does not exist, otherwise
    /// replaces its body.
    Generate {
        /// Tag to publish under. Defaults to `v<YYYYmmddHHMMSS>`.
        #[arg(long)]
        tag: Option<String>,

        /// Compose the notes but do not publish them.
        #[arg(long)]
        dry_run: bool,

        /// Also write the notes to this file (overrides `[output].path`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Append to the `--output` file instead of overwriting it.
        #[arg(long, requires = "output")]
        append: bool,
    },

    /// Print the commit window that would be summarized.
    Window {
        /// Tag being released; excluded when looking for the previous release.
        #[arg(long)]
        tag: Option<String>,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Receive GitHub `release` and tag `push` events.
    ///
    /// Binds to `[server].bind`.
    Webhook,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "herald", &mut std::io::stdout());
        return Ok(());
    }

    logging::init(cli.log_level, cli.log_format)?;

    let cfg = config::load_config(&cli.config)?;
    let credentials = cfg.resolve_credentials_from_env()?;

    match cli.command {
        Commands::Generate {
            tag,
            dry_run,
            output,
            append,
        } => {
            let mut pipeline = Pipeline::from_config(&cfg, &credentials)?;
            let settings = pipeline.settings_mut();
            settings.dry_run = dry_run;
            if let Some(path) = output {
                settings.artifact = Some(ArtifactSink {
                    path,
                    mode: if append {
                        OutputMode::Append
                    } else {
                        OutputMode::Overwrite
                    },
                });
            }
            run_generate(&pipeline, Trigger::Manual { tag }).await?;
        }
        Commands::Window { tag } => {
            let pipeline = Pipeline::from_config(&cfg, &credentials)?;
            let trigger = Trigger::Manual { tag };
            let window = resolve_window(
                pipeline.host(),
                trigger.exclude_tag(),
                &pipeline.settings().lookback,
                chrono::Utc::now(),
            )
            .await;
            println!("window");
            println!("  since: {}", window.start_rfc3339());
            println!("  until: {}", window.end_rfc3339());
        }
        Commands::Serve { service } => match service {
            ServeService::Webhook => {
                let pipeline = Pipeline::from_config(&cfg, &credentials)?;
                let state = WebhookState {
                    pipeline,
                    secret: credentials.webhook_secret.clone(),
                };
                webhook::run_server(&cfg.server.bind, state).await?;
            }
        },
        Commands::Completions { .. } => {} // handled before config loading
    }

    Ok(())
}

async fn run_generate(pipeline: &Pipeline, trigger: Trigger) -> anyhow::Result<()> {
    let outcome = pipeline.run_now(&trigger).await;

    if let Some(doc) = outcome.document() {
        let placeholders = doc.entries.iter().filter(|e| e.is_placeholder()).count();
        println!("{}", doc.body.trim_end());
        println!();
        println!("release notes");
        println!(
            "  window: {} to {}",
            doc.window_start.to_rfc3339(),
            doc.window_end.to_rfc3339()
        );
        println!("  commits: {}", doc.entries.len());
        println!("  placeholders: {}", placeholders);
    }

    match outcome {
        RunOutcome::Published {
            tag,
            publish: Some(p),
            ..
        } => {
            println!("  release {}: {} (id {})", tag, p.verb(), p.id());
            println!("ok");
        }
        RunOutcome::Published {
            tag, publish: None, ..
        } => {
            println!("  release {}: skipped (dry run)", tag);
            println!("ok");
        }
        RunOutcome::NoChanges { tag, .. } => {
            println!("  release {}: no changes, nothing published", tag);
            println!("ok");
        }
        RunOutcome::Failed { reason } => {
            return Err(anyhow::anyhow!(reason)).context("release notes generation failed");
        }
    }
    Ok(())
}
