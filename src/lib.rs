//! # Release Herald
//!
//! AI-written release notes for a single GitHub repository.
//!
//! Release Herald looks up the previous release, collects the commits made
//! since then, asks a text-generation model to describe each change, and
//! composes the results into one markdown note that is created or updated
//! on the release for a tag.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐
//! │  Window  │──▶│  Fetch  │──▶│ Rewrite │──▶│ Compose │──▶│ Publish │
//! │ resolver │   │ commits │   │  (LLM)  │   │ (LLM)   │   │ release │
//! └──────────┘   └─────────┘   └─────────┘   └─────────┘   └─────────┘
//!       ▲                                                       │
//!       └──────────── GitHub REST API ◀─────────────────────────┘
//!
//!        triggered by:  herald generate   |   POST /webhook
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=... OPENAI_API_KEY=...
//! herald generate --tag v1.4.0      # publish notes for v1.4.0
//! herald serve webhook              # react to release / tag push events
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential resolution |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`github`] | Source-control host trait and GitHub client |
//! | [`llm`] | Text-generation trait and OpenAI client |
//! | [`window`] | Commit-range resolution |
//! | [`fetch`] | Commit listing and detail fetching |
//! | [`rewrite`] | Per-commit rewriting |
//! | [`categorize`] | Marker-based categorization |
//! | [`compose`] | Flat and categorized composition |
//! | [`publish`] | Create-or-update of the release |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`retry`] | Single retry on rate limiting |
//! | [`artifact`] | Local copy of the notes |
//! | [`webhook`] | GitHub webhook receiver |
//! | [`logging`] | tracing subscriber setup |

pub mod artifact;
pub mod categorize;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetch;
pub mod github;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod rewrite;
pub mod webhook;
pub mod window;
