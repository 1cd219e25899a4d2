// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Stargazer
//!
//! Rate-governed paginated fetching of GitHub stargazers and starred
//! repositories.
//!
//! ## Features
//!
//! - **Lazy streams**: one logical listing becomes a stream of identities,
//!   fetched page by page as the consumer polls
//! - **Primary quota**: `x-ratelimit-*` headers drive a per-credential budget;
//!   requests wait for the reset instead of failing
//! - **Secondary throttle**: `retry-after` and abuse responses back off with
//!   bounded retries
//! - **Single flight**: sessions sharing a credential never overlap requests
//! - **REST or GraphQL**: `Link` header or `pageInfo.endCursor` pagination
//! - **Conditional revalidation**: expired cached pages are re-requested with
//!   `If-None-Match` / `If-Modified-Since` and reused on a 304
//! - **Star neighbours**: repositories co-starred by a repository's stargazers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stargazer::{accumulator, Credential, Fetcher, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> stargazer::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let fetcher = Fetcher::from_settings(&settings)?;
//!     let credential = Credential::new(settings.github_token.clone());
//!
//!     let stream = fetcher.stargazers("rust-lang", "rust", &credential, CancellationToken::new())?;
//!     let logins = accumulator::collect(stream).await?;
//!     println!("{} stargazers", logins.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! caller ─► Fetcher ─► PaginationDriver ─► (PageCache) ─► PageClient ─► HttpClient
//!              │              │
//!              │              ├─ RateBudget   (primary quota, shared per credential)
//!              │              ├─ RequestPacer (minimum spacing)
//!              │              └─ Backoff      (secondary throttle, transient errors)
//!              └─ CredentialCoordinator registry
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and fetch failures
pub mod error;

/// Common types and type aliases
pub mod types;

/// Rate budget, backoff and request pacing
pub mod rate;

/// HTTP client wrapper
pub mod http;

/// Page clients and outcome classification
pub mod pagination;

/// Page cache collaborator
pub mod cache;

/// Pagination driver and credential coordination
pub mod engine;

/// Deduplication and collection of fetch streams
pub mod accumulator;

/// Public fetch entry point
pub mod fetcher;

/// Star neighbour aggregation
pub mod neighbours;

/// Settings loading
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::Settings;
pub use error::{Error, FailureKind, FetchFailure, Result};
pub use fetcher::{FetchOptions, Fetcher, FetcherConfig};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
