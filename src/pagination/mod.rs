//! Pagination module
//!
//! Supports: REST (`Link` header) and GraphQL (`pageInfo.endCursor`)
//!
//! # Overview
//!
//! A [`PageClient`] performs exactly one network call for one page and
//! classifies what came back into an [`Outcome`]. Both clients share the
//! same status classification so a throttle looks identical whichever API
//! produced it.

mod classify;
mod graphql;
mod rest;
mod types;

pub use classify::{classify_status, Classification};
pub use graphql::GraphQlPageClient;
pub use rest::{parse_link_header, RestPageClient, GITHUB_ACCEPT, GITHUB_API_VERSION};
pub use types::{Outcome, PageClient, Validators};
