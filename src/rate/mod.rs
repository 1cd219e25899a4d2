//! Rate governance module
//!
//! Everything that decides *when* the next request may be issued.
//!
//! # Overview
//!
//! - **RateBudget**: primary quota state (`x-ratelimit-*` headers) from the
//!   most recent response, and the wake time it mandates
//! - **Backoff**: retry delays for secondary throttling and transient errors
//! - **RequestPacer**: minimum spacing between two requests on one credential
//!
//! None of these types sleep on their own except the pacer; they advise the
//! pagination driver, which owns every suspension point.

mod backoff;
mod budget;
mod pacer;

pub use backoff::Backoff;
pub use budget::{RateBudget, RateHeaders, RateLimitStatus, RateState};
pub use pacer::RequestPacer;
