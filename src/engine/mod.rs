//! Execution engine module
//!
//! Rate-governed pagination of one listing.
//!
//! # Overview
//!
//! The engine module provides:
//! - `CredentialCoordinator` - shared budget, pacer and single-flight gate of
//!   one credential
//! - `PaginationDriver` - state machine walking one listing page by page
//! - `FetchStream` - the lazy stream a driver turns into
//!
//! Every suspension point (gate, budget wait, pacer, backoff) is raced
//! against the session's cancellation token.

mod coordinator;
mod driver;
mod types;

pub use coordinator::{Clock, CredentialCoordinator};
pub use driver::PaginationDriver;
pub use types::{DriverState, FetchStream, SessionConfig, SessionStats};
