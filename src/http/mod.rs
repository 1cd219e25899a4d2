//! HTTP client module
//!
//! Provides the transport used by the page clients.
//!
//! # Features
//!
//! - **Single shot**: one send per call, outcomes are classified upstream
//! - **Default headers**: base URL, user agent and per-client headers
//! - **Authentication**: optional bearer token per request

mod client;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};

#[cfg(test)]
mod tests;
